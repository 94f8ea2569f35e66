//! Manual install area inventory

mod common;

use anyhow::Result;
use common::{Rootfs, ELF_STUB};
use dtrust_core::manual::{EntryKind, ManualAreaReport, ManualAreaScanner, ScanDeadline, TruncationReason};
use dtrust_core::{DiagnosticKind, Diagnostics};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn assert_stats_match_entries(report: &ManualAreaReport) {
    let entries = &report.entries;
    assert_eq!(report.stats.files, entries.len() as u64);
    assert_eq!(
        report.stats.world_writable,
        entries.iter().filter(|e| e.world_writable).count() as u64
    );
    assert_eq!(
        report.stats.elf_binaries,
        entries.iter().filter(|e| e.is_elf).count() as u64
    );
}

fn populate(root: &Rootfs) -> Result<()> {
    root.write_mode("/opt/vendor/bin/agent", ELF_STUB, 0o755)?;
    root.write_mode("/opt/vendor/bin/helper", ELF_STUB, 0o777)?;
    root.write_mode("/opt/vendor/README", "docs", 0o644)?;
    root.write_mode("/opt/vendor/share/data.json", "{}", 0o666)?;
    root.symlink("bin/agent", "/opt/vendor/agent")?;
    root.write_mode("/usr/local/bin/script", "#!/bin/sh\n", 0o755)?;
    Ok(())
}

#[test]
fn test_full_scan_counts() -> Result<()> {
    let root = Rootfs::new()?;
    populate(&root)?;

    let mut diags = Diagnostics::new();
    let scanner = ManualAreaScanner::new(root.path(), 100, ScanDeadline::unbounded(), &mut diags);
    let areas = scanner.scan_all(&["/usr/local", "/opt"], &mut diags);

    let keys: Vec<&String> = areas.keys().collect();
    assert_eq!(keys, vec!["/opt", "/usr/local"]);

    let opt = &areas["/opt"];
    assert!(opt.exists);
    assert!(!opt.truncated);
    assert_eq!(opt.stats.files, 5);
    assert_eq!(opt.stats.dirs, 3);
    assert_eq!(opt.stats.elf_binaries, 2);
    assert_eq!(opt.stats.world_writable, 2);
    assert_stats_match_entries(opt);

    let link = opt
        .entries
        .iter()
        .find(|e| e.kind == EntryKind::Symlink)
        .expect("symlink entry");
    assert_eq!(link.path, root.host("/opt/vendor/agent"));
    assert!(!link.is_elf);
    assert!(!link.world_writable);

    let helper = opt
        .entries
        .iter()
        .find(|e| e.path.ends_with("bin/helper"))
        .expect("helper entry");
    assert_eq!(helper.mode, "0777");
    assert!(helper.mtime_utc.is_some());

    assert_stats_match_entries(&areas["/usr/local"]);
    Ok(())
}

#[test]
fn test_entry_limit_truncates_consistently() -> Result<()> {
    let root = Rootfs::new()?;
    for i in 0..20 {
        root.write_mode(&format!("/opt/pkg/file{i:02}"), ELF_STUB, 0o777)?;
    }

    let mut diags = Diagnostics::new();
    let scanner = ManualAreaScanner::new(root.path(), 8, ScanDeadline::unbounded(), &mut diags);
    let report = scanner.scan_area("/opt", &mut diags);

    assert!(report.truncated);
    assert_eq!(report.truncation_reason, Some(TruncationReason::EntryLimit));
    assert_eq!(report.stats.files + report.stats.dirs, 8);
    assert_stats_match_entries(&report);
    assert_eq!(diags.count(DiagnosticKind::Exhausted), 1);
    Ok(())
}

#[test]
fn test_expired_deadline_returns_partial_report() -> Result<()> {
    let root = Rootfs::new()?;
    populate(&root)?;

    let mut diags = Diagnostics::new();
    let scanner = ManualAreaScanner::new(
        root.path(),
        100,
        ScanDeadline::after(Duration::ZERO),
        &mut diags,
    );
    let report = scanner.scan_area("/opt", &mut diags);

    assert!(report.truncated);
    assert_eq!(report.truncation_reason, Some(TruncationReason::Deadline));
    assert!(report.entries.is_empty());
    assert_stats_match_entries(&report);
    Ok(())
}

#[test]
fn test_missing_area_is_empty_not_error() -> Result<()> {
    let root = Rootfs::new()?;

    let mut diags = Diagnostics::new();
    let scanner = ManualAreaScanner::new(root.path(), 100, ScanDeadline::unbounded(), &mut diags);
    let report = scanner.scan_area("/opt", &mut diags);

    assert!(!report.exists);
    assert!(report.entries.is_empty());
    assert!(!report.truncated);
    assert!(diags.count(DiagnosticKind::Missing) >= 1);
    Ok(())
}

#[test]
fn test_owner_names_come_from_target_accounts() -> Result<()> {
    let root = Rootfs::new()?;
    root.write_mode("/opt/file", "x", 0o644)?;

    let meta = std::fs::metadata(root.host("/opt/file"))?;
    use std::os::unix::fs::MetadataExt;
    root.write(
        "/etc/passwd",
        format!("imageuser:x:{}:{}::/home/imageuser:/bin/sh\n", meta.uid(), meta.gid()),
    )?;
    root.write("/etc/group", format!("imagegroup:x:{}:\n", meta.gid()))?;

    let mut diags = Diagnostics::new();
    let scanner = ManualAreaScanner::new(root.path(), 100, ScanDeadline::unbounded(), &mut diags);
    let report = scanner.scan_area("/opt", &mut diags);

    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].owner, "imageuser:imagegroup");
    Ok(())
}
