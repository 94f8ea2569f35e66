//! Repository collection across managers on fixture root filesystems

mod common;

use anyhow::Result;
use common::Rootfs;
use dtrust_core::repos::collect_repos;
use dtrust_core::{DiagnosticKind, Diagnostics, Manager};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

#[test]
fn test_all_managers_in_stable_order() -> Result<()> {
    let root = Rootfs::new()?;
    root.write(
        "/etc/yum.repos.d/b.repo",
        "[updates]\nbaseurl=https://mirror.example/updates\n",
    )?;
    root.write(
        "/etc/yum.repos.d/a.repo",
        "[base]\nname=Base\nbaseurl=http://mirror.example/base\ngpgcheck=0\n\n[extras]\nenabled=false\nmirrorlist=https://mirror.example/extras\n",
    )?;
    root.write(
        "/etc/apt/sources.list",
        "# main archive\ndeb http://deb.example/debian bookworm main contrib\n",
    )?;
    root.write(
        "/etc/pacman.conf",
        "[options]\nSigLevel = Required DatabaseOptional\n\n[core]\nServer = https://arch.example/core\n",
    )?;

    let mut diags = Diagnostics::new();
    let repos = collect_repos(root.path(), &mut diags);

    let summary: Vec<(Manager, &str)> = repos.iter().map(|r| (r.manager, r.name.as_str())).collect();
    assert_eq!(
        summary,
        vec![
            (Manager::Dnf, "base"),
            (Manager::Dnf, "extras"),
            (Manager::Dnf, "updates"),
            (Manager::Apt, "bookworm"),
            (Manager::Pacman, "core"),
        ]
    );

    let base = &repos[0];
    assert!(base.enabled);
    assert!(!base.gpgcheck);
    assert_eq!(base.source.as_deref(), Some("http://mirror.example/base"));
    assert_eq!(base.extra.display_name.as_deref(), Some("Base"));

    let extras = &repos[1];
    assert!(!extras.enabled);
    assert!(extras.gpgcheck && extras.gpgcheck_assumed);
    assert_eq!(extras.source.as_deref(), Some("https://mirror.example/extras"));

    let apt = &repos[3];
    assert_eq!(apt.extra.components, vec!["main", "contrib"]);
    assert!(apt.gpgcheck);

    Ok(())
}

#[test]
fn test_collection_is_repeatable() -> Result<()> {
    let root = Rootfs::new()?;
    root.write("/etc/yum.repos.d/x.repo", "[one]\n[two]\n[three]\n")?;
    root.write(
        "/etc/apt/sources.list.d/extra.list",
        "deb [trusted=yes] http://local/repo ./\ndeb-src https://deb.example/debian bookworm main\n",
    )?;

    let first = collect_repos(root.path(), &mut Diagnostics::new());
    let second = collect_repos(root.path(), &mut Diagnostics::new());
    assert_eq!(first, second);
    assert_eq!(first.len(), 5);

    let trusted = &first[3];
    assert_eq!(trusted.name, "./");
    assert!(!trusted.gpgcheck);
    assert_eq!(first[4].name, "bookworm-src");
    Ok(())
}

#[test]
fn test_deb822_sources_with_signed_by() -> Result<()> {
    let root = Rootfs::new()?;
    root.write(
        "/etc/apt/sources.list.d/debian.sources",
        "Types: deb deb-src\nURIs: https://deb.example/debian\nSuites: bookworm bookworm-updates\nComponents: main\nSigned-By: /usr/share/keyrings/debian-archive-keyring.gpg\n",
    )?;

    let repos = collect_repos(root.path(), &mut Diagnostics::new());
    let names: Vec<&str> = repos.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["bookworm", "bookworm-updates", "bookworm-src", "bookworm-updates-src"]
    );
    assert!(repos.iter().all(|r| r.gpgkey_files
        == vec![PathBuf::from("/usr/share/keyrings/debian-archive-keyring.gpg")]));
    Ok(())
}

#[test]
fn test_pacman_include_resolved_inside_rootfs() -> Result<()> {
    let root = Rootfs::new()?;
    root.write(
        "/etc/pacman.conf",
        "[options]\nSigLevel = Never\n\n[extra]\nInclude = /etc/pacman.d/mirrorlist\n",
    )?;
    root.write(
        "/etc/pacman.d/mirrorlist",
        "#Server = https://disabled.example/$repo\nServer = http://mirror.example/$repo/os/$arch\n",
    )?;

    let repos = collect_repos(root.path(), &mut Diagnostics::new());
    assert_eq!(repos.len(), 1);
    let extra = &repos[0];
    assert!(!extra.gpgcheck);
    assert_eq!(extra.source.as_deref(), Some("http://mirror.example/$repo/os/$arch"));
    assert_eq!(extra.extra.include_servers.len(), 2);
    assert_eq!(extra.extra.includes, vec![root.host("/etc/pacman.d/mirrorlist")]);
    Ok(())
}

#[test]
fn test_pacman_reads_mirrorlist_without_include() -> Result<()> {
    let root = Rootfs::new()?;
    root.write("/etc/pacman.conf", "[options]\nSigLevel = Required\n\n[extra]\n")?;
    root.write(
        "/etc/pacman.d/mirrorlist",
        "## Worldwide\nServer = http://mirror.example/$repo/os/$arch\n",
    )?;

    let mut diags = Diagnostics::new();
    let repos = collect_repos(root.path(), &mut diags);
    assert_eq!(repos.len(), 1);

    let extra = &repos[0];
    assert_eq!(extra.source.as_deref(), Some("http://mirror.example/$repo/os/$arch"));
    assert!(extra.uses_plaintext_transport());
    assert_eq!(
        extra.extra.default_mirrorlist,
        Some(root.host("/etc/pacman.d/mirrorlist"))
    );
    assert_eq!(diags.count(DiagnosticKind::Malformed), 0);
    Ok(())
}

#[test]
fn test_empty_rootfs_yields_nothing_but_diagnostics() -> Result<()> {
    let root = Rootfs::new()?;
    let mut diags = Diagnostics::new();
    let repos = collect_repos(root.path(), &mut diags);

    assert!(repos.is_empty());
    assert!(diags.count(DiagnosticKind::Missing) >= 3);
    assert_eq!(diags.count(DiagnosticKind::Malformed), 0);
    Ok(())
}

#[test]
fn test_malformed_apt_line_skipped_alone() -> Result<()> {
    let root = Rootfs::new()?;
    root.write(
        "/etc/apt/sources.list",
        "deb\nthis is not a source line\ndeb https://deb.example/debian trixie main\n",
    )?;

    let mut diags = Diagnostics::new();
    let repos = collect_repos(root.path(), &mut diags);
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].name, "trixie");
    assert_eq!(diags.count(DiagnosticKind::Malformed), 2);
    Ok(())
}
