//! Pacman repositories from `etc/pacman.conf`
//!
//! Every section except `[options]` is a repository and is always enabled;
//! removing the section is the only way pacman disables one. `SigLevel` in
//! `[options]` is the default for sections that don't set their own.
//!
//! `etc/pacman.d/mirrorlist` is read even when no `Include=` names it. Its
//! servers are then attached to every section without an `Include=`.

use super::sections::{split_sections, Section};
use super::{Manager, RepoExtra, RepositoryRecord};
use crate::diagnostics::Diagnostics;
use crate::rootfs::{read_lines, rooted};
use std::path::{Path, PathBuf};
use tracing::debug;

const COLLECTOR: &str = "repos.pacman";
const OPTIONS_SECTION: &str = "options";
const DEFAULT_MIRRORLIST: &str = "/etc/pacman.d/mirrorlist";

pub fn collect(rootfs: &Path, diags: &mut Diagnostics) -> Vec<RepositoryRecord> {
    let conf = rooted(rootfs, Path::new("/etc/pacman.conf"));
    if !conf.is_file() {
        diags.missing(COLLECTOR, &conf, "no pacman.conf");
        return Vec::new();
    }

    match read_lines(&conf, COLLECTOR, diags) {
        Some(lines) => parse_pacman_conf(&lines.join("\n"), &conf, rootfs, diags),
        None => Vec::new(),
    }
}

/// One record per repository section. `Include=` globs are resolved under
/// `rootfs` and their mirror lines attached to the section's record.
pub fn parse_pacman_conf(
    text: &str,
    origin: &Path,
    rootfs: &Path,
    diags: &mut Diagnostics,
) -> Vec<RepositoryRecord> {
    let sections = split_sections(text);
    let default_siglevel = sections
        .iter()
        .find(|s| s.name == OPTIONS_SECTION)
        .and_then(|s| s.value("SigLevel"));

    let mut records = Vec::new();
    for section in sections.iter().filter(|s| s.name != OPTIONS_SECTION) {
        records.push(section_to_record(
            section,
            origin,
            rootfs,
            default_siglevel.as_deref(),
            diags,
        ));
    }
    attach_default_mirrorlist(&mut records, rootfs, diags);
    records
}

fn attach_default_mirrorlist(
    records: &mut [RepositoryRecord],
    rootfs: &Path,
    diags: &mut Diagnostics,
) {
    let mirrorlist = rooted(rootfs, Path::new(DEFAULT_MIRRORLIST));
    if !mirrorlist.is_file()
        || records.iter().any(|r| r.extra.includes.contains(&mirrorlist))
    {
        return;
    }
    let Some(lines) = read_lines(&mirrorlist, COLLECTOR, diags) else {
        return;
    };

    let servers = extract_servers(&lines);
    if servers.is_empty() {
        return;
    }
    debug!(
        "{} not included by any section, attaching {} server(s)",
        mirrorlist.display(),
        servers.len()
    );

    let first_active = servers
        .iter()
        .find(|(_, commented)| !commented)
        .map(|(server, _)| server.clone());
    for record in records.iter_mut().filter(|r| r.extra.includes.is_empty()) {
        record.extra.default_mirrorlist = Some(mirrorlist.clone());
        record
            .extra
            .include_servers
            .extend(servers.iter().map(|(server, _)| server.clone()));
        if record.source.is_none() {
            record.source = first_active.clone();
        }
    }
}

fn section_to_record(
    section: &Section,
    origin: &Path,
    rootfs: &Path,
    default_siglevel: Option<&str>,
    diags: &mut Diagnostics,
) -> RepositoryRecord {
    let servers = section.values("Server");
    let siglevel = section
        .value("SigLevel")
        .or_else(|| default_siglevel.map(str::to_string));
    let gpgcheck = !siglevel.as_deref().map(siglevel_disables).unwrap_or(false);

    let mut includes = Vec::new();
    for pattern in section.values("Include") {
        includes.extend(expand_include(rootfs, &pattern, diags));
    }

    let mut include_servers = Vec::new();
    let mut first_active_include = None;
    for file in &includes {
        let Some(lines) = read_lines(file, COLLECTOR, diags) else {
            continue;
        };
        for (server, commented) in extract_servers(&lines) {
            if !commented && first_active_include.is_none() {
                first_active_include = Some(server.clone());
            }
            include_servers.push(server);
        }
    }

    let source = servers.first().cloned().or(first_active_include);

    RepositoryRecord {
        manager: Manager::Pacman,
        name: section.name.clone(),
        enabled: true,
        gpgcheck,
        gpgcheck_assumed: siglevel.is_none(),
        source,
        gpgkey_files: Vec::new(),
        origin_file: origin.to_path_buf(),
        extra: RepoExtra {
            siglevel,
            servers,
            includes,
            include_servers,
            ..Default::default()
        },
    }
}

/// `Never` (and `PackageNever`) switch off package signature checking
fn siglevel_disables(siglevel: &str) -> bool {
    siglevel
        .split_whitespace()
        .any(|token| token == "Never" || token == "PackageNever")
}

/// Expand an `Include=` glob under the rootfs, sorted
fn expand_include(rootfs: &Path, pattern: &str, diags: &mut Diagnostics) -> Vec<PathBuf> {
    let Some(root) = rootfs.to_str() else {
        diags.malformed(COLLECTOR, rootfs, "rootfs path is not valid UTF-8; Include skipped");
        return Vec::new();
    };

    let relative = pattern.trim().trim_start_matches('/');
    let full_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(root.trim_end_matches('/')),
        relative
    );

    let mut matches: Vec<PathBuf> = match glob::glob(&full_pattern) {
        Ok(paths) => paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect(),
        Err(e) => {
            diags.malformed(COLLECTOR, Path::new(pattern), format!("bad Include pattern: {e}"));
            return Vec::new();
        }
    };
    matches.sort();

    if matches.is_empty() {
        diags.missing(COLLECTOR, Path::new(pattern), "Include matched no files");
    } else {
        debug!("Include {} matched {} file(s)", pattern, matches.len());
    }
    matches
}

/// `Server=` values from a mirror list, including commented-out ones.
/// Second field is whether the line was commented.
pub fn extract_servers(lines: &[String]) -> Vec<(String, bool)> {
    lines
        .iter()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            let commented = trimmed.starts_with('#');
            let body = trimmed.trim_start_matches('#').trim();
            let (key, value) = body.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("server") {
                return None;
            }
            let value = value.trim();
            (!value.is_empty()).then(|| (value.to_string(), commented))
        })
        .collect()
}
