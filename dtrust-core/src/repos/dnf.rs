//! DNF/YUM `.repo` files under `etc/yum.repos.d`

use super::sections::{split_sections, Section};
use super::{Manager, RepoExtra, RepositoryRecord};
use crate::diagnostics::Diagnostics;
use crate::rootfs::{read_lines, rooted, sorted_files_with_suffix};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

const COLLECTOR: &str = "repos.dnf";

static LIST_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,]+").expect("list separator pattern is valid"));

pub fn collect(rootfs: &Path, diags: &mut Diagnostics) -> Vec<RepositoryRecord> {
    let repo_dir = rooted(rootfs, Path::new("/etc/yum.repos.d"));
    if !repo_dir.is_dir() {
        diags.missing(COLLECTOR, &repo_dir, "no yum.repos.d directory");
        return Vec::new();
    }

    let mut records = Vec::new();
    for file in sorted_files_with_suffix(&repo_dir, ".repo") {
        let Some(lines) = read_lines(&file, COLLECTOR, diags) else {
            continue;
        };
        let parsed = parse_repo_file(&lines.join("\n"), &file);
        debug!("Parsed {} sections from {}", parsed.len(), file.display());
        records.extend(parsed);
    }
    records
}

/// One record per `[section]` of a `.repo` file
pub fn parse_repo_file(text: &str, origin: &Path) -> Vec<RepositoryRecord> {
    split_sections(text)
        .iter()
        .map(|section| section_to_record(section, origin))
        .collect()
}

fn section_to_record(section: &Section, origin: &Path) -> RepositoryRecord {
    let (enabled, _) = flag(section, "enabled");
    let (gpgcheck, gpgcheck_assumed) = flag(section, "gpgcheck");

    let baseurls = section
        .value("baseurl")
        .map(|v| split_list(&v))
        .unwrap_or_default();
    let mirrorlist = section.value("mirrorlist");
    let metalink = section.value("metalink");

    let source = baseurls
        .first()
        .cloned()
        .or_else(|| mirrorlist.clone())
        .or_else(|| metalink.clone());

    let gpgkey_files = section
        .value("gpgkey")
        .map(|v| local_key_files(&v))
        .unwrap_or_default();

    RepositoryRecord {
        manager: Manager::Dnf,
        name: section.name.clone(),
        enabled,
        gpgcheck,
        gpgcheck_assumed,
        source,
        gpgkey_files,
        origin_file: origin.to_path_buf(),
        extra: RepoExtra {
            display_name: section.value("name"),
            baseurls,
            mirrorlist,
            metalink,
            ..Default::default()
        },
    }
}

/// DNF boolean: true unless explicitly off. Second value is whether the
/// default was used.
fn flag(section: &Section, key: &str) -> (bool, bool) {
    match section.value(key) {
        Some(value) => {
            let off = matches!(
                value.to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
            (!off, false)
        }
        None => (true, true),
    }
}

fn split_list(value: &str) -> Vec<String> {
    LIST_SEPARATOR
        .split(value.trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep only `file:` key URIs; network keys are never fetched
fn local_key_files(value: &str) -> Vec<PathBuf> {
    split_list(value)
        .into_iter()
        .filter_map(|part| {
            let path = part
                .strip_prefix("file://")
                .or_else(|| part.strip_prefix("file:"))?;
            (!path.is_empty()).then(|| PathBuf::from(path))
        })
        .collect()
}
