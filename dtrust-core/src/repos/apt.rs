//! APT sources: one-line `.list` entries and deb822 `.sources` stanzas
//!
//! APT's trust model lives in keyrings, not in the source line, so
//! `gpgcheck` is `true` by default and marked as assumed. Only an explicit
//! `trusted=yes` turns it off.

use super::{Manager, RepoExtra, RepositoryRecord};
use crate::diagnostics::Diagnostics;
use crate::rootfs::{read_lines, rooted, sorted_files_with_suffix};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const COLLECTOR: &str = "repos.apt";

static DEB_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(deb(?:-src)?)\s+(?:\[([^\]]*)\]\s+)?(\S+)\s+(\S+)(?:\s+(.*))?$")
        .expect("deb line pattern is valid")
});

pub fn collect(rootfs: &Path, diags: &mut Diagnostics) -> Vec<RepositoryRecord> {
    let sources_list = rooted(rootfs, Path::new("/etc/apt/sources.list"));
    let sources_dir = rooted(rootfs, Path::new("/etc/apt/sources.list.d"));

    let mut records = Vec::new();

    let mut list_files = Vec::new();
    if sources_list.is_file() {
        list_files.push(sources_list);
    } else {
        diags.missing(COLLECTOR, &sources_list, "no sources.list");
    }
    list_files.extend(sorted_files_with_suffix(&sources_dir, ".list"));

    for file in &list_files {
        if let Some(lines) = read_lines(file, COLLECTOR, diags) {
            records.extend(parse_list_lines(&lines, file, diags));
        }
    }

    for file in sorted_files_with_suffix(&sources_dir, ".sources") {
        if let Some(lines) = read_lines(&file, COLLECTOR, diags) {
            records.extend(parse_deb822(&lines, &file, diags));
        }
    }

    records
}

/// One record per `deb`/`deb-src` line; comments and blanks skipped
pub fn parse_list_lines(
    lines: &[String],
    origin: &Path,
    diags: &mut Diagnostics,
) -> Vec<RepositoryRecord> {
    let mut records = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some(caps) = DEB_LINE.captures(line) else {
            diags.malformed(COLLECTOR, origin, format!("line {}: not a deb entry", idx + 1));
            continue;
        };

        let kind = caps[1].to_string();
        let options = caps.get(2).map(|m| m.as_str().trim().to_string());
        let url = caps[3].to_string();
        let suite = caps[4].to_string();
        let components = caps
            .get(5)
            .map(|m| strip_trailing_comment(m.as_str()))
            .unwrap_or_default();

        let parsed = options.as_deref().map(parse_options).unwrap_or_default();
        let (gpgcheck, gpgcheck_assumed) = trust_from(parsed.get("trusted").map(String::as_str));
        let gpgkey_files = parsed
            .get("signed-by")
            .map(|v| key_paths(v.split(',')))
            .unwrap_or_default();

        records.push(RepositoryRecord {
            manager: Manager::Apt,
            name: record_name(&suite, &kind),
            enabled: true,
            gpgcheck,
            gpgcheck_assumed,
            source: Some(url),
            gpgkey_files,
            origin_file: origin.to_path_buf(),
            extra: RepoExtra {
                kind: Some(kind),
                components,
                options: options.filter(|o| !o.is_empty()),
                ..Default::default()
            },
        });
    }

    records
}

/// deb822 stanzas: one record per (type, URI, suite) combination
pub fn parse_deb822(
    lines: &[String],
    origin: &Path,
    diags: &mut Diagnostics,
) -> Vec<RepositoryRecord> {
    let mut records = Vec::new();

    for (start_line, stanza) in deb822_stanzas(lines) {
        let field = |name: &str| stanza.get(&name.to_ascii_lowercase()).map(String::as_str);
        let words = |name: &str| -> Vec<String> {
            field(name)
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default()
        };

        let types = words("Types");
        let uris = words("URIs");
        let suites = words("Suites");
        if types.is_empty() || uris.is_empty() || suites.is_empty() {
            diags.malformed(
                COLLECTOR,
                origin,
                format!("stanza at line {start_line}: missing Types, URIs or Suites"),
            );
            continue;
        }

        let enabled = !matches!(
            field("Enabled").map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("no") | Some("false") | Some("0")
        );
        let (gpgcheck, gpgcheck_assumed) = trust_from(field("Trusted"));
        let gpgkey_files = field("Signed-By")
            .map(|v| key_paths(v.split_whitespace()))
            .unwrap_or_default();
        let components = words("Components");

        for kind in types.iter().filter(|t| *t == "deb" || *t == "deb-src") {
            for uri in &uris {
                for suite in &suites {
                    records.push(RepositoryRecord {
                        manager: Manager::Apt,
                        name: record_name(suite, kind),
                        enabled,
                        gpgcheck,
                        gpgcheck_assumed,
                        source: Some(uri.clone()),
                        gpgkey_files: gpgkey_files.clone(),
                        origin_file: origin.to_path_buf(),
                        extra: RepoExtra {
                            kind: Some(kind.clone()),
                            components: components.clone(),
                            ..Default::default()
                        },
                    });
                }
            }
        }
    }

    records
}

/// Group deb822 lines into stanzas of lowercased field name -> value.
/// Continuation lines (leading whitespace) extend the previous field.
fn deb822_stanzas(lines: &[String]) -> Vec<(usize, HashMap<String, String>)> {
    let mut stanzas = Vec::new();
    let mut current: HashMap<String, String> = HashMap::new();
    let mut current_start = 0usize;
    let mut last_key: Option<String> = None;

    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                stanzas.push((current_start, std::mem::take(&mut current)));
            }
            last_key = None;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        if line.starts_with([' ', '\t']) {
            if let Some(value) = last_key.as_ref().and_then(|k| current.get_mut(k)) {
                value.push('\n');
                value.push_str(line.trim());
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            if current.is_empty() {
                current_start = idx + 1;
            }
            let key = key.trim().to_ascii_lowercase();
            current.insert(key.clone(), value.trim().to_string());
            last_key = Some(key);
        }
    }
    if !current.is_empty() {
        stanzas.push((current_start, current));
    }

    stanzas
}

/// `key=value` pairs from the bracketed option block; `arch+=` style
/// modifiers are folded onto the bare key
fn parse_options(options: &str) -> HashMap<String, String> {
    options
        .split_whitespace()
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| {
            let key = key.trim_end_matches(['+', '-']).to_ascii_lowercase();
            (key, value.to_string())
        })
        .collect()
}

/// `(gpgcheck, assumed)` from an APT `trusted` value
fn trust_from(trusted: Option<&str>) -> (bool, bool) {
    match trusted.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "yes" || v == "true" => (false, false),
        Some(v) if v == "no" || v == "false" => (true, false),
        _ => (true, true),
    }
}

/// Signed-By may name keyring files or carry fingerprints / inline keys;
/// only absolute paths are key files
fn key_paths<'a>(values: impl Iterator<Item = &'a str>) -> Vec<PathBuf> {
    values
        .map(str::trim)
        .filter(|v| v.starts_with('/'))
        .map(PathBuf::from)
        .collect()
}

fn strip_trailing_comment(components: &str) -> Vec<String> {
    let without_comment = components.split('#').next().unwrap_or_default();
    without_comment.split_whitespace().map(str::to_string).collect()
}

fn record_name(suite: &str, kind: &str) -> String {
    if kind == "deb-src" {
        format!("{suite}-src")
    } else {
        suite.to_string()
    }
}
