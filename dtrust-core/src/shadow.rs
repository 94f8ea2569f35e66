//! PATH shadowing detection
//!
//! Rebuilds the target's executable search path and reports basenames that
//! resolve to more than one distinct file. Identity is (device, inode) after
//! symlink resolution inside the rootfs, so aliases of a single binary (and
//! usr-merged directories) never count as shadowing.

use crate::diagnostics::Diagnostics;
use crate::error::RootfsError;
use crate::hasher::sha256_file_opt;
use crate::rootfs::{read_lines, resolve_within, rooted};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const COLLECTOR: &str = "shadow";

/// Search path used when `etc/environment` does not set one
pub const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

static PATH_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?:export\s+)?PATH\s*=\s*["']?([^"'\n]*)["']?\s*$"#)
        .expect("PATH assignment pattern is valid")
});

/// One basename reachable through several distinct files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShadowGroup {
    pub basename: String,
    /// The file an interactive shell would actually run
    pub first_hit: PathBuf,
    pub first_hit_sha256: Option<String>,
    /// Later files in PATH order, never empty
    pub shadowed: Vec<PathBuf>,
    pub shadowed_sha256: Vec<Option<String>>,
}

impl ShadowGroup {
    /// Some shadowed copy differs from `first_hit` (or could not be hashed)
    pub fn has_divergent_content(&self) -> bool {
        match &self.first_hit_sha256 {
            Some(first) => self
                .shadowed_sha256
                .iter()
                .any(|digest| digest.as_ref() != Some(first)),
            None => true,
        }
    }
}

type FileId = (u64, u64);

struct Candidate {
    display: PathBuf,
    real: PathBuf,
    id: FileId,
}

/// Target-absolute PATH directories in search order
pub fn search_path(rootfs: &Path, diags: &mut Diagnostics) -> Vec<String> {
    let environment = rooted(rootfs, Path::new("/etc/environment"));

    let configured = if environment.is_file() {
        read_lines(&environment, COLLECTOR, diags).and_then(|lines| {
            lines.iter().find_map(|line| {
                PATH_ASSIGNMENT
                    .captures(line)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            })
        })
    } else {
        debug!("No etc/environment, using default PATH");
        None
    };

    let raw = configured.filter(|v| !v.trim().is_empty());
    let from_environment = raw.is_some();
    let raw = raw.unwrap_or_else(|| DEFAULT_PATH.to_string());

    let mut dirs = Vec::new();
    for entry in raw.split(':').map(str::trim).filter(|e| !e.is_empty()) {
        if !entry.starts_with('/') || entry.contains('$') {
            diags.malformed(
                COLLECTOR,
                &environment,
                format!("ignoring PATH entry '{entry}' (not an absolute directory)"),
            );
            continue;
        }
        dirs.push(entry.to_string());
    }

    if dirs.is_empty() && from_environment {
        return DEFAULT_PATH.split(':').map(str::to_string).collect();
    }
    dirs
}

/// Find every basename that maps to two or more distinct real files
///
/// Groups come back sorted by basename. Missing PATH directories are skipped.
pub fn detect_shadowing(rootfs: &Path, diags: &mut Diagnostics) -> Vec<ShadowGroup> {
    let mut seen_dirs: HashSet<FileId> = HashSet::new();
    let mut by_name: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();

    for dir in search_path(rootfs, diags) {
        let dir_path = Path::new(&dir);
        let real_dir = match resolve_within(rootfs, dir_path) {
            Ok(real) => real,
            Err(RootfsError::NotFound { .. }) => {
                debug!("PATH directory {} does not exist", dir);
                continue;
            }
            Err(e) => {
                diags.malformed(COLLECTOR, &rooted(rootfs, dir_path), e.to_string());
                continue;
            }
        };

        let Ok(meta) = fs::metadata(&real_dir) else {
            continue;
        };
        if !meta.is_dir() {
            continue;
        }
        if !seen_dirs.insert((meta.dev(), meta.ino())) {
            debug!("PATH directory {} already scanned via another entry", dir);
            continue;
        }

        let display_dir = rooted(rootfs, dir_path);
        for name in sorted_names(&real_dir, diags) {
            let target = dir_path.join(&name);
            let real = match resolve_within(rootfs, &target) {
                Ok(real) => real,
                Err(e) => {
                    debug!("Skipping {}: {}", target.display(), e);
                    continue;
                }
            };
            let Ok(file_meta) = fs::metadata(&real) else {
                continue;
            };
            if !file_meta.is_file() {
                continue;
            }

            let id = (file_meta.dev(), file_meta.ino());
            let candidates = by_name.entry(name.clone()).or_default();
            if candidates.iter().any(|c| c.id == id) {
                continue;
            }
            candidates.push(Candidate {
                display: display_dir.join(&name),
                real,
                id,
            });
        }
    }

    let groups: Vec<ShadowGroup> = by_name
        .into_iter()
        .filter(|(_, candidates)| candidates.len() > 1)
        .filter_map(|(basename, candidates)| {
            let (first, rest) = candidates.split_first()?;
            Some(ShadowGroup {
                basename,
                first_hit: first.display.clone(),
                first_hit_sha256: sha256_file_opt(&first.real),
                shadowed: rest.iter().map(|c| c.display.clone()).collect(),
                shadowed_sha256: rest.iter().map(|c| sha256_file_opt(&c.real)).collect(),
            })
        })
        .collect();

    info!(
        groups = groups.len(),
        shadowed = groups.iter().map(|g| g.shadowed.len()).sum::<usize>(),
        "PATH shadowing scan complete"
    );
    groups
}

/// UTF-8 entry names of `dir`, sorted
fn sorted_names(dir: &Path, diags: &mut Diagnostics) -> Vec<String> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) => {
            diags.malformed(COLLECTOR, dir, format!("unreadable directory: {e}"));
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    for entry in read_dir.filter_map(|e| e.ok()) {
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => diags.malformed(
                COLLECTOR,
                &dir.join(&raw),
                "file name is not valid UTF-8",
            ),
        }
    }
    names.sort();
    names
}
