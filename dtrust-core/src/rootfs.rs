//! Helpers for working inside a target root filesystem
//!
//! The target may be an offline image mounted somewhere on the host. Paths
//! from its configuration (`/usr/bin`, symlink targets, `Include=` globs) must
//! be interpreted relative to that root, never against the host.

use crate::diagnostics::Diagnostics;
use crate::error::RootfsError;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Maximum symlink hops before resolution gives up (matches Linux MAXSYMLINKS)
pub const MAX_SYMLINK_HOPS: usize = 40;

/// Lexically place a target-absolute path under the rootfs
///
/// `rooted("/mnt/img", "/etc/apt")` is `/mnt/img/etc/apt`. No symlinks are
/// followed; use [`resolve_within`] for that.
pub fn rooted(root: &Path, target: &Path) -> PathBuf {
    let relative: PathBuf = target
        .components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect();
    if relative.as_os_str().is_empty() {
        return root.to_path_buf();
    }
    root.join(relative)
}

/// Resolve `target` as the target system would, confined to `root`
///
/// Absolute symlink targets restart at `root`, `..` never climbs above it,
/// and chains longer than [`MAX_SYMLINK_HOPS`] fail with
/// [`RootfsError::SymlinkLoop`]. Every component must exist.
pub fn resolve_within(root: &Path, target: &Path) -> Result<PathBuf, RootfsError> {
    let mut pending: VecDeque<OsString> = VecDeque::new();
    push_components(&mut pending, target);

    let mut resolved: Vec<OsString> = Vec::new();
    let mut hops = 0usize;

    while let Some(part) = pending.pop_front() {
        if part == ".." {
            resolved.pop();
            continue;
        }

        let candidate = join_all(root, &resolved).join(&part);
        let meta = fs::symlink_metadata(&candidate).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RootfsError::NotFound {
                path: target.to_path_buf(),
            },
            _ => RootfsError::Io {
                path: candidate.clone(),
                source: e,
            },
        })?;

        if !meta.file_type().is_symlink() {
            resolved.push(part);
            continue;
        }

        hops += 1;
        if hops > MAX_SYMLINK_HOPS {
            return Err(RootfsError::SymlinkLoop {
                path: target.to_path_buf(),
            });
        }

        let link = fs::read_link(&candidate).map_err(|e| RootfsError::Io {
            path: candidate.clone(),
            source: e,
        })?;
        if link.is_absolute() {
            resolved.clear();
        }

        let mut link_parts = VecDeque::new();
        push_components(&mut link_parts, &link);
        while let Some(p) = link_parts.pop_back() {
            pending.push_front(p);
        }
    }

    Ok(join_all(root, &resolved))
}

fn push_components(queue: &mut VecDeque<OsString>, path: &Path) {
    for component in path.components() {
        match component {
            Component::Normal(name) => queue.push_back(name.to_os_string()),
            Component::ParentDir => queue.push_back(OsString::from("..")),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
}

fn join_all(root: &Path, parts: &[OsString]) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(parts);
    path
}

/// Read a text file line by line, dropping lines that are not valid UTF-8
///
/// A missing file records a `missing` diagnostic and returns `None`; an
/// unreadable one records `malformed`. Each invalid line is skipped on its
/// own so the rest of the file still contributes.
pub fn read_lines(path: &Path, collector: &str, diags: &mut Diagnostics) -> Option<Vec<String>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            diags.missing(collector, path, "file not present");
            return None;
        }
        Err(e) => {
            diags.malformed(collector, path, format!("unreadable: {e}"));
            return None;
        }
    };

    let mut lines = Vec::new();
    for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        match std::str::from_utf8(raw) {
            Ok(line) => lines.push(line.to_string()),
            Err(_) => diags.malformed(collector, path, format!("line {}: not valid UTF-8", idx + 1)),
        }
    }
    Some(lines)
}

/// Sorted regular-file children of `dir` whose name ends with `suffix`
///
/// A missing directory yields an empty list.
pub fn sorted_files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = read_dir
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(suffix))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}
