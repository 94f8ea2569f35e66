//! Inventory of manual install areas (`/usr/local`, `/opt`)
//!
//! Software here lives outside package-manager control. The walk never
//! follows symlinks and is bounded by an entry limit and a cooperative
//! deadline; when either trips, the partial result is returned with
//! `truncated` set and stats that match exactly what was visited.

use crate::diagnostics::Diagnostics;
use crate::error::RootfsError;
use crate::rootfs::{read_lines, resolve_within, rooted};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, FileType, Metadata};
use std::io::Read;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use walkdir::WalkDir;

const COLLECTOR: &str = "manual";

/// Default cap on visited entries (files and directories) per area
pub const DEFAULT_SCAN_LIMIT: usize = 6000;

/// Areas scanned when the caller does not configure any
pub const DEFAULT_AREAS: [&str; 2] = ["/usr/local", "/opt"];

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Symlink,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Permission bits as four octal digits, e.g. `0755`
    pub mode: String,
    /// `user:group`, numeric where the target has no name for the id
    pub owner: String,
    pub size: u64,
    pub is_elf: bool,
    pub world_writable: bool,
    pub mtime_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AreaStats {
    pub files: u64,
    pub dirs: u64,
    pub world_writable: u64,
    pub elf_binaries: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    EntryLimit,
    Deadline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManualAreaReport {
    pub root: PathBuf,
    #[serde(default = "default_exists")]
    pub exists: bool,
    pub entries: Vec<FileEntry>,
    pub stats: AreaStats,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub truncation_reason: Option<TruncationReason>,
}

fn default_exists() -> bool {
    true
}

impl ManualAreaReport {
    fn new(root: PathBuf, exists: bool) -> Self {
        Self {
            root,
            exists,
            entries: Vec::new(),
            stats: AreaStats::default(),
            truncated: false,
            truncation_reason: None,
        }
    }

    fn record(&mut self, entry: FileEntry) {
        self.stats.files += 1;
        if entry.world_writable {
            self.stats.world_writable += 1;
        }
        if entry.is_elf {
            self.stats.elf_binaries += 1;
        }
        self.entries.push(entry);
    }

    fn truncate(&mut self, reason: TruncationReason) {
        self.truncated = true;
        self.truncation_reason = Some(reason);
    }
}

/// Cooperative time budget shared by a scan
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanDeadline {
    at: Option<Instant>,
}

impl ScanDeadline {
    /// No time limit
    pub fn unbounded() -> Self {
        Self { at: None }
    }

    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
        }
    }

    pub fn expired(&self) -> bool {
        self.at.map(|at| Instant::now() >= at).unwrap_or(false)
    }
}

/// uid/gid -> name tables read from the target's own account files
#[derive(Debug, Clone, Default)]
pub struct OwnerNames {
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
}

impl OwnerNames {
    pub fn load(rootfs: &Path, diags: &mut Diagnostics) -> Self {
        Self {
            users: load_id_table(&rooted(rootfs, Path::new("/etc/passwd")), diags),
            groups: load_id_table(&rooted(rootfs, Path::new("/etc/group")), diags),
        }
    }

    pub fn owner(&self, uid: u32, gid: u32) -> String {
        let user = self.users.get(&uid).cloned().unwrap_or_else(|| uid.to_string());
        let group = self.groups.get(&gid).cloned().unwrap_or_else(|| gid.to_string());
        format!("{user}:{group}")
    }
}

/// `name:x:id:...` lines (passwd and group share the first three fields)
fn load_id_table(path: &Path, diags: &mut Diagnostics) -> HashMap<u32, String> {
    let Some(lines) = read_lines(path, COLLECTOR, diags) else {
        return HashMap::new();
    };

    let mut table = HashMap::new();
    for line in lines.iter().filter(|l| !l.trim().is_empty() && !l.starts_with('#')) {
        let mut fields = line.split(':');
        let (Some(name), Some(_), Some(id)) = (fields.next(), fields.next(), fields.next()) else {
            continue;
        };
        if let Ok(id) = id.trim().parse::<u32>() {
            table.entry(id).or_insert_with(|| name.to_string());
        }
    }
    table
}

/// Bounded walker for manual install areas of one rootfs
#[derive(Debug, Clone)]
pub struct ManualAreaScanner {
    rootfs: PathBuf,
    limit: usize,
    deadline: ScanDeadline,
    owners: OwnerNames,
}

impl ManualAreaScanner {
    pub fn new(rootfs: &Path, limit: usize, deadline: ScanDeadline, diags: &mut Diagnostics) -> Self {
        Self {
            rootfs: rootfs.to_path_buf(),
            limit,
            deadline,
            owners: OwnerNames::load(rootfs, diags),
        }
    }

    /// Scan every area, keyed by its target path
    pub fn scan_all<S: AsRef<str>>(
        &self,
        areas: &[S],
        diags: &mut Diagnostics,
    ) -> BTreeMap<String, ManualAreaReport> {
        areas
            .iter()
            .map(|area| {
                let area = area.as_ref();
                (area.to_string(), self.scan_area(area, diags))
            })
            .collect()
    }

    /// Walk one area (a target-absolute path such as `/opt`)
    pub fn scan_area(&self, area: &str, diags: &mut Diagnostics) -> ManualAreaReport {
        let area_path = Path::new(area);
        let display_root = rooted(&self.rootfs, area_path);

        let real_root = match resolve_within(&self.rootfs, area_path) {
            Ok(real) if real.is_dir() => real,
            Ok(_) | Err(RootfsError::NotFound { .. }) => {
                diags.missing(COLLECTOR, &display_root, "area not present");
                return ManualAreaReport::new(display_root, false);
            }
            Err(e) => {
                diags.malformed(COLLECTOR, &display_root, e.to_string());
                return ManualAreaReport::new(display_root, false);
            }
        };

        let mut report = ManualAreaReport::new(display_root.clone(), true);
        let mut visited = 0usize;

        let walker = WalkDir::new(&real_root)
            .follow_links(false)
            .sort_by_file_name()
            .min_depth(1);

        for item in walker {
            if visited >= self.limit {
                report.truncate(TruncationReason::EntryLimit);
                diags.exhausted(
                    COLLECTOR,
                    &display_root,
                    format!("entry limit of {} reached", self.limit),
                );
                break;
            }
            if self.deadline.expired() {
                report.truncate(TruncationReason::Deadline);
                diags.exhausted(COLLECTOR, &display_root, "scan deadline reached");
                break;
            }

            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| display_root.clone());
                    diags.malformed(COLLECTOR, &path, e.to_string());
                    continue;
                }
            };
            visited += 1;

            let file_type = entry.file_type();
            if file_type.is_dir() {
                report.stats.dirs += 1;
                continue;
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    diags.malformed(COLLECTOR, entry.path(), e.to_string());
                    continue;
                }
            };

            let display = entry
                .path()
                .strip_prefix(&real_root)
                .map(|rel| display_root.join(rel))
                .unwrap_or_else(|_| entry.path().to_path_buf());

            report.record(self.describe(display, entry.path(), file_type, &meta));
        }

        info!(
            area,
            files = report.stats.files,
            dirs = report.stats.dirs,
            world_writable = report.stats.world_writable,
            elf = report.stats.elf_binaries,
            truncated = report.truncated,
            "Manual area scanned"
        );
        report
    }

    fn describe(&self, display: PathBuf, real: &Path, file_type: FileType, meta: &Metadata) -> FileEntry {
        let mode = meta.mode() & 0o7777;
        let kind = if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        };

        // Symlink permission bits are always 0777 and meaningless.
        let is_regular = kind == EntryKind::File;

        FileEntry {
            path: display,
            kind,
            mode: format!("{mode:04o}"),
            owner: self.owners.owner(meta.uid(), meta.gid()),
            size: meta.len(),
            is_elf: is_regular && is_elf(real),
            world_writable: is_regular && mode & 0o002 != 0,
            mtime_utc: DateTime::from_timestamp(meta.mtime(), 0),
        }
    }
}

/// First four bytes are the ELF magic number
pub fn is_elf(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    match File::open(path).and_then(|mut f| f.read_exact(&mut magic)) {
        Ok(()) => magic == ELF_MAGIC,
        Err(e) => {
            debug!("Could not read magic of {}: {}", path.display(), e);
            false
        }
    }
}
