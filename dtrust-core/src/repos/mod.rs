//! Package repository configuration, normalized across package managers
//!
//! APT source lists, DNF/YUM `.repo` files and `pacman.conf` all describe the
//! same thing: where software comes from and whether it is signature-checked.
//! Each parser maps its format onto [`RepositoryRecord`], applying the
//! manager's own defaults when a field is absent.

pub mod apt;
pub mod dnf;
pub mod pacman;
pub mod sections;

use crate::diagnostics::Diagnostics;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Package manager that owns a repository definition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Manager {
    Apt,
    Dnf,
    Pacman,
}

impl fmt::Display for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Manager::Apt => "apt",
            Manager::Dnf => "dnf",
            Manager::Pacman => "pacman",
        };
        f.write_str(name)
    }
}

/// One configured software-origin channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryRecord {
    pub manager: Manager,
    pub name: String,
    pub enabled: bool,
    pub gpgcheck: bool,
    /// `gpgcheck` is the manager default rather than something the config states
    #[serde(default)]
    pub gpgcheck_assumed: bool,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub gpgkey_files: Vec<PathBuf>,
    pub origin_file: PathBuf,
    #[serde(default)]
    pub extra: RepoExtra,
}

impl RepositoryRecord {
    /// Source uses a transport without encryption or integrity protection
    pub fn uses_plaintext_transport(&self) -> bool {
        self.source
            .as_deref()
            .map(|s| {
                let s = s.trim().to_ascii_lowercase();
                s.starts_with("http://") || s.starts_with("ftp://")
            })
            .unwrap_or(false)
    }

    fn dedup_key(&self) -> (Manager, PathBuf, String, Option<String>, Option<String>) {
        (
            self.manager,
            self.origin_file.clone(),
            self.name.clone(),
            self.source.clone(),
            self.extra.kind.clone(),
        )
    }
}

/// Manager-specific detail. Every field is optional so readers tolerate
/// records from any manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepoExtra {
    /// APT entry type: `deb` or `deb-src`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    /// Raw APT option text (`arch=amd64 signed-by=...`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
    /// DNF human readable `name=`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub baseurls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirrorlist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metalink: Option<String>,
    /// Effective pacman `SigLevel`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub siglevel: Option<String>,
    /// Pacman `Server=` lines of the section itself
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<String>,
    /// Files pulled in through pacman `Include=`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<PathBuf>,
    /// `Server=` lines (commented or not) found in included files or in
    /// the default mirror list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_servers: Vec<String>,
    /// Pacman default mirror list, read although no section includes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mirrorlist: Option<PathBuf>,
}

/// Parse every supported repository configuration under `rootfs`
///
/// Order is stable: DNF, then APT, then pacman; files sorted by name, records
/// in file order. Duplicates (same manager, file, name, source and kind) are
/// dropped, first occurrence wins.
pub fn collect_repos(rootfs: &Path, diags: &mut Diagnostics) -> Vec<RepositoryRecord> {
    let mut records = Vec::new();
    records.extend(dnf::collect(rootfs, diags));
    records.extend(apt::collect(rootfs, diags));
    records.extend(pacman::collect(rootfs, diags));

    let mut seen = HashSet::new();
    records.retain(|record| seen.insert(record.dedup_key()));

    info!(
        count = records.len(),
        disabled_gpg = records.iter().filter(|r| !r.gpgcheck).count(),
        "Collected repository records"
    );
    records
}
