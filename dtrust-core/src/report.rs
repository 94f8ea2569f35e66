//! The versioned report envelope and the assembler that fills it
//!
//! A [`TrustReport`] is the single hand-off point between collection and
//! everything downstream (scoring, rendering). It is built once per scan and
//! not modified afterwards.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::distro::{self, DistroInfo};
use crate::manual::{ManualAreaReport, ManualAreaScanner, ScanDeadline, DEFAULT_AREAS, DEFAULT_SCAN_LIMIT};
use crate::probe::{run_probe, NoopProbe, UnsignedPackage, UnsignedPackageProbe};
use crate::repos::{collect_repos, RepositoryRecord};
use crate::shadow::{detect_shadowing, ShadowGroup};
use crate::SCHEMA_VERSION;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

/// Default wall-clock budget for a whole scan
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(15);

/// Collection depth
///
/// Tier 1 inspects repository configuration only; tier 2 adds unsigned
/// packages, PATH shadowing and manual areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    One,
    Two,
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Tier::One),
            2 => Ok(Tier::Two),
            other => Err(format!("unsupported tier {other} (supported: 1, 2)")),
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::One => 1,
            Tier::Two => 2,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Everything collected about one rootfs at one point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustReport {
    pub schema_version: String,
    pub tier: Tier,
    pub timestamp_utc: DateTime<Utc>,
    pub target_rootfs: PathBuf,
    #[serde(default)]
    pub distro: DistroInfo,
    #[serde(default)]
    pub repos: Vec<RepositoryRecord>,
    #[serde(default)]
    pub unsigned_packages: Vec<UnsignedPackage>,
    #[serde(default)]
    pub path_shadowing: Vec<ShadowGroup>,
    #[serde(default)]
    pub manual_areas: BTreeMap<String, ManualAreaReport>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl TrustReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Any manual area stopped early
    pub fn is_partial(&self) -> bool {
        self.manual_areas.values().any(|area| area.truncated)
    }
}

/// What to scan and how much effort to spend on it
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub rootfs: PathBuf,
    pub tier: Tier,
    /// Entry cap per manual area
    pub scan_limit: usize,
    /// Target-absolute manual install roots
    pub manual_areas: Vec<String>,
    /// `None` disables the deadline
    pub max_duration: Option<Duration>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            rootfs: PathBuf::from("/"),
            tier: Tier::Two,
            scan_limit: DEFAULT_SCAN_LIMIT,
            manual_areas: DEFAULT_AREAS.iter().map(|a| a.to_string()).collect(),
            max_duration: Some(DEFAULT_MAX_DURATION),
        }
    }
}

impl ScanConfig {
    pub fn for_rootfs(rootfs: impl AsRef<Path>) -> Self {
        Self {
            rootfs: rootfs.as_ref().to_path_buf(),
            ..Default::default()
        }
    }
}

/// Runs the collectors for a [`ScanConfig`] and joins their output
pub struct ReportAssembler {
    config: ScanConfig,
    probe: Box<dyn UnsignedPackageProbe>,
}

impl ReportAssembler {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            probe: Box::new(NoopProbe),
        }
    }

    pub fn with_probe(mut self, probe: Box<dyn UnsignedPackageProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Collect everything the tier asks for. Never fails; partial results
    /// are flagged on the report.
    pub fn assemble(&self) -> TrustReport {
        let started = Instant::now();
        let config = &self.config;
        let rootfs = config.rootfs.as_path();
        let mut diags = Diagnostics::new();

        info!(rootfs = %rootfs.display(), tier = %config.tier, "Starting scan");

        let distro = distro::detect(rootfs, &mut diags);
        let repos = collect_repos(rootfs, &mut diags);

        let (unsigned_packages, path_shadowing, manual_areas) = match config.tier {
            Tier::One => (Vec::new(), Vec::new(), BTreeMap::new()),
            Tier::Two => {
                let unsigned = run_probe(self.probe.as_ref(), rootfs, &mut diags);
                let shadowing = detect_shadowing(rootfs, &mut diags);

                let deadline = config
                    .max_duration
                    .map(|budget| deadline_from(started, budget))
                    .unwrap_or_else(ScanDeadline::unbounded);
                let scanner = ManualAreaScanner::new(rootfs, config.scan_limit, deadline, &mut diags);
                let manual = scanner.scan_all(&config.manual_areas, &mut diags);

                (unsigned, shadowing, manual)
            }
        };

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            repos = repos.len(),
            shadow_groups = path_shadowing.len(),
            diagnostics = diags.entries().len(),
            "Scan complete"
        );

        TrustReport {
            schema_version: SCHEMA_VERSION.to_string(),
            tier: config.tier,
            timestamp_utc: now_utc_seconds(),
            target_rootfs: config.rootfs.clone(),
            distro,
            repos,
            unsigned_packages,
            path_shadowing,
            manual_areas,
            diagnostics: diags.into_vec(),
        }
    }
}

/// Deadline measured from scan start, not from when the walk begins
fn deadline_from(started: Instant, budget: Duration) -> ScanDeadline {
    ScanDeadline::after(budget.saturating_sub(started.elapsed()))
}

/// Current UTC time truncated to whole seconds
pub fn now_utc_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}
