//! Turns a [`TrustReport`] into a 0-100 trust score
//!
//! Scoring is a pure function of the report and the weights. Every deduction
//! is listed as a [`Penalty`] so a reader can recompute the score by hand:
//! `round(clamp(100 + sum(values), floor, 100))`.

mod weights;

pub use weights::{TierTable, TierWeights, WeightConfig, DEFAULT_FLOOR};

use crate::report::TrustReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyCategory {
    RepoGpgcheck,
    RepoTransport,
    UnsignedPackages,
    PathShadowing,
    ManualWorldWritable,
    ManualElf,
}

impl fmt::Display for PenaltyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PenaltyCategory::RepoGpgcheck => "repo_gpgcheck",
            PenaltyCategory::RepoTransport => "repo_transport",
            PenaltyCategory::UnsignedPackages => "unsigned_packages",
            PenaltyCategory::PathShadowing => "path_shadowing",
            PenaltyCategory::ManualWorldWritable => "manual_world_writable",
            PenaltyCategory::ManualElf => "manual_elf",
        };
        f.write_str(name)
    }
}

/// A single deduction; `value` is always negative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
    pub category: PenaltyCategory,
    pub reason: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: u8,
    pub floor: u8,
    pub penalties: Vec<Penalty>,
    pub signals: BTreeMap<String, u64>,
}

impl ScoreResult {
    pub fn total_penalty(&self) -> f64 {
        self.penalties.iter().map(|p| p.value).sum()
    }

    /// Score implied by the listed penalties
    pub fn recompute(&self) -> u8 {
        clamp_score(self.total_penalty(), self.floor)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// `round(clamp(100 + total, floor, 100))`
pub fn clamp_score(total_penalty: f64, floor: u8) -> u8 {
    let floor = f64::from(floor.min(100));
    let raw = 100.0 + total_penalty;
    let raw = if raw.is_nan() { floor } else { raw };
    raw.clamp(floor, 100.0).round() as u8
}

/// Score a report with the weights for its tier
pub fn score(report: &TrustReport, weights: &WeightConfig) -> ScoreResult {
    let w = weights.for_tier(report.tier);
    let floor = weights.effective_floor();
    let mut ledger = Ledger::default();

    // Repositories
    let mut repo_budget = w.repo_cap.map(amount);
    for repo in &report.repos {
        if !repo.gpgcheck {
            ledger.push_budgeted(
                &mut repo_budget,
                PenaltyCategory::RepoGpgcheck,
                amount(w.repo_gpgcheck_disabled_penalty),
                format!("{} repo '{}' has signature checking disabled", repo.manager, repo.name),
            );
        }
        if repo.uses_plaintext_transport() {
            ledger.push_budgeted(
                &mut repo_budget,
                PenaltyCategory::RepoTransport,
                amount(w.repo_plaintext_transport_penalty),
                format!(
                    "{} repo '{}' uses plaintext transport ({})",
                    repo.manager,
                    repo.name,
                    repo.source.as_deref().unwrap_or_default()
                ),
            );
        }
    }

    // Unsigned packages
    let unsigned = report.unsigned_packages.len() as u64;
    if unsigned > 0 {
        ledger.push(
            PenaltyCategory::UnsignedPackages,
            capped(unsigned, w.unsigned_per_package_penalty, w.unsigned_cap),
            format!("{unsigned} installed package(s) without a verifiable signature"),
        );
    }

    // PATH shadowing
    let groups = report.path_shadowing.len() as u64;
    let shadowed_bins: u64 = report
        .path_shadowing
        .iter()
        .map(|g| g.shadowed.len() as u64)
        .sum();
    if shadowed_bins > 0 {
        ledger.push(
            PenaltyCategory::PathShadowing,
            capped(shadowed_bins, w.shadowing_per_bin_penalty, w.shadowing_cap),
            format!("{shadowed_bins} shadowed binary path(s) across {groups} command name(s)"),
        );
    }

    // Manual areas
    let elf_threshold = w.manual_elf_threshold;
    for (area, area_report) in &report.manual_areas {
        let writable = area_report.stats.world_writable;
        if writable > 0 {
            ledger.push(
                PenaltyCategory::ManualWorldWritable,
                capped(
                    writable,
                    w.manual_world_writable_per_file_penalty,
                    w.manual_world_writable_cap,
                ),
                format!("{area} contains {writable} world-writable file(s)"),
            );
        }
        let elf = area_report.stats.elf_binaries;
        if elf > elf_threshold {
            ledger.push(
                PenaltyCategory::ManualElf,
                amount(w.manual_elf_penalty),
                format!("{area} contains {elf} ELF binaries (threshold {elf_threshold})"),
            );
        }
    }

    let score = clamp_score(ledger.total(), floor);
    debug!(score, penalties = ledger.penalties.len(), tier = %report.tier, "Scored report");

    ScoreResult {
        score,
        floor,
        penalties: ledger.penalties,
        signals: signals(report),
    }
}

#[derive(Default)]
struct Ledger {
    penalties: Vec<Penalty>,
}

impl Ledger {
    fn push(&mut self, category: PenaltyCategory, magnitude: f64, reason: String) {
        if magnitude <= 0.0 {
            return;
        }
        self.penalties.push(Penalty {
            category,
            reason,
            value: -magnitude,
        });
    }

    /// Push against a shared cap; `None` budget means uncapped
    fn push_budgeted(
        &mut self,
        budget: &mut Option<f64>,
        category: PenaltyCategory,
        magnitude: f64,
        reason: String,
    ) {
        let magnitude = match budget {
            Some(remaining) => {
                let granted = magnitude.min(*remaining);
                *remaining -= granted;
                granted
            }
            None => magnitude,
        };
        self.push(category, magnitude, reason);
    }

    fn total(&self) -> f64 {
        self.penalties.iter().map(|p| p.value).sum()
    }
}

/// Non-negative, finite magnitude of a configured weight
fn amount(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

fn capped(count: u64, per_unit: f64, cap: Option<f64>) -> f64 {
    let total = count as f64 * amount(per_unit);
    match cap {
        Some(cap) => total.min(amount(cap)),
        None => total,
    }
}

fn signals(report: &TrustReport) -> BTreeMap<String, u64> {
    let mut signals = BTreeMap::new();
    let mut put = |key: &str, value: usize| {
        signals.insert(key.to_string(), value as u64);
    };

    put("repos_total", report.repos.len());
    put("repos_enabled", report.repos.iter().filter(|r| r.enabled).count());
    put(
        "repos_gpgcheck_disabled",
        report.repos.iter().filter(|r| !r.gpgcheck).count(),
    );
    put(
        "repos_plaintext",
        report.repos.iter().filter(|r| r.uses_plaintext_transport()).count(),
    );
    put("unsigned_packages", report.unsigned_packages.len());
    put("shadow_groups", report.path_shadowing.len());
    put(
        "shadow_bin_paths",
        report.path_shadowing.iter().map(|g| g.shadowed.len()).sum(),
    );
    put(
        "shadow_divergent_groups",
        report
            .path_shadowing
            .iter()
            .filter(|g| g.has_divergent_content())
            .count(),
    );
    put(
        "manual_world_writable",
        report
            .manual_areas
            .values()
            .map(|a| a.stats.world_writable as usize)
            .sum(),
    );
    put(
        "manual_elf_binaries",
        report
            .manual_areas
            .values()
            .map(|a| a.stats.elf_binaries as usize)
            .sum(),
    );
    put(
        "manual_truncated_areas",
        report.manual_areas.values().filter(|a| a.truncated).count(),
    );
    signals
}
