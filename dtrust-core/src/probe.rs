//! Collaborator seam for unsigned-package detection
//!
//! Checking installed packages against their signatures needs the package
//! databases of each manager and lives outside this crate. Implementations
//! plug in through [`UnsignedPackageProbe`]; [`run_probe`] guarantees a
//! failing probe never takes the rest of the report down with it.

use crate::diagnostics::Diagnostics;
use crate::repos::Manager;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::info;

const COLLECTOR: &str = "unsigned";

/// A package installed without a verifiable signature
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnsignedPackage {
    pub name: String,
    pub version: String,
    pub manager: Manager,
    pub reason: String,
}

/// Reports packages installed without verifiable signatures
///
/// Implementations must not fail: on internal errors they return an empty
/// list. A panic is still contained by [`run_probe`].
pub trait UnsignedPackageProbe {
    /// Short identifier used in diagnostics and logs
    fn name(&self) -> &str;

    fn probe(&self, rootfs: &Path) -> Vec<UnsignedPackage>;
}

/// Probe that never reports anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProbe;

impl UnsignedPackageProbe for NoopProbe {
    fn name(&self) -> &str {
        "noop"
    }

    fn probe(&self, _rootfs: &Path) -> Vec<UnsignedPackage> {
        Vec::new()
    }
}

/// Run a probe, turning a panic into an empty list plus a diagnostic
pub fn run_probe(
    probe: &dyn UnsignedPackageProbe,
    rootfs: &Path,
    diags: &mut Diagnostics,
) -> Vec<UnsignedPackage> {
    match panic::catch_unwind(AssertUnwindSafe(|| probe.probe(rootfs))) {
        Ok(packages) => {
            info!(probe = probe.name(), count = packages.len(), "Unsigned package probe finished");
            packages
        }
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "probe panicked".to_string());
            diags.probe_failed(COLLECTOR, format!("{}: {}", probe.name(), detail));
            Vec::new()
        }
    }
}
