//! dtrust core - collection, normalization and scoring of software-origin trust signals
//!
//! The pipeline runs one way:
//!
//! ```text
//! repos / shadow / manual / probe  ->  report::ReportAssembler  ->  score::score
//! ```
//!
//! Every collector tolerates missing and malformed input. Fallbacks are
//! recorded as [`diagnostics::Diagnostic`] entries on the report instead of
//! being raised to the caller.

pub mod diagnostics;
pub mod distro;
pub mod error;
pub mod hasher;
pub mod manual;
pub mod probe;
pub mod repos;
pub mod report;
pub mod rootfs;
pub mod score;
pub mod shadow;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{RootfsError, WeightsError};
pub use manual::{ManualAreaReport, ManualAreaScanner};
pub use probe::{NoopProbe, UnsignedPackage, UnsignedPackageProbe};
pub use repos::{Manager, RepositoryRecord};
pub use report::{ReportAssembler, ScanConfig, Tier, TrustReport};
pub use score::{score, ScoreResult, WeightConfig};
pub use shadow::ShadowGroup;

/// Report schema version, bumped on any incompatible field change
pub const SCHEMA_VERSION: &str = "3.0.0";
