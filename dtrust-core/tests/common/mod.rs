//! Shared fixtures for integration tests
//!
//! Each test builds a throwaway rootfs under a `TempDir` and points the
//! collectors at it. Paths passed to [`Rootfs`] helpers are target-absolute.

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Minimal 64-bit little-endian ELF header, enough to pass a magic check
pub const ELF_STUB: &[u8] = b"\x7fELF\x02\x01\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00";

/// Path of a file under `tests/fixtures`
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// A fake root filesystem in a temporary directory
pub struct Rootfs {
    dir: TempDir,
}

impl Rootfs {
    pub fn new() -> Result<Self> {
        init_test_logging();
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Host path for a target-absolute path
    pub fn host(&self, target: &str) -> PathBuf {
        self.path().join(target.trim_start_matches('/'))
    }

    pub fn mkdir(&self, target: &str) -> Result<PathBuf> {
        let path = self.host(target);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn write(&self, target: &str, content: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.host(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn write_mode(&self, target: &str, content: impl AsRef<[u8]>, mode: u32) -> Result<PathBuf> {
        let path = self.write(target, content)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(mode))?;
        Ok(path)
    }

    /// Create a symlink at `target` pointing to `link` (written verbatim)
    pub fn symlink(&self, link: &str, target: &str) -> Result<PathBuf> {
        let path = self.host(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        symlink(link, &path)?;
        Ok(path)
    }
}
