//! External package manager boundary
//!
//! Fetching extension code is delegated to an external tool (npm by
//! default). Install and update failures propagate unchanged; the
//! outdated-listing query degrades to an empty report on anything other
//! than its documented exit-code-1 convention.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::{Error, Result};

/// One entry of the outdated-packages report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutdatedPackage {
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub wanted: Option<String>,
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Module name → outdated-package details.
pub type OutdatedReport = BTreeMap<String, OutdatedPackage>;

/// The external package manager collaborator.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Install `module_name` into `cwd`. Failures propagate as-is.
    async fn install(&self, module_name: &str, cwd: &Path) -> Result<()>;

    /// Update all modules installed in `cwd`. Failures propagate as-is.
    async fn update(&self, cwd: &Path) -> Result<()>;

    /// Query outdated modules in `cwd`. Best effort; implementations should
    /// degrade to an empty report rather than failing.
    async fn list_outdated(&self, cwd: &Path) -> Result<OutdatedReport>;
}

/// npm-backed [`PackageManager`].
#[derive(Debug, Clone)]
pub struct NpmPackageManager {
    bin: String,
}

impl NpmPackageManager {
    pub fn new() -> Self {
        Self::with_bin("npm")
    }

    /// Use a different binary in place of `npm`. Useful for tests.
    pub fn with_bin(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(&self, args: &[&str], cwd: &Path) -> Result<()> {
        let command = format!("{} {}", self.bin, args.join(" "));
        tracing::debug!(%command, ?cwd, "Running package manager");

        let status = Command::new(&self.bin)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|_| Error::ExternalTool {
                command: command.clone(),
                exit_code: None,
            })?;

        if !status.success() {
            return Err(Error::ExternalTool {
                command,
                exit_code: status.code(),
            });
        }
        Ok(())
    }
}

impl Default for NpmPackageManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageManager for NpmPackageManager {
    async fn install(&self, module_name: &str, cwd: &Path) -> Result<()> {
        self.run(&["install", module_name], cwd).await
    }

    async fn update(&self, cwd: &Path) -> Result<()> {
        self.run(&["update"], cwd).await
    }

    async fn list_outdated(&self, cwd: &Path) -> Result<OutdatedReport> {
        let command = format!("{} outdated --json", self.bin);
        let output = match Command::new(&self.bin)
            .args(["outdated", "--json"])
            .current_dir(cwd)
            .output()
            .await
        {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(%command, error = %e, "Outdated query failed to spawn");
                return Ok(OutdatedReport::default());
            }
        };

        // Exit code 1 is npm's "outdated packages exist" signal, not an
        // error; anything else non-zero degrades to an empty report.
        let has_results = output.status.success() || output.status.code() == Some(1);
        if !has_results {
            tracing::warn!(%command, code = ?output.status.code(), "Outdated query failed");
            return Ok(OutdatedReport::default());
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(OutdatedReport::default());
        }
        match serde_json::from_slice(&output.stdout) {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::warn!(%command, error = %e, "Unparsable outdated output");
                Ok(OutdatedReport::default())
            }
        }
    }
}
