//! Image existence oracle
//!
//! The pipeline never talks to a container registry itself. It asks an
//! [`ImageInspector`] whether a reference is retrievable; the production
//! implementation shells out to `skopeo inspect --raw docker://<ref>` and
//! reads the exit status.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{HarvestError, Result};

/// Default per-invocation timeout
pub const DEFAULT_INSPECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default inspection tool
pub const DEFAULT_INSPECT_COMMAND: &str = "skopeo";

/// Answers "can this image reference be pulled"
#[async_trait]
pub trait ImageInspector: Send + Sync {
    /// `Ok(())` when `reference` is retrievable.
    ///
    /// Implementations bound their own run time; any error means "not
    /// retrievable" to the caller.
    async fn inspect(&self, reference: &str) -> Result<()>;

    /// Backend identifier for logging
    fn name(&self) -> &str;
}

/// Inspector backed by the `skopeo` command-line tool
#[derive(Debug, Clone)]
pub struct SkopeoInspector {
    program: String,
    timeout: Duration,
}

impl Default for SkopeoInspector {
    fn default() -> Self {
        Self::new(DEFAULT_INSPECT_COMMAND, DEFAULT_INSPECT_TIMEOUT)
    }
}

impl SkopeoInspector {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn transport_ref(reference: &str) -> String {
        format!("docker://{reference}")
    }
}

#[async_trait]
impl ImageInspector for SkopeoInspector {
    async fn inspect(&self, reference: &str) -> Result<()> {
        debug!("Inspecting image {} via {}", reference, self.program);

        let child = Command::new(&self.program)
            .arg("inspect")
            .arg("--raw")
            .arg(Self::transport_ref(reference))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HarvestError::Inspect(format!("failed to spawn {}: {e}", self.program)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                HarvestError::Inspect(format!(
                    "inspection of {reference} timed out after {:?}",
                    self.timeout
                ))
            })??;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(HarvestError::Inspect(format!(
                "{} exited with {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )))
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Inspector that reports every reference as retrievable without any I/O
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunInspector;

#[async_trait]
impl ImageInspector for DryRunInspector {
    async fn inspect(&self, reference: &str) -> Result<()> {
        info!("Inspector dry_run: assuming {} is pullable", reference);
        Ok(())
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
