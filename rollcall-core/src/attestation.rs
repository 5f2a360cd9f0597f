//! Proximity attestation.
//!
//! A lecture scan may carry the id of a nearby classroom beacon. Discovery
//! is strictly best-effort: whatever goes wrong, the scan proceeds without
//! a beacon and the failure is only logged.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::AttestationError;
use crate::types::BeaconId;

/// Default upper bound on one discovery attempt.
pub const DEFAULT_ATTESTATION_TIMEOUT: Duration = Duration::from_secs(3);

#[async_trait]
pub trait BeaconScanner: Send + Sync + fmt::Debug {
    /// Look for a nearby beacon and return its id.
    async fn discover(&self) -> Result<BeaconId, AttestationError>;
}

/// Discovers beacons by running an external command.
///
/// The first non-empty line the command prints is taken as the beacon id.
/// The child is killed if the caller stops waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBeaconScanner {
    program: String,
    args: Vec<String>,
}

impl CommandBeaconScanner {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a configured command line on whitespace. No shell quoting.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl BeaconScanner for CommandBeaconScanner {
    async fn discover(&self) -> Result<BeaconId, AttestationError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(AttestationError::Spawn)?;

        if !output.status.success() {
            return Err(AttestationError::Exit(output.status.code().unwrap_or(-1)));
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .find_map(BeaconId::new)
            .ok_or(AttestationError::NotFound)
    }
}

/// Scanner plus the time budget for one attempt.
#[derive(Debug, Clone)]
pub struct Attestation {
    scanner: Arc<dyn BeaconScanner>,
    timeout: Duration,
}

impl Attestation {
    pub fn new(scanner: Arc<dyn BeaconScanner>, timeout: Duration) -> Self {
        Self { scanner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn attest(&self) -> Option<BeaconId> {
        attest(self.scanner.as_ref(), self.timeout).await
    }
}

/// Run one bounded discovery. Every failure becomes `None`.
pub async fn attest(scanner: &dyn BeaconScanner, timeout: Duration) -> Option<BeaconId> {
    match tokio::time::timeout(timeout, scanner.discover()).await {
        Ok(Ok(beacon)) => {
            debug!(beacon = %beacon, "proximity beacon attached");
            Some(beacon)
        }
        Ok(Err(err)) => {
            debug!(error = %err, "proximity attestation skipped");
            None
        }
        Err(_) => {
            debug!(error = %AttestationError::TimedOut, ?timeout, "proximity attestation skipped");
            None
        }
    }
}
