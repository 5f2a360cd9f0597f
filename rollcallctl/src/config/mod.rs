pub mod loader;
pub mod sources;

use std::path::PathBuf;
use std::time::Duration;

use rollcall_core::SectionId;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub token: Option<String>,
    pub queue_dir: PathBuf,
    pub request_timeout: Duration,
    /// Section preselected for scans and manual marks.
    pub section_id: Option<SectionId>,
    pub attestation: AttestationConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// The session credential, or a configuration error if none is set.
    pub fn require_token(&self) -> Result<&str, ConfigLoadError> {
        self.token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigLoadError::MissingToken)
    }

    /// Apply command-line flags, which win over every other source.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.server_url {
            self.server_url = url;
        }
        if let Some(token) = overrides.token {
            self.token = Some(token);
        }
        if let Some(dir) = overrides.queue_dir {
            self.queue_dir = dir;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationConfig {
    /// Operator consent; discovery never runs unless this is set.
    pub enabled: bool,
    pub timeout: Duration,
    pub command: Option<String>,
}

/// Where the configuration came from, for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub token: Option<String>,
    pub queue_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}
