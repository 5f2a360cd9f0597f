use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use rollcall_core::SectionId;
use rollcall_core::api::client::{DEFAULT_REQUEST_TIMEOUT, normalize_base_url};
use rollcall_core::attestation::DEFAULT_ATTESTATION_TIMEOUT;
use thiserror::Error;
use tracing::debug;

use super::sources::{EnvConfig, FileConfig};
use super::{AttestationConfig, Config, ConfigMetadata, ConfigWarnings, DEFAULT_SERVER_URL};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["rollcall.toml", "config/rollcall.toml"];

#[derive(Debug, Default, Clone)]
struct ConfigLoaderOptions {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env`, then compose defaults, the TOML file and the process
    /// environment.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path)
                .map(|_| true)
                .or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        if let Some(path) = &self.options.env_file
            && !env_file_loaded
        {
            load.warnings.push_with_hint(
                format!("Environment file {} could not be read", path.display()),
                "Check the --env-file path",
            );
        }
        Ok(load)
    }

    /// Compose a configuration from an already gathered environment.
    pub fn load_with_env(&self, env_config: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env_config)?;
        let (config, warnings) = compose_config(file_config, env_config, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env_config.config_path {
            source.env = Some(from_env.clone());
        } else {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists());
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents = fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
            path: path.clone(),
            source: err,
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    match &config_path {
        Some(path) => debug!(path = %path.display(), "using configuration file"),
        None => debug!("no configuration file; using environment variables and defaults"),
    }

    let FileConfig {
        server: file_server,
        queue: file_queue,
        scan: file_scan,
        attestation: file_attestation,
    } = file_config.unwrap_or_default();

    let raw_url = env.server_url.or(file_server.url);
    if raw_url.is_none() {
        warnings.push_with_hint(
            format!("No server URL configured; defaulting to {DEFAULT_SERVER_URL}"),
            "Set ROLLCALL_SERVER_URL or [server] url",
        );
    }
    let raw_url = raw_url.unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    let server_url =
        normalize_base_url(&raw_url).map_err(|err| ConfigLoadError::InvalidServerUrl {
            value: raw_url.clone(),
            reason: err.to_string(),
        })?;

    let request_timeout = resolve_duration(
        "request_timeout",
        env.request_timeout.or(file_server.request_timeout),
        DEFAULT_REQUEST_TIMEOUT,
    )?;

    let queue_dir = match env.queue_dir.or(file_queue.dir) {
        Some(dir) => dir,
        None => default_queue_dir(&mut warnings),
    };

    let attestation = AttestationConfig {
        enabled: env
            .attestation_enabled
            .or(file_attestation.enabled)
            .unwrap_or(false),
        timeout: resolve_duration(
            "attestation.timeout",
            env.attestation_timeout.or(file_attestation.timeout),
            DEFAULT_ATTESTATION_TIMEOUT,
        )?,
        command: env
            .beacon_command
            .or(file_attestation.command)
            .filter(|command| !command.trim().is_empty()),
    };
    if attestation.enabled && attestation.command.is_none() {
        warnings.push_with_hint(
            "Proximity attestation is enabled but no beacon command is configured",
            "Set ROLLCALL_BEACON_COMMAND or [attestation] command",
        );
    }

    let config = Config {
        server_url,
        token: env.token.or(file_server.token),
        queue_dir,
        request_timeout,
        section_id: env.section_id.or(file_scan.section_id).map(SectionId),
        attestation,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };

    Ok((config, warnings))
}

fn resolve_duration(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(value) => humantime::parse_duration(value.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value,
                source,
            }
        }),
        None => Ok(default),
    }
}

fn default_queue_dir(warnings: &mut ConfigWarnings) -> PathBuf {
    match ProjectDirs::from("", "rollcall", "rollcallctl") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => {
            warnings.push_with_hint(
                "Unable to determine a data directory; queueing under ./.rollcall",
                "Set ROLLCALL_QUEUE_DIR or pass --queue-dir",
            );
            PathBuf::from(".rollcall")
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid server URL '{value}': {reason}")]
    InvalidServerUrl { value: String, reason: String },
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("no session token configured; set ROLLCALL_TOKEN or pass --token")]
    MissingToken,
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        if let Some(path) = &self.default {
            return Some((path.clone(), ConfigPathProvenance::Default));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn is_explicit(self) -> bool {
        matches!(self, ConfigPathProvenance::Explicit | ConfigPathProvenance::Env)
    }
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
