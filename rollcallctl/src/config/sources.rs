use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub queue: FileQueueConfig,
    #[serde(default)]
    pub scan: FileScanConfig,
    #[serde(default)]
    pub attestation: FileAttestationConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// humantime duration, e.g. `"10s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileQueueConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileScanConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<i64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAttestationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_url: Option<String>,
    pub token: Option<String>,
    pub queue_dir: Option<PathBuf>,
    pub request_timeout: Option<String>,
    pub section_id: Option<i64>,
    pub attestation_enabled: Option<bool>,
    pub attestation_timeout: Option<String>,
    pub beacon_command: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            config_path: var("ROLLCALL_CONFIG").map(PathBuf::from),
            server_url: var("ROLLCALL_SERVER_URL"),
            token: var("ROLLCALL_TOKEN"),
            queue_dir: var("ROLLCALL_QUEUE_DIR").map(PathBuf::from),
            request_timeout: var("ROLLCALL_REQUEST_TIMEOUT"),
            section_id: var("ROLLCALL_SECTION_ID").and_then(|s| s.trim().parse().ok()),
            attestation_enabled: var("ROLLCALL_ATTESTATION_ENABLED")
                .as_deref()
                .and_then(parse_bool),
            attestation_timeout: var("ROLLCALL_ATTESTATION_TIMEOUT"),
            beacon_command: var("ROLLCALL_BEACON_COMMAND"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> EnvConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn reads_rollcall_variables() {
        let env = env(&[
            ("ROLLCALL_SERVER_URL", "https://school.example"),
            ("ROLLCALL_SECTION_ID", " 7 "),
            ("ROLLCALL_ATTESTATION_ENABLED", "Yes"),
            ("ROLLCALL_QUEUE_DIR", "/tmp/rollcall"),
        ]);

        assert_eq!(env.server_url.as_deref(), Some("https://school.example"));
        assert_eq!(env.section_id, Some(7));
        assert_eq!(env.attestation_enabled, Some(true));
        assert_eq!(env.queue_dir, Some(PathBuf::from("/tmp/rollcall")));
        assert!(env.token.is_none());
    }

    #[test]
    fn blank_and_garbage_values_are_unset() {
        let env = env(&[
            ("ROLLCALL_TOKEN", "   "),
            ("ROLLCALL_SECTION_ID", "seven"),
            ("ROLLCALL_ATTESTATION_ENABLED", "maybe"),
        ]);

        assert!(env.token.is_none());
        assert!(env.section_id.is_none());
        assert!(env.attestation_enabled.is_none());
    }

    #[test]
    fn file_config_parses_sections() {
        let parsed: FileConfig = toml::from_str(
            r#"
            [server]
            url = "localhost:8000"
            request_timeout = "5s"

            [scan]
            section_id = 3

            [attestation]
            enabled = true
            command = "beacon-scan --first"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.server.url.as_deref(), Some("localhost:8000"));
        assert_eq!(parsed.scan.section_id, Some(3));
        assert_eq!(parsed.attestation.enabled, Some(true));
        assert!(parsed.queue.dir.is_none());
    }

    #[test]
    fn unknown_top_level_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("[database]\nurl = \"x\"\n").is_err());
    }
}
