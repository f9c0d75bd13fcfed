use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use scorm_core::CompactionConfig;
use serde::{Deserialize, Serialize};

/// Default port for the scorm server
pub const DEFAULT_PORT: u16 = 7433;
/// Default host for the scorm server
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// File name of the ledger database inside the data directory
pub const DEFAULT_DATABASE: &str = "scorm.db";
/// Transport timeout for grade, receipt and exam requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawScormConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub storage: RawStorageConfig,

    #[serde(default)]
    pub compaction: RawCompactionConfig,

    #[serde(default)]
    pub reporting: RawReportingConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawStorageConfig {
    /// Path of the SQLite ledger
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCompactionConfig {
    pub enabled: Option<bool>,
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub budget: Option<Duration>,
    pub field: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawReportingConfig {
    pub grade_endpoint: Option<String>,
    pub receipt_endpoint: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScormConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub compaction: CompactionConfig,
    pub reporting: ReportingConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Where outcome submissions are posted; logged only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_endpoint: Option<String>,
    /// Where completion receipts are posted; logged only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_endpoint: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            grade_endpoint: None,
            receipt_endpoint: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Session tokens the server accepts, mapped to the user they belong to
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Users allowed to dispatch reporting tasks
    #[serde(default)]
    pub admins: BTreeSet<String>,
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_config_partial_parsing() {
        let toml_str = r#"
[server]
port = 9000

[compaction]
interval = "5m"
"#;
        let raw: RawScormConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(raw.server.port, Some(9000));
        assert!(raw.server.host.is_none());
        assert_eq!(raw.compaction.interval, Some(Duration::from_secs(300)));
        assert!(raw.compaction.budget.is_none());
        assert!(raw.reporting.timeout.is_none());
    }

    #[test]
    fn test_raw_config_empty_uses_none() {
        let raw: RawScormConfig = toml::from_str("").unwrap();

        assert!(raw.server.port.is_none());
        assert!(raw.storage.database.is_none());
        assert!(raw.compaction.enabled.is_none());
        assert!(raw.auth.tokens.is_empty());
    }

    #[test]
    fn test_auth_tokens_parse() {
        let toml_str = r#"
[auth.tokens]
"secret-1" = "alice"
"secret-2" = "bob"
"#;
        let raw: RawScormConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(raw.auth.tokens.len(), 2);
        assert_eq!(raw.auth.tokens["secret-1"], "alice");
    }
}
