use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use scorm_core::CompactionConfig;
use thiserror::Error;

use super::types::{
    AuthConfig, DEFAULT_DATABASE, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT, RawCompactionConfig,
    RawReportingConfig, RawScormConfig, RawServerConfig, RawStorageConfig, ReportingConfig,
    ScormConfig, ServerConfig, StorageConfig,
};

/// Errors loading configuration files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<ScormConfig, ConfigError> {
        let mut layers = Vec::new();
        if let Some(user_path) = Self::user_config_path() {
            layers.push(user_path);
        }
        layers.push(Self::project_config_path());
        Self::load_layers(&layers)
    }

    /// Merge the given files in order; later files win and missing files are skipped
    pub fn load_layers(paths: &[PathBuf]) -> Result<ScormConfig, ConfigError> {
        let mut raw = RawScormConfig::default();
        for path in paths.iter().filter(|p| p.exists()) {
            raw = Self::merge_raw(raw, Self::read(path)?);
        }
        Ok(Self::finalize(raw))
    }

    fn read(path: &Path) -> Result<RawScormConfig, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "scorm").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with SCORM_PROJECT_CONFIG_DIR env var (useful for isolated e2e tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("SCORM_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".scorm/config.toml")
        }
    }

    /// Where the ledger lives when no config names a database
    pub fn default_database_path() -> PathBuf {
        ProjectDirs::from("", "", "scorm")
            .map(|dirs| dirs.data_dir().join(DEFAULT_DATABASE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawScormConfig, overlay: RawScormConfig) -> RawScormConfig {
        RawScormConfig {
            server: RawServerConfig {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
            },
            storage: RawStorageConfig {
                database: overlay.storage.database.or(base.storage.database),
            },
            compaction: RawCompactionConfig {
                enabled: overlay.compaction.enabled.or(base.compaction.enabled),
                interval: overlay.compaction.interval.or(base.compaction.interval),
                budget: overlay.compaction.budget.or(base.compaction.budget),
                field: overlay.compaction.field.or(base.compaction.field),
            },
            reporting: RawReportingConfig {
                grade_endpoint: overlay
                    .reporting
                    .grade_endpoint
                    .or(base.reporting.grade_endpoint),
                receipt_endpoint: overlay
                    .reporting
                    .receipt_endpoint
                    .or(base.reporting.receipt_endpoint),
                timeout: overlay.reporting.timeout.or(base.reporting.timeout),
            },
            auth: AuthConfig {
                admins: {
                    let mut admins = base.auth.admins;
                    admins.extend(overlay.auth.admins);
                    admins
                },
                tokens: {
                    let mut tokens = base.auth.tokens;
                    tokens.extend(overlay.auth.tokens);
                    tokens
                },
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawScormConfig) -> ScormConfig {
        let compaction_defaults = CompactionConfig::default();
        ScormConfig {
            server: ServerConfig {
                host: raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.server.port.unwrap_or(DEFAULT_PORT),
            },
            storage: StorageConfig {
                database: raw
                    .storage
                    .database
                    .unwrap_or_else(Self::default_database_path),
            },
            compaction: CompactionConfig {
                enabled: raw.compaction.enabled.unwrap_or(compaction_defaults.enabled),
                interval: raw
                    .compaction
                    .interval
                    .unwrap_or(compaction_defaults.interval),
                budget: raw.compaction.budget.unwrap_or(compaction_defaults.budget),
                field: raw.compaction.field.unwrap_or(compaction_defaults.field),
            },
            reporting: ReportingConfig {
                grade_endpoint: raw.reporting.grade_endpoint,
                receipt_endpoint: raw.reporting.receipt_endpoint,
                timeout: raw.reporting.timeout.unwrap_or(DEFAULT_TIMEOUT),
            },
            auth: raw.auth,
        }
    }
}
