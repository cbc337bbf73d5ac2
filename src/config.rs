//! Configuration loading
//!
//! 設定は「デフォルト → 設定ファイル → 環境変数」の順に重ねて読み込む。
//!
//! ```toml
//! [log]
//! level = "info"
//! format = "json"
//!
//! [databases.reporting]
//! type = "mssql"
//! host = "sql.internal"
//! user = "report"
//! password = "..."
//! database = "reports"
//! options = { trust_cert = "true" }
//!
//! [databases.local]
//! type = "sqlite"
//! path = "data/local.db"
//! ```
//!
//! Environment variables use the `DBKIT_` prefix and `__` between keys, e.g.
//! `DBKIT_DATABASES__REPORTING__PORT=14330`.

use crate::database::{DatabaseConfig, DatabaseEngine, DatabaseEngineBuilder, DatabaseError};
use crate::error::Result;
use crate::logging::{LogConfig, LogFormat, LogRotation};
use config::{Config, Environment, File, Map};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DbKitConfig {
    #[serde(default)]
    pub log: LogSettings,
    /// 名前付きデータベースプロファイル
    #[serde(default)]
    pub databases: HashMap<String, DatabaseConfig>,
}

/// Logging section of the configuration file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogSettings {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    pub console: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub rotation: LogRotation,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            console: true,
            dir: None,
            rotation: LogRotation::Daily,
        }
    }
}

impl LogSettings {
    pub fn to_log_config(&self) -> LogConfig {
        let mut config = LogConfig::default()
            .with_level(self.level.clone())
            .with_format(self.format)
            .with_console(self.console)
            .with_rotation(self.rotation);
        if let Some(dir) = &self.dir {
            config = config.with_log_dir(dir.clone());
        }
        config
    }
}

impl DbKitConfig {
    /// Load from `dbkit.toml` (if present) and `DBKIT_*` environment variables
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load_from_env().build()
    }

    /// Look up a named database profile
    pub fn database(&self, name: &str) -> std::result::Result<&DatabaseConfig, DatabaseError> {
        self.databases.get(name).ok_or_else(|| {
            DatabaseError::ConfigurationError(format!("Unknown database profile: {}", name))
        })
    }

    /// Build an engine for a named database profile
    pub fn engine(&self, name: &str) -> Result<Arc<dyn DatabaseEngine>> {
        let db = self.database(name)?;
        Ok(DatabaseEngineBuilder::build(db)?)
    }
}

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
    load_env: bool,
    env_source: Option<Map<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_file: None,
            load_env: false,
            env_source: None,
        }
    }

    /// Load configuration from an explicit file; it must exist
    pub fn load_from_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Read variables from `vars` instead of the process environment
    pub fn with_env_vars(mut self, vars: Map<String, String>) -> Self {
        self.load_env = true;
        self.env_source = Some(vars);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<DbKitConfig> {
        let mut builder = Config::builder().add_source(Config::try_from(&DbKitConfig::default())?);

        if let Some(path) = &self.config_file {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        } else {
            builder = builder.add_source(File::with_name("dbkit").required(false));
        }

        if self.load_env {
            builder = builder.add_source(
                Environment::with_prefix("DBKIT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(self.env_source),
            );
        }

        let config: DbKitConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
