//! Run configuration loaded from a YAML file
//!
//! The database password is never stored in the config file; it is read
//! from the `PG_PASSWORD` environment variable (optionally populated from
//! a `.env` file next to the config).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{EtlError, EtlResult};

/// Environment variable carrying the database password
pub const PASSWORD_ENV_VAR: &str = "PG_PASSWORD";

/// Top-level run configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database connection parameters
    pub database: DatabaseConfig,
    /// Source file paths
    pub data: SourcePaths,
}

/// Database connection parameters (password injected separately)
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub dbname: String,
    /// Populated from the environment, never from the file
    #[serde(skip)]
    pub password: String,
}

fn default_port() -> u16 {
    5432
}

impl DatabaseConfig {
    /// Redacted connection description for log output
    pub fn redacted(&self) -> String {
        format!(
            "host={} port={} user={} dbname={}",
            self.host, self.port, self.user, self.dbname
        )
    }
}

// Manual Debug so the password can never leak into logs or error chains.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("dbname", &self.dbname)
            .field("password", &"*****")
            .finish()
    }
}

/// Paths to the two source extracts
#[derive(Debug, Clone, Deserialize)]
pub struct SourcePaths {
    /// Demographics JSON extract
    pub demographic: PathBuf,
    /// Temperature CSV extract
    pub temperature: PathBuf,
}

impl SourcePaths {
    /// All configured source paths, for pre-flight existence checks
    pub fn all(&self) -> [&Path; 2] {
        [&self.demographic, &self.temperature]
    }
}

impl AppConfig {
    /// Load configuration from a YAML file and inject the password from
    /// the environment
    ///
    /// A `.env` file in the current directory is honored when present,
    /// falling back to the process environment.
    pub fn load(path: &Path) -> EtlResult<Self> {
        tracing::debug!(config = %path.display(), "Loading configuration");

        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;

        let mut config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|e| EtlError::Config(format!("invalid YAML in '{}': {}", path.display(), e)))?;

        if dotenvy::dotenv().is_ok() {
            tracing::debug!("Loaded .env file");
        }

        config.database.password = std::env::var(PASSWORD_ENV_VAR).map_err(|_| {
            EtlError::Config(format!("environment variable {} is not set", PASSWORD_ENV_VAR))
        })?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
database:
  host: localhost
  port: 5432
  user: etl
  dbname: warehouse
data:
  demographic: ./data/us-cities-demographics.json
  temperature: ./data/GlobalLandTemperaturesByCity.csv
"#;

    #[test]
    fn test_parse_sample_config() {
        let config: AppConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.dbname, "warehouse");
        assert!(config.database.password.is_empty());
        assert!(
            config
                .data
                .demographic
                .to_string_lossy()
                .ends_with("us-cities-demographics.json")
        );
    }

    #[test]
    fn test_port_defaults_when_absent() {
        let yaml = r#"
database:
  host: db.internal
  user: etl
  dbname: warehouse
data:
  demographic: demo.json
  temperature: temp.csv
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database.port, 5432);
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config: AppConfig = serde_yaml::from_str(SAMPLE).unwrap();
        config.database.password = "secret".to_string();

        let debug = format!("{:?}", config.database);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("*****"));
        assert!(!config.database.redacted().contains("secret"));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = AppConfig::load(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_load_invalid_yaml_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "database: [not, a, mapping]").unwrap();

        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }
}
