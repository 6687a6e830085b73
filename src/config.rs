use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics::projection::ProjectionModel;
use crate::sql::Dialect;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TRENDLINE_CONFIG";

/// Most decimal places a result can be rounded to.
pub const MAX_PRECISION: u32 = 12;

/// Defaults applied to every [`crate::MetricQuery`] built from this config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub date_column: String,
    pub column: String,
    pub precision: u32,
    pub fill_value: i64,
    pub dialect: Dialect,
    pub projection_model: ProjectionModel,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            date_column: "created_at".into(),
            column: "id".into(),
            precision: 4,
            fill_value: 0,
            dialect: Dialect::Sqlite,
            projection_model: ProjectionModel::WeightedRate,
        }
    }
}

impl MetricsConfig {
    /// `$TRENDLINE_CONFIG`, else `<config dir>/trendline/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("trendline").join("config.json"))
    }

    /// Load from the default location. A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            Some(path) => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit file. The file must exist and parse.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: MetricsConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.date_column.trim().is_empty() {
            return Err(Error::Config("date_column must not be empty".into()));
        }
        if self.column.trim().is_empty() {
            return Err(Error::Config("column must not be empty".into()));
        }
        if self.precision > MAX_PRECISION {
            return Err(Error::Config(format!(
                "precision {} exceeds {MAX_PRECISION} decimal places",
                self.precision
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = MetricsConfig::default();
        assert_eq!(cfg.date_column, "created_at");
        assert_eq!(cfg.column, "id");
        assert_eq!(cfg.precision, 4);
        assert_eq!(cfg.fill_value, 0);
        assert_eq!(cfg.dialect, Dialect::Sqlite);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"date_column": "updated_at", "dialect": "postgres"}}"#).unwrap();

        let cfg = MetricsConfig::load_from(file.path()).unwrap();
        assert_eq!(cfg.date_column, "updated_at");
        assert_eq!(cfg.dialect, Dialect::Postgres);
        assert_eq!(cfg.precision, 4);
        assert_eq!(cfg.projection_model, ProjectionModel::WeightedRate);
    }

    #[test]
    fn test_load_projection_model() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"projection_model": "decayed_average", "precision": 2}}"#).unwrap();

        let cfg = MetricsConfig::load_from(file.path()).unwrap();
        assert_eq!(cfg.projection_model, ProjectionModel::DecayedAverage);
        assert_eq!(cfg.precision, 2);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = MetricsConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_column_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"column": ""}}"#).unwrap();

        assert!(matches!(
            MetricsConfig::load_from(file.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MetricsConfig::load_from(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
