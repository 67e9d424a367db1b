// ⚙️ Configuration - TOML file with built-in defaults
//
// Resolution order:
// 1. explicit path (`--config`)
// 2. MICRO_MEASURE_CONFIG env var
// 3. built-in defaults
// A path that was named but cannot be read is an error, never a silent fallback.

use crate::entities::Microscope;
use crate::error::ConfigError;
use crate::logging;
use crate::pipeline::ImportConfig;
use crate::validation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_ENV_VAR: &str = "MICRO_MEASURE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,

    /// Directory the ingest command reads when given no paths
    pub watch_dir: PathBuf,

    /// Destination for exports
    pub export_dir: PathBuf,

    /// SQLite mirror; `None` disables mirroring
    pub database: Option<PathBuf>,

    pub import: ImportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: "info".to_string(),
            watch_dir: PathBuf::from("./incoming"),
            export_dir: PathBuf::from("./exports"),
            database: None,
            import: ImportConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&raw, path)
    }

    /// Explicit path, then env var, then defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !logging::is_known_level(&self.log_level) {
            return Err(invalid(
                "log_level",
                format!("'{}' is not one of {}", self.log_level, logging::LOG_LEVELS.join(", ")),
            ));
        }

        if !validation::is_positive_finite(self.import.default_scale) {
            return Err(invalid(
                "import.default_scale",
                format!("must be finite and > 0, got {}", self.import.default_scale),
            ));
        }

        // Same rule a registered microscope must pass
        let candidate = Microscope::new("config", "config", &self.import.default_resolution, 1.0);
        if candidate.dimensions().is_none() {
            return Err(invalid(
                "import.default_resolution",
                format!("'{}' is not WxH", self.import.default_resolution),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.import.default_scale, 10.0);
        assert_eq!(config.import.default_resolution, "1920x1080");
        assert!(config.database.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let raw = r#"
            log_level = "debug"
            database = "/tmp/micro.db"

            [import]
            default_scale = 2.5
        "#;

        let config = AppConfig::from_toml_str(raw, Path::new("inline.toml")).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.database, Some(PathBuf::from("/tmp/micro.db")));
        assert_eq!(config.import.default_scale, 2.5);
        assert_eq!(config.import.default_resolution, "1920x1080");
        assert_eq!(config.watch_dir, PathBuf::from("./incoming"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_scale = AppConfig::from_toml_str("[import]\ndefault_scale = 0.0\n", Path::new("a.toml"));
        assert!(matches!(
            bad_scale,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "import.default_scale"
        ));

        let infinite_scale =
            AppConfig::from_toml_str("[import]\ndefault_scale = inf\n", Path::new("a.toml"));
        assert!(matches!(
            infinite_scale,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "import.default_scale"
        ));

        let bad_resolution =
            AppConfig::from_toml_str("[import]\ndefault_resolution = \"big\"\n", Path::new("a.toml"));
        assert!(matches!(bad_resolution, Err(ConfigError::InvalidValue { .. })));

        let bad_level = AppConfig::from_toml_str("log_level = \"loud\"\n", Path::new("a.toml"));
        assert!(matches!(bad_level, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = AppConfig::from_toml_str("log_level = ", Path::new("broken.toml")).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("micro-measure.toml");
        fs::write(&path, "export_dir = \"out\"\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.export_dir, PathBuf::from("out"));

        let missing = AppConfig::load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
