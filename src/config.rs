//! Mapping configuration and its TOML loader.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings that shape how entities are mapped onto records.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Whether cross-store entity types may be registered.
    pub cross_store: bool,
    /// Whether default store-side names are qualified by the declaring type.
    pub qualify_property_names: bool,
    /// Default index for indexed node fields.
    pub node_index: String,
    /// Default index for indexed relationship fields.
    pub relationship_index: String,
    /// Index holding foreign identity bindings of cross-store entities.
    pub foreign_id_index: String,
    /// Property recording the concrete entity type on each record.
    pub type_property: String,
    /// Index listing records under every type of their lineage.
    pub type_index: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            cross_store: false,
            qualify_property_names: true,
            node_index: "node".into(),
            relationship_index: "relationship".into(),
            foreign_id_index: "foreign-ids".into(),
            type_property: "__type__".into(),
            type_index: "__types__".into(),
        }
    }
}

impl MappingConfig {
    /// Defaults with cross-store entities enabled.
    pub fn cross_store() -> Self {
        Self {
            cross_store: true,
            ..Self::default()
        }
    }

    /// Enables or disables cross-store entity types.
    pub fn with_cross_store(mut self, enabled: bool) -> Self {
        self.cross_store = enabled;
        self
    }

    /// Enables or disables type-qualified default store names.
    pub fn qualify_property_names(mut self, enabled: bool) -> Self {
        self.qualify_property_names = enabled;
        self
    }

    /// Sets the default node index.
    pub fn node_index(mut self, name: impl Into<String>) -> Self {
        self.node_index = name.into();
        self
    }

    /// Sets the default relationship index.
    pub fn relationship_index(mut self, name: impl Into<String>) -> Self {
        self.relationship_index = name.into();
        self
    }

    /// Sets the foreign identity index.
    pub fn foreign_id_index(mut self, name: impl Into<String>) -> Self {
        self.foreign_id_index = name.into();
        self
    }

    /// Loads configuration from `explicit`, falling back to the default
    /// location. A missing file yields the defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        match explicit.or_else(default_config_path) {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Reads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }
}

/// Errors raised while loading configuration or schema manifests.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// File is not valid TOML for the expected shape.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
    /// Configuration could not be rendered.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Underlying TOML error.
        source: toml::ser::Error,
    },
    /// A manifest entry is inconsistent.
    #[error("invalid manifest entry '{entry}': {message}")]
    InvalidManifest {
        /// Entity or field the problem was found in.
        entry: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Location of the per-user mapping configuration.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("umbra").join("mapping.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_files_keep_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cross_store = true\nnode_index = \"people\"").unwrap();

        let config = MappingConfig::from_file(file.path()).unwrap();
        assert!(config.cross_store);
        assert_eq!(config.node_index, "people");
        assert_eq!(config.relationship_index, "relationship");
        assert!(config.qualify_property_names);
    }

    #[test]
    fn missing_explicit_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MappingConfig::load(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, MappingConfig::default());
    }

    #[test]
    fn malformed_files_report_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cross_store = \"sometimes\"").unwrap();
        let err = MappingConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn renders_back_to_toml() {
        let rendered = MappingConfig::cross_store().to_toml().unwrap();
        let parsed: MappingConfig = toml::from_str(&rendered).unwrap();
        assert!(parsed.cross_store);
    }
}
