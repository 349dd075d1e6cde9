//! # Store Configuration
//!
//! Which database and collection a session opens, and how. The defaults are
//! the fixed constants in [`crate::storage::schema`]; hosts normally only set
//! `path` (native) or `open_timeout`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::storage::schema;

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database identifier
    pub database_name: String,
    /// Schema version the database is opened at
    pub schema_version: u32,
    /// Name of the single collection
    pub collection: String,
    /// Database file for the SQLite backend (None for in-memory)
    pub path: Option<String>,
    /// Give up on an open that has not completed after this long
    #[serde(with = "duration_millis")]
    pub open_timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_name: schema::DATABASE_NAME.to_string(),
            schema_version: schema::SCHEMA_VERSION,
            collection: schema::COLLECTION_NAME.to_string(),
            path: None,
            open_timeout: None,
        }
    }
}

impl StoreConfig {
    /// Configuration backed by a database file.
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no backend can honour.
    ///
    /// The collection name doubles as a SQL table name, so it is restricted
    /// to ASCII identifiers.
    pub fn validate(&self) -> Result<()> {
        if self.database_name.trim().is_empty() {
            return Err(Error::InvalidConfig("database name is empty".into()));
        }
        if self.schema_version == 0 {
            return Err(Error::InvalidConfig("schema version must be >= 1".into()));
        }
        if !schema::is_valid_collection_name(&self.collection) {
            return Err(Error::InvalidConfig(format!(
                "collection name '{}' must be an ASCII identifier",
                self.collection
            )));
        }
        if self.open_timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig("open timeout must be non-zero".into()));
        }
        Ok(())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_schema() {
        let config = StoreConfig::default();
        assert_eq!(config.database_name, "offline_storage_db");
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.collection, "files");
        assert!(config.path.is_none());
        assert!(config.open_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = StoreConfig::from_json(r#"{ "path": "/tmp/files.db", "open_timeout": 1500 }"#)
            .unwrap();
        assert_eq!(config.path.as_deref(), Some("/tmp/files.db"));
        assert_eq!(config.open_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.collection, "files");
    }

    #[test]
    fn test_rejects_bad_collection_name() {
        let config = StoreConfig {
            collection: "files; DROP TABLE x".into(),
            ..StoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_version() {
        let result = StoreConfig::from_json(r#"{ "schema_version": 0 }"#);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
