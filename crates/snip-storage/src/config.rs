use std::path::PathBuf;
use typed_builder::TypedBuilder;

pub const DEFAULT_FILE_STORAGE_PATH: &str = "/tmp/short-url-db.json";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Settings used by [`Backend::from_config`][crate::Backend::from_config] to
/// pick and build a storage backend.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StorageConfig {
    /// PostgreSQL connection string. When set, the relational backend is used
    /// and `file_storage_path` is ignored.
    #[builder(default, setter(strip_option))]
    pub database_dsn: Option<String>,
    /// Record log backing the in-memory backend.
    #[builder(default = PathBuf::from(DEFAULT_FILE_STORAGE_PATH), setter(into))]
    pub file_storage_path: PathBuf,
    /// Upper bound of the PostgreSQL connection pool.
    #[builder(default = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
}

impl StorageConfig {
    /// Returns the DSN if it is set and not blank.
    pub fn database_dsn(&self) -> Option<&str> {
        self.database_dsn
            .as_deref()
            .map(str::trim)
            .filter(|dsn| !dsn.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = StorageConfig::builder().build();
        assert_eq!(config.database_dsn(), None);
        assert_eq!(
            config.file_storage_path,
            PathBuf::from(DEFAULT_FILE_STORAGE_PATH)
        );
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn blank_dsn_counts_as_unset() {
        let config = StorageConfig::builder().database_dsn("  ".to_string()).build();
        assert_eq!(config.database_dsn(), None);
    }
}
