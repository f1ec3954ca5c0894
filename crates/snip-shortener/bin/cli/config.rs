use crate::cli::GlobalArgs;
use anyhow::{bail, Context};
use serde::Deserialize;
use snip_storage::config::{DEFAULT_FILE_STORAGE_PATH, DEFAULT_MAX_CONNECTIONS};
use snip_storage::StorageConfig;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Contents of the optional JSON config file.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub database_dsn: Option<String>,
    #[serde(default)]
    pub file_storage_path: Option<PathBuf>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Effective settings after merging flags, environment, config file and
/// defaults, in that order of precedence.
#[derive(Debug)]
pub struct Settings {
    pub storage: StorageConfig,
    pub base_url: String,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs) -> anyhow::Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    fn merge(args: &GlobalArgs, file: FileConfig) -> anyhow::Result<Self> {
        let file_storage_path = args
            .file_storage_path
            .clone()
            .or(file.file_storage_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_STORAGE_PATH));
        let max_connections = args
            .max_connections
            .or(file.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if max_connections == 0 {
            bail!("max connections must be at least 1");
        }
        let base_url = args
            .base_url
            .clone()
            .or(file.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = normalize_base_url(&base_url)?;

        let storage = match args.database_dsn.clone().or(file.database_dsn) {
            Some(dsn) => StorageConfig::builder()
                .database_dsn(dsn)
                .file_storage_path(file_storage_path)
                .max_connections(max_connections)
                .build(),
            None => StorageConfig::builder()
                .file_storage_path(file_storage_path)
                .max_connections(max_connections)
                .build(),
        };

        Ok(Self { storage, base_url })
    }
}

/// Checks that `base_url` is an absolute http(s) URL and trims trailing `/`.
fn normalize_base_url(base_url: &str) -> anyhow::Result<String> {
    let Some((scheme, rest)) = base_url.split_once("://") else {
        bail!("base url must be absolute: {base_url}");
    };
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        bail!("base url scheme must be http or https: {base_url}");
    }
    if rest.trim_start_matches('/').is_empty() || rest.starts_with('/') {
        bail!("base url must have a host: {base_url}");
    }

    Ok(base_url.trim_end_matches('/').to_string())
}
