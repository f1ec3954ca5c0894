use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DATABASE_DSN_ENV: &str = "SNIP_DATABASE_DSN";
pub const FILE_STORAGE_PATH_ENV: &str = "SNIP_FILE_STORAGE_PATH";
pub const BASE_URL_ENV: &str = "SNIP_BASE_URL";
pub const MAX_CONNECTIONS_ENV: &str = "SNIP_MAX_CONNECTIONS";
pub const CONFIG_ENV: &str = "SNIP_CONFIG";
pub const LOG_FORMAT_ENV: &str = "SNIP_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "snip", about = "Content-addressed URL shortener")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
///
/// Storage and base URL settings are optional here so that a config file can
/// fill in whatever neither a flag nor the environment set.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// PostgreSQL DSN. Selects the relational backend when set.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV, global = true)]
    pub database_dsn: Option<String>,

    /// Record log used by the in-memory backend.
    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV, global = true)]
    pub file_storage_path: Option<PathBuf>,

    /// Upper bound on pooled PostgreSQL connections.
    #[arg(
        long,
        env = MAX_CONNECTIONS_ENV,
        value_parser = clap::value_parser!(u32).range(1..),
        global = true
    )]
    pub max_connections: Option<u32>,

    /// Prefix for printed short URLs.
    #[arg(short = 'b', long, env = BASE_URL_ENV, global = true)]
    pub base_url: Option<String>,

    /// JSON config file merged under flags and environment.
    #[arg(short = 'c', long, env = CONFIG_ENV, global = true)]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten a single URL.
    Shorten {
        url: String,
        /// Owner of the new record. A random id is used when omitted.
        #[arg(long)]
        owner: Option<String>,
    },
    /// Shorten every URL in a JSON file of `{correlation_id, original_url}`.
    Batch {
        file: PathBuf,
        #[arg(long)]
        owner: String,
    },
    /// Print the original URL behind a short code.
    Resolve { code: String },
    /// List the active URLs of an owner.
    List {
        #[arg(long)]
        owner: String,
    },
    /// Soft-delete short codes owned by an owner.
    Delete {
        #[arg(long)]
        owner: String,
        #[arg(required = true)]
        codes: Vec<String>,
    },
    /// Check that the storage backend is reachable.
    Ping,
}
