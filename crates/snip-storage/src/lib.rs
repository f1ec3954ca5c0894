//! Storage backends for the snip URL shortener.
//!
//! Two implementations of the [`Repository`] contract live here:
//! [`InMemoryRepository`], made durable by an append-only [`RecordLog`], and
//! [`PostgresRepository`]. [`Backend`] picks one from a [`StorageConfig`].

pub mod backend;
pub mod config;
pub mod log;
pub mod memory;
pub mod postgres;

pub use backend::Backend;
pub use config::StorageConfig;
pub use log::{LogEntry, RecordLog, ReplayStats};
pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
pub use snip_core::{OwnerId, ReadRepository, Repository, ShortCode, StorageError, UrlRecord};
