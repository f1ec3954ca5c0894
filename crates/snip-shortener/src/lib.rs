//! URL shortener service implementation.
//!
//! This crate provides the service layer on top of the storage contract:
//! content-derived shortening, resolution with tombstone checks, per-owner
//! listing, and asynchronous soft-delete through a background worker.
//! Core types are re-exported from `snip_core`.

pub mod deleter;
pub mod error;
pub mod service;
pub mod shortener;

pub use deleter::{DeletionQueue, DeletionTask, DeletionWorker};
pub use error::ShortenerError;
pub use service::ShortenerService;
pub use shortener::{BatchRequest, BatchResponse, ShortenOutcome, Shortener};
pub use snip_core::{OwnerId, ShortCode, UrlRecord};
