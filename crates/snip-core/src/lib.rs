//! Core types and traits for the snip URL shortener.
//!
//! This crate provides the types shared by the storage backends and the
//! shortener service: the content-derived [`ShortCode`], the stored
//! [`UrlRecord`], and the repository contract every backend implements.

pub mod derive;
pub mod error;
pub mod owner;
pub mod repository;
pub mod shortcode;

pub use derive::{Deriver, Sha256Deriver};
pub use error::{CoreError, StorageError};
pub use owner::OwnerId;
pub use repository::{ReadRepository, Repository, UrlRecord};
pub use shortcode::ShortCode;
