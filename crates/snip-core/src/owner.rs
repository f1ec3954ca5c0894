use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Longest owner id, in bytes, that every backend can store.
/// Matches the `user_id VARCHAR(36)` column and a hyphenated UUID.
pub const MAX_OWNER_ID_LEN: usize = 36;

/// Opaque identifier of the client that created a shortened URL.
///
/// The empty owner is reserved for records that predate ownership tracking;
/// see [`OwnerId::is_empty`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for records that were stored without an owner.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
