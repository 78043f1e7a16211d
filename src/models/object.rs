//! Represents an object (file) as reported by a listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single object surfaced in the `Contents` of a listing.
///
/// Carries metadata only; payload bytes are fetched with `get` or
/// `get_stream`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Full object key, including the listed prefix.
    pub key: String,

    /// Size in bytes.
    pub size: u64,

    /// Timestamp when the object was last modified.
    ///
    /// The filesystem backend reports the file's mtime.
    pub last_modified: DateTime<Utc>,

    /// Entity tag reported by the backend, if it computes one.
    pub etag: Option<String>,
}
