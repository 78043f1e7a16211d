//! Listing query parameters and results.

use super::object::ObjectEntry;
use serde::{Deserialize, Serialize};

/// Parameters of a prefix-scoped listing.
///
/// `max_keys == 0` means "no limit". An empty `delimiter` asks for every key
/// under `prefix`, at any depth.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ListParams {
    pub prefix: String,
    pub delimiter: String,
    pub marker: String,
    pub max_keys: usize,
}

impl ListParams {
    pub fn new(
        prefix: impl Into<String>,
        delimiter: impl Into<String>,
        marker: impl Into<String>,
        max_keys: usize,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: delimiter.into(),
            marker: marker.into(),
            max_keys,
        }
    }

    /// One level of the hierarchy below `prefix`, unbounded.
    pub fn directory(prefix: impl Into<String>) -> Self {
        Self::new(prefix, "/", "", 0)
    }
}

/// Snapshot produced by a listing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ListResult {
    /// The query this result answers.
    pub params: ListParams,

    /// True iff more entries exist beyond `params.max_keys`.
    pub is_truncated: bool,

    /// Objects matched by the query.
    pub contents: Vec<ObjectEntry>,

    /// Virtual subdirectories, each ending in the delimiter.
    pub common_prefixes: Vec<String>,
}

impl ListResult {
    pub fn empty(params: ListParams) -> Self {
        Self {
            params,
            is_truncated: false,
            contents: Vec::new(),
            common_prefixes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty() && self.common_prefixes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.contents.iter().map(|entry| entry.key.as_str())
    }
}
