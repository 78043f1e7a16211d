//! The object-store contract every backend satisfies.
//!
//! Application code holds an `Arc<dyn ObjectStore>`, asks it for buckets by
//! name and never learns which backend answers.

use crate::{
    errors::StoreResult,
    models::{
        acl::{Acl, PutOptions},
        listing::{ListParams, ListResult},
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

/// Readable handle over an object's payload. Dropping it releases the
/// underlying file or connection.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// A store rooted at one location, handing out bucket handles by name.
pub trait ObjectStore: Send + Sync {
    /// Lightweight handle for `name`. Does not touch the backend.
    fn bucket(&self, name: &str) -> Box<dyn Bucket>;
}

/// Bucket-scoped operations. The bucket identity is implicit in every call.
#[async_trait]
pub trait Bucket: Send + Sync {
    fn name(&self) -> &str;

    /// Create the bucket. Fails with `AlreadyExists` if it is present.
    async fn put_bucket(&self, acl: Acl) -> StoreResult<()>;

    /// Remove the bucket. Fails with `NotEmpty` while objects remain.
    async fn del_bucket(&self) -> StoreResult<()>;

    async fn get(&self, key: &str) -> StoreResult<Bytes>;

    async fn get_stream(&self, key: &str) -> StoreResult<ObjectReader>;

    async fn put(&self, key: &str, data: Bytes, opts: PutOptions) -> StoreResult<()>;

    /// Store exactly `length` bytes read from `reader` under `key`.
    async fn put_stream(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        length: u64,
        opts: PutOptions,
    ) -> StoreResult<()>;

    async fn del(&self, key: &str) -> StoreResult<()>;

    async fn list(&self, params: &ListParams) -> StoreResult<ListResult>;

    /// Address of `key` as understood by this backend.
    fn url(&self, key: &str) -> String;
}
