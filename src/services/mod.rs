//! Object-store backends and the contract they share.

pub mod cleanup;
pub mod fs_store;
pub mod path_mapper;
#[cfg(feature = "s3")]
pub mod s3_store;
pub mod store;

use crate::{config::StoreLocation, errors::StoreResult};
use std::sync::Arc;
use store::ObjectStore;

/// Construct the backend described by `location`.
///
/// Selection happens once, here; callers only ever see the trait object.
pub async fn open(location: &StoreLocation) -> StoreResult<Arc<dyn ObjectStore>> {
    match location {
        StoreLocation::Filesystem { root } => {
            tracing::debug!("opening filesystem store at {}", root.display());
            Ok(Arc::new(fs_store::FsStore::new(root.clone())))
        }
        #[cfg(feature = "s3")]
        StoreLocation::Remote { region, endpoint } => {
            tracing::debug!(?region, ?endpoint, "opening remote store");
            Ok(Arc::new(
                s3_store::S3Store::connect(region.clone(), endpoint.clone()).await,
            ))
        }
        #[cfg(not(feature = "s3"))]
        StoreLocation::Remote { .. } => Err(crate::errors::StoreError::Unsupported(
            "remote stores need the `s3` feature".into(),
        )),
    }
}
