//! Bucket/object storage over a local directory tree, behind the same
//! contract a remote S3-compatible service satisfies.
//!
//! Keys are `/`-delimited paths under a bucket directory. Intermediate
//! directories appear on put and are pruned on delete, so the tree never
//! holds empty directories that no object needs.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use config::StoreLocation;
pub use errors::{ErrorKind, StoreError, StoreResult};
pub use models::{
    acl::{Acl, PutOptions},
    listing::{ListParams, ListResult},
    object::ObjectEntry,
};
pub use services::{
    cleanup::{PurgeReport, purge_bucket},
    fs_store::{FsBucket, FsStore},
    open,
    store::{Bucket, ObjectReader, ObjectStore},
};
