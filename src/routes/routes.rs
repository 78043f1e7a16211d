//! Routes for the HTTP gateway over a filesystem store.
//!
//! ## Structure
//! - **Bucket-level endpoints**
//!   - `GET    /{bucket}` - list objects (prefix, delimiter, marker, max-keys)
//!   - `PUT    /{bucket}` - create bucket
//!   - `DELETE /{bucket}` - delete an empty bucket
//!
//! - **Object-level endpoints**
//!   - `PUT    /{bucket}/{*key}` - upload object
//!   - `GET    /{bucket}/{*key}` - download object
//!   - `DELETE /{bucket}/{*key}` - delete object
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{
            create_bucket, delete_bucket, delete_object, get_object, list_objects, upload_object,
        },
    },
    services::fs_store::FsStore,
};
use axum::{
    Router,
    routing::{get, put},
};

/// Build the router for bucket, object and health routes.
pub fn routes() -> Router<FsStore> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Object-level routes
        .route(
            "/{bucket}/{*key}",
            put(upload_object).get(get_object).delete(delete_object),
        )
        // Bucket-level routes
        .route(
            "/{bucket}",
            get(list_objects).put(create_bucket).delete(delete_bucket),
        )
}
