//! Best-effort bucket teardown (think `rm -rf` on a bucket).
//!
//! Failures do not stop the purge; they are collected in a [`PurgeReport`]
//! so callers decide what matters.

use super::store::Bucket;
use crate::{errors::StoreError, models::listing::ListParams};
use tracing::debug;

/// One step of a purge that did not succeed.
#[derive(Debug)]
pub struct PurgeFailure {
    /// Object key, or the bucket name for listing and bucket removal.
    pub target: String,
    pub error: StoreError,
}

#[derive(Debug, Default)]
pub struct PurgeReport {
    pub deleted: Vec<String>,
    pub bucket_removed: bool,
    pub failures: Vec<PurgeFailure>,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, target: impl Into<String>, error: StoreError) {
        self.failures.push(PurgeFailure {
            target: target.into(),
            error,
        });
    }
}

/// Delete every object in `bucket`, then the bucket itself.
///
/// Lists without a delimiter so nested keys are reached on every backend.
/// Truncated listings are re-issued from the start, since deleted keys no
/// longer appear; the loop ends once a pass deletes nothing.
pub async fn purge_bucket(bucket: &dyn Bucket) -> PurgeReport {
    let mut report = PurgeReport::default();
    let everything = ListParams::new("", "", "", 0);

    loop {
        let listing = match bucket.list(&everything).await {
            Ok(listing) => listing,
            Err(error) => {
                report.fail(bucket.name(), error);
                break;
            }
        };

        let mut progressed = false;
        for entry in listing.contents {
            match bucket.del(&entry.key).await {
                Ok(()) => {
                    report.deleted.push(entry.key);
                    progressed = true;
                }
                Err(error) => report.fail(entry.key, error),
            }
        }
        if !listing.is_truncated || !progressed {
            break;
        }
    }

    match bucket.del_bucket().await {
        Ok(()) => report.bucket_removed = true,
        Err(error) => report.fail(bucket.name(), error),
    }

    debug!(
        bucket = bucket.name(),
        deleted = report.deleted.len(),
        failures = report.failures.len(),
        "bucket purge finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::ErrorKind, services::fs_store::FsStore};

    #[tokio::test]
    async fn purge_removes_nested_objects_and_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = FsStore::new(dir.path()).fs_bucket("scratch");
        bucket.create().await.unwrap();
        for key in ["test.txt", "a/b/test.txt", "a/foo/bar.txt", "a/imina"] {
            bucket.write(key, b"x").await.unwrap();
        }

        let report = purge_bucket(&bucket).await;
        assert!(report.is_clean(), "{:?}", report.failures);
        assert!(report.bucket_removed);
        assert_eq!(report.deleted.len(), 4);
        assert!(!bucket.root().exists());
    }

    #[tokio::test]
    async fn purge_collects_failures_instead_of_stopping() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = FsStore::new(dir.path()).fs_bucket("scratch");
        bucket.write("keep/going", b"x").await.unwrap();
        // An empty directory is not an object, so it survives the purge.
        tokio::fs::create_dir(bucket.root().join("stray")).await.unwrap();

        let report = purge_bucket(&bucket).await;
        assert_eq!(report.deleted, vec!["keep/going".to_string()]);
        assert!(!report.bucket_removed);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].target, "scratch");
        assert_eq!(report.failures[0].error.kind(), ErrorKind::NotEmpty);
    }

    #[tokio::test]
    async fn purge_of_missing_bucket_reports_both_steps() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = FsStore::new(dir.path()).fs_bucket("ghost");

        let report = purge_bucket(&bucket).await;
        assert!(report.deleted.is_empty());
        let kinds: Vec<_> = report.failures.iter().map(|f| f.error.kind()).collect();
        assert_eq!(kinds, vec![ErrorKind::NotFound, ErrorKind::NotFound]);
    }
}
