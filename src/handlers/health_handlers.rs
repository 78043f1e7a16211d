//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks disk I/O under the store root

use crate::services::{fs_store::FsStore, path_mapper};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use tokio::fs;

const PROBE: &[u8] = b"readyz";

/// `GET /healthz`
///
/// Liveness probe. Never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Performs a write/read/delete against the store root. HTTP 200 when the
/// probe passes, HTTP 503 otherwise.
pub async fn readyz(State(store): State<FsStore>) -> impl IntoResponse {
    let disk = probe_disk(store.root()).await;
    let ok = disk.ok;

    let mut checks = HashMap::new();
    checks.insert("disk", disk);

    let body = ReadyResponse {
        status: if ok { "ok".into() } else { "error".into() },
        checks,
    };
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// Scratch file for the disk check. Staging names are never valid bucket
/// names, so the probe cannot shadow a bucket directory.
fn probe_path(root: &Path) -> PathBuf {
    root.join(path_mapper::staging_name())
}

async fn probe_disk(root: &Path) -> CheckStatus {
    let tmp_path = probe_path(root);
    if let Err(e) = fs::write(&tmp_path, PROBE).await {
        return CheckStatus::failed(format!("could not write tmp file: {}", e));
    }
    let read = fs::read(&tmp_path).await;
    let removed = fs::remove_file(&tmp_path).await;
    match (read, removed) {
        (Ok(bytes), _) if bytes != PROBE => CheckStatus::failed("file content mismatch".into()),
        (Ok(_), Ok(())) => CheckStatus {
            ok: true,
            error: None,
        },
        (Ok(_), Err(e)) => CheckStatus {
            ok: true,
            error: Some(format!("could not remove tmp file: {}", e)),
        },
        (Err(e), _) => CheckStatus::failed(format!("could not read tmp file: {}", e)),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disk_probe_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let check = probe_disk(dir.path()).await;
        assert!(check.ok);
        assert!(check.error.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn disk_probe_file_is_never_a_bucket_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = probe_path(dir.path());
        let name = path.file_name().unwrap().to_str().unwrap();

        let store = FsStore::new(dir.path());
        let err = store.fs_bucket(name).create().await.unwrap_err();
        assert!(
            matches!(err, crate::errors::StoreError::InvalidBucketName(_)),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn disk_probe_fails_without_a_root() {
        let dir = tempfile::tempdir().unwrap();
        let check = probe_disk(&dir.path().join("missing")).await;
        assert!(!check.ok);
        assert!(check.error.unwrap().starts_with("could not write"));
    }
}
