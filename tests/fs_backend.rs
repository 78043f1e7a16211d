//! Conformance suite over the `ObjectStore` contract, run against the
//! filesystem backend selected through `open`.

use anyhow::Result;
use bucketfs::{
    Acl, Bucket, ErrorKind, ListParams, ObjectStore, PutOptions, StoreLocation, open,
    purge_bucket,
};
use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempDir;

async fn store() -> Result<(TempDir, Arc<dyn ObjectStore>)> {
    let dir = tempfile::tempdir()?;
    let store = open(&StoreLocation::Filesystem {
        root: dir.path().join("objects"),
    })
    .await?;
    Ok((dir, store))
}

async fn put(bucket: &dyn Bucket, key: &str, body: &str) -> Result<()> {
    bucket
        .put(key, Bytes::from(body.to_string()), PutOptions::default())
        .await?;
    Ok(())
}

async fn expect_empty(bucket: &dyn Bucket) -> Result<()> {
    let listing = bucket.list(&ListParams::new("", "", "", 0)).await?;
    assert!(listing.is_empty(), "left behind: {:?}", listing);
    Ok(())
}

#[tokio::test]
async fn simple_object_lifecycle() -> Result<()> {
    let (_dir, store) = store().await?;
    let bucket = store.bucket("test");
    bucket.put_bucket(Acl::Private).await?;

    put(bucket.as_ref(), "test.txt", "hello there").await?;
    assert_eq!(bucket.get("test.txt").await?, Bytes::from("hello there"));

    let listing = bucket.list(&ListParams::directory("")).await?;
    assert_eq!(listing.keys().collect::<Vec<_>>(), vec!["test.txt"]);
    assert_eq!(listing.contents[0].size, 11);
    assert!(listing.common_prefixes.is_empty());

    bucket.del("test.txt").await?;
    assert_eq!(bucket.get("test.txt").await.unwrap_err().kind(), ErrorKind::NotFound);
    expect_empty(bucket.as_ref()).await?;
    // Asking twice must not resurrect anything.
    expect_empty(bucket.as_ref()).await?;

    bucket.del_bucket().await?;
    Ok(())
}

#[tokio::test]
async fn nested_keys_list_as_a_hierarchy() -> Result<()> {
    let (_dir, store) = store().await?;
    let bucket = store.bucket("test");
    bucket.put_bucket(Acl::Private).await?;

    for key in ["a/b/test.txt", "a/foo/bar.txt", "a/imina", "top.txt"] {
        put(bucket.as_ref(), key, key).await?;
    }

    let level = bucket.list(&ListParams::directory("a/")).await?;
    assert_eq!(level.keys().collect::<Vec<_>>(), vec!["a/imina"]);
    assert_eq!(level.common_prefixes, vec!["a/b/", "a/foo/"]);

    let root = bucket.list(&ListParams::directory("")).await?;
    assert_eq!(root.keys().collect::<Vec<_>>(), vec!["top.txt"]);
    assert_eq!(root.common_prefixes, vec!["a/"]);

    let everything = bucket.list(&ListParams::new("", "", "", 0)).await?;
    assert_eq!(
        everything.keys().collect::<Vec<_>>(),
        vec!["a/b/test.txt", "a/foo/bar.txt", "a/imina", "top.txt"]
    );

    let nothing = bucket.list(&ListParams::directory("never/")).await?;
    assert!(nothing.is_empty());
    assert!(!nothing.is_truncated);

    bucket.del("a/b/test.txt").await?;
    let level = bucket.list(&ListParams::directory("a/")).await?;
    assert_eq!(level.common_prefixes, vec!["a/foo/"]);

    for key in ["a/foo/bar.txt", "a/imina", "top.txt"] {
        bucket.del(key).await?;
    }
    expect_empty(bucket.as_ref()).await?;
    // Pruning reached the top, so the bucket is removable.
    bucket.del_bucket().await?;
    Ok(())
}

#[tokio::test]
async fn unsupported_listings_are_refused() -> Result<()> {
    let (_dir, store) = store().await?;
    let bucket = store.bucket("test");

    for params in [
        ListParams::new("a/", "|", "", 0),
        ListParams::new("a/", "/", "a/b", 0),
        ListParams::new("a", "/", "", 0),
    ] {
        let err = bucket.list(&params).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported, "{:?}", params);
    }
    Ok(())
}

#[tokio::test]
async fn bucket_lifecycle_errors() -> Result<()> {
    let (_dir, store) = store().await?;
    let bucket = store.bucket("photos");

    assert_eq!(bucket.del_bucket().await.unwrap_err().kind(), ErrorKind::NotFound);
    bucket.put_bucket(Acl::PublicRead).await?;
    assert_eq!(
        bucket.put_bucket(Acl::Private).await.unwrap_err().kind(),
        ErrorKind::AlreadyExists
    );

    put(bucket.as_ref(), "2025/img.jpg", "jpeg").await?;
    assert_eq!(bucket.del_bucket().await.unwrap_err().kind(), ErrorKind::NotEmpty);
    Ok(())
}

#[tokio::test]
async fn concurrent_puts_share_a_new_prefix() -> Result<()> {
    let (_dir, store) = store().await?;
    let first = store.bucket("test");
    let second = store.bucket("test");
    first.put_bucket(Acl::Private).await?;

    let (a, b) = tokio::join!(
        put(first.as_ref(), "shared/deep/one", "1"),
        put(second.as_ref(), "shared/deep/two", "2"),
    );
    a?;
    b?;

    let level = first.list(&ListParams::directory("shared/deep/")).await?;
    assert_eq!(
        level.keys().collect::<Vec<_>>(),
        vec!["shared/deep/one", "shared/deep/two"]
    );
    Ok(())
}

#[tokio::test]
async fn purge_empties_and_removes_a_bucket() -> Result<()> {
    let (_dir, store) = store().await?;
    let bucket = store.bucket("scratch");
    bucket.put_bucket(Acl::Private).await?;
    for key in ["x", "y/z", "y/w/v"] {
        put(bucket.as_ref(), key, "data").await?;
    }

    let report = purge_bucket(bucket.as_ref()).await;
    assert!(report.is_clean(), "{:?}", report.failures);
    assert!(report.bucket_removed);
    assert_eq!(report.deleted.len(), 3);

    assert_eq!(
        bucket.list(&ListParams::directory("")).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    Ok(())
}

#[tokio::test]
async fn remote_locations_need_the_s3_feature() -> Result<()> {
    if cfg!(feature = "s3") {
        return Ok(());
    }
    let remote = StoreLocation::Remote {
        region: Some("eu-west-1".into()),
        endpoint: None,
    };
    let Err(err) = open(&remote).await else {
        panic!("remote store opened without the s3 feature");
    };
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    Ok(())
}
