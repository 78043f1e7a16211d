//! Remote object-store backend over `aws-sdk-s3`.
//!
//! A pass-through: every call is forwarded to the service as-is, and only
//! the service's error codes are translated into [`StoreError`] kinds.
//! Markers, arbitrary delimiters and ACLs are all honoured natively.

use super::store::{Bucket, ObjectReader, ObjectStore};
use crate::{
    errors::{StoreError, StoreResult},
    models::{
        acl::{Acl, PutOptions},
        listing::{ListParams, ListResult},
        object::ObjectEntry,
    },
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{
    Client,
    error::{ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
    types::{
        BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl,
    },
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{fmt, io};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

const DEFAULT_REGION: &str = "us-east-1";

/// A connection to an S3-compatible service.
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Load credentials from the environment, optionally pinning the region
    /// and pointing at a custom (path-style) endpoint.
    pub async fn connect(region: Option<String>, endpoint: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        if let Some(endpoint) = endpoint.as_deref() {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(endpoint.is_some())
            .build();
        Self::from_client(Client::from_conf(config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl ObjectStore for S3Store {
    fn bucket(&self, name: &str) -> Box<dyn Bucket> {
        Box::new(S3Bucket {
            client: self.client.clone(),
            name: name.to_string(),
        })
    }
}

pub struct S3Bucket {
    client: Client,
    name: String,
}

impl S3Bucket {
    fn region(&self) -> &str {
        self.client
            .config()
            .region()
            .map(|region| region.as_ref())
            .unwrap_or(DEFAULT_REGION)
    }
}

#[async_trait]
impl Bucket for S3Bucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put_bucket(&self, acl: Acl) -> StoreResult<()> {
        let mut request = self
            .client
            .create_bucket()
            .bucket(&self.name)
            .acl(bucket_acl(acl));
        if self.region() != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|err| classify(err, &self.name))?;
        debug!(bucket = %self.name, "S3 bucket created");
        Ok(())
    }

    async fn del_bucket(&self) -> StoreResult<()> {
        self.client
            .delete_bucket()
            .bucket(&self.name)
            .send()
            .await
            .map_err(|err| classify(err, &self.name))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.name)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(err, key))?;
        let body = resp.body.collect().await.map_err(io::Error::other)?;
        Ok(body.into_bytes())
    }

    async fn get_stream(&self, key: &str) -> StoreResult<ObjectReader> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.name)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(err, key))?;
        Ok(Box::new(Box::pin(resp.body.into_async_read())))
    }

    async fn put(&self, key: &str, data: Bytes, opts: PutOptions) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.name)
            .key(key)
            .body(ByteStream::from(data))
            .set_content_type(opts.content_type)
            .acl(object_acl(opts.acl))
            .send()
            .await
            .map_err(|err| classify(err, key))?;
        debug!(bucket = %self.name, key, "S3 upload complete");
        Ok(())
    }

    async fn put_stream(
        &self,
        key: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        length: u64,
        opts: PutOptions,
    ) -> StoreResult<()> {
        let mut data = Vec::new();
        reader.take(length).read_to_end(&mut data).await?;
        if (data.len() as u64) < length {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "stream for `{key}` ended after {} of {length} bytes",
                    data.len()
                ),
            )));
        }
        self.put(key, Bytes::from(data), opts).await
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.name)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(err, key))?;
        Ok(())
    }

    async fn list(&self, params: &ListParams) -> StoreResult<ListResult> {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        let max_keys = (params.max_keys > 0)
            .then(|| i32::try_from(params.max_keys).unwrap_or(i32::MAX));
        let resp = self
            .client
            .list_objects()
            .bucket(&self.name)
            .set_prefix(non_empty(&params.prefix))
            .set_delimiter(non_empty(&params.delimiter))
            .set_marker(non_empty(&params.marker))
            .set_max_keys(max_keys)
            .send()
            .await
            .map_err(|err| classify(err, &self.name))?;

        let contents = resp
            .contents()
            .iter()
            .filter_map(|object| {
                Some(ObjectEntry {
                    key: object.key()?.to_string(),
                    size: object.size().unwrap_or_default().max(0) as u64,
                    last_modified: object
                        .last_modified()
                        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos()))
                        .unwrap_or_default(),
                    etag: object.e_tag().map(str::to_string),
                })
            })
            .collect();
        let common_prefixes = resp
            .common_prefixes()
            .iter()
            .filter_map(|prefix| prefix.prefix().map(str::to_string))
            .collect();

        Ok(ListResult {
            params: params.clone(),
            is_truncated: resp.is_truncated().unwrap_or(false),
            contents,
            common_prefixes,
        })
    }

    fn url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.name,
            self.region(),
            key
        )
    }
}

fn bucket_acl(acl: Acl) -> BucketCannedAcl {
    match acl {
        Acl::PublicRead => BucketCannedAcl::PublicRead,
        Acl::PublicReadWrite => BucketCannedAcl::PublicReadWrite,
        Acl::AuthenticatedRead => BucketCannedAcl::AuthenticatedRead,
        Acl::Private | Acl::BucketOwnerRead | Acl::BucketOwnerFullControl => {
            BucketCannedAcl::Private
        }
    }
}

fn object_acl(acl: Acl) -> ObjectCannedAcl {
    match acl {
        Acl::Private => ObjectCannedAcl::Private,
        Acl::PublicRead => ObjectCannedAcl::PublicRead,
        Acl::PublicReadWrite => ObjectCannedAcl::PublicReadWrite,
        Acl::AuthenticatedRead => ObjectCannedAcl::AuthenticatedRead,
        Acl::BucketOwnerRead => ObjectCannedAcl::BucketOwnerRead,
        Acl::BucketOwnerFullControl => ObjectCannedAcl::BucketOwnerFullControl,
    }
}

/// Map service error codes onto store error kinds; everything else is an
/// I/O failure carrying the SDK error.
fn classify<E, R>(err: SdkError<E, R>, target: &str) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    let code = err.code().map(str::to_owned);
    match code.as_deref() {
        Some("NoSuchKey" | "NoSuchBucket" | "NotFound") => {
            StoreError::NotFound(target.to_string())
        }
        Some("BucketAlreadyExists" | "BucketAlreadyOwnedByYou") => {
            StoreError::AlreadyExists(target.to_string())
        }
        Some("BucketNotEmpty") => StoreError::NotEmpty(target.to_string()),
        _ => StoreError::Io(io::Error::other(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_owner_acls_fall_back_to_private_for_buckets() {
        assert_eq!(bucket_acl(Acl::BucketOwnerRead), BucketCannedAcl::Private);
        assert_eq!(bucket_acl(Acl::PublicRead), BucketCannedAcl::PublicRead);
        assert_eq!(
            object_acl(Acl::BucketOwnerFullControl),
            ObjectCannedAcl::BucketOwnerFullControl
        );
    }
}
