//! HTTP handlers for object and bucket operations.
//! Streams object bodies to avoid buffering in memory and goes through the
//! `Bucket` contract for every storage concern.

use crate::{
    errors::AppError,
    models::{
        acl::{Acl, PutOptions},
        listing::{ListParams, ListResult},
    },
    services::{fs_store::FsStore, store::ObjectStore},
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::SecondsFormat;
use futures::StreamExt;
use serde::Deserialize;
use std::io;
use tokio_util::io::{ReaderStream, StreamReader};

const ACL_HEADER: &str = "x-amz-acl";

/// Query params accepted by the bucket listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListObjectsQuery {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub marker: Option<String>,
    #[serde(rename = "max-keys")]
    pub max_keys: Option<usize>,
}

impl From<ListObjectsQuery> for ListParams {
    fn from(q: ListObjectsQuery) -> Self {
        ListParams::new(
            q.prefix.unwrap_or_default(),
            q.delimiter.unwrap_or_default(),
            q.marker.unwrap_or_default(),
            q.max_keys.unwrap_or(0),
        )
    }
}

/// Upload an object to `/{bucket}/{*key}`.
///
/// The body is streamed straight into the store; `Content-Length` tells the
/// store how many bytes to expect.
pub async fn upload_object(
    State(store): State<FsStore>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| AppError::new(StatusCode::LENGTH_REQUIRED, "Content-Length is required"))?;

    let opts = PutOptions {
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()),
        acl: acl_from_headers(&headers)?,
    };

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));
    let mut reader = StreamReader::new(Box::pin(stream));

    store
        .bucket(&bucket)
        .put_stream(&key, &mut reader, length, opts)
        .await?;

    Ok(StatusCode::OK)
}

/// Download an object `/{bucket}/{*key}` as a streaming response.
pub async fn get_object(
    State(store): State<FsStore>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let reader = store.bucket(&bucket).get_stream(&key).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let mut response = Response::new(body);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    Ok(response)
}

/// DELETE `/{bucket}/{*key}`
pub async fn delete_object(
    State(store): State<FsStore>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    store.bucket(&bucket).del(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/{bucket}` - list objects, supports ?prefix=&delimiter=&marker=&max-keys=
pub async fn list_objects(
    State(store): State<FsStore>,
    Path(bucket): Path<String>,
    Query(q): Query<ListObjectsQuery>,
) -> Result<Response, AppError> {
    let params = ListParams::from(q);
    let result = store.bucket(&bucket).list(&params).await?;
    let xml = build_list_objects_xml(&bucket, &result);

    let mut response = Response::new(Body::from(xml));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    Ok(response)
}

/// PUT `/{bucket}` - create bucket.
pub async fn create_bucket(
    State(store): State<FsStore>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let acl = acl_from_headers(&headers)?;
    store.bucket(&bucket).put_bucket(acl).await?;

    let xml = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<CreateBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#,
            r#"<Location>/{}</Location>"#,
            r#"</CreateBucketResult>"#
        ),
        xml_escape(&bucket)
    );
    let mut response = Response::new(Body::from(xml));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    Ok(response)
}

/// DELETE `/{bucket}` - delete an empty bucket.
pub async fn delete_bucket(
    State(store): State<FsStore>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    store.bucket(&bucket).del_bucket().await?;
    Ok(StatusCode::NO_CONTENT)
}

fn acl_from_headers(headers: &HeaderMap) -> Result<Acl, AppError> {
    match headers.get(ACL_HEADER) {
        None => Ok(Acl::default()),
        Some(value) => value
            .to_str()
            .map_err(|_| AppError::new(StatusCode::BAD_REQUEST, "malformed x-amz-acl header"))?
            .parse()
            .map_err(|msg: String| AppError::new(StatusCode::BAD_REQUEST, msg)),
    }
}

fn build_list_objects_xml(bucket: &str, result: &ListResult) -> String {
    let params = &result.params;
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#,
    );
    xml.push_str(&format!("<Name>{}</Name>", xml_escape(bucket)));
    xml.push_str(&format!("<Prefix>{}</Prefix>", xml_escape(&params.prefix)));
    xml.push_str(&format!("<Marker>{}</Marker>", xml_escape(&params.marker)));
    xml.push_str(&format!("<MaxKeys>{}</MaxKeys>", params.max_keys));
    if !params.delimiter.is_empty() {
        xml.push_str(&format!(
            "<Delimiter>{}</Delimiter>",
            xml_escape(&params.delimiter)
        ));
    }
    xml.push_str(&format!(
        "<IsTruncated>{}</IsTruncated>",
        if result.is_truncated { "true" } else { "false" }
    ));

    for obj in &result.contents {
        xml.push_str("<Contents>");
        xml.push_str(&format!("<Key>{}</Key>", xml_escape(&obj.key)));
        xml.push_str(&format!(
            "<LastModified>{}</LastModified>",
            obj.last_modified
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
        if let Some(etag) = obj.etag.as_deref() {
            xml.push_str(&format!("<ETag>\"{}\"</ETag>", xml_escape(etag)));
        }
        xml.push_str(&format!("<Size>{}</Size>", obj.size));
        xml.push_str("</Contents>");
    }

    for prefix in &result.common_prefixes {
        xml.push_str("<CommonPrefixes><Prefix>");
        xml.push_str(&xml_escape(prefix));
        xml.push_str("</Prefix></CommonPrefixes>");
    }

    xml.push_str("</ListBucketResult>");
    xml
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::object::ObjectEntry;
    use chrono::{TimeZone, Utc};

    #[test]
    fn listing_xml_carries_contents_and_prefixes() {
        let result = ListResult {
            params: ListParams::new("a/", "/", "", 0),
            is_truncated: false,
            contents: vec![ObjectEntry {
                key: "a/<imina>".into(),
                size: 12,
                last_modified: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
                etag: None,
            }],
            common_prefixes: vec!["a/b/".into(), "a/foo/".into()],
        };

        let xml = build_list_objects_xml("test", &result);
        assert!(xml.contains("<Key>a/&lt;imina&gt;</Key>"));
        assert!(xml.contains("<LastModified>2025-01-02T03:04:05.000Z</LastModified>"));
        assert!(xml.contains("<Size>12</Size>"));
        assert!(!xml.contains("<ETag>"));
        assert!(xml.contains("<Delimiter>/</Delimiter>"));
        assert!(xml.contains("<CommonPrefixes><Prefix>a/b/</Prefix></CommonPrefixes>"));
        assert!(xml.contains("<CommonPrefixes><Prefix>a/foo/</Prefix></CommonPrefixes>"));
        assert!(xml.contains("<IsTruncated>false</IsTruncated>"));
    }

    #[test]
    fn missing_query_fields_default_to_a_full_listing() {
        let params = ListParams::from(ListObjectsQuery::default());
        assert_eq!(params, ListParams::new("", "", "", 0));
    }

    #[test]
    fn acl_header_is_parsed_or_rejected() {
        let mut headers = HeaderMap::new();
        assert_eq!(acl_from_headers(&headers).unwrap(), Acl::Private);

        headers.insert(ACL_HEADER, HeaderValue::from_static("public-read"));
        assert_eq!(acl_from_headers(&headers).unwrap(), Acl::PublicRead);

        headers.insert(ACL_HEADER, HeaderValue::from_static("everyone"));
        let err = acl_from_headers(&headers).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
