use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_smithy_types::byte_stream::ByteStream;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use crate::error::StoreError;

/// Result of a GET, including the body and ETag.
pub struct GetObjectOutput {
    pub body: Vec<u8>,
    pub etag: Option<String>,
}

/// Write precondition for [`put_object`].
#[derive(Debug, Clone, Copy)]
pub enum Precondition<'a> {
    None,
    /// Only overwrite the object carrying this ETag.
    IfMatch(&'a str),
    /// Only create; fail if any object exists at the key.
    IfAbsent,
}

pub async fn get_object(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<GetObjectOutput, StoreError> {
    let resp = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| {
            let err = e.into_service_error();
            if err.is_no_such_key() {
                StoreError::NotFound {
                    key: key.to_string(),
                }
            } else {
                StoreError::GetObject(err.to_string())
            }
        })?;

    let etag = resp.e_tag().map(|s| s.to_string());
    let body = resp
        .body
        .collect()
        .await
        .map_err(|e| StoreError::GetObject(e.to_string()))?
        .into_bytes()
        .to_vec();

    Ok(GetObjectOutput { body, etag })
}

/// Like [`get_object`] but maps a missing key to `Ok(None)`.
pub async fn get_object_opt(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<Option<GetObjectOutput>, StoreError> {
    match get_object(client, bucket, key).await {
        Ok(output) => Ok(Some(output)),
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Put an object. Returns the new ETag.
///
/// A failed precondition (HTTP 412, or 409 on a racing create) comes back as
/// [`StoreError::PreconditionFailed`].
pub async fn put_object(
    client: &Client,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
    content_type: Option<&str>,
    precondition: Precondition<'_>,
) -> Result<String, StoreError> {
    let mut req = client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body));

    if let Some(ct) = content_type {
        req = req.content_type(ct);
    }
    req = match precondition {
        Precondition::None => req,
        Precondition::IfMatch(etag) => req.if_match(etag),
        Precondition::IfAbsent => req.if_none_match("*"),
    };

    let resp = req.send().await.map_err(|e| {
        let err = e.into_service_error();
        let message = err.to_string();
        if message.contains("PreconditionFailed") || message.contains("ConditionalRequestConflict")
        {
            StoreError::PreconditionFailed {
                key: key.to_string(),
            }
        } else {
            StoreError::PutObject(message)
        }
    })?;

    Ok(resp.e_tag().unwrap_or_default().to_string())
}

pub async fn delete_object(client: &Client, bucket: &str, key: &str) -> Result<(), StoreError> {
    client
        .delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| StoreError::DeleteObject(e.into_service_error().to_string()))?;

    Ok(())
}

/// Whether an object exists at `key`.
pub async fn object_exists(client: &Client, bucket: &str, key: &str) -> Result<bool, StoreError> {
    match client.head_object().bucket(bucket).key(key).send().await {
        Ok(_) => Ok(true),
        Err(e) => {
            let err = e.into_service_error();
            if err.is_not_found() {
                Ok(false)
            } else {
                Err(StoreError::GetObject(err.to_string()))
            }
        }
    }
}

/// List keys under a prefix, following continuation tokens.
pub async fn list_objects(
    client: &Client,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<String>, StoreError> {
    let mut keys = Vec::new();
    let mut continuation_token: Option<String> = None;

    loop {
        let mut req = client.list_objects_v2().bucket(bucket).prefix(prefix);

        if let Some(token) = &continuation_token {
            req = req.continuation_token(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::ListObjects(e.into_service_error().to_string()))?;

        for obj in resp.contents() {
            if let Some(key) = obj.key() {
                keys.push(key.to_string());
            }
        }

        if resp.is_truncated() == Some(true) {
            continuation_token = resp.next_continuation_token().map(|s| s.to_string());
        } else {
            break;
        }
    }

    Ok(keys)
}

/// Generate a presigned GET URL for an object.
pub async fn presign_get(
    client: &Client,
    bucket: &str,
    key: &str,
    expires_in: Duration,
) -> Result<String, StoreError> {
    let presign_config = PresigningConfig::builder()
        .expires_in(expires_in)
        .build()
        .map_err(|e| StoreError::Presign(e.to_string()))?;

    let presigned = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .presigned(presign_config)
        .await
        .map_err(|e| StoreError::Presign(e.to_string()))?;

    Ok(presigned.uri().to_string())
}

/// Load a JSON document and its ETag. `Ok(None)` if the key is absent.
pub async fn load_json<T: DeserializeOwned>(
    client: &Client,
    bucket: &str,
    key: &str,
) -> Result<Option<(T, String)>, StoreError> {
    let Some(output) = get_object_opt(client, bucket, key).await? else {
        return Ok(None);
    };
    let value: T = serde_json::from_slice(&output.body)?;
    Ok(Some((value, output.etag.unwrap_or_default())))
}

/// Save a JSON document. Returns the new ETag.
pub async fn save_json<T: Serialize>(
    client: &Client,
    bucket: &str,
    key: &str,
    value: &T,
    precondition: Precondition<'_>,
) -> Result<String, StoreError> {
    let body = serde_json::to_vec_pretty(value)?;
    put_object(
        client,
        bucket,
        key,
        body,
        Some("application/json"),
        precondition,
    )
    .await
}
