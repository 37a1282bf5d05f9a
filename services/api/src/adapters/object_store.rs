//! services/api/src/adapters/object_store.rs
//!
//! This module contains the adapter for the S3-compatible object storage
//! gateway. It implements the `ObjectStore` port from the `core` crate.
//! Download links are presigned with an HMAC over the key and expiry so the
//! gateway can serve them without credentials.

use async_trait::async_trait;
use chrono::Utc;
use grant_assistant_core::ports::{ObjectStore, PortError, PortResult};
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ObjectStore` port against an
/// S3-compatible HTTP gateway.
#[derive(Clone)]
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    /// Public endpoint embedded in presigned URLs; falls back to `endpoint`.
    presigned_endpoint: Option<String>,
    bearer_token: Option<String>,
    signing_secret: String,
}

impl HttpObjectStore {
    /// Creates a new `HttpObjectStore`.
    pub fn new(
        client: Client,
        endpoint: String,
        presigned_endpoint: Option<String>,
        bearer_token: Option<String>,
        signing_secret: String,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            presigned_endpoint: presigned_endpoint
                .map(|e| e.trim_end_matches('/').to_string())
                .filter(|e| !e.is_empty()),
            bearer_token,
            signing_secret,
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, bucket, key.trim_start_matches('/'))
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn map_status(status: StatusCode, key: &str) -> PortError {
        if status == StatusCode::NOT_FOUND {
            PortError::NotFound(format!("Object not found: {}", key))
        } else {
            PortError::Gateway(format!("object store returned {}", status))
        }
    }
}

//=========================================================================================
// `ObjectStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> PortResult<Vec<u8>> {
        let response = self
            .authed(self.client.get(self.object_url(bucket, key)))
            .send()
            .await
            .map_err(|e| PortError::Gateway(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::map_status(response.status(), key));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PortError::Gateway(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> PortResult<()> {
        let response = self
            .authed(
                self.client
                    .put(self.object_url(bucket, key))
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(body),
            )
            .send()
            .await
            .map_err(|e| PortError::Gateway(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::map_status(response.status(), key));
        }
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> PortResult<()> {
        let response = self
            .authed(self.client.delete(self.object_url(bucket, key)))
            .send()
            .await
            .map_err(|e| PortError::Gateway(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::map_status(response.status(), key));
        }
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in_secs: u64,
    ) -> PortResult<String> {
        let expires = Utc::now().timestamp() + expires_in_secs as i64;
        let signature = sign_download(&self.signing_secret, bucket, key, expires)?;
        let base = self.presigned_endpoint.as_deref().unwrap_or(&self.endpoint);
        Ok(format!(
            "{}/{}/{}?expires={}&signature={}",
            base,
            bucket,
            key.trim_start_matches('/'),
            expires,
            signature
        ))
    }
}

/// HMAC-SHA256 over `bucket\nkey\nexpires`, hex-encoded.
fn sign_download(secret: &str, bucket: &str, key: &str, expires: i64) -> PortResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
    mac.update(bucket.as_bytes());
    mac.update(b"\n");
    mac.update(key.as_bytes());
    mac.update(b"\n");
    mac.update(expires.to_string().as_bytes());
    let tag = mac.finalize().into_bytes();
    Ok(tag.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_same_inputs() {
        let a = sign_download("secret", "downloads", "feedback.csv", 1700000000).unwrap();
        let b = sign_download("secret", "downloads", "feedback.csv", 1700000000).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn signature_varies_with_key_and_expiry() {
        let base = sign_download("secret", "downloads", "feedback.csv", 1700000000).unwrap();
        let other_key = sign_download("secret", "downloads", "other.csv", 1700000000).unwrap();
        let other_exp = sign_download("secret", "downloads", "feedback.csv", 1700000001).unwrap();
        assert_ne!(base, other_key);
        assert_ne!(base, other_exp);
    }
}
