//! Cloudinary upload API client.
//!
//! Uses signed requests: every call carries `api_key`, `timestamp` and a
//! `signature` computed over the sorted parameters plus the API secret. The
//! account must have SHA-256 signatures enabled.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ImageStore, MediaError};
use crate::domain::value_objects::{EmbeddedImage, ImageRef};

const DEFAULT_BASE_URL: &str = "https://api.cloudinary.com/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout_secs: u64,
}

pub struct CloudinaryClient {
    client: Client,
    config: CloudinaryConfig,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl CloudinaryClient {
    /// Creates a client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: CloudinaryConfig) -> Result<Self, MediaError> {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`MediaError::InvalidUrl`] if `base_url` does not parse.
    pub fn with_base_url(config: CloudinaryConfig, base_url: &str) -> Result<Self, MediaError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("opensase-catalog/0.1")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| MediaError::InvalidUrl(format!("'{base_url}': {e}")))?;

        Ok(Self { client, config, base_url })
    }

    fn endpoint(&self, action: &str) -> Result<Url, MediaError> {
        let path = format!("v1_1/{}/image/{action}", self.config.cloud_name);
        self.base_url
            .join(&path)
            .map_err(|e| MediaError::InvalidUrl(format!("'{path}': {e}")))
    }

    /// Signs `params` (excluding `file`, `api_key` and the signature itself).
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let joined = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        hex::encode(Sha256::digest(format!("{joined}{}", self.config.api_secret)))
    }

    async fn post_signed(
        &self,
        action: &str,
        signed: &[(&str, &str)],
        extra: &[(&str, &str)],
    ) -> Result<serde_json::Value, MediaError> {
        let signature = self.sign(signed);
        let mut form: Vec<(&str, &str)> = signed.to_vec();
        form.extend_from_slice(extra);
        form.push(("api_key", self.config.api_key.as_str()));
        form.push(("signature", signature.as_str()));

        let response = self.client.post(self.endpoint(action)?).form(&form).send().await?;
        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let message = serde_json::from_value::<ErrorEnvelope>(body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| "unrecognised error body".to_string());
            return Err(MediaError::Api { status: status.as_u16(), message });
        }
        Ok(body)
    }
}

#[async_trait]
impl ImageStore for CloudinaryClient {
    async fn upload(&self, image: &EmbeddedImage, folder: &str) -> Result<ImageRef, MediaError> {
        let timestamp = Utc::now().timestamp().to_string();
        let body = self
            .post_signed(
                "upload",
                &[("folder", folder), ("timestamp", timestamp.as_str())],
                &[("file", image.as_data_uri())],
            )
            .await?;

        let uploaded: UploadResponse = serde_json::from_value(body).map_err(|e| MediaError::Api {
            status: 200,
            message: format!("unexpected upload response: {e}"),
        })?;
        tracing::debug!(public_id = %uploaded.public_id, folder, "image uploaded");
        Ok(ImageRef::new(uploaded.public_id, uploaded.secure_url))
    }

    async fn delete(&self, id: &str) -> Result<(), MediaError> {
        let timestamp = Utc::now().timestamp().to_string();
        let body = self
            .post_signed("destroy", &[("public_id", id), ("timestamp", timestamp.as_str())], &[])
            .await?;

        let destroyed: DestroyResponse = serde_json::from_value(body).map_err(|e| MediaError::Api {
            status: 200,
            message: format!("unexpected destroy response: {e}"),
        })?;
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::Rejected(format!("destroy {id}: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CloudinaryClient {
        CloudinaryClient::new(CloudinaryConfig {
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: "secret".into(),
            timeout_secs: 5,
        })
        .expect("client")
    }

    #[test]
    fn signature_is_order_independent() {
        let c = client();
        let a = c.sign(&[("timestamp", "1"), ("folder", "products")]);
        let b = c.sign(&[("folder", "products"), ("timestamp", "1")]);
        assert_eq!(a, b);
        assert_eq!(a, hex::encode(Sha256::digest("folder=products&timestamp=1secret")));
    }

    #[test]
    fn endpoint_includes_cloud_name() {
        let url = client().endpoint("destroy").unwrap();
        assert_eq!(url.as_str(), "https://api.cloudinary.com/v1_1/demo/image/destroy");
    }
}
