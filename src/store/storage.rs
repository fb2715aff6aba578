//! Object storage client used to stage images.

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use super::{staging_path, ObjectStore, StagedImage};
use crate::config::Config;
use crate::error::{ColorizerError, Result};
use crate::session::UserSession;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FirebaseStorage {
    http: Client,
    base_url: Url,
    bucket: String,
}

impl FirebaseStorage {
    pub fn new(base_url: impl AsRef<str>, bucket: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ColorizerError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url.as_ref())?,
            bucket: bucket.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.endpoints.storage,
            config.storage_bucket.clone(),
            config.timeouts.http,
        )
    }

    /// `{base}/v0/b/{bucket}/o` with optional encoded object name as the last segment.
    fn object_url(&self, object: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ColorizerError::config("storage endpoint cannot be a base URL"))?;
            segments
                .pop_if_empty()
                .extend(["v0", "b", self.bucket.as_str(), "o"]);
            if let Some(name) = object {
                segments.push(name);
            }
        }
        Ok(url)
    }

    pub fn download_url(&self, path: &str, token: Option<&str>) -> Result<String> {
        let mut url = self.object_url(Some(path))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        Ok(url.to_string())
    }

    async fn read_source(&self, source: &str) -> Result<Vec<u8>> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let response = self
                .http
                .get(source)
                .send()
                .await
                .map_err(|e| ColorizerError::storage(None, format!("failed to fetch {source}: {e}")))?;
            let status = response.status();
            if !status.is_success() {
                return Err(ColorizerError::storage(
                    Some(status),
                    format!("failed to fetch {source} (status {})", status.as_u16()),
                ));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ColorizerError::storage(None, format!("failed to read {source}: {e}")))?;
            return Ok(bytes.to_vec());
        }

        let path = source.strip_prefix("file://").unwrap_or(source);
        tokio::fs::read(path)
            .await
            .map_err(|e| ColorizerError::storage(None, format!("failed to read {path}: {e}")))
    }
}

pub(crate) fn content_type_for(source: &str) -> &'static str {
    let ext = Path::new(source.split('?').next().unwrap_or(source))
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

fn firebase_auth(session: &UserSession) -> String {
    format!("Firebase {}", session.id_token)
}

#[async_trait]
impl ObjectStore for FirebaseStorage {
    async fn upload_blob(&self, session: &UserSession, source: &str) -> Result<StagedImage> {
        let bytes = self.read_source(source).await?;
        let path = staging_path(&session.user_id);
        let mut url = self.object_url(None)?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &path);

        tracing::debug!(%path, size = bytes.len(), "uploading blob");
        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, firebase_auth(session))
            .header(CONTENT_TYPE, content_type_for(source))
            .body(bytes)
            .send()
            .await
            .map_err(|e| ColorizerError::storage(None, format!("upload failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ColorizerError::storage(
                Some(status),
                error_message(status, &body),
            ));
        }

        let uploaded: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| ColorizerError::storage(Some(status), format!("unexpected upload response: {e}")))?;
        let token = uploaded
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next());
        let url = self.download_url(&uploaded.name, token)?;
        Ok(StagedImage {
            path: uploaded.name,
            url,
        })
    }

    async fn delete_blob(&self, session: &UserSession, path: &str) -> Result<()> {
        let url = self.object_url(Some(path))?;
        let response = self
            .http
            .delete(url)
            .header(reqwest::header::AUTHORIZATION, firebase_auth(session))
            .send()
            .await
            .map_err(|e| ColorizerError::storage(None, format!("delete failed: {e}")))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            tracing::debug!(%path, "blob deleted");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ColorizerError::storage(Some(status), error_message(status, &body)))
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let fallback = format!("storage returned status {}", status.as_u16());
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or(fallback)
}
