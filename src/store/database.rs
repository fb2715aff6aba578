//! REST client for the per-user image record collection.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header::ACCEPT, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::events::{apply_patch, apply_put, snapshot_from_value, DatabaseEvent, SseDecoder};
use super::{
    validate_record_key, RecordKey, RecordSnapshot, RecordStore, SnapshotListener, Subscription,
};
use crate::config::Config;
use crate::error::{ColorizerError, Result};
use crate::session::UserSession;

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

#[derive(Debug, Clone)]
pub struct RealtimeDatabase {
    http: Client,
    /// Used for the event stream, which must outlive the request timeout.
    stream_http: Client,
    base_url: Url,
}

impl RealtimeDatabase {
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ColorizerError::config(format!("Failed to build HTTP client: {e}")))?;
        let stream_http = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ColorizerError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            stream_http,
            base_url: Url::parse(base_url.as_ref())?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.endpoints.database, config.timeouts.http)
    }

    /// `{base}/users/{uid}/images[/{key}].json?auth={idToken}`
    fn images_url(&self, session: &UserSession, key: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ColorizerError::config("database endpoint cannot be a base URL"))?;
            segments.pop_if_empty().push("users").push(&session.user_id);
            match key {
                Some(key) => {
                    segments.push("images").push(&format!("{key}.json"));
                }
                None => {
                    segments.push("images.json");
                }
            }
        }
        url.query_pairs_mut().append_pair("auth", &session.id_token);
        Ok(url)
    }

    async fn check(response: Response, action: &str) -> Result<String> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            Ok(body)
        } else {
            Err(ColorizerError::storage(
                Some(status),
                format!("{action}: {}", error_message(status, &body)),
            ))
        }
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
        .unwrap_or_else(|| format!("database returned status {}", status.as_u16()))
}

#[async_trait]
impl RecordStore for RealtimeDatabase {
    async fn create_image_record(
        &self,
        session: &UserSession,
        image_url: &str,
        colorization_id: &str,
    ) -> Result<RecordKey> {
        let url = self.images_url(session, None)?;
        let record = json!({ "id": colorization_id, "image": image_url });
        let response = self
            .http
            .post(url)
            .json(&record)
            .send()
            .await
            .map_err(|e| ColorizerError::storage(None, format!("record write failed: {e}")))?;
        let body = Self::check(response, "record write rejected").await?;
        let pushed: PushResponse = serde_json::from_str(&body).map_err(|e| {
            ColorizerError::storage(None, format!("unexpected record write response: {e}"))
        })?;
        tracing::debug!(key = %pushed.name, "image record created");
        Ok(pushed.name)
    }

    async fn delete_image_record(&self, session: &UserSession, key: &str) -> Result<()> {
        validate_record_key(key)?;
        let url = self.images_url(session, Some(key))?;
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|e| ColorizerError::storage(None, format!("record delete failed: {e}")))?;
        Self::check(response, "record delete rejected").await?;
        tracing::debug!(%key, "image record deleted");
        Ok(())
    }

    async fn list_image_records(&self, session: &UserSession) -> Result<RecordSnapshot> {
        let url = self.images_url(session, None)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ColorizerError::storage(None, format!("record listing failed: {e}")))?;
        let body = Self::check(response, "record listing rejected").await?;
        let value: Value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)?
        };
        Ok(snapshot_from_value(&value))
    }

    async fn subscribe_to_image_records(
        &self,
        session: &UserSession,
        listener: SnapshotListener,
    ) -> Result<Subscription> {
        let url = self.images_url(session, None)?;
        let response = self
            .stream_http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ColorizerError::storage(None, format!("record subscription failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ColorizerError::storage(
                Some(status),
                format!("record subscription rejected: {}", error_message(status, &body)),
            ));
        }

        let task = tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            let mut tree = Value::Null;

            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!(error = %e, "record stream interrupted");
                        return;
                    }
                };
                for sse in decoder.push(&chunk) {
                    let event = match DatabaseEvent::from_sse(&sse) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!(event = %sse.event, error = %e, "malformed record event");
                            continue;
                        }
                    };
                    match event {
                        DatabaseEvent::Put { path, data } => apply_put(&mut tree, &path, data),
                        DatabaseEvent::Patch { path, data } => apply_patch(&mut tree, &path, data),
                        DatabaseEvent::KeepAlive => continue,
                        DatabaseEvent::Cancel(reason) => {
                            tracing::warn!(%reason, "record stream cancelled by server");
                            return;
                        }
                        DatabaseEvent::AuthRevoked => {
                            tracing::warn!("record stream credentials revoked");
                            return;
                        }
                        DatabaseEvent::Other(name) => {
                            tracing::debug!(event = %name, "ignoring record event");
                            continue;
                        }
                    }
                    listener(&snapshot_from_value(&tree));
                }
            }
            tracing::debug!("record stream closed");
        });

        Ok(Subscription::new(task))
    }
}
