//! Remote persistence: staged image blobs and per-user image records.
//!
//! This module provides:
//! - [`ObjectStore`] - blob staging under `users/{uid}/images/{uid}-{rand}`
//! - [`RecordStore`] - the `users/{uid}/images` record collection, including a live listener
//! - [`FirebaseStorage`] / [`RealtimeDatabase`] - REST implementations of both

pub mod database;
pub mod events;
pub mod storage;

pub use database::RealtimeDatabase;
pub use storage::FirebaseStorage;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::error::{ColorizerError, Result};
use crate::session::UserSession;
use crate::validators::{Field, ValidationErrors};

/// Exclusive upper bound of the random staging suffix.
pub const STAGING_SUFFIX_RANGE: u32 = 99_999;

/// Characters the record database refuses in a key.
const FORBIDDEN_KEY_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

/// A persisted colorization. `image` always points at a staged blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub image: String,
}

/// Store-generated key of an [`ImageRecord`]; distinct from the record's `id`.
pub type RecordKey = String;

/// Records of one user, ordered by key (push keys sort by creation time).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordSnapshot {
    pub entries: Vec<(RecordKey, ImageRecord)>,
}

impl RecordSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ImageRecord> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, record)| record)
    }
}

/// A blob uploaded to durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedImage {
    /// Object path inside the bucket.
    pub path: String,
    /// Publicly fetchable download URL.
    pub url: String,
}

pub type SnapshotListener = Arc<dyn Fn(&RecordSnapshot) + Send + Sync>;

/// Live listener registration. Dropping the handle also stops the listener.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn unsubscribe(self) {
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Resolves once the listener stops by itself (stream closed, cancelled or revoked).
    pub async fn closed(&mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads `source` (local path, `file://` URI or http(s) URL) fully and uploads it.
    async fn upload_blob(&self, session: &UserSession, source: &str) -> Result<StagedImage>;

    async fn delete_blob(&self, session: &UserSession, path: &str) -> Result<()>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_image_record(
        &self,
        session: &UserSession,
        image_url: &str,
        colorization_id: &str,
    ) -> Result<RecordKey>;

    /// Removes one record. Deleting an absent key succeeds.
    async fn delete_image_record(&self, session: &UserSession, key: &str) -> Result<()>;

    async fn list_image_records(&self, session: &UserSession) -> Result<RecordSnapshot>;

    /// Calls `listener` with the current records, then again after every change.
    async fn subscribe_to_image_records(
        &self,
        session: &UserSession,
        listener: SnapshotListener,
    ) -> Result<Subscription>;
}

pub fn staging_path(user_id: &str) -> String {
    let suffix = rand::thread_rng().gen_range(0..STAGING_SUFFIX_RANGE);
    format!("users/{user_id}/images/{user_id}-{suffix}")
}

pub fn validate_record_key(key: &str) -> Result<()> {
    let mut errors = ValidationErrors::default();
    if key.trim().is_empty() {
        errors.push(Field::RecordKey, "Record key cannot be empty.");
    } else if key.contains(FORBIDDEN_KEY_CHARS) {
        errors.push(
            Field::RecordKey,
            "Record key cannot contain '/', '.', '#', '$', '[' or ']'.",
        );
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ColorizerError::Validation(errors))
    }
}
