//! The colorization submission pipeline.
//!
//! One submission runs `Idle -> Staging -> Colorizing -> Restaging -> Persisted`:
//! the picked image is uploaded to durable storage, the model colorizes it from
//! that URL, the model's short-lived output is uploaded again, and only then is an
//! [`ImageRecord`](crate::store::ImageRecord) written pointing at the second upload.
//! Any failure moves to `Errored` and aborts the remaining steps, so a record is
//! never written for a partial run.
//!
//! A pipeline runs at most one submission at a time. Requests made while a run is
//! in flight are ignored rather than queued.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::colorize::{ColorizationResult, ColorizationService};
use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::error::{ColorizerError, Result};
use crate::local_io::{PickOutcome, PickedAsset};
use crate::session::UserSession;
use crate::store::{ObjectStore, RecordKey, RecordStore, StagedImage};

pub const OFFLINE_MESSAGE: &str = "You need to be connected to the internet to colorize.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Staging,
    Colorizing,
    Restaging,
    Persisted,
    Errored,
}

impl PipelineState {
    pub fn is_running(self) -> bool {
        matches!(
            self,
            PipelineState::Staging | PipelineState::Colorizing | PipelineState::Restaging
        )
    }
}

/// The persisted result of a completed submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorizedImage {
    /// Durable URL of the re-staged colorized image.
    pub image_url: String,
    /// Colorization id reported by the model.
    pub id: String,
    pub record_key: RecordKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Completed(ColorizedImage),
    /// Submission withheld; carries the message to show the user.
    Blocked(String),
    /// The user cancelled the pick. Nothing happened.
    Cancelled,
    /// Another submission was already running.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Upper bound on the colorize call; `None` waits indefinitely.
    pub colorize_deadline: Option<Duration>,
    /// Delete the staged original once the model has finished with it.
    pub discard_staged_originals: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            colorize_deadline: Some(Duration::from_secs(120)),
            discard_staged_originals: true,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            colorize_deadline: Some(config.timeouts.colorize),
            discard_staged_originals: config.pipeline.discard_staged_originals,
        }
    }
}

pub struct ColorizationPipeline {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    colorizer: Arc<dyn ColorizationService>,
    connectivity: Arc<dyn Connectivity>,
    options: PipelineOptions,
    state: watch::Sender<PipelineState>,
    in_flight: AtomicBool,
}

/// Releases the single-flight flag when the run ends, however it ends. A run
/// dropped mid-step leaves the state `Errored` rather than stuck in a running step.
struct FlightGuard<'a> {
    in_flight: &'a AtomicBool,
    state: &'a watch::Sender<PipelineState>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let abandoned = self.state.borrow().is_running();
        if abandoned {
            let previous = self.state.send_replace(PipelineState::Errored);
            tracing::warn!(from = ?previous, "submission dropped before it finished");
        }
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Discards the picked asset when dropped.
struct PickedGuard(Option<PickedAsset>);

impl PickedGuard {
    fn uri(&self) -> &str {
        self.0.as_ref().map_or("", |asset| asset.uri.as_str())
    }
}

impl Drop for PickedGuard {
    fn drop(&mut self) {
        if let Some(asset) = self.0.take() {
            asset.discard();
        }
    }
}

impl ColorizationPipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        colorizer: Arc<dyn ColorizationService>,
        connectivity: Arc<dyn Connectivity>,
        options: PipelineOptions,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            objects,
            records,
            colorizer,
            connectivity,
            options,
            state,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: PipelineState) {
        let previous = self.state.send_replace(state);
        tracing::info!(from = ?previous, to = ?state, "pipeline state changed");
    }

    fn try_acquire(&self) -> Option<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                in_flight: &self.in_flight,
                state: &self.state,
            })
    }

    /// Runs one submission for `pick`. The picked asset is consumed either way,
    /// including when the returned future is dropped before completion.
    ///
    /// Refusals (cancelled pick, offline, already running) are outcomes; only an
    /// adapter failure is an `Err`, and it leaves the pipeline `Errored`.
    pub async fn submit(&self, session: &UserSession, pick: PickOutcome) -> Result<SubmitOutcome> {
        let asset = match pick {
            PickOutcome::Cancelled => return Ok(SubmitOutcome::Cancelled),
            PickOutcome::Picked(asset) => PickedGuard(Some(asset)),
        };

        let Some(_guard) = self.try_acquire() else {
            tracing::debug!(uri = %asset.uri(), "submission ignored; pipeline busy");
            return Ok(SubmitOutcome::Ignored);
        };

        if !self.connectivity.is_online().await {
            tracing::info!("submission blocked; offline");
            return Ok(SubmitOutcome::Blocked(OFFLINE_MESSAGE.to_string()));
        }

        let result = self.run(session, asset.uri()).await;
        drop(asset);
        match result {
            Ok(image) => {
                self.set_state(PipelineState::Persisted);
                Ok(SubmitOutcome::Completed(image))
            }
            Err(e) => {
                tracing::warn!(error = %e, "submission failed");
                self.set_state(PipelineState::Errored);
                Err(e)
            }
        }
    }

    async fn run(&self, session: &UserSession, source: &str) -> Result<ColorizedImage> {
        self.set_state(PipelineState::Staging);
        let original = self.objects.upload_blob(session, source).await?;

        self.set_state(PipelineState::Colorizing);
        let colorized = self.colorize(&original.url).await;
        if self.options.discard_staged_originals {
            self.discard_original(session, &original).await;
        }
        let colorized = colorized?;

        self.set_state(PipelineState::Restaging);
        let restaged = self
            .objects
            .upload_blob(session, &colorized.output_url)
            .await?;

        let record_key = self
            .records
            .create_image_record(session, &restaged.url, &colorized.id)
            .await
            .map_err(|e| {
                let status = match &e {
                    ColorizerError::Storage { status, .. } => *status,
                    _ => None,
                };
                ColorizerError::storage(
                    status,
                    format!(
                        "record write failed; the colorized image is stored at {}: {e}",
                        restaged.url
                    ),
                )
            })?;

        Ok(ColorizedImage {
            image_url: restaged.url,
            id: colorized.id,
            record_key,
        })
    }

    async fn colorize(&self, image_url: &str) -> Result<ColorizationResult> {
        let call = self.colorizer.colorize(image_url);
        let result = match self.options.colorize_deadline {
            Some(deadline) => tokio::time::timeout(deadline, call).await.map_err(|_| {
                ColorizerError::colorization(
                    None,
                    format!("the model did not answer within {deadline:?}"),
                )
            })??,
            None => call.await?,
        };
        if result.output_url.trim().is_empty() {
            return Err(ColorizerError::colorization(
                None,
                "model returned no output image",
            ));
        }
        Ok(result)
    }

    async fn discard_original(&self, session: &UserSession, original: &StagedImage) {
        if let Err(e) = self.objects.delete_blob(session, &original.path).await {
            tracing::warn!(path = %original.path, error = %e, "failed to delete staged original");
        }
    }
}
