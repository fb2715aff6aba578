//! Colorizer Library
//!
//! Client-side plumbing for a photo colorization app: users authenticate, pick
//! or capture a photo, have a hosted model colorize it, keep the result in their
//! own image collection, and browse or delete past results.
//!
//! # Module Overview
//!
//! - [`validators`] - Form field validation (email, password, names)
//! - [`permissions`] - Camera / media library grants
//! - [`local_io`] - Image picking and saving results to the device
//! - [`identity`] - Sign-up, sign-in, password reset against the identity provider
//! - [`store`] - Staged image blobs and per-user image records
//! - [`colorize`] - The hosted colorization model
//! - [`pipeline`] - The submission workflow tying the adapters together
//! - [`session`] - Signed-in user, theme, and their persistence
//! - [`config`] - Configuration file support
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use colorizer_lib::{
//!     ColorizationPipeline, Config, Credentials, DeepAiClient, FirebaseStorage, PickOutcome,
//!     PickedAsset, PipelineOptions, RealtimeDatabase, TcpProbe, UserSession,
//! };
//!
//! # async fn example(session: UserSession) -> colorizer_lib::Result<()> {
//! let config = Config::load(None).unwrap_or_default();
//! let credentials = Credentials::from_env();
//! let pipeline = ColorizationPipeline::new(
//!     Arc::new(FirebaseStorage::from_config(&config)?),
//!     Arc::new(RealtimeDatabase::from_config(&config)?),
//!     Arc::new(DeepAiClient::from_config(&config, &credentials)?),
//!     Arc::new(TcpProbe::from_config(&config)),
//!     PipelineOptions::from_config(&config),
//! );
//!
//! let pick = PickOutcome::Picked(PickedAsset::new("/tmp/a.jpg"));
//! let outcome = pipeline.submit(&session, pick).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod colorize;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod identity;
pub mod local_io;
pub mod output;
pub mod permissions;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod validators;

pub use colorize::{ColorizationResult, ColorizationService, DeepAiClient};
pub use config::{Config, Credentials};
pub use connectivity::{AssumeOnline, Connectivity, TcpProbe};
pub use error::{ColorizerError, ErrorCategory, ErrorPayload, Result};
pub use identity::{
    client::FirebaseIdentityClient, AuthError, IdentityService, SignInRequest, SignUpRequest,
};
pub use local_io::{
    save_remote_image_locally, AssetPicker, FilePicker, PickOutcome, PickedAsset, SavedImage,
};
pub use output::{ColorizerOutput, ErrorOutput, OUTPUT_VERSION};
pub use permissions::{Capability, ConfiguredPermissionGate, GrantPolicy, PermissionGate};
pub use pipeline::{
    ColorizationPipeline, ColorizedImage, PipelineOptions, PipelineState, SubmitOutcome,
};
pub use session::{AppContext, AppState, SessionStore, Theme, UserSession};
pub use store::{
    FirebaseStorage, ImageRecord, ObjectStore, RealtimeDatabase, RecordKey, RecordSnapshot,
    RecordStore, SnapshotListener, StagedImage, Subscription,
};
pub use validators::{LoginForm, PasswordResetForm, RegistrationForm, ValidationErrors};
