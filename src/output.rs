use serde::Serialize;

use crate::error::ErrorPayload;
use crate::local_io::SavedImage;
use crate::pipeline::{ColorizedImage, PipelineState};
use crate::session::{Theme, UserSession};
use crate::store::RecordSnapshot;

/// Schema version for output payloads.
pub const OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ColorizerOutput {
    Auth(AuthOutput),
    Colorize(ColorizeOutput),
    Images(ImagesOutput),
    Delete(DeleteOutput),
    Save(SaveOutput),
    Theme(ThemeOutput),
    Error(ErrorOutput),
}

impl ColorizerOutput {
    /// Exit code for a successfully rendered payload: refusals exit 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            ColorizerOutput::Colorize(out) if out.status != ColorizeStatus::Completed => 1,
            ColorizerOutput::Error(_) => 2,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthAction {
    SignUp,
    SignIn,
    SignOut,
    ResetPassword,
    Whoami,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: String,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl From<&UserSession> for UserSummary {
    fn from(session: &UserSession) -> Self {
        Self {
            user_id: session.user_id.clone(),
            email: session.email.clone(),
            username: session.username().to_string(),
            display_name: session.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthOutput {
    pub version: String,
    pub action: AuthAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorizeStatus {
    Completed,
    Blocked,
    Cancelled,
    Ignored,
    /// The camera or library permission was refused.
    Denied,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorizeOutput {
    pub version: String,
    pub status: ColorizeStatus,
    pub state: PipelineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ColorizedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<SavedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    pub key: String,
    pub id: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesOutput {
    pub version: String,
    pub count: usize,
    pub images: Vec<ImageEntry>,
}

impl ImagesOutput {
    pub fn from_snapshot(snapshot: &RecordSnapshot) -> Self {
        let images: Vec<ImageEntry> = snapshot
            .entries
            .iter()
            .map(|(key, record)| ImageEntry {
                key: key.clone(),
                id: record.id.clone(),
                image: record.image.clone(),
            })
            .collect();
        Self {
            version: OUTPUT_VERSION.to_string(),
            count: images.len(),
            images,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutput {
    pub version: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutput {
    pub version: String,
    pub saved: SavedImage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeOutput {
    pub version: String,
    pub theme: Theme,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: ErrorPayload,
}
