use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::ParseError;

use crate::identity::AuthError;
use crate::permissions::Capability;
use crate::validators::{FieldError, ValidationErrors};

#[derive(Debug, Error)]
pub enum ColorizerError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Permission denied: {0} access was not granted")]
    PermissionDenied(Capability),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("Storage error (status: {status:?}): {message}")]
    Storage {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Colorization failed (status: {status:?}): {message}")]
    Colorization {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl ColorizerError {
    pub fn storage(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        ColorizerError::Storage {
            status,
            message: message.into(),
        }
    }

    pub fn colorization(status: Option<StatusCode>, message: impl Into<String>) -> Self {
        ColorizerError::Colorization {
            status,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        ColorizerError::Config(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ColorizerError::Validation(_) => ErrorCategory::Validation,
            ColorizerError::PermissionDenied(_) => ErrorCategory::Permission,
            ColorizerError::Auth(_) | ColorizerError::NotSignedIn => ErrorCategory::Auth,
            ColorizerError::Storage { .. } => ErrorCategory::Storage,
            ColorizerError::Io(_) | ColorizerError::Image(_) => ErrorCategory::Io,
            ColorizerError::Colorization { .. } => ErrorCategory::Colorization,
            ColorizerError::Serialization(_)
            | ColorizerError::InvalidUrl(_)
            | ColorizerError::Config(_) => ErrorCategory::Config,
            ColorizerError::Unknown(_) => ErrorCategory::Unknown,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let remediation = match self {
            ColorizerError::Validation(_) => "Correct the highlighted fields and submit again.",
            ColorizerError::PermissionDenied(Capability::Camera) => {
                "Allow camera access (set permissions.camera = \"allow\" or answer the prompt)."
            }
            ColorizerError::PermissionDenied(Capability::Library) => {
                "Allow library access (set permissions.library = \"allow\" or answer the prompt)."
            }
            ColorizerError::Auth(_) => "Check your credentials and try again.",
            ColorizerError::NotSignedIn => "Run `colorizer sign-in` first.",
            ColorizerError::Storage { status, .. } if *status == Some(StatusCode::UNAUTHORIZED) => {
                "Your session expired; sign in again."
            }
            ColorizerError::Storage { .. } => "Check your internet connection and retry.",
            ColorizerError::Io(_) => "Check file paths/permissions and free disk space.",
            ColorizerError::Image(_) => "Verify the image path/format (png, jpg, jpeg, webp, gif).",
            ColorizerError::Colorization { status, .. }
                if *status == Some(StatusCode::UNAUTHORIZED) =>
            {
                "Check COLORIZER_MODEL_API_KEY."
            }
            ColorizerError::Colorization { .. } => {
                "The colorization service failed; try again later or with another photo."
            }
            ColorizerError::Serialization(_) => {
                "Unexpected response shape; re-run with --verbose for details."
            }
            ColorizerError::InvalidUrl(_) => "Verify URL/format (e.g., https://example.com).",
            ColorizerError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("colorizer_auth_api_key") {
                    "Set COLORIZER_AUTH_API_KEY to the identity provider's web API key."
                } else if lower.contains("colorizer_model_api_key") {
                    "Set COLORIZER_MODEL_API_KEY to your colorization API key."
                } else if lower.contains("timeout") {
                    "Timeouts must be greater than zero (e.g., colorize = \"2m\")."
                } else {
                    "Check flags/paths and the config file (TOML)."
                }
            }
            ColorizerError::Unknown(_) => "Re-run with --verbose; file an issue if persistent.",
        };
        let mut payload = ErrorPayload::new(self.category(), self.to_string(), remediation);
        if let ColorizerError::Validation(errors) = self {
            payload.fields = errors.errors.clone();
        }
        payload
    }
}

pub type Result<T> = std::result::Result<T, ColorizerError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Validation,
    Permission,
    Auth,
    Storage,
    Io,
    Colorization,
    Config,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
            fields: Vec::new(),
        }
    }
}
