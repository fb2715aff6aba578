//! Identity provider integration.
//!
//! This module provides:
//! - [`IdentityService`] - sign-up, sign-in, sign-out, password reset and token refresh
//! - [`AuthError`] - the closed set of user-facing authentication failures
//! - [`FirebaseIdentityClient`] - REST implementation against the hosted provider

pub mod api_types;
pub mod client;

pub use client::FirebaseIdentityClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::{AppContext, UserSession};

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Which provider call produced an error code; codes outside an operation's
/// expected set fall back to [`AuthError::Connectivity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOperation {
    SignUp,
    SignIn,
    PasswordReset,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("E-mail already in use.")]
    EmailInUse,
    #[error("Invalid e-mail address format.")]
    InvalidEmail,
    #[error("Password is too weak.")]
    WeakPassword,
    #[error("Too many requests. Try again in a minute.")]
    TooManyRequests,
    #[error("We couldn't find an account matching the email and password you entered. Please check your email and password and try again.")]
    UserNotFound,
    #[error("Your password is incorrect.\nPlease reset your password if you can't remember")]
    WrongPassword,
    #[error("Your session has expired. Please sign in again.")]
    SessionExpired,
    #[error("Check your internet connection.")]
    Connectivity,
}

impl AuthError {
    /// Maps a provider error code to the error shown for `operation`.
    ///
    /// Accepts REST codes (`EMAIL_EXISTS`) and SDK codes (`auth/email-already-in-use`).
    pub fn from_provider_code(operation: AuthOperation, code: &str) -> Self {
        use AuthOperation::*;

        let (err, applies) = match code.trim() {
            "EMAIL_EXISTS" | "auth/email-already-in-use" => {
                (Self::EmailInUse, matches!(operation, SignUp))
            }
            "INVALID_EMAIL" | "auth/invalid-email" => (
                Self::InvalidEmail,
                matches!(operation, SignUp | SignIn | PasswordReset),
            ),
            "WEAK_PASSWORD" | "auth/weak-password" => {
                (Self::WeakPassword, matches!(operation, SignUp))
            }
            "TOO_MANY_ATTEMPTS_TRY_LATER" | "auth/too-many-requests" => {
                (Self::TooManyRequests, true)
            }
            "EMAIL_NOT_FOUND"
            | "INVALID_LOGIN_CREDENTIALS"
            | "auth/user-not-found"
            | "auth/invalid-credential" => {
                (Self::UserNotFound, matches!(operation, SignIn | PasswordReset))
            }
            "INVALID_PASSWORD" | "auth/wrong-password" => {
                (Self::WrongPassword, matches!(operation, SignIn))
            }
            "TOKEN_EXPIRED"
            | "INVALID_REFRESH_TOKEN"
            | "USER_DISABLED"
            | "USER_NOT_FOUND"
            | "auth/user-token-expired"
            | "auth/user-disabled" => (Self::SessionExpired, matches!(operation, Refresh)),
            _ => (Self::Connectivity, true),
        };

        if applies {
            err
        } else {
            Self::Connectivity
        }
    }
}

/// Every fallible call returns `Ok` or a mapped [`AuthError`]; provider faults
/// never escape as anything else.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Creates the account, then sets its display name.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<UserSession, AuthError>;

    async fn sign_in(&self, request: &SignInRequest) -> Result<UserSession, AuthError>;

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError>;

    async fn refresh(&self, session: &UserSession) -> Result<UserSession, AuthError>;

    fn sign_out(&self, context: &AppContext) {
        sign_out(context);
    }
}

/// Drops the session from `context`. Signing out never involves the provider.
pub fn sign_out(context: &AppContext) {
    if let Some(session) = context.session() {
        tracing::info!(user_id = %session.user_id, "signing out");
    }
    context.set_session(None);
}
