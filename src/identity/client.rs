//! REST client for the hosted identity provider.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::api_types::{
    provider_code, AccountResponse, OobCodeRequest, PasswordCredentials, RefreshResponse,
    UpdateProfile,
};
use super::{AuthError, AuthOperation, IdentityService, SignInRequest, SignUpRequest};
use crate::config::{Config, Credentials, AUTH_API_KEY_ENV};
use crate::error::{ColorizerError, Result};
use crate::session::UserSession;

const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct FirebaseIdentityClient {
    http: Client,
    api_key: String,
    identity_base: Url,
    token_base: Url,
}

impl FirebaseIdentityClient {
    pub fn new(
        api_key: impl Into<String>,
        identity_base: impl AsRef<str>,
        token_base: impl AsRef<str>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ColorizerError::config(format!(
                "{AUTH_API_KEY_ENV} is not set"
            )));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ColorizerError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            identity_base: Url::parse(identity_base.as_ref())?,
            token_base: Url::parse(token_base.as_ref())?,
        })
    }

    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self> {
        let api_key = credentials
            .auth_api_key
            .clone()
            .ok_or_else(|| ColorizerError::config(format!("{AUTH_API_KEY_ENV} is not set")))?;
        Self::new(
            api_key,
            &config.endpoints.identity,
            &config.endpoints.token,
            config.timeouts.http,
        )
    }

    fn endpoint(&self, base: &Url, path: &str) -> std::result::Result<Url, AuthError> {
        let mut url = base.join(path).map_err(|e| {
            tracing::error!(error = %e, path, "invalid identity endpoint");
            AuthError::Connectivity
        })?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: AuthOperation,
        request: RequestBuilder,
    ) -> std::result::Result<T, AuthError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(?operation, error = %e, "identity request failed");
            AuthError::Connectivity
        })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                tracing::warn!(?operation, error = %e, "unexpected identity response");
                AuthError::Connectivity
            });
        }

        let code = provider_code(&body).unwrap_or_default();
        tracing::debug!(?operation, status = status.as_u16(), %code, "identity provider rejected request");
        Err(AuthError::from_provider_code(operation, &code))
    }

    async fn set_display_name(&self, id_token: &str, name: &str) -> std::result::Result<(), AuthError> {
        let url = self.endpoint(&self.identity_base, "/v1/accounts:update")?;
        let body = UpdateProfile {
            id_token,
            display_name: name,
            return_secure_token: false,
        };
        let _: serde_json::Value = self
            .send(AuthOperation::SignUp, self.http.post(url).json(&body))
            .await?;
        Ok(())
    }
}

fn expires_at(expires_in: Option<&str>) -> chrono::DateTime<Utc> {
    let secs = expires_in
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
    Utc::now() + ChronoDuration::seconds(secs)
}

fn session_from_account(account: AccountResponse, fallback_email: &str) -> UserSession {
    UserSession {
        expires_at: expires_at(account.expires_in.as_deref()),
        user_id: account.local_id,
        email: account.email.unwrap_or_else(|| fallback_email.to_string()),
        display_name: account.display_name.filter(|n| !n.is_empty()),
        id_token: account.id_token,
        refresh_token: account.refresh_token,
    }
}

#[async_trait]
impl IdentityService for FirebaseIdentityClient {
    async fn sign_up(&self, request: &SignUpRequest) -> std::result::Result<UserSession, AuthError> {
        let url = self.endpoint(&self.identity_base, "/v1/accounts:signUp")?;
        let body = PasswordCredentials {
            email: &request.email,
            password: &request.password,
            return_secure_token: true,
        };
        let account: AccountResponse = self
            .send(AuthOperation::SignUp, self.http.post(url).json(&body))
            .await?;
        let mut session = session_from_account(account, &request.email);
        tracing::info!(user_id = %session.user_id, "account created");

        // The account exists at this point; a failed profile update must not undo that.
        match self.set_display_name(&session.id_token, &request.name).await {
            Ok(()) => session.display_name = Some(request.name.clone()),
            Err(e) => tracing::warn!(error = %e, "failed to set display name"),
        }
        Ok(session)
    }

    async fn sign_in(&self, request: &SignInRequest) -> std::result::Result<UserSession, AuthError> {
        let url = self.endpoint(&self.identity_base, "/v1/accounts:signInWithPassword")?;
        let body = PasswordCredentials {
            email: &request.email,
            password: &request.password,
            return_secure_token: true,
        };
        let account: AccountResponse = self
            .send(AuthOperation::SignIn, self.http.post(url).json(&body))
            .await?;
        let session = session_from_account(account, &request.email);
        tracing::info!(user_id = %session.user_id, "signed in");
        Ok(session)
    }

    async fn request_password_reset(&self, email: &str) -> std::result::Result<(), AuthError> {
        let url = self.endpoint(&self.identity_base, "/v1/accounts:sendOobCode")?;
        let body = OobCodeRequest {
            request_type: "PASSWORD_RESET",
            email,
        };
        let _: serde_json::Value = self
            .send(AuthOperation::PasswordReset, self.http.post(url).json(&body))
            .await?;
        Ok(())
    }

    async fn refresh(&self, session: &UserSession) -> std::result::Result<UserSession, AuthError> {
        let url = self.endpoint(&self.token_base, "/v1/token")?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", session.refresh_token.as_str()),
        ];
        let refreshed: RefreshResponse = self
            .send(AuthOperation::Refresh, self.http.post(url).form(&form))
            .await?;
        tracing::debug!(user_id = %refreshed.user_id, "session refreshed");

        Ok(UserSession {
            expires_at: expires_at(refreshed.expires_in.as_deref()),
            user_id: refreshed.user_id,
            email: session.email.clone(),
            display_name: session.display_name.clone(),
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
        })
    }
}
