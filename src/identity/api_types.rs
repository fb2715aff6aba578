//! Request and response bodies for the identity provider's REST API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCredentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile<'a> {
    pub id_token: &'a str,
    pub display_name: &'a str,
    pub return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OobCodeRequest<'a> {
    pub request_type: &'static str,
    pub email: &'a str,
}

/// Returned by `accounts:signUp` and `accounts:signInWithPassword`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// The token endpoint answers in snake_case.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub user_id: String,
    #[serde(default)]
    pub expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
}

/// Extracts the bare provider code from a body such as
/// `{"error":{"message":"WEAK_PASSWORD : Password should be at least 6 characters"}}`.
pub fn provider_code(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let code = envelope
        .error
        .message
        .split(" : ")
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    (!code.is_empty()).then_some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_code_strips_detail_suffix() {
        let body = r#"{"error":{"code":400,"message":"WEAK_PASSWORD : Password should be at least 6 characters","errors":[]}}"#;
        assert_eq!(provider_code(body).as_deref(), Some("WEAK_PASSWORD"));
    }

    #[test]
    fn provider_code_handles_plain_codes_and_garbage() {
        assert_eq!(
            provider_code(r#"{"error":{"message":"EMAIL_EXISTS"}}"#).as_deref(),
            Some("EMAIL_EXISTS")
        );
        assert_eq!(provider_code("<html>bad gateway</html>"), None);
        assert_eq!(provider_code(r#"{"error":{"message":""}}"#), None);
    }

    #[test]
    fn credentials_serialize_camel_case() {
        let body = serde_json::to_string(&PasswordCredentials {
            email: "a@b.c",
            password: "secret123",
            return_secure_token: true,
        })
        .unwrap();
        assert!(body.contains("\"returnSecureToken\":true"));
    }
}
