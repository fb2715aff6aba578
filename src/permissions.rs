//! Capability grants for the camera and the media library.
//!
//! Grants are never cached: callers ask again before every use so the answer
//! reflects the host's current settings. A denial is an ordinary `false`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufRead, IsTerminal, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Camera,
    Library,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Camera => "camera",
            Capability::Library => "library",
        })
    }
}

#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request_camera_access(&self) -> bool;
    async fn request_library_access(&self) -> bool;

    async fn request(&self, capability: Capability) -> bool {
        match capability {
            Capability::Camera => self.request_camera_access().await,
            Capability::Library => self.request_library_access().await,
        }
    }
}

/// How a capability request is answered on a desktop host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantPolicy {
    #[default]
    Prompt,
    Allow,
    Deny,
}

/// Answers from configuration, asking on the terminal for `Prompt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredPermissionGate {
    pub camera: GrantPolicy,
    pub library: GrantPolicy,
}

impl ConfiguredPermissionGate {
    pub fn new(camera: GrantPolicy, library: GrantPolicy) -> Self {
        Self { camera, library }
    }

    async fn resolve(&self, capability: Capability, policy: GrantPolicy) -> bool {
        let granted = match policy {
            GrantPolicy::Allow => true,
            GrantPolicy::Deny => false,
            GrantPolicy::Prompt => tokio::task::spawn_blocking(move || prompt(capability))
                .await
                .unwrap_or(false),
        };
        tracing::debug!(%capability, ?policy, granted, "permission request");
        granted
    }
}

#[async_trait]
impl PermissionGate for ConfiguredPermissionGate {
    async fn request_camera_access(&self) -> bool {
        self.resolve(Capability::Camera, self.camera).await
    }

    async fn request_library_access(&self) -> bool {
        self.resolve(Capability::Library, self.library).await
    }
}

/// Non-interactive sessions cannot answer, which counts as a denial.
fn prompt(capability: Capability) -> bool {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return false;
    }
    let mut stderr = io::stderr();
    if write!(stderr, "Allow colorizer to access your {capability}? [y/N] ").is_err() {
        return false;
    }
    let _ = stderr.flush();

    let mut answer = String::new();
    if stdin.lock().read_line(&mut answer).is_err() {
        return false;
    }
    parse_answer(&answer)
}

fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
