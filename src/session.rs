//! Signed-in user state and the application context that carries it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::error::{ColorizerError, Result};

/// Seconds before expiry at which a token is treated as stale.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    /// Handle shown in place of a username: everything before the `@`.
    pub fn username(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Persisted form of [`AppContext`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    #[serde(default)]
    pub session: Option<UserSession>,
    #[serde(default)]
    pub theme: Theme,
}

/// Current session and theme, passed explicitly to whatever needs them.
#[derive(Debug, Default)]
pub struct AppContext {
    session: RwLock<Option<UserSession>>,
    theme: RwLock<Theme>,
}

impl AppContext {
    pub fn new(state: AppState) -> Self {
        Self {
            session: RwLock::new(state.session),
            theme: RwLock::new(state.theme),
        }
    }

    pub fn session(&self) -> Option<UserSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn require_session(&self) -> Result<UserSession> {
        self.session().ok_or(ColorizerError::NotSignedIn)
    }

    pub fn set_session(&self, session: Option<UserSession>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    pub fn theme(&self) -> Theme {
        *self.theme.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_theme(&self, theme: Theme) {
        *self.theme.write().unwrap_or_else(PoisonError::into_inner) = theme;
    }

    pub fn toggle_theme(&self) -> Theme {
        let next = self.theme().toggled();
        self.set_theme(next);
        next
    }

    pub fn snapshot(&self) -> AppState {
        AppState {
            session: self.session(),
            theme: self.theme(),
        }
    }
}

/// JSON file holding the [`AppState`] between runs.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("session.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<AppState> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppState::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, state: &AppState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(state)?;

        // Holds the refresh token; owner-only on unix.
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(body.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn session(email: &str, expires_at: DateTime<Utc>) -> UserSession {
        UserSession {
            user_id: "u1".into(),
            email: email.into(),
            display_name: Some("Ada Lovelace".into()),
            id_token: "id".into(),
            refresh_token: "refresh".into(),
            expires_at,
        }
    }

    #[test]
    fn username_is_email_local_part() {
        let s = session("ada.l@example.com", Utc::now());
        assert_eq!(s.username(), "ada.l");
    }

    #[test]
    fn expiry_includes_skew() {
        let now = Utc::now();
        assert!(session("a@b.c", now + Duration::seconds(30)).is_expired_at(now));
        assert!(!session("a@b.c", now + Duration::minutes(30)).is_expired_at(now));
    }

    #[test]
    fn context_toggles_theme_and_requires_session() {
        let ctx = AppContext::default();
        assert_eq!(ctx.theme(), Theme::Light);
        assert_eq!(ctx.toggle_theme(), Theme::Dark);
        assert_eq!(ctx.toggle_theme(), Theme::Light);
        assert!(matches!(
            ctx.require_session(),
            Err(ColorizerError::NotSignedIn)
        ));

        ctx.set_session(Some(session("a@b.c", Utc::now())));
        assert_eq!(ctx.require_session().unwrap().user_id, "u1");
    }

    #[test]
    fn store_round_trips_state_and_defaults_when_missing() {
        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(&dir.path().join("nested"));
        assert!(store.load().unwrap().session.is_none());

        let state = AppState {
            session: Some(session("a@b.c", Utc::now())),
            theme: Theme::Dark,
        };
        store.save(&state).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.theme, Theme::Dark);
        assert_eq!(loaded.session, state.session);
    }

    #[test]
    fn poisoned_context_still_takes_writes() {
        let ctx = AppContext::default();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _theme = ctx.theme.write().unwrap();
            let _session = ctx.session.write().unwrap();
            panic!("poison both locks");
        }));
        assert!(ctx.theme.is_poisoned());

        ctx.set_theme(Theme::Dark);
        ctx.set_session(Some(session("ada@example.com", Utc::now() + Duration::hours(1))));

        assert_eq!(ctx.theme(), Theme::Dark);
        assert_eq!(ctx.session().map(|s| s.email), Some("ada@example.com".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn saved_state_is_readable_by_the_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        std::fs::write(store.path(), "{}").unwrap();
        std::fs::set_permissions(store.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        store.save(&AppState::default()).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
