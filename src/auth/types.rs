use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Token set returned by the auth provider, persisted between runs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<u64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the provider only sent the latter.
    pub(crate) fn stamp_expiry(mut self, now: u64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now.saturating_add(secs));
        }
        self
    }

    /// Whether the access token expires within `margin` seconds of `now`.
    /// Sessions without an expiry never expire.
    pub fn expires_within(&self, now: u64, margin: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now + margin)
    }
}

/// `signup` answers with a session when e-mail confirmation is off, else with the pending user.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationSent(User),
}

/// Error body shapes used by the auth provider across endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct AuthApiError {
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_code: Option<String>,
    pub msg: Option<String>,
    pub message: Option<String>,
}

impl AuthApiError {
    pub fn best_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error_code)
            .or(self.error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Latest auth state broadcast to subscribers.
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}
