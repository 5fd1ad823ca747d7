//! Client for the BaaS auth endpoints plus local session handling.

pub mod redirect;
mod session;
pub mod types;

pub use session::{AuthState, SessionStore};
#[cfg(test)]
pub(crate) use session::tests as test_support;

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ApiKey, Config};
use types::{AuthApiError, Session, SignUpOutcome};

const AUTH_PATH: &str = "auth/v1";
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email address: '{0}'")]
    InvalidEmail(String),

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Sign-in required. Run `vidshelf login <email>`; you will be returned to {next}")]
    LoginRequired { next: String },

    #[error("Rejected by auth provider: {0}")]
    Rejected(String),

    #[error("Too many auth requests. Please retry later.")]
    RateLimited,

    #[error("Auth API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid auth URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Session storage error: {0}")]
    Storage(#[from] std::io::Error),
}

pub(crate) fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !email.chars().any(char::is_whitespace)
        && !local.is_empty()
        && !domain.contains('@')
        && !host.is_empty()
        && !tld.is_empty()
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if !is_valid_email(email) {
        return Err(AuthError::InvalidEmail(email.to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }
    Ok(())
}

/// Rough password strength from 0 to 5: length ≥ 8, upper, lower, digit, symbol.
pub fn password_strength(password: &str) -> u8 {
    [
        password.chars().count() >= 8,
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ]
    .into_iter()
    .filter(|&hit| hit)
    .count() as u8
}

pub fn strength_label(score: u8) -> &'static str {
    match score {
        0 | 1 => "very weak",
        2 => "weak",
        3 => "ok",
        4 => "good",
        _ => "strong",
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct RecoverRequest<'a> {
    email: &'a str,
}

/// HTTP client for the hosted auth API (GoTrue).
///
/// Every request carries the anon key as `apikey`. Sign-out additionally
/// carries the user's access token.
#[derive(Clone, Debug)]
pub struct AuthClient {
    http: Client,
    base_url: Url,
    anon_key: ApiKey,
}

impl AuthClient {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.project_url.clone(),
            anon_key: config.anon_key.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: Url::parse(base_url).expect("test base url"),
            anon_key: ApiKey::new("test-anon-key"),
        }
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, AuthError> {
        let mut url = self.base_url.join(&format!("{AUTH_PATH}/{path}"))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn post(&self, url: Url) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("apikey", self.anon_key.expose())
            .header("User-Agent", crate::USER_AGENT)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, AuthError> {
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        Err(classify(status, &response.text().await.unwrap_or_default()))
    }

    async fn send_empty(&self, req: reqwest::RequestBuilder) -> Result<(), AuthError> {
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(classify(status, &response.text().await.unwrap_or_default()))
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        validate_credentials(email, password)?;
        let url = self.endpoint("token", &[("grant_type", "password")])?;
        let session: Session = self
            .send_json(self.post(url).json(&Credentials { email, password }))
            .await?;
        debug!(user = %session.user.id, "signed in with password");
        Ok(session.stamp_expiry(now_unix()))
    }

    /// Register a new account. `redirect_to` is where the confirmation link lands.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        validate_credentials(email, password)?;
        let query: Vec<(&str, &str)> =
            redirect_to.map(|r| ("redirect_to", r)).into_iter().collect();
        let url = self.endpoint("signup", &query)?;
        let outcome: SignUpOutcome = self
            .send_json(self.post(url).json(&Credentials { email, password }))
            .await?;
        Ok(match outcome {
            SignUpOutcome::SignedIn(session) => {
                SignUpOutcome::SignedIn(session.stamp_expiry(now_unix()))
            }
            pending => pending,
        })
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let url = self.endpoint("token", &[("grant_type", "refresh_token")])?;
        let session: Session = self
            .send_json(self.post(url).json(&RefreshRequest { refresh_token }))
            .await?;
        debug!(user = %session.user.id, "session refreshed");
        Ok(session.stamp_expiry(now_unix()))
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = self.endpoint("logout", &[])?;
        self.send_empty(
            self.post(url)
                .header("Authorization", format!("Bearer {access_token}")),
        )
        .await
    }

    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), AuthError> {
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail(email.to_string()));
        }
        let url = self.endpoint("recover", &[("redirect_to", redirect_to)])?;
        self.send_empty(self.post(url).json(&RecoverRequest { email }))
            .await
    }

    /// URL that starts a third-party sign-in. Opening it is up to the caller.
    pub fn oauth_authorize_url(&self, provider: &str, redirect_to: &str) -> Result<Url, AuthError> {
        self.endpoint(
            "authorize",
            &[("provider", provider), ("redirect_to", redirect_to)],
        )
    }
}

fn classify(status: StatusCode, body: &str) -> AuthError {
    let message = serde_json::from_str::<AuthApiError>(body)
        .ok()
        .and_then(AuthApiError::best_message)
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status.as_u16() {
        429 => {
            warn!("auth API rate limited");
            AuthError::RateLimited
        }
        400 | 401 | 403 | 422 => AuthError::Rejected(message),
        code => {
            warn!(code, %message, "auth API error");
            AuthError::Api { code, message }
        }
    }
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_json() -> serde_json::Value {
        serde_json::json!({
            "access_token": "access",
            "refresh_token": "refresh",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": {"id": "user-1", "email": "me@example.com"}
        })
    }

    #[tokio::test]
    async fn sign_in_posts_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "test-anon-key"))
            .and(body_json(serde_json::json!({
                "email": "me@example.com",
                "password": "hunter22"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_json()))
            .mount(&server)
            .await;

        let client = AuthClient::with_base_url(Client::new(), &server.uri());
        let session = client
            .sign_in_with_password("me@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(session.user.id, "user-1");
        assert!(session.expires_at.is_some());
    }

    #[tokio::test]
    async fn sign_in_bad_credentials_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let client = AuthClient::with_base_url(Client::new(), &server.uri());
        let err = client
            .sign_in_with_password("me@example.com", "wrongpass")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Rejected(ref m) if m.contains("Invalid login")));
    }

    #[tokio::test]
    async fn sign_up_pending_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(query_param("redirect_to", "https://videos.example.com/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "user-2",
                "email": "new@example.com",
                "confirmation_sent_at": "2026-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let client = AuthClient::with_base_url(Client::new(), &server.uri());
        let outcome = client
            .sign_up(
                "new@example.com",
                "hunter22",
                Some("https://videos.example.com/auth"),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, SignUpOutcome::ConfirmationSent(ref u) if u.id == "user-2"));
    }

    #[tokio::test]
    async fn sign_out_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("Authorization", "Bearer access"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = AuthClient::with_base_url(Client::new(), &server.uri());
        client.sign_out("access").await.unwrap();
    }

    #[tokio::test]
    async fn reset_password_posts_email() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/recover"))
            .and(query_param("redirect_to", "https://videos.example.com/auth"))
            .and(body_json(serde_json::json!({"email": "me@example.com"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = AuthClient::with_base_url(Client::new(), &server.uri());
        client
            .reset_password_for_email("me@example.com", "https://videos.example.com/auth")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reset_password_rejects_bad_email_without_request() {
        let client = AuthClient::with_base_url(Client::new(), "http://localhost:0");
        let err = client
            .reset_password_for_email("nope", "https://videos.example.com/auth")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidEmail(_)));
    }

    #[tokio::test]
    async fn refresh_uses_refresh_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(serde_json::json!({"refresh_token": "refresh"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_json()))
            .mount(&server)
            .await;

        let client = AuthClient::with_base_url(Client::new(), &server.uri());
        let session = client.refresh_session("refresh").await.unwrap();
        assert_eq!(session.access_token, "access");
    }
}
