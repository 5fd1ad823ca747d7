use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::auth::redirect::HOME;
use crate::auth::types::{Session, SignUpOutcome};
use crate::auth::{
    AuthClient, AuthError, AuthState, SessionStore, password_strength, strength_label,
};
use crate::config::Config;
use crate::format;
use crate::library::{Catalog, FilterState, PageLoader, normalize_title};
use crate::share::{encode_component, share_links, watch_path};
use crate::store::PostgrestClient;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout covering DNS + connect + response body.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("No video titled '{0}'")]
    VideoNotFound(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Command handlers behind the CLI. Each returns the text to print.
///
/// Browsing commands need a signed-in session; without one they remember
/// the route to return to and fail with `AuthError::LoginRequired`.
pub struct App {
    http: Client,
    config: Config,
    auth: AuthState,
}

impl App {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http, config))
    }

    pub(crate) fn with_client(http: Client, config: Config) -> Self {
        let auth = AuthState::new(
            AuthClient::new(http.clone(), &config),
            SessionStore::new(&config.state_dir),
            config.site_url.clone(),
        );
        Self { http, config, auth }
    }

    fn catalog(&self, session: &Session) -> Catalog<PostgrestClient> {
        let store = PostgrestClient::new(self.http.clone(), &self.config)
            .with_access_token(&session.access_token);
        Catalog::new(store, &self.config.table)
    }

    /// Where auth emails and third-party sign-in land, carrying the pending route.
    fn auth_redirect(&self, next: Option<&str>) -> String {
        let site = self.config.site_url.as_str().trim_end_matches('/');
        match next.map(str::trim).filter(|n| !n.is_empty()) {
            Some(next) => format!("{site}/auth?next={}", encode_component(next)),
            None => format!("{site}/auth"),
        }
    }

    pub async fn list(&self, filter: &FilterState) -> Result<String, AppError> {
        let session = self.auth.require_session(HOME).await?;
        info!(text = filter.text(), page = filter.page(), "cmd:list");
        let loader = PageLoader::new(self.catalog(&session));
        let page = loader.load(filter).await.unwrap_or_default();
        Ok(format::format_page(filter, &page))
    }

    pub async fn options(&self) -> Result<String, AppError> {
        let session = self.auth.require_session(HOME).await?;
        let options = self.catalog(&session).filter_options().await;
        Ok(format::format_options(&options))
    }

    pub async fn watch(&self, title: &str) -> Result<String, AppError> {
        let title = normalize_title(title);
        let session = self.auth.require_session(&watch_path(&title)).await?;
        info!(%title, "cmd:watch");
        let catalog = self.catalog(&session);
        let video = catalog
            .find_video(&title)
            .await
            .ok_or_else(|| AppError::VideoNotFound(title.clone()))?;

        let mut out = format::format_video(&video, &self.config.site_url);
        out.push('\n');
        out.push_str(&format::format_related(&catalog.related(&video).await));
        out.push('\n');
        out.push_str(&format::format_share(&share_links(
            &self.config.site_url,
            &video.title,
        )));
        Ok(out)
    }

    pub async fn related(&self, title: &str) -> Result<String, AppError> {
        let title = normalize_title(title);
        let session = self.auth.require_session(&watch_path(&title)).await?;
        let catalog = self.catalog(&session);
        let video = catalog
            .find_video(&title)
            .await
            .ok_or_else(|| AppError::VideoNotFound(title.clone()))?;
        Ok(format::format_related(&catalog.related(&video).await))
    }

    /// Share links need no session: they only point at the public watch page.
    pub fn share(&self, title: &str) -> String {
        format::format_share(&share_links(&self.config.site_url, &normalize_title(title)))
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        next: Option<&str>,
    ) -> Result<String, AppError> {
        let session = self.auth.sign_in_with_password(email.trim(), password).await?;
        let next = self.auth.take_next(next);
        Ok(format!(
            "{}Continue at {}{}\n",
            format::format_whoami(Some(&session)),
            self.config.site_url.as_str().trim_end_matches('/'),
            next
        ))
    }

    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        next: Option<&str>,
    ) -> Result<String, AppError> {
        let strength = strength_label(password_strength(password));
        let stored = self.auth.store().next();
        let redirect = self.auth_redirect(next.or(stored.as_deref()));
        let outcome = self
            .auth
            .sign_up(email.trim(), password, Some(&redirect))
            .await?;
        Ok(match outcome {
            SignUpOutcome::SignedIn(session) => format!(
                "Account created (password strength: {strength}).\n{}",
                format::format_whoami(Some(&session))
            ),
            SignUpOutcome::ConfirmationSent(user) => format!(
                "Account created (password strength: {strength}). Check {} to confirm.\n",
                user.email.as_deref().unwrap_or(email.trim())
            ),
        })
    }

    pub async fn logout(&self) -> Result<String, AppError> {
        self.auth.sign_out().await?;
        Ok("Signed out.\n".to_string())
    }

    pub async fn reset_password(&self, email: &str) -> Result<String, AppError> {
        let stored = self.auth.store().next();
        let redirect = self.auth_redirect(stored.as_deref());
        self.auth
            .client()
            .reset_password_for_email(email.trim(), &redirect)
            .await?;
        Ok(format!("Password reset email sent to {}.\n", email.trim()))
    }

    pub fn oauth_url(&self, provider: &str, next: Option<&str>) -> Result<String, AppError> {
        let stored = self.auth.store().next();
        let redirect = self.auth_redirect(next.or(stored.as_deref()));
        let url = self
            .auth
            .client()
            .oauth_authorize_url(provider.trim(), &redirect)?;
        Ok(format!("Open this URL to sign in with {provider}:\n{url}\n"))
    }

    pub async fn whoami(&self) -> Result<String, AppError> {
        let session = self.auth.get_session().await?;
        Ok(format::format_whoami(session.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::now_unix;
    use crate::auth::test_support::{session, temp_store};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server_uri: &str, state_dir: &std::path::Path) -> Config {
        let state_dir = state_dir.to_string_lossy().into_owned();
        let server_uri = server_uri.to_string();
        Config::from_lookup(move |key| match key {
            "SUPABASE_URL" => Some(server_uri.clone()),
            "SUPABASE_ANON_KEY" => Some("anon".into()),
            "VIDSHELF_TABLE" => Some("videos".into()),
            "VIDSHELF_STATE_DIR" => Some(state_dir.clone()),
            "VIDSHELF_SITE_URL" => Some("https://videos.example.com".into()),
            _ => None,
        })
        .unwrap()
    }

    fn app(server_uri: &str) -> (App, SessionStore) {
        let store = temp_store();
        let app = App::with_client(Client::new(), config(server_uri, store.dir()));
        (app, store)
    }

    fn signed_in(server_uri: &str) -> App {
        let (app, store) = app(server_uri);
        store.save(&session(Some(now_unix() + 3600))).unwrap();
        app
    }

    fn video_json(title: &str) -> serde_json::Value {
        serde_json::json!({
            "videotitle": title,
            "description": "desc",
            "category": "Food",
            "language": "English",
            "yt_tags": "soup",
            "yt_url": "https://youtu.be/dQw4w9WgXcQ",
            "thumbnail": null
        })
    }

    #[tokio::test]
    async fn list_without_session_remembers_home() {
        let (app, store) = app("http://localhost:0");
        let err = app.list(&FilterState::default()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Auth(AuthError::LoginRequired { ref next }) if next == "/"
        ));
        assert_eq!(store.next().as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn watch_without_session_remembers_watch_route() {
        let (app, store) = app("http://localhost:0");
        let err = app.watch("Soup & Bread").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::LoginRequired { .. })));
        assert_eq!(store.next().as_deref(), Some("/watch/Soup%20%26%20Bread"));
    }

    #[tokio::test]
    async fn list_queries_with_user_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/videos"))
            .and(header("Authorization", "Bearer access"))
            .and(query_param(
                "or",
                "(videotitle.ilike.%soup%,description.ilike.%soup%,yt_tags.ilike.%soup%)",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("Content-Range", "0-0/1")
                    .set_body_json(serde_json::json!([video_json("Soup")])),
            )
            .mount(&server)
            .await;

        let app = signed_in(&server.uri());
        let mut filter = FilterState::default();
        filter.set_text("soup");
        let out = app.list(&filter).await.unwrap();
        assert!(out.contains("1. Soup [Food / English]"), "got: {out}");
        assert!(out.contains("page 1 of 1 (1 videos)"), "got: {out}");
    }

    #[tokio::test]
    async fn watch_missing_video_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let app = signed_in(&server.uri());
        let err = app.watch("Nothing").await.unwrap_err();
        assert!(matches!(err, AppError::VideoNotFound(ref t) if t == "Nothing"));
    }

    #[tokio::test]
    async fn watch_decodes_title_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/videos"))
            .and(query_param("videotitle", "eq.Top 10%41"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([video_json("Top 10%41")])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let app = signed_in(&server.uri());
        let out = app.watch("Top 10%2541").await.unwrap();
        assert!(out.starts_with("# Top 10%41\n"), "got: {out}");
    }

    #[tokio::test]
    async fn login_returns_to_stored_route() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "access",
                "refresh_token": "refresh",
                "expires_in": 3600,
                "user": {"id": "user-1", "email": "me@example.com"}
            })))
            .mount(&server)
            .await;

        let (app, store) = app(&server.uri());
        store.set_next("/watch/Soup");
        let out = app.login("me@example.com", "hunter22", None).await.unwrap();
        assert!(out.contains("Signed in as me@example.com"));
        assert!(out.contains("Continue at https://videos.example.com/watch/Soup"));
        assert_eq!(store.next(), None);
    }

    #[tokio::test]
    async fn signup_sends_auth_redirect_with_next() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(query_param(
                "redirect_to",
                "https://videos.example.com/auth?next=%2Fwatch%2FSoup",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "user-2",
                "email": "new@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (app, _) = app(&server.uri());
        let out = app
            .signup("new@example.com", "hunter22", Some("/watch/Soup"))
            .await
            .unwrap();
        assert!(out.contains("Check new@example.com"), "got: {out}");
    }

    #[test]
    fn oauth_url_points_back_to_auth_page() {
        let (app, _) = app("https://abc.supabase.co");
        let out = app.oauth_url("google", None).unwrap();
        assert!(out.contains("https://abc.supabase.co/auth/v1/authorize?provider=google"));
        assert!(out.contains("redirect_to=https%3A%2F%2Fvideos.example.com%2Fauth"));
    }

    #[test]
    fn share_needs_no_session() {
        let (app, _) = app("http://localhost:0");
        let out = app.share("Soup");
        assert!(out.contains("link:     https://videos.example.com/watch/Soup"));
    }

    #[tokio::test]
    async fn whoami_without_session() {
        let (app, _) = app("http://localhost:0");
        assert_eq!(app.whoami().await.unwrap(), "Not signed in.\n");
    }
}
