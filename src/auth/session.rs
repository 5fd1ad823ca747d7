use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use super::redirect::resolve_next;
use super::types::{AuthChange, AuthEvent, Session, SignUpOutcome};
use super::{AuthClient, AuthError, now_unix};

const SESSION_FILE: &str = "session.json";
const NEXT_FILE: &str = "next";
/// Refresh the access token when it expires within this many seconds.
const EXPIRY_MARGIN_SECS: u64 = 60;

/// Session and pending redirect kept on disk between runs.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Missing or unreadable session files count as signed out.
    pub fn load(&self) -> Option<Session> {
        let path = self.path(SESSION_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to read session");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .inspect_err(|e| warn!(error = %e, "ignoring corrupt session file"))
            .ok()
    }

    pub fn save(&self, session: &Session) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(session).map_err(std::io::Error::from)?;
        write_private(&self.dir, &self.path(SESSION_FILE), &json)
    }

    pub fn clear(&self) -> Result<(), AuthError> {
        remove_if_exists(&self.path(SESSION_FILE))
    }

    /// Remember where to go after sign-in. Failures are logged, never fatal.
    pub fn set_next(&self, next: &str) {
        if next.trim().is_empty() {
            return;
        }
        if let Err(e) = write_private(&self.dir, &self.path(NEXT_FILE), next.trim()) {
            warn!(error = %e, %next, "failed to store next route");
        }
    }

    pub fn next(&self) -> Option<String> {
        fs::read_to_string(self.path(NEXT_FILE))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn clear_next(&self) {
        if let Err(e) = remove_if_exists(&self.path(NEXT_FILE)) {
            warn!(error = %e, "failed to clear next route");
        }
    }
}

/// Write via a temp file and rename so a crash never leaves half a session behind.
/// The temp file is owner-only from creation and removed if the write fails.
fn write_private(dir: &Path, path: &Path, contents: &str) -> Result<(), AuthError> {
    fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(".tmp-{:016x}", fastrand::u64(..)));
    if let Err(e) = create_private(&tmp, contents).and_then(|()| fs::rename(&tmp, path)) {
        if let Err(cleanup) = fs::remove_file(&tmp)
            && cleanup.kind() != ErrorKind::NotFound
        {
            warn!(error = %cleanup, path = %tmp.display(), "failed to remove temp file");
        }
        return Err(e.into());
    }
    Ok(())
}

fn create_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

fn remove_if_exists(path: &Path) -> Result<(), AuthError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Current sign-in state: the auth client, the persisted session and a
/// broadcast of every change to it.
pub struct AuthState {
    client: AuthClient,
    store: SessionStore,
    site_url: Url,
    changes: watch::Sender<AuthChange>,
}

impl AuthState {
    pub fn new(client: AuthClient, store: SessionStore, site_url: Url) -> Self {
        let initial = AuthChange {
            event: AuthEvent::InitialSession,
            session: store.load(),
        };
        let (changes, _) = watch::channel(initial);
        Self {
            client,
            store,
            site_url,
            changes,
        }
    }

    pub fn client(&self) -> &AuthClient {
        &self.client
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Receive every subsequent sign-in, sign-out and refresh.
    pub fn subscribe(&self) -> watch::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    fn publish(&self, event: AuthEvent, session: Option<Session>) {
        self.changes.send_replace(AuthChange { event, session });
    }

    /// The persisted session, refreshed when close to expiry.
    ///
    /// A refresh the provider rejects signs the user out. Network failures
    /// are returned so a flaky connection does not discard the session.
    pub async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.store.load() else {
            return Ok(None);
        };
        if !session.expires_within(now_unix(), EXPIRY_MARGIN_SECS) {
            return Ok(Some(session));
        }

        debug!(user = %session.user.id, "session near expiry, refreshing");
        match self.client.refresh_session(&session.refresh_token).await {
            Ok(fresh) => {
                self.store.save(&fresh)?;
                self.publish(AuthEvent::TokenRefreshed, Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(AuthError::Rejected(reason)) => {
                info!(%reason, "stored session no longer valid, signing out");
                self.store.clear()?;
                self.publish(AuthEvent::SignedOut, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The session, or `LoginRequired` after remembering `next` for after sign-in.
    pub async fn require_session(&self, next: &str) -> Result<Session, AuthError> {
        match self.get_session().await? {
            Some(session) => Ok(session),
            None => {
                self.store.set_next(next);
                Err(AuthError::LoginRequired {
                    next: next.to_string(),
                })
            }
        }
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let session = self.client.sign_in_with_password(email, password).await?;
        self.store.save(&session)?;
        info!(user = %session.user.id, "signed in");
        self.publish(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        let outcome = self.client.sign_up(email, password, redirect_to).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.store.save(session)?;
            self.publish(AuthEvent::SignedIn, Some(session.clone()));
        }
        Ok(outcome)
    }

    /// Revoke remotely when possible; the local session is cleared regardless.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(session) = self.store.load()
            && let Err(e) = self.client.sign_out(&session.access_token).await
        {
            warn!(error = %e, "remote sign-out failed, clearing local session anyway");
        }
        self.store.clear()?;
        self.publish(AuthEvent::SignedOut, None);
        Ok(())
    }

    /// Consume the pending redirect: `explicit` wins over the stored route.
    pub fn take_next(&self, explicit: Option<&str>) -> String {
        let stored = self.store.next();
        let next = resolve_next(explicit, stored.as_deref(), &self.site_url);
        self.store.clear_next();
        next
    }
}
