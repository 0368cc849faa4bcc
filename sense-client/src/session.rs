//! Session state and access token freshness.
//!
//! A [`Session`] is only ever replaced wholesale. [`SessionManager`] owns
//! the current value, publishes [`ClientEvent::SessionChanged`] once per
//! actual change, and guards authenticated calls with
//! [`SessionManager::ensure_fresh_token`], which renews the access token
//! shortly before it expires.
//!
//! Renewal is single-flight: concurrent callers queue behind one
//! `/renew` exchange and then see its result, rather than each spending
//! the same refresh token.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{
    error::{Error, Result},
    events::{ClientEvent, EventEmitter},
    http::{Fetcher, HttpRequest},
    token::AccessTokenClaims,
    tracing::prelude::*,
    types::{AuthenticationResponse, RenewResponse},
};

/// Tokens expiring sooner than this are renewed before use.
pub const RENEWAL_LOOKAHEAD: Duration = Duration::minutes(15);

/// Persisted authentication state.
///
/// Serializes in camelCase (`userId`, `monitorIds`, `accessToken`,
/// `refreshToken`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: u64,
    pub monitor_ids: Vec<u64>,
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("monitor_ids", &self.monitor_ids)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

impl From<AuthenticationResponse> for Session {
    fn from(response: AuthenticationResponse) -> Self {
        Self {
            user_id: response.user_id,
            monitor_ids: response.monitors.iter().map(|m| m.id).collect(),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        }
    }
}

/// Owner of the current session.
pub struct SessionManager {
    current: Mutex<Option<Session>>,
    // Serializes replace-and-notify so notifications arrive in the order
    // the values were assigned. Reentrant so a handler may replace again.
    transition: ReentrantMutex<()>,
    renewing: tokio::sync::Mutex<()>,
    emitter: Arc<EventEmitter>,
    fetcher: Arc<dyn Fetcher>,
    api_url: String,
}

impl SessionManager {
    /// Seed with `initial` without notifying.
    pub fn new(
        initial: Option<Session>,
        emitter: Arc<EventEmitter>,
        fetcher: Arc<dyn Fetcher>,
        api_url: String,
    ) -> Self {
        Self {
            current: Mutex::new(initial),
            transition: ReentrantMutex::new(()),
            renewing: tokio::sync::Mutex::new(()),
            emitter,
            fetcher,
            api_url,
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.current.lock().clone()
    }

    pub(crate) fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub(crate) fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Replace the session, notifying if the value changed.
    ///
    /// Returns whether it changed.
    pub fn replace(&self, session: Option<Session>) -> bool {
        let _transition = self.transition.lock();
        {
            let mut current = self.current.lock();
            if *current == session {
                return false;
            }
            *current = session.clone();
        }
        debug!(authenticated = session.is_some(), "Session changed.");
        self.emitter.emit(&ClientEvent::SessionChanged(session));
        true
    }

    /// Replace the session only if it still equals `expected`.
    fn replace_if_current(&self, expected: &Session, session: Option<Session>) -> bool {
        let _transition = self.transition.lock();
        if self.current.lock().as_ref() != Some(expected) {
            return false;
        }
        self.replace(session)
    }

    /// Adopt the identity and tokens of a successful authentication.
    pub(crate) fn adopt(&self, response: AuthenticationResponse) -> Session {
        let session = Session::from(response);
        info!(
            user_id = session.user_id,
            monitors = session.monitor_ids.len(),
            "Authenticated."
        );
        self.replace(Some(session.clone()));
        session
    }

    /// Access token for an authenticated call, renewed if it expires within
    /// [`RENEWAL_LOOKAHEAD`].
    ///
    /// A token that cannot be parsed clears the session, since it will never
    /// become valid. A failed renewal leaves the session as it was.
    pub async fn ensure_fresh_token(&self) -> Result<String> {
        let _renewing = self.renewing.lock().await;

        let session = self
            .session()
            .ok_or_else(|| Error::unauthenticated(""))?;

        let claims = match AccessTokenClaims::parse(&session.access_token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Access token is unusable, clearing session.");
                self.replace_if_current(&session, None);
                return Err(Error::unauthenticated(e.to_string()));
            }
        };

        if !claims.expires_within(RENEWAL_LOOKAHEAD, OffsetDateTime::now_utc()) {
            trace!("Access token is still valid, not renewing.");
            return Ok(session.access_token);
        }

        debug!(expires_at = ?claims.expires_at(), "Renewing access token.");
        let renewed = self.renew(&session, &claims).await?;
        let access_token = renewed.access_token.clone();

        if !self.replace_if_current(&session, Some(renewed)) {
            warn!("Session changed while renewing the access token.");
            return Err(Error::unauthenticated(
                "the session changed while the access token was being renewed",
            ));
        }

        info!("Access token renewed.");
        Ok(access_token)
    }

    async fn renew(&self, session: &Session, claims: &AccessTokenClaims) -> Result<Session> {
        let request = HttpRequest::post_form(
            format!("{}/renew", self.api_url),
            &[
                ("user_id", claims.subject.as_str()),
                ("refresh_token", session.refresh_token.as_str()),
            ],
        );

        let response = self.fetcher.fetch(request).await?;
        if !response.is_success() {
            error!(status = response.status, "Failed to renew access token.");
            return Err(response.into_error());
        }

        let tokens: RenewResponse = response.json()?;
        Ok(Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            ..session.clone()
        })
    }
}
