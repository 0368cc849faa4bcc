//! The client facade.
//!
//! [`SenseClient`] wires the pieces together: a [`SessionManager`] for
//! credentials, a [`RealtimeController`] for the push feed, and one
//! [`EventEmitter`] both of them publish to. Clones share all state, so a
//! clone can be moved into a task or an event handler.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use url::Url;

use crate::{
    auth::{self, LoginOutcome},
    config::ClientConfig,
    error::{Error, Result},
    events::EventEmitter,
    http::{Fetcher, HttpRequest, ReqwestFetcher},
    realtime::{Connector, RealtimeController, RealtimeState, TungsteniteConnector},
    session::{Session, SessionManager},
    timestamp::iso8601_utc,
    tracing::prelude::*,
    types::{Device, MonitorOverview, TrendScale, Trends},
};

/// Client for the Sense cloud API.
#[derive(Clone)]
pub struct SenseClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    emitter: Arc<EventEmitter>,
    sessions: Arc<SessionManager>,
    realtime: Arc<RealtimeController>,
}

/// Builder for [`SenseClient`].
#[derive(Default)]
pub struct SenseClientBuilder {
    session: Option<Session>,
    config: ClientConfig,
    fetcher: Option<Arc<dyn Fetcher>>,
    connector: Option<Arc<dyn Connector>>,
}

impl SenseClientBuilder {
    /// Resume a previously persisted session. No event is emitted for it.
    pub fn session(mut self, session: Option<Session>) -> Self {
        self.session = session;
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the reqwest-based HTTP collaborator.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replace the tokio-tungstenite realtime collaborator.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn build(self) -> Result<SenseClient> {
        let config = self.config.validate()?;
        Ok(SenseClient::assemble(
            self.session,
            config,
            self.fetcher,
            self.connector,
        ))
    }
}

impl SenseClient {
    /// Client for the production service with default collaborators.
    pub fn new(session: Option<Session>) -> Self {
        Self::assemble(session, ClientConfig::default(), None, None)
    }

    pub fn builder() -> SenseClientBuilder {
        SenseClientBuilder::default()
    }

    fn assemble(
        session: Option<Session>,
        config: ClientConfig,
        fetcher: Option<Arc<dyn Fetcher>>,
        connector: Option<Arc<dyn Connector>>,
    ) -> Self {
        let fetcher: Arc<dyn Fetcher> = match fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(ReqwestFetcher::new()),
        };
        let connector: Arc<dyn Connector> = match connector {
            Some(connector) => connector,
            None => Arc::new(TungsteniteConnector),
        };
        let emitter = Arc::new(EventEmitter::new());

        let sessions = Arc::new(SessionManager::new(
            session,
            emitter.clone(),
            fetcher,
            config.api_url.clone(),
        ));
        let realtime = Arc::new(RealtimeController::new(
            connector,
            sessions.clone(),
            emitter.clone(),
            config.realtime_url.clone(),
            config.auto_reconnect,
        ));

        Self {
            inner: Arc::new(Inner {
                config,
                emitter,
                sessions,
                realtime,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Register handlers or subscribe to session and realtime events.
    pub fn events(&self) -> &EventEmitter {
        &self.inner.emitter
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.sessions.session()
    }

    /// Replace the session, emitting [`ClientEvent::SessionChanged`] if it
    /// differs from the current one.
    ///
    /// [`ClientEvent::SessionChanged`]: crate::ClientEvent::SessionChanged
    pub fn set_session(&self, session: Option<Session>) {
        self.inner.sessions.replace(session);
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.sessions.session().is_some()
    }

    /// Log in with email and password.
    ///
    /// Any current session is cleared first. When the account has a second
    /// factor, no session is created and the MFA token is returned instead.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        auth::login(&self.inner.sessions, email, password).await
    }

    /// Finish a login that returned [`LoginOutcome::MfaRequired`].
    pub async fn complete_mfa_login(
        &self,
        mfa_token: &str,
        code: &str,
        client_time: OffsetDateTime,
    ) -> Result<()> {
        auth::complete_mfa_login(&self.inner.sessions, mfa_token, code, client_time).await
    }

    /// Stop realtime updates and forget the session. No request is made.
    pub fn logout(&self) {
        self.inner.realtime.stop();
        if self.inner.sessions.replace(None) {
            info!("Logged out.");
        }
    }

    /// Access token for an authenticated call, renewed first if it is about
    /// to expire.
    pub async fn access_token(&self) -> Result<String> {
        self.inner.sessions.ensure_fresh_token().await
    }

    pub async fn get_monitor_overview(&self, monitor_id: u64) -> Result<MonitorOverview> {
        let url = format!("{}/app/monitors/{monitor_id}/overview", self.inner.config.api_url);
        self.get_json(url).await
    }

    pub async fn get_monitor_devices(&self, monitor_id: u64) -> Result<Vec<Device>> {
        let url = format!("{}/app/monitors/{monitor_id}/devices", self.inner.config.api_url);
        self.get_json(url).await
    }

    /// Usage trends for the `scale` period containing `at` (now if `None`).
    ///
    /// The period boundary is computed in `at`'s UTC offset, so pass a time
    /// in the monitor's local offset to line periods up with its days.
    pub async fn get_monitor_trends(
        &self,
        monitor_id: u64,
        scale: TrendScale,
        at: Option<OffsetDateTime>,
    ) -> Result<Trends> {
        let at = at.unwrap_or_else(OffsetDateTime::now_utc);
        let start = iso8601_utc(scale.period_start(at))?;

        let mut url = Url::parse(&format!("{}/app/history/trends", self.inner.config.api_url))
            .map_err(|e| Error::Config(format!("api_url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("monitor_id", &monitor_id.to_string())
            .append_pair("scale", &scale.to_string())
            .append_pair("start", &start);

        self.get_json(url.into()).await
    }

    /// Start streaming realtime updates for `monitor_id`.
    ///
    /// Does nothing if updates are already connecting or open; that check
    /// happens on the call, before the future is polled. Updates arrive as
    /// [`ClientEvent::RealtimeUpdate`].
    ///
    /// [`ClientEvent::RealtimeUpdate`]: crate::ClientEvent::RealtimeUpdate
    pub fn start_realtime_updates(&self, monitor_id: u64) -> BoxFuture<'static, Result<()>> {
        self.inner.realtime.start(monitor_id)
    }

    /// Close the realtime feed without reconnecting.
    pub fn stop_realtime_updates(&self) {
        self.inner.realtime.stop();
    }

    pub fn realtime_state(&self) -> RealtimeState {
        self.inner.realtime.state()
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let access_token = self.inner.sessions.ensure_fresh_token().await?;
        let request = HttpRequest::get(url).bearer(&access_token);

        let response = self.inner.sessions.fetcher().fetch(request).await?;
        if !response.is_success() {
            warn!(url = %response.url, status = response.status, "Sense API request failed.");
            return Err(response.into_error());
        }
        response.json()
    }
}
