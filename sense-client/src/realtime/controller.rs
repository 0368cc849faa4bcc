//! Connection state machine for the realtime feed.
//!
//! ```text
//!            start()              Open
//!   Idle ─────────────► Connecting ─────► Open
//!    ▲                      │               │
//!    │        Close         │     Close     │
//!    └──────────────────────┴───────────────┘
//!         (auto-reconnect: straight back to Connecting)
//! ```
//!
//! Every connection attempt gets a generation number. `stop()` and each
//! new attempt bump it, and events from a channel whose generation is no
//! longer current are ignored. A close from a stopped or replaced channel
//! therefore never triggers a reconnect.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::channel::{ChannelEvent, Connector};
use crate::{
    error::{Error, Result},
    events::{ClientEvent, EventEmitter},
    session::SessionManager,
    tracing::prelude::*,
};

/// Where the realtime feed stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RealtimeState {
    /// Not connected and not trying to be
    #[default]
    Idle,
    /// Obtaining a token or waiting for the socket to open
    Connecting,
    /// Receiving messages
    Open,
}

#[derive(Debug, Default)]
struct FeedState {
    phase: RealtimeState,
    generation: u64,
    monitor_id: Option<u64>,
    closer: Option<CancellationToken>,
}

enum Finished {
    Stale,
    Idle,
    Reconnect(u64),
}

impl FeedState {
    /// Claim the feed for a new attempt, unless one is already under way.
    fn reserve(&mut self, monitor_id: u64) -> Option<u64> {
        if self.phase != RealtimeState::Idle {
            return None;
        }
        self.generation += 1;
        self.phase = RealtimeState::Connecting;
        self.monitor_id = Some(monitor_id);
        Some(self.generation)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.phase != RealtimeState::Idle
    }

    /// Give up an attempt that failed before a channel was opened.
    fn release(&mut self, generation: u64) {
        if self.is_current(generation) {
            self.reset();
        }
    }

    fn mark_open(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.phase = RealtimeState::Open;
        true
    }

    // Idle and the reconnect reservation happen under one lock so stop()
    // cannot slip in between them.
    fn finish(&mut self, generation: u64, auto_reconnect: bool) -> Finished {
        if !self.is_current(generation) {
            return Finished::Stale;
        }
        self.closer = None;
        if auto_reconnect {
            self.generation += 1;
            self.phase = RealtimeState::Connecting;
            Finished::Reconnect(self.generation)
        } else {
            self.reset();
            Finished::Idle
        }
    }

    fn stop(&mut self) -> Option<Option<CancellationToken>> {
        if self.phase == RealtimeState::Idle {
            return None;
        }
        self.generation += 1;
        let closer = self.closer.take();
        self.reset();
        Some(closer)
    }

    fn reset(&mut self) {
        self.phase = RealtimeState::Idle;
        self.monitor_id = None;
        self.closer = None;
    }
}

/// Owns the single realtime connection of a client.
pub struct RealtimeController {
    state: Mutex<FeedState>,
    connector: Arc<dyn Connector>,
    sessions: Arc<SessionManager>,
    emitter: Arc<EventEmitter>,
    realtime_url: String,
    auto_reconnect: bool,
}

impl RealtimeController {
    pub fn new(
        connector: Arc<dyn Connector>,
        sessions: Arc<SessionManager>,
        emitter: Arc<EventEmitter>,
        realtime_url: String,
        auto_reconnect: bool,
    ) -> Self {
        Self {
            state: Mutex::new(FeedState::default()),
            connector,
            sessions,
            emitter,
            realtime_url,
            auto_reconnect,
        }
    }

    pub fn state(&self) -> RealtimeState {
        self.state.lock().phase
    }

    /// Monitor the feed is connected or connecting to.
    pub fn monitor_id(&self) -> Option<u64> {
        self.state.lock().monitor_id
    }

    /// Start streaming updates for `monitor_id`.
    ///
    /// The already-started check runs here, when `start` is called, not
    /// when the returned future is first polled. Two calls in a row open
    /// one channel. The future resolves once the channel has been handed
    /// to the connector; [`RealtimeState::Open`] follows when the socket
    /// opens.
    pub fn start(self: &Arc<Self>, monitor_id: u64) -> BoxFuture<'static, Result<()>> {
        let reserved = self.state.lock().reserve(monitor_id);
        match reserved {
            Some(generation) => self.clone().connect(generation, monitor_id),
            None => {
                warn!(monitor_id, "Real-time updates already started.");
                Box::pin(async { Ok(()) })
            }
        }
    }

    /// Close the feed and cancel any attempt in flight. Safe to call at any
    /// time, any number of times.
    pub fn stop(&self) {
        let stopped = self.state.lock().stop();
        match stopped {
            None => trace!("Real-time updates not running."),
            Some(closer) => {
                if let Some(closer) = closer {
                    closer.cancel();
                }
                info!("Real-time updates stopped.");
            }
        }
    }

    fn connect(self: Arc<Self>, generation: u64, monitor_id: u64) -> BoxFuture<'static, Result<()>> {
        Box::pin(async move {
            let result = self.open_channel(generation, monitor_id).await;
            if let Err(e) = &result {
                debug!(monitor_id, error = %e, "Real-time connection attempt failed.");
                self.state.lock().release(generation);
            }
            result
        })
    }

    async fn open_channel(self: &Arc<Self>, generation: u64, monitor_id: u64) -> Result<()> {
        let access_token = self.sessions.ensure_fresh_token().await?;
        let url = feed_url(&self.realtime_url, monitor_id, &access_token)?;

        let channel = {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                debug!(monitor_id, "Real-time updates stopped before the channel opened.");
                return Ok(());
            }
            let channel = self.connector.open(url);
            state.closer = Some(channel.closer.clone());
            channel
        };

        info!(monitor_id, "Connecting to real-time feed.");
        tokio::spawn(self.clone().pump(generation, monitor_id, channel.events));
        Ok(())
    }

    async fn pump(
        self: Arc<Self>,
        generation: u64,
        monitor_id: u64,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                ChannelEvent::Open => {
                    if self.state.lock().mark_open(generation) {
                        info!(monitor_id, "Real-time feed open.");
                    }
                }
                ChannelEvent::Message(text) => {
                    if !self.state.lock().is_current(generation) {
                        continue;
                    }
                    match serde_json::from_str::<Value>(&text) {
                        Ok(payload) => self
                            .emitter
                            .emit(&ClientEvent::RealtimeUpdate { monitor_id, payload }),
                        Err(e) => {
                            warn!(monitor_id, error = %e, "Discarding malformed real-time message.")
                        }
                    }
                }
                ChannelEvent::Error(message) => {
                    warn!(monitor_id, error = %message, "Real-time feed error.");
                }
                ChannelEvent::Close => break,
            }
        }

        let finished = self.state.lock().finish(generation, self.auto_reconnect);
        match finished {
            Finished::Stale => trace!(monitor_id, "Stale real-time channel closed."),
            Finished::Idle => info!(monitor_id, "Real-time feed closed."),
            Finished::Reconnect(next) => {
                info!(monitor_id, "Real-time feed closed, reconnecting.");
                if let Err(e) = self.clone().connect(next, monitor_id).await {
                    error!(monitor_id, error = %e, "Failed to reconnect to real-time feed.");
                }
            }
        }
    }
}

fn feed_url(base: &str, monitor_id: u64, access_token: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("{base}/monitors/{monitor_id}/realtimefeed"))
        .map_err(|e| Error::Config(format!("realtime_url: {e}")))?;
    url.query_pairs_mut().append_pair("access_token", access_token);
    Ok(url)
}
