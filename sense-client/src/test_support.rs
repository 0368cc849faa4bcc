//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};
use crate::http::{Fetcher, HttpRequest, HttpResponse};
use crate::realtime::{Channel, ChannelEvent, Connector};
use crate::token::VERSION_PREFIX;

/// Shape of a token built by [`make_token`].
pub struct TokenSpec {
    exp: Option<i64>,
    user_id: Option<Value>,
    prefixed: bool,
}

impl TokenSpec {
    pub fn expiring_in(seconds: i64) -> Self {
        Self {
            exp: Some(OffsetDateTime::now_utc().unix_timestamp() + seconds),
            user_id: Some(json!(123)),
            prefixed: true,
        }
    }

    pub fn user_id(mut self, user_id: Value) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn without_exp(mut self) -> Self {
        self.exp = None;
        self
    }

    pub fn without_user_id(mut self) -> Self {
        self.user_id = None;
        self
    }

    pub fn unprefixed(mut self) -> Self {
        self.prefixed = false;
        self
    }
}

/// A token shaped like the ones the service issues.
pub fn make_token(spec: TokenSpec) -> String {
    let header = STANDARD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());

    let mut claims = serde_json::Map::new();
    if let Some(exp) = spec.exp {
        claims.insert("exp".into(), json!(exp));
    }
    if let Some(user_id) = spec.user_id {
        claims.insert("userId".into(), user_id);
    }
    let claims = STANDARD.encode(Value::Object(claims).to_string());

    let prefix = if spec.prefixed { VERSION_PREFIX } else { "" };
    format!("{prefix}{header}.{claims}.signature")
}

enum Scripted {
    Response(HttpResponse),
    Gated(HttpResponse, Gate),
    Fail(String),
}

/// Coordinates a test with a response held back by [`MockFetcher`].
#[derive(Clone, Default)]
pub struct Gate {
    requested: Arc<Notify>,
    released: Arc<Notify>,
}

impl Gate {
    pub async fn wait_for_request(&self) {
        self.requested.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

/// [`Fetcher`] that replays scripted responses in order and records every
/// request.
#[derive(Default)]
pub struct MockFetcher {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_json(&self, status: u16, body: Value) {
        self.script
            .lock()
            .push_back(Scripted::Response(response(status, body)));
    }

    pub fn respond_status(&self, status: u16, status_text: &str) {
        let mut resp = response(status, Value::Null);
        resp.status_text = status_text.to_string();
        resp.body = Bytes::new();
        self.script.lock().push_back(Scripted::Response(resp));
    }

    /// Respond only after the test calls [`Gate::release`].
    pub fn respond_gated(&self, status: u16, body: Value) -> Gate {
        let gate = Gate::default();
        self.script
            .lock()
            .push_back(Scripted::Gated(response(status, body), gate.clone()));
        gate
    }

    pub fn fail_transport(&self, message: &str) {
        self.script
            .lock()
            .push_back(Scripted::Fail(message.to_string()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

fn response(status: u16, body: Value) -> HttpResponse {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    };
    HttpResponse {
        url: String::new(),
        status,
        status_text: status_text.to_string(),
        body: Bytes::from(body.to_string()),
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        self.requests.lock().push(request);
        let next = self.script.lock().pop_front();

        let mut resp = match next {
            Some(Scripted::Response(resp)) => resp,
            Some(Scripted::Gated(resp, gate)) => {
                gate.requested.notify_one();
                gate.released.notified().await;
                resp
            }
            Some(Scripted::Fail(message)) => {
                return Err(Error::transport(std::io::Error::other(message)));
            }
            None => {
                return Err(Error::transport(std::io::Error::other(format!(
                    "no scripted response for {url}"
                ))));
            }
        };
        resp.url = url;
        Ok(resp)
    }
}

/// One channel handed out by [`MockConnector`].
#[derive(Clone)]
pub struct MockChannel {
    pub url: Url,
    events: mpsc::UnboundedSender<ChannelEvent>,
    closer: CancellationToken,
}

impl MockChannel {
    pub fn send(&self, event: ChannelEvent) {
        let _ = self.events.send(event);
    }

    pub fn open(&self) {
        self.send(ChannelEvent::Open);
    }

    pub fn message(&self, text: &str) {
        self.send(ChannelEvent::Message(text.to_string()));
    }

    pub fn close(&self) {
        self.send(ChannelEvent::Close);
    }

    pub fn is_closed_by_client(&self) -> bool {
        self.closer.is_cancelled()
    }
}

/// [`Connector`] whose channels are driven by the test.
#[derive(Default)]
pub struct MockConnector {
    channels: Mutex<Vec<MockChannel>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn last(&self) -> Option<MockChannel> {
        self.channels.lock().last().cloned()
    }
}

impl Connector for MockConnector {
    fn open(&self, url: Url) -> Channel {
        let (tx, rx) = mpsc::unbounded_channel();
        let closer = CancellationToken::new();
        self.channels.lock().push(MockChannel {
            url,
            events: tx,
            closer: closer.clone(),
        });
        Channel { events: rx, closer }
    }
}

/// Yield to spawned tasks until `condition` holds, failing after a second.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}
