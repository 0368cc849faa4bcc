use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::tracing::prelude::*;

/// Lifecycle and traffic of one channel.
///
/// `Close` is always the last event a channel produces, whether the server
/// hung up, the connection failed, or the client closed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(String),
    Error(String),
    Close,
}

/// An opened (or opening) channel.
#[derive(Debug)]
pub struct Channel {
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
    /// Cancel to close the channel
    pub closer: CancellationToken,
}

/// Opens realtime channels.
///
/// `open` returns at once; connecting happens in the background and is
/// reported through the channel's events.
pub trait Connector: Send + Sync {
    fn open(&self, url: Url) -> Channel;
}

/// [`Connector`] backed by tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn open(&self, url: Url) -> Channel {
        let (tx, rx) = mpsc::unbounded_channel();
        let closer = CancellationToken::new();
        tokio::spawn(run(url, tx, closer.clone()));
        Channel { events: rx, closer }
    }
}

async fn run(url: Url, tx: mpsc::UnboundedSender<ChannelEvent>, closer: CancellationToken) {
    drive(&url, &tx, &closer).await;
    let _ = tx.send(ChannelEvent::Close);
}

async fn drive(url: &Url, tx: &mpsc::UnboundedSender<ChannelEvent>, closer: &CancellationToken) {
    let connected = tokio::select! {
        _ = closer.cancelled() => return,
        result = connect_async(url.as_str()) => result,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            let _ = tx.send(ChannelEvent::Error(format!("WebSocket connect failed: {e}")));
            return;
        }
    };

    trace!(host = url.host_str(), "WebSocket connected.");
    let _ = tx.send(ChannelEvent::Open);

    let (mut write, mut read) = ws_stream.split();
    loop {
        tokio::select! {
            _ = closer.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = tx.send(ChannelEvent::Message(text.to_string()));
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => {
                            let _ = tx.send(ChannelEvent::Message(text));
                        }
                        Err(_) => debug!(len = data.len(), "Ignoring non-UTF-8 binary frame."),
                    },
                    Some(Ok(Message::Ping(_))) => {
                        // Flushing sends the pong tungstenite queued.
                        if let Err(e) = write.flush().await {
                            let _ = tx.send(ChannelEvent::Error(format!("WebSocket error: {e}")));
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = tx.send(ChannelEvent::Error(format!("WebSocket error: {e}")));
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn recv(channel: &mut Channel) -> ChannelEvent {
        tokio::time::timeout(std::time::Duration::from_secs(5), channel.events.recv())
            .await
            .expect("timed out waiting for channel event")
            .expect("channel ended without Close")
    }

    #[tokio::test]
    async fn test_forwards_messages_then_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"type":"hello"}"#.into())).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let url = Url::parse(&format!("ws://{addr}/monitors/1/realtimefeed")).unwrap();
        let mut channel = TungsteniteConnector.open(url);

        assert_eq!(recv(&mut channel).await, ChannelEvent::Open);
        assert_eq!(
            recv(&mut channel).await,
            ChannelEvent::Message(r#"{"type":"hello"}"#.into())
        );
        assert_eq!(recv(&mut channel).await, ChannelEvent::Close);
    }

    #[tokio::test]
    async fn test_ping_is_answered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Ping(b"heartbeat".to_vec().into())).await.unwrap();
            let mut answered = false;
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Pong(payload) = msg {
                    answered = payload.to_vec() == b"heartbeat";
                    break;
                }
            }
            ws.send(Message::Text(r#"{"after":"pong"}"#.into())).await.unwrap();
            ws.close(None).await.unwrap();
            answered
        });

        let url = Url::parse(&format!("ws://{addr}/feed")).unwrap();
        let mut channel = TungsteniteConnector.open(url);

        assert_eq!(recv(&mut channel).await, ChannelEvent::Open);
        assert_eq!(
            recv(&mut channel).await,
            ChannelEvent::Message(r#"{"after":"pong"}"#.into())
        );
        assert_eq!(recv(&mut channel).await, ChannelEvent::Close);
        assert!(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_client_close_ends_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            // Drain until the client's close frame arrives.
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    return true;
                }
            }
            false
        });

        let url = Url::parse(&format!("ws://{addr}/feed")).unwrap();
        let mut channel = TungsteniteConnector.open(url);
        assert_eq!(recv(&mut channel).await, ChannelEvent::Open);

        channel.closer.cancel();

        assert_eq!(recv(&mut channel).await, ChannelEvent::Close);
        assert!(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_connect_failure_reports_error_then_close() {
        // Bind then drop to get a port with nothing listening.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();

        let url = Url::parse(&format!("ws://{addr}/feed")).unwrap();
        let mut channel = TungsteniteConnector.open(url);

        assert!(matches!(recv(&mut channel).await, ChannelEvent::Error(_)));
        assert_eq!(recv(&mut channel).await, ChannelEvent::Close);
    }
}
