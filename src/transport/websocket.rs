//! WebSocket transport over tokio-tungstenite.
//!
//! # Responsibilities
//! - Establish the WebSocket connection (plain or TLS) under a hard deadline
//! - Measure round trips with Ping frames carrying a sequence token
//! - Surface Text/Binary frames and translate Close frames into `RemoteClosed`
//!
//! # Design Decisions
//! - Read and write halves sit behind separate async mutexes
//! - Pongs are matched by the reader, so a probe only completes while `recv` is driven
//! - Close is bounded by its deadline and idempotent

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::TransportError;
use crate::transport::{Connection, Payload, Transport};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport that opens `ws://` and `wss://` connections.
#[derive(Debug, Clone)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create the transport, installing the process-wide TLS crypto provider if none is set.
    pub fn new() -> Self {
        if rustls::crypto::CryptoProvider::get_default().is_none() {
            // Lost races with another installer are fine.
            let _ = rustls::crypto::ring::default_provider().install_default();
        }
        Self
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, endpoint: &Url, deadline: Duration) -> Result<Arc<dyn Connection>, TransportError> {
        let (stream, response) = match time::timeout(deadline, connect_async(endpoint.as_str())).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => return Err(TransportError::Connect(e.to_string())),
            Err(_) => return Err(TransportError::ConnectTimeout(deadline)),
        };

        tracing::debug!(endpoint = %endpoint, status = %response.status(), "WebSocket handshake complete");

        let (sink, stream) = stream.split();
        Ok(Arc::new(WebSocketConnection {
            sink: AsyncMutex::new(sink),
            stream: AsyncMutex::new(stream),
            pending_pong: Mutex::new(None),
            next_token: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Probe waiting for its Pong.
struct PendingPong {
    token: [u8; 8],
    sent_at: Instant,
    tx: oneshot::Sender<Duration>,
}

/// A live WebSocket connection.
pub struct WebSocketConnection {
    sink: AsyncMutex<SplitSink<WsStream, Message>>,
    stream: AsyncMutex<SplitStream<WsStream>>,
    pending_pong: Mutex<Option<PendingPong>>,
    next_token: AtomicU64,
    closed: AtomicBool,
}

impl WebSocketConnection {
    fn complete_pong(&self, data: &[u8]) {
        let Ok(mut pending) = self.pending_pong.lock() else {
            return;
        };
        let matches = pending.as_ref().is_some_and(|p| p.token.as_slice() == data);
        if !matches {
            tracing::trace!(len = data.len(), "Ignoring unsolicited pong");
            return;
        }
        if let Some(p) = pending.take() {
            let _ = p.tx.send(p.sent_at.elapsed());
        }
    }

    fn clear_pending(&self, token: [u8; 8]) {
        if let Ok(mut pending) = self.pending_pong.lock() {
            if pending.as_ref().is_some_and(|p| p.token == token) {
                pending.take();
            }
        }
    }
}

fn closed_by(frame: Option<CloseFrame>) -> TransportError {
    match frame {
        Some(frame) => TransportError::RemoteClosed {
            code: u16::from(frame.code),
            reason: frame.reason.as_str().to_owned(),
        },
        None => TransportError::RemoteClosed {
            code: 1005,
            reason: String::new(),
        },
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn probe(&self, deadline: Duration) -> Result<Duration, TransportError> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed).to_be_bytes();
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self
                .pending_pong
                .lock()
                .map_err(|_| TransportError::Probe("pong registry poisoned".to_string()))?;
            *pending = Some(PendingPong {
                token,
                sent_at: Instant::now(),
                tx,
            });
        }

        let exchange = async {
            self.sink
                .lock()
                .await
                .send(Message::Ping(token.to_vec().into()))
                .await
                .map_err(|e| TransportError::Probe(e.to_string()))?;
            rx.await
                .map_err(|_| TransportError::Probe("pong waiter dropped".to_string()))
        };

        let result = match time::timeout(deadline, exchange).await {
            Ok(Ok(rtt)) => Ok(rtt),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::ProbeTimeout(deadline)),
        };
        self.clear_pending(token);
        result
    }

    async fn recv(&self) -> Result<Payload, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Payload::Text(text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => return Ok(Payload::Binary(bytes.to_vec())),
                Some(Ok(Message::Pong(data))) => self.complete_pong(&data),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    self.closed.store(true, Ordering::Release);
                    return Err(closed_by(frame));
                }
                Some(Err(e)) => {
                    self.closed.store(true, Ordering::Release);
                    return Err(TransportError::abnormal_closure(e.to_string()));
                }
                None => {
                    self.closed.store(true, Ordering::Release);
                    return Err(TransportError::abnormal_closure("stream ended"));
                }
            }
        }
    }

    async fn close(&self, deadline: Duration) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let closing = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match time::timeout(deadline, closing).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Close handshake failed, treating connection as closed");
                Ok(())
            }
            Err(_) => Err(TransportError::CloseTimeout(deadline)),
        }
    }
}
