//! Transport seam between the session and the WebSocket implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use futures::{Sink, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;
use url::Url;

use crate::endpoint::redact_token;
use crate::error::BridgeError;

/// Outgoing half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

/// Incoming half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

/// An established connection, split into its two halves.
pub struct Transport {
    /// Frames written to the peer.
    pub sink: FrameSink,
    /// Frames read from the peer.
    pub stream: FrameStream,
}

impl Transport {
    /// Wrap a sink and stream pair.
    pub fn new<S, R>(sink: S, stream: R) -> Self
    where
        S: Sink<Message, Error = WsError> + Send + 'static,
        R: Stream<Item = Result<Message, WsError>> + Send + 'static,
    {
        Self {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        }
    }

    /// Split an upgraded WebSocket into a transport.
    pub fn from_websocket<S>(ws: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        Self::new(sink, stream)
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// Where to connect and which bearer token to present.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    /// WebSocket URL, including the token query parameter.
    pub url: Url,
    /// Bearer token for the upgrade request.
    pub token: String,
}

impl ConnectTarget {
    /// Create a connect target.
    #[must_use]
    pub fn new(url: Url, token: impl Into<String>) -> Self {
        Self {
            url,
            token: token.into(),
        }
    }

    /// URL with the token query value masked, for logs.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        redact_token(&self.url)
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("url", &self.redacted_url())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Opens WebSocket connections.
///
/// The session owns reconnection and timeouts; a connector performs a
/// single handshake and reports its outcome.
pub trait Connector: Send + Sync + 'static {
    /// Perform the handshake for `target`.
    fn connect(
        &self,
        target: &ConnectTarget,
    ) -> impl Future<Output = Result<Transport, BridgeError>> + Send;
}

/// Production connector built on `tokio-tungstenite`.
///
/// Sends the token both in the URL and as an `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<Transport, BridgeError> {
        let mut request = target
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::InvalidUrl(e.to_string()))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", target.token))
            .map_err(|_| BridgeError::Handshake("token is not a valid header value".to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(handshake_error)?;
        debug!(status = %response.status(), url = %target.redacted_url(), "websocket upgrade accepted");

        Ok(Transport::from_websocket(ws))
    }
}

fn handshake_error(err: WsError) -> BridgeError {
    match err {
        WsError::Http(response) => BridgeError::Rejected {
            status: response.status().as_u16(),
        },
        other => BridgeError::Handshake(other.to_string()),
    }
}
