//! Shared helpers for session and orchestrator tests.
//!
//! [`ScriptedConnector`] replaces the network: each connect attempt consumes
//! the next [`Script`] step, and accepted connections hand their server end
//! to the test through a channel.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use aibridge::{BridgeError, ConnectTarget, Connector, SessionEvent, Transport};
use futures::channel::mpsc as duplex;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

// ============================================================================
// Scripted connector
// ============================================================================

/// Outcome of one connect attempt.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// Handshake succeeds.
    Accept,
    /// Handshake fails before the server answers.
    Refuse(&'static str),
    /// Server rejects the upgrade with an HTTP status.
    Reject(u16),
    /// Handshake never completes.
    Hang,
}

/// A recorded connect attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub at: Instant,
    pub target: ConnectTarget,
}

struct ConnectorState {
    script: Mutex<VecDeque<Script>>,
    attempts: Mutex<Vec<Attempt>>,
    servers: mpsc::UnboundedSender<ServerEnd>,
}

/// In-memory connector driven by a script.
#[derive(Clone)]
pub struct ScriptedConnector {
    state: Arc<ConnectorState>,
}

impl ScriptedConnector {
    /// Create a connector and the receiver for accepted server ends.
    pub fn new(
        script: impl IntoIterator<Item = Script>,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(ConnectorState {
                script: Mutex::new(script.into_iter().collect()),
                attempts: Mutex::new(Vec::new()),
                servers,
            }),
        };
        (connector, rx)
    }

    /// Append steps to the script.
    pub fn push(&self, step: Script) {
        self.state.script.lock().push_back(step);
    }

    /// Every attempt made so far.
    pub fn attempts(&self) -> Vec<Attempt> {
        self.state.attempts.lock().clone()
    }

    /// Number of attempts made so far.
    pub fn attempt_count(&self) -> usize {
        self.state.attempts.lock().len()
    }
}

impl Connector for ScriptedConnector {
    async fn connect(&self, target: &ConnectTarget) -> Result<Transport, BridgeError> {
        self.state.attempts.lock().push(Attempt {
            at: Instant::now(),
            target: target.clone(),
        });
        let step = self
            .state
            .script
            .lock()
            .pop_front()
            .unwrap_or(Script::Refuse("script exhausted"));

        match step {
            Script::Accept => {
                let (to_client, client_rx) = duplex::unbounded();
                let (client_tx, from_client) = duplex::unbounded();
                let sink = client_tx.sink_map_err(|_| WsError::ConnectionClosed);
                let _ = self.state.servers.send(ServerEnd {
                    to_client,
                    from_client,
                });
                Ok(Transport::new(sink, client_rx))
            }
            Script::Refuse(reason) => Err(BridgeError::Handshake(reason.to_string())),
            Script::Reject(status) => Err(BridgeError::Rejected { status }),
            Script::Hang => std::future::pending().await,
        }
    }
}

// ============================================================================
// Server end of an accepted connection
// ============================================================================

/// The peer side of a scripted connection.
pub struct ServerEnd {
    to_client: duplex::UnboundedSender<Result<Message, WsError>>,
    from_client: duplex::UnboundedReceiver<Message>,
}

impl ServerEnd {
    /// Push a text frame to the client.
    pub fn send_text(&self, text: &str) {
        let _ = self.to_client.unbounded_send(Ok(Message::text(text.to_string())));
    }

    /// Push a binary frame to the client.
    pub fn send_binary(&self, data: &[u8]) {
        let _ = self.to_client.unbounded_send(Ok(Message::binary(data.to_vec())));
    }

    /// Send a close frame.
    pub fn close(&self) {
        let _ = self.to_client.unbounded_send(Ok(Message::Close(None)));
    }

    /// Break the connection with a transport error.
    pub fn fail(&self) {
        let _ = self.to_client.unbounded_send(Err(WsError::ConnectionClosed));
    }

    /// Next frame written by the client, `None` once the client hung up.
    pub async fn next_frame(&mut self) -> Option<Message> {
        self.from_client.next().await
    }
}

// ============================================================================
// Event helpers
// ============================================================================

/// Wait for the next event.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(60), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Wait for the first event matching `pred`, returning everything seen.
pub async fn collect_until(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(events).await;
        let done = pred(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Events already queued, without waiting.
pub fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}
