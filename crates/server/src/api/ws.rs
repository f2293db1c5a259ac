//! WebSocket support for live updates.
//!
//! Core components publish on their own broadcast channels; a bridge task
//! folds them into a single [`WsMessage`] stream that every client receives.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use prospector_core::{DispatchEvent, LeadEvent, PipelineEvent, RetryNotice, SessionEvent};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Message sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Lead added, updated, removed or reset.
    Lead { event: LeadEvent },
    /// Enrichment run progress.
    Pipeline { event: PipelineEvent },
    /// Dispatch loop lifecycle and log lines.
    Dispatch { event: DispatchEvent },
    /// Quota, rotation or sender pool changed.
    Session { event: SessionEvent },
    /// A provider call is being retried after a transient failure.
    ProviderRetry {
        step: String,
        attempt: u32,
        delay_ms: u64,
        message: String,
    },
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn kind(&self) -> &'static str {
        match self {
            WsMessage::Lead { .. } => "lead",
            WsMessage::Pipeline { .. } => "pipeline",
            WsMessage::Dispatch { .. } => "dispatch",
            WsMessage::Session { .. } => "session",
            WsMessage::ProviderRetry { .. } => "provider_retry",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Fan-out of [`WsMessage`]s to connected clients.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn broadcast(&self, msg: WsMessage) {
        // No clients connected is fine.
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    pub fn provider_retry(&self, step: &str, notice: &RetryNotice) {
        self.broadcast(WsMessage::ProviderRetry {
            step: step.to_string(),
            attempt: notice.attempt,
            delay_ms: notice.delay.as_millis() as u64,
            message: notice.message.clone(),
        });
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(512)
    }
}

/// Forward every event from `rx` until its channel closes.
fn forward<E, F>(mut rx: broadcast::Receiver<E>, ws: WsBroadcaster, wrap: F) -> JoinHandle<()>
where
    E: Clone + Send + 'static,
    F: Fn(E) -> WsMessage + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => ws.broadcast(wrap(event)),
                Err(RecvError::Lagged(n)) => warn!("Event bridge lagged, skipped {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Bridge core events into the websocket stream.
pub fn spawn_event_bridge(state: &AppState) -> Vec<JoinHandle<()>> {
    let ws = state.ws_broadcaster();
    vec![
        forward(state.leads().subscribe(), ws.clone(), |event| {
            WsMessage::Lead { event }
        }),
        forward(state.pipeline().subscribe(), ws.clone(), |event| {
            WsMessage::Pipeline { event }
        }),
        forward(state.dispatch().subscribe(), ws.clone(), |event| {
            WsMessage::Dispatch { event }
        }),
        forward(state.session().subscribe(), ws.clone(), |event| {
            WsMessage::Session { event }
        }),
    ]
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.ws_broadcaster().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            let msg = tokio::select! {
                result = rx.recv() => match result {
                    Ok(msg) => msg,
                    Err(RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged, skipped {} messages", n);
                        WS_LAG_EVENTS.inc();
                        continue;
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                },
                _ = heartbeat.tick() => WsMessage::Heartbeat {
                    timestamp: chrono::Utc::now().timestamp(),
                },
            };

            WS_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize WsMessage: {}", e),
            }
        }
    });

    // Clients only read; drain until they go away.
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => debug!("Ignoring client message: {}", text),
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
