//! Reminder session over WebSocket.
//!
//! Each authenticated connection runs its own [`ReminderEngine`]. Engine
//! output (alert snapshots, toasts, speech) is pushed as JSON frames; the
//! client answers with dismiss, snooze, replay and refresh frames. Closing
//! the socket drops the engine handle, which stops both polling loops.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::auth::jwt::verify_token;
use crate::handlers::load_user;
use crate::models::alert::Alert;
use crate::models::user::{speech_locale, User};
use crate::services::reminders::{
    Notification, NotificationLevel, NotificationSink, ReminderEngine, SessionUser, Speech,
    SpeechChannel,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Alerts { alerts: Vec<Alert> },
    Notify(Notification),
    Announce { text: String, locale: String },
    Silence,
    Error { message: String },
}

impl From<Speech> for ServerFrame {
    fn from(speech: Speech) -> Self {
        match speech {
            Speech::Announce { text, locale } => ServerFrame::Announce { text, locale },
            Speech::Silence => ServerFrame::Silence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Dismiss { alert_id: Uuid },
    Snooze { alert_id: Uuid, minutes: Option<i64> },
    Replay { alert_id: Uuid },
    Refresh,
}

/// Queues engine output for the socket writer.
struct FrameSink {
    tx: mpsc::UnboundedSender<ServerFrame>,
    /// Reminder toasts follow the user's notification preference; action
    /// feedback is always sent.
    reminder_toasts: bool,
}

impl NotificationSink for FrameSink {
    fn notify(&self, notification: Notification) {
        if notification.level == NotificationLevel::Info && !self.reminder_toasts {
            return;
        }
        let _ = self.tx.send(ServerFrame::Notify(notification));
    }

    fn publish_alerts(&self, alerts: &[Alert]) {
        let _ = self.tx.send(ServerFrame::Alerts {
            alerts: alerts.to_vec(),
        });
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let user_id = match authenticate_ws(&state, query.token.as_deref()) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("WebSocket auth failed: {}", e);
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    let user = match load_user(&state, user_id).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

fn authenticate_ws(state: &AppState, token: Option<&str>) -> Result<Uuid, &'static str> {
    let token = token.ok_or("Missing token query parameter")?;
    let token_data = verify_token(token, &state.config).map_err(|_| "Invalid or expired token")?;
    Ok(token_data.claims.sub)
}

async fn handle_socket(socket: WebSocket, state: AppState, user: User) {
    let user_id = user.id;
    let (mut sender, mut receiver) = socket.split();

    let session = SessionUser {
        id: user.id,
        timezone: user.tz(),
        locale: speech_locale(&user.language, &state.config.default_locale),
        voice_alerts: user.voice_alerts,
    };
    let (speech, mut speech_rx) = SpeechChannel::new();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();

    let engine = Arc::new(ReminderEngine::new(
        session,
        state.store.clone(),
        Arc::new(speech),
        Arc::new(FrameSink {
            tx: frame_tx.clone(),
            reminder_toasts: user.notifications,
        }),
        state.config.reminder_settings(),
    ));
    let handle = engine.clone().spawn();

    tracing::debug!(user_id = %user_id, "Reminder session established");

    let mut send_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                Some(frame) = frame_rx.recv() => frame,
                Ok(()) = speech_rx.changed() => latest_speech(&mut speech_rx),
                else => break,
            };
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode frame");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => handle_client_frame(&engine, &frame_tx, &text).await,
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    handle.stop();
    tracing::debug!(user_id = %user_id, "Reminder session closed");
}

fn latest_speech(rx: &mut watch::Receiver<Speech>) -> ServerFrame {
    rx.borrow_and_update().clone().into()
}

async fn handle_client_frame(
    engine: &ReminderEngine,
    frames: &mpsc::UnboundedSender<ServerFrame>,
    text: &str,
) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            let _ = frames.send(ServerFrame::Error {
                message: format!("Unrecognised frame: {e}"),
            });
            return;
        }
    };

    // Dismiss and snooze failures already reach the client as error toasts.
    let result = match frame {
        ClientFrame::Dismiss { alert_id } => engine.dismiss(alert_id).await,
        ClientFrame::Snooze { alert_id, minutes } => engine.snooze(alert_id, minutes).await.map(|_| ()),
        ClientFrame::Replay { alert_id } => engine.replay(alert_id).await.map_err(|e| {
            let _ = frames.send(ServerFrame::Error {
                message: e.to_string(),
            });
            e
        }),
        ClientFrame::Refresh => {
            engine.evaluate_cycle().await;
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::debug!(user_id = %engine.user_id(), error = %e, "Client action failed");
    }
}
