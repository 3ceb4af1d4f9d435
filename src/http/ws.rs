//! Listener/speaker websocket session
//!
//! Every connection is a listener from the moment it opens. A connection that
//! sends `voice_input` without having chosen a language is a pure speaker: it
//! leaves the registry so its own utterances are not translated back to it.
//! Speakers get their own utterance queue.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::AppState;
use crate::audio::{AudioEncoding, Utterance};
use crate::error::{IngestError, RegistryError};
use crate::pipeline::SpeakerQueue;
use crate::session::{ClientMessage, ErrorCode, ServerMessage};

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    debug!("WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Per-connection state owned by the receive loop
struct Connection {
    id: Uuid,
    outbox: mpsc::Sender<ServerMessage>,
    speaker: Option<SpeakerQueue>,
    /// Sent `join` or `set_language`; only then does it stay a listener
    /// after speaking
    chose_language: bool,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut outbox_rx) =
        mpsc::channel::<ServerMessage>(state.delivery.outbox_capacity.max(1));

    let mut conn = Connection {
        id: Uuid::new_v4(),
        outbox,
        speaker: None,
        chose_language: false,
    };

    // Registered with the default language until the client says otherwise
    let language = state.registry().join(conn.id, None, conn.outbox.clone());
    reply(
        &conn,
        ServerMessage::Joined {
            listener_id: conn.id,
            language,
        },
    )
    .await;

    let listener_id = conn.id;
    let sender_task = tokio::spawn(async move {
        while let Some(message) = outbox_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!(listener_id = %listener_id, "Failed to serialize outgoing message: {}", e);
                    continue;
                }
            };

            if let Err(e) = sender.send(Message::Text(json)).await {
                debug!(listener_id = %listener_id, "Socket send failed: {}", e);
                break;
            }
        }
    });

    while let Some(frame) = receiver.next().await {
        let keep_open = match frame {
            Ok(Message::Text(text)) => {
                handle_text(&state, &mut conn, &text).await;
                true
            }
            Ok(Message::Binary(data)) => {
                handle_voice(&state, &mut conn, Bytes::from(data), AudioEncoding::Unknown).await;
                true
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => true,
            Ok(Message::Close(_)) => false,
            Err(e) => {
                warn!(listener_id = %conn.id, "WebSocket error: {}", e);
                false
            }
        };

        if !keep_open {
            break;
        }
    }

    // Later snapshots no longer include this connection
    state.registry().leave(conn.id);

    if let Some(speaker) = conn.speaker.take() {
        // Pending utterances still reach the remaining listeners
        tokio::spawn(speaker.drain());
    }

    // In-flight runs may still hold outbox clones; the socket is gone either way
    sender_task.abort();

    info!(listener_id = %listener_id, "WebSocket connection closed");
}

async fn handle_text(state: &AppState, conn: &mut Connection, text: &str) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(listener_id = %conn.id, "Invalid client message: {}", e);
            reply(
                conn,
                ServerMessage::error(ErrorCode::InvalidMessage, format!("Invalid message: {}", e)),
            )
            .await;
            return;
        }
    };

    match message {
        ClientMessage::Join { language } => {
            let language = state
                .registry()
                .join(conn.id, language.as_deref(), conn.outbox.clone());
            conn.chose_language = true;
            reply(
                conn,
                ServerMessage::Joined {
                    listener_id: conn.id,
                    language,
                },
            )
            .await;
        }
        ClientMessage::SetLanguage { language } => {
            let response = match state.registry().set_language(conn.id, &language) {
                Ok(language) => {
                    conn.chose_language = true;
                    ServerMessage::LanguageSet { language }
                }
                Err(e @ RegistryError::UnsupportedLanguage(_)) => {
                    ServerMessage::error(ErrorCode::UnsupportedLanguage, e.to_string())
                }
                Err(e @ RegistryError::UnknownListener(_)) => {
                    ServerMessage::error(ErrorCode::UnknownListener, e.to_string())
                }
            };
            reply(conn, response).await;
        }
        ClientMessage::VoiceInput {
            audio_bytes,
            encoding,
        } => {
            let encoding = encoding
                .as_deref()
                .map(AudioEncoding::from_declared)
                .unwrap_or_default();
            match Utterance::ingest_base64(&audio_bytes, encoding, &state.ingest) {
                Ok(utterance) => submit(state, conn, utterance).await,
                Err(e) => reject_voice(conn, e).await,
            }
        }
    }
}

async fn handle_voice(state: &AppState, conn: &mut Connection, data: Bytes, encoding: AudioEncoding) {
    match Utterance::ingest(data, encoding, &state.ingest) {
        Ok(utterance) => submit(state, conn, utterance).await,
        Err(e) => reject_voice(conn, e).await,
    }
}

async fn submit(state: &AppState, conn: &mut Connection, utterance: Utterance) {
    let speaker_id = conn.id;
    if conn.speaker.is_none() && !conn.chose_language && state.registry().leave(speaker_id) {
        info!(listener_id = %speaker_id, "Connection is speaking only, removed from fan-out");
    }

    let speaker = conn.speaker.get_or_insert_with(|| {
        SpeakerQueue::spawn(
            state.coordinator.clone(),
            speaker_id,
            state.delivery.queue_capacity,
        )
    });

    match speaker.submit(utterance) {
        Ok(utterance_id) => reply(conn, ServerMessage::Accepted { utterance_id }).await,
        Err(e) => reject_voice(conn, e).await,
    }
}

async fn reject_voice(conn: &Connection, err: IngestError) {
    warn!(listener_id = %conn.id, "Voice input rejected: {}", err);
    reply(conn, ServerMessage::error(ErrorCode::IngestError, err.to_string())).await;
}

/// Replies to the requesting connection wait for outbox space; fan-out
/// deliveries never do.
async fn reply(conn: &Connection, message: ServerMessage) {
    if conn.outbox.send(message).await.is_err() {
        debug!(listener_id = %conn.id, "Reply dropped, connection is closing");
    }
}
