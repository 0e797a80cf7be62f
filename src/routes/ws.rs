//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic; we reply with a single JSON message per request.
//! The loop also watches the progress store's change signal and pushes a
//! payload-free `progress_updated` message, so rank displays and progress bars
//! can re-fetch without polling.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::domain::{ColumnDef, TableSchema};
use crate::logic::{generate_custom_quest, load_quest, progress_snapshot, submit_query};
use crate::protocol::{to_out, AnswerOut, ClientWsMessage, ProgressOut, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "sqlquest_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "sqlquest_backend", "WebSocket connected");
  let mut progress_rx = state.progress.subscribe();

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            // Parse, dispatch, serialize response.
            debug!(target: "sqlquest_backend", "WS received: {}", crate::util::trunc_for_log(&txt, 200));
            let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => handle_client_ws(incoming, &state).await,
              Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
            };

            let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
              serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
            });

            if let Err(e) = socket.send(Message::Text(out)).await {
              error!(target: "sqlquest_backend", error = %e, "WS send error");
              break;
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      changed = progress_rx.changed() => {
        if changed.is_err() { break; }
        // Coalesced, payload-free: the client re-fetches progress.
        let out = serde_json::to_string(&ServerWsMessage::ProgressUpdated)
          .unwrap_or_else(|_| r#"{"type":"progress_updated"}"#.to_string());
        if socket.send(Message::Text(out)).await.is_err() {
          break;
        }
      }
    }
  }
  info!(target: "sqlquest_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::LoadQuest { quest_id } => match load_quest(state, &quest_id).await {
      Some(q) => {
        tracing::info!(target: "quest", id = %q.id, "WS quest loaded");
        ServerWsMessage::Quest { quest: to_out(&q) }
      }
      None => ServerWsMessage::Error { message: format!("Unknown questId: {}", quest_id) },
    },

    ClientWsMessage::SubmitQuery { query } => {
      let outcome = submit_query(state, &query).await;
      ServerWsMessage::Answer { result: AnswerOut::from_outcome(outcome) }
    }

    ClientWsMessage::GenerateQuest { table_name, columns, topic } => {
      let schema = TableSchema {
        table_name,
        columns: columns
          .into_iter()
          .map(|c| ColumnDef { name: c.name, data_type: c.data_type })
          .collect(),
      };
      match generate_custom_quest(state, schema, &topic).await {
        Ok(q) => ServerWsMessage::Quest { quest: to_out(&q) },
        Err(message) => ServerWsMessage::Error { message },
      }
    }

    ClientWsMessage::GetSession => {
      let session = state.session.read().await;
      ServerWsMessage::Session {
        session: crate::protocol::SessionOut {
          quest: session.active().map(to_out),
          attempts: session.attempts(),
          phase: crate::protocol::PhaseOut::from_phase(session.phase()),
        },
      }
    }

    ClientWsMessage::GetProgress => ServerWsMessage::Progress {
      progress: ProgressOut::from_snapshot(progress_snapshot(state)),
    },

    ClientWsMessage::ResetProgress => {
      state.progress.reset();
      ServerWsMessage::Progress {
        progress: ProgressOut::from_snapshot(progress_snapshot(state)),
      }
    }
  }
}
