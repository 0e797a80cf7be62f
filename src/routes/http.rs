//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; logs include parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::domain::{ColumnDef, TableSchema};
use crate::logic::{generate_custom_quest, load_quest, progress_snapshot, submit_query};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_quests(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let quests: Vec<QuestOut> = state.catalog.list().iter().map(to_out).collect();
  Json(quests)
}

#[instrument(level = "info", skip(state), fields(%quest_id))]
pub async fn http_get_quest(
  State(state): State<Arc<AppState>>,
  Path(quest_id): Path<String>,
) -> impl IntoResponse {
  match state.get_quest(&quest_id).await {
    Some(q) => Json(to_out(&q)).into_response(),
    None => (StatusCode::NOT_FOUND, "quest not found").into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(%body.quest_id))]
pub async fn http_load_quest(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LoadQuestIn>,
) -> impl IntoResponse {
  match load_quest(&state, &body.quest_id).await {
    Some(q) => {
      info!(target: "quest", id = %q.id, "HTTP quest loaded");
      Json(to_out(&q)).into_response()
    }
    None => (StatusCode::NOT_FOUND, "quest not found").into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(query_len = body.query.len()))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> impl IntoResponse {
  let outcome = submit_query(&state, &body.query).await;
  Json(AnswerOut::from_outcome(outcome))
}

#[instrument(level = "info", skip(state, body), fields(table = %body.table_name, topic = %body.topic))]
pub async fn http_generate_quest(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerateIn>,
) -> impl IntoResponse {
  let schema = TableSchema {
    table_name: body.table_name,
    columns: body
      .columns
      .into_iter()
      .map(|c| ColumnDef { name: c.name, data_type: c.data_type })
      .collect(),
  };
  match generate_custom_quest(&state, schema, &body.topic).await {
    Ok(q) => Json(to_out(&q)).into_response(),
    Err(message) => (StatusCode::SERVICE_UNAVAILABLE, message).into_response(),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let session = state.session.read().await;
  Json(SessionOut {
    quest: session.active().map(to_out),
    attempts: session.attempts(),
    phase: PhaseOut::from_phase(session.phase()),
  })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(ProgressOut::from_snapshot(progress_snapshot(&state)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  state.progress.reset();
  Json(ProgressOut::from_snapshot(progress_snapshot(&state)))
}
