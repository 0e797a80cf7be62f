//! Minimal OpenAI client for the two oracle contracts: judging a submitted
//! query and generating a quest from a schema.
//!
//! We only call chat.completions and always request a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes
//! (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::util::fill_template;

/// Failure kinds of an oracle call. `Overloaded` is the only retryable one
/// and gets its own user-facing message; everything else collapses to a
/// generic validation-failed message at the orchestrator boundary.
#[derive(Debug, Error)]
pub enum OracleError {
  #[error("oracle overloaded")]
  Overloaded,
  #[error("oracle HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("oracle transport error: {0}")]
  Transport(String),
  #[error("oracle returned malformed JSON: {0}")]
  Malformed(String),
}

/// The correctness oracle's judgment for one attempt. Field names mirror the
/// wire contract; `simulated_result`, when present, is a JSON array of row
/// objects encoded as text and is only meaningful for correct answers to
/// generated quests.
#[derive(Clone, Debug, Deserialize)]
pub struct Verdict {
  #[serde(rename = "isCorrect")]
  pub is_correct: bool,
  #[serde(default)]
  pub feedback: String,
  #[serde(rename = "simulatedResult", default)]
  pub simulated_result: Option<String>,
}

/// Generation oracle output: narrative only, never a query or an answer.
#[derive(Clone, Debug, Deserialize)]
pub struct GeneratedQuestText {
  pub title: String,
  #[serde(rename = "longDescription")]
  pub long_description: String,
}

#[derive(Clone)]
pub struct Oracle {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

impl Oracle {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, fast_model, strong_model })
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, OracleError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "sqlquest-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await
      .map_err(|e| OracleError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_oracle_error(&body).unwrap_or(body);
      return Err(classify_failure(status, &message));
    }

    let body: ChatCompletionResponse =
      res.json().await.map_err(|e| OracleError::Transport(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Oracle usage");
    }
    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();

    serde_json::from_str::<T>(&text).map_err(|e| OracleError::Malformed(e.to_string()))
  }

  /// Judge a submitted query against a quest description and schema.
  /// `is_custom_quest` is part of the wire contract: it asks the oracle to
  /// synthesize a plausible result set on success.
  #[instrument(
    level = "info",
    skip(self, prompts, user_query, quest_description, table_schema),
    fields(query_len = user_query.len(), is_custom_quest, model = %self.strong_model)
  )]
  pub async fn validate_query(
    &self,
    prompts: &Prompts,
    user_query: &str,
    quest_description: &str,
    table_schema: &str,
    is_custom_quest: bool,
  ) -> Result<Verdict, OracleError> {
    let user = fill_template(
      &prompts.validate_user_template,
      &[
        ("user_query", user_query),
        ("quest_description", quest_description),
        ("table_schema", table_schema),
        ("is_custom_quest", if is_custom_quest { "true" } else { "false" }),
      ],
    );

    let start = std::time::Instant::now();
    let result =
      self.chat_json::<Verdict>(&self.strong_model, &prompts.validate_system, &user, 0.2).await;
    let elapsed = start.elapsed();

    match &result {
      Ok(v) => {
        info!(?elapsed, is_correct = v.is_correct, has_simulated = v.simulated_result.is_some(), "Verdict received")
      }
      Err(e) => error!(?elapsed, error = %e, "Oracle call failed during validation"),
    }
    result
  }

  /// Produce a new quest's title and narrative from an inferred schema and a
  /// topic. Never returns a query or an answer.
  #[instrument(
    level = "info",
    skip(self, prompts, table_schema, topic),
    fields(%topic, model = %self.strong_model)
  )]
  pub async fn generate_quest(
    &self,
    prompts: &Prompts,
    table_schema: &str,
    topic: &str,
  ) -> Result<GeneratedQuestText, OracleError> {
    let user = fill_template(
      &prompts.generate_user_template,
      &[("table_schema", table_schema), ("topic", topic)],
    );

    let start = std::time::Instant::now();
    let result = self
      .chat_json::<GeneratedQuestText>(&self.strong_model, &prompts.generate_system, &user, 0.95)
      .await;
    let elapsed = start.elapsed();

    match &result {
      Ok(gen) => info!(
        ?elapsed,
        title_preview = %gen.title.chars().take(40).collect::<String>(),
        "Quest text generated"
      ),
      Err(e) => error!(?elapsed, error = %e, "Oracle call failed during quest generation"),
    }
    result
  }
}

/// Map a non-success HTTP response to an error kind. Overload shows up either
/// as a rate/capacity status or as "overloaded" in the error body.
fn classify_failure(status: StatusCode, message: &str) -> OracleError {
  if status == StatusCode::TOO_MANY_REQUESTS
    || status == StatusCode::SERVICE_UNAVAILABLE
    || message.to_lowercase().contains("overloaded")
  {
    OracleError::Overloaded
  } else {
    OracleError::Http { status: status.as_u16(), message: message.to_string() }
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq {
  role: String,
  content: String,
}
#[derive(Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  r#type: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)]
  usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessageResp,
}
#[derive(Deserialize)]
struct ChatMessageResp {
  content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)]
  prompt_tokens: Option<u32>,
  #[serde(default)]
  completion_tokens: Option<u32>,
  #[serde(default)]
  total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI-style error body.
fn extract_oracle_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn verdict_parses_wire_shape() {
    let v: Verdict = serde_json::from_str(
      r#"{"isCorrect": true, "feedback": "Nice!", "simulatedResult": "[{\"a\":1}]"}"#,
    )
    .expect("verdict");
    assert!(v.is_correct);
    assert_eq!(v.feedback, "Nice!");
    assert!(v.simulated_result.is_some());
  }

  #[test]
  fn verdict_tolerates_missing_optionals() {
    let v: Verdict = serde_json::from_str(r#"{"isCorrect": false}"#).expect("verdict");
    assert!(!v.is_correct);
    assert!(v.feedback.is_empty());
    assert!(v.simulated_result.is_none());
  }

  #[test]
  fn capacity_failures_classify_as_overloaded() {
    assert!(matches!(
      classify_failure(StatusCode::TOO_MANY_REQUESTS, "rate limited"),
      OracleError::Overloaded
    ));
    assert!(matches!(
      classify_failure(StatusCode::SERVICE_UNAVAILABLE, "down"),
      OracleError::Overloaded
    ));
    assert!(matches!(
      classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "The model is overloaded"),
      OracleError::Overloaded
    ));
    assert!(matches!(
      classify_failure(StatusCode::BAD_REQUEST, "bad prompt"),
      OracleError::Http { status: 400, .. }
    ));
  }

  #[test]
  fn error_body_extraction_prefers_message() {
    let body = r#"{"error": {"message": "The model is overloaded"}}"#;
    assert_eq!(extract_oracle_error(body).as_deref(), Some("The model is overloaded"));
    assert!(extract_oracle_error("plain text").is_none());
  }
}
