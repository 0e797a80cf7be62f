//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This is the validation orchestrator: it drives one submit attempt end to
//! end (ticket, oracle call, verdict interpretation, progress mutation,
//! result-row selection), materializes generated quests, and derives progress
//! snapshots. Every oracle and storage failure is shaped here into an
//! `AttemptPhase`; nothing raw escapes to the presentation layer.

use tracing::{error, info, instrument, warn};

use crate::domain::{Quest, QuestKind, ResultRow, TableSchema, GENERATED_QUEST_ID};
use crate::oracle::{OracleError, Verdict};
use crate::progress::{badges_for, rank_for, ProgressStore};
use crate::session::AttemptPhase;
use crate::state::AppState;
use crate::util::normalize_sql;

/// Shown when the oracle reports overload. Retry is manual.
pub const ORACLE_BUSY_MESSAGE: &str =
  "The SQL tutor is currently experiencing high demand. Please wait a moment and try running your query again.";

/// Shown for any other oracle-side failure; detail goes to the logs only.
pub const VALIDATION_FAILED_MESSAGE: &str =
  "Could not validate your query at this time. Please try again.";

pub enum SubmitOutcome {
  /// Submit with nothing loaded; a guarded no-op.
  NoActiveQuest,
  Attempted { phase: AttemptPhase, attempts: u32 },
}

/// Load a quest into the session by id. The reserved generated id resolves
/// through the transient slot; anything else through the catalog.
#[instrument(level = "info", skip(state), fields(%quest_id))]
pub async fn load_quest(state: &AppState, quest_id: &str) -> Option<Quest> {
  let quest = state.get_quest(quest_id).await?;
  state.session.write().await.load(quest.clone());
  info!(target: "quest", id = %quest.id, title = %quest.title, "Quest loaded into session");
  Some(quest)
}

/// Drive one submit attempt for the active quest.
#[instrument(level = "info", skip(state, query), fields(query_len = query.len()))]
pub async fn submit_query(state: &AppState, query: &str) -> SubmitOutcome {
  let ticket = state.session.write().await.begin_submit();
  let Some(ticket) = ticket else {
    warn!(target: "quest", "Submit ignored: no active quest");
    return SubmitOutcome::NoActiveQuest;
  };

  let quest = &ticket.quest;
  let schema_text = quest.schema.to_prompt_text();

  // Oracle round-trip (the only suspension point of an attempt).
  let phase = match &state.oracle {
    Some(oracle) => {
      match oracle
        .validate_query(
          &state.prompts,
          query,
          &quest.long_description,
          &schema_text,
          quest.is_generated(),
        )
        .await
      {
        Ok(verdict) => interpret_verdict(quest, &verdict, &state.progress),
        Err(e) => phase_for_oracle_error(&e),
      }
    }
    None => match local_verdict(quest, query) {
      Some(verdict) => interpret_verdict(quest, &verdict, &state.progress),
      None => {
        error!(target: "quest", id = %quest.id, "No oracle and no local grading path");
        AttemptPhase::Error { message: VALIDATION_FAILED_MESSAGE.into() }
      }
    },
  };

  let applied = state.session.write().await.finish_submit(ticket.seq, phase.clone());
  info!(target: "quest", id = %quest.id, attempts = ticket.attempt, applied, "Submit attempt finished");
  SubmitOutcome::Attempted { phase, attempts: ticket.attempt }
}

/// Turn an oracle verdict into the displayed phase, mutating progress and
/// selecting result rows per policy:
/// - correct + canonical: mark completed, canned rows and canned success
///   message win over anything the oracle synthesized.
/// - correct + generated: no progress mutation; rows come from the oracle's
///   simulated result, degrading to a placeholder row if it fails to parse.
/// - incorrect: hint feedback, no mutation, no rows.
pub fn interpret_verdict(quest: &Quest, verdict: &Verdict, progress: &ProgressStore) -> AttemptPhase {
  if !verdict.is_correct {
    return AttemptPhase::Hint { feedback: verdict.feedback.clone() };
  }
  match &quest.kind {
    QuestKind::Canonical { success_message, result_data, .. } => {
      progress.mark_completed(&quest.id);
      AttemptPhase::Success {
        feedback: success_message.clone(),
        rows: Some(result_data.clone()),
      }
    }
    QuestKind::Generated => {
      let rows = verdict.simulated_result.as_deref().map(parse_simulated_rows);
      AttemptPhase::Success { feedback: verdict.feedback.clone(), rows }
    }
  }
}

/// Parse the oracle's textual row-set. A parse failure must not sink the
/// attempt: the verdict stands and the learner sees a placeholder row.
fn parse_simulated_rows(text: &str) -> Vec<ResultRow> {
  match serde_json::from_str::<Vec<ResultRow>>(text) {
    Ok(rows) => rows,
    Err(e) => {
      warn!(target: "quest", error = %e, "Simulated result unparseable; showing placeholder");
      let mut row = ResultRow::new();
      row.insert("status".into(), "Could not display simulated results.".into());
      vec![row]
    }
  }
}

fn phase_for_oracle_error(e: &OracleError) -> AttemptPhase {
  match e {
    OracleError::Overloaded => AttemptPhase::OracleBusy { message: ORACLE_BUSY_MESSAGE.into() },
    _ => AttemptPhase::Error { message: VALIDATION_FAILED_MESSAGE.into() },
  }
}

/// Offline fallback grader used when no oracle is configured: compare against
/// the canonical reference answer, ignoring case, spacing, and a trailing
/// semicolon. Generated quests have no reference answer and return None.
fn local_verdict(quest: &Quest, query: &str) -> Option<Verdict> {
  match &quest.kind {
    QuestKind::Canonical { correct_query, .. } if !correct_query.is_empty() => {
      let is_correct = normalize_sql(query) == normalize_sql(correct_query);
      let feedback = if is_correct {
        "Your query matches the reference answer.".to_string()
      } else {
        "Not quite. Compare your clauses against what the task asks for, one at a time.".to_string()
      };
      Some(Verdict { is_correct, feedback, simulated_result: None })
    }
    _ => None,
  }
}

/// Build and install a transient quest from an inferred schema and a topic.
/// Returns a user-facing message on failure.
#[instrument(level = "info", skip(state, schema), fields(table = %schema.table_name, %topic))]
pub async fn generate_custom_quest(
  state: &AppState,
  schema: TableSchema,
  topic: &str,
) -> Result<Quest, String> {
  let Some(oracle) = &state.oracle else {
    return Err("Quest generation is unavailable: no oracle is configured.".into());
  };

  let schema_text = schema.to_prompt_text();
  let text = oracle
    .generate_quest(&state.prompts, &schema_text, topic)
    .await
    .map_err(|e| match e {
      OracleError::Overloaded => ORACLE_BUSY_MESSAGE.to_string(),
      other => {
        error!(target: "quest", error = %other, "Quest generation failed");
        "Could not generate a quest from your data at this time.".to_string()
      }
    })?;

  let quest = Quest {
    id: GENERATED_QUEST_ID.into(),
    title: text.title,
    description: format!("A custom quest for your '{}' table.", schema.table_name),
    long_description: text.long_description,
    difficulty: crate::domain::Difficulty::Beginner,
    category: "Custom Quest".into(),
    initial_query: format!("SELECT * FROM {};", schema.table_name),
    schema,
    kind: QuestKind::Generated,
  };
  state.set_custom_quest(quest.clone()).await;
  info!(target: "quest", title = %quest.title, "Generated quest installed");
  Ok(quest)
}

/// Derived progress view: completed ids, badges, rank, and per-category
/// completion percentages over the catalog.
pub struct ProgressSnapshot {
  pub completed: Vec<String>,
  pub badge_count: usize,
  pub rank: &'static str,
  pub categories: Vec<(String, u8)>,
}

pub fn progress_snapshot(state: &AppState) -> ProgressSnapshot {
  let completed = state.progress.completed();
  let categories = state
    .catalog
    .categories()
    .into_iter()
    .map(|category| {
      let quests: Vec<_> =
        state.catalog.list().iter().filter(|q| q.category == category).collect();
      let done = quests.iter().filter(|q| completed.contains(&q.id)).count();
      let percent = if quests.is_empty() {
        0
      } else {
        ((done as f64 / quests.len() as f64) * 100.0).round() as u8
      };
      (category, percent)
    })
    .collect();

  ProgressSnapshot {
    badge_count: badges_for(completed.len()),
    rank: rank_for(completed.len()),
    completed,
    categories,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{ColumnDef, Difficulty};

  fn generated_quest() -> Quest {
    Quest {
      id: GENERATED_QUEST_ID.into(),
      title: "The Filter of Destiny".into(),
      description: "A custom quest for your 'orders' table.".into(),
      long_description: "Find all orders above 100 gold.".into(),
      difficulty: Difficulty::Beginner,
      category: "Custom Quest".into(),
      initial_query: "SELECT * FROM orders;".into(),
      schema: TableSchema {
        table_name: "orders".into(),
        columns: vec![ColumnDef { name: "total".into(), data_type: "INTEGER".into() }],
      },
      kind: QuestKind::Generated,
    }
  }

  fn correct_verdict(simulated: Option<&str>) -> Verdict {
    Verdict {
      is_correct: true,
      feedback: "Nailed it.".into(),
      simulated_result: simulated.map(|s| s.to_string()),
    }
  }

  #[tokio::test]
  async fn where_clause_success_marks_completed_once_and_shows_canned_rows() {
    let state = AppState::for_tests();
    load_quest(&state, "where-clause").await.expect("quest");

    // No oracle configured: the local reference-answer grader runs.
    let outcome =
      submit_query(&state, "select name, role, salary from employees where salary > 70000;").await;
    let SubmitOutcome::Attempted { phase, attempts } = outcome else {
      panic!("expected an attempt");
    };
    assert_eq!(attempts, 1);
    match phase {
      AttemptPhase::Success { rows, feedback } => {
        assert_eq!(feedback, "Excellent! You have successfully filtered the records.");
        assert_eq!(rows.expect("rows").len(), 3);
      }
      other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(state.progress.completed(), vec!["where-clause".to_string()]);

    // A repeat completion stays idempotent.
    submit_query(&state, "SELECT name, role, salary FROM employees WHERE salary > 70000").await;
    assert_eq!(state.progress.completed(), vec!["where-clause".to_string()]);
  }

  #[tokio::test]
  async fn incorrect_local_answer_yields_hint_without_mutation() {
    let state = AppState::for_tests();
    load_quest(&state, "select-basics").await.expect("quest");

    let outcome = submit_query(&state, "SELECT nothing FROM nowhere").await;
    let SubmitOutcome::Attempted { phase, .. } = outcome else {
      panic!("expected an attempt");
    };
    assert!(matches!(phase, AttemptPhase::Hint { .. }));
    assert!(state.progress.completed().is_empty());
  }

  #[tokio::test]
  async fn submit_without_loaded_quest_is_no_op() {
    let state = AppState::for_tests();
    assert!(matches!(submit_query(&state, "SELECT 1").await, SubmitOutcome::NoActiveQuest));
    assert_eq!(state.session.read().await.attempts(), 0);
  }

  #[test]
  fn generated_quest_success_never_touches_progress() {
    let state = AppState::for_tests();
    let quest = generated_quest();
    let verdict = correct_verdict(Some(r#"[{"total": 150}]"#));

    let phase = interpret_verdict(&quest, &verdict, &state.progress);
    match phase {
      AttemptPhase::Success { feedback, rows } => {
        assert_eq!(feedback, "Nailed it.");
        let rows = rows.expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("total").and_then(|v| v.as_i64()), Some(150));
      }
      other => panic!("expected success, got {other:?}"),
    }
    assert!(state.progress.completed().is_empty());
  }

  #[test]
  fn canonical_success_ignores_simulated_result() {
    let state = AppState::for_tests();
    let quest = state.catalog.find("where-clause").expect("quest").clone();
    let verdict = correct_verdict(Some(r#"[{"bogus": true}]"#));

    let phase = interpret_verdict(&quest, &verdict, &state.progress);
    let AttemptPhase::Success { rows, .. } = phase else { panic!("expected success") };
    let rows = rows.expect("rows");
    assert_eq!(rows.len(), 3);
    assert!(rows[0].get("bogus").is_none());
  }

  #[test]
  fn malformed_simulated_result_degrades_to_placeholder() {
    let state = AppState::for_tests();
    let quest = generated_quest();
    let verdict = correct_verdict(Some("not json"));

    let phase = interpret_verdict(&quest, &verdict, &state.progress);
    let AttemptPhase::Success { feedback, rows } = phase else { panic!("expected success") };
    assert_eq!(feedback, "Nailed it.");
    let rows = rows.expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(
      rows[0].get("status").and_then(|v| v.as_str()),
      Some("Could not display simulated results.")
    );
  }

  #[test]
  fn missing_simulated_result_shows_no_rows() {
    let state = AppState::for_tests();
    let phase = interpret_verdict(&generated_quest(), &correct_verdict(None), &state.progress);
    let AttemptPhase::Success { rows, .. } = phase else { panic!("expected success") };
    assert!(rows.is_none());
  }

  #[tokio::test]
  async fn overloaded_oracle_leaves_progress_untouched_and_recovers() {
    let state = AppState::for_tests();
    load_quest(&state, "where-clause").await.expect("quest");

    // Shape the overload the way submit_query would, then land it.
    let busy = phase_for_oracle_error(&OracleError::Overloaded);
    match &busy {
      AttemptPhase::OracleBusy { message } => assert_eq!(message, ORACLE_BUSY_MESSAGE),
      other => panic!("expected busy, got {other:?}"),
    }
    {
      let mut session = state.session.write().await;
      let ticket = session.begin_submit().expect("ticket");
      session.finish_submit(ticket.seq, busy);
    }
    assert!(state.progress.completed().is_empty());

    // Identical resubmit after recovery transitions normally to success.
    let outcome =
      submit_query(&state, "SELECT name, role, salary FROM employees WHERE salary > 70000").await;
    let SubmitOutcome::Attempted { phase, attempts } = outcome else {
      panic!("expected an attempt");
    };
    assert!(matches!(phase, AttemptPhase::Success { .. }));
    assert_eq!(attempts, 2);
    assert_eq!(state.progress.completed(), vec!["where-clause".to_string()]);
  }

  #[tokio::test]
  async fn generation_without_oracle_reports_unavailable() {
    let state = AppState::for_tests();
    let schema = TableSchema { table_name: "orders".into(), columns: vec![] };
    let err = generate_custom_quest(&state, schema, "Filtering with WHERE clause")
      .await
      .expect_err("no oracle");
    assert!(err.contains("unavailable"));
    assert!(state.custom_quest.read().await.is_none());
  }

  #[test]
  fn snapshot_rounds_category_percentages() {
    let state = AppState::for_tests();
    state.progress.mark_completed("select-basics");
    state.progress.mark_completed("key-master");

    let snap = progress_snapshot(&state);
    assert_eq!(snap.badge_count, 1);
    assert_eq!(snap.rank, "Schema Squire");
    // 1 of 5 SQL Basics quests, 1 of 2 Constraints quests.
    assert!(snap.categories.contains(&("SQL Basics".to_string(), 20)));
    assert!(snap.categories.contains(&("Constraints".to_string(), 50)));
  }
}
