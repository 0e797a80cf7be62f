//! The per-learner validation session: active quest, attempt counter, and the
//! submit state machine.
//!
//! Phases: `Idle -> Submitting -> {Success, Hint, OracleBusy, Error} -> Idle`
//! (a new submit discards the prior terminal phase). The only suspension point
//! in an attempt is the oracle call, which happens between `begin_submit` and
//! `finish_submit` without holding the session. Rapid repeated submits are
//! resolved last-submit-wins: every submit takes a ticket with a fresh
//! sequence number, and only the outcome carrying the latest issued number is
//! allowed to update the displayed phase. Loading a quest advances the same
//! counter, so outcomes still in flight for the previous quest are stale too.
//! Stale outcomes are dropped (progress mutation is idempotent and is applied
//! by the caller before finishing, so dropping a stale display is safe).

use tracing::{debug, instrument};

use crate::domain::{Quest, ResultRow};

/// What the learner sees for the current attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum AttemptPhase {
  Idle,
  Submitting,
  Success { feedback: String, rows: Option<Vec<ResultRow>> },
  Hint { feedback: String },
  OracleBusy { message: String },
  Error { message: String },
}

/// Handed out by `begin_submit`; carries everything the oracle call needs so
/// the session lock is not held across the await. `attempt` is this submit's
/// own position in the counter, so the response reports it even when newer
/// submits land meanwhile.
pub struct SubmitTicket {
  pub seq: u64,
  pub attempt: u32,
  pub quest: Quest,
}

pub struct QuestSession {
  active: Option<Quest>,
  attempts: u32,
  phase: AttemptPhase,
  latest_seq: u64,
}

impl Default for QuestSession {
  fn default() -> Self {
    Self::new()
  }
}

impl QuestSession {
  pub fn new() -> Self {
    Self { active: None, attempts: 0, phase: AttemptPhase::Idle, latest_seq: 0 }
  }

  /// Make `quest` the active quest, resetting the attempt counter and phase.
  /// Also advances the sequence counter so any outcome still in flight for the
  /// previous quest is dropped by `finish_submit`.
  #[instrument(level = "debug", skip_all, fields(quest_id = %quest.id))]
  pub fn load(&mut self, quest: Quest) {
    self.active = Some(quest);
    self.attempts = 0;
    self.phase = AttemptPhase::Idle;
    self.latest_seq += 1;
  }

  pub fn active(&self) -> Option<&Quest> {
    self.active.as_ref()
  }

  /// Attempts against the active quest since it was loaded. Not persisted.
  pub fn attempts(&self) -> u32 {
    self.attempts
  }

  pub fn phase(&self) -> &AttemptPhase {
    &self.phase
  }

  /// Start an attempt. Returns `None` (a guarded no-op) when no quest is
  /// loaded. Otherwise counts the attempt, discards the previous terminal
  /// phase, and hands back a ticket for the oracle round-trip.
  pub fn begin_submit(&mut self) -> Option<SubmitTicket> {
    let quest = self.active.as_ref()?.clone();
    self.attempts += 1;
    self.latest_seq += 1;
    self.phase = AttemptPhase::Submitting;
    Some(SubmitTicket { seq: self.latest_seq, attempt: self.attempts, quest })
  }

  /// Apply an attempt outcome. Only the outcome for the latest issued ticket
  /// updates the displayed phase; anything older lost the race and is dropped.
  /// Returns whether the outcome was applied.
  pub fn finish_submit(&mut self, seq: u64, outcome: AttemptPhase) -> bool {
    if seq != self.latest_seq {
      debug!(target: "quest", seq, latest = self.latest_seq, "Dropping stale attempt outcome");
      return false;
    }
    self.phase = outcome;
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Difficulty, QuestKind, TableSchema};

  fn dummy_quest(id: &str) -> Quest {
    Quest {
      id: id.into(),
      title: "T".into(),
      description: String::new(),
      long_description: "Do the thing.".into(),
      difficulty: Difficulty::Beginner,
      category: "SQL Basics".into(),
      initial_query: String::new(),
      schema: TableSchema { table_name: "t".into(), columns: vec![] },
      kind: QuestKind::Generated,
    }
  }

  #[test]
  fn submit_without_active_quest_is_a_no_op() {
    let mut session = QuestSession::new();
    assert!(session.begin_submit().is_none());
    assert_eq!(session.attempts(), 0);
  }

  #[test]
  fn attempts_count_per_loaded_quest() {
    let mut session = QuestSession::new();
    session.load(dummy_quest("a"));
    session.begin_submit().unwrap();
    session.begin_submit().unwrap();
    assert_eq!(session.attempts(), 2);

    session.load(dummy_quest("b"));
    assert_eq!(session.attempts(), 0);
  }

  #[test]
  fn latest_submit_wins_over_stale_outcome() {
    let mut session = QuestSession::new();
    session.load(dummy_quest("a"));

    let first = session.begin_submit().unwrap();
    let second = session.begin_submit().unwrap();

    let newer = AttemptPhase::Hint { feedback: "closer".into() };
    assert!(session.finish_submit(second.seq, newer.clone()));

    let stale = AttemptPhase::Success { feedback: "old".into(), rows: None };
    assert!(!session.finish_submit(first.seq, stale));
    assert_eq!(*session.phase(), newer);
  }

  #[test]
  fn outcome_for_previous_quest_is_dropped_after_switch() {
    let mut session = QuestSession::new();
    session.load(dummy_quest("a"));
    let in_flight = session.begin_submit().unwrap();

    // The learner switches quests while the oracle is still judging quest a.
    session.load(dummy_quest("b"));

    let late = AttemptPhase::Success { feedback: "quest-a success".into(), rows: None };
    assert!(!session.finish_submit(in_flight.seq, late));
    assert_eq!(*session.phase(), AttemptPhase::Idle);
    assert_eq!(session.active().unwrap().id, "b");
  }

  #[test]
  fn tickets_carry_their_own_attempt_number() {
    let mut session = QuestSession::new();
    session.load(dummy_quest("a"));
    let first = session.begin_submit().unwrap();
    let second = session.begin_submit().unwrap();
    assert_eq!(first.attempt, 1);
    assert_eq!(second.attempt, 2);
  }
}
