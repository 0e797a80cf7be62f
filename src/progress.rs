//! Learner progress: the observable completed-quest store plus the pure
//! badge/rank derivations.
//!
//! The store keeps the authoritative completed set in memory and persists it
//! best-effort to a JSON file (`{"completed_quests": ["id", ...]}`). Storage
//! trouble never surfaces to callers: a missing or unreadable file reads as an
//! empty set, and a failed write is logged and dropped. Every mutation emits a
//! payload-free change signal on a `watch` channel; observers re-read the
//! store on wakeup, so bursts of mutations coalesce into a single re-fetch.

use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// Rank for a completed-quest count. Total and pure; thresholds are evaluated
/// highest-first, first match wins.
pub fn rank_for(completed_count: usize) -> &'static str {
  if completed_count >= 7 {
    "Join Juggernaut"
  } else if completed_count >= 5 {
    "Key Master"
  } else if completed_count >= 3 {
    "Query Knight"
  } else if completed_count >= 1 {
    "Schema Squire"
  } else {
    "Data Novice"
  }
}

/// One badge per two completed quests.
pub fn badges_for(completed_count: usize) -> usize {
  completed_count / 2
}

#[derive(Serialize, Deserialize, Default)]
struct ProgressFile {
  #[serde(rename = "completed_quests", default)]
  completed: Vec<String>,
}

pub struct ProgressStore {
  path: Option<PathBuf>,
  // Insertion-ordered, unique. Order is irrelevant to consumers but keeping
  // it stable makes the persisted file diff-friendly.
  completed: RwLock<Vec<String>>,
  notify: watch::Sender<()>,
}

impl ProgressStore {
  /// Open the store backed by `path`, loading any previously persisted set.
  /// `None` runs purely in memory (tests, ephemeral deployments).
  #[instrument(level = "info", skip_all, fields(path = ?path))]
  pub fn open(path: Option<PathBuf>) -> Self {
    let completed = match &path {
      Some(p) => match std::fs::read_to_string(p) {
        Ok(body) => match serde_json::from_str::<ProgressFile>(&body) {
          Ok(file) => {
            let mut seen = Vec::new();
            for id in file.completed {
              if !seen.contains(&id) {
                seen.push(id);
              }
            }
            info!(target: "quest", count = seen.len(), "Loaded persisted progress");
            seen
          }
          Err(e) => {
            warn!(target: "quest", error = %e, "Progress file unreadable; starting empty");
            Vec::new()
          }
        },
        // Absent file is the lazy-creation case, not an error.
        Err(_) => Vec::new(),
      },
      None => Vec::new(),
    };

    let (notify, _) = watch::channel(());
    Self { path, completed: RwLock::new(completed), notify }
  }

  /// Completed quest ids. Never fails; an unavailable backing file was already
  /// absorbed at load time.
  pub fn completed(&self) -> Vec<String> {
    self.completed.read().map(|c| c.clone()).unwrap_or_default()
  }

  pub fn completed_count(&self) -> usize {
    self.completed.read().map(|c| c.len()).unwrap_or(0)
  }

  /// Record a quest as completed. Idempotent: an already-present id is a
  /// no-op and emits no signal.
  #[instrument(level = "info", skip(self))]
  pub fn mark_completed(&self, quest_id: &str) {
    {
      let mut completed = match self.completed.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
      };
      if completed.iter().any(|id| id == quest_id) {
        return;
      }
      completed.push(quest_id.to_string());
      self.persist(&completed);
      info!(target: "quest", %quest_id, total = completed.len(), "Quest marked completed");
    }
    let _ = self.notify.send(());
  }

  /// Clear all progress and signal observers.
  #[instrument(level = "info", skip(self))]
  pub fn reset(&self) {
    {
      let mut completed = match self.completed.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
      };
      completed.clear();
      self.persist(&completed);
      info!(target: "quest", "Progress reset");
    }
    let _ = self.notify.send(());
  }

  pub fn badge_count(&self) -> usize {
    badges_for(self.completed_count())
  }

  pub fn rank(&self) -> &'static str {
    rank_for(self.completed_count())
  }

  /// Change signal. Carries no payload; re-read the store on wakeup.
  pub fn subscribe(&self) -> watch::Receiver<()> {
    self.notify.subscribe()
  }

  fn persist(&self, completed: &[String]) {
    let Some(path) = &self.path else { return };
    let file = ProgressFile { completed: completed.to_vec() };
    let body = match serde_json::to_string_pretty(&file) {
      Ok(b) => b,
      Err(e) => {
        error!(target: "quest", error = %e, "Progress serialization failed");
        return;
      }
    };
    if let Some(dir) = path.parent() {
      if let Err(e) = std::fs::create_dir_all(dir) {
        error!(target: "quest", error = %e, "Progress dir creation failed; write skipped");
        return;
      }
    }
    if let Err(e) = std::fs::write(path, body) {
      error!(target: "quest", error = %e, "Progress write failed; continuing in memory");
    }
  }
}

/// Resolve the backing file path from PROGRESS_PATH (default ./data/progress.json).
pub fn progress_path_from_env() -> Option<PathBuf> {
  match std::env::var("PROGRESS_PATH") {
    Ok(p) if p.is_empty() => None,
    Ok(p) => Some(PathBuf::from(p)),
    Err(_) => Some(PathBuf::from("./data/progress.json")),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mark_completed_is_idempotent() {
    let store = ProgressStore::open(None);
    store.mark_completed("select-basics");
    store.mark_completed("select-basics");
    assert_eq!(store.completed(), vec!["select-basics".to_string()]);
  }

  #[test]
  fn badge_formula_floors_halves() {
    for (count, badges) in [(0, 0), (1, 0), (2, 1), (3, 1), (4, 2), (7, 3)] {
      assert_eq!(badges_for(count), badges, "count={count}");
    }
  }

  #[test]
  fn rank_advances_through_thresholds() {
    assert_eq!(rank_for(0), "Data Novice");
    assert_eq!(rank_for(1), "Schema Squire");
    assert_eq!(rank_for(3), "Query Knight");
    assert_eq!(rank_for(5), "Key Master");
    assert_eq!(rank_for(7), "Join Juggernaut");
  }

  #[test]
  fn rank_between_thresholds_matches_lower_threshold() {
    assert_eq!(rank_for(2), rank_for(1));
    assert_eq!(rank_for(4), rank_for(3));
    assert_eq!(rank_for(6), rank_for(5));
    assert_eq!(rank_for(42), rank_for(7));
  }

  #[test]
  fn rank_index_is_monotonic() {
    let order = ["Data Novice", "Schema Squire", "Query Knight", "Key Master", "Join Juggernaut"];
    let index = |name: &str| order.iter().position(|r| *r == name).expect("known rank");
    let mut prev = 0;
    for count in 0..10 {
      let idx = index(rank_for(count));
      assert!(idx >= prev, "rank regressed at count {count}");
      prev = idx;
    }
  }

  #[test]
  fn reset_clears_and_notifies() {
    let store = ProgressStore::open(None);
    let rx = store.subscribe();
    store.mark_completed("a");
    store.mark_completed("b");
    assert_eq!(store.badge_count(), 1);
    store.reset();
    assert!(store.completed().is_empty());
    assert_eq!(store.rank(), "Data Novice");
    // Mutations happened; the coalesced signal must be observable.
    assert!(rx.has_changed().unwrap());
  }

  #[test]
  fn duplicate_completion_emits_no_signal() {
    let store = ProgressStore::open(None);
    store.mark_completed("a");
    let rx = store.subscribe();
    store.mark_completed("a");
    assert!(!rx.has_changed().unwrap());
  }

  #[test]
  fn persists_and_reloads_across_instances() {
    let mut path = std::env::temp_dir();
    path.push(format!("sqlquest-progress-test-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let store = ProgressStore::open(Some(path.clone()));
    store.mark_completed("where-clause");
    drop(store);

    let reopened = ProgressStore::open(Some(path.clone()));
    assert_eq!(reopened.completed(), vec!["where-clause".to_string()]);
    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn corrupt_progress_file_reads_as_empty() {
    let mut path = std::env::temp_dir();
    path.push(format!("sqlquest-progress-corrupt-{}.json", std::process::id()));
    std::fs::write(&path, "not json").unwrap();

    let store = ProgressStore::open(Some(path.clone()));
    assert!(store.completed().is_empty());
    let _ = std::fs::remove_file(&path);
  }
}
