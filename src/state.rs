//! Application state: the quest catalog, the progress store, the transient
//! generated-quest slot, the learner session, and the optional oracle client.
//!
//! The store is scoped per client: one backend instance serves one learner
//! session, so the session and the generated-quest slot are single objects
//! rather than keyed maps.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::catalog::Catalog;
use crate::config::{load_tutor_config_from_env, Prompts};
use crate::domain::{Quest, GENERATED_QUEST_ID};
use crate::oracle::Oracle;
use crate::progress::{progress_path_from_env, ProgressStore};
use crate::session::QuestSession;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub progress: Arc<ProgressStore>,
    /// At most one generated quest is live at a time; a new generation
    /// overwrites the previous one.
    pub custom_quest: Arc<RwLock<Option<Quest>>>,
    pub session: Arc<RwLock<QuestSession>>,
    pub oracle: Option<Oracle>,
    pub prompts: Prompts,
}

impl AppState {
    /// Build state from env: load config, assemble the catalog, open the
    /// progress store, init the oracle client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg_opt = load_tutor_config_from_env();
        let prompts = cfg_opt
            .as_ref()
            .map(|c| c.prompts.clone())
            .unwrap_or_default();

        let bank_quests: Vec<Quest> = cfg_opt
            .map(|c| c.quests.into_iter().map(|q| q.into_quest()).collect())
            .unwrap_or_default();
        let catalog = Catalog::new(bank_quests);
        info!(
            target: "quest",
            quests = catalog.list().len(),
            categories = catalog.categories().len(),
            "Startup quest inventory"
        );

        let progress = ProgressStore::open(progress_path_from_env());
        info!(
            target: "quest",
            completed = progress.completed_count(),
            badges = progress.badge_count(),
            rank = progress.rank(),
            "Learner progress loaded"
        );

        let oracle = Oracle::from_env();
        if let Some(o) = &oracle {
            info!(target: "sqlquest_backend", base_url = %o.base_url, fast_model = %o.fast_model, strong_model = %o.strong_model, "Oracle enabled.");
        } else {
            info!(target: "sqlquest_backend", "Oracle disabled (no OPENAI_API_KEY). Canonical quests fall back to reference-answer grading.");
        }

        Self {
            catalog: Arc::new(catalog),
            progress: Arc::new(progress),
            custom_quest: Arc::new(RwLock::new(None)),
            session: Arc::new(RwLock::new(QuestSession::new())),
            oracle,
            prompts,
        }
    }

    /// State for tests: empty env-independent configuration, in-memory
    /// progress, no oracle.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            catalog: Arc::new(Catalog::new(vec![])),
            progress: Arc::new(ProgressStore::open(None)),
            custom_quest: Arc::new(RwLock::new(None)),
            session: Arc::new(RwLock::new(QuestSession::new())),
            oracle: None,
            prompts: Prompts::default(),
        }
    }

    /// Resolve a quest id: the reserved generated id reads the transient slot
    /// (always the freshest generation), anything else hits the catalog.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_quest(&self, id: &str) -> Option<Quest> {
        if id == GENERATED_QUEST_ID {
            self.custom_quest.read().await.clone()
        } else {
            self.catalog.find(id).cloned()
        }
    }

    /// Install a freshly generated quest, replacing any previous one.
    #[instrument(level = "info", skip(self, quest), fields(title = %quest.title))]
    pub async fn set_custom_quest(&self, quest: Quest) {
        let mut slot = self.custom_quest.write().await;
        *slot = Some(quest);
    }
}
