//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Difficulty, Quest, QuestKind, ResultRow, TableSchema};
use crate::logic::{ProgressSnapshot, SubmitOutcome};
use crate::session::AttemptPhase;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    LoadQuest {
        #[serde(rename = "questId")]
        quest_id: String,
    },
    SubmitQuery {
        query: String,
    },
    GenerateQuest {
        #[serde(rename = "tableName")]
        table_name: String,
        columns: Vec<ColumnIn>,
        topic: String,
    },
    GetSession,
    GetProgress,
    ResetProgress,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Quest {
        quest: QuestOut,
    },
    Answer {
        #[serde(flatten)]
        result: AnswerOut,
    },
    Session {
        #[serde(flatten)]
        session: SessionOut,
    },
    Progress {
        #[serde(flatten)]
        progress: ProgressOut,
    },
    /// Payload-free change broadcast; re-fetch progress on receipt.
    ProgressUpdated,
    Error {
        message: String,
    },
}

/// DTO used by both WS and HTTP for quest delivery.
#[derive(Debug, Serialize)]
pub struct QuestOut {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "longDescription")]
    pub long_description: String,
    pub difficulty: Difficulty,
    pub category: String,
    #[serde(rename = "initialQuery")]
    pub initial_query: String,
    pub schema: TableSchema,
    pub custom: bool,
}

/// Convert full `Quest` (internal) to the public DTO. The reference answer
/// and canned rows never leave the backend before a successful attempt.
pub fn to_out(q: &Quest) -> QuestOut {
    QuestOut {
        id: q.id.clone(),
        title: q.title.clone(),
        description: q.description.clone(),
        long_description: q.long_description.clone(),
        difficulty: q.difficulty,
        category: q.category.clone(),
        initial_query: q.initial_query.clone(),
        schema: q.schema.clone(),
        custom: matches!(q.kind, QuestKind::Generated),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct LoadQuestIn {
    #[serde(rename = "questId")]
    pub quest_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub query: String,
}

/// One attempt's outcome, tagged by the orchestrator phase it landed in.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOut {
    NoActiveQuest,
    Success {
        feedback: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Vec<ResultRow>>,
        attempts: u32,
    },
    Hint {
        feedback: String,
        attempts: u32,
    },
    Busy {
        message: String,
        attempts: u32,
    },
    Error {
        message: String,
        attempts: u32,
    },
}

impl AnswerOut {
    pub fn from_outcome(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::NoActiveQuest => AnswerOut::NoActiveQuest,
            SubmitOutcome::Attempted { phase, attempts } => match phase {
                AttemptPhase::Success { feedback, rows } => {
                    AnswerOut::Success { feedback, result: rows, attempts }
                }
                AttemptPhase::Hint { feedback } => AnswerOut::Hint { feedback, attempts },
                AttemptPhase::OracleBusy { message } => AnswerOut::Busy { message, attempts },
                AttemptPhase::Error { message } => AnswerOut::Error { message, attempts },
                // Submitting/Idle never leave the orchestrator as an outcome.
                AttemptPhase::Idle | AttemptPhase::Submitting => AnswerOut::Error {
                    message: crate::logic::VALIDATION_FAILED_MESSAGE.into(),
                    attempts,
                },
            },
        }
    }
}

/// Orchestrator phase as shown to the client. `Idle`/`Submitting` appear only
/// in session snapshots; attempt outcomes arrive as `AnswerOut`.
#[derive(Debug, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseOut {
    Idle,
    Submitting,
    Success {
        feedback: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Vec<ResultRow>>,
    },
    Hint {
        feedback: String,
    },
    Busy {
        message: String,
    },
    Error {
        message: String,
    },
}

impl PhaseOut {
    pub fn from_phase(phase: &AttemptPhase) -> Self {
        match phase {
            AttemptPhase::Idle => PhaseOut::Idle,
            AttemptPhase::Submitting => PhaseOut::Submitting,
            AttemptPhase::Success { feedback, rows } => {
                PhaseOut::Success { feedback: feedback.clone(), result: rows.clone() }
            }
            AttemptPhase::Hint { feedback } => PhaseOut::Hint { feedback: feedback.clone() },
            AttemptPhase::OracleBusy { message } => PhaseOut::Busy { message: message.clone() },
            AttemptPhase::Error { message } => PhaseOut::Error { message: message.clone() },
        }
    }
}

/// Current session view: what is loaded, how many attempts, and the phase.
/// Lets a reconnecting client restore its display without resubmitting.
#[derive(Debug, Serialize)]
pub struct SessionOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quest: Option<QuestOut>,
    pub attempts: u32,
    #[serde(flatten)]
    pub phase: PhaseOut,
}

#[derive(Debug, Deserialize)]
pub struct ColumnIn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateIn {
    #[serde(rename = "tableName")]
    pub table_name: String,
    pub columns: Vec<ColumnIn>,
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct CategoryProgressOut {
    pub category: String,
    pub percent: u8,
}

#[derive(Debug, Serialize)]
pub struct ProgressOut {
    pub completed: Vec<String>,
    #[serde(rename = "badgeCount")]
    pub badge_count: usize,
    pub rank: String,
    pub categories: Vec<CategoryProgressOut>,
}

impl ProgressOut {
    pub fn from_snapshot(snap: ProgressSnapshot) -> Self {
        ProgressOut {
            completed: snap.completed,
            badge_count: snap.badge_count,
            rank: snap.rank.to_string(),
            categories: snap
                .categories
                .into_iter()
                .map(|(category, percent)| CategoryProgressOut { category, percent })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
