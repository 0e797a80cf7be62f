//! Loading tutor configuration (oracle prompts + optional quest bank) from TOML.
//!
//! See `TutorConfig` and `Prompts` for expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{ColumnDef, Difficulty, Quest, QuestKind, TableSchema};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TutorConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub quests: Vec<QuestCfg>,
}

/// Canonical quest entry accepted in TOML configuration. Appended to the
/// built-in catalog at startup; entries missing required fields are skipped.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestCfg {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub long_description: String,
  pub difficulty: Difficulty,
  pub category: String,
  #[serde(default)]
  pub initial_query: String,
  #[serde(default)]
  pub correct_query: String,
  #[serde(default)]
  pub success_message: String,
  pub table_name: String,
  #[serde(default)]
  pub columns: Vec<ColumnCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ColumnCfg {
  pub name: String,
  #[serde(rename = "type")]
  pub data_type: String,
}

impl QuestCfg {
  pub fn into_quest(self) -> Quest {
    Quest {
      id: self.id,
      title: self.title,
      description: self.description,
      long_description: self.long_description,
      difficulty: self.difficulty,
      category: self.category,
      initial_query: self.initial_query,
      schema: TableSchema {
        table_name: self.table_name,
        columns: self
          .columns
          .into_iter()
          .map(|c| ColumnDef { name: c.name, data_type: c.data_type })
          .collect(),
      },
      kind: QuestKind::Canonical {
        correct_query: self.correct_query,
        success_message: self.success_message,
        // Bank quests carry no canned rows; success shows an empty result.
        result_data: Vec::new(),
      },
    }
  }
}

/// Prompts used by the oracle client. Defaults reproduce the shipped tutor
/// behavior; override them in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  // Correctness verdicts
  pub validate_system: String,
  pub validate_user_template: String,
  // Quest generation
  pub generate_system: String,
  pub generate_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      validate_system: "You are an expert SQL instructor. Your task is to validate a user's SQL \
        query based on a specific quest's requirements. Respond ONLY with strict JSON of the \
        shape {\"isCorrect\": boolean, \"feedback\": string, \"simulatedResult\": string}."
        .into(),
      validate_user_template: "Quest Description:\n{quest_description}\n\nTable Schema:\n\
        {table_schema}\n\nUser's SQL Query:\n```sql\n{user_query}\n```\n\nAnalyze the user's \
        query.\n1. Determine if it correctly and efficiently solves the problem described in the \
        quest description. The query does not need to be an exact string match of a \"perfect\" \
        answer, but it must be functionally correct.\n2. If the query is correct, set isCorrect \
        to true and provide a positive feedback message.\n3. If the query is incorrect, set \
        isCorrect to false and provide a concise, helpful hint that guides the user toward the \
        correct solution. Do not give away the answer.\n4. If this is a custom quest \
        (isCustomQuest is true) AND the query is correct, set simulatedResult to a small, \
        realistic, simulated result set that the query would produce, as a valid JSON array of \
        objects encoded as a string. For example: '[{\"name\":\"John Doe\", \"age\":30}]'. If it \
        is not a custom quest or the query is incorrect, leave simulatedResult empty.\n\n\
        isCustomQuest: {is_custom_quest}"
        .into(),
      generate_system: "You are an expert SQL instructor who creates fun, themed quests for \
        students. Your task is to generate a SQL quest based on a given table schema and a \
        topic. Respond ONLY with strict JSON of the shape {\"title\": string, \
        \"longDescription\": string}."
        .into(),
      generate_user_template: "The quest should be a simple challenge that a beginner can \
        solve.\n\nTable Schema:\n```\n{table_schema}\n```\n\nQuest Topic:\n\"{topic}\"\n\nBased \
        on the schema and topic, generate a quest with:\n1. A creative title.\n2. A long \
        description (1-2 sentences) that sets up a small story and clearly states the user's \
        task.\n\nDo not provide the SQL query itself in your response. Just provide the title \
        and the description."
        .into(),
    }
  }
}

/// Attempt to load `TutorConfig` from TUTOR_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_tutor_config_from_env() -> Option<TutorConfig> {
  let path = std::env::var("TUTOR_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<TutorConfig>(&s) {
      Ok(cfg) => {
        info!(target: "sqlquest_backend", %path, "Loaded tutor config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "sqlquest_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "sqlquest_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quest_bank_entry_parses_into_canonical_quest() {
    let toml_src = r#"
      [[quests]]
      id = "group-by"
      title = "The GROUP BY Gathering"
      long_description = "Count employees per role."
      difficulty = "Intermediate"
      category = "Aggregation"
      correct_query = "SELECT role, COUNT(*) FROM employees GROUP BY role"
      table_name = "employees"
      columns = [{ name = "role", type = "TEXT" }]
    "#;
    let cfg: TutorConfig = toml::from_str(toml_src).expect("config");
    assert_eq!(cfg.quests.len(), 1);
    let quest = cfg.quests[0].clone().into_quest();
    assert_eq!(quest.id, "group-by");
    assert_eq!(quest.schema.columns[0].data_type, "TEXT");
    assert!(!quest.is_generated());
  }

  #[test]
  fn default_prompts_carry_template_keys() {
    let prompts = Prompts::default();
    assert!(prompts.validate_user_template.contains("{user_query}"));
    assert!(prompts.validate_user_template.contains("{quest_description}"));
    assert!(prompts.validate_user_template.contains("{table_schema}"));
    assert!(prompts.generate_user_template.contains("{topic}"));
  }
}
