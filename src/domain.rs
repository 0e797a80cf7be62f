//! Domain models: quests, difficulties, table schemas, and result rows.
//!
//! A quest is either `Canonical` (catalog-defined, progress-eligible, with a
//! canned result set) or `Generated` (session-transient, produced by the
//! generation oracle from user-supplied data). The variant decides which side
//! of the result/feedback policy applies at validation time, so no boolean
//! flag needs to travel through the call chain.

use serde::{Deserialize, Serialize};

/// Reserved id for the single transient generated quest.
pub const GENERATED_QUEST_ID: &str = "custom-quest";

/// A displayed result set row: column name -> scalar JSON value.
pub type ResultRow = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
  Beginner,
  Intermediate,
  Advanced,
}

/// One column of a described table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnDef {
  pub name: String,
  #[serde(rename = "type")]
  pub data_type: String,
}

/// Described table schema. Never executed against; rendered to text for the
/// oracles and displayed to the learner.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableSchema {
  #[serde(rename = "tableName")]
  pub table_name: String,
  pub columns: Vec<ColumnDef>,
}

impl TableSchema {
  /// Render the schema in the textual convention both oracle prompts expect:
  /// `Table: <name>\nColumns: <col1> (<type1>), <col2> (<type2>), ...`
  pub fn to_prompt_text(&self) -> String {
    let cols = self
      .columns
      .iter()
      .map(|c| format!("{} ({})", c.name, c.data_type))
      .collect::<Vec<_>>()
      .join(", ");
    format!("Table: {}\nColumns: {}", self.table_name, cols)
  }
}

/// Variant-specific quest data.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestKind {
  /// Catalog quest: completing it mutates persistent progress, and success
  /// shows the canned result set and success message.
  Canonical {
    /// Reference answer, advisory only. The oracle is never asked to
    /// string-match it; we use it for the offline fallback grader.
    correct_query: String,
    success_message: String,
    result_data: Vec<ResultRow>,
  },
  /// Transient quest built from an inferred schema. Grading and result rows
  /// come entirely from the correctness oracle; never enters progress.
  Generated,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quest {
  pub id: String,
  pub title: String,
  pub description: String,
  /// Authoritative problem statement fed to the correctness oracle.
  pub long_description: String,
  pub difficulty: Difficulty,
  pub category: String,
  /// Starting text for the editor; not consulted for grading.
  pub initial_query: String,
  pub schema: TableSchema,
  pub kind: QuestKind,
}

impl Quest {
  pub fn is_generated(&self) -> bool {
    matches!(self.kind, QuestKind::Generated)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn employees_schema() -> TableSchema {
    TableSchema {
      table_name: "employees".into(),
      columns: vec![
        ColumnDef { name: "id".into(), data_type: "INTEGER".into() },
        ColumnDef { name: "name".into(), data_type: "TEXT".into() },
        ColumnDef { name: "salary".into(), data_type: "INTEGER".into() },
      ],
    }
  }

  #[test]
  fn schema_prompt_text_matches_oracle_convention() {
    let text = employees_schema().to_prompt_text();
    assert_eq!(
      text,
      "Table: employees\nColumns: id (INTEGER), name (TEXT), salary (INTEGER)"
    );
  }

  #[test]
  fn schema_prompt_text_with_no_columns_keeps_header() {
    let schema = TableSchema { table_name: "empty".into(), columns: vec![] };
    assert_eq!(schema.to_prompt_text(), "Table: empty\nColumns: ");
  }
}
