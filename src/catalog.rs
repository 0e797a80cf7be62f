//! The built-in quest catalog.
//!
//! A finite, static set of canonical quests in authoring order. Categories and
//! difficulty labels are defined here by content; consumers filtering on them
//! must treat the values as opaque data. The catalog itself never mutates —
//! config-bank quests are appended once at startup (see `state.rs`).

use serde_json::json;
use tracing::instrument;

use crate::domain::{ColumnDef, Difficulty, Quest, QuestKind, ResultRow, TableSchema};

pub struct Catalog {
  quests: Vec<Quest>,
}

impl Catalog {
  /// Build the catalog: built-in quests first, then any extra bank quests.
  #[instrument(level = "debug", skip_all, fields(extra = extra.len()))]
  pub fn new(extra: Vec<Quest>) -> Self {
    let mut quests = builtin_quests();
    for q in extra {
      // Bank entries never shadow a built-in id.
      if quests.iter().all(|existing| existing.id != q.id) {
        quests.push(q);
      }
    }
    Self { quests }
  }

  pub fn list(&self) -> &[Quest] {
    &self.quests
  }

  pub fn find(&self, id: &str) -> Option<&Quest> {
    self.quests.iter().find(|q| q.id == id)
  }

  /// Distinct categories, in first-appearance order.
  pub fn categories(&self) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for q in &self.quests {
      if !out.contains(&q.category) {
        out.push(q.category.clone());
      }
    }
    out
  }
}

/// Turn a `json!` array of objects into result rows. Non-object entries are
/// dropped; catalog literals below are all objects.
fn rows(v: serde_json::Value) -> Vec<ResultRow> {
  match v {
    serde_json::Value::Array(items) => items
      .into_iter()
      .filter_map(|item| match item {
        serde_json::Value::Object(m) => Some(m),
        _ => None,
      })
      .collect(),
    _ => Vec::new(),
  }
}

fn employees_schema() -> TableSchema {
  TableSchema {
    table_name: "employees".into(),
    columns: vec![
      ColumnDef { name: "id".into(), data_type: "INTEGER".into() },
      ColumnDef { name: "name".into(), data_type: "TEXT".into() },
      ColumnDef { name: "role".into(), data_type: "TEXT".into() },
      ColumnDef { name: "salary".into(), data_type: "INTEGER".into() },
    ],
  }
}

fn builtin_quests() -> Vec<Quest> {
  vec![
    Quest {
      id: "select-basics".into(),
      title: "The SELECT Statement".into(),
      description: "Learn to retrieve data from a table.".into(),
      long_description: "The kingdom's scribe has recorded all the royal employees in a table, \
        but the records are magically sealed. Use your SQL knowledge to unseal them! Write a \
        query to select all columns and all rows from the `employees` table."
        .into(),
      difficulty: Difficulty::Beginner,
      category: "SQL Basics".into(),
      initial_query: "SELECT * FROM employees;".into(),
      schema: employees_schema(),
      kind: QuestKind::Canonical {
        correct_query: "SELECT * FROM employees".into(),
        success_message: "You have successfully retrieved all employee records. Great job!".into(),
        result_data: rows(json!([
          { "id": 1, "name": "King Arthur", "role": "King", "salary": 100000 },
          { "id": 2, "name": "Merlin", "role": "Wizard", "salary": 80000 },
          { "id": 3, "name": "Lancelot", "role": "Knight", "salary": 60000 },
          { "id": 4, "name": "Guenevere", "role": "Queen", "salary": 90000 },
        ])),
      },
    },
    Quest {
      id: "where-clause".into(),
      title: "The WHERE Clause".into(),
      description: "Filter records based on a condition.".into(),
      long_description: "The royal treasurer wants a list of all employees who earn more than \
        70,000 gold pieces. Use the WHERE clause to filter the `employees` table and find these \
        high-earners."
        .into(),
      difficulty: Difficulty::Beginner,
      category: "SQL Basics".into(),
      initial_query: "SELECT name, role, salary FROM employees\nWHERE salary > 70000;".into(),
      schema: employees_schema(),
      kind: QuestKind::Canonical {
        correct_query: "SELECT name, role, salary FROM employees WHERE salary > 70000".into(),
        success_message: "Excellent! You have successfully filtered the records.".into(),
        result_data: rows(json!([
          { "name": "King Arthur", "role": "King", "salary": 100000 },
          { "name": "Merlin", "role": "Wizard", "salary": 80000 },
          { "name": "Guenevere", "role": "Queen", "salary": 90000 },
        ])),
      },
    },
    Quest {
      id: "insert-knight".into(),
      title: "INSERT Knight".into(),
      description: "Master adding new rows of data.".into(),
      long_description: "A new knight, Sir Galahad, has joined the Round Table! His salary is \
        55,000. Your task is to insert a new record for him into the `employees` table. His ID \
        should be 5."
        .into(),
      difficulty: Difficulty::Beginner,
      category: "SQL Basics".into(),
      initial_query: "INSERT INTO employees (id, name, role, salary)\nVALUES (5, 'Sir Galahad', 'Knight', 55000);".into(),
      schema: employees_schema(),
      kind: QuestKind::Canonical {
        correct_query: "INSERT INTO employees (id, name, role, salary) VALUES (5, 'Sir Galahad', 'Knight', 55000)".into(),
        success_message: "Well done! Sir Galahad has been successfully added to the records.".into(),
        result_data: rows(json!([
          { "id": 5, "name": "Sir Galahad", "role": "Knight", "salary": 55000 },
        ])),
      },
    },
    Quest {
      id: "update-wizard".into(),
      title: "UPDATE Wizard".into(),
      description: "Become a wizard of data modification.".into(),
      long_description: "Merlin's exceptional service has earned him a raise! Update his salary \
        in the `employees` table to 85,000."
        .into(),
      difficulty: Difficulty::Intermediate,
      category: "SQL Basics".into(),
      initial_query: "UPDATE employees\nSET salary = 85000\nWHERE name = 'Merlin';".into(),
      schema: employees_schema(),
      kind: QuestKind::Canonical {
        correct_query: "UPDATE employees SET salary = 85000 WHERE name = 'Merlin'".into(),
        success_message: "Merlin is pleased! You've successfully updated his salary.".into(),
        result_data: rows(json!([
          { "name": "Merlin", "role": "Wizard", "salary": 85000 },
        ])),
      },
    },
    Quest {
      id: "key-master".into(),
      title: "The Key Master".into(),
      description: "Understand Primary and Foreign Keys.".into(),
      long_description: "This is a conceptual quest. A primary key uniquely identifies each \
        record in a table. A foreign key is a key used to link two tables together. Your task is \
        to identify the primary key in the `employees` table."
        .into(),
      difficulty: Difficulty::Intermediate,
      category: "Constraints".into(),
      initial_query: "SELECT 'id' as primary_key;".into(),
      schema: employees_schema(),
      kind: QuestKind::Canonical {
        correct_query: "SELECT 'id' as primary_key".into(),
        success_message: "Correct! The 'id' column is the primary key as it uniquely identifies each employee.".into(),
        result_data: rows(json!([
          { "primary_key": "id" },
        ])),
      },
    },
    Quest {
      id: "unique-names".into(),
      title: "The Uniqueness Charm".into(),
      description: "Ensure all values in a column are different.".into(),
      long_description: "The kingdom is expanding and we need to ensure every new `department` \
        has a unique name. Your task is to add a UNIQUE constraint to the `name` column of the \
        `departments` table. This will prevent duplicate department names from ever being \
        created."
        .into(),
      difficulty: Difficulty::Intermediate,
      category: "Constraints".into(),
      initial_query: "ALTER TABLE departments\nADD CONSTRAINT uq_department_name UNIQUE (name);".into(),
      schema: TableSchema {
        table_name: "departments".into(),
        columns: vec![
          ColumnDef { name: "id".into(), data_type: "INTEGER".into() },
          ColumnDef { name: "name".into(), data_type: "TEXT".into() },
        ],
      },
      kind: QuestKind::Canonical {
        correct_query: "ALTER TABLE departments ADD CONSTRAINT uq_department_name UNIQUE (name)".into(),
        success_message: "A powerful charm! You've ensured all department names will be unique, \
          preventing confusion in the kingdom."
          .into(),
        result_data: rows(json!([
          { "status": "Constraint added successfully" },
        ])),
      },
    },
    Quest {
      id: "join-juggler".into(),
      title: "The JOIN Juggler".into(),
      description: "Combine rows from two or more tables.".into(),
      long_description: "Let's see the department for each employee. Combine the `employees` and \
        `departments` tables to show each employee's name and their department's name. The tables \
        are linked by `department_id`."
        .into(),
      difficulty: Difficulty::Advanced,
      category: "SQL Basics".into(),
      initial_query: "SELECT e.name, d.name as department_name\nFROM employees e\nJOIN departments d ON e.department_id = d.id;".into(),
      schema: TableSchema {
        table_name: "employees & departments".into(),
        columns: vec![
          ColumnDef { name: "employees.id".into(), data_type: "INTEGER".into() },
          ColumnDef { name: "employees.name".into(), data_type: "TEXT".into() },
          ColumnDef { name: "employees.department_id".into(), data_type: "INTEGER".into() },
          ColumnDef { name: "departments.id".into(), data_type: "INTEGER".into() },
          ColumnDef { name: "departments.name".into(), data_type: "TEXT".into() },
        ],
      },
      kind: QuestKind::Canonical {
        correct_query: "SELECT e.name, d.name as department_name FROM employees e JOIN departments d ON e.department_id = d.id".into(),
        success_message: "Fantastic! You've successfully joined the tables and revealed the \
          department for each employee."
          .into(),
        result_data: rows(json!([
          { "name": "King Arthur", "department_name": "Royalty" },
          { "name": "Merlin", "department_name": "Magic" },
          { "name": "Lancelot", "department_name": "Knights" },
          { "name": "Guenevere", "department_name": "Royalty" },
        ])),
      },
    },
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_catalog_is_stable() {
    let cat = Catalog::new(vec![]);
    assert_eq!(cat.list().len(), 7);
    assert_eq!(cat.list()[0].id, "select-basics");
    assert!(cat.find("where-clause").is_some());
    assert!(cat.find("no-such-quest").is_none());
  }

  #[test]
  fn where_clause_has_three_high_earners() {
    let cat = Catalog::new(vec![]);
    let quest = cat.find("where-clause").expect("quest");
    match &quest.kind {
      QuestKind::Canonical { result_data, .. } => {
        assert_eq!(result_data.len(), 3);
        for row in result_data {
          let salary = row.get("salary").and_then(|v| v.as_i64()).expect("salary");
          assert!(salary > 70000);
        }
      }
      QuestKind::Generated => panic!("catalog quest must be canonical"),
    }
  }

  #[test]
  fn bank_quests_never_shadow_builtins() {
    let mut clone = builtin_quests().remove(0);
    clone.title = "Impostor".into();
    let cat = Catalog::new(vec![clone]);
    assert_eq!(cat.list().len(), 7);
    assert_eq!(cat.find("select-basics").unwrap().title, "The SELECT Statement");
  }

  #[test]
  fn categories_follow_authoring_order() {
    let cat = Catalog::new(vec![]);
    assert_eq!(cat.categories(), vec!["SQL Basics".to_string(), "Constraints".to_string()]);
  }
}
