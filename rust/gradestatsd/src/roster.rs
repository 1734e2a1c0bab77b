use anyhow::Context;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;

pub const CLASSES_KEY: &str = "calculatorClasses";
pub const ASSIGNMENTS_KEY: &str = "assignments";
/// Max score offered when the caller leaves it out.
pub const DEFAULT_MAX_SCORE: i64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub title: String,
    pub max_score: f64,
    pub class_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterError {
    NoClassName,
    NoTitle,
    InvalidMaxScore,
}

pub fn new_class(name: &str) -> Result<ClassEntry, RosterError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RosterError::NoClassName);
    }
    Ok(ClassEntry {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
    })
}

/// Whole number greater than zero, given as a JSON number or as text.
/// A missing value means [`DEFAULT_MAX_SCORE`].
pub fn parse_max_score(raw: Option<&serde_json::Value>) -> Result<i64, RosterError> {
    let parsed = match raw {
        None | Some(serde_json::Value::Null) => Some(DEFAULT_MAX_SCORE),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    parsed.filter(|m| *m > 0).ok_or(RosterError::InvalidMaxScore)
}

pub fn new_assignment(class_id: &str, title: &str, max_score: i64) -> Result<Assignment, RosterError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(RosterError::NoTitle);
    }
    if max_score <= 0 {
        return Err(RosterError::InvalidMaxScore);
    }
    Ok(Assignment {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        max_score: max_score as f64,
        class_id: class_id.to_string(),
    })
}

/// A stored value that is not an array reads as an empty list.
fn load_list<T: serde::de::DeserializeOwned>(conn: &Connection, key: &str) -> anyhow::Result<Vec<T>> {
    match db::settings_get_json(conn, key)? {
        Some(v) if v.is_array() => {
            serde_json::from_value(v).with_context(|| format!("stored {} are malformed", key))
        }
        Some(_) => {
            tracing::warn!(key, "stored list is not an array, treating as empty");
            Ok(Vec::new())
        }
        None => Ok(Vec::new()),
    }
}

fn store_list<T: Serialize>(conn: &Connection, key: &str, items: &[T]) -> anyhow::Result<()> {
    db::settings_set_json(conn, key, &serde_json::to_value(items)?)
}

pub fn classes_load(conn: &Connection) -> anyhow::Result<Vec<ClassEntry>> {
    load_list(conn, CLASSES_KEY)
}

pub fn classes_store(conn: &Connection, classes: &[ClassEntry]) -> anyhow::Result<()> {
    store_list(conn, CLASSES_KEY, classes)
}

pub fn assignments_load(conn: &Connection) -> anyhow::Result<Vec<Assignment>> {
    load_list(conn, ASSIGNMENTS_KEY)
}

pub fn assignments_store(conn: &Connection, assignments: &[Assignment]) -> anyhow::Result<()> {
    store_list(conn, ASSIGNMENTS_KEY, assignments)
}
