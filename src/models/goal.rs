use serde::{Deserialize, Serialize};

/// Raw record as held by the store under `goals/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRecord {
    pub team: String,
    pub title: String,
    pub target: f64,
    #[serde(default)]
    pub current: f64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// A goal materialized from the store, keyed by its store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub team: String,
    pub title: String,
    pub target: f64,
    pub current: f64,
    pub created_at: i64, // ms since epoch
    pub updated_at: i64, // ms since epoch
}

impl Goal {
    pub fn from_record(id: impl Into<String>, record: GoalRecord) -> Self {
        Self {
            id: id.into(),
            team: record.team,
            title: record.title,
            target: record.target,
            current: record.current,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Field edit applied by `update`; `current` is deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalPatch {
    pub team: String,
    pub title: String,
    pub target: f64,
    pub updated_at: i64,
}

/// Change-hook payload: emitted once per committed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalWritten {
    pub id: String,
    pub record: GoalRecord,
}
