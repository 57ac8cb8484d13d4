use serde::{Deserialize, Serialize};

/// Denormalized row pushed to the analytics sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRow {
    pub goal_id: String,
    pub team: String,
    pub title: String,
    pub target: f64,
    pub current: f64,
    pub percent: f64,
    pub updated_at: String, // ISO-8601, UTC
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowsEnvelope {
    pub rows: Vec<GoalRow>,
}
