use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceMeta {
    pub path: String,
    pub name: String,
    pub goal_count: usize,
    pub last_updated_at: Option<i64>,
}
