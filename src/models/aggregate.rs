use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamTotals {
    pub target_sum: f64,
    pub current_sum: f64,
    pub pct: f64, // unrounded, formatted with one decimal for display
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamShare {
    pub team: String,
    pub current: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarDatum {
    pub name: String,
    pub target: f64,
    pub current: f64,
    pub percent: i64, // rounded, not clamped
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialDatum {
    pub name: String,
    pub percent: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedDatum {
    pub name: String,
    pub current: f64,
    pub remaining: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSlice {
    pub name: String, // "current" | "remaining"
    pub value: f64,
}

/// One row of the management table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerRow {
    pub id: String,
    pub team: String,
    pub title: String,
    pub target: f64,
    pub current: f64,
    pub percent: i64,
    pub complete: bool,
}

/// Row of the dashboard's "displayed data" table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRow {
    pub id: String,
    pub team: String,
    pub target: f64,
    pub current: f64,
    pub percent: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    pub totals: TeamTotals,
    pub label: String,
    pub page_index: usize,
    pub page_count: usize,
    pub rows: Vec<PageRow>,
    pub bars: Vec<BarDatum>,
    pub radial: Vec<RadialDatum>,
    pub stacked: Vec<StackedDatum>,
    pub team_share: Vec<TeamShare>,
    pub distribution: Vec<DistributionSlice>,
}
