use crate::analysis::aggregation::{
    bar_data, format_totals, overall_distribution, per_goal_percent, radial_data, sort_by_team,
    stacked_data, team_share, team_totals,
};
use crate::analysis::pagination::Pager;
use crate::error::StoreError;
use crate::models::aggregate::{DashboardData, PageRow};
use crate::models::goal::Goal;

pub const DEFAULT_PAGE_SIZE: usize = 3;

/// Dashboard state: goals ordered by team plus the carousel cursor.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub goals: Vec<Goal>,
    pub pager: Pager,
    pub error: Option<String>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl DashboardState {
    pub fn new(page_size: usize) -> Self {
        Self {
            goals: Vec::new(),
            pager: Pager::new(page_size),
            error: None,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: Result<Vec<Goal>, StoreError>) {
        match snapshot {
            Ok(mut goals) => {
                sort_by_team(&mut goals);
                self.goals = goals;
                self.pager.clamp_to(self.goals.len());
            }
            Err(err) => {
                log::error!("dashboard subscription failed: {err}");
                self.error = Some(err.to_string());
            }
        }
    }

    pub fn next_page(&mut self) -> usize {
        self.pager.next(self.goals.len())
    }

    pub fn prev_page(&mut self) -> usize {
        self.pager.prev(self.goals.len())
    }

    /// Recomputes every dashboard series from the current goals.
    pub fn view(&self) -> DashboardData {
        let totals = team_totals(&self.goals);
        let page = self.pager.slice(&self.goals);

        DashboardData {
            totals,
            label: format_totals(&totals),
            page_index: self.pager.page_index,
            page_count: self.pager.page_count(self.goals.len()),
            rows: page
                .iter()
                .map(|g| PageRow {
                    id: g.id.clone(),
                    team: g.team.clone(),
                    target: g.target,
                    current: g.current,
                    percent: per_goal_percent(g),
                })
                .collect(),
            bars: bar_data(page),
            radial: radial_data(page),
            stacked: stacked_data(page),
            team_share: team_share(&self.goals),
            distribution: overall_distribution(&totals),
        }
    }
}
