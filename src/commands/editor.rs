use crate::analysis::aggregation::{per_goal_percent, sort_newest_first};
use crate::commands::goals::GoalRepository;
use crate::error::{GoalError, StoreError};
use crate::models::aggregate::ManagerRow;
use crate::models::goal::Goal;

pub const DEFAULT_INCREMENT_STEPS: [f64; 3] = [1.0, 5.0, 10.0];

/// What a successful submit did.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created(Goal),
    Updated(String),
}

/// In-progress form state for creating or editing a goal.
#[derive(Debug, Clone, Default)]
pub struct GoalEditor {
    pub team: String,
    pub title: String,
    pub target: String,
    pub editing_id: Option<String>,
    pub error: Option<String>,
}

impl GoalEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_editing(&self) -> bool {
        self.editing_id.is_some()
    }

    /// Sets one of `team`, `title` or `target` by name.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) -> Result<(), String> {
        let slot = match name {
            "team" => &mut self.team,
            "title" => &mut self.title,
            "target" => &mut self.target,
            _ => return Err(format!("Unknown form field: {name}")),
        };
        *slot = value.into();
        Ok(())
    }

    pub fn start_edit(&mut self, goal: &Goal) {
        self.editing_id = Some(goal.id.clone());
        self.team = goal.team.clone();
        self.title = goal.title.clone();
        self.target = goal.target.to_string();
        self.error = None;
    }

    pub fn reset(&mut self) {
        let error = self.error.take();
        *self = Self {
            error,
            ..Self::default()
        };
    }

    fn parsed_target(&self) -> Result<f64, GoalError> {
        let raw = self.target.trim();
        if raw.is_empty() {
            return Err(GoalError::validation("Target is required"));
        }
        raw.parse::<f64>()
            .map_err(|_| GoalError::validation(format!("Target is not a number: {raw}")))
    }

    /// Creates or updates through the repository. On success the form is
    /// reset; on failure it is left as typed and the message is kept.
    pub async fn submit(&mut self, repo: &GoalRepository) -> Result<SubmitOutcome, GoalError> {
        let result = self.submit_inner(repo).await;
        match &result {
            Ok(_) => {
                self.error = None;
                self.reset();
            }
            Err(err) => self.error = Some(err.to_string()),
        }
        result
    }

    async fn submit_inner(&self, repo: &GoalRepository) -> Result<SubmitOutcome, GoalError> {
        let target = self.parsed_target()?;
        match &self.editing_id {
            Some(id) => {
                repo.update(id, &self.team, &self.title, target).await?;
                Ok(SubmitOutcome::Updated(id.clone()))
            }
            None => {
                let goal = repo.create(&self.team, &self.title, target).await?;
                Ok(SubmitOutcome::Created(goal))
            }
        }
    }
}

/// Management list: newest goals first, with load/error state.
#[derive(Debug, Clone)]
pub struct ManagerState {
    pub loading: bool,
    pub goals: Vec<Goal>,
    pub error: Option<String>,
    pub increment_steps: Vec<f64>,
}

impl Default for ManagerState {
    fn default() -> Self {
        Self {
            loading: true,
            goals: Vec::new(),
            error: None,
            increment_steps: DEFAULT_INCREMENT_STEPS.to_vec(),
        }
    }
}

impl ManagerState {
    pub fn with_increment_steps(steps: Vec<f64>) -> Self {
        Self {
            increment_steps: steps,
            ..Self::default()
        }
    }

    /// Store errors keep the last good list on screen.
    pub fn apply_snapshot(&mut self, snapshot: Result<Vec<Goal>, StoreError>) {
        match snapshot {
            Ok(mut goals) => {
                sort_newest_first(&mut goals);
                self.goals = goals;
            }
            Err(err) => {
                log::error!("goal subscription failed: {err}");
                self.error = Some(err.to_string());
            }
        }
        self.loading = false;
    }

    /// Returns the new progress value, or `None` with `error` set.
    pub async fn increment(&mut self, repo: &GoalRepository, id: &str, amount: f64) -> Option<f64> {
        match repo.increment_progress(id, amount).await {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("increment of {id} failed: {err}");
                self.error = Some(err.to_string());
                None
            }
        }
    }

    pub fn rows(&self) -> Vec<ManagerRow> {
        self.goals
            .iter()
            .map(|g| {
                let percent = per_goal_percent(g);
                ManagerRow {
                    id: g.id.clone(),
                    team: g.team.clone(),
                    title: g.title.clone(),
                    target: g.target,
                    current: g.current,
                    percent,
                    complete: percent >= 100,
                }
            })
            .collect()
    }
}
