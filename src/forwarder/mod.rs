//! Analytics forwarders triggered by goal writes.
//!
//! Forwarding runs after the write has committed and never reports back to
//! the writer: every failure ends in the log.

pub mod config;
pub mod dataset;
pub mod direct;
pub mod token;

use crate::commands::goals::now_ms;
use crate::error::ForwarderError;
use crate::models::goal::{GoalRecord, GoalWritten};
use crate::models::row::GoalRow;
use crate::models::token::TokenCache;
use chrono::{DateTime, SecondsFormat, Utc};
use config::ForwarderConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    Pushed,
    Skipped(String),
    Failed(String),
}

/// Result of both forwarders for one write.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardReport {
    pub direct: ForwardOutcome,
    pub dataset: ForwardOutcome,
}

fn iso_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Denormalizes a post-write record. `percent` is not clamped and keeps two
/// decimals; a missing `updatedAt` falls back to `now_ms`.
pub fn build_row(goal_id: &str, record: &GoalRecord, now_ms: i64) -> GoalRow {
    let percent = if record.target != 0.0 && record.target.is_finite() {
        record.current / record.target * 100.0
    } else {
        0.0
    };
    let updated_at = if record.updated_at > 0 {
        record.updated_at
    } else {
        now_ms
    };

    GoalRow {
        goal_id: goal_id.to_string(),
        team: record.team.clone(),
        title: record.title.clone(),
        target: record.target,
        current: record.current,
        percent: (percent * 100.0).round() / 100.0,
        updated_at: iso_millis(updated_at),
    }
}

pub(crate) async fn check_status(resp: reqwest::Response) -> Result<(), ForwarderError> {
    if resp.status().is_success() {
        return Ok(());
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(ForwarderError::Status { status, body })
}

fn settle(label: &str, goal_id: &str, result: Result<ForwardOutcome, ForwarderError>) -> ForwardOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(err) => {
            log::error!("{label} for goal {goal_id} failed: {err}");
            ForwardOutcome::Failed(err.to_string())
        }
    }
}

/// Shared forwarder context: HTTP client, configuration and the token cache.
pub struct ForwarderHub {
    client: reqwest::Client,
    config: ForwarderConfig,
    token_cache: Arc<Mutex<TokenCache>>,
}

impl ForwarderHub {
    pub fn new(config: ForwarderConfig) -> Result<Self, ForwarderError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: ForwarderConfig) -> Self {
        Self {
            client,
            config,
            token_cache: Arc::new(Mutex::new(TokenCache::default())),
        }
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    pub fn token_cache(&self) -> &Arc<Mutex<TokenCache>> {
        &self.token_cache
    }

    pub async fn handle(&self, event: GoalWritten) -> ForwardReport {
        self.handle_at(event, now_ms()).await
    }

    /// Runs both forwarders for one write, concurrently.
    pub async fn handle_at(&self, event: GoalWritten, now_ms: i64) -> ForwardReport {
        let row = build_row(&event.id, &event.record, now_ms);

        let (direct, dataset) = tokio::join!(
            direct::push_direct(&self.client, &self.config, &row),
            dataset::push_dataset(&self.client, &self.config, &self.token_cache, &row, now_ms),
        );

        ForwardReport {
            direct: settle("direct push", &event.id, direct),
            dataset: settle("dataset push", &event.id, dataset),
        }
    }
}

/// Forwards every write event on its own task until the store goes away.
pub fn spawn_dispatcher(
    mut events: broadcast::Receiver<GoalWritten>,
    hub: Arc<ForwarderHub>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let hub = Arc::clone(&hub);
                    tokio::spawn(async move {
                        hub.handle(event).await;
                    });
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("forwarder dispatcher fell behind; {skipped} write events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        log::debug!("forwarder dispatcher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(target: f64, current: f64, updated_at: i64) -> GoalRecord {
        GoalRecord {
            team: "Blue".to_string(),
            title: "Sprint".to_string(),
            target,
            current,
            created_at: 0,
            updated_at,
        }
    }

    #[test]
    fn row_percent_is_unclamped_with_two_decimals() {
        let row = build_row("g1", &record(3.0, 4.0, 1_700_000_000_000), 0);
        assert_eq!(row.goal_id, "g1");
        assert_eq!(row.percent, 133.33);
        assert_eq!(row.updated_at, "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn row_handles_zero_target_and_missing_timestamp() {
        let row = build_row("g1", &record(0.0, 4.0, 0), 1_000);
        assert_eq!(row.percent, 0.0);
        assert_eq!(row.updated_at, "1970-01-01T00:00:01.000Z");
    }

    #[test]
    fn row_serializes_with_wire_field_names() {
        let row = build_row("g1", &record(100.0, 40.0, 1_000), 0);
        let value = serde_json::to_value(&row).expect("serialize");
        for key in ["goalId", "team", "title", "target", "current", "percent", "updatedAt"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[tokio::test]
    async fn unconfigured_hub_skips_both_forwarders() {
        let hub = ForwarderHub::new(ForwarderConfig::default()).expect("hub");
        let report = hub
            .handle(GoalWritten {
                id: "g1".to_string(),
                record: record(100.0, 1.0, 1),
            })
            .await;

        assert!(matches!(report.direct, ForwardOutcome::Skipped(_)));
        assert!(matches!(report.dataset, ForwardOutcome::Skipped(_)));
    }
}
