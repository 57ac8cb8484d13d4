use super::config::ForwarderConfig;
use super::token::acquire_token;
use super::{check_status, ForwardOutcome};
use crate::error::ForwarderError;
use crate::models::row::{GoalRow, RowsEnvelope};
use crate::models::token::TokenCache;
use std::sync::Mutex;

/// Bearer-authenticated push into the configured dataset table.
pub async fn push_dataset(
    client: &reqwest::Client,
    config: &ForwarderConfig,
    cache: &Mutex<TokenCache>,
    row: &GoalRow,
    now_ms: i64,
) -> Result<ForwardOutcome, ForwarderError> {
    let Some(dataset_id) = config.dataset_id.as_deref() else {
        log::warn!("PBI_DATASET_ID not configured; skipping dataset push for goal {}", row.goal_id);
        return Ok(ForwardOutcome::Skipped("PBI_DATASET_ID not configured".to_string()));
    };

    let token = acquire_token(client, config, cache, now_ms).await?;

    let envelope = RowsEnvelope {
        rows: vec![row.clone()],
    };
    let resp = client
        .post(config.rows_url(dataset_id))
        .bearer_auth(token)
        .json(&envelope)
        .send()
        .await?;
    check_status(resp).await?;

    log::debug!("pushed goal {} to dataset {dataset_id}", row.goal_id);
    Ok(ForwardOutcome::Pushed)
}
