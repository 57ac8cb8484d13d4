use super::{check_status, ForwardOutcome};
use super::config::ForwarderConfig;
use crate::error::ForwarderError;
use crate::models::row::{GoalRow, RowsEnvelope};

/// Unauthenticated push of one row to `PBI_PUSH_URL`.
pub async fn push_direct(
    client: &reqwest::Client,
    config: &ForwarderConfig,
    row: &GoalRow,
) -> Result<ForwardOutcome, ForwarderError> {
    let Some(url) = config.push_url.as_deref() else {
        log::warn!("PBI_PUSH_URL not configured; skipping direct push for goal {}", row.goal_id);
        return Ok(ForwardOutcome::Skipped("PBI_PUSH_URL not configured".to_string()));
    };

    let envelope = RowsEnvelope {
        rows: vec![row.clone()],
    };
    let resp = client.post(url).json(&envelope).send().await?;
    check_status(resp).await?;

    log::debug!("pushed goal {} to push URL", row.goal_id);
    Ok(ForwardOutcome::Pushed)
}
