use crate::commands::dashboard::DashboardState;
use crate::commands::editor::{GoalEditor, ManagerState, SubmitOutcome};
use crate::commands::settings::{get_settings, save_settings};
use crate::commands::workspace::{open_workspace, watcher_active, WatchMarker, Workspace};
use crate::forwarder::config::ForwarderConfig;
use crate::forwarder::{spawn_dispatcher, ForwarderHub};
use crate::models::goal::GoalWritten;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Parser)]
#[command(name = "goalboard", about = "Team goal tracking with live aggregates")]
pub struct Cli {
    /// Directory holding the `.goalboard` state.
    #[arg(long, global = true, default_value = ".")]
    pub workspace: String,

    /// Do not forward writes made by this invocation; use when a `watch`
    /// process is already forwarding for the workspace.
    #[arg(long, global = true)]
    pub no_forward: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a goal with zero progress.
    Add {
        #[arg(long)]
        team: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        target: String,
    },
    /// Edit team, title and target of an existing goal.
    Edit {
        id: String,
        #[arg(long)]
        team: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        target: String,
    },
    /// Add progress to a goal; defaults to the first configured step.
    Inc {
        id: String,
        #[arg(allow_negative_numbers = true)]
        amount: Option<f64>,
    },
    /// Management list, newest first.
    List,
    /// Dashboard aggregates for one page.
    Dashboard {
        #[arg(long, default_value_t = 0)]
        page: usize,
    },
    /// Print the workspace settings, or merge a JSON object into them.
    Settings {
        /// Partial settings object, e.g. '{"pageSize": 4}'.
        #[arg(long)]
        set: Option<String>,
    },
    /// Follow the collection and forward every write until interrupted.
    Watch {
        /// Seconds between checks for writes made by other processes.
        #[arg(long, default_value_t = 1)]
        interval: u64,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(value).map_err(|e| format!("Failed to render output: {e}"))?;
    println!("{raw}");
    Ok(())
}

fn forwarder_hub(
    workspace: &Workspace,
    config: ForwarderConfig,
    no_forward: bool,
) -> Result<Option<Arc<ForwarderHub>>, String> {
    if no_forward {
        return Ok(None);
    }
    if !workspace.settings.forwarders_enabled {
        log::info!("forwarders disabled in settings");
        return Ok(None);
    }
    let hub = ForwarderHub::new(config).map_err(|e| format!("Could not build HTTP client: {e}"))?;
    Ok(Some(Arc::new(hub)))
}

/// Hub for a command that writes once and exits. A running `watch` picks up
/// such writes through polling, so the command leaves forwarding to it.
pub fn one_shot_hub(
    workspace: &Workspace,
    config: ForwarderConfig,
    no_forward: bool,
) -> Result<Option<Arc<ForwarderHub>>, String> {
    if watcher_active(&workspace.meta.path) {
        log::info!(
            "a watch process is forwarding for {}; not forwarding here (remove .goalboard/watch.pid if it is gone)",
            workspace.meta.path
        );
        return Ok(None);
    }
    forwarder_hub(workspace, config, no_forward)
}

/// Forwards the writes a one-shot command produced before the process exits.
pub async fn flush_writes(hub: Option<&ForwarderHub>, events: &mut broadcast::Receiver<GoalWritten>) {
    let Some(hub) = hub else {
        return;
    };
    while let Ok(event) = events.try_recv() {
        let report = hub.handle(event).await;
        log::debug!("forward report: {report:?}");
    }
}

async fn submit(workspace: &Workspace, editor: &mut GoalEditor, no_forward: bool) -> Result<(), String> {
    let hub = one_shot_hub(workspace, ForwarderConfig::from_env(), no_forward)?;
    let mut events = workspace.repo.store().write_events();

    let outcome = editor.submit(&workspace.repo).await.map_err(|e| e.to_string())?;
    flush_writes(hub.as_deref(), &mut events).await;

    match outcome {
        SubmitOutcome::Created(goal) => print_json(&goal),
        SubmitOutcome::Updated(id) => {
            print_json(&serde_json::json!({ "status": "updated", "id": id }))
        }
    }
}

pub async fn execute(cli: Cli) -> Result<(), String> {
    let workspace = open_workspace(cli.workspace.clone()).await?;
    log::debug!("opened workspace {:?}", workspace.meta);

    match cli.command {
        Command::Add { team, title, target } => {
            let mut editor = GoalEditor {
                team,
                title,
                target,
                ..GoalEditor::default()
            };
            submit(&workspace, &mut editor, cli.no_forward).await
        }
        Command::Edit {
            id,
            team,
            title,
            target,
        } => {
            let mut editor = GoalEditor {
                team,
                title,
                target,
                editing_id: Some(id),
                error: None,
            };
            submit(&workspace, &mut editor, cli.no_forward).await
        }
        Command::Inc { id, amount } => {
            let hub = one_shot_hub(&workspace, ForwarderConfig::from_env(), cli.no_forward)?;
            let mut events = workspace.repo.store().write_events();

            let mut state = ManagerState::with_increment_steps(workspace.settings.increment_steps.clone());
            let amount = amount
                .or_else(|| state.increment_steps.first().copied())
                .unwrap_or(1.0);
            let value = state.increment(&workspace.repo, &id, amount).await;
            flush_writes(hub.as_deref(), &mut events).await;

            match value {
                Some(current) => print_json(&serde_json::json!({ "id": id, "current": current })),
                None => Err(state.error.unwrap_or_else(|| "Increment failed".to_string())),
            }
        }
        Command::List => {
            let mut state = ManagerState::with_increment_steps(workspace.settings.increment_steps.clone());
            state.apply_snapshot(workspace.repo.list().await);
            if let Some(err) = state.error {
                return Err(err);
            }
            print_json(&state.rows())
        }
        Command::Dashboard { page } => {
            let mut dashboard = DashboardState::new(workspace.settings.page_size);
            dashboard.apply_snapshot(workspace.repo.list().await);
            if let Some(err) = dashboard.error {
                return Err(err);
            }
            for _ in 0..page {
                dashboard.next_page();
            }
            print_json(&dashboard.view())
        }
        Command::Settings { set } => {
            let settings = match set {
                Some(raw) => {
                    let patch: serde_json::Value = serde_json::from_str(&raw)
                        .map_err(|e| format!("Invalid settings JSON: {e}"))?;
                    if !patch.is_object() {
                        return Err("Settings must be a JSON object".to_string());
                    }
                    save_settings(workspace.meta.path.clone(), patch).await?
                }
                None => get_settings(workspace.meta.path.clone()).await?,
            };
            print_json(&settings)
        }
        Command::Watch { interval } => watch(workspace, cli.no_forward, interval).await,
    }
}

async fn watch(workspace: Workspace, no_forward: bool, interval: u64) -> Result<(), String> {
    let hub = forwarder_hub(&workspace, ForwarderConfig::from_env(), no_forward)?;
    let marker = match hub {
        Some(_) => Some(WatchMarker::acquire(&workspace.meta.path)?),
        None => None,
    };
    let dispatcher = hub.map(|hub| spawn_dispatcher(workspace.repo.store().write_events(), hub));

    let mut dashboard = DashboardState::new(workspace.settings.page_size);
    let mut subscription = workspace.repo.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = workspace.repo.store().poll_external() {
                    log::warn!("polling for external writes failed: {err}");
                }
            }
            snapshot = subscription.next() => {
                let Some(snapshot) = snapshot else { break };
                dashboard.apply_snapshot(snapshot);
                let view = dashboard.view();
                log::info!("{} goals, total {}", dashboard.goals.len(), view.label);
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted; stopping watch");
                break;
            }
        }
    }

    subscription.unsubscribe();
    if let Some(handle) = dispatcher {
        handle.abort();
    }
    drop(marker);
    Ok(())
}
