use crate::commands::goals::GoalRepository;
use crate::commands::settings::{load_effective_settings, EffectiveSettings};
use crate::models::workspace::WorkspaceMeta;
use crate::store::SqliteGoalStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const WATCH_MARKER_FILE: &str = "watch.pid";

/// An opened workspace: its goal store plus effective settings.
pub struct Workspace {
    pub meta: WorkspaceMeta,
    pub repo: GoalRepository,
    pub settings: EffectiveSettings,
}

/// Prepares `<path>/.goalboard` (database and settings) and opens the store.
pub async fn open_workspace(path: String) -> Result<Workspace, String> {
    let workspace_path = Path::new(&path);

    if !workspace_path.is_dir() {
        return Err("PATH_NOT_FOUND: Directory does not exist".to_string());
    }

    let store = SqliteGoalStore::open(&path)
        .map_err(|e| format!("INIT_FAILED: Could not initialize database: {e}"))?;

    let settings = load_effective_settings(&path)
        .map_err(|e| format!("INIT_FAILED: Could not initialize settings: {e}"))?;

    let repo = GoalRepository::new(Arc::new(store));
    let goals = repo
        .list()
        .await
        .map_err(|e| format!("INIT_FAILED: Could not read goals: {e}"))?;

    let name = workspace_path
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    Ok(Workspace {
        meta: WorkspaceMeta {
            path: path.clone(),
            name,
            goal_count: goals.len(),
            last_updated_at: goals.iter().map(|g| g.updated_at).max(),
        },
        repo,
        settings,
    })
}

fn watch_marker_path(workspace_path: &str) -> PathBuf {
    Path::new(workspace_path)
        .join(".goalboard")
        .join(WATCH_MARKER_FILE)
}

/// Marks the workspace as served by a forwarding `watch` process. The marker
/// file is removed when this value is dropped.
#[derive(Debug)]
pub struct WatchMarker {
    path: PathBuf,
}

impl WatchMarker {
    pub fn acquire(workspace_path: &str) -> Result<Self, String> {
        let path = watch_marker_path(workspace_path);
        if path.exists() {
            log::warn!("replacing existing watch marker at {}", path.display());
        }
        fs::write(&path, std::process::id().to_string())
            .map_err(|e| format!("INIT_FAILED: Could not write watch marker: {e}"))?;
        Ok(Self { path })
    }
}

impl Drop for WatchMarker {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("could not remove watch marker {}: {e}", self.path.display());
        }
    }
}

/// True while a forwarding `watch` process holds the workspace marker.
pub fn watcher_active(workspace_path: &str) -> bool {
    watch_marker_path(workspace_path).exists()
}
