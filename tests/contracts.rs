use goalboard_lib::commands::dashboard::DashboardState;
use goalboard_lib::commands::editor::{GoalEditor, ManagerState, SubmitOutcome};
use goalboard_lib::commands::goals::GoalRepository;
use goalboard_lib::commands::settings::{get_settings, load_effective_settings, save_settings};
use goalboard_lib::commands::workspace::open_workspace;
use goalboard_lib::store::{GoalStore, SqliteGoalStore};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn create_workspace() -> (TempDir, String) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let workspace_path = temp_dir.path().to_string_lossy().to_string();
    (temp_dir, workspace_path)
}

#[tokio::test]
async fn open_workspace_returns_expected_metadata_contract() {
    let (_tmp, workspace_path) = create_workspace();

    let workspace = open_workspace(workspace_path.clone())
        .await
        .expect("open workspace");

    assert_eq!(workspace.meta.path, workspace_path);
    assert!(!workspace.meta.name.is_empty());
    assert_eq!(workspace.meta.goal_count, 0);
    assert!(workspace.meta.last_updated_at.is_none());
    assert_eq!(workspace.settings.page_size, 3);
}

#[tokio::test]
async fn open_workspace_rejects_missing_directory() {
    let (_tmp, workspace_path) = create_workspace();
    let missing = format!("{workspace_path}/does-not-exist");

    let err = open_workspace(missing).await.err().expect("missing dir");
    assert!(err.starts_with("PATH_NOT_FOUND"));
}

#[tokio::test]
async fn settings_commands_round_trip_and_merge_partial_updates() {
    let (_tmp, workspace_path) = create_workspace();

    let initial = get_settings(workspace_path.clone())
        .await
        .expect("load settings");
    assert_eq!(initial["incrementSteps"], json!([1.0, 5.0, 10.0]));

    let saved = save_settings(
        workspace_path.clone(),
        json!({ "pageSize": 4, "forwardersEnabled": false }),
    )
    .await
    .expect("save settings");

    assert_eq!(saved["pageSize"], json!(4));
    assert_eq!(saved["forwardersEnabled"], json!(false));
    assert_eq!(saved["incrementSteps"], initial["incrementSteps"]);

    let effective = load_effective_settings(&workspace_path).expect("effective settings");
    assert_eq!(effective.page_size, 4);
    assert!(!effective.forwarders_enabled);
}

#[tokio::test]
async fn goal_lifecycle_clamps_percent_and_survives_reopen() {
    let (_tmp, workspace_path) = create_workspace();
    let workspace = open_workspace(workspace_path.clone())
        .await
        .expect("open workspace");

    let mut editor = GoalEditor::new();
    editor.set_field("team", "Blue").expect("team");
    editor.set_field("title", "Sprint").expect("title");
    editor.set_field("target", "100").expect("target");
    let SubmitOutcome::Created(goal) = editor.submit(&workspace.repo).await.expect("create") else {
        panic!("expected a created goal");
    };

    let mut manager = ManagerState::default();
    manager.apply_snapshot(workspace.repo.list().await);
    assert_eq!(manager.rows()[0].percent, 0);

    manager.increment(&workspace.repo, &goal.id, 40.0).await.expect("+40");
    manager.apply_snapshot(workspace.repo.list().await);
    let row = &manager.rows()[0];
    assert_eq!((row.current, row.percent), (40.0, 40));

    manager.increment(&workspace.repo, &goal.id, 70.0).await.expect("+70");
    drop(workspace);

    let reopened = open_workspace(workspace_path).await.expect("reopen");
    assert_eq!(reopened.meta.goal_count, 1);
    let mut manager = ManagerState::default();
    manager.apply_snapshot(reopened.repo.list().await);
    let row = &manager.rows()[0];
    assert_eq!((row.current, row.percent, row.complete), (110.0, 100, true));
    assert!(reopened.meta.last_updated_at.expect("updated") >= goal.updated_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_lose_no_updates() {
    let store: Arc<dyn GoalStore> = Arc::new(SqliteGoalStore::open_in_memory().expect("store"));
    let repo = GoalRepository::new(store);
    let goal = repo.create("Blue", "Sprint", 1_000.0).await.expect("create");

    let amounts: Vec<f64> = (1..=20).map(f64::from).collect();
    let handles: Vec<_> = amounts
        .iter()
        .map(|&amount| {
            let repo = repo.clone();
            let id = goal.id.clone();
            tokio::spawn(async move { repo.increment_progress(&id, amount).await })
        })
        .collect();

    for handle in handles {
        handle.await.expect("join").expect("increment");
    }

    let stored = repo.list().await.expect("list").remove(0);
    assert_eq!(stored.current, amounts.iter().sum::<f64>());
}

#[tokio::test]
async fn repositories_sharing_a_store_observe_each_others_writes() {
    let store: Arc<dyn GoalStore> = Arc::new(SqliteGoalStore::open_in_memory().expect("store"));
    let manager_repo = GoalRepository::new(Arc::clone(&store));
    let dashboard_repo = GoalRepository::new(store);

    let mut subscription = dashboard_repo.subscribe();
    let mut dashboard = DashboardState::default();
    dashboard.apply_snapshot(subscription.next().await.expect("open"));
    assert!(dashboard.goals.is_empty());

    manager_repo.create("Red", "Sprint", 50.0).await.expect("create red");
    dashboard.apply_snapshot(subscription.next().await.expect("open"));
    let blue = manager_repo.create("Blue", "Sprint", 100.0).await.expect("create blue");
    dashboard.apply_snapshot(subscription.next().await.expect("open"));
    manager_repo.increment_progress(&blue.id, 50.0).await.expect("increment");
    dashboard.apply_snapshot(subscription.next().await.expect("open"));

    let view = dashboard.view();
    let teams: Vec<_> = view.rows.iter().map(|r| r.team.as_str()).collect();
    assert_eq!(teams, ["Blue", "Red"]);
    assert_eq!(view.totals.current_sum, 50.0);
    assert_eq!(view.team_share.len(), 1);

    subscription.unsubscribe();
}
