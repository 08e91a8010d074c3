use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::*;
use crate::app_event::{AppEvent, BulkCompletion};
use crate::error::Result;
use crate::models::{Group, Host, Inventory};
use crate::provider::Provider;
use crate::ssh_service::{BoxFuture, CommandRunner, ExecOutcome};

/// Answers immediately with `<command> on <hostname>`, failing for hosts
/// whose name starts with `bad`.
struct EchoRunner;

impl CommandRunner for EchoRunner {
    fn execute<'a>(
        &'a self,
        host: &'a Host,
        command: &'a str,
        _user: Option<&'a str>,
    ) -> BoxFuture<'a, ExecOutcome> {
        Box::pin(async move {
            ExecOutcome {
                output: format!("{command} on {}", host.hostname),
                error: host.name.starts_with("bad").then(|| "exit status: 255".to_string()),
            }
        })
    }
}

/// Never finishes.
struct StuckRunner;

impl CommandRunner for StuckRunner {
    fn execute<'a>(&'a self, _: &'a Host, _: &'a str, _: Option<&'a str>) -> BoxFuture<'a, ExecOutcome> {
        Box::pin(std::future::pending::<ExecOutcome>())
    }
}

/// Remembers the user every call was made with.
#[derive(Default)]
struct RecordingRunner(std::sync::Mutex<Vec<Option<String>>>);

impl CommandRunner for RecordingRunner {
    fn execute<'a>(&'a self, _: &'a Host, _: &'a str, user: Option<&'a str>) -> BoxFuture<'a, ExecOutcome> {
        self.0.lock().unwrap().push(user.map(str::to_string));
        Box::pin(async { ExecOutcome::default() })
    }
}

struct Static(Vec<Group>);

impl Provider for Static {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(&self) -> Result<Vec<Group>> {
        Ok(self.0.clone())
    }
}

fn forest() -> Vec<Group> {
    vec![
        Group::new("prod").with_hosts(vec![
            Host::new("a", "a.example.com"),
            Host::new("b", "b.example.com"),
            Host::new("c", "c.example.com"),
        ]),
        Group::new("staging").with_hosts(vec![Host::new("s1", "s1.staging")]),
        Group::new("lab")
            .with_subgroups(vec![Group::new("gpu").with_hosts(vec![Host::new("g1", "gpu1.lab")])]),
    ]
}

fn app_with(runner: Arc<dyn CommandRunner>, log_dir: &std::path::Path) -> App {
    let options = AppOptions {
        bulk_log_dir: log_dir.to_path_buf(),
        ..Default::default()
    };
    let mut app = App::new(vec![Arc::new(Static(forest()))], runner, options);
    app.apply_event(AppEvent::DataLoaded(Ok(Inventory::from_forest(forest()))));
    app
}

fn app() -> App {
    app_with(Arc::new(EchoRunner), &std::env::temp_dir())
}

fn press(app: &mut App, code: KeyCode) {
    app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
}

fn type_text(app: &mut App, text: &str) {
    for c in text.chars() {
        press(app, KeyCode::Char(c));
    }
}

fn names(hosts: Vec<&Host>) -> Vec<String> {
    hosts.iter().map(|h| h.name.clone()).collect()
}

#[test]
fn starts_in_all_hosts_and_loading() {
    let app = App::new(Vec::new(), Arc::new(EchoRunner), AppOptions::default());
    assert!(app.loading);
    assert_eq!(app.view_mode, ViewMode::AllHosts);
    assert_eq!(app.breadcrumb, vec![ALL_HOSTS_LABEL]);
}

#[test]
fn data_load_flattens_hosts() {
    let app = app();
    assert!(!app.loading);
    assert_eq!(names(app.visible_hosts()), vec!["a", "b", "c", "s1", "g1"]);
}

#[test]
fn load_inventory_concatenates_providers() {
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(Static(vec![Group::new("one").with_hosts(vec![Host::new("x", "x")])])),
        Arc::new(Static(vec![Group::new("two").with_hosts(vec![Host::new("y", "y")])])),
    ];
    let inventory = load_inventory(&providers, &Default::default()).unwrap();
    assert_eq!(inventory.groups.len(), 2);
    assert_eq!(inventory.hosts.len(), 2);
}

#[test]
fn tab_toggles_between_hosts_and_groups() {
    let mut app = app();
    app.move_down();
    press(&mut app, KeyCode::Tab);
    assert_eq!(app.view_mode, ViewMode::ByGroup);
    assert_eq!(app.breadcrumb, vec![ALL_GROUPS_LABEL]);
    assert_eq!(app.cursor_index(), 0);
    press(&mut app, KeyCode::Tab);
    assert_eq!(app.view_mode, ViewMode::AllHosts);
    assert_eq!(app.breadcrumb, vec![ALL_HOSTS_LABEL]);
}

#[test]
fn entering_and_leaving_a_group() {
    let mut app = app();
    press(&mut app, KeyCode::Tab);
    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.view_mode, ViewMode::InGroup);
    assert_eq!(app.breadcrumb, vec![ALL_GROUPS_LABEL, "staging"]);
    assert_eq!(names(app.visible_hosts()), vec!["s1"]);
    assert_eq!(app.cursor_index(), 0);

    press(&mut app, KeyCode::Left);
    assert_eq!(app.view_mode, ViewMode::ByGroup);
    assert_eq!(app.breadcrumb, vec![ALL_GROUPS_LABEL]);
    assert!(app.current_group().is_none());
}

#[test]
fn left_inside_group_moves_before_going_back() {
    let mut app = app();
    app.set_terminal_width(200);
    press(&mut app, KeyCode::Tab);
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.current_group().unwrap().name, "prod");
    press(&mut app, KeyCode::Right);
    press(&mut app, KeyCode::Left);
    assert_eq!(app.view_mode, ViewMode::InGroup);
    press(&mut app, KeyCode::Backspace);
    assert_eq!(app.view_mode, ViewMode::ByGroup);
}

#[test]
fn nested_group_shows_subgroup_hosts() {
    let mut app = app();
    press(&mut app, KeyCode::Tab);
    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.current_group().unwrap().name, "lab");
    assert_eq!(names(app.visible_hosts()), vec!["g1"]);
}

#[test]
fn choosing_a_host_ends_the_session() {
    let mut app = app();
    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Enter);
    assert!(app.should_quit);
    assert_eq!(app.choice.as_ref().unwrap().name, "b");
    assert!(app.custom_username.is_none());
}

#[test]
fn username_override_travels_with_choice() {
    let mut app = app();
    press(&mut app, KeyCode::Char('u'));
    assert_eq!(app.input_mode, InputMode::Username);
    type_text(&mut app, "root");
    // Navigation keys are captured as text while entering.
    type_text(&mut app, "j");
    press(&mut app, KeyCode::Backspace);
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.choice.as_ref().unwrap().name, "a");
    assert_eq!(app.custom_username.as_deref(), Some("root"));
}

#[test]
fn username_entry_escape_discards() {
    let mut app = app();
    press(&mut app, KeyCode::Char('u'));
    type_text(&mut app, "admin");
    press(&mut app, KeyCode::Esc);
    assert_eq!(app.input_mode, InputMode::Normal);
    assert!(app.choice.is_none());
    assert!(!app.should_quit);
}

#[test]
fn filter_rederives_on_every_keystroke() {
    let mut app = app();
    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Char('/'));
    type_text(&mut app, "a.examp");
    assert_eq!(names(app.visible_hosts()), vec!["a"]);
    assert_eq!(app.cursor_index(), 0);
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.input_mode, InputMode::Normal);
    assert_eq!(app.filter_text, "a.examp");

    press(&mut app, KeyCode::Esc);
    assert_eq!(app.visible_hosts().len(), 5);
}

#[test]
fn filter_with_no_matches_keeps_full_list() {
    let mut app = app();
    press(&mut app, KeyCode::Char('/'));
    type_text(&mut app, "zzz");
    assert!(app.visible_hosts().is_empty());
    assert_eq!(app.inventory.hosts.len(), 5);
    assert!(app.host_at_cursor().is_none());
}

#[test]
fn filter_escape_restores_previous_filter() {
    let mut app = app();
    press(&mut app, KeyCode::Char('/'));
    type_text(&mut app, "s1");
    press(&mut app, KeyCode::Enter);
    press(&mut app, KeyCode::Char('/'));
    type_text(&mut app, "xyz");
    assert!(app.visible_hosts().is_empty());
    press(&mut app, KeyCode::Esc);
    assert_eq!(app.filter_text, "s1");
    assert_eq!(names(app.visible_hosts()), vec!["s1"]);
}

#[test]
fn filter_applies_to_groups() {
    let mut app = app();
    press(&mut app, KeyCode::Tab);
    press(&mut app, KeyCode::Char('/'));
    type_text(&mut app, "gpu");
    press(&mut app, KeyCode::Enter);
    let groups: Vec<&str> = app.visible_groups().iter().map(|g| g.name.as_str()).collect();
    assert_eq!(groups, vec!["lab"]);
}

#[test]
fn selection_toggles_by_structural_equality() {
    let mut app = app();
    press(&mut app, KeyCode::Char('s'));
    assert!(app.bulk_selection);
    press(&mut app, KeyCode::Char(' '));
    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.selected_hosts.len(), 2);
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.selected_hosts.len(), 1);
    assert!(app.is_selected(&Host::new("a", "a.example.com")));
    assert!(!app.should_quit);

    press(&mut app, KeyCode::Char('s'));
    assert!(!app.bulk_selection);
    assert!(app.selected_hosts.is_empty());
}

#[test]
fn selection_mode_is_unavailable_in_group_view() {
    let mut app = app();
    press(&mut app, KeyCode::Tab);
    press(&mut app, KeyCode::Char('s'));
    assert!(!app.bulk_selection);
    press(&mut app, KeyCode::Char('u'));
    assert_eq!(app.input_mode, InputMode::Normal);
}

#[test]
fn command_entry_needs_a_selection() {
    let mut app = app();
    press(&mut app, KeyCode::Char('s'));
    press(&mut app, KeyCode::Char('c'));
    assert_eq!(app.input_mode, InputMode::Normal);
}

#[test]
fn load_error_blocks_input_until_key() {
    let mut app = App::new(Vec::new(), Arc::new(EchoRunner), AppOptions::default());
    app.apply_event(AppEvent::DataLoaded(Err("failed to load data from x".into())));
    assert!(app.error.is_some());
    assert!(!app.loading);
    press(&mut app, KeyCode::Char('q'));
    assert!(app.should_quit);
}

#[tokio::test]
async fn any_key_after_error_retries_fetch() {
    let mut app = App::new(vec![Arc::new(Static(forest()))], Arc::new(EchoRunner), AppOptions::default())
        .with_error("connection error");
    press(&mut app, KeyCode::Char('x'));
    assert!(app.error.is_none());
    assert!(app.loading);

    let event = app.event_rx.recv().await.unwrap();
    app.apply_event(event);
    assert!(!app.loading);
    assert_eq!(app.inventory.hosts.len(), 5);
}

#[test]
fn resize_keeps_cursor_on_same_item() {
    let mut app = app();
    app.set_terminal_width(200);
    press(&mut app, KeyCode::Down);
    assert_eq!(app.cursor_index(), 3);
    app.set_terminal_width(100);
    assert_eq!(app.columns(), 1);
    assert_eq!(app.cursor_index(), 3);
    assert_eq!(app.host_at_cursor().unwrap().name, "s1");
}

fn select_all(app: &mut App) {
    press(app, KeyCode::Char('s'));
    for _ in 0..app.active_len() {
        press(app, KeyCode::Enter);
        press(app, KeyCode::Down);
    }
}

async fn drain(app: &mut App) {
    while app.bulk_progress().0 < app.bulk_progress().1 {
        let event = app.event_rx.recv().await.unwrap();
        app.apply_event(event);
    }
}

#[tokio::test]
async fn bulk_run_collects_one_result_per_host() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_with(Arc::new(EchoRunner), dir.path());
    select_all(&mut app);
    assert_eq!(app.selected_hosts.len(), 5);

    press(&mut app, KeyCode::Char('c'));
    type_text(&mut app, "uptime");
    press(&mut app, KeyCode::Enter);

    assert_eq!(app.view_mode, ViewMode::BulkRunning);
    assert_eq!(app.breadcrumb, vec!["Bulk Command: uptime"]);
    assert!(!app.bulk_selection);

    drain(&mut app).await;
    let run = app.bulk.as_ref().unwrap();
    assert_eq!(run.results.len(), 5);
    assert!(run.results.values().all(|r| r.done));
    assert_eq!(app.bulk_progress(), (5, 5));
    assert_eq!(run.results["a@a.example.com"].output, "uptime on a.example.com");

    let log = std::fs::read_to_string(run.log.as_ref().unwrap().path()).unwrap();
    assert!(log.contains("Command: uptime"));
    assert_eq!(log.matches("\n---\n\n").count(), 5);
}

#[tokio::test]
async fn failing_host_does_not_affect_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_with(Arc::new(EchoRunner), dir.path());
    app.selected_hosts = vec![Host::new("bad-1", "bad.lan"), Host::new("ok", "ok.lan")];
    app.dispatch_bulk_command("id".into());
    drain(&mut app).await;

    let run = app.bulk.as_ref().unwrap();
    assert!(run.results["bad-1@bad.lan"].error.is_some());
    assert!(run.results["ok@ok.lan"].error.is_none());
    assert!(run.results["ok@ok.lan"].done);
}

#[tokio::test]
async fn completion_only_touches_its_own_host() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_with(Arc::new(StuckRunner), dir.path());
    let host_a = Host::new("hostA", "a.lan");
    let host_b = Host::new("hostB", "b.lan");
    app.selected_hosts = vec![host_a.clone(), host_b.clone()];
    app.dispatch_bulk_command("uptime".into());
    let run_id = app.bulk.as_ref().unwrap().id;
    assert_eq!(app.bulk_progress(), (0, 2));

    app.apply_event(AppEvent::BulkFinished(BulkCompletion {
        run_id,
        host: host_a.clone(),
        outcome: ExecOutcome {
            output: "up 1 day".into(),
            error: None,
        },
        log_error: None,
    }));

    let run = app.bulk.as_ref().unwrap();
    assert!(run.results[&host_a.key()].done);
    assert_eq!(run.results[&host_b.key()], BulkResult::pending(host_b.clone()));
    assert_eq!(app.bulk_progress(), (1, 2));
}

#[tokio::test]
async fn leaving_bulk_view_discards_run_and_ignores_late_results() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_with(Arc::new(StuckRunner), dir.path());
    let host = Host::new("a", "a.example.com");
    app.selected_hosts = vec![host.clone()];
    app.dispatch_bulk_command("sleep 100".into());
    let old_run = app.bulk.as_ref().unwrap().id;

    press(&mut app, KeyCode::Tab);
    assert_eq!(app.view_mode, ViewMode::AllHosts);
    assert!(app.bulk.is_none());
    assert!(app.selected_hosts.is_empty());
    assert_eq!(app.breadcrumb, vec![ALL_HOSTS_LABEL]);

    app.selected_hosts = vec![host.clone()];
    app.dispatch_bulk_command("true".into());
    app.apply_event(AppEvent::BulkFinished(BulkCompletion {
        run_id: old_run,
        host,
        outcome: ExecOutcome::default(),
        log_error: None,
    }));
    assert_eq!(app.bulk_progress(), (0, 1));
}

#[tokio::test]
async fn unwritable_log_dir_does_not_stop_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();
    let mut app = app_with(Arc::new(EchoRunner), &blocker);
    app.selected_hosts = vec![Host::new("a", "a.example.com")];
    app.dispatch_bulk_command("uptime".into());

    assert!(app.bulk.as_ref().unwrap().log.is_none());
    assert!(app.status_message.as_ref().unwrap().0.starts_with("Error"));
    drain(&mut app).await;
    assert_eq!(app.bulk_progress(), (1, 1));
}

#[tokio::test]
async fn bulk_selection_does_not_survive_the_group_list() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_with(Arc::new(EchoRunner), dir.path());
    press(&mut app, KeyCode::Char('s'));
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.selected_hosts.len(), 1);

    press(&mut app, KeyCode::Tab);
    assert_eq!(app.view_mode, ViewMode::ByGroup);
    assert!(!app.bulk_selection);
    assert!(app.selected_hosts.is_empty());

    press(&mut app, KeyCode::Char('c'));
    assert_eq!(app.input_mode, InputMode::Normal);
    type_text(&mut app, "uptime");
    press(&mut app, KeyCode::Enter);
    assert_ne!(app.view_mode, ViewMode::BulkRunning);
    assert!(app.bulk.is_none());
}

#[test]
fn backing_out_of_a_group_ends_bulk_selection() {
    let mut app = app();
    press(&mut app, KeyCode::Tab);
    press(&mut app, KeyCode::Enter);
    press(&mut app, KeyCode::Char('s'));
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.selected_hosts.len(), 1);

    press(&mut app, KeyCode::Backspace);
    assert_eq!(app.view_mode, ViewMode::ByGroup);
    assert!(!app.bulk_selection);
    assert!(app.selected_hosts.is_empty());
}

#[tokio::test]
async fn username_in_bulk_mode_is_used_by_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let mut app = app_with(runner.clone(), dir.path());
    press(&mut app, KeyCode::Char('s'));
    press(&mut app, KeyCode::Char('u'));
    type_text(&mut app, "root");
    press(&mut app, KeyCode::Enter);

    assert!(!app.should_quit);
    assert!(app.choice.is_none());
    assert!(app.bulk_selection);
    assert_eq!(app.custom_username.as_deref(), Some("root"));

    press(&mut app, KeyCode::Enter);
    press(&mut app, KeyCode::Char('c'));
    type_text(&mut app, "id");
    press(&mut app, KeyCode::Enter);
    drain(&mut app).await;

    assert_eq!(*runner.0.lock().unwrap(), vec![Some("root".to_string())]);
}

fn entered(app: &App) -> Option<&str> {
    app.current_group().map(|g| g.name.as_str())
}

#[test]
fn reload_keeps_the_entered_group_by_name() {
    let mut app = app();
    press(&mut app, KeyCode::Tab);
    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Enter);
    assert_eq!(entered(&app), Some("staging"));

    let mut reordered = forest();
    reordered.rotate_left(1);
    app.apply_event(AppEvent::DataLoaded(Ok(Inventory::from_forest(reordered))));
    assert_eq!(app.view_mode, ViewMode::InGroup);
    assert_eq!(entered(&app), Some("staging"));
    assert_eq!(names(app.visible_hosts()), vec!["s1"]);
}

#[test]
fn reload_without_the_entered_group_returns_to_group_list() {
    let mut app = app();
    press(&mut app, KeyCode::Tab);
    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Enter);

    let without_staging: Vec<Group> = forest().into_iter().filter(|g| g.name != "staging").collect();
    app.apply_event(AppEvent::DataLoaded(Ok(Inventory::from_forest(without_staging))));
    assert_eq!(app.view_mode, ViewMode::ByGroup);
    assert_eq!(app.breadcrumb, vec![ALL_GROUPS_LABEL]);
    assert!(entered(&app).is_none());
}
