use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::app::state::ALL_HOSTS_LABEL;
use crate::app::types::{App, BulkResult, BulkRun, ViewMode};
use crate::app_event::{AppEvent, BulkCompletion};
use crate::bulk_log::BulkLog;
use crate::models::Host;

impl App {
    /// Run `command` on every selected host at once. Each host gets its own
    /// task; results come back as [`AppEvent::BulkFinished`].
    pub fn dispatch_bulk_command(&mut self, command: String) {
        if self.selected_hosts.is_empty() {
            return;
        }
        let run_id = self.next_run_id;
        self.next_run_id += 1;
        let hosts = self.selected_hosts.clone();

        tracing::info!("Running '{}' on {} hosts", command, hosts.len());

        let log = match BulkLog::create(&self.options.bulk_log_dir, &command, hosts.len()) {
            Ok(log) => Some(Arc::new(log)),
            Err(e) => {
                tracing::error!("Bulk log unavailable: {:#}", e);
                self.set_status(format!("Error: could not create bulk log: {e:#}"));
                None
            }
        };

        let results = hosts
            .iter()
            .map(|h| (h.key(), BulkResult::pending(h.clone())))
            .collect();
        let tasks = hosts
            .iter()
            .map(|h| self.spawn_host_task(run_id, h.clone(), command.clone(), log.clone()))
            .collect();

        self.view_mode = ViewMode::BulkRunning;
        self.breadcrumb = vec![format!("Bulk Command: {command}")];
        self.bulk_selection = false;
        self.current_group = None;
        self.cursor.reset();
        self.bulk_scroll = 0;
        self.bulk = Some(BulkRun {
            id: run_id,
            command,
            hosts,
            results,
            log,
            tasks,
        });
    }

    fn spawn_host_task(
        &self,
        run_id: u64,
        host: Host,
        command: String,
        log: Option<Arc<BulkLog>>,
    ) -> JoinHandle<()> {
        let runner = Arc::clone(&self.runner);
        let tx = self.event_tx.clone();
        let user = self.custom_username.clone();

        tokio::spawn(async move {
            let outcome = runner.execute(&host, &command, user.as_deref()).await;
            let log_error = log.and_then(|log| {
                log.append(&host, &outcome.output, outcome.error.as_deref())
                    .err()
                    .map(|e| format!("{e:#}"))
            });
            let done = BulkCompletion {
                run_id,
                host,
                outcome,
                log_error,
            };
            if tx.send(AppEvent::BulkFinished(done)).is_err() {
                tracing::debug!("Bulk result dropped, session already closed");
            }
        })
    }

    /// Record one host's outcome. Completions from an abandoned run are
    /// ignored.
    pub fn apply_bulk_completion(&mut self, done: BulkCompletion) {
        let Some(run) = self.bulk.as_mut() else {
            tracing::debug!("Bulk result for {} arrived with no run active", done.host.name);
            return;
        };
        if run.id != done.run_id {
            tracing::debug!("Ignoring result from previous run {}", done.run_id);
            return;
        }

        let key = done.host.key();
        if let Some(result) = run.results.get_mut(&key) {
            result.output = done.outcome.output;
            result.error = done.outcome.error;
            result.done = true;
        } else {
            tracing::warn!("Bulk result for unknown host {}", key);
        }

        let (finished, total) = self.bulk_progress();
        if let Some(err) = done.log_error {
            self.set_status(format!("Error: failed to write bulk log: {err}"));
        } else if finished == total {
            self.set_status(format!("Bulk command finished on {total} hosts"));
        }
    }

    /// `(done, total)` for the active run.
    pub fn bulk_progress(&self) -> (usize, usize) {
        self.bulk
            .as_ref()
            .map(|run| {
                let done = run.results.values().filter(|r| r.done).count();
                (done, run.results.len())
            })
            .unwrap_or((0, 0))
    }

    /// Leave the results view. In-flight commands are aborted; their `ssh`
    /// processes are killed when the task is dropped.
    pub fn leave_bulk(&mut self) {
        if let Some(run) = self.bulk.take() {
            let pending = run.results.values().filter(|r| !r.done).count();
            if pending > 0 {
                tracing::info!("Abandoning {} unfinished host(s) of run {}", pending, run.id);
            }
            for task in run.tasks {
                task.abort();
            }
        }
        self.view_mode = ViewMode::AllHosts;
        self.breadcrumb = vec![ALL_HOSTS_LABEL.to_string()];
        self.bulk_selection = false;
        self.selected_hosts.clear();
        self.bulk_scroll = 0;
    }
}
