use crate::models::{Host, Inventory};
use crate::ssh_service::ExecOutcome;

/// Messages sent from background work to the UI loop.
#[derive(Debug)]
pub enum AppEvent {
    DataLoaded(Result<Inventory, String>),
    BulkFinished(BulkCompletion),
}

#[derive(Debug, Clone)]
pub struct BulkCompletion {
    pub run_id: u64,
    pub host: Host,
    pub outcome: ExecOutcome,
    /// Set when the task could not append its block to the run's log.
    pub log_error: Option<String>,
}
