use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::app::grid::GridCursor;
use crate::app_event::AppEvent;
use crate::bulk_log::BulkLog;
use crate::config::{Exclusions, Palette};
use crate::models::{Host, Inventory};
use crate::provider::Provider;
use crate::ssh_service::CommandRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    AllHosts,
    ByGroup,
    InGroup,
    BulkRunning,
}

/// Modal text entry. While not `Normal`, typed characters go to the input
/// buffer and navigation keys are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Filter,
    Username,
    BulkCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkResult {
    pub host: Host,
    pub output: String,
    pub error: Option<String>,
    pub done: bool,
}

impl BulkResult {
    pub fn pending(host: Host) -> Self {
        Self {
            host,
            output: String::new(),
            error: None,
            done: false,
        }
    }
}

#[derive(Debug)]
pub struct BulkRun {
    pub id: u64,
    pub command: String,
    /// Hosts in selection order, used for display.
    pub hosts: Vec<Host>,
    pub results: HashMap<String, BulkResult>,
    pub log: Option<Arc<BulkLog>>,
    pub tasks: Vec<JoinHandle<()>>,
}

/// Settings an [`App`] needs from configuration.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    pub exclusions: Exclusions,
    pub bulk_log_dir: PathBuf,
    pub palette: Palette,
}

pub struct App {
    pub should_quit: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub status_message: Option<(String, Instant)>,

    pub providers: Vec<Arc<dyn Provider>>,
    pub runner: Arc<dyn CommandRunner>,
    pub options: AppOptions,
    pub event_tx: UnboundedSender<AppEvent>,
    pub event_rx: UnboundedReceiver<AppEvent>,

    // Data
    pub inventory: Inventory,
    pub filtered_hosts: Vec<usize>,
    pub filtered_groups: Vec<usize>,

    // Navigation
    pub view_mode: ViewMode,
    pub breadcrumb: Vec<String>,
    pub cursor: GridCursor,
    pub terminal_width: u16,
    pub current_group: Option<usize>,

    // Input
    pub input_mode: InputMode,
    pub input_buffer: String,
    pub filter_text: String,
    pub(crate) filter_before_edit: String,
    pub custom_username: Option<String>,

    // Bulk
    pub bulk_selection: bool,
    pub selected_hosts: Vec<Host>,
    pub bulk: Option<BulkRun>,
    pub bulk_scroll: u16,
    pub(crate) next_run_id: u64,

    /// Host picked for an interactive session. Ends the browser session.
    pub choice: Option<Host>,
}
