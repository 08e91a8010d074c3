use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::app::grid::{columns_for_width, GridCursor};
use crate::app::types::{App, AppOptions, InputMode, ViewMode};
use crate::app_event::AppEvent;
use crate::config::Exclusions;
use crate::filter;
use crate::models::{Group, Host, Inventory};
use crate::provider::Provider;
use crate::ssh_service::CommandRunner;

pub const ALL_HOSTS_LABEL: &str = "All Hosts";
pub const ALL_GROUPS_LABEL: &str = "All Groups";
const DEFAULT_TERMINAL_WIDTH: u16 = 80;

/// Fetch every provider in order and apply exclusion rules. The first failing
/// provider aborts the load.
pub fn load_inventory(providers: &[Arc<dyn Provider>], exclusions: &Exclusions) -> Result<Inventory, String> {
    let mut forest = Vec::new();
    for provider in providers {
        match provider.fetch() {
            Ok(groups) => forest.extend(groups),
            Err(e) => {
                tracing::error!("Provider {} failed: {}", provider.name(), e);
                return Err(format!("failed to load data from {}: {}", provider.name(), e));
            }
        }
    }
    Ok(exclusions.apply(forest))
}

impl App {
    pub fn new(providers: Vec<Arc<dyn Provider>>, runner: Arc<dyn CommandRunner>, options: AppOptions) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            should_quit: false,
            loading: true,
            error: None,
            status_message: None,
            providers,
            runner,
            options,
            event_tx,
            event_rx,
            inventory: Inventory::default(),
            filtered_hosts: Vec::new(),
            filtered_groups: Vec::new(),
            view_mode: ViewMode::AllHosts,
            breadcrumb: vec![ALL_HOSTS_LABEL.to_string()],
            cursor: GridCursor::default(),
            terminal_width: DEFAULT_TERMINAL_WIDTH,
            current_group: None,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            filter_text: String::new(),
            filter_before_edit: String::new(),
            custom_username: None,
            bulk_selection: false,
            selected_hosts: Vec::new(),
            bulk: None,
            bulk_scroll: 0,
            next_run_id: 0,
            choice: None,
        }
    }

    /// Start a session that shows `error` until a key is pressed.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.loading = false;
        self.error = Some(error.into());
        self
    }

    /// Fetch all providers on the blocking pool. The result arrives as
    /// [`AppEvent::DataLoaded`].
    pub fn reload(&mut self) {
        self.loading = true;
        self.error = None;

        let providers = self.providers.clone();
        let exclusions = self.options.exclusions.clone();
        let tx = self.event_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = load_inventory(&providers, &exclusions);
            if tx.send(AppEvent::DataLoaded(result)).is_err() {
                tracing::debug!("Session closed before data finished loading");
            }
        });
    }

    /// Apply everything background work has reported so far. Returns whether
    /// anything changed.
    pub fn process_events(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.event_rx.try_recv() {
            self.apply_event(event);
            changed = true;
        }
        changed
    }

    pub fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::DataLoaded(Ok(inventory)) => {
                tracing::info!(
                    "Loaded {} groups and {} hosts",
                    inventory.groups.len(),
                    inventory.hosts.len()
                );
                self.loading = false;
                let entered = self.current_group().map(|g| g.name.clone());
                self.inventory = inventory;
                // Groups may come back in a different order; follow the name.
                self.current_group =
                    entered.and_then(|name| self.inventory.groups.iter().position(|g| g.name == name));
                if self.current_group.is_none() && self.view_mode == ViewMode::InGroup {
                    tracing::info!("Entered group is gone after reload, back to group list");
                    self.view_mode = ViewMode::ByGroup;
                    self.breadcrumb = vec![ALL_GROUPS_LABEL.to_string()];
                    self.end_bulk_selection();
                }
                self.refresh_filter();
            }
            AppEvent::DataLoaded(Err(err)) => {
                self.loading = false;
                self.error = Some(err);
                self.refresh_filter();
            }
            AppEvent::BulkFinished(done) => self.apply_bulk_completion(done),
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Re-derive the filtered lists from the current filter text.
    pub fn refresh_filter(&mut self) {
        self.filtered_hosts = filter::filter_hosts(&self.inventory.hosts, &self.filter_text);
        self.filtered_groups = filter::filter_groups(&self.inventory.groups, &self.filter_text);
        self.cursor.reset();
    }

    pub fn columns(&self) -> usize {
        columns_for_width(self.terminal_width)
    }

    pub fn set_terminal_width(&mut self, width: u16) {
        if width == self.terminal_width {
            return;
        }
        let index = self.cursor_index();
        self.terminal_width = width;
        let (cols, items) = (self.columns(), self.active_len());
        self.cursor.relayout(index, cols, items);
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor.index(self.columns())
    }

    pub fn current_group(&self) -> Option<&Group> {
        self.current_group.and_then(|i| self.inventory.groups.get(i))
    }

    /// Hosts in the active grid, in display order.
    pub fn visible_hosts(&self) -> Vec<&Host> {
        match self.view_mode {
            ViewMode::AllHosts => self
                .filtered_hosts
                .iter()
                .filter_map(|&i| self.inventory.hosts.get(i))
                .collect(),
            ViewMode::InGroup => self
                .current_group()
                .map(|g| filter::filter_group_hosts(g, &self.filter_text))
                .unwrap_or_default(),
            ViewMode::ByGroup | ViewMode::BulkRunning => Vec::new(),
        }
    }

    pub fn visible_groups(&self) -> Vec<&Group> {
        if self.view_mode != ViewMode::ByGroup {
            return Vec::new();
        }
        self.filtered_groups
            .iter()
            .filter_map(|&i| self.inventory.groups.get(i))
            .collect()
    }

    pub fn active_len(&self) -> usize {
        match self.view_mode {
            ViewMode::AllHosts => self.filtered_hosts.len(),
            ViewMode::ByGroup => self.filtered_groups.len(),
            ViewMode::InGroup => self.visible_hosts().len(),
            ViewMode::BulkRunning => 0,
        }
    }

    pub fn host_at_cursor(&self) -> Option<&Host> {
        self.visible_hosts().get(self.cursor_index()).copied()
    }

    /// Group under the cursor in the group view, with its index in the
    /// unfiltered group list.
    pub fn group_at_cursor(&self) -> Option<(usize, &Group)> {
        if self.view_mode != ViewMode::ByGroup {
            return None;
        }
        let real = *self.filtered_groups.get(self.cursor_index())?;
        self.inventory.groups.get(real).map(|g| (real, g))
    }

    pub fn is_selected(&self, host: &Host) -> bool {
        self.selected_hosts.iter().any(|h| h.same_host(host))
    }

    // Navigation

    pub fn move_up(&mut self) {
        self.cursor.move_up();
    }

    pub fn move_down(&mut self) {
        let (cols, items) = (self.columns(), self.active_len());
        self.cursor.move_down(cols, items);
    }

    pub fn move_left(&mut self) {
        if self.view_mode == ViewMode::InGroup && self.cursor.col == 0 {
            self.back_to_groups();
        } else {
            self.cursor.move_left();
        }
    }

    pub fn move_right(&mut self) {
        let (cols, items) = (self.columns(), self.active_len());
        self.cursor.move_right(cols, items);
    }

    pub fn switch_view(&mut self) {
        match self.view_mode {
            ViewMode::AllHosts => {
                self.view_mode = ViewMode::ByGroup;
                self.breadcrumb = vec![ALL_GROUPS_LABEL.to_string()];
                self.end_bulk_selection();
            }
            ViewMode::ByGroup | ViewMode::InGroup => {
                self.view_mode = ViewMode::AllHosts;
                self.breadcrumb = vec![ALL_HOSTS_LABEL.to_string()];
            }
            ViewMode::BulkRunning => self.leave_bulk(),
        }
        self.current_group = None;
        self.cursor.reset();
        tracing::debug!("Switched to {:?}", self.view_mode);
    }

    pub fn enter_group(&mut self) {
        let Some((index, group)) = self.group_at_cursor() else {
            return;
        };
        let name = group.name.clone();
        tracing::info!("Entering group {}", name);
        self.current_group = Some(index);
        self.view_mode = ViewMode::InGroup;
        self.breadcrumb.push(name);
        self.cursor.reset();
    }

    pub fn back_to_groups(&mut self) {
        if self.breadcrumb.len() > 1 {
            self.breadcrumb.pop();
        }
        if self.breadcrumb.len() <= 1 {
            self.view_mode = ViewMode::ByGroup;
            self.breadcrumb = vec![ALL_GROUPS_LABEL.to_string()];
            self.current_group = None;
            self.end_bulk_selection();
        }
        self.cursor.reset();
    }

    /// Pick the host under the cursor for an interactive session and end the
    /// browser session.
    pub fn select_host(&mut self, user_override: Option<String>) {
        let Some(host) = self.host_at_cursor().cloned() else {
            tracing::warn!("Select pressed but no host under cursor");
            return;
        };
        tracing::info!("Selected host {} ({})", host.name, host.hostname);
        self.custom_username = user_override;
        self.choice = Some(host);
        self.quit();
    }

    pub fn toggle_host_selection(&mut self) {
        let Some(host) = self.host_at_cursor().cloned() else {
            return;
        };
        if let Some(pos) = self.selected_hosts.iter().position(|h| h.same_host(&host)) {
            self.selected_hosts.remove(pos);
        } else {
            self.selected_hosts.push(host);
        }
    }

    pub fn toggle_bulk_selection(&mut self) {
        if !matches!(self.view_mode, ViewMode::AllHosts | ViewMode::InGroup) {
            return;
        }
        if self.bulk_selection {
            self.end_bulk_selection();
        } else {
            self.bulk_selection = true;
        }
    }

    /// The group list has no host cursor, so selection ends on the way in.
    fn end_bulk_selection(&mut self) {
        self.bulk_selection = false;
        self.selected_hosts.clear();
    }

    // Text entry

    pub fn start_input(&mut self, mode: InputMode) {
        self.input_buffer = match mode {
            InputMode::Filter => {
                self.filter_before_edit = self.filter_text.clone();
                self.filter_text.clone()
            }
            _ => String::new(),
        };
        self.input_mode = mode;
    }

    pub fn input_char(&mut self, c: char) {
        self.input_buffer.push(c);
        self.on_input_changed();
    }

    pub fn input_backspace(&mut self) {
        if self.input_buffer.pop().is_some() {
            self.on_input_changed();
        }
    }

    fn on_input_changed(&mut self) {
        if self.input_mode == InputMode::Filter {
            self.filter_text = self.input_buffer.clone();
            self.refresh_filter();
        }
    }

    pub fn commit_input(&mut self) {
        let mode = std::mem::replace(&mut self.input_mode, InputMode::Normal);
        let text = std::mem::take(&mut self.input_buffer);
        match mode {
            InputMode::Normal => {}
            InputMode::Filter => {
                self.filter_text = text;
                self.refresh_filter();
            }
            InputMode::Username if text.is_empty() => {}
            InputMode::Username if self.bulk_selection => {
                tracing::info!("Bulk commands will run as {}", text);
                self.set_status(format!("Bulk commands will run as {text}"));
                self.custom_username = Some(text);
            }
            InputMode::Username => self.select_host(Some(text)),
            InputMode::BulkCommand => {
                if !text.trim().is_empty() {
                    self.dispatch_bulk_command(text);
                }
            }
        }
    }

    pub fn cancel_input(&mut self) {
        let mode = std::mem::replace(&mut self.input_mode, InputMode::Normal);
        self.input_buffer.clear();
        if mode == InputMode::Filter && self.filter_text != self.filter_before_edit {
            self.filter_text = std::mem::take(&mut self.filter_before_edit);
            self.refresh_filter();
        }
    }

    pub fn clear_filter(&mut self) {
        if !self.filter_text.is_empty() {
            self.filter_text.clear();
            self.refresh_filter();
        }
    }

    /// Copy the SSH command for the host under the cursor.
    pub fn copy_ssh_command(&mut self) {
        let Some(host) = self.host_at_cursor() else {
            return;
        };
        let user = crate::ssh_service::resolve_user(host, None);
        let command = host.ssh_command(user.as_deref());
        let result = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(command.clone()));
        match result {
            Ok(()) => self.set_status(format!("Copied: {command}")),
            Err(e) => {
                tracing::warn!("Clipboard unavailable: {}", e);
                self.set_status(format!("Error: clipboard unavailable ({e})"));
            }
        }
    }
}
