use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::types::{App, InputMode, ViewMode};

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c'))
}

impl App {
    pub fn handle_key(&mut self, key: KeyEvent) {
        if is_ctrl_c(&key) {
            self.quit();
            return;
        }

        if self.error.is_some() {
            self.handle_key_on_error(key);
            return;
        }

        if self.loading {
            if key.code == KeyCode::Char('q') {
                self.quit();
            }
            return;
        }

        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(key),
            _ => self.handle_input_key(key),
        }
    }

    /// Any key dismisses a load error and fetches again, except quit.
    fn handle_key_on_error(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('q') {
            self.quit();
            return;
        }
        tracing::info!("Retrying data load after error");
        self.error = None;
        self.reload();
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.commit_input(),
            KeyCode::Esc => self.cancel_input(),
            KeyCode::Backspace => self.input_backspace(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.input_char(c),
            _ => {}
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        let bulk_view = self.view_mode == ViewMode::BulkRunning;
        match key.code {
            KeyCode::Char('q') => self.quit(),
            KeyCode::Up | KeyCode::Char('k') if bulk_view => {
                self.bulk_scroll = self.bulk_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') if bulk_view => {
                self.bulk_scroll = self.bulk_scroll.saturating_add(1);
            }
            KeyCode::Tab => self.switch_view(),
            _ if bulk_view => {}
            KeyCode::Up | KeyCode::Char('k') => self.move_up(),
            KeyCode::Down | KeyCode::Char('j') => self.move_down(),
            KeyCode::Left | KeyCode::Char('h') => self.move_left(),
            KeyCode::Right | KeyCode::Char('l') => self.move_right(),
            KeyCode::Enter | KeyCode::Char(' ') => self.handle_key_enter(),
            KeyCode::Backspace => {
                if self.view_mode == ViewMode::InGroup {
                    self.back_to_groups();
                }
            }
            KeyCode::Char('/') => self.start_input(InputMode::Filter),
            KeyCode::Char('u') if self.view_mode != ViewMode::ByGroup => {
                self.start_input(InputMode::Username)
            }
            KeyCode::Char('s') => self.toggle_bulk_selection(),
            KeyCode::Char('c')
                if self.bulk_selection
                    && self.view_mode != ViewMode::ByGroup
                    && !self.selected_hosts.is_empty() =>
            {
                self.start_input(InputMode::BulkCommand)
            }
            KeyCode::Char('y') => self.copy_ssh_command(),
            KeyCode::Esc => self.clear_filter(),
            _ => {}
        }
    }

    fn handle_key_enter(&mut self) {
        match self.view_mode {
            ViewMode::ByGroup => self.enter_group(),
            ViewMode::AllHosts | ViewMode::InGroup if self.bulk_selection => self.toggle_host_selection(),
            ViewMode::AllHosts | ViewMode::InGroup => self.select_host(None),
            ViewMode::BulkRunning => {}
        }
    }
}
