mod bulk;
pub mod grid;
mod keymap;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use state::{load_inventory, ALL_GROUPS_LABEL, ALL_HOSTS_LABEL};
pub use types::{App, AppOptions, BulkResult, BulkRun, InputMode, ViewMode};
