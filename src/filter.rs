//! Substring filtering over hosts and groups.
//!
//! Everything here is pure and cheap enough to run on every keystroke.

use crate::models::{Group, Host};

/// Lower-cased needle, built once per filter pass.
struct Needle(String);

impl Needle {
    fn new(text: &str) -> Self {
        Self(text.to_lowercase())
    }

    fn matches_text(&self, haystack: &str) -> bool {
        haystack.to_lowercase().contains(&self.0)
    }

    fn matches_host(&self, host: &Host) -> bool {
        self.matches_text(&host.name) || self.matches_text(&host.hostname)
    }

    fn matches_group(&self, group: &Group) -> bool {
        self.matches_text(&group.name) || group.all_hosts().iter().any(|h| self.matches_host(h))
    }
}

pub fn host_matches(host: &Host, text: &str) -> bool {
    text.is_empty() || Needle::new(text).matches_host(host)
}

/// Indices into `hosts` of every host whose name or hostname contains `text`,
/// ignoring case. Order is preserved.
pub fn filter_hosts(hosts: &[Host], text: &str) -> Vec<usize> {
    if text.is_empty() {
        return (0..hosts.len()).collect();
    }
    let needle = Needle::new(text);
    hosts
        .iter()
        .enumerate()
        .filter(|(_, host)| needle.matches_host(host))
        .map(|(i, _)| i)
        .collect()
}

/// Indices into `groups` of groups whose name matches or that contain at
/// least one matching host anywhere below them.
pub fn filter_groups(groups: &[Group], text: &str) -> Vec<usize> {
    if text.is_empty() {
        return (0..groups.len()).collect();
    }
    let needle = Needle::new(text);
    groups
        .iter()
        .enumerate()
        .filter(|(_, group)| needle.matches_group(group))
        .map(|(i, _)| i)
        .collect()
}

/// Hosts shown while a group is entered.
pub fn filter_group_hosts<'a>(group: &'a Group, text: &str) -> Vec<&'a Host> {
    let hosts = group.all_hosts();
    if text.is_empty() {
        return hosts;
    }
    let needle = Needle::new(text);
    hosts.into_iter().filter(|h| needle.matches_host(h)).collect()
}
