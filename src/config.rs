use anyhow::{Context, Result};
use dirs;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheSettings, DEFAULT_TTL};
use crate::models::{Group, Host, Inventory};
use crate::provider::ProviderKind;

const APP_DIR: &str = "sshgrid";
const ENV_PREFIX: &str = "SSHGRID_";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ThemeColors {
    pub primary: String,
    pub secondary: String,
    pub text: String,
    pub muted: String,
    pub highlight: String,
    pub error: String,
    pub warning: String,
    pub success: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Theme {
    pub name: String,
    pub colors: ThemeColors,
}

/// Colours resolved once at startup and handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub primary: Color,
    pub secondary: Color,
    pub text: Color,
    pub muted: Color,
    pub highlight: Color,
    pub error: Color,
    pub warning: Color,
    pub success: Color,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExcludeMode {
    /// Hide matching groups from the group view only.
    #[default]
    Soft,
    /// Also drop every host under a matching group.
    Hard,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    /// `None` means "discover a hosts file"; an explicit empty list is an error.
    #[serde(default)]
    pub providers: Option<Vec<ProviderConfig>>,
    #[serde(default)]
    pub cache_enabled: Option<bool>,
    #[serde(default)]
    pub cache_ttl: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub exclude_groups: Vec<String>,
    #[serde(default)]
    pub exclude_hosts: Vec<String>,
    #[serde(default)]
    pub exclude_mode: ExcludeMode,
    #[serde(default)]
    pub bulk_log_dir: Option<String>,
    #[serde(default = "default_theme_name")]
    pub default_theme: String,
    #[serde(default)]
    pub themes: Vec<Theme>,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            primary: "#7d56f4".to_string(),
            secondary: "#5a56e0".to_string(),
            text: "#fafafa".to_string(),
            muted: "#767676".to_string(),
            highlight: "#d75fd7".to_string(),
            error: "#ff005f".to_string(),
            warning: "#ffb86c".to_string(),
            success: "#50fa7b".to_string(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name: default_theme_name(),
            colors: ThemeColors::default(),
        }
    }
}

fn default_theme_name() -> String {
    "default".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            providers: None,
            cache_enabled: None,
            cache_ttl: None,
            cache_dir: None,
            exclude_groups: Vec::new(),
            exclude_hosts: Vec::new(),
            exclude_mode: ExcludeMode::Soft,
            bulk_log_dir: None,
            default_theme: default_theme_name(),
            themes: vec![Theme::default()],
        }
    }
}

impl ThemeColors {
    pub fn palette(&self) -> Palette {
        let fallback = ThemeColors::default();
        let pick = |value: &str, default: &str| {
            parse_hex_color(value)
                .or_else(|| parse_hex_color(default))
                .unwrap_or(Color::Reset)
        };
        Palette {
            primary: pick(&self.primary, &fallback.primary),
            secondary: pick(&self.secondary, &fallback.secondary),
            text: pick(&self.text, &fallback.text),
            muted: pick(&self.muted, &fallback.muted),
            highlight: pick(&self.highlight, &fallback.highlight),
            error: pick(&self.error, &fallback.error),
            warning: pick(&self.warning, &fallback.warning),
            success: pick(&self.success, &fallback.success),
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        ThemeColors::default().palette()
    }
}

fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.trim().strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

impl AppConfig {
    /// Configured providers, or a single provider pointing at the first hosts
    /// file found when none are configured.
    pub fn provider_configs(&self) -> Vec<ProviderConfig> {
        match &self.providers {
            Some(list) => list.clone(),
            None => {
                let file = discover_hosts_file();
                let kind = env_var("PROVIDER_TYPE")
                    .unwrap_or_else(|| ProviderKind::from_extension(&file).as_str().to_string());
                vec![ProviderConfig {
                    kind,
                    name: "default".to_string(),
                    file: Some(file.to_string_lossy().into_owned()),
                }]
            }
        }
    }

    pub fn cache_enabled(&self) -> bool {
        env_var("CACHE_ENABLED")
            .and_then(|v| parse_bool(&v))
            .or(self.cache_enabled)
            .unwrap_or(true)
    }

    pub fn cache_settings(&self) -> CacheSettings {
        let ttl = env_var("CACHE_TTL")
            .or_else(|| self.cache_ttl.clone())
            .map(|raw| {
                parse_ttl(&raw).unwrap_or_else(|| {
                    tracing::warn!("Invalid cache TTL '{}', using 24h", raw);
                    DEFAULT_TTL
                })
            })
            .unwrap_or(DEFAULT_TTL);
        let dir = env_var("CACHE_DIR")
            .or_else(|| self.cache_dir.clone())
            .map(|d| crate::provider::expand_tilde(&d))
            .unwrap_or_else(default_cache_dir);
        CacheSettings { dir, ttl }
    }

    pub fn exclusions(&self) -> Exclusions {
        let split = |raw: String| -> Vec<String> { raw.split(',').map(|s| s.trim().to_string()).collect() };
        Exclusions {
            groups: env_var("EXCLUDE_GROUPS")
                .map(split)
                .unwrap_or_else(|| self.exclude_groups.clone()),
            hosts: env_var("EXCLUDE_HOSTS")
                .map(split)
                .unwrap_or_else(|| self.exclude_hosts.clone()),
            mode: self.exclude_mode,
        }
    }

    pub fn bulk_log_dir(&self) -> PathBuf {
        self.bulk_log_dir
            .as_deref()
            .map(crate::provider::expand_tilde)
            .unwrap_or_else(|| data_dir().join("bulk"))
    }

    pub fn palette(&self) -> Palette {
        self.themes
            .iter()
            .find(|t| t.name == self.default_theme)
            .or_else(|| self.themes.first())
            .map(|t| t.colors.palette())
            .unwrap_or_default()
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{suffix}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `"12"` is twelve hours; otherwise a number followed by `s`, `m`, `h` or `d`.
pub fn parse_ttl(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(hours) = raw.parse::<u64>() {
        return Some(Duration::from_secs(hours * 3600));
    }
    let split = raw.find(|c: char| !c.is_ascii_digit())?;
    let (value, unit) = raw.split_at(split);
    let value: u64 = value.parse().ok()?;
    let secs = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        "d" => value * 86_400,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(APP_DIR)
}

pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn discover_hosts_file() -> PathBuf {
    if let Some(file) = env_var("HOSTS_FILE") {
        return crate::provider::expand_tilde(&file);
    }

    let mut candidates = vec![PathBuf::from("./hosts.json")];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join(APP_DIR).join("hosts.json"));
    }
    candidates.push(PathBuf::from("/etc/sshgrid/hosts.json"));

    candidates
        .into_iter()
        .find(|p| p.exists())
        .unwrap_or_else(|| PathBuf::from("./hosts.json"))
}

/// `*` matches any run of characters; without `*` the match is exact.
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }
    if !pattern.contains('*') {
        return name == pattern;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !name.starts_with(first) {
        return false;
    }
    let mut rest = &name[first.len()..];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    pub groups: Vec<String>,
    pub hosts: Vec<String>,
    pub mode: ExcludeMode,
}

impl Exclusions {
    pub fn is_group_excluded(&self, name: &str) -> bool {
        self.groups.iter().any(|p| matches_pattern(name, p))
    }

    pub fn is_host_excluded(&self, host: &Host) -> bool {
        self.hosts.iter().any(|p| matches_pattern(&host.name, p))
    }

    /// Turn fetched forests into what the browser shows.
    pub fn apply(&self, forest: Vec<Group>) -> Inventory {
        if self.groups.is_empty() && self.hosts.is_empty() {
            return Inventory::from_forest(forest);
        }

        let mut banned: Vec<Host> = Vec::new();
        if self.mode == ExcludeMode::Hard {
            for group in &forest {
                self.collect_hard_excluded(group, &mut banned);
            }
        }
        let is_visible = |host: &Host| !self.is_host_excluded(host) && !banned.iter().any(|b| b.same_host(host));

        let hosts = forest
            .iter()
            .flat_map(|g| g.all_hosts())
            .filter(|&h| is_visible(h))
            .cloned()
            .collect();
        let groups = forest
            .into_iter()
            .filter_map(|g| self.prune_group(g, &is_visible))
            .collect();

        Inventory { groups, hosts }
    }

    fn collect_hard_excluded(&self, group: &Group, out: &mut Vec<Host>) {
        if self.is_group_excluded(&group.name) {
            out.extend(group.all_hosts().into_iter().cloned());
            return;
        }
        for sub in &group.subgroups {
            self.collect_hard_excluded(sub, out);
        }
    }

    fn prune_group(&self, mut group: Group, is_visible: &impl Fn(&Host) -> bool) -> Option<Group> {
        if self.is_group_excluded(&group.name) {
            return None;
        }
        group.hosts.retain(|h| is_visible(h));
        group.subgroups = std::mem::take(&mut group.subgroups)
            .into_iter()
            .filter_map(|sub| self.prune_group(sub, is_visible))
            .collect();
        Some(group)
    }
}

#[derive(Debug)]
pub struct ConfigManager {
    config_file: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join(APP_DIR);
        Ok(Self::with_path(config_dir.join("config.toml")))
    }

    pub fn with_path(config_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_file
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        if !self.config_file.exists() {
            tracing::info!("No config at {:?}, using defaults", self.config_file);
            return Ok(AppConfig::default());
        }

        let content: String =
            fs::read_to_string(&self.config_file).context("Failed to read config file")?;

        let mut config: AppConfig =
            toml::from_str(&content).context("Failed to parse config file")?;

        // Ensure there's always at least the default theme
        if config.themes.is_empty() {
            config.themes.push(Theme::default());
        }

        if !config.themes.iter().any(|t| t.name == config.default_theme) {
            config.default_theme = config.themes[0].name.clone();
        }

        Ok(config)
    }
}
