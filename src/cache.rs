//! On-disk cache in front of a [`Provider`].
//!
//! One JSON file per source, named after a fingerprint of the provider type,
//! source locator and provider name.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{forest_host_count, Group};
use crate::provider::Provider;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const ENTRY_PREFIX: &str = "sshgrid_";
const ENTRY_EXT: &str = "json";
const PARTIAL_EXT: &str = "tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub dir: PathBuf,
    pub ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    groups: Vec<Group>,
    timestamp: DateTime<Utc>,
}

impl CacheEntry {
    fn age(&self) -> Duration {
        (Utc::now() - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }
}

pub fn fingerprint(provider_type: &str, locator: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{provider_type}:{locator}:{name}").as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("{ENTRY_PREFIX}{hex}")
}

pub struct CachedProvider {
    inner: Box<dyn Provider>,
    entry_path: PathBuf,
    settings: CacheSettings,
    trust_stale: bool,
}

impl CachedProvider {
    pub fn new(inner: Box<dyn Provider>, provider_type: &str, locator: &str, settings: CacheSettings) -> Self {
        let key = fingerprint(provider_type, locator, inner.name());
        let entry_path = settings.dir.join(format!("{key}.{ENTRY_EXT}"));
        Self {
            inner,
            entry_path,
            settings,
            trust_stale: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn entry_path(&self) -> &Path {
        &self.entry_path
    }

    /// Age of the stored entry when it exists and has outlived the TTL.
    pub fn stale_age(&self) -> Option<Duration> {
        self.load()
            .map(|entry| entry.age())
            .filter(|age| *age >= self.settings.ttl)
    }

    /// Serve the stored entry regardless of age for the rest of this process.
    pub fn trust_stale(&mut self) {
        self.trust_stale = true;
    }

    /// Delete the stored entry so the next fetch goes to the source.
    pub fn discard(&self) {
        match fs::remove_file(&self.entry_path) {
            Ok(()) => tracing::info!("Removed expired cache {:?}", self.entry_path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not remove expired cache {:?}: {}", self.entry_path, e),
        }
    }

    fn load(&self) -> Option<CacheEntry> {
        let data = match fs::read(&self.entry_path) {
            Ok(data) => data,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!("Cache read failed for {:?}: {}", self.entry_path, e);
                }
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Ignoring corrupt cache entry {:?}: {}", self.entry_path, e);
                None
            }
        }
    }

    fn store(&self, groups: &[Group]) {
        if let Err(e) = self.write_entry(groups) {
            tracing::warn!("Failed to write cache {:?}: {:#}", self.entry_path, e);
        }
    }

    fn write_entry(&self, groups: &[Group]) -> anyhow::Result<()> {
        fs::create_dir_all(&self.settings.dir)?;
        let entry = CacheEntry {
            groups: groups.to_vec(),
            timestamp: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&entry)?;

        let tmp = self.entry_path.with_extension(PARTIAL_EXT);
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.entry_path)?;
        Ok(())
    }
}

impl Provider for CachedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(&self) -> Result<Vec<Group>> {
        if let Some(entry) = self.load() {
            if self.trust_stale || entry.age() < self.settings.ttl {
                tracing::debug!("Cache hit for provider {}", self.name());
                return Ok(entry.groups);
            }
        }

        let groups = self.inner.fetch()?;
        if forest_host_count(&groups) > 0 {
            self.store(&groups);
        } else {
            tracing::debug!("Provider {} returned no hosts, not caching", self.name());
        }
        Ok(groups)
    }
}

/// Remove every cache entry in `dir`, including partial writes left by an
/// interrupted store. A missing directory is not an error.
pub fn clear_all(dir: &Path) -> anyhow::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(anyhow::anyhow!("failed to read cache directory {:?}: {}", dir, e)),
    };

    let mut removed = 0;
    let mut failures = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let is_entry = path.is_file()
            && matches!(path.extension().and_then(|e| e.to_str()), Some(ENTRY_EXT | PARTIAL_EXT))
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ENTRY_PREFIX));
        if !is_entry {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => failures.push(format!("{}: {}", path.display(), e)),
        }
    }

    if !failures.is_empty() {
        anyhow::bail!("some cache files could not be deleted:\n{}", failures.join("\n"));
    }
    Ok(removed)
}
