mod ansible;
mod file;

pub use ansible::AnsibleProvider;
pub use file::{FileFormat, FileProvider};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheSettings, CachedProvider};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::models::Group;

/// A source of host groups.
///
/// Fetching may block (file reads, external commands), so callers run it off
/// the UI loop.
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn fetch(&self) -> Result<Vec<Group>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Json,
    Toml,
    Ansible,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Json => "json",
            ProviderKind::Toml => "toml",
            ProviderKind::Ansible => "ansible",
        }
    }

    /// Guess a provider type from a hosts file extension.
    pub fn from_extension(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yml") | Some("yaml") | Some("ini") => ProviderKind::Ansible,
            Some("toml") => ProviderKind::Toml,
            _ => ProviderKind::Json,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ProviderKind::Json),
            "toml" => Ok(ProviderKind::Toml),
            "ansible" => Ok(ProviderKind::Ansible),
            other => Err(Error::UnknownProviderType(other.to_string())),
        }
    }
}

/// Build one provider from its configuration, without caching.
pub fn create_provider(config: &ProviderConfig) -> Result<(Box<dyn Provider>, ProviderKind, PathBuf)> {
    let kind: ProviderKind = config.kind.parse()?;
    let file = config
        .file
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| Error::MissingSource {
            kind: kind.to_string(),
            name: config.name.clone(),
        })?;
    let path = expand_tilde(file);

    let provider: Box<dyn Provider> = match kind {
        ProviderKind::Json => Box::new(FileProvider::new(&config.name, &path, FileFormat::Json)),
        ProviderKind::Toml => Box::new(FileProvider::new(&config.name, &path, FileFormat::Toml)),
        ProviderKind::Ansible => Box::new(AnsibleProvider::new(&config.name, &path)),
    };
    Ok((provider, kind, path))
}

/// Build every configured provider, wrapping each in the cache when `cache`
/// is given.
///
/// `resolve_stale` is asked once per provider whose cache entry has expired,
/// with the provider name and the entry's age. Returning `true` keeps the
/// stale entry for this run, `false` deletes it.
pub fn build_providers<F>(
    configs: &[ProviderConfig],
    cache: Option<&CacheSettings>,
    mut resolve_stale: F,
) -> Result<Vec<Arc<dyn Provider>>>
where
    F: FnMut(&str, Duration) -> bool,
{
    if configs.is_empty() {
        return Err(Error::NoProviders);
    }

    let mut providers: Vec<Arc<dyn Provider>> = Vec::with_capacity(configs.len());
    for config in configs {
        let (inner, kind, path) = create_provider(config)?;
        let Some(settings) = cache else {
            providers.push(Arc::from(inner));
            continue;
        };

        let mut cached = CachedProvider::new(inner, kind.as_str(), &path.to_string_lossy(), settings.clone());
        if let Some(age) = cached.stale_age() {
            if resolve_stale(cached.name(), age) {
                tracing::info!("Using expired cache for provider {}", cached.name());
                cached.trust_stale();
            } else {
                cached.discard();
            }
        }
        providers.push(Arc::new(cached));
    }

    tracing::info!("Configured {} provider(s)", providers.len());
    Ok(providers)
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: &str, file: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            kind: kind.to_string(),
            name: "test".to_string(),
            file: file.map(str::to_string),
        }
    }

    #[test]
    fn unknown_type_is_a_setup_error() {
        let err = build_providers(&[config("ldap", Some("x"))], None, |_, _| false)
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownProviderType(t) if t == "ldap"));
    }

    #[test]
    fn missing_file_is_a_setup_error() {
        let err = build_providers(&[config("json", None)], None, |_, _| false)
            .err()
            .unwrap();
        assert!(matches!(err, Error::MissingSource { .. }));
        let err = build_providers(&[config("ansible", Some("  "))], None, |_, _| false)
            .err()
            .unwrap();
        assert!(matches!(err, Error::MissingSource { .. }));
    }

    #[test]
    fn empty_provider_list_is_rejected() {
        assert!(matches!(
            build_providers(&[], None, |_, _| false).err().unwrap(),
            Error::NoProviders
        ));
    }

    #[test]
    fn kind_is_guessed_from_extension() {
        assert_eq!(ProviderKind::from_extension(Path::new("inv.yaml")), ProviderKind::Ansible);
        assert_eq!(ProviderKind::from_extension(Path::new("hosts.TOML")), ProviderKind::Toml);
        assert_eq!(ProviderKind::from_extension(Path::new("hosts.json")), ProviderKind::Json);
        assert_eq!(ProviderKind::from_extension(Path::new("hosts")), ProviderKind::Json);
    }

    #[test]
    fn providers_keep_configured_names() {
        let providers = build_providers(
            &[config("json", Some("a.json")), config("Ansible", Some("inv.yml"))],
            None,
            |_, _| false,
        )
        .unwrap();
        assert_eq!(providers.len(), 2);
        assert!(providers.iter().all(|p| p.name() == "test"));
    }
}
