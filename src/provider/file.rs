use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::Provider;
use crate::error::{Error, Result};
use crate::models::Group;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// A JSON array of groups.
    Json,
    /// A TOML document with a `[[groups]]` array.
    Toml,
}

#[derive(Debug, Deserialize)]
struct HostsFile {
    #[serde(default)]
    groups: Vec<Group>,
}

/// Reads groups from a hosts file on every fetch.
#[derive(Debug)]
pub struct FileProvider {
    name: String,
    path: PathBuf,
    format: FileFormat,
}

impl FileProvider {
    pub fn new(name: &str, path: &Path, format: FileFormat) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            format,
        }
    }
}

impl Provider for FileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Vec<Group>> {
        let content = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        let groups = match self.format {
            FileFormat::Json => serde_json::from_str(&content).map_err(|source| Error::Json {
                path: self.path.clone(),
                source,
            })?,
            FileFormat::Toml => {
                let file: HostsFile = toml::from_str(&content).map_err(|source| Error::Toml {
                    path: self.path.clone(),
                    source,
                })?;
                file.groups
            }
        };
        tracing::debug!("Read {} group(s) from {:?}", groups.len(), self.path);
        Ok(groups)
    }
}
