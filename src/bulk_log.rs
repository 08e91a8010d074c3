//! Append-only log of one bulk command run.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use crate::models::Host;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkLog {
    path: PathBuf,
}

impl BulkLog {
    /// Create a fresh log under `dir` and write its header. Never reuses an
    /// existing file.
    pub fn create(dir: &Path, command: &str, host_count: usize) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {:?}", dir))?;

        let now = Local::now();
        let stem = format!("bulk-{}", now.format("%Y%m%d-%H%M%S"));
        let (path, mut file) = create_unique(dir, &stem)?;

        let header = format!(
            "Bulk Command Execution Log\n\
             ================================\n\
             Timestamp: {}\n\
             Command: {}\n\
             Hosts: {}\n\
             --------------------------------\n\n",
            now.format("%Y-%m-%d %H:%M:%S"),
            command,
            host_count
        );
        file.write_all(header.as_bytes())
            .with_context(|| format!("Failed to write log header to {:?}", path))?;

        tracing::info!("Bulk log created at {:?}", path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one host's block with a single write, so blocks from hosts
    /// finishing at the same time never interleave.
    pub fn append(&self, host: &Host, output: &str, error: Option<&str>) -> Result<()> {
        let mut block = format!(
            "[{}] {} ({})\n",
            Local::now().format("%H:%M:%S"),
            host.name,
            host.hostname
        );
        if let Some(error) = error {
            block.push_str(&format!("ERROR: {error}\n"));
        }
        if !output.is_empty() {
            block.push_str(&format!("OUTPUT:\n{output}\n"));
        }
        block.push_str("---\n\n");

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {:?}", self.path))?;
        file.write_all(block.as_bytes())
            .with_context(|| format!("Failed to append to {:?}", self.path))?;
        Ok(())
    }
}

fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, File)> {
    for attempt in 0..100 {
        let name = if attempt == 0 {
            format!("{stem}.log")
        } else {
            format!("{stem}-{attempt}.log")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e).with_context(|| format!("Failed to create {:?}", path)),
        }
    }
    anyhow::bail!("no free log file name for {stem} in {:?}", dir)
}
