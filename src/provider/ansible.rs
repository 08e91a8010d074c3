use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use super::Provider;
use crate::error::{Error, Result};
use crate::models::{Group, Host};

const INVENTORY_COMMAND: &str = "ansible-inventory";
const PSEUDO_GROUPS: [&str; 2] = ["all", "ungrouped"];

/// Output of `ansible-inventory --list`.
#[derive(Debug, Default, Deserialize)]
struct Inventory {
    #[serde(rename = "_meta", default)]
    meta: Meta,
    #[serde(flatten)]
    groups: BTreeMap<String, InventoryGroup>,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    hostvars: HashMap<String, HostVars>,
}

#[derive(Debug, Default, Deserialize)]
struct InventoryGroup {
    #[serde(default)]
    hosts: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HostVars {
    ansible_host: Option<String>,
    ansible_user: Option<String>,
    ansible_port: Option<PortValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u64),
    Text(String),
}

impl PortValue {
    fn as_port(&self) -> Option<u16> {
        match self {
            PortValue::Number(n) => u16::try_from(*n).ok(),
            PortValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Runs `ansible-inventory -i <file> --list` and maps each inventory group
/// with direct hosts to a [`Group`].
#[derive(Debug)]
pub struct AnsibleProvider {
    name: String,
    inventory: PathBuf,
}

impl AnsibleProvider {
    pub fn new(name: &str, inventory: &Path) -> Self {
        Self {
            name: name.to_string(),
            inventory: inventory.to_path_buf(),
        }
    }
}

impl Provider for AnsibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<Vec<Group>> {
        tracing::debug!("Running {} for {:?}", INVENTORY_COMMAND, self.inventory);
        let output = Command::new(INVENTORY_COMMAND)
            .arg("-i")
            .arg(&self.inventory)
            .arg("--list")
            .output()
            .map_err(|e| Error::Inventory(format!("failed to run {INVENTORY_COMMAND}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Inventory(stderr.trim().to_string()));
        }

        parse_inventory(&output.stdout)
    }
}

fn parse_inventory(raw: &[u8]) -> Result<Vec<Group>> {
    let inventory: Inventory = serde_json::from_slice(raw)
        .map_err(|e| Error::Inventory(format!("unreadable inventory output: {e}")))?;

    let groups = inventory
        .groups
        .iter()
        .filter(|(name, _)| !PSEUDO_GROUPS.contains(&name.as_str()))
        .filter(|(_, group)| !group.hosts.is_empty())
        .map(|(name, group)| {
            let hosts = group
                .hosts
                .iter()
                .map(|alias| to_host(alias, inventory.meta.hostvars.get(alias)))
                .collect();
            Group::new(name.clone()).with_hosts(hosts)
        })
        .collect();
    Ok(groups)
}

fn to_host(alias: &str, vars: Option<&HostVars>) -> Host {
    let mut host = Host::new(alias, alias);
    if let Some(vars) = vars {
        if let Some(addr) = vars.ansible_host.as_deref().filter(|a| !a.is_empty()) {
            host.hostname = addr.to_string();
        }
        host.user = vars.ansible_user.clone().filter(|u| !u.is_empty());
        host.port = vars.ansible_port.as_ref().and_then(PortValue::as_port);
    }
    host
}
