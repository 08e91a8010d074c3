use serde::{Deserialize, Serialize};

pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Host {
    pub fn new(name: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            port: None,
            user: None,
        }
    }

    /// Port to connect to. `None` and `0` both mean the SSH default.
    pub fn port(&self) -> u16 {
        match self.port {
            Some(port) if port > 0 => port,
            _ => DEFAULT_SSH_PORT,
        }
    }

    /// Key used for bulk results. Two hosts with the same name and hostname
    /// share a key.
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.hostname)
    }

    pub fn same_host(&self, other: &Host) -> bool {
        self.name == other.name && self.hostname == other.hostname
    }

    /// `hostname` or `hostname:port` when the port is not the default.
    pub fn address(&self) -> String {
        if self.port() != DEFAULT_SSH_PORT {
            format!("{}:{}", self.hostname, self.port())
        } else {
            self.hostname.clone()
        }
    }

    /// Command line shown in the details panel and copied with `y`.
    pub fn ssh_command(&self, user: Option<&str>) -> String {
        let mut cmd = String::from("ssh ");
        if self.port() != DEFAULT_SSH_PORT {
            cmd.push_str(&format!("-p {} ", self.port()));
        }
        if let Some(user) = user {
            cmd.push_str(user);
            cmd.push('@');
        }
        cmd.push_str(&self.hostname);
        cmd
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subgroups: Vec<Group>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            hosts: Vec::new(),
            subgroups: Vec::new(),
        }
    }

    pub fn with_hosts(mut self, hosts: Vec<Host>) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn with_subgroups(mut self, subgroups: Vec<Group>) -> Self {
        self.subgroups = subgroups;
        self
    }

    /// Every host under this group: own hosts first, then each subgroup in
    /// order, depth first. Hosts reachable through several paths appear once
    /// per path.
    pub fn all_hosts(&self) -> Vec<&Host> {
        let mut out = Vec::new();
        self.collect_hosts(&mut out);
        out
    }

    fn collect_hosts<'a>(&'a self, out: &mut Vec<&'a Host>) {
        out.extend(self.hosts.iter());
        for sub in &self.subgroups {
            sub.collect_hosts(out);
        }
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len() + self.subgroups.iter().map(Group::host_count).sum::<usize>()
    }
}

/// Total number of hosts reachable from a forest.
pub fn forest_host_count(groups: &[Group]) -> usize {
    groups.iter().map(Group::host_count).sum()
}

/// What the navigation controller browses: root groups for the group view and
/// the flattened host list for the all-hosts view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub groups: Vec<Group>,
    pub hosts: Vec<Host>,
}

impl Inventory {
    pub fn from_forest(groups: Vec<Group>) -> Self {
        let hosts = groups
            .iter()
            .flat_map(|g| g.all_hosts().into_iter().cloned())
            .collect();
        Self { groups, hosts }
    }
}
