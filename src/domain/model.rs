use crate::domain::runtime::Protocol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyMode {
    Domain,
    Standalone,
    #[serde(rename = "cluster", alias = "clusterbased")]
    ClusterBased,
}

impl fmt::Display for TopologyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyMode::Domain => write!(f, "domain"),
            TopologyMode::Standalone => write!(f, "standalone"),
            TopologyMode::ClusterBased => write!(f, "cluster"),
        }
    }
}

/// Ports of one logical listener. Holds more than one port only after a merge of entries that
/// were bound differently, and is empty when the declared port could not be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PortList(Vec<u32>);

impl PortList {
    pub fn single(port: u32) -> Self {
        Self(vec![port])
    }

    pub fn unresolved() -> Self {
        Self(Vec::new())
    }

    pub fn primary(&self) -> Option<u32> {
        self.0.first().copied()
    }

    pub fn ports(&self) -> &[u32] {
        &self.0
    }

    pub fn is_resolved(&self) -> bool {
        !self.0.is_empty()
    }

    /// Adds the ports of `other` that are not already present.
    pub fn absorb(&mut self, other: &PortList) {
        for port in &other.0 {
            if !self.0.contains(port) {
                self.0.push(*port);
            }
        }
    }
}

impl fmt::Display for PortList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", joined.join(", "))
    }
}

impl Serialize for PortList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedListener {
    pub socket_binding_group: String,
    pub name: String,
    pub protocol: Protocol,
    pub port: PortList,
    pub interface: Option<String>,
    pub address: Option<String>,
    pub verified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Datasource {
    pub pool_name: String,
    pub jndi_name: String,
    pub driver: String,
    pub connection_url: String,
    pub user_name: String,
    pub enabled: bool,
    pub xa: bool,
    pub min_pool_size: Option<u32>,
    pub max_pool_size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThreadPool {
    pub name: String,
    pub kind: String,
    pub max_threads: Option<u32>,
    pub keepalive_time: Option<u64>,
    pub keepalive_unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedApplication {
    pub name: String,
    pub runtime_name: String,
    pub kind: String,
    pub context_path: String,
    pub source_path: Option<String>,
    pub enabled: bool,
    /// Server-groups, servers or clusters the application is deployed to, as declared.
    pub targets: Vec<String>,
    pub assignment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedInstance {
    pub name: String,
    pub mode: TopologyMode,
    pub group: Option<String>,
    pub profile: Option<String>,
    pub socket_binding_group: Option<String>,
    pub port_offset: i64,
    pub min_heap: Option<String>,
    pub max_heap: Option<String>,
    pub max_metaspace: Option<String>,
    pub jvm_options: Vec<String>,
    pub run_user: Option<String>,
    pub java_version: Option<String>,
    pub java_vendor: Option<String>,
    pub bind_address: Option<String>,
    pub auto_start: bool,
    /// A process snapshot was observed for this server.
    pub running: bool,
    pub extensions: Vec<String>,
    pub listeners: Vec<ResolvedListener>,
    pub datasources: Vec<Datasource>,
    pub thread_pools: Vec<ThreadPool>,
    pub applications: Vec<ResolvedApplication>,
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnresolvedReference,
    AmbiguousMatch,
    UnresolvedPort,
    PortOutOfRange,
    ProbeFailure,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub instance: Option<String>,
    pub field: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Effective topology of one host.
#[derive(Debug, Clone, Serialize)]
pub struct Topology {
    pub host: String,
    pub mode: TopologyMode,
    pub assessed_at: DateTime<Utc>,
    pub instances: Vec<ResolvedInstance>,
    /// Listeners of every instance plus host management interfaces, merged.
    pub listeners: Vec<ResolvedListener>,
    pub diagnostics: Vec<Diagnostic>,
    pub complete: bool,
}

impl Topology {
    pub fn instance(&self, name: &str) -> Option<&ResolvedInstance> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub fn verified_listener_count(&self) -> usize {
        self.listeners.iter().filter(|l| l.verified).count()
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_list_display_and_absorb() {
        let mut ports = PortList::single(8080);
        ports.absorb(&PortList::single(8081));
        ports.absorb(&PortList::single(8080));
        assert_eq!(ports.to_string(), "8080, 8081");
        assert_eq!(ports.primary(), Some(8080));
        assert!(!PortList::unresolved().is_resolved());
        assert_eq!(serde_json::to_string(&ports).unwrap(), "\"8080, 8081\"");
    }
}
