use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[serde(alias = "tcp6", alias = "http", alias = "https")]
    Tcp,
    #[serde(alias = "udp6")]
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundPort {
    pub protocol: Protocol,
    pub port: u32,
}

impl BoundPort {
    pub fn tcp(port: u32) -> Self {
        Self {
            protocol: Protocol::Tcp,
            port,
        }
    }

    pub fn udp(port: u32) -> Self {
        Self {
            protocol: Protocol::Udp,
            port,
        }
    }
}

/// 單一伺服器行程的執行期資訊
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub server: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub run_user: Option<String>,
    #[serde(default)]
    pub java_version: Option<String>,
    #[serde(default)]
    pub java_vendor: Option<String>,
}

/// Live evidence for one host, captured once before resolution starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeContext {
    #[serde(default)]
    arguments: Vec<String>,
    #[serde(default)]
    bound_ports: HashSet<BoundPort>,
    #[serde(default)]
    processes: Vec<ProcessSnapshot>,
    #[serde(default)]
    environment: HashMap<String, String>,
}

impl RuntimeContext {
    pub fn new(arguments: Vec<String>, bound_ports: impl IntoIterator<Item = BoundPort>) -> Self {
        Self {
            arguments,
            bound_ports: bound_ports.into_iter().collect(),
            processes: Vec::new(),
            environment: HashMap::new(),
        }
    }

    pub fn with_processes(mut self, processes: Vec<ProcessSnapshot>) -> Self {
        self.processes = processes;
        self
    }

    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn is_port_bound(&self, protocol: Protocol, port: u32) -> bool {
        self.bound_ports.contains(&BoundPort { protocol, port })
    }

    pub fn bound_port_count(&self) -> usize {
        self.bound_ports.len()
    }

    pub fn process_for(&self, server: &str) -> Option<&ProcessSnapshot> {
        self.processes.iter().find(|p| p.server == server)
    }

    /// Host-level view, used for host-wide declarations such as management interfaces.
    pub fn view(&self) -> RuntimeView<'_> {
        RuntimeView {
            context: self,
            process: None,
        }
    }

    /// View for one server: its own process arguments override the host arguments.
    pub fn view_for(&self, server: &str) -> RuntimeView<'_> {
        RuntimeView {
            context: self,
            process: self.process_for(server),
        }
    }
}

/// Anything placeholders can be resolved against.
pub trait ArgumentSource {
    /// Arguments in command-line order. When a key repeats, the later one wins, as on a JVM.
    fn arguments(&self) -> impl Iterator<Item = &str>;

    fn env_var(&self, _name: &str) -> Option<&str> {
        None
    }
}

impl ArgumentSource for RuntimeContext {
    fn arguments(&self) -> impl Iterator<Item = &str> {
        self.arguments.iter().map(String::as_str)
    }

    fn env_var(&self, name: &str) -> Option<&str> {
        self.environment.get(name).map(String::as_str)
    }
}

impl ArgumentSource for [String] {
    fn arguments(&self) -> impl Iterator<Item = &str> {
        self.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RuntimeView<'a> {
    context: &'a RuntimeContext,
    process: Option<&'a ProcessSnapshot>,
}

impl<'a> RuntimeView<'a> {
    pub fn context(&self) -> &'a RuntimeContext {
        self.context
    }

    pub fn process(&self) -> Option<&'a ProcessSnapshot> {
        self.process
    }

    /// 只看伺服器自己的行程參數，例如 `-Xms512m`
    pub fn process_arguments(&self) -> &'a [String] {
        self.process.map(|p| p.arguments.as_slice()).unwrap_or(&[])
    }
}

impl ArgumentSource for RuntimeView<'_> {
    fn arguments(&self) -> impl Iterator<Item = &str> {
        self.context
            .arguments
            .iter()
            .chain(self.process_arguments())
            .map(String::as_str)
    }

    fn env_var(&self, name: &str) -> Option<&str> {
        self.context.env_var(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RuntimeContext {
        RuntimeContext::new(
            vec!["-Djboss.http.port=9090".to_string(), "-server".to_string()],
            [BoundPort::tcp(9090), BoundPort::udp(45688)],
        )
        .with_processes(vec![ProcessSnapshot {
            server: "server-one".to_string(),
            arguments: vec!["-Xms256m".to_string(), "-Djboss.http.port=8230".to_string()],
            run_user: Some("jboss".to_string()),
            ..Default::default()
        }])
    }

    #[test]
    fn test_is_port_bound_respects_protocol() {
        let ctx = context();
        assert!(ctx.is_port_bound(Protocol::Tcp, 9090));
        assert!(!ctx.is_port_bound(Protocol::Udp, 9090));
        assert!(ctx.is_port_bound(Protocol::Udp, 45688));
        assert_eq!(ctx.bound_port_count(), 2);
    }

    #[test]
    fn test_server_view_puts_process_arguments_last() {
        let ctx = context();
        let view = ctx.view_for("server-one");
        let args: Vec<&str> = view.arguments().collect();
        assert_eq!(
            args,
            vec!["-Djboss.http.port=9090", "-server", "-Xms256m", "-Djboss.http.port=8230"]
        );

        let unknown_view = ctx.view_for("server-two");
        let unknown: Vec<&str> = unknown_view.arguments().collect();
        assert_eq!(unknown, vec!["-Djboss.http.port=9090", "-server"]);
    }

    #[test]
    fn test_protocol_aliases_deserialize() {
        let port: BoundPort = serde_json::from_str(r#"{"protocol":"tcp6","port":8080}"#).unwrap();
        assert_eq!(port, BoundPort::tcp(8080));
        let port: BoundPort = serde_json::from_str(r#"{"protocol":"http","port":9090}"#).unwrap();
        assert_eq!(port, BoundPort::tcp(9090));
    }
}
