//! 拓樸模式策略
//!
//! The assembler runs the same per-server stages for every installation; a strategy answers the
//! layout questions whose answer depends on how the installation is organised.

pub mod cluster;
pub mod domain;
pub mod standalone;

pub use cluster::ClusterBasedStrategy;
pub use domain::DomainStrategy;
pub use standalone::StandaloneStrategy;

use crate::core::diagnostics::Diagnostics;
use crate::core::joiner::Joiner;
use crate::core::placeholder::SymbolicExpression;
use crate::core::reconciler::ListenerDeclaration;
use crate::domain::model::{DiagnosticKind, TopologyMode};
use crate::domain::tree::{ConfigTree, Node, Section};
use std::sync::Arc;

pub struct StrategyContext<'a> {
    pub tree: &'a ConfigTree,
    pub joiner: Joiner<'a>,
    pub diagnostics: &'a Diagnostics,
}

impl<'a> StrategyContext<'a> {
    pub fn new(tree: &'a ConfigTree, diagnostics: &'a Diagnostics) -> Self {
        Self {
            tree,
            joiner: Joiner::new(tree),
            diagnostics,
        }
    }
}

/// JVM settings as declared, before any placeholder is resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JvmDeclaration {
    pub name: Option<String>,
    pub heap_size: Option<String>,
    pub max_heap_size: Option<String>,
    pub max_metaspace: Option<String>,
    pub options: Vec<String>,
}

impl JvmDeclaration {
    pub fn from_node(node: Node<'_>) -> Self {
        let heap = node.child("heap");
        let options = node
            .child("jvm-options")
            .map(|o| o.texts("option"))
            .unwrap_or_default();
        let max_metaspace = node
            .child("metaspace")
            .or_else(|| node.child("permgen"))
            .and_then(|n| n.attr_string("max-size"))
            .or_else(|| {
                options
                    .iter()
                    .find_map(|o| o.strip_prefix("-XX:MaxMetaspaceSize="))
                    .map(str::to_string)
            });

        Self {
            name: node.name().map(str::to_string),
            heap_size: heap.and_then(|h| h.attr_string("size")),
            max_heap_size: heap.and_then(|h| h.attr_string("max-size")),
            max_metaspace,
            options,
        }
    }

    /// Fills the fields this declaration leaves open from `fallback`.
    pub fn or(mut self, fallback: &JvmDeclaration) -> Self {
        self.name = self.name.or_else(|| fallback.name.clone());
        self.heap_size = self.heap_size.or_else(|| fallback.heap_size.clone());
        self.max_heap_size = self.max_heap_size.or_else(|| fallback.max_heap_size.clone());
        self.max_metaspace = self.max_metaspace.or_else(|| fallback.max_metaspace.clone());
        if self.options.is_empty() {
            self.options = fallback.options.clone();
        }
        self
    }
}

/// A server as found in the `servers` section, with its group already joined.
#[derive(Debug, Clone)]
pub struct ServerEntry<'a> {
    pub node: Node<'a>,
    pub name: String,
    pub group: Option<String>,
    pub group_node: Option<Node<'a>>,
    pub cluster_node: Option<Node<'a>>,
    pub profile: Option<String>,
    pub socket_binding_group: Option<String>,
    pub port_offset: Option<SymbolicExpression>,
    pub jvm: Option<JvmDeclaration>,
    pub auto_start: bool,
}

impl<'a> ServerEntry<'a> {
    /// Reads the attributes every layout shares. Group and profile are left to the strategy.
    pub fn from_node(node: Node<'a>) -> Option<Self> {
        let name = node.name()?.to_string();
        let bindings = node.child("socket-bindings");

        let socket_binding_group = bindings
            .and_then(|b| b.attr_string("socket-binding-group"))
            .or_else(|| node.reference("socket-binding-group"));
        let port_offset = bindings
            .and_then(|b| b.attr_string("port-offset"))
            .or_else(|| node.attr_string("port-offset"))
            .map(|offset| SymbolicExpression::parse(&offset));

        Some(Self {
            node,
            name,
            group: node.attr_string("group"),
            group_node: None,
            cluster_node: None,
            profile: node.attr_string("profile"),
            socket_binding_group,
            port_offset,
            jvm: node.child("jvm").map(JvmDeclaration::from_node),
            auto_start: node
                .attr_string("auto-start")
                .map_or(true, |value| !value.eq_ignore_ascii_case("false")),
        })
    }
}

pub trait TopologyStrategy: Send + Sync {
    fn mode(&self) -> TopologyMode;

    /// Discovered: every declared server, in declared order.
    fn discover<'a>(&self, ctx: &StrategyContext<'a>) -> Vec<ServerEntry<'a>>;

    /// HeapResolved: JVM settings shared by the server's group, if any.
    fn shared_jvm(&self, ctx: &StrategyContext<'_>, server: &ServerEntry<'_>)
        -> Option<JvmDeclaration>;

    /// ListenersResolved: declarations of the server's listeners.
    fn listener_declarations(
        &self,
        ctx: &StrategyContext<'_>,
        server: &ServerEntry<'_>,
    ) -> Vec<ListenerDeclaration>;

    /// ResourcesResolved: the profile that holds datasources and thread pools.
    fn profile<'a>(&self, ctx: &StrategyContext<'a>, server: &ServerEntry<'a>) -> Option<Node<'a>>;

    /// ApplicationsResolved: whether an application with no explicit target lands on every server.
    fn implicit_deployment_target(&self) -> bool {
        false
    }

    /// Host-level management interfaces that are not part of any socket-binding-group.
    fn management_listeners(&self, ctx: &StrategyContext<'_>) -> Vec<ListenerDeclaration> {
        management_declarations(ctx.tree)
    }
}

impl TopologyMode {
    /// `clusters` means cluster-based, `server-groups` means domain, anything else standalone.
    pub fn detect(tree: &ConfigTree) -> Self {
        if !tree.entries(Section::Clusters).is_empty() {
            TopologyMode::ClusterBased
        } else if !tree.entries(Section::ServerGroups).is_empty() {
            TopologyMode::Domain
        } else {
            TopologyMode::Standalone
        }
    }
}

pub fn strategy_for(mode: TopologyMode) -> Arc<dyn TopologyStrategy> {
    match mode {
        TopologyMode::Domain => Arc::new(DomainStrategy),
        TopologyMode::Standalone => Arc::new(StandaloneStrategy),
        TopologyMode::ClusterBased => Arc::new(ClusterBasedStrategy),
    }
}

pub(crate) fn declared_servers<'a>(tree: &'a ConfigTree) -> Vec<ServerEntry<'a>> {
    tree.entries(Section::Servers)
        .into_iter()
        .filter_map(ServerEntry::from_node)
        .collect()
}

/// Group-level JVM, gaps filled from the host `jvms` entry with the same name.
pub(crate) fn jvm_with_host_defaults(
    ctx: &StrategyContext<'_>,
    jvm: Option<Node<'_>>,
) -> Option<JvmDeclaration> {
    Some(with_host_jvm(ctx, JvmDeclaration::from_node(jvm?)))
}

/// Fills gaps from the host-level `jvms/jvm` entry the declaration names.
pub(crate) fn with_host_jvm(
    ctx: &StrategyContext<'_>,
    declared: JvmDeclaration,
) -> JvmDeclaration {
    let host = declared
        .name
        .as_deref()
        .and_then(|name| ctx.joiner.join(Section::Jvms, name).entry())
        .map(JvmDeclaration::from_node);

    match host {
        Some(host) => declared.or(&host),
        None => declared,
    }
}

/// Socket-binding-group named by the group, else the one named by the server itself.
pub(crate) fn socket_binding_group_name(server: &ServerEntry<'_>) -> Option<String> {
    server
        .group_node
        .and_then(|group| group.reference("socket-binding-group"))
        .or_else(|| server.socket_binding_group.clone())
}

/// Offset precedence: server, then the group's socket-binding-group reference, then the
/// socket-binding-group's own `port-offset`.
pub(crate) fn effective_offset(
    server: &ServerEntry<'_>,
    group_binding: Option<Node<'_>>,
) -> Option<SymbolicExpression> {
    server
        .port_offset
        .clone()
        .or_else(|| {
            server
                .group_node
                .and_then(|g| g.child("socket-binding-group"))
                .and_then(|r| r.attr_string("port-offset"))
                .map(|o| SymbolicExpression::parse(&o))
        })
        .or_else(|| {
            group_binding
                .and_then(|g| g.attr_string("port-offset"))
                .map(|o| SymbolicExpression::parse(&o))
        })
}

/// Declarations of one socket-binding-group joined by name.
pub(crate) fn socket_group_listeners(
    ctx: &StrategyContext<'_>,
    server: &ServerEntry<'_>,
    group_name: &str,
) -> Vec<ListenerDeclaration> {
    let Some(group) = ctx.joiner.lookup(
        Section::SocketBindingGroups,
        group_name,
        ctx.diagnostics,
        Some(&server.name),
        "socket-binding-group",
    ) else {
        return Vec::new();
    };
    binding_declarations(server, group, group_name)
}

pub(crate) fn binding_declarations(
    server: &ServerEntry<'_>,
    group: Node<'_>,
    group_name: &str,
) -> Vec<ListenerDeclaration> {
    let offset = effective_offset(server, Some(group));
    let default_interface = group.attr("default-interface");

    group
        .children("socket-binding")
        .into_iter()
        .filter_map(|binding| {
            ListenerDeclaration::from_binding(group_name, binding, default_interface, offset.as_ref())
        })
        .collect()
}

pub(crate) fn record_missing(ctx: &StrategyContext<'_>, server: &ServerEntry<'_>, field: &str) {
    ctx.diagnostics.record(
        Some(&server.name),
        field,
        DiagnosticKind::UnresolvedReference,
        format!("no {} could be determined", field),
    );
}

/// `management/management-interfaces/*-interface/socket` entries, named `management-<kind>`.
pub(crate) fn management_declarations(tree: &ConfigTree) -> Vec<ListenerDeclaration> {
    let Some(interfaces) = tree.at("/management/management-interfaces") else {
        return Vec::new();
    };
    let Some(map) = interfaces.value().as_object() else {
        return Vec::new();
    };

    map.iter()
        .filter_map(|(key, value)| {
            let socket = Node::new(value).child("socket")?;
            let kind = key.split('-').next().unwrap_or(key);
            let port = socket.attr_string("port")?;
            Some(ListenerDeclaration {
                socket_binding_group: "management".to_string(),
                name: format!("management-{}", kind),
                protocol: crate::domain::runtime::Protocol::Tcp,
                port: SymbolicExpression::parse(&port),
                offset: None,
                interface: socket.attr("interface").map(str::to_string),
                fixed_port: true,
            })
        })
        .collect()
}
