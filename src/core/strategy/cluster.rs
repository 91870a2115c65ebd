use super::{
    declared_servers, jvm_with_host_defaults, socket_binding_group_name, socket_group_listeners,
    JvmDeclaration, ServerEntry, StrategyContext, TopologyStrategy,
};
use crate::core::placeholder::SymbolicExpression;
use crate::core::reconciler::ListenerDeclaration;
use crate::domain::model::TopologyMode;
use crate::domain::runtime::Protocol;
use crate::domain::tree::{Node, Section};

/// Cluster-based installation: clusters list their member servers, servers may declare their
/// listeners inline and applications name their target servers or clusters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterBasedStrategy;

impl TopologyStrategy for ClusterBasedStrategy {
    fn mode(&self) -> TopologyMode {
        TopologyMode::ClusterBased
    }

    fn discover<'a>(&self, ctx: &StrategyContext<'a>) -> Vec<ServerEntry<'a>> {
        let clusters = ctx.joiner.clusters();

        declared_servers(ctx.tree)
            .into_iter()
            .map(|mut server| {
                let membership = clusters.iter().find(|c| c.contains(&server.name));
                server.cluster_node = membership
                    .and_then(|c| ctx.joiner.join(Section::Clusters, &c.name).entry());

                match server.group.clone() {
                    Some(group) => {
                        server.group_node = ctx.joiner.lookup(
                            Section::ServerGroups,
                            &group,
                            ctx.diagnostics,
                            Some(&server.name),
                            "group",
                        );
                    }
                    None => {
                        server.group = membership.map(|c| c.name.clone());
                        server.group_node = server
                            .group
                            .as_deref()
                            .and_then(|g| ctx.joiner.join(Section::ServerGroups, g).entry());
                    }
                }

                server.profile = server
                    .group_node
                    .and_then(|g| g.attr_string("profile"))
                    .or(server.profile.take());
                server
            })
            .collect()
    }

    fn shared_jvm(
        &self,
        ctx: &StrategyContext<'_>,
        server: &ServerEntry<'_>,
    ) -> Option<JvmDeclaration> {
        let jvm = server
            .group_node
            .and_then(|g| g.child("jvm"))
            .or_else(|| server.cluster_node.and_then(|c| c.child("jvm")));
        jvm_with_host_defaults(ctx, jvm)
    }

    fn listener_declarations(
        &self,
        ctx: &StrategyContext<'_>,
        server: &ServerEntry<'_>,
    ) -> Vec<ListenerDeclaration> {
        let group_name = socket_binding_group_name(server).or_else(|| {
            server
                .cluster_node
                .and_then(|c| c.reference("socket-binding-group"))
        });

        let mut declared = match group_name {
            Some(name) => socket_group_listeners(ctx, server, &name),
            None => Vec::new(),
        };
        declared.extend(inline_listeners(server));
        declared
    }

    fn profile<'a>(&self, ctx: &StrategyContext<'a>, server: &ServerEntry<'a>) -> Option<Node<'a>> {
        let name = server.profile.as_deref()?;
        ctx.joiner.lookup(
            Section::Profiles,
            name,
            ctx.diagnostics,
            Some(&server.name),
            "profile",
        )
    }
}

/// `listeners/listener` declared directly on the server, grouped under the server's name.
fn inline_listeners(server: &ServerEntry<'_>) -> Vec<ListenerDeclaration> {
    let Some(listeners) = server.node.child("listeners") else {
        return Vec::new();
    };

    listeners
        .children("listener")
        .into_iter()
        .filter_map(|listener| {
            let name = listener.name()?;
            let port = listener.attr_string("port")?;
            let protocol = match listener.attr("protocol") {
                Some(p) if p.eq_ignore_ascii_case("udp") => Protocol::Udp,
                _ => Protocol::Tcp,
            };
            Some(ListenerDeclaration {
                socket_binding_group: server.name.clone(),
                name: name.to_string(),
                protocol,
                port: SymbolicExpression::parse(&port),
                offset: server.port_offset.clone(),
                interface: listener.attr("interface").map(str::to_string),
                fixed_port: false,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::Diagnostics;
    use crate::domain::tree::ConfigTree;
    use serde_json::json;

    #[test]
    fn test_group_derived_from_cluster_membership() {
        let tree = ConfigTree::new(json!({
            "clusters": { "cluster": [
                { "name": "cluster1", "servers": { "server-name": ["ms1", "ms2"] },
                  "jvm": { "heap": { "size": "512m", "max-size": "2g" } } }
            ]},
            "servers": { "server": [
                { "name": "adminServer",
                  "listeners": { "listener": { "name": "BASE", "port": "9736" } } },
                { "name": "ms1",
                  "listeners": { "listener": [
                      { "name": "BASE", "port": "9936" },
                      { "name": "http-server", "port": "8088" }
                  ] } }
            ]}
        }));
        let diagnostics = Diagnostics::new();
        let ctx = StrategyContext::new(&tree, &diagnostics);
        let servers = ClusterBasedStrategy.discover(&ctx);

        assert!(servers[0].group.is_none());
        assert_eq!(servers[1].group.as_deref(), Some("cluster1"));

        let jvm = ClusterBasedStrategy.shared_jvm(&ctx, &servers[1]).unwrap();
        assert_eq!(jvm.max_heap_size.as_deref(), Some("2g"));
        assert!(ClusterBasedStrategy.shared_jvm(&ctx, &servers[0]).is_none());

        let listeners = ClusterBasedStrategy.listener_declarations(&ctx, &servers[1]);
        let names: Vec<_> = listeners.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["BASE", "http-server"]);
        assert_eq!(listeners[0].socket_binding_group, "ms1");
        assert!(diagnostics.is_empty());
    }
}
