use super::{
    declared_servers, jvm_with_host_defaults, record_missing, socket_binding_group_name,
    socket_group_listeners, JvmDeclaration, ServerEntry, StrategyContext, TopologyStrategy,
};
use crate::core::reconciler::ListenerDeclaration;
use crate::domain::model::TopologyMode;
use crate::domain::tree::{Node, Section};

/// Managed domain: servers belong to server-groups, groups point at a profile and a
/// socket-binding-group and carry the shared JVM settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainStrategy;

impl TopologyStrategy for DomainStrategy {
    fn mode(&self) -> TopologyMode {
        TopologyMode::Domain
    }

    fn discover<'a>(&self, ctx: &StrategyContext<'a>) -> Vec<ServerEntry<'a>> {
        declared_servers(ctx.tree)
            .into_iter()
            .map(|mut server| {
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
                    None => record_missing(ctx, &server, "group"),
                }
                server.profile = server
                    .group_node
                    .and_then(|group| group.attr_string("profile"))
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
        jvm_with_host_defaults(ctx, server.group_node.and_then(|group| group.child("jvm")))
    }

    fn listener_declarations(
        &self,
        ctx: &StrategyContext<'_>,
        server: &ServerEntry<'_>,
    ) -> Vec<ListenerDeclaration> {
        match socket_binding_group_name(server) {
            Some(name) => socket_group_listeners(ctx, server, &name),
            None => {
                record_missing(ctx, server, "socket-binding-group");
                Vec::new()
            }
        }
    }

    fn profile<'a>(&self, ctx: &StrategyContext<'a>, server: &ServerEntry<'a>) -> Option<Node<'a>> {
        match server.profile.as_deref() {
            Some(name) => ctx.joiner.lookup(
                Section::Profiles,
                name,
                ctx.diagnostics,
                Some(&server.name),
                "profile",
            ),
            None => {
                record_missing(ctx, server, "profile");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::Diagnostics;
    use crate::domain::model::DiagnosticKind;
    use crate::domain::tree::ConfigTree;
    use serde_json::json;

    fn tree() -> ConfigTree {
        ConfigTree::new(json!({
            "profiles": { "profile": [ { "name": "full" }, { "name": "ha" } ] },
            "socket-binding-groups": { "socket-binding-group": [
                { "name": "standard", "default-interface": "public",
                  "socket-binding": [ { "name": "http", "port": "${jboss.http.port:8080}" } ] },
                { "name": "full-sockets",
                  "socket-binding": [ { "name": "https", "port": "8443" } ] }
            ]},
            "server-groups": { "server-group": [
                { "name": "main-group", "profile": "full",
                  "socket-binding-group": { "ref": "standard" } },
                { "name": "bare-group", "profile": "ha" }
            ]},
            "servers": { "server": [
                { "name": "server-one", "group": "main-group",
                  "socket-bindings": { "socket-binding-group": "full-sockets", "port-offset": "150" } },
                { "name": "server-two", "group": "bare-group",
                  "socket-bindings": { "socket-binding-group": "full-sockets" } },
                { "name": "server-three", "group": "ghost-group" }
            ]}
        }))
    }

    #[test]
    fn test_group_socket_binding_group_wins_over_server_one() {
        let tree = tree();
        let diagnostics = Diagnostics::new();
        let ctx = StrategyContext::new(&tree, &diagnostics);
        let servers = DomainStrategy.discover(&ctx);

        let one = DomainStrategy.listener_declarations(&ctx, &servers[0]);
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].socket_binding_group, "standard");
        assert_eq!(one[0].interface.as_deref(), Some("public"));
        assert_eq!(one[0].offset.as_ref().map(|o| o.to_string()).as_deref(), Some("150"));

        let two = DomainStrategy.listener_declarations(&ctx, &servers[1]);
        assert_eq!(two[0].socket_binding_group, "full-sockets");
        assert_eq!(two[0].name, "https");
    }

    #[test]
    fn test_unknown_group_degrades_to_empty_fields() {
        let tree = tree();
        let diagnostics = Diagnostics::new();
        let ctx = StrategyContext::new(&tree, &diagnostics);
        let servers = DomainStrategy.discover(&ctx);

        assert_eq!(servers[0].profile.as_deref(), Some("full"));
        assert!(servers[2].group_node.is_none());
        assert!(servers[2].profile.is_none());
        assert!(DomainStrategy.profile(&ctx, &servers[2]).is_none());
        assert!(DomainStrategy.listener_declarations(&ctx, &servers[2]).is_empty());
        assert!(diagnostics.count(DiagnosticKind::UnresolvedReference) >= 3);
    }
}
