use super::{
    binding_declarations, declared_servers, jvm_with_host_defaults, record_missing,
    socket_group_listeners, JvmDeclaration, ServerEntry, StrategyContext, TopologyStrategy,
};
use crate::core::reconciler::ListenerDeclaration;
use crate::domain::model::TopologyMode;
use crate::domain::tree::{Node, Section};

/// 單機模式：沒有 server-group，唯一的 profile 與 socket-binding-group 直接套用
#[derive(Debug, Clone, Copy, Default)]
pub struct StandaloneStrategy;

impl TopologyStrategy for StandaloneStrategy {
    fn mode(&self) -> TopologyMode {
        TopologyMode::Standalone
    }

    fn discover<'a>(&self, ctx: &StrategyContext<'a>) -> Vec<ServerEntry<'a>> {
        let first_profile = ctx
            .tree
            .entries(Section::Profiles)
            .first()
            .and_then(|p| p.name())
            .map(str::to_string);

        declared_servers(ctx.tree)
            .into_iter()
            .map(|mut server| {
                if server.profile.is_none() {
                    server.profile = first_profile.clone();
                }
                server
            })
            .collect()
    }

    fn shared_jvm(
        &self,
        ctx: &StrategyContext<'_>,
        _server: &ServerEntry<'_>,
    ) -> Option<JvmDeclaration> {
        jvm_with_host_defaults(ctx, ctx.tree.entries(Section::Jvms).first().copied())
    }

    fn listener_declarations(
        &self,
        ctx: &StrategyContext<'_>,
        server: &ServerEntry<'_>,
    ) -> Vec<ListenerDeclaration> {
        if let Some(name) = server.socket_binding_group.as_deref() {
            return socket_group_listeners(ctx, server, name);
        }

        let groups = ctx.tree.entries(Section::SocketBindingGroups);
        match groups.first() {
            Some(group) => {
                let name = group.name().unwrap_or("standard-sockets");
                binding_declarations(server, *group, name)
            }
            None => {
                record_missing(ctx, server, "socket-binding-group");
                Vec::new()
            }
        }
    }

    fn profile<'a>(&self, ctx: &StrategyContext<'a>, server: &ServerEntry<'a>) -> Option<Node<'a>> {
        let profiles = ctx.tree.entries(Section::Profiles);
        match server.profile.as_deref() {
            Some(name) => ctx.joiner.lookup(
                Section::Profiles,
                name,
                ctx.diagnostics,
                Some(&server.name),
                "profile",
            ),
            None => profiles.first().copied(),
        }
    }

    fn implicit_deployment_target(&self) -> bool {
        true
    }
}
