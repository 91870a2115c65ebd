//! Deployed applications and the instances they land on.
//!
//! Targets are worked out once per host ([`plan_applications`]); each instance then only checks
//! membership ([`ApplicationPlan::applies_to`]).

use crate::core::diagnostics::Diagnostics;
use crate::core::joiner::{ClusterMembership, Joiner};
use crate::core::strategy::ServerEntry;
use crate::domain::model::{DiagnosticKind, ResolvedApplication};
use crate::domain::tree::{Node, Section};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ApplicationPlan<'a> {
    pub node: Node<'a>,
    pub name: String,
    /// Server-groups deploying the application, with their own deployment element.
    pub groups: Vec<(String, Node<'a>)>,
    pub server_targets: Vec<String>,
    pub group_targets: Vec<String>,
    pub clusters: Vec<ClusterMembership>,
    /// Whether any target was declared, even one that could not be resolved.
    pub targeted: bool,
}

impl<'a> ApplicationPlan<'a> {
    pub fn applies_to(&self, server: &ServerEntry<'_>, implicit: bool) -> bool {
        let group = server.group.as_deref();
        self.groups.iter().any(|(g, _)| Some(g.as_str()) == group)
            || self.server_targets.iter().any(|s| *s == server.name)
            || self.group_targets.iter().any(|g| Some(g.as_str()) == group)
            || self.clusters.iter().any(|c| c.contains(&server.name))
            || (implicit && !self.targeted)
    }

    /// Declared targets, fan-out groups first, without repeats.
    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        let candidates = self
            .groups
            .iter()
            .map(|(g, _)| g)
            .chain(&self.group_targets)
            .chain(&self.server_targets)
            .chain(self.clusters.iter().map(|c| &c.name));
        for target in candidates {
            if !targets.contains(target) {
                targets.push(target.clone());
            }
        }
        targets
    }

    pub fn resolve_for(&self, server: &ServerEntry<'_>) -> ResolvedApplication {
        let runtime_name = self
            .node
            .attr_string("runtime-name")
            .unwrap_or_else(|| self.name.clone());
        let path = Path::new(&runtime_name);
        let kind = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "unknown".to_string());
        let context_path = self.node.attr_string("context-root").unwrap_or_else(|| {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(&runtime_name);
            format!("/{}", stem)
        });

        let group_deployment = self
            .groups
            .iter()
            .find(|(g, _)| Some(g.as_str()) == server.group.as_deref())
            .map(|(_, node)| *node);
        let enabled = group_deployment
            .and_then(|d| d.attr("enabled"))
            .or_else(|| self.node.attr("enabled"))
            .map(|e| e != "false")
            .unwrap_or(true);

        let targets = self.targets();
        ResolvedApplication {
            name: self.name.clone(),
            runtime_name,
            kind,
            context_path,
            source_path: source_path(self.node),
            enabled,
            assignment_count: targets.len(),
            targets,
        }
    }
}

fn source_path(node: Node<'_>) -> Option<String> {
    node.find("fs-archive")
        .or_else(|| node.find("fs-exploded"))
        .and_then(|n| n.attr_string("path"))
        .or_else(|| node.attr_string("source-path"))
}

/// Target names from `targets/<kind>` children and the `target-<kind>` attribute.
fn explicit_targets(node: Node<'_>, kind: &str) -> Vec<String> {
    let mut names = node
        .child("targets")
        .map(|t| t.texts(kind))
        .unwrap_or_default();
    if let Some(attr) = node.attr(&format!("target-{}", kind)) {
        names.extend(
            attr.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
    names
}

pub fn plan_applications<'a>(joiner: &Joiner<'a>, diagnostics: &Diagnostics) -> Vec<ApplicationPlan<'a>> {
    joiner
        .tree()
        .entries(Section::Deployments)
        .into_iter()
        .filter_map(|node| {
            let name = node.name()?.to_string();

            let groups: Vec<(String, Node<'a>)> = joiner
                .fan_out(&name)
                .into_iter()
                .filter_map(|group| {
                    let group_name = group.name()?.to_string();
                    let deployment = group
                        .child("deployments")?
                        .children("deployment")
                        .into_iter()
                        .find(|d| d.name() == Some(name.as_str()))?;
                    Some((group_name, deployment))
                })
                .collect();

            let server_targets = explicit_targets(node, "server");
            let group_targets = explicit_targets(node, "server-group");
            let cluster_targets = explicit_targets(node, "cluster");
            let targeted = !groups.is_empty()
                || !server_targets.is_empty()
                || !group_targets.is_empty()
                || !cluster_targets.is_empty();

            let clusters = cluster_targets
                .into_iter()
                .filter_map(|cluster| match joiner.cluster(&cluster) {
                    Some(membership) => Some(membership),
                    None => {
                        diagnostics.record(
                            None,
                            &format!("applications.{}.target-cluster", name),
                            DiagnosticKind::UnresolvedReference,
                            format!("cluster '{}' is not declared", cluster),
                        );
                        None
                    }
                })
                .collect();

            Some(ApplicationPlan {
                node,
                server_targets,
                group_targets,
                groups,
                clusters,
                targeted,
                name,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::strategy::ServerEntry;
    use crate::domain::tree::ConfigTree;
    use serde_json::json;

    fn server<'a>(node: Node<'a>, group: Option<&str>) -> ServerEntry<'a> {
        let mut entry = ServerEntry::from_node(node).unwrap();
        entry.group = group.map(str::to_string);
        entry
    }

    #[test]
    fn test_group_fan_out_and_context_path() {
        let tree = ConfigTree::new(json!({
            "deployments": { "deployment": [
                { "name": "shop.war", "runtime-name": "shop.war",
                  "content": { "fs-archive": { "path": "/opt/apps/shop.war" } } },
                { "name": "batch.ear", "context-root": "/jobs" }
            ]},
            "server-groups": { "server-group": [
                { "name": "main-group", "deployments": { "deployment": { "name": "shop.war" } } },
                { "name": "other-group", "deployments": { "deployment": [
                    { "name": "shop.war", "enabled": "false" },
                    { "name": "batch.ear" }
                ] } }
            ]},
            "servers": { "server": { "name": "server-one" } }
        }));
        let diagnostics = Diagnostics::new();
        let joiner = Joiner::new(&tree);
        let plans = plan_applications(&joiner, &diagnostics);
        let node = tree.entries(Section::Servers)[0];

        let one = server(node, Some("main-group"));
        let attached: Vec<_> = plans
            .iter()
            .filter(|p| p.applies_to(&one, false))
            .map(|p| p.resolve_for(&one))
            .collect();
        assert_eq!(attached.len(), 1);
        assert_eq!(attached[0].context_path, "/shop");
        assert_eq!(attached[0].kind, "war");
        assert_eq!(attached[0].assignment_count, 2);
        assert_eq!(attached[0].source_path.as_deref(), Some("/opt/apps/shop.war"));
        assert!(attached[0].enabled);

        let other = server(node, Some("other-group"));
        let shop = plans[0].resolve_for(&other);
        assert!(!shop.enabled);
        assert_eq!(plans[1].resolve_for(&other).context_path, "/jobs");
    }

    #[test]
    fn test_cluster_target_attaches_to_members_only() {
        let tree = ConfigTree::new(json!({
            "clusters": { "cluster": { "name": "cluster1", "servers": { "server-name": ["ms1"] } } },
            "deployments": { "deployment": [
                { "name": "portal", "target-cluster": "cluster1" },
                { "name": "ghost", "target-cluster": "cluster9" },
                { "name": "admin.war", "targets": { "server": "adminServer" } }
            ]},
            "servers": { "server": [ { "name": "ms1" }, { "name": "adminServer" } ] }
        }));
        let diagnostics = Diagnostics::new();
        let joiner = Joiner::new(&tree);
        let plans = plan_applications(&joiner, &diagnostics);
        let nodes = tree.entries(Section::Servers);
        let ms1 = server(nodes[0], Some("cluster1"));
        let admin = server(nodes[1], None);

        assert!(plans[0].applies_to(&ms1, false));
        assert!(!plans[0].applies_to(&admin, false));
        assert!(!plans[1].applies_to(&ms1, true));
        assert!(plans[2].applies_to(&admin, false));
        assert_eq!(plans[0].resolve_for(&ms1).kind, "unknown");
        assert_eq!(diagnostics.count(DiagnosticKind::UnresolvedReference), 1);
    }
}
