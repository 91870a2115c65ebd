//! Name-keyed joins between sibling configuration sections.
//!
//! Every join is a linear scan in declared order and the first entry wins. Configurations do not
//! guarantee unique names, so a second hit is reported as [`Join::Ambiguous`] instead of being
//! silently ignored or racing for a winner.

use crate::core::diagnostics::Diagnostics;
use crate::domain::model::DiagnosticKind;
use crate::domain::tree::{ConfigTree, Node, Section};

#[derive(Debug, Clone, Copy)]
pub enum Join<'a> {
    Found(Node<'a>),
    Ambiguous { first: Node<'a>, matches: usize },
    NotFound,
}

impl<'a> Join<'a> {
    pub fn entry(&self) -> Option<Node<'a>> {
        match self {
            Join::Found(node) | Join::Ambiguous { first: node, .. } => Some(*node),
            Join::NotFound => None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Join::Ambiguous { .. })
    }
}

/// First-match scan over a list of named entries.
pub fn join<'a>(entries: &[Node<'a>], key: &str) -> Join<'a> {
    let mut matching = entries.iter().filter(|entry| entry.name() == Some(key));
    let Some(first) = matching.next() else {
        return Join::NotFound;
    };

    match matching.count() {
        0 => Join::Found(*first),
        extra => Join::Ambiguous {
            first: *first,
            matches: extra + 1,
        },
    }
}

/// A named cluster and the concrete servers it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMembership {
    pub name: String,
    pub servers: Vec<String>,
}

impl ClusterMembership {
    pub fn contains(&self, server: &str) -> bool {
        self.servers.iter().any(|s| s == server)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Joiner<'a> {
    tree: &'a ConfigTree,
}

impl<'a> Joiner<'a> {
    pub fn new(tree: &'a ConfigTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &'a ConfigTree {
        self.tree
    }

    pub fn join(&self, section: Section, key: &str) -> Join<'a> {
        join(&self.tree.entries(section), key)
    }

    /// Join that records a diagnostic on a miss or an ambiguous hit and degrades to `None`.
    pub fn lookup(
        &self,
        section: Section,
        key: &str,
        diagnostics: &Diagnostics,
        instance: Option<&str>,
        field: &str,
    ) -> Option<Node<'a>> {
        match self.join(section, key) {
            Join::Found(node) => Some(node),
            Join::Ambiguous { first, matches } => {
                diagnostics.record(
                    instance,
                    field,
                    DiagnosticKind::AmbiguousMatch,
                    format!(
                        "{} entries named '{}' in {}, using the first one",
                        matches,
                        key,
                        section.label()
                    ),
                );
                Some(first)
            }
            Join::NotFound => {
                diagnostics.record(
                    instance,
                    field,
                    DiagnosticKind::UnresolvedReference,
                    format!("'{}' is not declared in {}", key, section.label()),
                );
                None
            }
        }
    }

    pub fn cluster(&self, name: &str) -> Option<ClusterMembership> {
        let node = self.join(Section::Clusters, name).entry()?;
        Some(ClusterMembership {
            name: name.to_string(),
            servers: cluster_servers(node),
        })
    }

    /// Every cluster in declared order.
    pub fn clusters(&self) -> Vec<ClusterMembership> {
        self.tree
            .entries(Section::Clusters)
            .into_iter()
            .filter_map(|node| {
                Some(ClusterMembership {
                    name: node.name()?.to_string(),
                    servers: cluster_servers(node),
                })
            })
            .collect()
    }

    /// Server-groups that deploy the application, in declared order.
    pub fn fan_out(&self, application: &str) -> Vec<Node<'a>> {
        self.tree
            .entries(Section::ServerGroups)
            .into_iter()
            .filter(|group| {
                group
                    .child("deployments")
                    .map(|deployments| {
                        deployments
                            .children("deployment")
                            .iter()
                            .any(|d| d.name() == Some(application))
                    })
                    .unwrap_or(false)
            })
            .collect()
    }
}

fn cluster_servers(node: Node<'_>) -> Vec<String> {
    match node.child("servers") {
        Some(servers) => {
            let mut names = servers.texts("server-name");
            if names.is_empty() {
                names = servers.texts("server");
            }
            names
        }
        None => node.texts("server"),
    }
}
