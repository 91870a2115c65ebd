//! Read-only view over a collected configuration document.
//!
//! The upstream collector converts the XML configuration into JSON: attributes become string
//! fields, an element that appears once becomes an object and an element that repeats becomes an
//! array. [`Node::children`] hides that difference so callers always iterate a list.

use serde_json::Value;

/// Named top-level sections of a configuration tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Profiles,
    ServerGroups,
    SocketBindingGroups,
    Servers,
    Interfaces,
    Deployments,
    Clusters,
    Jvms,
    Extensions,
}

impl Section {
    /// Path of the repeated entry element inside the section.
    pub fn path(&self) -> &'static str {
        match self {
            Section::Profiles => "/profiles/profile",
            Section::ServerGroups => "/server-groups/server-group",
            Section::SocketBindingGroups => "/socket-binding-groups/socket-binding-group",
            Section::Servers => "/servers/server",
            Section::Interfaces => "/interfaces/interface",
            Section::Deployments => "/deployments/deployment",
            Section::Clusters => "/clusters/cluster",
            Section::Jvms => "/jvms/jvm",
            Section::Extensions => "/extensions/extension",
        }
    }

    /// Path of the section container itself.
    pub fn root(&self) -> &'static str {
        let path = self.path();
        match path[1..].find('/') {
            Some(idx) => &path[..idx + 1],
            None => path,
        }
    }

    pub fn label(&self) -> &'static str {
        &self.root()[1..]
    }
}

#[derive(Debug, Clone)]
pub struct ConfigTree {
    root: Value,
}

impl ConfigTree {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn from_json_str(content: &str) -> crate::utils::error::Result<Self> {
        Ok(Self::new(serde_json::from_str(content)?))
    }

    pub fn root(&self) -> Node<'_> {
        Node { value: &self.root }
    }

    /// Structural lookup; `None` means the path is missing.
    pub fn at(&self, path: &str) -> Option<Node<'_>> {
        self.root().at(path)
    }

    pub fn has_section(&self, section: Section) -> bool {
        self.at(section.root()).is_some()
    }

    /// Entries of a section in declared order. An absent section yields an empty list.
    pub fn entries(&self, section: Section) -> Vec<Node<'_>> {
        let (parent, leaf) = split_leaf(section.path());
        self.at(parent)
            .map(|node| node.children(leaf))
            .unwrap_or_default()
    }
}

fn split_leaf(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    value: &'a Value,
}

impl<'a> Node<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &'a Value {
        self.value
    }

    pub fn at(&self, path: &str) -> Option<Node<'a>> {
        let pointer = if path.is_empty() || path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        self.value.pointer(&pointer).map(Node::new)
    }

    pub fn child(&self, key: &str) -> Option<Node<'a>> {
        match self.value {
            Value::Object(map) => map.get(key).map(Node::new),
            _ => None,
        }
    }

    /// Repeated child elements, normalizing the single-object form into a one-element list.
    pub fn children(&self, key: &str) -> Vec<Node<'a>> {
        match self.child(key).map(|node| node.value) {
            Some(Value::Array(items)) => items.iter().map(Node::new).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![Node::new(other)],
        }
    }

    /// Scalar attribute as text. Numbers and booleans are rendered, empty strings count as absent.
    pub fn attr(&self, key: &str) -> Option<&'a str> {
        self.child(key).and_then(|node| node.as_text())
    }

    pub fn attr_string(&self, key: &str) -> Option<String> {
        match self.child(key).map(|node| node.value) {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Some(Value::Number(number)) => Some(number.to_string()),
            Some(Value::Bool(flag)) => Some(flag.to_string()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&'a str> {
        match self.value {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim()),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&'a str> {
        self.attr("name")
    }

    /// Reference-style attribute: either `"key": "target"` or `"key": { "ref": "target" }`.
    pub fn reference(&self, key: &str) -> Option<String> {
        let node = self.child(key)?;
        match node.value {
            Value::Object(_) => node.attr_string("ref").or_else(|| node.attr_string("name")),
            _ => self.attr_string(key),
        }
    }

    /// Depth-first search for the first descendant stored under `key`.
    pub fn find(&self, key: &str) -> Option<Node<'a>> {
        match self.value {
            Value::Object(map) => {
                if let Some(found) = map.get(key) {
                    return Some(Node::new(found));
                }
                map.values().find_map(|value| Node::new(value).find(key))
            }
            Value::Array(items) => items.iter().find_map(|value| Node::new(value).find(key)),
            _ => None,
        }
    }

    /// Every descendant element stored under a key accepted by `matches`, in document order.
    pub fn find_all<F>(&self, matches: F) -> Vec<(&'a str, Node<'a>)>
    where
        F: Fn(&str) -> bool + Copy,
    {
        let mut found = Vec::new();
        collect_matching(self.value, matches, &mut found);
        found
    }

    /// Scalar strings of a repeated child: `"server-name": ["a", "b"]` or `"server-name": "a"`.
    pub fn texts(&self, key: &str) -> Vec<String> {
        self.children(key)
            .into_iter()
            .filter_map(|node| match node.value {
                Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
                Value::Object(_) => node.attr_string("name").or_else(|| node.attr_string("value")),
                _ => None,
            })
            .collect()
    }
}

fn collect_matching<'a, F>(value: &'a Value, matches: F, found: &mut Vec<(&'a str, Node<'a>)>)
where
    F: Fn(&str) -> bool + Copy,
{
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if matches(key) {
                    match child {
                        Value::Array(items) => {
                            found.extend(items.iter().map(|item| (key.as_str(), Node::new(item))))
                        }
                        other => found.push((key.as_str(), Node::new(other))),
                    }
                } else {
                    collect_matching(child, matches, found);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_matching(item, matches, found);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entries_normalize_single_and_repeated_elements() {
        let tree = ConfigTree::new(json!({
            "server-groups": { "server-group": { "name": "main-group" } },
            "servers": { "server": [ { "name": "a" }, { "name": "b" } ] }
        }));

        let groups = tree.entries(Section::ServerGroups);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name(), Some("main-group"));

        let servers: Vec<_> = tree
            .entries(Section::Servers)
            .iter()
            .filter_map(|node| node.name())
            .collect();
        assert_eq!(servers, vec!["a", "b"]);

        assert!(tree.entries(Section::Profiles).is_empty());
        assert!(!tree.has_section(Section::Profiles));
        assert!(tree.has_section(Section::Servers));
    }

    #[test]
    fn test_reference_accepts_text_and_ref_object() {
        let tree = ConfigTree::new(json!({
            "a": { "socket-binding-group": { "ref": "standard", "port-offset": "100" } },
            "b": { "socket-binding-group": "full-sockets" }
        }));

        let a = tree.at("/a").unwrap();
        let b = tree.at("/b").unwrap();
        assert_eq!(a.reference("socket-binding-group").as_deref(), Some("standard"));
        assert_eq!(b.reference("socket-binding-group").as_deref(), Some("full-sockets"));
        assert_eq!(a.find("port-offset").and_then(|n| n.as_text()), Some("100"));
    }

    #[test]
    fn test_find_all_walks_document_order() {
        let tree = ConfigTree::new(json!({
            "subsystem": [
                { "thread-pool": { "name": "default" } },
                { "bounded-queue-thread-pool": [ { "name": "q1" }, { "name": "q2" } ] }
            ]
        }));

        let pools = tree.root().find_all(|key| key.ends_with("thread-pool"));
        let names: Vec<_> = pools.iter().filter_map(|(_, n)| n.name()).collect();
        assert_eq!(names, vec!["default", "q1", "q2"]);
    }

    #[test]
    fn test_section_paths() {
        assert_eq!(Section::ServerGroups.root(), "/server-groups");
        assert_eq!(Section::ServerGroups.label(), "server-groups");
        assert_eq!(Section::Jvms.path(), "/jvms/jvm");
        assert_eq!(Section::Extensions.label(), "extensions");
    }
}
