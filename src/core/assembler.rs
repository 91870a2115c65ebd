//! Per-server assembly.
//!
//! Each declared server gets one [`InstanceBuilder`] that walks
//! `Discovered → HeapResolved → ListenersResolved → ResourcesResolved → ApplicationsResolved →
//! Finalized` strictly in that order; a stage can only be entered from the one before it.

use crate::core::applications::ApplicationPlan;
use crate::core::merge::merge;
use crate::core::offset::resolve_offset;
use crate::core::placeholder::PlaceholderResolver;
use crate::core::reconciler::{ReconcileScope, Reconciler};
use crate::core::resources::{datasources, thread_pools};
use crate::core::strategy::{
    with_host_jvm, JvmDeclaration, ServerEntry, StrategyContext, TopologyStrategy,
};
use crate::domain::model::{
    Datasource, DiagnosticKind, ResolvedApplication, ResolvedInstance, ResolvedListener,
    ThreadPool, TopologyMode,
};
use crate::domain::runtime::{ArgumentSource, RuntimeContext, RuntimeView};
use crate::domain::tree::{ConfigTree, Node, Section};
use crate::utils::error::{Result, TopologyError};
use std::collections::HashMap;
use std::fmt;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssemblyStage {
    Discovered,
    HeapResolved,
    ListenersResolved,
    ResourcesResolved,
    ApplicationsResolved,
    Finalized,
}

impl AssemblyStage {
    pub fn next(self) -> Option<Self> {
        match self {
            AssemblyStage::Discovered => Some(AssemblyStage::HeapResolved),
            AssemblyStage::HeapResolved => Some(AssemblyStage::ListenersResolved),
            AssemblyStage::ListenersResolved => Some(AssemblyStage::ResourcesResolved),
            AssemblyStage::ResourcesResolved => Some(AssemblyStage::ApplicationsResolved),
            AssemblyStage::ApplicationsResolved => Some(AssemblyStage::Finalized),
            AssemblyStage::Finalized => None,
        }
    }
}

impl fmt::Display for AssemblyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// JVM-related values of one instance, already resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeapSettings {
    pub min_heap: Option<String>,
    pub max_heap: Option<String>,
    pub max_metaspace: Option<String>,
    pub jvm_options: Vec<String>,
    pub run_user: Option<String>,
    pub java_version: Option<String>,
    pub java_vendor: Option<String>,
    pub bind_address: Option<String>,
}

/// 單一 instance 的組裝狀態，只屬於負責組裝它的 future
#[derive(Debug)]
pub struct InstanceBuilder {
    stage: AssemblyStage,
    instance: ResolvedInstance,
}

impl InstanceBuilder {
    pub fn discovered(
        name: &str,
        mode: TopologyMode,
        group: Option<String>,
        profile: Option<String>,
        socket_binding_group: Option<String>,
    ) -> Self {
        Self {
            stage: AssemblyStage::Discovered,
            instance: ResolvedInstance {
                name: name.to_string(),
                mode,
                group,
                profile,
                socket_binding_group,
                port_offset: 0,
                min_heap: None,
                max_heap: None,
                max_metaspace: None,
                jvm_options: Vec::new(),
                run_user: None,
                java_version: None,
                java_vendor: None,
                bind_address: None,
                auto_start: true,
                running: false,
                extensions: Vec::new(),
                listeners: Vec::new(),
                datasources: Vec::new(),
                thread_pools: Vec::new(),
                applications: Vec::new(),
                complete: false,
            },
        }
    }

    /// Lifecycle facts known at discovery: declared auto-start, observed process, loaded modules.
    pub fn with_lifecycle(
        mut self,
        auto_start: bool,
        running: bool,
        extensions: Vec<String>,
    ) -> Self {
        self.instance.auto_start = auto_start;
        self.instance.running = running;
        self.instance.extensions = extensions;
        self
    }

    pub fn stage(&self) -> AssemblyStage {
        self.stage
    }

    pub fn name(&self) -> &str {
        &self.instance.name
    }

    fn advance(&mut self, to: AssemblyStage) -> Result<()> {
        if self.stage.next() != Some(to) {
            return Err(TopologyError::InvalidTransition {
                instance: self.instance.name.clone(),
                from: self.stage.to_string(),
                to: to.to_string(),
            });
        }
        self.stage = to;
        Ok(())
    }

    pub fn resolve_heap(&mut self, heap: HeapSettings) -> Result<()> {
        self.advance(AssemblyStage::HeapResolved)?;
        self.instance.min_heap = heap.min_heap;
        self.instance.max_heap = heap.max_heap;
        self.instance.max_metaspace = heap.max_metaspace;
        self.instance.jvm_options = heap.jvm_options;
        self.instance.run_user = heap.run_user;
        self.instance.java_version = heap.java_version;
        self.instance.java_vendor = heap.java_vendor;
        self.instance.bind_address = heap.bind_address;
        Ok(())
    }

    pub fn resolve_listeners(
        &mut self,
        listeners: Vec<ResolvedListener>,
        port_offset: i64,
    ) -> Result<()> {
        self.advance(AssemblyStage::ListenersResolved)?;
        if let Some(first) = listeners.first() {
            self.instance.socket_binding_group = Some(first.socket_binding_group.clone());
        }
        self.instance.listeners = merge(listeners);
        self.instance.port_offset = port_offset;
        Ok(())
    }

    pub fn resolve_resources(
        &mut self,
        datasources: Vec<Datasource>,
        thread_pools: Vec<ThreadPool>,
    ) -> Result<()> {
        self.advance(AssemblyStage::ResourcesResolved)?;
        self.instance.datasources = datasources;
        self.instance.thread_pools = thread_pools;
        Ok(())
    }

    pub fn resolve_applications(&mut self, applications: Vec<ResolvedApplication>) -> Result<()> {
        self.advance(AssemblyStage::ApplicationsResolved)?;
        self.instance.applications = applications;
        Ok(())
    }

    pub fn finalize(mut self) -> Result<ResolvedInstance> {
        self.advance(AssemblyStage::Finalized)?;
        self.instance.complete = true;
        Ok(self.instance)
    }

    /// Freezes whatever has been resolved so far, flagged as incomplete.
    pub fn finalize_incomplete(mut self) -> ResolvedInstance {
        self.stage = AssemblyStage::Finalized;
        self.instance.complete = false;
        self.instance
    }
}

/// Shared, read-only inputs for assembling the instances of one host.
pub struct Assembler<'a> {
    pub strategy: &'a dyn TopologyStrategy,
    pub ctx: &'a StrategyContext<'a>,
    pub runtime: &'a RuntimeContext,
    pub resolver: PlaceholderResolver,
    pub reconciler: &'a Reconciler,
    pub applications: &'a [ApplicationPlan<'a>],
    pub cancel: &'a CancellationToken,
}

impl<'a> Assembler<'a> {
    pub async fn assemble_instance(&self, server: ServerEntry<'a>) -> Result<ResolvedInstance> {
        let mut builder = InstanceBuilder::discovered(
            &server.name,
            self.strategy.mode(),
            server.group.clone(),
            server.profile.clone(),
            server.socket_binding_group.clone(),
        )
        .with_lifecycle(
            server.auto_start,
            self.runtime.process_for(&server.name).is_some(),
            extension_modules(self.ctx.tree),
        );
        tracing::debug!("🔎 Discovered {} (group: {:?})", server.name, server.group);

        let view = self.runtime.view_for(&server.name);
        let interfaces = resolve_interfaces(self.ctx.tree, &self.resolver, &view);

        let shared = self.strategy.shared_jvm(self.ctx, &server);
        builder.resolve_heap(self.heap_settings(&server, shared.as_ref(), view, &interfaces))?;

        let declared = self.strategy.listener_declarations(self.ctx, &server);
        let port_offset = declared
            .iter()
            .find(|d| !d.fixed_port)
            .and_then(|d| d.offset.as_ref())
            .or(server.port_offset.as_ref())
            .map(|offset| resolve_offset(&self.resolver, offset, &view).0)
            .unwrap_or(0);

        let reconciliation = self
            .reconciler
            .reconcile(
                &declared,
                ReconcileScope {
                    source: &view,
                    interfaces: &interfaces,
                    diagnostics: self.ctx.diagnostics,
                    instance: Some(&server.name),
                    cancel: self.cancel,
                },
            )
            .await;
        builder.resolve_listeners(reconciliation.listeners, port_offset)?;

        if reconciliation.cancelled {
            self.ctx.diagnostics.record(
                Some(&server.name),
                "listeners",
                DiagnosticKind::Cancelled,
                "assembly cancelled while probing, instance is incomplete",
            );
            return Ok(builder.finalize_incomplete());
        }

        let (datasources, pools) = match self.strategy.profile(self.ctx, &server) {
            Some(profile) => (
                datasources(profile, &self.resolver, &view),
                thread_pools(profile, &self.resolver, &view),
            ),
            None => (Vec::new(), Vec::new()),
        };
        builder.resolve_resources(datasources, pools)?;

        let implicit = self.strategy.implicit_deployment_target();
        let applications = self
            .applications
            .iter()
            .filter(|plan| plan.applies_to(&server, implicit))
            .map(|plan| plan.resolve_for(&server))
            .collect();
        builder.resolve_applications(applications)?;

        let instance = builder.finalize()?;
        tracing::debug!(
            "✅ Finalized {}: {} listeners, {} datasources, {} applications",
            instance.name,
            instance.listeners.len(),
            instance.datasources.len(),
            instance.applications.len()
        );
        Ok(instance)
    }

    /// Server override wins over the shared settings; heap flags of the running process win
    /// over both.
    fn heap_settings(
        &self,
        server: &ServerEntry<'_>,
        shared: Option<&JvmDeclaration>,
        view: RuntimeView<'_>,
        interfaces: &HashMap<String, String>,
    ) -> HeapSettings {
        let declared = match (server.jvm.clone(), shared) {
            (Some(own), Some(shared)) => {
                let mut options = shared.options.clone();
                for option in &own.options {
                    if !options.contains(option) {
                        options.push(option.clone());
                    }
                }
                let mut merged = own.or(shared);
                merged.options = options;
                merged
            }
            (Some(own), None) => own,
            (None, Some(shared)) => shared.clone(),
            (None, None) => JvmDeclaration::default(),
        };
        // the server may name a host jvm the group never referenced
        let declared = with_host_jvm(self.ctx, declared);

        let resolve = |value: Option<String>| {
            value
                .map(|v| self.resolver.interpolate(&v, &view))
                .filter(|v| !v.is_empty())
        };
        let runtime_flag = |prefix: &str| {
            view.process_arguments()
                .iter()
                .rev()
                .find_map(|arg| arg.strip_prefix(prefix))
                .map(str::to_string)
        };

        let process = view.process();
        let bind_address = resolve(Some("${jboss.bind.address}".to_string()))
            .or_else(|| interfaces.get("public").cloned());

        HeapSettings {
            min_heap: runtime_flag("-Xms").or_else(|| resolve(declared.heap_size)),
            max_heap: runtime_flag("-Xmx").or_else(|| resolve(declared.max_heap_size)),
            max_metaspace: runtime_flag("-XX:MaxMetaspaceSize=")
                .or_else(|| resolve(declared.max_metaspace)),
            jvm_options: declared
                .options
                .iter()
                .map(|o| self.resolver.interpolate(o, &view))
                .collect(),
            run_user: process.and_then(|p| p.run_user.clone()),
            java_version: process.and_then(|p| p.java_version.clone()),
            java_vendor: process.and_then(|p| p.java_vendor.clone()),
            bind_address,
        }
    }
}

/// Modules of the host's `extensions/extension` entries, in declared order.
pub fn extension_modules(tree: &ConfigTree) -> Vec<String> {
    tree.entries(Section::Extensions)
        .into_iter()
        .filter_map(|extension| extension.attr_string("module"))
        .collect()
}

/// Address of every declared interface, resolved against `source`.
pub fn resolve_interfaces<S>(
    tree: &ConfigTree,
    resolver: &PlaceholderResolver,
    source: &S,
) -> HashMap<String, String>
where
    S: ArgumentSource + ?Sized,
{
    tree.entries(Section::Interfaces)
        .into_iter()
        .filter_map(|interface| {
            let name = interface.name()?;
            let address = interface_address(interface, resolver, source)?;
            (!address.is_empty()).then(|| (name.to_string(), address))
        })
        .collect()
}

fn interface_address<S>(
    interface: Node<'_>,
    resolver: &PlaceholderResolver,
    source: &S,
) -> Option<String>
where
    S: ArgumentSource + ?Sized,
{
    if let Some(inet) = interface.child("inet-address") {
        return inet
            .attr_string("value")
            .map(|v| resolver.interpolate(&v, source));
    }
    if interface.child("any-address").is_some() || interface.child("any-ipv4-address").is_some() {
        return Some("0.0.0.0".to_string());
    }
    interface.child("loopback-address").map(|loopback| {
        loopback
            .attr_string("value")
            .unwrap_or_else(|| "127.0.0.1".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_enforces_stage_order() {
        let mut builder =
            InstanceBuilder::discovered("server-one", TopologyMode::Domain, None, None, None);

        let err = builder.resolve_listeners(Vec::new(), 0).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidTransition { .. }));
        assert_eq!(builder.stage(), AssemblyStage::Discovered);

        builder.resolve_heap(HeapSettings::default()).unwrap();
        assert!(builder.resolve_heap(HeapSettings::default()).is_err());
        builder.resolve_listeners(Vec::new(), 0).unwrap();
        builder.resolve_resources(Vec::new(), Vec::new()).unwrap();
        builder.resolve_applications(Vec::new()).unwrap();

        let instance = builder.finalize().unwrap();
        assert!(instance.complete);
        assert_eq!(instance.name, "server-one");
    }

    #[test]
    fn test_incomplete_finalize_from_any_stage() {
        let mut builder =
            InstanceBuilder::discovered("server-two", TopologyMode::Standalone, None, None, None);
        builder.resolve_heap(HeapSettings::default()).unwrap();
        let instance = builder.finalize_incomplete();
        assert!(!instance.complete);
    }

    #[test]
    fn test_interfaces_resolve_against_source() {
        let tree = ConfigTree::new(json!({
            "interfaces": { "interface": [
                { "name": "public", "inet-address": { "value": "${jboss.bind.address:127.0.0.1}" } },
                { "name": "any", "any-address": {} },
                { "name": "unused" }
            ]}
        }));
        let source = vec!["-Djboss.bind.address=10.1.1.5".to_string()];
        let interfaces =
            resolve_interfaces(&tree, &PlaceholderResolver::default(), source.as_slice());

        assert_eq!(interfaces.get("public").map(String::as_str), Some("10.1.1.5"));
        assert_eq!(interfaces.get("any").map(String::as_str), Some("0.0.0.0"));
        assert!(!interfaces.contains_key("unused"));
    }
}
