use crate::core::applications::plan_applications;
use crate::core::assembler::{resolve_interfaces, Assembler};
use crate::core::diagnostics::Diagnostics;
use crate::core::merge::merge;
use crate::core::placeholder::{ArgumentMatch, PlaceholderResolver};
use crate::core::reconciler::{ReconcileScope, Reconciler};
use crate::core::strategy::{strategy_for, StrategyContext};
use crate::domain::model::{DiagnosticKind, ResolvedInstance, Topology, TopologyMode};
use crate::domain::ports::PortProbe;
use crate::domain::runtime::RuntimeContext;
use crate::domain::tree::ConfigTree;
use crate::utils::error::{Result, TopologyError};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_PROBE_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub argument_match: ArgumentMatch,
    pub probe_concurrency: usize,
    /// `None` detects the mode from the configuration tree.
    pub mode: Option<TopologyMode>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            argument_match: ArgumentMatch::default(),
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            mode: None,
        }
    }
}

/// 拓樸組裝引擎：一次處理一台主機
#[derive(Clone)]
pub struct TopologyEngine {
    probe: Arc<dyn PortProbe>,
    settings: EngineSettings,
}

impl TopologyEngine {
    pub fn new(probe: Arc<dyn PortProbe>) -> Self {
        Self {
            probe,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub async fn assemble(
        &self,
        tree: &ConfigTree,
        runtime: &RuntimeContext,
        host: &str,
    ) -> Result<Topology> {
        self.assemble_with_cancel(tree, runtime, host, &CancellationToken::new())
            .await
    }

    /// Cancelling `cancel` stops at the next probe boundary; what was resolved so far is
    /// returned with `complete = false`.
    pub async fn assemble_with_cancel(
        &self,
        tree: &ConfigTree,
        runtime: &RuntimeContext,
        host: &str,
        cancel: &CancellationToken,
    ) -> Result<Topology> {
        let mode = self.settings.mode.unwrap_or_else(|| TopologyMode::detect(tree));
        let strategy = strategy_for(mode);
        let resolver = PlaceholderResolver::new(self.settings.argument_match);
        let diagnostics = Diagnostics::new();

        tracing::info!("🚀 Assembling {} topology for {}", mode, host);

        let (instances, listeners, management_complete) = {
            let ctx = StrategyContext::new(tree, &diagnostics);
            let servers = strategy.discover(&ctx);
            if servers.is_empty() {
                return Err(TopologyError::NoServersDeclared {
                    host: host.to_string(),
                });
            }

            let limiter = Arc::new(Semaphore::new(self.settings.probe_concurrency.max(1)));
            let reconciler = Reconciler::new(Arc::clone(&self.probe), limiter, resolver);
            let applications = plan_applications(&ctx.joiner, &diagnostics);

            let assembler = Assembler {
                strategy: strategy.as_ref(),
                ctx: &ctx,
                runtime,
                resolver,
                reconciler: &reconciler,
                applications: &applications,
                cancel,
            };

            tracing::debug!("📋 {} servers declared", servers.len());
            let instances = join_all(
                servers
                    .into_iter()
                    .map(|server| assembler.assemble_instance(server)),
            )
            .await
            .into_iter()
            .collect::<Result<Vec<ResolvedInstance>>>()?;

            let host_view = runtime.view();
            let interfaces = resolve_interfaces(tree, &resolver, &host_view);
            let management = reconciler
                .reconcile(
                    &strategy.management_listeners(&ctx),
                    ReconcileScope {
                        source: &host_view,
                        interfaces: &interfaces,
                        diagnostics: &diagnostics,
                        instance: None,
                        cancel,
                    },
                )
                .await;
            if management.cancelled {
                diagnostics.record(
                    None,
                    "management",
                    DiagnosticKind::Cancelled,
                    "assembly cancelled while probing management interfaces",
                );
            }

            let listeners = merge(
                instances
                    .iter()
                    .flat_map(|instance| instance.listeners.iter().cloned())
                    .chain(management.listeners),
            );
            (instances, listeners, !management.cancelled)
        };

        let complete = management_complete && instances.iter().all(|i| i.complete);
        let topology = Topology {
            host: host.to_string(),
            mode,
            assessed_at: Utc::now(),
            instances,
            listeners,
            diagnostics: diagnostics.into_vec(),
            complete,
        };

        tracing::info!(
            "✅ {}: {} instances, {} listeners ({} verified), {} diagnostics{}",
            host,
            topology.instances.len(),
            topology.listeners.len(),
            topology.verified_listener_count(),
            topology.diagnostics.len(),
            if topology.complete { "" } else { " [incomplete]" }
        );

        Ok(topology)
    }
}

/// Assembles one host against its own recorded bound ports.
pub async fn assemble(tree: &ConfigTree, ctx: &RuntimeContext) -> Result<Vec<ResolvedInstance>> {
    let engine = TopologyEngine::new(Arc::new(ctx.clone()));
    let topology = engine.assemble(tree, ctx, "localhost").await?;
    Ok(topology.instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_no_servers_is_a_distinct_failure() {
        let tree = ConfigTree::new(json!({
            "server-groups": { "server-group": { "name": "main-group", "profile": "full" } }
        }));
        let ctx = RuntimeContext::default();

        let err = assemble(&tree, &ctx).await.unwrap_err();
        assert!(matches!(err, TopologyError::NoServersDeclared { .. }));

        let empty = ConfigTree::new(json!({ "servers": { "server": [] } }));
        let err = assemble(&empty, &ctx).await.unwrap_err();
        assert!(matches!(err, TopologyError::NoServersDeclared { .. }));
    }

    #[test]
    fn test_default_settings() {
        let settings = EngineSettings::default();
        assert_eq!(settings.probe_concurrency, DEFAULT_PROBE_CONCURRENCY);
        assert_eq!(settings.argument_match, ArgumentMatch::Contains);
        assert!(settings.mode.is_none());
    }

    #[test]
    fn test_engine_runs_on_blocking_executor() {
        let tree = ConfigTree::new(json!({ "servers": { "server": { "name": "standalone" } } }));
        let ctx = RuntimeContext::default();
        let instances = tokio_test::block_on(assemble(&tree, &ctx)).unwrap();
        assert_eq!(instances.len(), 1);
        assert!(instances[0].complete);
    }
}
