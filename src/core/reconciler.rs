//! Declared listeners against live evidence.
//!
//! Candidate ports are computed up front with the pure resolvers; only then are probes spawned.
//! Every probe result is stored under the identity of the listener that asked for it, so the
//! order in which probes finish never matters.

use crate::core::diagnostics::Diagnostics;
use crate::core::offset::{apply_offset, AppliedOffset, MAX_PORT};
use crate::core::placeholder::{PlaceholderResolver, SymbolicExpression};
use crate::domain::model::{DiagnosticKind, PortList, ResolvedListener};
use crate::domain::ports::PortProbe;
use crate::domain::runtime::{ArgumentSource, Protocol};
use crate::domain::tree::Node;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub struct ListenerDeclaration {
    pub socket_binding_group: String,
    pub name: String,
    pub protocol: Protocol,
    pub port: SymbolicExpression,
    pub offset: Option<SymbolicExpression>,
    pub interface: Option<String>,
    /// 固定埠號不套用 offset
    pub fixed_port: bool,
}

impl ListenerDeclaration {
    /// Reads one `socket-binding` element. Bindings without a port are not listeners.
    pub fn from_binding(
        socket_binding_group: &str,
        binding: Node<'_>,
        default_interface: Option<&str>,
        offset: Option<&SymbolicExpression>,
    ) -> Option<Self> {
        let name = binding.name()?;
        let multicast = binding.attr("multicast-address").is_some();
        // port 0 without a multicast port is chosen by the OS at bind time
        let port = match binding.attr_string("port") {
            Some(port) if port != "0" => port,
            _ if multicast => binding.attr_string("multicast-port")?,
            _ => return None,
        };

        let protocol = if multicast || name.to_ascii_lowercase().contains("udp") {
            Protocol::Udp
        } else {
            Protocol::Tcp
        };

        Some(Self {
            socket_binding_group: socket_binding_group.to_string(),
            name: name.to_string(),
            protocol,
            port: SymbolicExpression::parse(&port),
            offset: offset.cloned(),
            interface: binding
                .attr("interface")
                .or(default_interface)
                .map(str::to_string),
            fixed_port: binding
                .attr_string("fixed-port")
                .is_some_and(|fixed| fixed.eq_ignore_ascii_case("true")),
        })
    }

    fn candidate<S>(&self, resolver: &PlaceholderResolver, source: &S) -> AppliedOffset
    where
        S: ArgumentSource + ?Sized,
    {
        let offset = if self.fixed_port {
            None
        } else {
            self.offset.as_ref()
        };
        apply_offset(resolver, &self.port, offset, source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProbeKey {
    socket_binding_group: String,
    name: String,
    protocol: Protocol,
    port: u32,
}

/// Everything one reconciliation reads besides the declarations.
pub struct ReconcileScope<'a, S: ?Sized> {
    pub source: &'a S,
    /// Resolved address per interface name.
    pub interfaces: &'a HashMap<String, String>,
    pub diagnostics: &'a Diagnostics,
    pub instance: Option<&'a str>,
    pub cancel: &'a CancellationToken,
}

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub listeners: Vec<ResolvedListener>,
    pub cancelled: bool,
}

#[derive(Clone)]
pub struct Reconciler {
    probe: Arc<dyn PortProbe>,
    limiter: Arc<Semaphore>,
    resolver: PlaceholderResolver,
}

impl Reconciler {
    pub fn new(
        probe: Arc<dyn PortProbe>,
        limiter: Arc<Semaphore>,
        resolver: PlaceholderResolver,
    ) -> Self {
        Self {
            probe,
            limiter,
            resolver,
        }
    }

    pub async fn reconcile<S>(
        &self,
        declared: &[ListenerDeclaration],
        scope: ReconcileScope<'_, S>,
    ) -> Reconciliation
    where
        S: ArgumentSource + ?Sized,
    {
        let candidates: Vec<(&ListenerDeclaration, Option<ProbeKey>)> = declared
            .iter()
            .map(|declaration| {
                let applied = declaration.candidate(&self.resolver, scope.source);
                if !applied.offset_resolved {
                    scope.diagnostics.record(
                        scope.instance,
                        &format!("listeners.{}.offset", declaration.name),
                        DiagnosticKind::UnresolvedReference,
                        "port offset is not numeric, 0 used",
                    );
                }
                let key = match applied.resolved_port() {
                    Some(port) => Some(ProbeKey {
                        socket_binding_group: declaration.socket_binding_group.clone(),
                        name: declaration.name.clone(),
                        protocol: declaration.protocol,
                        port,
                    }),
                    None => {
                        let (kind, message) = match applied.port() {
                            None => (
                                DiagnosticKind::UnresolvedPort,
                                format!("port '{}' did not resolve to a number", declaration.port),
                            ),
                            Some(port) if applied.is_out_of_range() => (
                                DiagnosticKind::PortOutOfRange,
                                format!(
                                    "port '{}' with offset {} gives {}, outside 0..={}",
                                    declaration.port, applied.offset, port, MAX_PORT
                                ),
                            ),
                            Some(_) => (
                                DiagnosticKind::UnresolvedPort,
                                format!("port '{}' is assigned at runtime", declaration.port),
                            ),
                        };
                        scope.diagnostics.record(
                            scope.instance,
                            &format!("listeners.{}.port", declaration.name),
                            kind,
                            message,
                        );
                        None
                    }
                };
                (declaration, key)
            })
            .collect();

        let (results, cancelled) = self
            .probe_all(candidates.iter().filter_map(|(_, key)| key.clone()), &scope)
            .await;

        let listeners = candidates
            .into_iter()
            .map(|(declaration, key)| {
                let (port, verified) = match key {
                    Some(key) => (
                        PortList::single(key.port),
                        results.get(&key).copied().unwrap_or(false),
                    ),
                    None => (PortList::unresolved(), false),
                };
                ResolvedListener {
                    socket_binding_group: declaration.socket_binding_group.clone(),
                    name: declaration.name.clone(),
                    protocol: declaration.protocol,
                    port,
                    address: declaration
                        .interface
                        .as_ref()
                        .and_then(|name| scope.interfaces.get(name).cloned()),
                    interface: declaration.interface.clone(),
                    verified,
                }
            })
            .collect();

        Reconciliation {
            listeners,
            cancelled,
        }
    }

    async fn probe_all<S>(
        &self,
        keys: impl Iterator<Item = ProbeKey>,
        scope: &ReconcileScope<'_, S>,
    ) -> (HashMap<ProbeKey, bool>, bool)
    where
        S: ArgumentSource + ?Sized,
    {
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<Id, ProbeKey> = HashMap::new();

        for key in keys {
            if pending.values().any(|k| k == &key) {
                continue;
            }
            let probe = Arc::clone(&self.probe);
            let limiter = Arc::clone(&self.limiter);
            let task_key = key.clone();
            let handle = tasks.spawn(async move {
                // semaphore 關閉時照樣探測
                let _permit = limiter.acquire_owned().await.ok();
                let outcome = probe
                    .is_port_bound(task_key.protocol, task_key.port)
                    .await;
                (task_key, outcome)
            });
            pending.insert(handle.id(), key);
        }

        tracing::debug!(
            "🔌 Probing {} candidate ports with {} probe",
            pending.len(),
            self.probe.name()
        );

        let mut results = HashMap::new();
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;
                _ = scope.cancel.cancelled() => {
                    tasks.abort_all();
                    cancelled = true;
                    break;
                }
                next = tasks.join_next_with_id() => match next {
                    None => break,
                    Some(Ok((id, (key, outcome)))) => {
                        pending.remove(&id);
                        let bound = match outcome {
                            Ok(bound) => bound,
                            Err(e) => {
                                scope.diagnostics.record(
                                    scope.instance,
                                    &format!("listeners.{}", key.name),
                                    DiagnosticKind::ProbeFailure,
                                    e.to_string(),
                                );
                                false
                            }
                        };
                        results.insert(key, bound);
                    }
                    Some(Err(e)) => {
                        let name = pending
                            .remove(&e.id())
                            .map(|key| key.name)
                            .unwrap_or_default();
                        scope.diagnostics.record(
                            scope.instance,
                            &format!("listeners.{}", name),
                            DiagnosticKind::ProbeFailure,
                            format!("probe task failed: {}", e),
                        );
                    }
                }
            }
        }

        (results, cancelled)
    }
}
