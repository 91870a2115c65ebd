//! Multi-host assessment.
//!
//! Every host is assembled in its own tokio task with a child cancellation token, so a host that
//! fails (no servers declared, a panicking task) never takes the others down with it.

use crate::adapters::probe::{ProbeKind, ProbeSettings, TcpConnectProbe};
use crate::adapters::snapshot::HostSnapshot;
use crate::core::engine::{EngineSettings, TopologyEngine};
use crate::domain::model::Topology;
use crate::domain::ports::PortProbe;
use crate::domain::runtime::RuntimeContext;
use crate::utils::error::{Result, TopologyError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::{Id, JoinSet};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct HostAssessment {
    pub host: String,
    pub outcome: Result<Topology>,
}

impl HostAssessment {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssessmentRunner {
    settings: EngineSettings,
    probe: ProbeSettings,
}

impl AssessmentRunner {
    pub fn new(settings: EngineSettings, probe: ProbeSettings) -> Self {
        Self { settings, probe }
    }

    /// 依設定選擇探測方式
    pub fn probe_for(&self, host: &str, runtime: &RuntimeContext) -> Arc<dyn PortProbe> {
        match self.probe.kind {
            ProbeKind::Snapshot => Arc::new(runtime.clone()),
            ProbeKind::Tcp => Arc::new(TcpConnectProbe::new(
                self.probe.address.as_deref().unwrap_or(host),
                self.probe.timeout,
            )),
        }
    }

    /// Results come back in the order the snapshots were given.
    pub async fn assess_hosts(
        &self,
        snapshots: Vec<HostSnapshot>,
        cancel: &CancellationToken,
    ) -> Vec<HostAssessment> {
        let mut tasks = JoinSet::new();
        let mut hosts: HashMap<Id, (usize, String)> = HashMap::new();
        let mut outcomes: Vec<Option<HostAssessment>> = Vec::with_capacity(snapshots.len());

        tracing::info!("🚀 Assessing {} hosts", snapshots.len());

        for (index, snapshot) in snapshots.into_iter().enumerate() {
            outcomes.push(None);
            let (host, mode, tree, runtime) = snapshot.into_parts();
            let settings = EngineSettings {
                mode: self.settings.mode.or(mode),
                ..self.settings
            };
            let engine = TopologyEngine::new(self.probe_for(&host, &runtime)).with_settings(settings);
            let token = cancel.child_token();
            let task_host = host.clone();

            let handle = tasks.spawn(async move {
                engine
                    .assemble_with_cancel(&tree, &runtime, &task_host, &token)
                    .await
            });
            hosts.insert(handle.id(), (index, host));
        }

        while let Some(next) = tasks.join_next_with_id().await {
            let (id, outcome) = match next {
                Ok((id, outcome)) => (id, Ok(outcome)),
                Err(e) => (e.id(), Err(e.to_string())),
            };
            let Some((index, host)) = hosts.remove(&id) else {
                continue;
            };
            let outcome = outcome.unwrap_or_else(|message| {
                Err(TopologyError::HostTaskFailed {
                    host: host.clone(),
                    message,
                })
            });

            if let Err(e) = &outcome {
                tracing::error!("❌ {}: {}", host, e);
            }
            outcomes[index] = Some(HostAssessment { host, outcome });
        }

        outcomes.into_iter().flatten().collect()
    }
}
