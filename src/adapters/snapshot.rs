//! Host snapshot documents.
//!
//! One JSON file per host: the configuration tree (already converted from XML by the collector)
//! and the runtime evidence captured at the same time.

use crate::domain::model::TopologyMode;
use crate::domain::ports::Storage;
use crate::domain::runtime::RuntimeContext;
use crate::domain::tree::ConfigTree;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub host: String,
    #[serde(default)]
    pub mode: Option<TopologyMode>,
    pub config: Value,
    #[serde(default)]
    pub runtime: RuntimeContext,
}

impl HostSnapshot {
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub async fn load<S: Storage>(storage: &S, path: &str) -> Result<Self> {
        let data = storage.read_file(path).await?;
        let snapshot: HostSnapshot = serde_json::from_slice(&data)?;
        tracing::debug!(
            "📥 Loaded snapshot for {} from {} ({} bound ports)",
            snapshot.host,
            path,
            snapshot.runtime.bound_port_count()
        );
        Ok(snapshot)
    }

    pub fn into_parts(self) -> (String, Option<TopologyMode>, ConfigTree, RuntimeContext) {
        (self.host, self.mode, ConfigTree::new(self.config), self.runtime)
    }
}
