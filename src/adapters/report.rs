use crate::domain::model::Topology;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, TopologyError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = TopologyError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(TopologyError::InvalidConfigValueError {
                field: "output.format".to_string(),
                value: other.to_string(),
                reason: "Valid values: json, csv".to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct ListenerRow<'a> {
    host: &'a str,
    instance: &'a str,
    socket_binding_group: &'a str,
    name: &'a str,
    protocol: String,
    port: String,
    interface: &'a str,
    address: &'a str,
    verified: bool,
}

pub fn render_json(topology: &Topology) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(topology)?)
}

/// One row per instance listener, then host-level listeners that belong to no instance.
pub fn render_listener_csv(topology: &Topology) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for instance in &topology.instances {
        for listener in &instance.listeners {
            writer.serialize(ListenerRow {
                host: &topology.host,
                instance: &instance.name,
                socket_binding_group: &listener.socket_binding_group,
                name: &listener.name,
                protocol: listener.protocol.to_string(),
                port: listener.port.to_string(),
                interface: listener.interface.as_deref().unwrap_or(""),
                address: listener.address.as_deref().unwrap_or(""),
                verified: listener.verified,
            })?;
        }
    }

    let host_only = topology.listeners.iter().filter(|listener| {
        !topology.instances.iter().any(|i| {
            i.listeners.iter().any(|l| {
                l.socket_binding_group == listener.socket_binding_group && l.name == listener.name
            })
        })
    });
    for listener in host_only {
        writer.serialize(ListenerRow {
            host: &topology.host,
            instance: "",
            socket_binding_group: &listener.socket_binding_group,
            name: &listener.name,
            protocol: listener.protocol.to_string(),
            port: listener.port.to_string(),
            interface: listener.interface.as_deref().unwrap_or(""),
            address: listener.address.as_deref().unwrap_or(""),
            verified: listener.verified,
        })?;
    }

    writer
        .into_inner()
        .map_err(|e| TopologyError::IoError(e.into_error()))
}

/// 將拓樸結果寫到 Storage
pub struct ReportWriter<S: Storage> {
    storage: S,
    format: ReportFormat,
}

impl<S: Storage> ReportWriter<S> {
    pub fn new(storage: S, format: ReportFormat) -> Self {
        Self { storage, format }
    }

    pub fn file_name(&self, host: &str) -> String {
        let safe: String = host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        format!("{}-topology.{}", safe, self.format.extension())
    }

    /// Returns the storage-relative path that was written.
    pub async fn write(&self, topology: &Topology) -> Result<String> {
        let data = match self.format {
            ReportFormat::Json => render_json(topology)?,
            ReportFormat::Csv => render_listener_csv(topology)?,
        };
        let path = self.file_name(&topology.host);

        tracing::debug!("💾 Writing {} ({} bytes)", path, data.len());
        self.storage.write_file(&path, &data).await?;
        Ok(path)
    }
}
