use crate::domain::ports::PortProbe;
use crate::domain::runtime::Protocol;
use crate::utils::error::{Result, TopologyError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::net::TcpStream;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// Answer from the bound ports recorded in the snapshot.
    #[default]
    Snapshot,
    /// Connect to the host over TCP.
    Tcp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub kind: ProbeKind,
    pub timeout: Duration,
    /// Overrides the snapshot host name as the connect target.
    pub address: Option<String>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            kind: ProbeKind::Snapshot,
            timeout: Duration::from_millis(500),
            address: None,
        }
    }
}

/// 以 TCP 連線確認埠號是否在監聽
#[derive(Debug, Clone)]
pub struct TcpConnectProbe {
    address: String,
    timeout: Duration,
}

impl TcpConnectProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    fn failure(protocol: Protocol, port: u32, message: impl Into<String>) -> TopologyError {
        TopologyError::ProbeError {
            protocol: protocol.to_string(),
            port,
            message: message.into(),
        }
    }
}

#[async_trait]
impl PortProbe for TcpConnectProbe {
    async fn is_port_bound(&self, protocol: Protocol, port: u32) -> Result<bool> {
        if protocol == Protocol::Udp {
            return Err(Self::failure(
                protocol,
                port,
                "UDP listeners cannot be confirmed by a connect probe",
            ));
        }
        let port16 = u16::try_from(port)
            .map_err(|_| Self::failure(protocol, port, "port is out of range"))?;

        match tokio::time::timeout(
            self.timeout,
            TcpStream::connect((self.address.as_str(), port16)),
        )
        .await
        {
            Ok(Ok(_stream)) => Ok(true),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Ok(false),
            Ok(Err(e)) => Err(Self::failure(protocol, port, e.to_string())),
            Err(_) => Err(Self::failure(
                protocol,
                port,
                format!("no answer from {} within {:?}", self.address, self.timeout),
            )),
        }
    }

    fn name(&self) -> &str {
        "tcp"
    }
}
