use crate::domain::runtime::{Protocol, RuntimeContext};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 確認某個埠號是否真的有在監聽
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn is_port_bound(&self, protocol: Protocol, port: u32) -> Result<bool>;

    fn name(&self) -> &str {
        "probe"
    }
}

/// The recorded snapshot answers probes without touching the network.
#[async_trait]
impl PortProbe for RuntimeContext {
    async fn is_port_bound(&self, protocol: Protocol, port: u32) -> Result<bool> {
        Ok(RuntimeContext::is_port_bound(self, protocol, port))
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}
