// Adapters layer: snapshot loading, live probing, report output and local storage.

pub mod probe;
pub mod report;
pub mod snapshot;
pub mod storage;

pub use probe::{ProbeKind, ProbeSettings, TcpConnectProbe};
pub use report::{ReportFormat, ReportWriter};
pub use snapshot::HostSnapshot;
pub use storage::LocalStorage;
