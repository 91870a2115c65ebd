pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{HostSnapshot, LocalStorage, ReportFormat, ReportWriter};
pub use app::{AssessmentRunner, HostAssessment};
pub use config::TopologyConfig;
pub use core::engine::{assemble, EngineSettings, TopologyEngine};
pub use core::placeholder::{ArgumentMatch, PlaceholderResolver, SymbolicExpression};
pub use domain::model::{
    Diagnostic, DiagnosticKind, PortList, ResolvedApplication, ResolvedInstance, ResolvedListener,
    Topology, TopologyMode,
};
pub use domain::runtime::{BoundPort, ProcessSnapshot, Protocol, RuntimeContext};
pub use domain::tree::ConfigTree;
pub use utils::error::{Result, TopologyError};
