pub mod applications;
pub mod assembler;
pub mod diagnostics;
pub mod engine;
pub mod joiner;
pub mod merge;
pub mod offset;
pub mod placeholder;
pub mod reconciler;
pub mod resources;
pub mod strategy;

pub use crate::domain::ports::{PortProbe, Storage};
pub use crate::utils::error::Result;
