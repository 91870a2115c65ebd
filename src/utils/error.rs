use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("No servers declared for host '{host}'")]
    NoServersDeclared { host: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV report error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Port probe failed for {protocol}/{port}: {message}")]
    ProbeError {
        protocol: String,
        port: u32,
        message: String,
    },

    #[error("Assessment of host '{host}' did not finish: {message}")]
    HostTaskFailed { host: String, message: String },

    #[error("Instance '{instance}' cannot move from {from} to {to}")]
    InvalidTransition {
        instance: String,
        from: String,
        to: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl TopologyError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TopologyError::ProbeError { .. } => ErrorSeverity::Low,
            TopologyError::NoServersDeclared { .. } => ErrorSeverity::Medium,
            TopologyError::IoError(_)
            | TopologyError::SerializationError(_)
            | TopologyError::CsvError(_) => ErrorSeverity::High,
            TopologyError::ConfigError { .. }
            | TopologyError::ConfigValidationError { .. }
            | TopologyError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            TopologyError::HostTaskFailed { .. } => ErrorSeverity::High,
            TopologyError::InvalidTransition { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TopologyError::NoServersDeclared { .. } => {
                "Check that the collected configuration contains a <servers> section for this host"
            }
            TopologyError::IoError(_) => "Check that the file exists and is readable",
            TopologyError::SerializationError(_) => {
                "Check that the snapshot file is valid JSON in the expected layout"
            }
            TopologyError::CsvError(_) => "Check that the output directory is writable",
            TopologyError::ConfigError { .. }
            | TopologyError::ConfigValidationError { .. }
            | TopologyError::InvalidConfigValueError { .. } => {
                "Fix the value in the TOML configuration file or the command line"
            }
            TopologyError::ProbeError { .. } => {
                "The listener is kept as unverified; check network reachability of the host"
            }
            TopologyError::HostTaskFailed { .. } => {
                "Re-run this host alone with --verbose to see where it stopped"
            }
            TopologyError::InvalidTransition { .. } => "This is a bug, please report it",
        }
    }
}

pub type Result<T> = std::result::Result<T, TopologyError>;
