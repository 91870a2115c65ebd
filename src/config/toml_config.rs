use crate::adapters::probe::{ProbeKind, ProbeSettings};
use crate::adapters::report::ReportFormat;
use crate::core::engine::{EngineSettings, DEFAULT_PROBE_CONCURRENCY};
use crate::core::placeholder::ArgumentMatch;
use crate::domain::model::TopologyMode;
use crate::utils::error::{Result, TopologyError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_OUTPUT_PATH: &str = "./topology-output";
const DEFAULT_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub resolver: Option<ResolverConfig>,
    pub probe: Option<ProbeConfig>,
    pub assembly: Option<AssemblyConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub argument_match: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub kind: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyConfig {
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: Option<String>,
    pub path: Option<String>,
}

impl TopologyConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TopologyError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PROBE_ADDRESS})，找不到的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| {
            TopologyError::ConfigError {
                message: format!("environment substitution pattern: {}", e),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if let Some(matching) = self.resolver.as_ref().and_then(|r| r.argument_match.as_deref()) {
            validation::validate_one_of("resolver.argument_match", matching, &["contains", "boundary"])?;
        }

        if let Some(probe) = &self.probe {
            if let Some(kind) = probe.kind.as_deref() {
                validation::validate_one_of("probe.kind", kind, &["snapshot", "tcp"])?;
            }
            if let Some(concurrency) = probe.concurrency {
                validation::validate_range("probe.concurrency", concurrency, 1, 1024)?;
            }
            if let Some(timeout) = probe.timeout_ms {
                validation::validate_range("probe.timeout_ms", timeout, 1, 60_000)?;
            }
            if let Some(address) = probe.address.as_deref() {
                validation::validate_non_empty_string("probe.address", address)?;
            }
        }

        if let Some(mode) = self.assembly.as_ref().and_then(|a| a.mode.as_deref()) {
            validation::validate_one_of(
                "assembly.mode",
                mode,
                &["auto", "domain", "standalone", "cluster"],
            )?;
        }

        if let Some(output) = &self.output {
            if let Some(format) = output.format.as_deref() {
                validation::validate_one_of("output.format", format, &["json", "csv"])?;
            }
            if let Some(path) = output.path.as_deref() {
                validation::validate_path("output.path", path)?;
            }
        }

        Ok(())
    }

    pub fn argument_match(&self) -> ArgumentMatch {
        match self.resolver.as_ref().and_then(|r| r.argument_match.as_deref()) {
            Some("boundary") => ArgumentMatch::Boundary,
            _ => ArgumentMatch::Contains,
        }
    }

    pub fn probe_kind(&self) -> ProbeKind {
        match self.probe.as_ref().and_then(|p| p.kind.as_deref()) {
            Some("tcp") => ProbeKind::Tcp,
            _ => ProbeKind::Snapshot,
        }
    }

    pub fn probe_concurrency(&self) -> usize {
        self.probe
            .as_ref()
            .and_then(|p| p.concurrency)
            .unwrap_or(DEFAULT_PROBE_CONCURRENCY)
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        let probe = self.probe.as_ref();
        ProbeSettings {
            kind: self.probe_kind(),
            timeout: Duration::from_millis(
                probe.and_then(|p| p.timeout_ms).unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
            address: probe.and_then(|p| p.address.clone()),
        }
    }

    /// `None` means detect the mode per host.
    pub fn mode(&self) -> Option<TopologyMode> {
        match self.assembly.as_ref().and_then(|a| a.mode.as_deref()) {
            Some("domain") => Some(TopologyMode::Domain),
            Some("standalone") => Some(TopologyMode::Standalone),
            Some("cluster") => Some(TopologyMode::ClusterBased),
            _ => None,
        }
    }

    pub fn output_format(&self) -> ReportFormat {
        self.output
            .as_ref()
            .and_then(|o| o.format.as_deref())
            .and_then(|f| f.parse().ok())
            .unwrap_or_default()
    }

    pub fn output_path(&self) -> &str {
        self.output
            .as_ref()
            .and_then(|o| o.path.as_deref())
            .unwrap_or(DEFAULT_OUTPUT_PATH)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            argument_match: self.argument_match(),
            probe_concurrency: self.probe_concurrency(),
            mode: self.mode(),
        }
    }
}

impl Validate for TopologyConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
