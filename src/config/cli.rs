use crate::config::toml_config::{AssemblyConfig, OutputConfig, ProbeConfig, ResolverConfig, TopologyConfig};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "mw-topology")]
#[command(about = "Resolve the effective middleware topology of collected host snapshots")]
pub struct CliArgs {
    /// Host snapshot files (JSON), one per host
    #[arg(short, long = "snapshot", required = true, num_args = 1..)]
    pub snapshots: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Report format
    #[arg(long, value_parser = ["json", "csv"])]
    pub format: Option<String>,

    /// Output directory for reports
    #[arg(short, long)]
    pub output: Option<String>,

    /// How listeners are verified
    #[arg(long, value_parser = ["snapshot", "tcp"])]
    pub probe: Option<String>,

    /// Force a topology mode instead of detecting it per host
    #[arg(long, value_parser = ["auto", "domain", "standalone", "cluster"])]
    pub mode: Option<String>,

    /// How `-D` arguments are matched against placeholder properties
    #[arg(long, value_parser = ["contains", "boundary"])]
    pub argument_match: Option<String>,

    /// Maximum concurrent port probes per host
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Dry run - show what would be assessed without probing or writing reports
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// 命令列參數覆蓋設定檔
    pub fn apply_to(&self, config: &mut TopologyConfig) {
        if let Some(format) = &self.format {
            config.output.get_or_insert_with(OutputConfig::default).format = Some(format.clone());
        }
        if let Some(output) = &self.output {
            config.output.get_or_insert_with(OutputConfig::default).path = Some(output.clone());
        }
        if let Some(probe) = &self.probe {
            config.probe.get_or_insert_with(ProbeConfig::default).kind = Some(probe.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.probe.get_or_insert_with(ProbeConfig::default).concurrency = Some(concurrency);
        }
        if let Some(mode) = &self.mode {
            config.assembly.get_or_insert_with(AssemblyConfig::default).mode = Some(mode.clone());
        }
        if let Some(matching) = &self.argument_match {
            config
                .resolver
                .get_or_insert_with(ResolverConfig::default)
                .argument_match = Some(matching.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::report::ReportFormat;
    use crate::domain::model::TopologyMode;

    #[test]
    fn test_overrides_replace_file_values() {
        let args = CliArgs::try_parse_from([
            "mw-topology",
            "--snapshot",
            "was01.json",
            "was02.json",
            "--format",
            "csv",
            "--mode",
            "standalone",
        ])
        .unwrap();
        assert_eq!(args.snapshots, vec!["was01.json", "was02.json"]);

        let mut config =
            TopologyConfig::from_toml_str("[output]\nformat = \"json\"\npath = \"./keep\"\n").unwrap();
        args.apply_to(&mut config);

        assert_eq!(config.output_format(), ReportFormat::Csv);
        assert_eq!(config.output_path(), "./keep");
        assert_eq!(config.mode(), Some(TopologyMode::Standalone));
    }

    #[test]
    fn test_snapshot_is_required() {
        assert!(CliArgs::try_parse_from(["mw-topology"]).is_err());
        assert!(CliArgs::try_parse_from(["mw-topology", "-s", "a.json", "--probe", "icmp"]).is_err());
    }
}
