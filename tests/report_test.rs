use mw_topology::utils::validation::Validate;
use mw_topology::{
    AssessmentRunner, HostSnapshot, LocalStorage, ReportFormat, ReportWriter, TopologyConfig,
};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

#[tokio::test]
async fn test_snapshot_to_csv_report() -> anyhow::Result<()> {
    let output = TempDir::new()?;
    let toml = format!(
        r#"
[resolver]
argument_match = "contains"

[probe]
kind = "snapshot"
concurrency = 2

[output]
format = "csv"
path = "{}"
"#,
        output.path().display()
    );
    let config = TopologyConfig::from_toml_str(&toml)?;
    config.validate()?;
    assert_eq!(config.output_format(), ReportFormat::Csv);

    let snapshot = HostSnapshot::load(&LocalStorage::new(FIXTURES), "was01.json").await?;
    let runner = AssessmentRunner::new(config.engine_settings(), config.probe_settings());
    let mut results = runner
        .assess_hosts(vec![snapshot], &CancellationToken::new())
        .await;
    let topology = results.remove(0).outcome?;

    let writer = ReportWriter::new(LocalStorage::new(config.output_path()), config.output_format());
    let path = writer.write(&topology).await?;
    assert_eq!(path, "was01-topology.csv");

    let csv = std::fs::read_to_string(Path::new(config.output_path()).join(&path))?;
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1], "was01,server-one,standard,http,tcp,9090,,,true");
    Ok(())
}

#[tokio::test]
async fn test_json_report_carries_instances_and_diagnostics() -> anyhow::Result<()> {
    let output = TempDir::new()?;
    let mut snapshot = HostSnapshot::load(&LocalStorage::new(FIXTURES), "was01.json").await?;
    snapshot.host = "was01-copy".to_string();

    let results = AssessmentRunner::default()
        .assess_hosts(vec![snapshot], &CancellationToken::new())
        .await;
    let topology = results[0].outcome.as_ref().map_err(|e| anyhow::anyhow!("{}", e))?;

    let writer = ReportWriter::new(LocalStorage::new(output.path()), ReportFormat::Json);
    let path = writer.write(topology).await?;

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.path().join(path))?)?;
    assert_eq!(written["host"], "was01-copy");
    assert_eq!(written["mode"], "domain");
    assert_eq!(written["complete"], true);
    assert_eq!(written["instances"][0]["name"], "server-one");
    assert_eq!(written["instances"][0]["listeners"][0]["port"], "9090");
    assert_eq!(written["instances"][0]["listeners"][0]["verified"], true);
    assert!(written["diagnostics"].as_array().is_some());
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected_before_any_work() {
    let config = TopologyConfig::from_toml_str("[resolver]\nargument_match = \"regex\"\n").unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("resolver.argument_match"));
}
