use anyhow::Context;
use clap::Parser;
use mw_topology::config::CliArgs;
use mw_topology::utils::error::ErrorSeverity;
use mw_topology::utils::{logger, validation::Validate};
use mw_topology::{AssessmentRunner, HostSnapshot, LocalStorage, ReportWriter, TopologyConfig};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting mw-topology");

    // 載入 TOML 配置
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            match TopologyConfig::from_file(path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ Failed to load config file '{}': {}", path, e);
                    eprintln!("💡 {}", e.recovery_suggestion());
                    std::process::exit(2);
                }
            }
        }
        None => TopologyConfig::default(),
    };

    // 應用命令列覆蓋設定
    args.apply_to(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(2);
    }

    let storage = LocalStorage::new(".");
    let mut snapshots = Vec::with_capacity(args.snapshots.len());
    for path in &args.snapshots {
        match HostSnapshot::load(&storage, path).await {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(e) => {
                tracing::error!("❌ Cannot load snapshot {}: {}", path, e);
                eprintln!("❌ {}: {}", path, e);
                eprintln!("💡 建議: {}", e.recovery_suggestion());
                std::process::exit(exit_code(e.severity()).max(1));
            }
        }
    }

    display_config_summary(&config, &snapshots, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No probing or report output will occur");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("⚠️ Interrupted, finishing with partial results");
            ctrl_c.cancel();
        }
    });

    let runner = AssessmentRunner::new(config.engine_settings(), config.probe_settings());
    let assessments = runner.assess_hosts(snapshots, &cancel).await;

    let writer = ReportWriter::new(LocalStorage::new(config.output_path()), config.output_format());
    let mut failures = 0;

    for assessment in &assessments {
        match &assessment.outcome {
            Ok(topology) => {
                let path = writer
                    .write(topology)
                    .await
                    .with_context(|| format!("writing report for {}", assessment.host))?;
                println!(
                    "✅ {}: {} instances, {} listeners, {} diagnostics{} -> {}/{}",
                    topology.host,
                    topology.instances.len(),
                    topology.listeners.len(),
                    topology.diagnostics.len(),
                    if topology.complete { "" } else { " (incomplete)" },
                    config.output_path(),
                    path
                );
            }
            Err(e) => {
                failures += 1;
                tracing::error!(
                    "❌ {} failed: {} (Severity: {:?})",
                    assessment.host,
                    e,
                    e.severity()
                );
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
                eprintln!("❌ {}: {}", assessment.host, e);
                eprintln!("💡 建議: {}", e.recovery_suggestion());
            }
        }
    }

    if failures > 0 {
        tracing::error!("❌ {} of {} hosts failed", failures, assessments.len());
        std::process::exit(1);
    }

    tracing::info!("✅ All {} hosts assessed", assessments.len());
    Ok(())
}

/// 根據錯誤嚴重程度決定退出碼
fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium | ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn display_config_summary(config: &TopologyConfig, snapshots: &[HostSnapshot], args: &CliArgs) {
    println!("📋 Configuration Summary:");
    println!("  Hosts: {}", snapshots.len());
    for snapshot in snapshots {
        println!(
            "    - {} (mode: {}, {} bound ports)",
            snapshot.host,
            config
                .mode()
                .or(snapshot.mode)
                .map(|m| m.to_string())
                .unwrap_or_else(|| "auto".to_string()),
            snapshot.runtime.bound_port_count()
        );
    }
    println!("  Probe: {:?}", config.probe_kind());
    println!("  Probe concurrency: {}", config.probe_concurrency());
    println!("  Argument match: {}", config.argument_match().as_str());
    println!(
        "  Output: {} ({})",
        config.output_path(),
        config.output_format().extension()
    );

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}
