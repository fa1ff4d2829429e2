use clap::Parser;
use sysrev_etl::config::study::StudyConfig;
use sysrev_etl::core::flow_pipeline::{
    build_flow_report, build_simulation_report, compare_runs, FlowPipeline, SimulationPipeline,
};
use sysrev_etl::domain::agreement::round3;
use sysrev_etl::domain::flow::reason_label;
use sysrev_etl::utils::{logger, validation::Validate};
use sysrev_etl::EtlEngine;
use sysrev_etl::LocalStorage;

#[derive(Parser)]
#[command(name = "prisma-flow")]
#[command(about = "PRISMA study selection flow generator")]
struct Args {
    /// Path to TOML study configuration file
    #[arg(short, long, default_value = "study-config.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Generate the flow from a simulated study pool instead of the configured numbers
    #[arg(short, long)]
    simulate: bool,

    /// Override the simulation seed from config
    #[arg(long)]
    seed: Option<u64>,

    /// Compare the configured flow against a simulated run (writes no files)
    #[arg(long)]
    compare: bool,

    /// Dry run - show what would be generated without executing
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Starting PRISMA flow generator");

    // 載入研究配置；檔案不存在時直接使用內建預設值
    let mut config = if std::path::Path::new(&args.config).exists() {
        tracing::info!("📁 Loading configuration from: {}", args.config);
        match StudyConfig::from_file(&args.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        }
    } else {
        tracing::info!(
            "⚙️ Config file '{}' not found, using built-in defaults",
            args.config
        );
        StudyConfig::default()
    };

    // 應用命令列覆蓋設定
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
        tracing::info!("🔧 Simulation seed overridden to: {}", seed);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    // 顯示配置摘要
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config);
        return Ok(());
    }

    if args.compare {
        // 對照配置數字與模擬結果，不寫任何輸出檔
        let configured = build_flow_report(&config)?;
        let simulated = build_simulation_report(&config)?;
        println!("{}", compare_runs(&configured, &simulated));
        return Ok(());
    }

    // 決定監控設定
    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());

    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    // 創建存儲和管道
    let storage = LocalStorage::new(config.output.path.clone());

    // 創建 ETL 引擎並運行
    let result = if args.simulate {
        let pipeline = SimulationPipeline::new(storage, config);
        EtlEngine::new_with_monitoring(pipeline, monitor_enabled).run()
    } else {
        let pipeline = FlowPipeline::new(storage, config);
        EtlEngine::new_with_monitoring(pipeline, monitor_enabled).run()
    };

    match result {
        Ok(output_path) => {
            tracing::info!("✅ PRISMA flow generated successfully!");
            tracing::info!("📁 Output saved to: {}", output_path);
            println!("✅ PRISMA flow generated successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Flow generation failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            // 輸出用戶友好的錯誤信息
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                sysrev_etl::utils::error::ErrorSeverity::Low => 0, // 警告，但成功
                sysrev_etl::utils::error::ErrorSeverity::Medium => 2, // 配置錯誤
                sysrev_etl::utils::error::ErrorSeverity::High => 1, // 處理錯誤
                sysrev_etl::utils::error::ErrorSeverity::Critical => 3, // 系統錯誤
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &StudyConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Study: {}", config.study.name);
    println!("  Search window: {}", config.date_range_label());
    println!(
        "  Flow targets: {} identified -> {} after screening -> {} included",
        config.targets.initial_records,
        config.targets.after_title_abstract().unwrap_or_default(),
        config.targets.final_included
    );
    println!("  Output: {}", config.output.path);

    if args.simulate {
        println!("  Mode: simulation (seed {})", config.simulation.seed);
    } else {
        println!("  Mode: configured flow");
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &StudyConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    // 流程目標分析
    println!("🎯 Flow Targets:");
    println!("  Records identified: {}", config.targets.initial_records);
    println!(
        "  Title/abstract excluded: {}",
        config.targets.title_abstract_excluded
    );
    println!("  Full-text excluded: {}", config.targets.full_text_excluded);
    println!("  Final included: {}", config.targets.final_included);
    println!(
        "  Exclusion ratio: {:.1}%",
        config.targets.exclusion_ratio() * 100.0
    );

    // 排除原因分析
    println!();
    println!("📉 Title/Abstract Exclusion Reasons:");
    for entry in config.title_abstract_breakdown().iter() {
        println!("  {}: {}", reason_label(&entry.reason), entry.count);
    }

    println!();
    println!("📉 Full-text Exclusion Reasons:");
    for entry in config.full_text_breakdown().iter() {
        println!("  {}: {}", reason_label(&entry.reason), entry.count);
    }

    // 信度分析
    println!();
    println!("🤝 Inter-rater Reliability:");
    let matrix = config.matrix();
    println!("  Decision matrix total: {}", matrix.total());
    println!("  Expected kappa: {:.3}", round3(matrix.cohens_kappa()));
    println!(
        "  Simulated kappa range: {:.2} - {:.2}",
        config.agreement.kappa_range[0], config.agreement.kappa_range[1]
    );

    // 輸出分析
    println!();
    println!("💾 Output Configuration:");
    println!("  Path: {}", config.output.path);
    println!("  Flowchart: {}", config.output.include_flowchart);
    println!("  Summary CSVs: {}", config.output.include_summary);
    println!(
        "  Timestamped file names: {}",
        config.output.timestamp_files
    );
    println!("  Archive: {}", config.output.archive);

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
