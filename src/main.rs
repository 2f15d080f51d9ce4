use anyhow::Result;
use clap::Parser;
use homework_grader::cli::{Cli, Commands, ProgressMode};
use homework_grader::clients::OpenAiTextGenerator;
use homework_grader::error::ConfigError;
use homework_grader::services::{ArchiveCollector, JsonLinesSink, TracingSink};
use homework_grader::utils::logging;
use homework_grader::{App, Config};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 加载配置（日志初始化需要 verbose 设置）
    let config = Config::load(cli.config.as_deref());
    let verbose = cli.verbose
        || config
            .as_ref()
            .map(|c| c.verbose_logging)
            .unwrap_or(false);
    if let Err(e) = logging::init(verbose) {
        eprintln!("日志初始化失败: {}", e);
    }

    let result = match config {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, mut config: Config) -> Result<()> {
    match command {
        Commands::Grade(args) => {
            args.apply(&mut config);
            config.resolve_requirements()?;

            let generator = Arc::new(OpenAiTextGenerator::new(&config));
            let app = App::initialize(config, generator)?;

            let report = match args.progress {
                ProgressMode::Log => app.run(&TracingSink).await?,
                ProgressMode::Json => app.run(&JsonLinesSink::new(std::io::stdout())).await?,
            };
            info!(
                "共 {} 份作业，结果文件: {}",
                report.results.len(),
                report.output_file.display()
            );
        }
        Commands::Collect {
            search_dir,
            output_dir,
        } => {
            if !search_dir.is_dir() {
                return Err(ConfigError::SearchDirNotFound { path: search_dir }.into());
            }
            let dest = output_dir.unwrap_or_else(|| config.staging_dir.clone());

            let report = ArchiveCollector::new(&config).collect(&search_dir, &dest, &TracingSink)?;
            info!(
                "✅ 已复制 {} 个文件到 {}",
                report.copied_count(),
                dest.display()
            );
            if report.unopenable_count() > 0 {
                warn!("⚠️ 其中 {} 个文件可能无法作为 ZIP 打开", report.unopenable_count());
            }
            for path in report.failed() {
                warn!("⚠️ 无法复制: {}", path.display());
            }
        }
        Commands::PrintConfig => {
            let mut shown = config.clone();
            shown.llm_api_key = config.masked_api_key();
            println!("{}", toml::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}
