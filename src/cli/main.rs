//! warehouse-etl binary: one full pipeline pass per invocation

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use warehouse_etl::config::AppConfig;
use warehouse_etl::error::EtlError;
use warehouse_etl::pipeline::PipelineRunner;

#[derive(Parser, Debug)]
#[command(name = "warehouse-etl", version, about = "Stage and transform source extracts into the warehouse star schema")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) -> Result<(), EtlError> {
    let filter = EnvFilter::try_new(level)
        .map_err(|_| EtlError::Config(format!("invalid log level: '{level}'")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

async fn run(cli: Cli) -> Result<(), EtlError> {
    let config = AppConfig::load(&cli.config)?;
    let report = PipelineRunner::new(config).run().await?;
    report.print_summary();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("{}", e.user_message());
        return ExitCode::from(e.exit_code() as u8);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Pipeline run failed");
            eprintln!("{}", e.user_message());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
