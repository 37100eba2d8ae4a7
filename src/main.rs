use clap::Parser;
use sales_xcheck::report;
use sales_xcheck::{run_pipeline, AnalysisConfig, Args};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AnalysisConfig::from(Args::parse());
    info!("Sales cross-check starting (source: {})", config.db_path.display());

    let output = run_pipeline(&config);

    report::display_results(output.relational.as_ref(), "Pure SQL");
    report::display_results(output.tabular.as_ref(), "DataFrame");

    if let Some(path) = &output.summary.report_path {
        match report::echo_report(path) {
            Ok(contents) => {
                println!("CSV Output ({}):", path.display());
                println!("{}", contents);
            }
            Err(e) => warn!("{}", e),
        }
    }

    let violations = output.summary.contract_violations().count();
    if violations > 0 {
        warn!("{} data contract violation(s) during this run", violations);
    }

    Ok(if output.summary.any_result() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
