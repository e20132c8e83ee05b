use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use grievance_desk::cli::{self, Cli};
use grievance_desk::{Desk, DeskConfig, DeskError, HttpGrievanceApi};

async fn execute(args: Cli) -> Result<serde_json::Value, DeskError> {
    let config = DeskConfig::default();
    let engine = config.engine()?;
    let principal = args.principal(&engine.campuses)?;
    info!(
        api = %config.api_url,
        principal = principal.as_ref().map(|p| p.id.as_str()).unwrap_or("-"),
        "Grievance desk starting"
    );

    let api = HttpGrievanceApi::new(config)?;
    let desk = Desk::new(api, principal, engine);
    cli::run(args.command, &desk).await
}

fn render(value: &serde_json::Value) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to encode output")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match execute(args).await {
        Ok(value) => match render(&value) {
            Ok(out) => {
                println!("{out}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("{e:#}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            let report = err.report();
            error!(code = %report.code, "{report}");
            match serde_json::to_string(&report) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{report}"),
            }
            ExitCode::FAILURE
        }
    }
}
