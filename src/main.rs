use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidscribe::{utils, Cli, Config, Pipeline, RunConfig, RunOutcome};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vidscribe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Missing tools are only a warning here; extraction reports a clearer
    // error if one is actually needed.
    let missing_deps = utils::check_dependencies().await;
    if !missing_deps.is_empty() && !cli.quiet {
        eprintln!("Dependency check warnings:");
        for dep in &missing_deps {
            eprintln!("  - {}", dep);
        }
    }

    match run(cli).await {
        Ok(outcome) => {
            report(&outcome);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> vidscribe::Result<RunOutcome> {
    let config = Config::load()?;
    let run_config = RunConfig::resolve(&cli, &config)?;
    let pipeline = Pipeline::new(run_config)?;
    pipeline.run().await
}

fn report(outcome: &RunOutcome) {
    println!("Transcript saved to: {}", outcome.transcript_path.display());
    if let Some(path) = &outcome.summary_path {
        println!("Summary saved to: {}", path.display());
    }
    if let Some(warning) = &outcome.summary_warning {
        eprintln!("Warning: summary was not produced: {}", warning);
    }
}
