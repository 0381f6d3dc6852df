//! `regprobe` command-line entry point.
//!
//! Results go to stdout, one value per line. An inconclusive lookup prints
//! nothing and exits with status 1; details are in the debug log.

mod cli;
mod tracing;

use std::io::{self, Write};
use std::process::ExitCode;

use miette::IntoDiagnostic;
use regprobe::{Config, Inspector};

use crate::cli::{Cli, Commands};
use crate::tracing::TracingConfig;

#[tokio::main]
async fn main() -> miette::Result<ExitCode> {
    let cli = cli::parse();

    crate::tracing::init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.log_level.into(),
    })?;

    let config = Config::from_env().into_diagnostic()?;
    let inspector = Inspector::new(config).into_diagnostic()?;

    let lines = run(&inspector, &cli).await;
    if lines.is_empty() {
        return Ok(ExitCode::FAILURE);
    }

    let mut stdout = io::stdout().lock();
    for line in &lines {
        writeln!(stdout, "{line}").into_diagnostic()?;
    }
    Ok(ExitCode::SUCCESS)
}

async fn run(inspector: &Inspector, cli: &Cli) -> Vec<String> {
    match &cli.command {
        Commands::ImageId { image } => {
            let id = inspector.image_id(image, &cli.username, &cli.password).await;
            if id.is_empty() { Vec::new() } else { vec![id] }
        }
        Commands::ManifestDigests { image } => {
            inspector
                .manifest_list_digests(image, &cli.username, &cli.password)
                .await
        }
    }
}
