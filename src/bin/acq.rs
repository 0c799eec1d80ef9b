use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use opendata_sync::app::App;
use opendata_sync::archive::KaggleHttpClient;
use opendata_sync::catalog::CatalogHttpClient;
use opendata_sync::config::ConfigLoader;
use opendata_sync::domain::{FailurePolicy, Mode};
use opendata_sync::error::AcqError;
use opendata_sync::ledger::{Ledger, RunContext};
use opendata_sync::output::{ConsoleOutput, JsonOutput, OutputMode};
use opendata_sync::source::Providers;
use opendata_sync::store::Store;

const APP_NAME: &str = "ACQ_TOOL";

#[derive(Parser)]
#[command(name = "acq")]
#[command(about = "Download open datasets and keep the local copies consistent and up to date")]
#[command(version, author)]
struct Cli {
    /// `init` downloads every dataset; omit to fill gaps and refresh stale datasets.
    #[arg(value_enum)]
    mode: Option<Mode>,

    #[arg(long)]
    config: Option<String>,

    /// Stop at the first dataset that fails instead of continuing.
    #[arg(long)]
    abort_on_error: bool,

    /// Network timeout in seconds (none by default).
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<AcqError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &AcqError) -> u8 {
    match error {
        AcqError::Configuration(_) | AcqError::ConfigRead(_) | AcqError::ConfigParse(_) => 2,
        err if err.is_download_error() || err.is_metadata_error() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if cli.abort_on_error {
        config.failure_policy = FailurePolicy::Abort;
    }
    if let Some(secs) = cli.timeout {
        config.timeout = Some(Duration::from_secs(secs));
    }
    let mode = cli.mode.unwrap_or_default();

    let store = Store::new(config.storage_root.clone());
    let ledger = Ledger::new(config.ledger_path.clone());
    let catalog = CatalogHttpClient::new(config.timeout)?;
    let archive = KaggleHttpClient::new(config.timeout)?;
    let app = App::new(store.clone(), ledger, Providers::new(store, catalog, archive));

    let mut ctx = RunContext::new();
    let console = ConsoleOutput::new(APP_NAME);
    let result = match output_mode {
        OutputMode::Interactive => {
            app.run(&config.datasets, mode, config.failure_policy, &mut ctx, &console)
        }
        OutputMode::NonInteractive => app.run(
            &config.datasets,
            mode,
            config.failure_policy,
            &mut ctx,
            &JsonOutput,
        ),
    };

    // Downloads that completed before an abort still get their summary.
    let summary = ctx.write_summary(&config.summary_dir)?;
    let report = result?;

    match output_mode {
        OutputMode::Interactive => {
            if let Some(path) = summary {
                println!("{}", console.line(&format!("Acquisition info written to {path}")));
            }
            console.print_summary(&report);
        }
        OutputMode::NonInteractive => JsonOutput::print_run(&report).into_diagnostic()?,
    }
    Ok(())
}
