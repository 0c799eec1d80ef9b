use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use opendata_sync::config::LogPrepConfig;
use opendata_sync::hadoop::{JobLedger, preprocess};
use opendata_sync::output::ConsoleOutput;

const APP_NAME: &str = "LG_PRCSR";

#[derive(Parser)]
#[command(name = "hadoop-logprep")]
#[command(about = "Summarize a Hadoop job log into the preprocessed CSV log")]
#[command(version, author)]
struct Cli {
    /// Job log to preprocess (plain text or .gz).
    log_path: PathBuf,

    /// Name recorded for this job in the preprocessed log.
    process_name: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let console = ConsoleOutput::new(APP_NAME);
    let config = LogPrepConfig::from_env();
    let ledger = JobLedger::new(config.log_file);

    match ledger.ensure() {
        Ok((created_dir, created_file)) => {
            if created_dir {
                println!("{}", console.line("INFO: Preprocessed log home directory initialized."));
            }
            if created_file {
                println!("{}", console.line("INFO: Preprocessed log file initialized."));
            }
        }
        Err(err) => {
            eprintln!("{}", console.line(&format!("ERROR: {err}")));
            return ExitCode::from(1);
        }
    }

    match preprocess(&cli.log_path, &cli.process_name, &ledger) {
        Ok(summary) => {
            println!(
                "{}",
                console.line(&format!(
                    "INFO: Preprocessed data from process '{}' ({}) has been appended to {}.",
                    summary.process_name,
                    summary.status.as_str(),
                    ledger.path()
                ))
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", console.line(&format!("ERROR: {err}")));
            ExitCode::from(1)
        }
    }
}
