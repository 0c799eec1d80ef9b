use std::io::{self, Write};

use chrono::Local;
use crossterm::style::Stylize;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressLevel, ProgressSink, RunReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Human-readable status lines: `[<datetime>: <APP>] message`.
pub struct ConsoleOutput {
    app_name: &'static str,
}

impl ConsoleOutput {
    pub fn new(app_name: &'static str) -> Self {
        Self { app_name }
    }

    pub fn line(&self, message: &str) -> String {
        format!("[{}: {}] {message}", timestamp(), self.app_name)
    }

    pub fn print_summary(&self, report: &RunReport) {
        let line = self.line(&format!(
            "Run finished: {} datasets, {} downloaded, {} failed.",
            report.items.len(),
            report.downloads(),
            report.failures()
        ));
        if report.failures() > 0 {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let line = self.line(&event.message);
        match event.level {
            ProgressLevel::Info => println!("{line}"),
            ProgressLevel::Success => println!("{}", line.green()),
            ProgressLevel::Failure => println!("{}", line.red()),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_run(report: &RunReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}
