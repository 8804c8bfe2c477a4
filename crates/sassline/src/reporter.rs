use crate::error::{render_error, PluginError};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A unit that failed, as it appears in reports
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub compiled_files: Vec<PathBuf>,
    pub failures: Vec<Failure>,
    pub total_files: usize,
    pub compiled_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,

    /// The failures as signalled, for callers that render them themselves
    #[serde(skip)]
    pub errors: Vec<PluginError>,
}

impl Report {
    pub fn new(compiled_files: Vec<PathBuf>, failures: Vec<Failure>, total_files: usize) -> Self {
        let compiled_count = compiled_files.len();
        let failed_count = failures.len();
        let skipped_count = total_files.saturating_sub(compiled_count + failed_count);
        Self {
            compiled_files,
            failures,
            total_files,
            compiled_count,
            failed_count,
            skipped_count,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<PluginError>) -> Self {
        self.errors = errors;
        self
    }
}

pub fn report_text(report: &Report, dest: &Path) {
    for error in &report.errors {
        eprintln!("{}", render_error(error));
    }

    if report.compiled_files.is_empty() && report.failures.is_empty() {
        println!("Nothing to compile.");
        return;
    }

    if !report.compiled_files.is_empty() {
        println!("Compiled files ({}):", report.compiled_count);
        for file in &report.compiled_files {
            let relative = file.strip_prefix(dest).unwrap_or(file);
            println!("  {}", relative.display());
        }
    }

    if !report.failures.is_empty() {
        println!("Failed files ({}):", report.failed_count);
        for failure in &report.failures {
            println!("  {}", failure.path.display());
        }
    }

    println!(
        "\n{}/{} compiled, {} failed, {} skipped",
        report.compiled_count, report.total_files, report.failed_count, report.skipped_count
    );
}

pub fn report_json(report: &Report) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: failed to serialize report: {e}"),
    }
}
