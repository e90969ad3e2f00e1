use std::path::Path;

use crate::cli::OutputFormat;
use crate::config::LoadTest;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, file: &Path, test: &LoadTest);
    fn progress(&self) -> Option<loadr_core::ProgressFn>;
    fn print_summary(&self, snapshot: &loadr_core::MetricsSnapshot) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
