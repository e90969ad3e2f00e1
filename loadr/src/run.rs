use loadr_core::{Executor, RunConfig};

use crate::cli::RunArgs;
use crate::config;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let file = config::load(&args.file)
        .await
        .map_err(RunError::InvalidInput)?;
    let test = file
        .into_load_test(run_config(&args), args.url.as_deref())
        .map_err(RunError::InvalidInput)?;

    out.print_header(&args.file, &test);

    let mut executor = Executor::new(test.plan, test.scenario).with_checks(test.checks);
    if let Some(progress) = out.progress() {
        executor = executor.with_progress(progress);
    }

    let snapshot = executor.run().await?;
    out.print_summary(&snapshot)
        .map_err(RunError::RuntimeError)?;

    if !snapshot.anomalies.is_empty() {
        tracing::warn!(
            count = snapshot.anomalies.len(),
            "virtual users were aborted after the grace period"
        );
    }

    Ok(ExitCode::from_checks(snapshot.has_failed_checks()))
}

fn run_config(args: &RunArgs) -> RunConfig {
    RunConfig {
        vus: args.vus,
        duration: args.duration,
    }
}
