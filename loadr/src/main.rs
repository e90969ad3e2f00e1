mod cli;
mod config;
mod exit_codes;
mod output;
mod run;
mod run_error;

use clap::Parser;
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    let cli = match cli::Cli::try_parse() {
        Ok(v) => v,
        Err(err) => {
            use clap::error::ErrorKind;
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    exit_codes::ExitCode::Success.as_i32()
                }
                _ => exit_codes::ExitCode::InvalidInput.as_i32(),
            };
            std::process::exit(code);
        }
    };

    init_tracing();

    let code = match cli.command {
        cli::Command::Run(args) => match run::run(args).await {
            Ok(code) => code.as_i32(),
            Err(err) => {
                eprintln!("{err}");
                err.exit_code().as_i32()
            }
        },
    };

    std::process::exit(code);
}

// stdout carries the summary (and NDJSON lines), so logs go to stderr.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
