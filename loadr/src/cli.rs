use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

const DURATION_HINT: &str = "expected e.g. 10s, 250ms, 1m30s";

/// Bare integers are seconds; anything else goes through humantime.
pub(crate) fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err(format!("duration cannot be empty ({DURATION_HINT})"));
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| format!("duration '{s}' is too large"));
    }

    humantime::parse_duration(s).map_err(|_| format!("invalid duration '{s}' ({DURATION_HINT})"))
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Live progress bar and a human-readable summary.
    HumanReadable,
    /// Emit JSON progress and summary lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "loadr",
    author,
    version,
    about = "Virtual-user HTTP load generator",
    long_about = "loadr drives a pool of virtual users against an HTTP target.\n\nA YAML test file describes the traffic profile (a flat `vus` + `duration`, or ramping `stages`), the request sequence each user repeats, think time between iterations and named checks.\n\nLogs go to stderr; set RUST_LOG (e.g. RUST_LOG=info) to see lifecycle events.",
    after_help = "Examples:\n  loadr run smoke.yaml\n  loadr run load.yaml --vus 50 --duration 30s\n  loadr run stress.yaml --url http://localhost:3000/ --output json\n\nDocs & examples: https://github.com/nogcio/loadr"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load test described by a YAML file
    #[command(
        long_about = "Run the load test described by a YAML file.\n\n`--vus`/`--duration` override the file and always select a flat profile; `--url` replaces the URL of every request."
    )]
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the test file (.yaml/.yml)
    pub file: PathBuf,

    /// Number of virtual users (flat profile)
    #[arg(long)]
    pub vus: Option<u64>,

    /// Test duration (e.g. 10s, 250ms, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Target URL for every request in the scenario
    #[arg(long)]
    pub url: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_common_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(2 * 60 * 60)));
        assert_eq!(parse_duration("15"), Ok(Duration::from_secs(15)));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn cli_parses_run_with_overrides() {
        let parsed = Cli::try_parse_from([
            "loadr",
            "run",
            "load.yaml",
            "--vus",
            "2",
            "--duration",
            "250ms",
            "--url",
            "http://127.0.0.1:3000/",
            "--output",
            "json",
        ]);

        let cli = match parsed {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        let Command::Run(args) = cli.command;
        assert_eq!(args.file, PathBuf::from("load.yaml"));
        assert_eq!(args.vus, Some(2));
        assert_eq!(args.duration, Some(Duration::from_millis(250)));
        assert_eq!(args.url.as_deref(), Some("http://127.0.0.1:3000/"));
        assert!(matches!(args.output, OutputFormat::Json));
    }

    #[test]
    fn cli_defaults_to_human_output() {
        let cli = match Cli::try_parse_from(["loadr", "run", "smoke.yaml"]) {
            Ok(v) => v,
            Err(err) => panic!("failed to parse args: {err}"),
        };

        let Command::Run(args) = cli.command;
        assert_eq!(args.vus, None);
        assert_eq!(args.duration, None);
        assert!(matches!(args.output, OutputFormat::HumanReadable));
    }
}
