//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use riptide_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, Metrics, init_logging};

use crate::error::{CliError, CliResult};
use crate::output::render_replay;
use crate::replay::{ReplayOptions, load_config, load_script, replay};

const BUILD_SHA: &str = match option_env!("RIPTIDE_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

/// Parses CLI arguments, installs logging, and executes the requested command.
/// Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format,
        build_sha: BUILD_SHA,
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Replay(args) => handle_replay(args, cli.output).await,
    }
}

async fn handle_replay(args: ReplayArgs, output: OutputFormat) -> CliResult<()> {
    let mut script = load_script(&args.script)?;
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => script.config.take().unwrap_or_default(),
    };
    let metrics = if args.metrics {
        Some(Metrics::new().map_err(CliError::failure)?)
    } else {
        None
    };

    let options = ReplayOptions {
        verify: args.verify,
    };
    let (reports, _submitted) = replay(script, config, options, metrics.clone()).await?;

    let rendered = match &metrics {
        Some(metrics) => Some(metrics.render().map_err(CliError::failure)?),
        None => None,
    };
    render_replay(&reports, rendered.as_deref(), output)
}

#[derive(Parser)]
#[command(
    name = "riptide",
    about = "Replay torrent list synchronisation scripts through the sync engine"
)]
struct Cli {
    #[arg(long, global = true, env = "RIPTIDE_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
    #[arg(
        long,
        global = true,
        env = "RIPTIDE_LOG_FORMAT",
        value_parser = parse_log_format,
        default_value = "auto",
        help = "Log format: json, pretty or auto"
    )]
    log_format: LogFormat,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for replay results"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a JSON script of payloads, selections and queue moves.
    Replay(ReplayArgs),
}

#[derive(Args)]
struct ReplayArgs {
    #[arg(help = "Path to the replay script (JSON)")]
    script: PathBuf,
    #[arg(long, help = "Engine configuration file overriding the script's config block")]
    config: Option<PathBuf>,
    #[arg(long, help = "Compare incremental counters with a recount after every step")]
    verify: bool,
    #[arg(long, help = "Append Prometheus metrics gathered during the replay")]
    metrics: bool,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_arguments_parse() {
        let cli = Cli::try_parse_from([
            "riptide",
            "replay",
            "script.json",
            "--verify",
            "--output",
            "json",
            "--log-format",
            "json",
        ])
        .expect("arguments parse");
        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.log_format, LogFormat::Json);
        let Command::Replay(args) = cli.command;
        assert_eq!(args.script, PathBuf::from("script.json"));
        assert!(args.verify);
        assert!(!args.metrics);
        assert!(args.config.is_none());
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!(parse_log_format("xml").is_err());
        assert!(
            Cli::try_parse_from(["riptide", "--log-format", "xml", "replay", "s.json"]).is_err()
        );
    }
}
