//! mailbatch - batch log records into periodic notification mails.

use std::io::{self, BufRead};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use mb_common::{Level, Record};
use mb_core::config::{load_config, ConfigError, LoadedConfig};
use mb_core::engine::Engine;
use mb_core::exit_codes::ExitCode;
use mb_core::logging::{generate_run_id, init_logging, LogConfig, LogFormat, LogLevel};
use mb_format::{BatchDirectives, Template};
use tracing::{error, info, info_span, warn};

/// Batch log records and mail them with surrounding context
#[derive(Parser)]
#[command(name = "mailbatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (default: $MAILBATCH_CONFIG, then the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true, ignore_case = true)]
    log_level: Option<LogLevel>,

    /// Log format (human, jsonl)
    #[arg(long, global = true, ignore_case = true)]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read JSON-lines records from stdin and batch them until EOF
    Run,

    /// Validate the configuration and print it
    Check,

    /// Expand a subject template against a set of records
    Format(FormatArgs),
}

#[derive(Args, Debug)]
struct FormatArgs {
    /// Template, e.g. "%events{triggering} of %events{total}"
    template: String,

    /// JSON-lines file of records
    #[arg(long)]
    records: Option<PathBuf>,

    /// Lost-event count to report
    #[arg(long, default_value = "0")]
    lost: u64,

    /// Records at or above this level count as triggering
    #[arg(long, default_value = "WARN")]
    threshold: Level,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    let log_config = LogConfig {
        level: log_config.level.adjust(cli.global.verbose, cli.global.quiet),
        ..log_config
    };
    init_logging(&log_config);

    let exit_code = match &cli.command {
        Commands::Run => run_batch(&cli.global),
        Commands::Check => run_check(&cli.global),
        Commands::Format(args) => run_format(args),
    };

    std::process::exit(exit_code.as_i32());
}

fn load(global: &GlobalOpts) -> Result<LoadedConfig, ConfigError> {
    load_config(global.config.as_deref())
}

fn run_batch(global: &GlobalOpts) -> ExitCode {
    let run_id = generate_run_id();
    let _span = info_span!("run", run_id = %run_id).entered();

    let loaded = match load(global) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!(error = %e, code = e.code(), "invalid configuration");
            return ExitCode::ArgsError;
        }
    };
    let sink = match loaded.config.mail_sink() {
        Ok(sink) => sink,
        Err(e) => {
            error!(error = %e, "cannot build mail sink");
            return ExitCode::ArgsError;
        }
    };

    let engine = Engine::new(loaded.config.engine_settings(), sink);
    if let Err(e) = engine.start() {
        error!(error = %e, "engine failed to start");
        return ExitCode::ArgsError;
    }

    let mut submitted = 0u64;
    let mut rejected = 0u64;
    let mut skipped = 0u64;
    let mut io_failed = false;

    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "failed to read stdin");
                io_failed = true;
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match Record::from_json_line(&line) {
            Ok(record) => {
                submitted += 1;
                if !engine.submit(record) {
                    rejected += 1;
                }
            }
            Err(e) => {
                skipped += 1;
                warn!(line = index + 1, error = %e, "skipping malformed record");
            }
        }
    }

    let report = engine.stop(loaded.config.shutdown_timeout());
    info!(submitted, rejected, skipped, flushes = report.flushes, "input exhausted");

    let output = serde_json::json!({
        "run_id": run_id,
        "submitted": submitted,
        "rejected": rejected,
        "skipped": skipped,
        "report": report,
    });
    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            error!(error = %e, "failed to serialize report");
            return ExitCode::InternalError;
        }
    }

    if io_failed {
        ExitCode::IoError
    } else if !report.completed {
        ExitCode::TimeoutError
    } else {
        ExitCode::Clean
    }
}

fn run_check(global: &GlobalOpts) -> ExitCode {
    let (output, code) = match load(global) {
        Ok(loaded) => {
            let addressing = loaded
                .config
                .effective_addressing()
                .map(|a| a.to_string())
                .unwrap_or_default();
            (
                serde_json::json!({
                    "status": "ok",
                    "source": loaded.source.to_string(),
                    "path": loaded.path.as_ref().map(|p| p.display().to_string()),
                    "addressing": addressing,
                    "config": loaded.config,
                }),
                ExitCode::Clean,
            )
        }
        Err(e) => (
            serde_json::json!({
                "status": "error",
                "error": e.to_string(),
                "code": e.code(),
            }),
            ExitCode::ArgsError,
        ),
    };

    match serde_json::to_string_pretty(&output) {
        Ok(text) => {
            println!("{}", text);
            code
        }
        Err(e) => {
            error!(error = %e, "failed to serialize check result");
            ExitCode::InternalError
        }
    }
}

fn run_format(args: &FormatArgs) -> ExitCode {
    let mut records = Vec::new();
    if let Some(path) = &args.records {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read records");
                return ExitCode::IoError;
            }
        };
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match Record::from_json_line(line) {
                Ok(mut record) => {
                    if record.level.is_at_least(args.threshold) {
                        record.mark_triggering();
                    }
                    records.push(record);
                }
                Err(e) => {
                    error!(line = index + 1, error = %e, "invalid record");
                    return ExitCode::ArgsError;
                }
            }
        }
    }

    let template = Template::parse(&args.template);
    println!("{}", template.render(&BatchDirectives::new(&records, args.lost)));
    ExitCode::Clean
}
