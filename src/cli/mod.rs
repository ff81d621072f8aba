// CLI module - User-facing command-line interface

mod output;

use crate::capture::capture_command;
use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::gate::{AutoPrompt, Choice, ConfirmationPrompt, TerminalPrompt};
use crate::logs::{install_panic_hook, CaptureLayer, LogLevel, LogReadOptions, LogSink, LogStream};
use crate::service::{ClearOutcome, LogService};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// logcap - capture application logs into a durable log file
#[derive(Parser)]
#[command(name = "logcap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase diagnostic output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append a timestamped note to the log, bypassing level filters
    Send {
        /// Text of the note
        message: String,
    },

    /// Publish a log event through the level filter
    Emit {
        /// Level: debug, warning, error, assert or exception
        level: LogLevel,

        /// Event message
        message: String,

        /// Stack trace persisted with error and exception events
        #[arg(short, long)]
        stack_trace: Option<String>,
    },

    /// Show the log contents
    Read {
        /// Only show the last N entries
        #[arg(short, long)]
        lines: Option<usize>,

        /// Only show entries containing this text
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Delete all logs after confirmation
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the absolute path of the log file
    Path,

    /// Run a command and capture its output
    Capture {
        /// Program to run, followed by its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

impl Cli {
    /// Run the CLI application
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        cli.execute().await
    }

    /// Execute the parsed command
    async fn execute(&self) -> Result<()> {
        let config = CaptureConfig::load(self.config.as_deref())?;

        let stream = Arc::new(LogStream::new());
        self.init_tracing(Arc::clone(&stream))?;
        install_panic_hook(Arc::clone(&stream));

        let service = LogService::initialize(&config, self.prompt()).await;

        match &self.command {
            Commands::Send { message } => {
                output::print_status(&service.send_log(message).await);
                Ok(())
            }

            Commands::Emit {
                level,
                message,
                stack_trace,
            } => {
                let sink = Self::start_sink(&service, &config, &stream)?;
                let admitted = sink.filter().admits(*level);

                stream.emit(*level, message.clone(), stack_trace.clone());
                sink.shutdown(&stream).await?;

                if admitted {
                    output::print_success_msg(&format!("{} event recorded", level));
                } else {
                    output::print_info(&format!("{} events are disabled by configuration", level));
                }
                Ok(())
            }

            Commands::Read { lines, filter } => {
                if lines.is_none() && filter.is_none() {
                    output::print_raw_logs(&service.read_logs().await);
                } else {
                    let options = LogReadOptions {
                        lines: lines.unwrap_or(LogReadOptions::default().lines),
                        filter: filter.clone(),
                    };
                    let entries = service.tail_logs(&options).await?;
                    output::print_entries(&entries);
                }
                Ok(())
            }

            Commands::Clear { .. } => match service.clear_logs().await? {
                failed @ ClearOutcome::Failed(_) => Err(CaptureError::Other(failed.status())),
                outcome => {
                    output::print_clear_outcome(&outcome);
                    Ok(())
                }
            },

            Commands::Path => {
                println!("{}", service.log_path());
                Ok(())
            }

            Commands::Capture { command } => {
                let (program, args) = command
                    .split_first()
                    .ok_or_else(|| CaptureError::CaptureFailed("No command given".to_string()))?;
                let sink = Self::start_sink(&service, &config, &stream)?;

                let summary = capture_command(Arc::clone(&stream), program, args).await;
                if let Ok(ref summary) = summary {
                    info!(
                        "{} finished with {}: {} stdout / {} stderr lines captured",
                        program, summary.status, summary.stdout_lines, summary.stderr_lines
                    );
                }

                sink.shutdown(&stream).await?;
                let summary = summary?;

                if sink.dropped() > 0 || sink.failed() > 0 {
                    output::print_error(&format!(
                        "{} entries dropped, {} entries failed to persist",
                        sink.dropped(),
                        sink.failed()
                    ));
                }
                output::print_success_msg(&format!(
                    "Captured {} lines from {} ({})",
                    summary.stdout_lines + summary.stderr_lines,
                    program,
                    summary.status
                ));
                Ok(())
            }
        }
    }

    /// Confirmation boundary for this invocation
    fn prompt(&self) -> Arc<dyn ConfirmationPrompt> {
        match self.command {
            Commands::Clear { yes: true } => Arc::new(AutoPrompt(Choice::Confirm)),
            _ => Arc::new(TerminalPrompt::new()),
        }
    }

    /// Start a sink over the service's store and attach it to `stream`
    fn start_sink(service: &LogService, config: &CaptureConfig, stream: &LogStream) -> Result<LogSink> {
        let sink = LogSink::start(service.store()?, config.levels, config.buffer_capacity);
        sink.attach(stream);
        Ok(sink)
    }

    /// Console diagnostics on stderr, plus the capture layer feeding `stream`
    fn init_tracing(&self, stream: Arc<LogStream>) -> Result<()> {
        let filter = match self.verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        };

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_filter(filter),
            )
            .with(CaptureLayer::new(stream))
            .try_init()
            .map_err(|e| CaptureError::Other(format!("Failed to initialize logging: {}", e)))
    }
}
