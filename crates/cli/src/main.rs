//! Pod Isolation CLI
//!
//! Runs on a Kubernetes node (usually inside a privileged DaemonSet pod)
//! and inspects or flushes iptables rules inside pod network namespaces.

mod output;

use anyhow::{Context, Result};
use clap::{error::ErrorKind as ClapErrorKind, Parser, ValueEnum};
use isolation_lib::{
    dispatch, CommandRequest, DispatchOutcome, IsolationConfig, IsolationError, LogFormat,
};
use output::{print_error, print_usage, print_verbatim, Stream};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Pod Isolation CLI
#[derive(Parser)]
#[command(name = "pod-isolation")]
#[command(author, version, about = "Inspect and flush iptables rules in pod network namespaces", long_about = None)]
#[command(after_help = output::USAGE)]
pub struct Cli {
    /// Name of the local Kubernetes node (defaults to the hostname)
    #[arg(long, env = "NODE_NAME")]
    pub node_name: Option<String>,

    /// Kubeconfig used for node-scoped commands
    #[arg(long, env = "ISOLATION_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Command followed by its arguments
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable lines
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn init_tracing(format: LogFormat) {
    // Logs go to stderr, so `show` output on stdout stays clean at any level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn report(err: &IsolationError) -> ExitCode {
    print_error(&err.to_string());
    if err.wants_usage() {
        print_usage(Stream::Stderr);
    }
    ExitCode::FAILURE
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match IsolationConfig::load() {
        Ok(config) => config.with_overrides(
            cli.node_name,
            cli.kubeconfig,
            cli.log_format.map(LogFormat::from),
        ),
        Err(err) => return Ok(report(&err)),
    };
    init_tracing(config.log_format);

    let request = match CommandRequest::parse(&cli.args) {
        Ok(Some(request)) => request,
        Ok(None) => {
            print_usage(Stream::Stdout);
            return Ok(ExitCode::SUCCESS);
        }
        Err(err) => return Ok(report(&err)),
    };

    match dispatch::run(&request, &config).await {
        Ok(DispatchOutcome::Inspected { output, .. }) => {
            print_verbatim(&output).context("failed to write command output")?;
        }
        Ok(DispatchOutcome::Cleared { .. }) => {}
        Err(err) => return Ok(report(&err)),
    }

    Ok(ExitCode::SUCCESS)
}

/// Map a clap failure onto the verb contract: a leading word clap does not
/// know is an unrecognized verb, everything else is an argument error
fn parse_failure(err: clap::Error) -> ExitCode {
    match err.kind() {
        ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
            let _ = err.print();
            ExitCode::SUCCESS
        }
        ClapErrorKind::UnknownArgument => {
            print_usage(Stream::Stdout);
            ExitCode::SUCCESS
        }
        _ => {
            let _ = err.print();
            print_usage(Stream::Stderr);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return parse_failure(err),
    };

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            print_error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
