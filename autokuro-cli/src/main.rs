mod cli;
mod display;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use autokuro::command::ProcessRunner;
use autokuro::config::ReconConfig;
use autokuro::context::{RunContext, RunOptions};
use autokuro::deps::locate_required;
use autokuro::errors::ReconError;
use autokuro::notify::{NoOpNotifier, Notifier, TelegramNotifier};
use autokuro::observability::{init_logging, LoggingConfig, WideEventEmitter};
use autokuro::pipeline::Sequencer;
use clap::{CommandFactory, Parser};
use tracing::warn;

use crate::cli::{Cli, Commands, StartArgs};
use crate::display::{ConsoleEventSink, Display};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig::new()
        .with_verbose(cli.verbose())
        .with_format(cli.log_format.into());
    if let Err(e) = init_logging(&logging) {
        Display::new().print_error(&format!("cannot initialise logging: {e}"));
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            Display::new().print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let display = Display::new();

    if cli.verify {
        return Ok(cmd_verify(&display));
    }

    match cli.command {
        Some(Commands::Start(args)) => cmd_start(&display, args).await,
        None => {
            Cli::command().print_help()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn cmd_verify(display: &Display) -> ExitCode {
    let report = locate_required();
    display.print_dependencies(&report);
    if report.is_ready() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn cmd_start(display: &Display, args: StartArgs) -> Result<ExitCode> {
    let deps = locate_required();
    if !deps.is_ready() {
        display.print_dependencies(&deps);
        return Err(ReconError::DependencyMissing {
            tools: deps.missing,
        })
        .context("dependency check failed");
    }

    let config = ReconConfig::load(&args.config)
        .map_err(ReconError::from)
        .with_context(|| format!("invalid configuration in {}", args.config.display()))?;

    let mut options = RunOptions::new(&args.domain)
        .with_output_root(&args.output)
        .with_mode(&args.mode)
        .with_hardware(&args.hardware)
        .with_notify(args.notify);
    if let Some(cookie) = args.cookie {
        options = options.with_cookie(cookie);
    }
    if let Some(proxy) = args.proxy {
        options = options.with_proxy(proxy);
    }

    let ctx = Arc::new(
        RunContext::new(options, &config)
            .map_err(ReconError::from)
            .context("cannot resolve run options")?,
    );
    display.print_banner(&ctx);

    let notifier: Arc<dyn Notifier> = match TelegramNotifier::from_config(&config.telegram) {
        Some(telegram) if ctx.notify => Arc::new(telegram),
        None if ctx.notify => {
            warn!("Notifications requested but telegram.bot_token or telegram.chat_id is empty");
            Arc::new(NoOpNotifier)
        }
        _ => Arc::new(NoOpNotifier),
    };

    let summary = Sequencer::new(Arc::clone(&ctx), Arc::new(ProcessRunner::new()))
        .with_event_sink(Arc::new(ConsoleEventSink::new()))
        .with_notifier(notifier)
        .run()
        .await
        .with_context(|| format!("scan of {} aborted", ctx.domain))?;

    WideEventEmitter::new().emit(&ctx, &summary);
    display.print_summary(&summary);
    Ok(ExitCode::SUCCESS)
}
