use std::path::PathBuf;

use autokuro::config::DEFAULT_CONFIG_PATH;
use autokuro::observability::LogFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "autokuro")]
#[command(author, version, about = "Tactical bug bounty reconnaissance pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Check that every scanner is installed and exit
    #[arg(long)]
    pub verify: bool,

    /// Log format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    pub log_format: LogFormatArg,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the pipeline against a domain
    Start(StartArgs),
}

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Target domain
    #[arg(short, long)]
    pub domain: String,

    /// Output directory
    #[arg(short, long, default_value = "results")]
    pub output: PathBuf,

    /// Mode: ghost, ranger, blitz
    #[arg(short, long, default_value = "ranger")]
    pub mode: String,

    /// Hardware profile: mobile, desktop, vps
    #[arg(long, default_value = "desktop")]
    pub hardware: String,

    /// Cookie for authenticated scanning
    #[arg(short, long)]
    pub cookie: Option<String>,

    /// Proxy URL (e.g. http://127.0.0.1:8080)
    #[arg(short, long)]
    pub proxy: Option<String>,

    /// Send Telegram notifications
    #[arg(short, long)]
    pub notify: bool,

    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum LogFormatArg {
    #[default]
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

impl Cli {
    pub fn verbose(&self) -> bool {
        matches!(self.command, Some(Commands::Start(StartArgs { verbose: true, .. })))
    }
}
