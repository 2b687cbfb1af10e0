use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "codex",
    about = "Codex: Bible format conversion through a shared IR",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Engine config (TOML). Falls back to $CODEX_CONFIG.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve one protocol request on stdin/stdout for a converter
    Plugin(PluginArgs),
    /// List registered converters
    Formats,
    /// Run every detector on a file
    Detect(DetectArgs),
    /// Extract to IR, emit back, and compare with the original
    Roundtrip(RoundtripArgs),
}

#[derive(Args)]
pub struct PluginArgs {
    /// Format id of the converter to run
    pub converter: String,
}

#[derive(Args)]
pub struct DetectArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct RoundtripArgs {
    /// Format id of the converter to use
    pub converter: String,
    pub path: PathBuf,
    /// Keep intermediate files here instead of a temporary directory
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}
