use clap::Parser;
use tracing::Level;

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    // stdout carries protocol responses; diagnostics go to stderr only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let code = commands::run_command(cli)?;
    if code != codex_protocol::EXIT_OK {
        std::process::exit(code);
    }
    Ok(())
}
