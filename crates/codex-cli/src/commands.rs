use std::io;

use anyhow::Context;
use codex_engine::{round_trip_file, ConverterRegistry, EngineConfig, EngineResult, Host};
use codex_formats::default_registry;
use codex_protocol::{JsonCodec, Response, EXIT_ERROR, EXIT_OK};
use colored::Colorize;
use serde_json::json;

use crate::cli::*;

/// Run a subcommand and return the process exit code.
pub fn run_command(cli: Cli) -> anyhow::Result<i32> {
    let registry = default_registry();
    let config = EngineConfig::resolve(cli.config.as_deref());
    match cli.command {
        Command::Plugin(args) => cmd_plugin(&registry, config, args),
        Command::Formats => cmd_formats(&registry, &cli.format),
        Command::Detect(args) => cmd_detect(&registry, &cli.format, args),
        Command::Roundtrip(args) => {
            let config = config.context("loading engine config")?;
            cmd_roundtrip(&registry, config, &cli.format, args)
        }
    }
}

/// Protocol mode. Setup failures are still answered with an error
/// response so the caller always gets one JSON document.
fn cmd_plugin(
    registry: &ConverterRegistry,
    config: EngineResult<EngineConfig>,
    args: PluginArgs,
) -> anyhow::Result<i32> {
    let setup = config.and_then(|config| Ok((registry.get(&args.converter)?, config)));
    match setup {
        Ok((converter, config)) => {
            let host = Host::new(converter, config);
            Ok(host.serve(io::stdin().lock(), io::stdout().lock()))
        }
        Err(e) => {
            JsonCodec::write_response(io::stdout().lock(), &Response::error(e.to_string()))?;
            Ok(EXIT_ERROR)
        }
    }
}

fn cmd_formats(registry: &ConverterRegistry, format: &OutputFormat) -> anyhow::Result<i32> {
    if let OutputFormat::Json = format {
        let list: Vec<_> = registry
            .iter()
            .map(|c| {
                let caps = c.capabilities();
                json!({
                    "format": c.format_id(),
                    "description": c.description(),
                    "extensions": c.extensions(),
                    "extract_ceiling": caps.extract_ceiling,
                    "emit_ceiling": caps.emit_ceiling,
                    "parallel": caps.parallel,
                    "interlinear": caps.interlinear,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(EXIT_OK);
    }

    for c in registry.iter() {
        println!(
            "{:<6} {}  [{}]",
            c.format_id().bold(),
            c.description(),
            c.extensions().join(", ").dimmed()
        );
        println!("       {}", c.capabilities().to_string().cyan());
    }
    Ok(EXIT_OK)
}

fn cmd_detect(
    registry: &ConverterRegistry,
    format: &OutputFormat,
    args: DetectArgs,
) -> anyhow::Result<i32> {
    let results = registry.detect_all(&args.path);
    let any = results.iter().any(|(_, r)| r.detected);

    if let OutputFormat::Json = format {
        let mut map = serde_json::Map::new();
        for (id, r) in &results {
            map.insert(id.to_string(), serde_json::to_value(r)?);
        }
        println!("{}", serde_json::Value::Object(map));
    } else {
        for (id, r) in &results {
            let mark = if r.detected { "✓".green().bold() } else { "✗".red() };
            println!("{mark} {:<6} {}", id.bold(), r.reason.dimmed());
        }
        if !any {
            println!("No converter recognizes {}", args.path.display());
        }
    }
    Ok(if any { EXIT_OK } else { EXIT_ERROR })
}

fn cmd_roundtrip(
    registry: &ConverterRegistry,
    config: EngineConfig,
    format: &OutputFormat,
    args: RoundtripArgs,
) -> anyhow::Result<i32> {
    let converter = registry.get(&args.converter)?;
    let host = Host::new(converter, config);

    let scratch;
    let work_dir = match &args.work_dir {
        Some(dir) => dir.as_path(),
        None => {
            scratch = tempfile::tempdir().context("creating scratch directory")?;
            scratch.path()
        }
    };
    let outcome = round_trip_file(&host, &args.path, work_dir)
        .with_context(|| format!("round trip of {}", args.path.display()))?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        let report = &outcome.report;
        println!("  Extract: {}", outcome.extract.loss_class.to_string().cyan());
        println!("  Emit:    {}", outcome.emit.loss_class.to_string().cyan());
        println!("  Original: {}", report.original_sha256.dimmed());
        println!("  Emitted:  {}", report.emitted_sha256.dimmed());
        if report.identical {
            println!("{} Byte-identical round trip", "✓".green().bold());
        } else {
            println!(
                "{} Output differs (size delta {}, first difference at byte {})",
                "✗".red().bold(),
                report.size_delta,
                report
                    .first_difference
                    .map_or_else(|| "-".to_string(), |o| o.to_string())
            );
            for line in &report.diff {
                let styled = if line.starts_with('-') { line.red() } else { line.green() };
                println!("    {styled}");
            }
        }
    }
    Ok(if outcome.report.identical { EXIT_OK } else { EXIT_ERROR })
}
