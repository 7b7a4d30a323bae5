//! The tsi CLI: run a TypeScript-subset source file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tsi::{DecoratorMode, RunReport};
use tsi_common::diagnostics::{Diagnostic, DiagnosticCategory};
use tsi_common::options::EngineOptions;
use tsi_common::position::LineMap;

#[derive(Parser)]
#[command(name = "tsi", version, about = "TypeScript-subset execution engine")]
struct Cli {
    /// Source file to run
    file: PathBuf,

    /// Enable strict checking and runtime strict mode
    #[arg(long)]
    strict: bool,

    /// Decorator syntax mode
    #[arg(long, value_parser = parse_decorator_mode)]
    decorators: Option<DecoratorMode>,

    /// Attach design-time type metadata to decorated members
    #[arg(long)]
    emit_decorator_metadata: bool,

    /// Keep const enums as runtime objects instead of inlining
    #[arg(long)]
    preserve_const_enums: bool,

    /// Advance the virtual clock through pending timers after the program
    /// finishes (timers never fire otherwise)
    #[arg(long)]
    flush_timers: bool,

    /// Resolve the file's imports and run it as a module graph
    #[arg(long)]
    module: bool,

    /// Base directory for relative import lookup
    #[arg(long)]
    module_root: Option<PathBuf>,

    /// Print diagnostics as JSON
    #[arg(long)]
    json: bool,
}

fn parse_decorator_mode(text: &str) -> Result<DecoratorMode, String> {
    match text {
        "none" => Ok(DecoratorMode::None),
        "legacy" => Ok(DecoratorMode::Legacy),
        "stage3" => Ok(DecoratorMode::Stage3),
        other => Err(format!(
            "unknown decorator mode '{other}' (expected none, legacy or stage3)"
        )),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run_cli() {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> Result<ExitCode> {
    let cli = Cli::parse();
    let options = EngineOptions {
        strict: cli.strict,
        decorator_mode: cli.decorators.unwrap_or_default(),
        emit_decorator_metadata: cli.emit_decorator_metadata,
        preserve_const_enums: cli.preserve_const_enums,
        flush_timers: cli.flush_timers,
        module_resolution_root: cli.module_root.clone(),
        ..Default::default()
    };

    let report = if cli.module {
        tsi::run_module(&cli.file, &options).context("engine fault")?
    } else {
        let source = std::fs::read_to_string(&cli.file)
            .with_context(|| format!("cannot read {}", cli.file.display()))?;
        let report = tsi::run(&source, &options).context("engine fault")?;
        print_diagnostics(&report, &source, &cli);
        return Ok(finish(&report));
    };

    // Module runs render without per-file source context.
    print_diagnostics(&report, "", &cli);
    Ok(finish(&report))
}

fn finish(report: &RunReport) -> ExitCode {
    if let Some(error) = &report.unhandled_error {
        eprintln!("{} {error}", "uncaught".red().bold());
    }
    if report.exit_code() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_diagnostics(report: &RunReport, source: &str, cli: &Cli) {
    if report.diagnostics.is_empty() {
        return;
    }
    if cli.json {
        if let Ok(text) = serde_json::to_string_pretty(&report.diagnostics) {
            eprintln!("{text}");
        }
        return;
    }
    let line_map = LineMap::build(source);
    for diagnostic in &report.diagnostics {
        print_human(diagnostic, source, &line_map);
    }
    let errors = report
        .diagnostics
        .iter()
        .filter(|d| d.is_error())
        .count();
    if errors > 0 {
        eprintln!("{}", format!("{errors} error(s)").red().bold());
    }
}

fn print_human(diagnostic: &Diagnostic, source: &str, line_map: &LineMap) {
    let severity = match diagnostic.category {
        DiagnosticCategory::Error => "error".red().bold(),
        DiagnosticCategory::Warning => "warning".yellow().bold(),
        DiagnosticCategory::Message => "note".cyan().bold(),
    };
    let position = line_map.offset_to_position(diagnostic.start, source);
    eprintln!(
        "{}:{}:{} {severity} TS{}: {}",
        diagnostic.file,
        position.line + 1,
        position.character + 1,
        diagnostic.code,
        diagnostic.message_text
    );
}
