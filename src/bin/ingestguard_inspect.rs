use std::env;
use std::error::Error;
use std::io;
use std::sync::Arc;

use ingestguard::{
    DynamicRecord, FormatKind, IngestEngine, InputSpec, ReaderConfig, StdinInput, write_records,
};

fn print_usage_and_exit() -> ! {
    eprintln!("Usage:");
    eprintln!("  ingestguard_inspect [--config <file>] [--format <csv|json|yaml>] [--emit <format>] <input>");
    eprintln!();
    eprintln!("Use '-' as <input> to read stdin (requires --format).");
    std::process::exit(1);
}

struct Args {
    config: Option<String>,
    format: Option<FormatKind>,
    emit: FormatKind,
    input: String,
}

fn parse_format(flag: &str, value: Option<String>) -> Result<FormatKind, Box<dyn Error>> {
    let value = value.ok_or_else(|| format!("{} requires a value", flag))?;
    FormatKind::from_str(&value).ok_or_else(|| format!("unknown format: {}", value).into())
}

fn parse_args() -> Result<Args, Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let mut config = None;
    let mut format = None;
    let mut emit = FormatKind::Json;
    let mut input = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(args.next().ok_or("--config requires a path")?);
            }
            "--format" => format = Some(parse_format("--format", args.next())?),
            "--emit" => emit = parse_format("--emit", args.next())?,
            "-h" | "--help" => print_usage_and_exit(),
            _ if input.is_none() => input = Some(arg),
            _ => return Err(format!("unexpected argument: {}", arg).into()),
        }
    }

    let input = input.ok_or("missing input")?;
    Ok(Args {
        config,
        format,
        emit,
        input,
    })
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => ReaderConfig::from_path(path)?,
        None => ReaderConfig::new(),
    };

    let mut spec = if args.input == "-" {
        InputSpec::new("-", Arc::new(StdinInput::new()))
    } else {
        InputSpec::from_path(&args.input)
    };
    if let Some(format) = args.format {
        spec = spec.with_format(format);
    }

    let engine = IngestEngine::from_config(&config)?;
    let read = config.read_options()?;
    let metrics = read.metrics().clone();

    let records: Vec<DynamicRecord> = engine.read_all(&spec, read)?;
    write_records(args.emit, &records, &mut io::stdout().lock())?;

    let snapshot = metrics.snapshot();
    eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
    log::info!(
        "{}: {} records, {} errors",
        args.input,
        snapshot.records_emitted,
        snapshot.error_count
    );
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("ingestguard_inspect error: {e}");
        print_usage_and_exit();
    }
}
