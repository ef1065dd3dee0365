use anyhow::{anyhow, Context, Result};
use kestrel_events::argument::{ArgumentSource, PersistentArgument};
use kestrel_events::asset::EventAsset;
use kestrel_events::cli::CliOverrides;
use kestrel_events::config::EventsConfig;
use kestrel_events::converter_registry::ConverterRegistry;
use kestrel_events::logging::init_logging;
use kestrel_events::types::TypeHierarchy;
use std::env;
use std::path::Path;
use std::process;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let (overrides, rest) = CliOverrides::parse(env::args())?;
    let mut config = match overrides.config_path() {
        Some(path) => EventsConfig::load(path)?,
        None => EventsConfig::default(),
    };
    config.apply_overrides(&overrides.into_config_overrides());
    init_logging(&config.logging)?;

    let mut args = rest.into_iter();
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };
    match command.as_str() {
        "list" => {
            let path = args.next().ok_or_else(|| anyhow!("list requires a path: event_tool list <asset>"))?;
            cmd_list(&path)
        }
        "validate" => {
            let path =
                args.next().ok_or_else(|| anyhow!("validate requires a path: event_tool validate <asset>"))?;
            cmd_validate(&path)
        }
        "convert" => {
            let input = args
                .next()
                .ok_or_else(|| anyhow!("convert requires input path: event_tool convert <in> <out>"))?;
            let output = args
                .next()
                .ok_or_else(|| anyhow!("convert requires output path: event_tool convert <in> <out>"))?;
            cmd_convert(&input, &output)
        }
        "converters" => cmd_converters(),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(anyhow!("unknown command '{other}'")),
    }
}

fn print_usage() {
    eprintln!(
        "Event Tool

Usage:
  event_tool [--mode editor|runtime] [--log <filter>] [--config <path>] <command>

Commands:
  list <asset>             List the event's parameters and persistent listeners
  validate <asset>         Check listener arguments against the event's parameters
  convert <input> <output> Convert between JSON (.json) and binary (.kevents) event assets
  converters               List the built-in converter pairs
  help                     Show this message

validate checks against the built-in converters and no named subtypes. Listeners that
rely on an application's subtypes or custom converters are reported as unbindable here.
"
    );
}

fn cmd_list(path: &str) -> Result<()> {
    let asset = load_asset(path)?;
    println!("Event '{}'", asset.name);
    for (index, param) in asset.params.iter().enumerate() {
        println!("  param {index}: {} ({})", param.name, param.value_type);
    }
    println!("{:<5} {:<5} {:<14} {:<40} Arguments", "Idx", "State", "Target", "Method");
    println!("{}", "-".repeat(100));
    for (index, listener) in asset.listeners.iter().enumerate() {
        let method = listener.method().map(ToString::to_string).unwrap_or_else(|| "-".to_string());
        let arguments = listener.arguments().iter().map(describe_argument).collect::<Vec<_>>().join(", ");
        println!(
            "{:<5} {:<5} {:<14} {:<40} {}",
            index,
            listener.call_state().short_label(),
            listener.target().to_string(),
            method,
            arguments
        );
    }
    Ok(())
}

fn cmd_validate(path: &str) -> Result<()> {
    let asset = load_asset(path)?;
    let issues = asset.validate(&ConverterRegistry::new(), &TypeHierarchy::new());
    if issues.is_empty() {
        println!(
            "Event '{}' is valid. Params: {}  Listeners: {}",
            asset.name,
            asset.params.len(),
            asset.listeners.len()
        );
        Ok(())
    } else {
        let lines = issues
            .iter()
            .map(|issue| format!("listener {}: {}", issue.listener, issue.error))
            .collect::<Vec<_>>();
        Err(anyhow!("event '{}' has issues:\n  - {}", asset.name, lines.join("\n  - ")))
    }
}

fn cmd_convert(input: &str, output: &str) -> Result<()> {
    let asset = load_asset(input)?;
    asset.save_to_path(output)?;
    println!("Converted '{}' -> '{}'", input, output);
    Ok(())
}

fn cmd_converters() -> Result<()> {
    let registry = ConverterRegistry::new();
    let mut keys = registry.keys().map(ToString::to_string).collect::<Vec<_>>();
    keys.sort();
    for key in &keys {
        println!("{key}");
    }
    println!("{} built-in converters", keys.len());
    Ok(())
}

fn describe_argument(argument: &PersistentArgument) -> String {
    match &argument.source {
        ArgumentSource::Constant { value, .. } => format!("{value} as {}", argument.target_type),
        ArgumentSource::CallSite { index } => format!("param {index} as {}", argument.target_type),
    }
}

fn load_asset(path: &str) -> Result<EventAsset> {
    let normalized = Path::new(path).canonicalize().unwrap_or_else(|_| Path::new(path).to_path_buf());
    EventAsset::load_from_path(&normalized)
        .with_context(|| format!("loading event asset '{}'", normalized.display()))
}
