//! `cadence` command line: validate, convert, resolve and run scenarios

use anyhow::{bail, Context, Result};
use cadence_engine::{Dispatcher, EchoHandler, EngineConfig, SessionManager, SessionState};
use cadence_resolver::{Resolver, StepContext};
use cadence_scenario::{convert, load_path, Format};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("cadence")
        .version(cadence_engine::VERSION)
        .about("Scenario interpreter for conversational and task agents")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Engine configuration file (TOML)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a scenario file and report warnings")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a scenario between JSON and YAML")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .required(true)
                        .value_parser(["json", "yaml"])
                        .help("Target format"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Show how an action reference resolves to a capability")
                .arg(Arg::new("reference").required(true))
                .arg(
                    Arg::new("param")
                        .long("param")
                        .action(ArgAction::Append)
                        .help("Step parameter as key=value"),
                )
                .arg(
                    Arg::new("description")
                        .long("description")
                        .help("Step description used as a resolution hint"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Run a scenario with the echo handler")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("context")
                        .long("context")
                        .action(ArgAction::Append)
                        .help("Initial context entry as key=value"),
                )
                .arg(
                    Arg::new("input")
                        .long("input")
                        .action(ArgAction::Append)
                        .help("Value fed to the next input step (repeatable)"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Parse a value as JSON, falling back to a plain string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn parse_pairs(args: &ArgMatches, name: &str) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for pair in args.get_many::<String>(name).into_iter().flatten() {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("--{name} expects key=value, got '{pair}'");
        };
        map.insert(key.trim().to_string(), parse_value(value));
    }
    Ok(map)
}

fn load_config(matches: &ArgMatches) -> Result<EngineConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn file_arg(args: &ArgMatches) -> Result<&Path> {
    args.get_one::<PathBuf>("file")
        .map(PathBuf::as_path)
        .context("missing scenario file")
}

fn validate(config: &EngineConfig, args: &ArgMatches) -> Result<()> {
    let path = file_arg(args)?;
    let registry = config.build_registry()?;
    let loaded = load_path(path, &registry)?;
    println!(
        "{}: valid ({} steps, entry '{}')",
        loaded.scenario.id(),
        loaded.scenario.len(),
        loaded.scenario.entry()
    );
    for warning in &loaded.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}

fn convert_file(config: &EngineConfig, args: &ArgMatches) -> Result<()> {
    let path = file_arg(args)?;
    let from = Format::from_path(path)
        .with_context(|| format!("cannot infer format of {}", path.display()))?;
    let to = args
        .get_one::<String>("to")
        .and_then(|name| Format::from_name(name))
        .context("--to must be json or yaml")?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let registry = config.build_registry()?;
    print!("{}", convert(&raw, from, to, &registry)?);
    Ok(())
}

fn resolve(config: &EngineConfig, args: &ArgMatches) -> Result<()> {
    let reference = args
        .get_one::<String>("reference")
        .context("missing reference")?;
    let params = parse_pairs(args, "param")?;
    let description = args.get_one::<String>("description").map(String::as_str);

    let resolver = Resolver::new(Arc::new(config.build_registry()?));
    let result = resolver.resolve(reference, &StepContext::new(&params).with_description(description));
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run(config: EngineConfig, args: &ArgMatches) -> Result<()> {
    let path = file_arg(args)?;
    let initial = parse_pairs(args, "context")?;
    let inputs: Vec<Value> = args
        .get_many::<String>("input")
        .into_iter()
        .flatten()
        .map(|raw| parse_value(raw))
        .collect();

    let manager = SessionManager::new(config, Dispatcher::single(Arc::new(EchoHandler)))?;
    let loaded = load_path(path, manager.registry())?;
    let scenario = manager.register_scenario(loaded.scenario);

    let id = manager.start(scenario.id(), initial).await?;
    let mut status = manager.status(id).await?;
    let mut inputs = inputs.into_iter();
    while status.state == SessionState::WaitingForInput {
        let Some(value) = inputs.next() else { break };
        status = manager.resume(id, value).await?;
    }
    if inputs.len() > 0 {
        tracing::warn!(unused = inputs.len(), "session finished before all inputs were used");
    }

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("validate", args)) => validate(&config, args),
        Some(("convert", args)) => convert_file(&config, args),
        Some(("resolve", args)) => resolve(&config, args),
        Some(("run", args)) => run(config, args).await,
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn pairs_parse_json_or_text() {
        let matches = cli()
            .try_get_matches_from([
                "cadence", "run", "s.yaml", "--context", "n=3", "--context", "name=Ada",
                "--context", "tags=[\"a\"]",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let map = parse_pairs(args, "context").unwrap();
        assert_eq!(Value::Object(map), json!({"n": 3, "name": "Ada", "tags": ["a"]}));
    }

    #[test]
    fn malformed_pair_is_rejected() {
        let matches = cli()
            .try_get_matches_from(["cadence", "resolve", "echo", "--param", "oops"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert!(parse_pairs(args, "param").is_err());
    }
}
