//! fragsql - SQL fragments and plan introspection for a table-SQL engine.

use std::io::Read;

use anyhow::{anyhow, Context};
use fragsql::cli::{Cli, Command};
use fragsql::config::Config;
use fragsql::{logging, FragmentEnvironment, FragsqlError};
use tracing::{error, info};

fn main() {
    logging::init_stderr_logging();

    if let Err(e) = run() {
        match e.downcast_ref::<FragsqlError>() {
            Some(err) => error!("{}: {}", err.category(), err),
            None => error!("{e:#}"),
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.environment.apply_env_overrides()?;
    cli.apply_overrides(&mut config);

    let mut env = FragmentEnvironment::local(&config)?;

    match &cli.command {
        Command::Explain(args) => {
            let script = read_input(&args.input)?;
            let records = env.explain_script(&script, &args.details());
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Graph { input } => {
            let script = read_input(input)?;
            let statements = env.split_script(&script);
            let (last, setup) = statements
                .split_last()
                .ok_or_else(|| anyhow!("Script '{input}' contains no statements"))?;
            for sql in setup {
                env.execute_sql(sql)?;
            }
            let graph = env.stream_graph(last)?;
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
        Command::Exec { input } => {
            let script = read_input(input)?;
            for result in env.execute_script(&script)? {
                println!("{}", result.to_pretty_string());
            }
        }
        Command::Complete { sql, position } => {
            let position = position.unwrap_or(sql.len());
            for hint in env.completion_hints(sql, position)? {
                println!("{hint}");
            }
        }
        Command::Fragments { input } => {
            let script = read_input(input)?;
            env.execute_script(&script)?;
            println!("{}", env.fragments().fragments_result().to_pretty_string());
        }
    }

    Ok(())
}

/// Reads a script from a file, or from stdin when `input` is "-".
fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .context("Failed to read script from stdin")?;
        return Ok(script);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read script '{input}'"))
}
