//! Command-line argument parsing for fragsql.
//!
//! Uses clap to parse the global options and the subcommands.

use crate::config::Config;
use crate::engine::ExplainDetail;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Streaming SQL with reusable fragments and plan introspection.
#[derive(Parser, Debug)]
#[command(name = "fragsql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", env = "FRAGSQL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Disable `name := sql` definitions and `${name}` expansion
    #[arg(long, global = true)]
    pub no_fragments: bool,

    /// Parallelism of translated operators (overrides config)
    #[arg(long, value_name = "N", global = true)]
    pub parallelism: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Explain every statement of a script as JSON records
    Explain(ExplainArgs),

    /// Print the execution graph of the last statement of a script
    Graph {
        /// Script file ("-" for stdin)
        #[arg(value_name = "FILE")]
        input: String,
    },

    /// Execute a script and print each result
    Exec {
        /// Script file ("-" for stdin)
        #[arg(value_name = "FILE")]
        input: String,
    },

    /// Print completion hints for a statement
    Complete {
        /// Statement text
        sql: String,

        /// Cursor position (defaults to the end of the statement)
        #[arg(long, value_name = "N")]
        position: Option<usize>,
    },

    /// Execute a script and list the fragments it defined
    Fragments {
        /// Script file ("-" for stdin)
        #[arg(value_name = "FILE")]
        input: String,
    },
}

/// Arguments of the `explain` subcommand.
#[derive(Args, Debug, PartialEq, Eq)]
pub struct ExplainArgs {
    /// Script file ("-" for stdin)
    #[arg(value_name = "FILE")]
    pub input: String,

    /// Include row-count estimates
    #[arg(long)]
    pub estimated_cost: bool,

    /// Include changelog modes
    #[arg(long)]
    pub changelog_mode: bool,

    /// Append the execution plan as JSON
    #[arg(long)]
    pub json_plan: bool,
}

impl ExplainArgs {
    /// Returns the requested explain details.
    pub fn details(&self) -> Vec<ExplainDetail> {
        [
            (self.estimated_cost, ExplainDetail::EstimatedCost),
            (self.changelog_mode, ExplainDetail::ChangelogMode),
            (self.json_plan, ExplainDetail::JsonExecutionPlan),
        ]
        .into_iter()
        .filter_map(|(enabled, detail)| enabled.then_some(detail))
        .collect()
    }
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies command-line overrides to a loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if self.no_fragments {
            config.environment.use_sql_fragment = false;
        }
        if let Some(parallelism) = self.parallelism {
            config.environment.parallelism = parallelism;
        }
    }
}
