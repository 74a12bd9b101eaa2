// CLI module for llm-router
// Author: kelexine (https://github.com/kelexine)

use clap::{Parser, Subcommand};

/// llm-router - cached, accounted LLM calls
#[derive(Parser, Debug)]
#[command(name = "llm-router", version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML config file (default: ~/.llm-router/config.toml)
    #[arg(long, global = true, env = "LLM_ROUTER_CONFIG")]
    pub config: Option<String>,

    /// Print this run's Prometheus counters to stderr on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Route one prompt to one model
    Query {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value = "balanced")]
        mode: String,
        /// Signature of the tool set offered to the model
        #[arg(long, default_value = "")]
        tools: String,
    },

    /// Route one prompt to several models and rank the answers
    Compare {
        #[arg(long)]
        prompt: String,
        /// Target as provider:model, repeatable
        #[arg(long = "target", required = true, value_parser = parse_target)]
        targets: Vec<(String, String)>,
        #[arg(long, default_value = "balanced")]
        mode: String,
    },

    /// Print the usage rollup for a day (default: today, UTC)
    Report {
        #[arg(long)]
        date: Option<String>,
    },

    /// Print the cache key for a call without routing it
    Key {
        #[arg(long)]
        model: String,
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value = "")]
        tools: String,
        #[arg(long, default_value = "balanced")]
        mode: String,
    },

    /// Drop expired entries from the local cache file
    Purge,
}

/// Parse `provider:model`.
pub fn parse_target(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
            Ok((provider.to_string(), model.to_string()))
        }
        _ => Err(format!("expected provider:model, got '{}'", raw)),
    }
}
