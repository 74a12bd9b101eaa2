// llm-router - cached, accounted LLM calls
// Author: kelexine (https://github.com/kelexine)

use anyhow::{Context, Result};
use clap::Parser;
use llm_router::cache::{make_key, Cache};
use llm_router::cli::{Args, Command};
use llm_router::clients::ClientRegistry;
use llm_router::config::AppConfig;
use llm_router::metrics::gather_metrics;
use llm_router::router::{RouteRequest, Router};
use llm_router::scoring::TermOverlapScorer;
use llm_router::usage::{CallRecorder, RollupAggregator};
use llm_router::utils::{clock, logging};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let config = AppConfig::load(args.config.as_deref())?;

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting llm-router v{}", env!("CARGO_PKG_VERSION"));
    let print_metrics = args.metrics;

    match args.command {
        Command::Key {
            model,
            prompt,
            tools,
            mode,
        } => {
            println!(
                "{}",
                make_key(&model, &prompt, &tools, &mode, &config.cache.version_tag)
            );
        }

        Command::Report { date } => {
            let date = date.unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string());
            match RollupAggregator::new().day(&config.usage.daily_path, &date) {
                Some(day) => println!("{}", serde_json::to_string_pretty(&day)?),
                None => println!("No usage recorded for {}", date),
            }
        }

        Command::Purge => {
            let cache = Cache::open(&config.cache, clock::system())?;
            let removed = cache.purge_expired()?;
            println!("Removed {} expired entries", removed);
        }

        Command::Query {
            provider,
            model,
            prompt,
            mode,
            tools,
        } => {
            let router = build_router(&config)?;
            let request = RouteRequest::new(provider, model, prompt)
                .mode(mode)
                .tools_signature(tools);
            let outcome = router.query(&request).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "cache_hit": outcome.cache_hit,
                    "result": outcome.result,
                    "record": outcome.record,
                }))?
            );
        }

        Command::Compare {
            prompt,
            targets,
            mode,
        } => {
            let router = build_router(&config)?;
            let ranked = router
                .compare(&prompt, &mode, &targets, &TermOverlapScorer)
                .await?;

            println!("Leaderboard:");
            for (place, entry) in ranked.iter().enumerate() {
                println!(
                    "{}. {} - score {:.2}{} - {}",
                    place + 1,
                    entry.item.record.model,
                    entry.score,
                    if entry.item.cache_hit { " (cached)" } else { "" },
                    entry.reason
                );
            }
        }
    }

    if print_metrics {
        eprint!("{}", gather_metrics());
    }

    Ok(())
}

fn build_router(config: &AppConfig) -> Result<Router> {
    let clock = clock::system();
    let cache = Cache::open(&config.cache, clock.clone()).context("opening response cache")?;
    let recorder = CallRecorder::open(&config.usage.per_call_path, clock)
        .with_context(|| format!("opening call log {}", config.usage.per_call_path))?;

    Ok(Router::new(
        cache,
        ClientRegistry::offline(),
        recorder,
        &config.usage.daily_path,
        config.cache.version_tag.clone(),
    ))
}
