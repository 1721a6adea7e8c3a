#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;

use anyhow::{Result, bail};
use prefsync_core::config::resolve_agent_config;
use prefsync_sim::{CampaignConfig, run_campaign};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PREFSYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "prefsync=debug,info"
        } else {
            "prefsync=info,warn"
        })
    });

    let format = env::var("PREFSYNC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    // A campaign file sets every parameter; otherwise the agent config
    // (PREFSYNC_CONFIG, or the user config directory) supplies the retry bound.
    let config = match env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => CampaignConfig::load(&path)?,
        None => {
            let agent_path = env::var_os("PREFSYNC_CONFIG").map(PathBuf::from);
            CampaignConfig::for_agent(&resolve_agent_config(agent_path.as_deref())?)
        }
    };
    info!(
        seeds = ?config.seed_range,
        max_retries = config.max_retries,
        "starting campaign"
    );
    let report = run_campaign(&config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.all_passed() {
        bail!(
            "{} of {} seeds failed, first at seed {:?}",
            report.failures.len(),
            report.seeds_run,
            report.first_failure
        );
    }
    Ok(())
}
