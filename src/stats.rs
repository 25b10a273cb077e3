//! History statistics.
//!
//! Provides a quick summary of what's recorded: snapshot and series counts
//! per tool group and when the history was last updated. Used by
//! `benchkeep stats` to confirm that CI runs are landing.

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};

use crate::config::Config;
use crate::history::{file_backend, open_history};

/// Per-group breakdown.
struct GroupStats {
    name: String,
    snapshots: usize,
    series: usize,
    benches: usize,
    last_commit: Option<String>,
}

/// Run the stats command: load the history and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let backend = file_backend(config);
    let history = open_history(&backend, config.repository.url.trim())
        .await
        .with_context(|| format!("Failed to open history at {}", config.store.path.display()))?;
    let store = &history.store;

    let groups: Vec<GroupStats> = store
        .groups()
        .into_iter()
        .map(|name| {
            let keys = store.series_keys(&name);
            let benches = keys.iter().filter(|k| k.is_primary()).count();
            let last_commit = store
                .snapshots(&name)
                .last()
                .map(|s| s.commit.id.clone());
            GroupStats {
                snapshots: store.snapshot_count(&name),
                series: keys.len(),
                benches,
                last_commit,
                name,
            }
        })
        .collect();

    println!("benchkeep History Stats");
    println!("=======================");
    println!();
    println!("  Document:    {}", config.store.path.display());
    println!("  Repository:  {}", store.repo_url());
    println!("  Updated:     {}", format_millis(store.last_update()));
    println!();

    if history.is_new() {
        println!("  No history recorded yet. Run `benchkeep init` or `benchkeep ingest`.");
        return Ok(());
    }

    println!(
        "  {:<28} {:>9} {:>8} {:>8}  {}",
        "GROUP", "SNAPSHOTS", "BENCHES", "SERIES", "LAST COMMIT"
    );
    for group in &groups {
        println!(
            "  {:<28} {:>9} {:>8} {:>8}  {}",
            group.name,
            group.snapshots,
            group.benches,
            group.series,
            group.last_commit.as_deref().map_or("-", short_id)
        );
    }

    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn format_millis(millis: i64) -> String {
    if millis <= 0 {
        return "never".to_string();
    }
    match Utc.timestamp_millis_opt(millis).single() {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => millis.to_string(),
    }
}
