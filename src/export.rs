//! The `benchkeep export` command.
//!
//! Renders the persisted history as a `data.js` / `data.json` document for
//! the static chart page, or for piping into other tools. The history is
//! re-serialized from the store rather than copied, so the output is the
//! canonical rendering regardless of how the stored file was formatted.

use anyhow::{Context, Result};
use benchkeep_core::{export, render_document, DocumentFormat};
use std::path::Path;

use crate::config::Config;
use crate::history::{file_backend, open_history};

/// Export the history.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping. Without an explicit format the output path's
/// extension decides, then the configured store format.
pub async fn run_export(
    config: &Config,
    output: Option<&Path>,
    format: Option<DocumentFormat>,
) -> Result<()> {
    let backend = file_backend(config);
    let history = open_history(&backend, config.repository.url.trim())
        .await
        .with_context(|| format!("Failed to open history at {}", config.store.path.display()))?;

    let format = format.unwrap_or_else(|| match output {
        Some(path) if path.extension().is_some() => DocumentFormat::from_path(path),
        _ => config.store.format(),
    });

    let data = export(&history.store);
    let rendered = render_document(&data, format)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "Exported {} snapshots in {} groups to {}",
                data.snapshot_count(),
                data.entries.len(),
                path.display()
            );
        }
        None => {
            print!("{}", rendered);
        }
    }

    Ok(())
}
