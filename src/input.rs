//! Reading benchmark results and commit descriptors from CI artifacts.
//!
//! Two result formats are understood:
//!
//! | Format | Source |
//! |--------|--------|
//! | `json` | array of `{name, value, unit, extra?}` objects |
//! | `go`   | raw `go test -bench` output |
//!
//! Go lines look like
//! `BenchmarkRouteRequest-4   1   3147699311 ns/op   214536 B/op   609 allocs/op`.
//! The `-4` suffix becomes `extra = "1 times\n4 procs"` and everything after
//! the first measurement is kept verbatim as the unit, so the compound form
//! survives for decomposition.

use anyhow::{bail, Context, Result};
use benchkeep_core::decompose::parse_number;
use benchkeep_core::{CommitDescriptor, RawBenchRecord};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InputFormat {
    #[default]
    Json,
    Go,
}

pub fn parse_records(text: &str, format: InputFormat) -> Result<Vec<RawBenchRecord>> {
    match format {
        InputFormat::Json => {
            serde_json::from_str(text).context("Failed to parse benchmark records as JSON")
        }
        InputFormat::Go => Ok(parse_go_bench(text)),
    }
}

pub fn read_records(path: &Path, format: InputFormat) -> Result<Vec<RawBenchRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read benchmark output: {}", path.display()))?;
    let records = parse_records(&text, format)?;
    if records.is_empty() {
        bail!("no benchmark results found in {}", path.display());
    }
    Ok(records)
}

/// Extract one record per benchmark result line; other lines are ignored.
pub fn parse_go_bench(text: &str) -> Vec<RawBenchRecord> {
    text.lines().filter_map(parse_go_line).collect()
}

fn parse_go_line(line: &str) -> Option<RawBenchRecord> {
    let fields = tokens(line);
    if fields.len() < 4 {
        return None;
    }
    let (_, full_name) = fields[0];
    if !full_name.starts_with("Benchmark") {
        return None;
    }
    let (_, times) = fields[1];
    if times.parse::<u64>().is_err() {
        return None;
    }
    let value = parse_number(fields[2].1)?;
    let (unit_start, _) = fields[3];
    let unit = line[unit_start..].trim_end();

    let (name, procs) = match full_name.rsplit_once('-') {
        Some((base, procs)) if !procs.is_empty() && procs.bytes().all(|b| b.is_ascii_digit()) => {
            (base, Some(procs))
        }
        _ => (full_name, None),
    };

    let mut extra = format!("{times} times");
    if let Some(procs) = procs {
        extra.push_str(&format!("\n{procs} procs"));
    }

    Some(RawBenchRecord::new(name, value, unit, extra))
}

/// Whitespace-separated tokens with their byte offsets in `line`.
fn tokens(line: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                out.push((s, &line[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, &line[s..]));
    }
    out
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CommitFile {
    Event { head_commit: CommitDescriptor },
    Commit(CommitDescriptor),
}

/// Read a commit descriptor, either bare or as the `head_commit` of a push
/// event payload.
pub fn read_commit(path: &Path) -> Result<CommitDescriptor> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read commit file: {}", path.display()))?;
    let commit = match serde_json::from_str::<CommitFile>(&text)
        .with_context(|| format!("Failed to parse commit descriptor: {}", path.display()))?
    {
        CommitFile::Event { head_commit } => head_commit,
        CommitFile::Commit(commit) => commit,
    };
    Ok(commit)
}
