//! # benchkeep
//!
//! Append-only benchmark history for CI.
//!
//! Each CI run hands benchkeep the commit it built and the raw results of
//! its benchmark harness. Compound results (Go's
//! `ns/op  B/op  allocs/op` lines) are decomposed into one metric series
//! per measurement, and everything from the run is recorded as a single
//! snapshot keyed by commit. The history is kept as one `data.js` /
//! `data.json` document that a static chart page can load directly.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ CI artifacts │──▶│ IngestionPipeline│──▶│ HistoryStore │
//! │ commit+bench │   │   (decompose)    │   │  per group   │
//! └──────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                  │ export
//!                                           ┌──────▼───────┐
//!                                           │ FileBackend  │
//!                                           │ lock + CAS   │
//!                                           └──────────────┘
//! ```
//!
//! The pure parts (models, decomposition, store, pipeline, document codec)
//! live in the `benchkeep-core` crate. This crate adds configuration,
//! persistence and the CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! benchkeep init
//! go test -bench . ./... | tee bench.txt
//! benchkeep ingest --commit commit.json --input bench.txt --format go
//! benchkeep query --group "Go Benchmarks" --bench BenchmarkRouteRequest
//! benchkeep export --output dev/bench/data.js
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`backend`] | Persisted document storage with conflict detection |
//! | [`history`] | Load → ingest → save cycle, `init` |
//! | [`input`] | Benchmark output and commit file parsing |
//! | [`ingest`] | `ingest` command |
//! | [`export`] | `export` command |
//! | [`query`] | `query` command |
//! | [`stats`] | `stats` command |
//! | [`logging`] | tracing subscriber setup |

pub mod backend;
pub mod config;
pub mod export;
pub mod history;
pub mod ingest;
pub mod input;
pub mod logging;
pub mod query;
pub mod stats;
