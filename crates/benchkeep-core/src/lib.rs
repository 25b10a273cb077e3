//! # benchkeep core
//!
//! Pure logic for benchkeep: data models, compound metric decomposition,
//! the append-only history store, the ingestion pipeline and the exporter.
//!
//! This crate performs no filesystem or network I/O and needs no async
//! runtime. Loading and persisting the history document lives in the
//! `benchkeep` host crate.
//!
//! ```text
//! RawBenchRecord ──▶ decompose ──▶ MetricEntry*
//!                                      │
//! CommitDescriptor ──▶ IngestionPipeline ──▶ Snapshot ──▶ HistoryStore
//!                                                             │
//!                                                  export ◀───┘
//!                                                     │
//!                                               BenchmarkData
//! ```

pub mod decompose;
pub mod error;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod store;

pub use decompose::{bench_owners, decompose, decompose_record, Decomposition};
pub use error::{HistoryError, Result};
pub use export::{export, parse_document, render_document, BenchmarkData, DocumentFormat};
pub use models::{
    CommitDescriptor, MetricEntry, MetricPoint, Person, RawBenchRecord, SeriesKey, Snapshot,
};
pub use pipeline::{
    Clock, DistinctPolicy, FixedClock, IngestRequest, IngestionPipeline, IngestionResult,
    SystemClock,
};
pub use store::{HistoryStore, StoreOrigin};
