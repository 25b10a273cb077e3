//! Log output for the `benchkeep` binary.
//!
//! Events go to stderr so that `export` and `query` output on stdout can be
//! piped. The filter comes from `BENCHKEEP_LOG`, then `RUST_LOG`, and
//! defaults to `warn`.

use tracing_subscriber::EnvFilter;

pub const ENV_LOG: &str = "BENCHKEEP_LOG";

const DEFAULT_FILTER: &str = "warn";

fn filter_directive() -> String {
    std::env::var(ENV_LOG)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| DEFAULT_FILTER.to_string())
}

pub fn init_logging() {
    let filter = EnvFilter::try_new(filter_directive())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // A second call (tests embedding the library) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .compact()
        .with_env_filter(filter)
        .try_init();
}
