use std::num::NonZeroUsize;

mod env_vars;

pub use env_vars::EnvVars;

/// Returns the default number of concurrent shards.
///
/// Honours [`EnvVars::SHARDCI_MAX_PARALLELISM`] when it holds a positive integer,
/// otherwise falls back to the number of logical CPUs.
pub fn max_parallelism() -> NonZeroUsize {
    std::env::var(EnvVars::SHARDCI_MAX_PARALLELISM)
        .ok()
        .and_then(|value| value.trim().parse::<NonZeroUsize>().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
        })
}
