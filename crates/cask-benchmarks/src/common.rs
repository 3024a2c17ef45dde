//! Common utilities for benchmarks

use cask_core::{Algorithm, CaskResult};
use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Payload sizes exercised by throughput benchmarks
pub const PAYLOAD_SIZES: [usize; 4] = [1024, 10_240, 102_400, 1_024_000];

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    init_tracing();
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(100)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

/// Send cache events to stderr when `RUST_LOG` asks for them
pub fn init_tracing() {
    // A second call finds a subscriber already installed; that is fine.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Deterministic content of `size` bytes
pub fn create_test_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Fill a cache root with `count` keyed entries of `size` bytes each.
///
/// Entries differ in their first bytes so each gets its own blob.
pub fn populate_cache(root: &Path, count: usize, size: usize, algorithm: Algorithm) -> CaskResult<()> {
    let base = create_test_content(size.max(8));
    for i in 0..count {
        let mut content = base.clone();
        content[..8].copy_from_slice(&(i as u64).to_le_bytes());
        content.truncate(size);
        cask_cache::write_sync_with_algo(algorithm, root, format!("entry-{}", i), &content)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populate_cache() {
        let temp_dir = tempfile::tempdir().unwrap();
        populate_cache(temp_dir.path(), 5, 64, Algorithm::Sha256).unwrap();
        assert_eq!(cask_cache::list_sync(temp_dir.path()).count(), 5);
        assert_eq!(cask_cache::read_sync(temp_dir.path(), "entry-3").unwrap().len(), 64);
    }
}
