//! Render progress reporting: one atomic counter shared by every worker
//! thread, logged periodically instead of the reference renderer's
//! `\r`-overwritten `printf`, since structured logs are the idiom this crate
//! otherwise follows for observability.

use std::sync::atomic::{AtomicU64, Ordering};

/// Samples accumulated between progress log lines. Matches the reference
/// renderer's report interval.
const REPORT_INTERVAL: u64 = 10_000;

pub struct Progress {
    processed: AtomicU64,
    total: u64,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Self {
            processed: AtomicU64::new(0),
            total,
        }
    }

    /// Call once per completed sample. Logs at `REPORT_INTERVAL` boundaries;
    /// cheap to call from every worker thread since it's a single atomic add.
    pub fn advance(&self, count: u64) {
        let before = self.processed.fetch_add(count, Ordering::Relaxed);
        let after = before + count;
        if after / REPORT_INTERVAL > before / REPORT_INTERVAL {
            let percent = 100.0 * after as f64 / self.total.max(1) as f64;
            tracing::info!(percent = format!("{percent:.1}"), "rendering progress");
        }
    }

    pub fn finish(&self) {
        tracing::info!(percent = "100.0", "rendering progress");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_accumulates_total_processed() {
        let progress = Progress::new(100);
        progress.advance(40);
        progress.advance(60);
        assert_eq!(progress.processed.load(Ordering::Relaxed), 100);
    }
}
