//! In-memory latency histogram for upstream fetch instrumentation.
//! Records proxy round-trip time for requests that produced usable JSON.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencyPercentiles {
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
}

/// Shared fetch latency stats. The cached fetcher records, the API reads.
/// Values stored in microseconds.
pub struct FetchLatency {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl FetchLatency {
    /// Tracks 1us to 60s, 3 significant figures. The request timeout caps
    /// real samples well below the upper bound.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 60_000_000, 3)
            .expect("valid histogram bounds");
        Self { inner: Mutex::new(histogram) }
    }

    pub fn record_us(&self, us: u64) {
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(us);
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().min(u128::from(u64::MAX)) as u64;
        self.record_us(us);
    }

    /// None until at least one sample has been recorded.
    pub fn percentiles(&self) -> Option<LatencyPercentiles> {
        let h = self.inner.lock().ok()?;
        if h.len() == 0 {
            return None;
        }
        Some(LatencyPercentiles {
            p50_us: h.value_at_quantile(0.5),
            p95_us: h.value_at_quantile(0.95),
            p99_us: h.value_at_quantile(0.99),
        })
    }

    /// Sample count.
    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FetchLatency {
    fn default() -> Self {
        Self::new()
    }
}
