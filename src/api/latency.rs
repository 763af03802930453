//! Ingest latency: time from request decode to the last broadcast enqueue,
//! overall and per event kind.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::{CreationError, Histogram};
use serde::Serialize;

/// 1us to 100s, 3 significant figures.
const LOWEST_US: u64 = 1;
const HIGHEST_US: u64 = 100_000_000;

fn new_histogram() -> Result<Histogram<u64>, CreationError> {
    Histogram::new_with_bounds(LOWEST_US, HIGHEST_US, 3)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Percentiles {
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
    pub samples: u64,
}

impl Percentiles {
    fn of(h: &Histogram<u64>) -> Self {
        if h.len() == 0 {
            return Self::default();
        }
        Self {
            p50_us: Some(h.value_at_quantile(0.5)),
            p95_us: Some(h.value_at_quantile(0.95)),
            p99_us: Some(h.value_at_quantile(0.99)),
            samples: h.len(),
        }
    }
}

/// Shared ingest latency. The gateway records accepted events, the API reads.
pub struct LatencyStats {
    overall: Mutex<Histogram<u64>>,
    by_kind: Mutex<BTreeMap<String, Histogram<u64>>>,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            overall: Mutex::new(new_histogram().expect("valid histogram bounds")),
            by_kind: Mutex::new(BTreeMap::new()),
        }
    }

    /// Values outside the tracked range are clamped.
    pub fn record_us(&self, kind: &str, us: u64) {
        let us = us.clamp(LOWEST_US, HIGHEST_US);
        if let Ok(mut h) = self.overall.lock() {
            let _ = h.record(us);
        }
        let Ok(mut by_kind) = self.by_kind.lock() else {
            return;
        };
        if !by_kind.contains_key(kind) {
            let Ok(h) = new_histogram() else {
                return;
            };
            by_kind.insert(kind.to_string(), h);
        }
        if let Some(h) = by_kind.get_mut(kind) {
            let _ = h.record(us);
        }
    }

    pub fn record(&self, kind: &str, d: Duration) {
        let us = d.as_micros().min(u128::from(u64::MAX)) as u64;
        self.record_us(kind, us);
    }

    pub fn overall(&self) -> Percentiles {
        self.overall
            .lock()
            .map(|h| Percentiles::of(&h))
            .unwrap_or_default()
    }

    pub fn by_kind(&self) -> BTreeMap<String, Percentiles> {
        let Ok(by_kind) = self.by_kind.lock() else {
            return BTreeMap::new();
        };
        by_kind
            .iter()
            .map(|(kind, h)| (kind.clone(), Percentiles::of(h)))
            .collect()
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
