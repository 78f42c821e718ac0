use tracing::debug;

use crate::error::{Error, Result};

/// Reference value printed next to each estimate
pub const PI_TARGET: f64 = 3.141592653589;

/// A way of summing the Leibniz series
/// X = 4 - 4/3 + 4/5 - 4/7 + 4/9 ...
pub trait Estimator {
    fn name(&self) -> &'static str;

    /// Sum the first `terms` terms. Negative counts are rejected.
    fn estimate(&self, terms: i64) -> Result<f64>;
}

/// Estimate pi by summing `terms` terms in increasing order.
///
/// The result is bit-for-bit reproducible for a given `terms`.
pub fn estimate_series(terms: i64) -> Result<f64> {
    SequentialEstimator.estimate(terms)
}

fn validate_terms(terms: i64) -> Result<u64> {
    u64::try_from(terms)
        .map_err(|_| Error::invalid(format!("term count must be non-negative, got {}", terms)))
}

/// Sum terms `start..end` of the series, lowest index first
fn leibniz_partial(start: u64, end: u64) -> f64 {
    let mut sum = 0.0;
    let mut sign = if start % 2 == 0 { 1.0 } else { -1.0 };
    let mut denominator = 2.0 * start as f64 + 1.0;

    for _ in start..end {
        sum += sign * 4.0 / denominator;
        denominator += 2.0;
        sign = -sign;
    }

    sum
}

/// Single-threaded summation in strictly increasing term order
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialEstimator;

impl Estimator for SequentialEstimator {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn estimate(&self, terms: i64) -> Result<f64> {
        let terms = validate_terms(terms)?;
        let estimate = leibniz_partial(0, terms);
        debug!("Sequential estimate over {} terms: {}", terms, estimate);
        Ok(estimate)
    }
}

/// Splits the term range into contiguous chunks summed on scoped threads.
///
/// Chunk sums are added in chunk order, so the result is reproducible for a
/// fixed `(terms, workers)` pair. It is not bit-identical to the sequential
/// sum unless `workers == 1`.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedEstimator {
    workers: usize,
}

impl ChunkedEstimator {
    /// Upper bound on scoped threads spawned per estimate
    pub const MAX_WORKERS: usize = 1024;

    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 || workers > Self::MAX_WORKERS {
            return Err(Error::invalid(format!(
                "worker count must be between 1 and {}, got {}",
                Self::MAX_WORKERS,
                workers
            )));
        }
        Ok(Self { workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn chunks(&self, terms: u64) -> Vec<(u64, u64)> {
        if terms == 0 {
            return Vec::new();
        }
        let workers = self.workers as u64;
        let chunk_size = terms.div_ceil(workers);

        (0..workers)
            .map(|worker| worker * chunk_size)
            .take_while(|&start| start < terms)
            .map(|start| (start, (start + chunk_size).min(terms)))
            .collect()
    }
}

impl Default for ChunkedEstimator {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().clamp(1, Self::MAX_WORKERS),
        }
    }
}

impl Estimator for ChunkedEstimator {
    fn name(&self) -> &'static str {
        "chunked"
    }

    fn estimate(&self, terms: i64) -> Result<f64> {
        let terms = validate_terms(terms)?;
        let chunks = self.chunks(terms);
        debug!(
            "Chunked estimate over {} terms using {} chunks ({} workers)",
            terms,
            chunks.len(),
            self.workers
        );

        let partials = crossbeam::scope(|scope| {
            let handles: Vec<_> = chunks
                .iter()
                .map(|&(start, end)| scope.spawn(move |_| leibniz_partial(start, end)))
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<std::thread::Result<Vec<f64>>>()
        })
        .map_err(|_| Error::WorkerPanicked)?
        .map_err(|_| Error::WorkerPanicked)?;

        Ok(partials.iter().sum())
    }
}
