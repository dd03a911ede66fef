use serde::{Deserialize, Serialize};
use tdigest::TDigest;

const DIGEST_SIZE: usize = 100;
const FLUSH_AT: usize = 10_000;

/// Finalized statistics of one numeric column. Fields that are undefined for
/// the observed count are `None` rather than NaN.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumericSummary {
    pub count: u64,
    pub mean: Option<f64>,
    pub population_variance: Option<f64>,
    pub sample_variance: Option<f64>,
    /// sample standard deviation
    pub stddev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
}

/// Welford running mean/variance plus a t-digest for approximate quartiles.
#[derive(Debug, Clone)]
pub struct NumericAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    digest: TDigest,
    values_buf: Vec<f64>,
}

impl NumericAccumulator {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            digest: TDigest::new_with_size(DIGEST_SIZE),
            values_buf: Vec::new(),
        }
    }

    pub fn add(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
        if x < self.min {
            self.min = x;
        }
        if x > self.max {
            self.max = x;
        }
        self.values_buf.push(x);
        if self.values_buf.len() >= FLUSH_AT {
            self.flush();
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    fn flush(&mut self) {
        if self.values_buf.is_empty() {
            return;
        }
        let merged = self
            .digest
            .merge_unsorted(self.values_buf.drain(..).collect());
        self.digest = merged;
    }

    /// Pooled combination of two partial accumulators: exact for count,
    /// mean, M2, min and max.
    pub fn merge(&mut self, mut other: NumericAccumulator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other;
            return;
        }
        let na = self.count as f64;
        let nb = other.count as f64;
        let n = na + nb;
        let delta = other.mean - self.mean;
        self.mean += delta * nb / n;
        self.m2 += other.m2 + delta * delta * na * nb / n;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);

        self.flush();
        other.flush();
        let mine = std::mem::replace(&mut self.digest, TDigest::new_with_size(DIGEST_SIZE));
        self.digest = TDigest::merge_digests(vec![mine, other.digest]);
    }

    pub fn finish(mut self) -> NumericSummary {
        self.flush();
        if self.count == 0 {
            return NumericSummary {
                count: 0,
                mean: None,
                population_variance: None,
                sample_variance: None,
                stddev: None,
                min: None,
                max: None,
                p25: None,
                p50: None,
                p75: None,
            };
        }
        let n = self.count as f64;
        // a single observation has no spread to speak of
        let (population_variance, sample_variance) = if self.count > 1 {
            (Some(self.m2 / n), Some(self.m2 / (n - 1.0)))
        } else {
            (None, None)
        };
        NumericSummary {
            count: self.count,
            mean: Some(self.mean),
            population_variance,
            sample_variance,
            stddev: sample_variance.map(f64::sqrt),
            min: Some(self.min),
            max: Some(self.max),
            p25: Some(self.digest.estimate_quantile(0.25)),
            p50: Some(self.digest.estimate_quantile(0.50)),
            p75: Some(self.digest.estimate_quantile(0.75)),
        }
    }
}

impl Default for NumericAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
