use hyperloglog::HyperLogLog;

// hyperloglog derives the register count as ceil(ln((1.04 / rate)^2)), so this
// rate selects 2^14 registers: standard error 1.04 / sqrt(16384), about 0.81%.
const ERROR_RATE: f64 = 0.0013;
const SEED: u128 = 0x6373_765f_6c65_6e73_5f68_6c6c_5f6b_6579;

/// Approximate distinct count. Keys are fixed, so the same input always gives
/// the same estimate, and any two estimators can be merged.
pub struct HllEstimator {
    hll: HyperLogLog,
}

impl HllEstimator {
    pub fn new() -> Self {
        Self {
            hll: HyperLogLog::new_deterministic(ERROR_RATE, SEED),
        }
    }

    pub fn fork(&self) -> Self {
        Self {
            hll: HyperLogLog::new_from_template(&self.hll),
        }
    }

    pub fn add(&mut self, value: &str) {
        self.hll.insert(&value);
    }

    pub fn merge(&mut self, other: &HllEstimator) {
        self.hll.merge(&other.hll);
    }

    pub fn estimate(&self) -> u64 {
        self.hll.len().round() as u64
    }
}

impl Default for HllEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HllEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HllEstimator")
            .field("estimate", &self.estimate())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_within_a_few_percent() {
        let mut h = HllEstimator::new();
        for i in 0..10_000 {
            h.add(&format!("user-{i}"));
            h.add(&format!("user-{i}")); // duplicates don't count
        }
        let est = h.estimate() as f64;
        assert!((est - 10_000.0).abs() / 10_000.0 < 0.03, "estimate {est}");
    }

    #[test]
    fn error_stays_near_one_percent_across_cardinalities() {
        let mut worst = 0.0f64;
        for n in [1_000u64, 5_000, 20_000, 50_000] {
            let mut h = HllEstimator::new();
            for i in 0..n {
                h.add(&format!("row-{n}-{i}"));
            }
            let err = (h.estimate() as f64 - n as f64).abs() / n as f64;
            worst = worst.max(err);
        }
        assert!(worst < 0.03, "worst relative error {worst}");
    }

    #[test]
    fn same_input_same_estimate() {
        let fill = |h: &mut HllEstimator| {
            for i in 0..3_000 {
                h.add(&format!("id-{i}"));
            }
        };
        let mut a = HllEstimator::new();
        let mut b = HllEstimator::new();
        fill(&mut a);
        fill(&mut b);
        assert_eq!(a.estimate(), b.estimate());

        let mut merged = HllEstimator::new();
        for chunk in 0..7 {
            let mut part = merged.fork();
            for i in (chunk * 500..(chunk + 1) * 500).filter(|i| *i < 3_000) {
                part.add(&format!("id-{i}"));
            }
            merged.merge(&part);
        }
        assert_eq!(merged.estimate(), a.estimate());
    }

    #[test]
    fn forked_estimators_merge() {
        let mut a = HllEstimator::new();
        let mut b = a.fork();
        for i in 0..500 {
            a.add(&format!("k{i}"));
        }
        for i in 250..1000 {
            b.add(&format!("k{i}"));
        }
        a.merge(&b);
        let est = a.estimate() as f64;
        assert!((est - 1000.0).abs() / 1000.0 < 0.03, "estimate {est}");
    }
}
