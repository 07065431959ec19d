//! Per-generation result accumulation.

use crate::feature::Feature;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    features: Vec<Feature>,
    completed: usize,
}

/// Running result of one query generation.
///
/// Shared by the cache scanner and the fetch coordinator; every resolved
/// key (cache hit, negative entry, or fetched batch member) counts toward
/// completion. Mutation happens under a short lock with no suspension
/// point inside, so concurrent batch completions never interleave a
/// partial update.
#[derive(Debug)]
pub struct Accumulator {
    total: usize,
    state: Mutex<State>,
}

impl Accumulator {
    /// Create an accumulator for a strategy of `total` keys.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            state: Mutex::new(State::default()),
        }
    }

    /// Number of keys the generation must resolve.
    pub fn total(&self) -> usize {
        self.total
    }

    fn fraction(&self, completed: usize) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            completed as f64 / self.total as f64
        }
    }

    /// Record one key resolved from cache. A hit contributes its feature;
    /// a negative entry contributes only completion. Returns the fraction
    /// now complete.
    pub fn record_cached(&self, feature: Option<Feature>) -> f64 {
        let mut state = self.state.lock().unwrap();
        if let Some(feature) = feature {
            state.features.push(feature);
        }
        state.completed += 1;
        self.fraction(state.completed)
    }

    /// Merge one network batch of `batch_len` resolved keys.
    ///
    /// Returns the fraction now complete and, exactly when this batch
    /// brings the generation to completion, a snapshot of the full
    /// accumulated feature set for the completion hook.
    pub fn merge_batch(
        &self,
        batch_len: usize,
        features: Vec<Feature>,
    ) -> (f64, Option<Vec<Feature>>) {
        let mut state = self.state.lock().unwrap();
        state.features.extend(features);
        state.completed += batch_len;
        let fraction = self.fraction(state.completed);
        let snapshot = (state.completed == self.total).then(|| state.features.clone());
        (fraction, snapshot)
    }

    /// Copy of the features accumulated so far.
    pub fn features_snapshot(&self) -> Vec<Feature> {
        self.state.lock().unwrap().features.clone()
    }

    /// Consume the accumulator, yielding the accumulated features.
    pub fn into_features(self) -> Vec<Feature> {
        self.state.into_inner().unwrap().features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::testutil::sample_feature;

    #[test]
    fn cached_completions_advance_fraction() {
        let accumulator = Accumulator::new(4);
        assert_eq!(accumulator.record_cached(Some(sample_feature("a"))), 0.25);
        assert_eq!(accumulator.record_cached(None), 0.5);
        assert_eq!(accumulator.features_snapshot().len(), 1);
    }

    #[test]
    fn completion_snapshot_appears_exactly_at_total() {
        let accumulator = Accumulator::new(4);
        accumulator.record_cached(Some(sample_feature("a")));

        let (fraction, snapshot) = accumulator.merge_batch(2, vec![sample_feature("b")]);
        assert_eq!(fraction, 0.75);
        assert!(snapshot.is_none());

        let (fraction, snapshot) = accumulator.merge_batch(1, vec![sample_feature("c")]);
        assert_eq!(fraction, 1.0);
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn into_features_yields_everything_merged() {
        let accumulator = Accumulator::new(2);
        accumulator.record_cached(Some(sample_feature("a")));
        accumulator.merge_batch(1, vec![sample_feature("b")]);
        let features = accumulator.into_features();
        assert_eq!(features.len(), 2);
    }
}
