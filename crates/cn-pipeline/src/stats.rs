//! Pass-1 statistics accumulation.

use crate::features::{DerivedFeatures, Feature};
use crate::store::{FeatureStats, StatsTable};
use cn_core::GroupKey;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
struct FeatureAcc {
    count: u64,
    sum: f64,
    sum_sq: f64,
}

impl FeatureAcc {
    fn observe(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
    }

    fn finalize(self) -> FeatureStats {
        let mean = if self.count > 0 { self.sum / self.count as f64 } else { 0.0 };
        // Sample (n-1) standard deviation; a single observation has no
        // spread, so count <= 1 finalizes to 0 and the normalizer's
        // zero-stddev guard takes over.
        let stddev = if self.count > 1 {
            let n = self.count as f64;
            let var = (self.sum_sq - self.sum * self.sum / n) / (n - 1.0);
            var.max(0.0).sqrt()
        } else {
            0.0
        };
        FeatureStats { mean, stddev, count: self.count }
    }
}

/// Accumulates per-group running sums over derived features.
///
/// Accumulation spans every source sharing a group key, across species in a
/// joint run; it restarts only per key, never per source. Finalizing
/// consumes the accumulator, so a finalized table can never be mutated by
/// further observations.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    groups: BTreeMap<GroupKey, BTreeMap<Feature, FeatureAcc>>,
}

impl StatsAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group's full feature set, without observing anything.
    ///
    /// Called once per source before its events are folded in, so a group
    /// whose events are all degenerate still finalizes (with count 0 and
    /// stddev 0) and emission falls through to the zero-substitution policy
    /// instead of a spurious lookup failure.
    pub fn ensure_group(&mut self, group: &GroupKey, layers: &cn_core::LayerSet) {
        let accs = self.groups.entry(group.clone()).or_default();
        for layer in layers.iter() {
            accs.entry(Feature::Fraction(layer)).or_default();
        }
        accs.entry(Feature::TrueEnergy).or_default();
    }

    /// Fold one event's derived features into its group.
    ///
    /// Events with a non-positive total energy contribute to no feature at
    /// all, not even true energy.
    pub fn observe(&mut self, group: &GroupKey, features: &DerivedFeatures) {
        if !features.in_statistics() {
            return;
        }
        let accs = self.groups.entry(group.clone()).or_default();
        for &(layer, value) in features.fractions() {
            accs.entry(Feature::Fraction(layer)).or_default().observe(value);
        }
        accs.entry(Feature::TrueEnergy).or_default().observe(features.etrue());
    }

    /// Number of retained (non-degenerate) events seen for `group`.
    pub fn group_count(&self, group: &GroupKey) -> u64 {
        self.groups
            .get(group)
            .and_then(|accs| accs.get(&Feature::TrueEnergy))
            .map_or(0, |a| a.count)
    }

    /// Finalize into an immutable statistics table.
    pub fn finalize(self) -> StatsTable {
        let mut table = StatsTable::new();
        for (group, accs) in self.groups {
            for (feature, acc) in accs {
                table.put(group.clone(), feature, acc.finalize());
            }
        }
        table
    }
}
