//! Per-group z-score normalization with the degenerate-value policy.

use crate::features::{DerivedFeatures, Feature};
use crate::store::StatsTable;
use cn_core::{GroupKey, LayerId, LayerSet, Result};

/// An event's features after z-score normalization.
#[derive(Debug, Clone)]
pub struct NormalizedFeatures {
    fractions: Vec<(LayerId, f64)>,
    etrue: f64,
}

impl NormalizedFeatures {
    /// Normalized fraction for `layer`; 0 substituted for degenerate cases.
    pub fn fraction(&self, layer: LayerId) -> f64 {
        self.fractions.iter().find(|(l, _)| *l == layer).map_or(0.0, |(_, v)| *v)
    }

    /// Normalized true energy.
    pub fn etrue(&self) -> f64 {
        self.etrue
    }
}

/// Apply the group's z-score transform to one event.
///
/// Fractions: `z = (raw - mean) / stddev` only when the group's stddev is
/// nonzero *and* the event's total energy is nonzero; otherwise exactly 0.
/// A negative total is nonzero, so such events get real z-scores here even
/// though they were excluded from the statistics. True energy has no
/// total-energy guard, only the stddev one — the asymmetry is deliberate
/// and must not be "fixed".
///
/// Statistics lookups go through [`StatsTable::get`], so a feature the
/// aggregation pass never saw fails with `UnknownGroupOrFeature` instead of
/// producing a silently wrong row. With a zero total the fraction value is
/// 0 by policy and no fraction lookup is performed, matching the
/// short-circuit of the original pipeline.
pub fn normalize_event(
    features: &DerivedFeatures,
    layers: &LayerSet,
    group: &GroupKey,
    stats: &StatsTable,
) -> Result<NormalizedFeatures> {
    let mut fractions = Vec::with_capacity(layers.len());
    for layer in layers.iter() {
        let z = if features.has_zero_total() {
            0.0
        } else {
            let s = stats.get(group, Feature::Fraction(layer))?;
            // fraction() is Some for every layer once the total is nonzero.
            let raw = features.fraction(layer).unwrap_or(0.0);
            if s.stddev != 0.0 { (raw - s.mean) / s.stddev } else { 0.0 }
        };
        fractions.push((layer, z));
    }

    let s = stats.get(group, Feature::TrueEnergy)?;
    let etrue =
        if s.stddev != 0.0 { (features.etrue() - s.mean) / s.stddev } else { 0.0 };

    Ok(NormalizedFeatures { fractions, etrue })
}
