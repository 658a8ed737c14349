//! Derived per-event features: layer energy fractions and true energy.

use cn_core::{Error, EventRecord, LayerId, LayerSet, Result};
use std::fmt;

/// A feature the per-group statistics are computed over.
///
/// Typed on purpose: the original field names (`ef_13`) are only ever
/// produced by [`fmt::Display`] and consumed by [`std::str::FromStr`] at the
/// persistence boundary, never built by string concatenation in lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    /// Energy fraction of one layer (`ef_L`).
    Fraction(LayerId),
    /// True particle energy (`etrue`).
    TrueEnergy,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Fraction(layer) => write!(f, "ef_{layer}"),
            Feature::TrueEnergy => f.write_str("etrue"),
        }
    }
}

impl std::str::FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "etrue" {
            return Ok(Feature::TrueEnergy);
        }
        if let Some(layer) = s.strip_prefix("ef_") {
            let layer: LayerId = layer
                .parse()
                .map_err(|_| Error::StatsFormat(format!("bad layer in feature name '{s}'")))?;
            return Ok(Feature::Fraction(layer));
        }
        Err(Error::StatsFormat(format!("unknown feature name '{s}'")))
    }
}

/// Per-event derived features.
///
/// The total-energy denominator is computed once and shared by every
/// fraction of the same event. The two degenerate thresholds differ on
/// purpose: statistics retain only events with a *positive* total, while
/// emission zero-substitutes fractions only when the total is exactly
/// zero — an event with a negative total still gets real z-scores.
#[derive(Debug, Clone)]
pub struct DerivedFeatures {
    total: f64,
    fractions: Vec<(LayerId, f64)>,
    etrue: f64,
}

impl DerivedFeatures {
    /// Total deposited energy over the run's layer set.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// True when the event is retained for statistics (positive total).
    pub fn in_statistics(&self) -> bool {
        self.total > 0.0
    }

    /// True when the total is exactly zero, so fractions are undefined and
    /// emission substitutes 0 for them.
    pub fn has_zero_total(&self) -> bool {
        self.total == 0.0
    }

    /// Energy fraction for `layer`; `None` when the total is zero.
    pub fn fraction(&self, layer: LayerId) -> Option<f64> {
        self.fractions.iter().find(|(l, _)| *l == layer).map(|(_, v)| *v)
    }

    /// Fractions in layer-set order; empty when the total is zero.
    pub fn fractions(&self) -> &[(LayerId, f64)] {
        &self.fractions
    }

    /// True particle energy declared by the event's source.
    pub fn etrue(&self) -> f64 {
        self.etrue
    }
}

/// Compute the derived feature set of one event.
///
/// Layers absent from the record read as zero, so species with fewer
/// physical layers are zero-padded rather than failing.
pub fn derive_features(event: &EventRecord, layers: &LayerSet, etrue: f64) -> DerivedFeatures {
    let total: f64 = layers.iter().map(|l| event.energy(l)).sum();
    let fractions = if total != 0.0 {
        layers.iter().map(|l| (l, event.energy(l) / total)).collect()
    } else {
        Vec::new()
    };
    DerivedFeatures { total, fractions, etrue }
}
