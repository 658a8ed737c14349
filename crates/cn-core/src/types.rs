//! Common data types for calonorm.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Detector layer identifier (calorimeter sampling index).
pub type LayerId = u32;

/// Layers present for every species.
pub const BASELINE_LAYERS: [LayerId; 5] = [0, 1, 2, 3, 12];

/// Extra layers only pions deposit energy in.
pub const PION_EXTRA_LAYERS: [LayerId; 2] = [13, 14];

/// Value written for a layer a species does not physically have.
pub const ZERO_PAD: f64 = 0.0;

/// Particle species, determining the physical layer set and the
/// categorical code written to joint multi-species outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    /// Electrons (code 0).
    Electrons,
    /// Photons (code 1).
    Photons,
    /// Pions (code 2); two extra layers, 13 and 14.
    Pions,
}

impl Species {
    /// Fixed categorical code for the output `pid` column.
    pub fn code(self) -> u8 {
        match self {
            Species::Electrons => 0,
            Species::Photons => 1,
            Species::Pions => 2,
        }
    }

    /// Layers this species physically deposits energy in.
    pub fn layers(self) -> LayerSet {
        let mut layers: Vec<LayerId> = BASELINE_LAYERS.to_vec();
        if self == Species::Pions {
            layers.extend(PION_EXTRA_LAYERS);
        }
        LayerSet::new(layers)
    }

    /// Whether a source file name belongs to this species' dataset.
    ///
    /// Electron samples are only valid in their phi-corrected form, while the
    /// phi correction is wrong for pions; photons accept either.
    pub fn accepts_file(self, name: &str) -> bool {
        match self {
            Species::Electrons => name.contains("phiCorrected"),
            Species::Photons => true,
            Species::Pions => !name.contains("phiCorrected"),
        }
    }

    /// Lowercase dataset directory name (`electrons`, `photons`, `pions`).
    pub fn dir_name(self) -> &'static str {
        match self {
            Species::Electrons => "electrons",
            Species::Photons => "photons",
            Species::Pions => "pions",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl std::str::FromStr for Species {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "electrons" => Ok(Species::Electrons),
            "photons" => Ok(Species::Photons),
            "pions" => Ok(Species::Pions),
            other => Err(crate::Error::Validation(format!(
                "unknown species '{other}' (expected electrons, photons or pions)"
            ))),
        }
    }
}

/// Ordered set of layer identifiers for one run.
///
/// Determines column order in the output and which layers are zero-padded
/// for species lacking them. Construction deduplicates while preserving
/// first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSet(Vec<LayerId>);

impl LayerSet {
    /// Build a layer set, dropping duplicates but keeping order.
    pub fn new(layers: impl IntoIterator<Item = LayerId>) -> Self {
        let mut out = Vec::new();
        for l in layers {
            if !out.contains(&l) {
                out.push(l);
            }
        }
        LayerSet(out)
    }

    /// Ordered union of the layer sets of several species.
    ///
    /// A joint multi-species run uses this so all rows share one schema.
    pub fn union_of(species: &[Species]) -> Self {
        LayerSet::new(species.iter().flat_map(|s| s.layers().0))
    }

    /// Iterate layers in output order.
    pub fn iter(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.0.iter().copied()
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the set holds no layers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Membership test.
    pub fn contains(&self, layer: LayerId) -> bool {
        self.0.contains(&layer)
    }
}

/// Statistics partition key: the eta-bin token derived from a source
/// identifier (e.g. `eta_20_25`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey(String);

impl GroupKey {
    /// Wrap an already-derived eta-bin token.
    pub fn new(key: impl Into<String>) -> Self {
        GroupKey(key.into())
    }

    /// Borrow the token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One calorimeter shower: per-layer deposited energy and per-layer
/// extrapolation weight.
///
/// Built once by a source adapter and read-only downstream. Layers a
/// species does not have simply have no entry; reads return [`ZERO_PAD`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    energies: BTreeMap<LayerId, f64>,
    extrap_weights: BTreeMap<LayerId, f64>,
}

impl EventRecord {
    /// Build a record from per-layer energies and extrapolation weights.
    pub fn from_layers(
        energies: impl IntoIterator<Item = (LayerId, f64)>,
        extrap_weights: impl IntoIterator<Item = (LayerId, f64)>,
    ) -> Self {
        EventRecord {
            energies: energies.into_iter().collect(),
            extrap_weights: extrap_weights.into_iter().collect(),
        }
    }

    /// Deposited energy in `layer`, zero-padded when absent.
    pub fn energy(&self, layer: LayerId) -> f64 {
        self.energies.get(&layer).copied().unwrap_or(ZERO_PAD)
    }

    /// Extrapolation weight for `layer`, zero-padded when absent.
    pub fn extrap_weight(&self, layer: LayerId) -> f64 {
        self.extrap_weights.get(&layer).copied().unwrap_or(ZERO_PAD)
    }
}
