//! # cn-core
//!
//! Shared types and errors for calonorm: detector layers, particle species,
//! event records, group keys, and the pipeline error taxonomy.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    BASELINE_LAYERS, EventRecord, GroupKey, LayerId, LayerSet, PION_EXTRA_LAYERS, Species,
    ZERO_PAD,
};
