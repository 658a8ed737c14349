//! # cn-pipeline
//!
//! Two-pass per-group normalization of calorimeter shower records.
//!
//! Pass 1 groups event sources into eta-bins by a key derived from each
//! source's name, and accumulates mean/standard-deviation statistics of the
//! derived features (per-layer energy fractions and true energy) per bin.
//! The finalized statistics can be persisted as plain-text files. Pass 2
//! re-streams every source, z-scores each event against its bin's
//! statistics, and writes one flat CSV per source.
//!
//! ## Example
//!
//! ```no_run
//! use cn_core::Species;
//! use cn_pipeline::{
//!     EventCap, JsonTreeSource, Pipeline, PipelineSource, parse_source_name,
//! };
//!
//! let pipeline = Pipeline::new(&[Species::Photons], EventCap::known_defects()).unwrap();
//! let meta = parse_source_name("pid22_E65536_eta_20_25.json").unwrap();
//! let sources = vec![PipelineSource {
//!     source: JsonTreeSource::new("in/pid22_E65536_eta_20_25.json", "rootTree"),
//!     meta,
//!     species: Species::Photons,
//! }];
//! let stats = pipeline.aggregate(&sources).unwrap();
//! stats.persist("out".as_ref()).unwrap();
//! for s in &sources {
//!     pipeline.emit(s, &stats, "out/pid22_E65536_eta_20_25.csv".as_ref()).unwrap();
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dump;
pub mod features;
pub mod key;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod source;
pub mod stats;
pub mod store;

pub use dump::dump_columns;
pub use features::{DerivedFeatures, Feature, derive_features};
pub use key::{SourceMeta, parse_source_name};
pub use normalize::{NormalizedFeatures, normalize_event};
pub use pipeline::{EmitOutcome, EventCap, Pipeline, PipelineSource};
pub use schema::{Column, ColumnSchema};
pub use source::{EventSource, JsonTreeSource, MemorySource};
pub use stats::StatsAccumulator;
pub use store::{FeatureStats, STATS_FILE_PREFIX, StatsTable, group_from_file_name, stats_file_name};
