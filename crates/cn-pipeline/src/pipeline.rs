//! Two-pass driver.
//!
//! Pass 1 streams every source into a [`StatsAccumulator`] and finalizes an
//! immutable [`StatsTable`]; pass 2 re-streams each source through the
//! normalizer and writes one CSV per source. A run moves through
//! `CONFIGURED -> PASS1_AGGREGATING -> STATS_FINALIZED -> PASS2_EMITTING ->
//! DONE`; loading a persisted table instead of aggregating is the explicit
//! alternative entry to `STATS_FINALIZED`. The ordering is enforced by data
//! flow: [`Pipeline::emit`] takes a finalized table by shared reference.

use crate::features::derive_features;
use crate::key::SourceMeta;
use crate::normalize::normalize_event;
use crate::schema::ColumnSchema;
use crate::source::EventSource;
use crate::stats::StatsAccumulator;
use crate::store::StatsTable;
use cn_core::{Error, LayerSet, Result, Species};
use serde::Deserialize;
use std::path::Path;

/// Cap on the events taken from sources matching a name marker.
///
/// The known case: trees of the `E2097152` sample are broken upstream past
/// event 2000, so that sample is truncated. Kept configurable rather than
/// wired to one file name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventCap {
    /// Substring of the source identifier this cap applies to.
    pub marker: String,
    /// Maximum number of events emitted per matching source.
    pub max_events: usize,
}

impl EventCap {
    /// The documented cap for the defective `E2097152` sample.
    pub fn known_defects() -> Vec<EventCap> {
        vec![EventCap { marker: "E2097152".to_string(), max_events: 2000 }]
    }
}

/// One source together with its resolved identity and species.
#[derive(Debug)]
pub struct PipelineSource<S> {
    /// The adapter yielding this source's events.
    pub source: S,
    /// Group key and true energy resolved from the source name.
    pub meta: SourceMeta,
    /// Species the source belongs to.
    pub species: Species,
}

/// Outcome of emitting one source in pass 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    /// CSV written with this many data rows.
    Written {
        /// Data rows written (header excluded).
        rows: usize,
    },
    /// Source opened but its event table was absent; no CSV written.
    SkippedMissingTable,
}

/// Run-wide configuration: layer set, output schema and event caps.
#[derive(Debug)]
pub struct Pipeline {
    layers: LayerSet,
    schema: ColumnSchema,
    with_species: bool,
    caps: Vec<EventCap>,
}

impl Pipeline {
    /// Configure a run over `species`, jointly when more than one is given.
    ///
    /// The layer set is the ordered union over the species; the output
    /// schema carries the `pid` column exactly when the run is joint.
    pub fn new(species: &[Species], caps: Vec<EventCap>) -> Result<Self> {
        if species.is_empty() {
            return Err(Error::Validation("at least one species is required".into()));
        }
        let layers = LayerSet::union_of(species);
        let with_species = species.len() > 1;
        let schema = ColumnSchema::for_run(&layers, with_species);
        Ok(Pipeline { layers, schema, with_species, caps })
    }

    /// The run's layer set.
    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    /// The run's output column schema.
    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    /// Pass 1: accumulate per-group statistics over every source.
    ///
    /// Any failure here is fatal to the whole run; statistics missing even
    /// one source of a group cannot be trusted for any source of that group.
    pub fn aggregate<S: EventSource>(&self, sources: &[PipelineSource<S>]) -> Result<StatsTable> {
        let mut acc = StatsAccumulator::new();
        for entry in sources {
            tracing::info!(source = %entry.meta.name, group = %entry.meta.group, "aggregating");
            acc.ensure_group(&entry.meta.group, &self.layers);
            let events = entry.source.events()?;
            for event in &events {
                let features = derive_features(event, &self.layers, entry.meta.etrue);
                acc.observe(&entry.meta.group, &features);
            }
        }
        Ok(acc.finalize())
    }

    /// Pass 2: normalize one source and write its CSV to `out_path`.
    ///
    /// A missing event table skips the source with a warning so the rest of
    /// the batch can proceed; an unavailable source propagates and aborts.
    pub fn emit<S: EventSource>(
        &self,
        entry: &PipelineSource<S>,
        stats: &StatsTable,
        out_path: &Path,
    ) -> Result<EmitOutcome> {
        tracing::info!(source = %entry.meta.name, out = %out_path.display(), "preparing CSV");
        let events = match entry.source.events() {
            Ok(events) => events,
            Err(Error::TableMissing { source_name, table }) => {
                tracing::warn!(source = %source_name, table = %table, "table missing, skipping source");
                return Ok(EmitOutcome::SkippedMissingTable);
            }
            Err(e) => return Err(e),
        };

        let cap = self.cap_for(&entry.meta.name);
        let species = self.with_species.then_some(entry.species);

        let mut writer = csv::Writer::from_path(out_path)?;
        writer.write_record(self.schema.header())?;
        let mut rows = 0usize;
        for event in &events {
            if let Some(max) = cap {
                if rows >= max {
                    break;
                }
            }
            let features = derive_features(event, &self.layers, entry.meta.etrue);
            let normalized = normalize_event(&features, &self.layers, &entry.meta.group, stats)?;
            writer.write_record(self.schema.assemble_row(event, &normalized, species)?)?;
            rows += 1;
        }
        writer.flush()?;
        Ok(EmitOutcome::Written { rows })
    }

    /// Cap applying to a source name, if any configured marker matches.
    fn cap_for(&self, name: &str) -> Option<usize> {
        self.caps.iter().find(|c| name.contains(&c.marker)).map(|c| c.max_events)
    }
}
