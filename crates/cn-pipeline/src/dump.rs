//! One-pass raw branch dumps.
//!
//! Some inputs only need a plain per-source export of selected branches —
//! the first-PCA bin assignment used to cross-check current extrapolation
//! weights against predicted ones — with no grouping, statistics or
//! normalization. One CSV per source, header equal to the branch names,
//! one row per event.

use crate::pipeline::EmitOutcome;
use crate::source::{EventSource, JsonTreeSource};
use cn_core::{Error, Result};
use std::path::Path;

/// Dump the named branches of one source into a CSV at `out_path`.
///
/// A missing event table skips the source with a warning, like pass-2
/// emission; an unavailable source propagates.
pub fn dump_columns(
    source: &JsonTreeSource,
    columns: &[String],
    out_path: &Path,
) -> Result<EmitOutcome> {
    if columns.is_empty() {
        return Err(Error::Validation("at least one branch to dump is required".into()));
    }
    tracing::info!(source = %source.name(), out = %out_path.display(), "preparing CSV");
    let data = match source.raw_columns(columns) {
        Ok(data) => data,
        Err(Error::TableMissing { source_name, table }) => {
            tracing::warn!(source = %source_name, table = %table, "table missing, skipping source");
            return Ok(EmitOutcome::SkippedMissingTable);
        }
        Err(e) => return Err(e),
    };

    let rows = data.first().map_or(0, Vec::len);
    let mut writer = csv::Writer::from_path(out_path)?;
    writer.write_record(columns)?;
    for i in 0..rows {
        writer.write_record(data.iter().map(|col| col[i].to_string()))?;
    }
    writer.flush()?;
    Ok(EmitOutcome::Written { rows })
}
