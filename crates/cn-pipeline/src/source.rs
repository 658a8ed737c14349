//! Event source adapters.
//!
//! A source yields the events of one input file. The storage format sits
//! behind [`EventSource`]; the pipeline only distinguishes a source that
//! cannot be opened at all (fatal for the batch) from one that opens but
//! lacks the expected event table (skippable during emission).

use cn_core::{Error, EventRecord, LayerId, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// One openable collection of event records.
pub trait EventSource {
    /// Source identifier (file name), used for group-key resolution and
    /// error context.
    fn name(&self) -> &str;

    /// Materialize all events.
    ///
    /// Errors: [`Error::SourceUnavailable`] when the source cannot be read
    /// at all, [`Error::TableMissing`] when it opens but the configured
    /// event table is absent.
    fn events(&self) -> Result<Vec<EventRecord>>;
}

/// In-memory source for tests and library callers.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    events: Vec<EventRecord>,
}

impl MemorySource {
    /// Wrap pre-built events under a source name.
    pub fn new(name: impl Into<String>, events: Vec<EventRecord>) -> Self {
        MemorySource { name: name.into(), events }
    }
}

impl EventSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> Result<Vec<EventRecord>> {
        Ok(self.events.clone())
    }
}

/// Columnar JSON event source.
///
/// The file holds one object per event table, each mapping branch names to
/// equal-length numeric arrays:
///
/// ```json
/// { "rootTree": { "e_0": [1.5, 0.0], "extrapWeight_0": [0.9, 0.8] } }
/// ```
///
/// Branches named `e_<L>` and `extrapWeight_<L>` map onto the typed layer
/// fields of [`EventRecord`]; other branches are ignored.
#[derive(Debug, Clone)]
pub struct JsonTreeSource {
    path: PathBuf,
    name: String,
    tree: String,
}

impl JsonTreeSource {
    /// Point at `path`, expecting the event table `tree` inside.
    pub fn new(path: impl Into<PathBuf>, tree: impl Into<String>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        JsonTreeSource { path, name, tree: tree.into() }
    }

    fn load_tree(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            Error::SourceUnavailable(format!("{}: {e}", self.path.display()))
        })?;
        let root: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            Error::SourceUnavailable(format!("{}: invalid JSON: {e}", self.path.display()))
        })?;
        root.get(&self.tree)
            .and_then(|t| t.as_object())
            .cloned()
            .ok_or_else(|| Error::TableMissing {
                source_name: self.name.clone(),
                table: self.tree.clone(),
            })
    }

    /// Read selected branches untouched, in the requested order.
    ///
    /// For pass-through exports that need branches outside the typed layer
    /// fields (e.g. the first-PCA bin assignment). All requested branches
    /// must exist and agree on length.
    pub fn raw_columns(&self, names: &[String]) -> Result<Vec<Vec<f64>>> {
        let tree = self.load_tree()?;
        let mut columns = Vec::with_capacity(names.len());
        let mut n_events: Option<usize> = None;
        for name in names {
            let values = tree.get(name).ok_or_else(|| {
                Error::Validation(format!("{}: branch '{name}' not found", self.name))
            })?;
            let column = branch_column(&self.name, name, values)?;
            if let Some(n) = n_events {
                if column.len() != n {
                    return Err(Error::Validation(format!(
                        "{}: branch '{name}' has {} entries, expected {n}",
                        self.name,
                        column.len()
                    )));
                }
            } else {
                n_events = Some(column.len());
            }
            columns.push(column);
        }
        Ok(columns)
    }
}

impl EventSource for JsonTreeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> Result<Vec<EventRecord>> {
        let tree = self.load_tree()?;

        let mut energies: BTreeMap<LayerId, Vec<f64>> = BTreeMap::new();
        let mut weights: BTreeMap<LayerId, Vec<f64>> = BTreeMap::new();
        let mut n_events: Option<usize> = None;
        for (branch, values) in &tree {
            let dest = if let Some(layer) = parse_layer(branch, "e_") {
                energies.entry(layer)
            } else if let Some(layer) = parse_layer(branch, "extrapWeight_") {
                weights.entry(layer)
            } else {
                continue;
            };
            let column = branch_column(&self.name, branch, values)?;
            if let Some(n) = n_events {
                if column.len() != n {
                    return Err(Error::Validation(format!(
                        "{}: branch '{branch}' has {} entries, expected {n}",
                        self.name,
                        column.len()
                    )));
                }
            } else {
                n_events = Some(column.len());
            }
            dest.or_insert(column);
        }

        let n = n_events.unwrap_or(0);
        let mut events = Vec::with_capacity(n);
        for i in 0..n {
            events.push(EventRecord::from_layers(
                energies.iter().map(|(&l, col)| (l, col[i])),
                weights.iter().map(|(&l, col)| (l, col[i])),
            ));
        }
        Ok(events)
    }
}

fn parse_layer(branch: &str, prefix: &str) -> Option<LayerId> {
    branch.strip_prefix(prefix)?.parse().ok()
}

fn branch_column(source: &str, branch: &str, values: &serde_json::Value) -> Result<Vec<f64>> {
    let array = values.as_array().ok_or_else(|| {
        Error::Validation(format!("{source}: branch '{branch}' is not an array"))
    })?;
    array
        .iter()
        .map(|v| {
            v.as_f64().ok_or_else(|| {
                Error::Validation(format!("{source}: branch '{branch}' holds a non-numeric value"))
            })
        })
        .collect()
}
