//! Persistent per-group statistics store.
//!
//! One plain-text file per group key, named
//! `MeanStdDevEnergyFractions_<group>.txt`, holding newline-terminated
//! `<feature> <mean> <stddev>` records. Loading scans a directory and
//! re-derives each group key from the file name, the inverse of the naming
//! convention used when persisting.

use crate::features::Feature;
use cn_core::{Error, GroupKey, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// File-name prefix for persisted per-group statistics.
pub const STATS_FILE_PREFIX: &str = "MeanStdDevEnergyFractions_";

/// Finalized statistics for one feature of one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureStats {
    /// Sample mean.
    pub mean: f64,
    /// Sample (n-1) standard deviation; 0 when fewer than two observations.
    pub stddev: f64,
    /// Retained observation count. 0 for tables reconstructed from disk,
    /// where the persisted format does not carry counts.
    pub count: u64,
}

/// Immutable per-group mean/stddev table, keyed by (group, feature).
///
/// Built once by [`crate::stats::StatsAccumulator::finalize`] or loaded from
/// disk; read-only during emission. Re-running aggregation replaces a table
/// wholesale, it never merges into one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsTable {
    groups: BTreeMap<GroupKey, BTreeMap<Feature, FeatureStats>>,
}

impl StatsTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the statistics of one (group, feature) pair.
    pub fn put(&mut self, group: GroupKey, feature: Feature, stats: FeatureStats) {
        self.groups.entry(group).or_default().insert(feature, stats);
    }

    /// Look up one (group, feature) pair.
    ///
    /// A miss means the aggregation and emission passes disagree about the
    /// feature set and is always an error, never a default.
    pub fn get(&self, group: &GroupKey, feature: Feature) -> Result<FeatureStats> {
        self.groups
            .get(group)
            .and_then(|features| features.get(&feature))
            .copied()
            .ok_or_else(|| Error::UnknownGroupOrFeature {
                group: group.to_string(),
                feature: feature.to_string(),
            })
    }

    /// Group keys present in the table, in sorted order.
    pub fn groups(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }

    /// True when no group has been stored.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Write one `<prefix><group>.txt` file per group under `dir`.
    ///
    /// Values use Rust's shortest-round-trip float formatting, so a
    /// persist/load cycle reproduces every (mean, stddev) pair exactly.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        for (group, features) in &self.groups {
            let mut text = String::new();
            for (feature, s) in features {
                // Never fails when writing into a String.
                let _ = writeln!(text, "{feature} {} {}", s.mean, s.stddev);
            }
            fs::write(dir.join(stats_file_name(group)), text)?;
        }
        Ok(())
    }

    /// Reconstruct a table by scanning `dir` for persisted statistics files.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut table = StatsTable::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            let Some(group) = group_from_file_name(name) else { continue };
            let text = fs::read_to_string(&path)?;
            for (lineno, line) in text.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let bad_line = || {
                    Error::StatsFormat(format!(
                        "{}:{}: expected '<feature> <mean> <stddev>', got '{line}'",
                        name,
                        lineno + 1
                    ))
                };
                let mut tokens = line.split_whitespace();
                let feature: Feature = tokens.next().ok_or_else(bad_line)?.parse()?;
                let mean: f64 =
                    tokens.next().ok_or_else(bad_line)?.parse().map_err(|_| bad_line())?;
                let stddev: f64 =
                    tokens.next().ok_or_else(bad_line)?.parse().map_err(|_| bad_line())?;
                if tokens.next().is_some() {
                    return Err(bad_line());
                }
                table.put(group.clone(), feature, FeatureStats { mean, stddev, count: 0 });
            }
        }
        Ok(table)
    }
}

/// File name a group's statistics are persisted under.
pub fn stats_file_name(group: &GroupKey) -> String {
    format!("{STATS_FILE_PREFIX}{group}.txt")
}

/// Inverse of [`stats_file_name`]: recover the group key, or `None` for
/// unrelated files.
pub fn group_from_file_name(name: &str) -> Option<GroupKey> {
    let key = name.strip_prefix(STATS_FILE_PREFIX)?.strip_suffix(".txt")?;
    if key.is_empty() { None } else { Some(GroupKey::new(key)) }
}
