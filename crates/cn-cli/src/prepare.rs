//! Source discovery and the `stats` / `prepare` commands.

use anyhow::{Context, Result, bail};
use cn_core::{Error, Species};
use cn_pipeline::{
    EmitOutcome, EventCap, JsonTreeSource, Pipeline, PipelineSource, StatsTable, dump_columns,
    parse_source_name,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Parse a `--cap <marker>=<max>` argument.
pub(crate) fn parse_cap(s: &str) -> std::result::Result<EventCap, String> {
    let (marker, max) =
        s.split_once('=').ok_or_else(|| format!("expected '<marker>=<max>', got '{s}'"))?;
    if marker.is_empty() {
        return Err(format!("empty marker in cap '{s}'"));
    }
    let max_events: usize =
        max.parse().map_err(|_| format!("non-numeric event cap in '{s}'"))?;
    Ok(EventCap { marker: marker.to_string(), max_events })
}

/// Output file name for a source: the `.json` suffix (and only the suffix)
/// swapped for `.csv`.
pub(crate) fn csv_name(source_name: &str) -> String {
    let stem = source_name.strip_suffix(".json").unwrap_or(source_name);
    format!("{stem}.csv")
}

/// Caps in effect for a run: explicit ones, or the documented defaults.
pub(crate) fn effective_caps(explicit: Vec<EventCap>, no_caps: bool) -> Vec<EventCap> {
    if no_caps {
        Vec::new()
    } else if explicit.is_empty() {
        EventCap::known_defects()
    } else {
        explicit
    }
}

/// Scan `input_dir/<species>/` for JSON sources of each requested species.
///
/// Applies the per-species file-name filter (phi-corrected samples for
/// electrons, uncorrected for pions) and resolves each file name into its
/// group key and true energy. A name that matches the filter but not the
/// token convention aborts discovery: silently dropping it would corrupt
/// the statistics of its bin.
fn discover_sources(
    input_dir: &Path,
    species_list: &[Species],
    tree_name: &str,
) -> Result<Vec<PipelineSource<JsonTreeSource>>> {
    let mut sources = Vec::new();
    for &species in species_list {
        let dir = input_dir.join(species.dir_name());
        let rd = fs::read_dir(&dir).with_context(|| format!("read_dir {}", dir.display()))?;
        let mut names: Vec<String> = Vec::new();
        for entry in rd {
            let entry = entry.with_context(|| format!("iter dir {}", dir.display()))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else { continue };
            if !name.ends_with(".json") || !species.accepts_file(&name) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        for name in names {
            let meta = parse_source_name(&name)?;
            let source = JsonTreeSource::new(dir.join(&name), tree_name);
            sources.push(PipelineSource { source, meta, species });
        }
    }
    if sources.is_empty() {
        bail!("no sources found under {} for {:?}", input_dir.display(), species_list);
    }
    Ok(sources)
}

/// Pass 1 only: aggregate and persist per-bin statistics.
pub(crate) fn cmd_stats(
    input_dir: &Path,
    stats_dir: &Path,
    particles: &[Species],
    tree_name: &str,
) -> Result<()> {
    let pipeline = Pipeline::new(particles, Vec::new())?;
    let sources = discover_sources(input_dir, particles, tree_name)?;
    let stats = pipeline.aggregate(&sources)?;
    stats.persist(stats_dir)?;
    tracing::info!(
        groups = stats.groups().count(),
        dir = %stats_dir.display(),
        "statistics persisted"
    );
    Ok(())
}

/// Full two-pass run (or pass 2 only with `load_stats`).
pub(crate) fn cmd_prepare(
    input_dir: &Path,
    output_dir: &Path,
    stats_dir: Option<&Path>,
    load_stats: bool,
    particles: &[Species],
    tree_name: &str,
    caps: Vec<EventCap>,
) -> Result<()> {
    let pipeline = Pipeline::new(particles, caps)?;
    let sources = discover_sources(input_dir, particles, tree_name)?;
    let stats_dir = stats_dir.unwrap_or(output_dir);

    let stats = if load_stats {
        let table = StatsTable::load(stats_dir)
            .with_context(|| format!("loading statistics from {}", stats_dir.display()))?;
        if table.is_empty() {
            bail!("no statistics files found under {}", stats_dir.display());
        }
        tracing::info!(groups = table.groups().count(), "statistics loaded");
        table
    } else {
        let table = pipeline.aggregate(&sources)?;
        table.persist(stats_dir)?;
        table
    };

    let mut written = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for entry in &sources {
        let out_dir = output_dir.join(entry.species.dir_name());
        fs::create_dir_all(&out_dir)?;
        let out_path = out_dir.join(csv_name(&entry.meta.name));
        match pipeline.emit(entry, &stats, &out_path) {
            Ok(EmitOutcome::Written { .. }) => written += 1,
            Ok(EmitOutcome::SkippedMissingTable) => skipped += 1,
            // An unopenable source or a statistics miss means the run
            // itself is broken; anything else abandons this source's
            // partial file and moves on.
            Err(e @ (Error::SourceUnavailable(_) | Error::UnknownGroupOrFeature { .. })) => {
                return Err(e).with_context(|| format!("emitting {}", entry.meta.name));
            }
            Err(e) => {
                tracing::error!(source = %entry.meta.name, error = %e, "emission failed");
                failed += 1;
            }
        }
    }
    tracing::info!(written, skipped, failed, "run complete");
    if failed > 0 {
        bail!("{failed} source(s) failed during emission");
    }
    Ok(())
}

/// One-pass raw branch export of every matching source file.
///
/// Scans subdirectories of `input_dir` whose name contains
/// `folder_filter` for JSON files whose name contains `name_filter`, and
/// writes the requested branches verbatim, one CSV per source.
pub(crate) fn cmd_dump(
    input_dir: &Path,
    output_dir: &Path,
    tree_name: &str,
    columns: &[String],
    name_filter: &str,
    folder_filter: &str,
) -> Result<()> {
    let mut files: Vec<PathBuf> = Vec::new();
    let rd = fs::read_dir(input_dir).with_context(|| format!("read_dir {}", input_dir.display()))?;
    for entry in rd {
        let entry = entry.with_context(|| format!("iter dir {}", input_dir.display()))?;
        let Some(folder) = entry.file_name().to_str().map(str::to_string) else { continue };
        if !entry.path().is_dir() || !folder.contains(folder_filter) {
            continue;
        }
        let sub = entry.path();
        for f in fs::read_dir(&sub).with_context(|| format!("read_dir {}", sub.display()))? {
            let f = f.with_context(|| format!("iter dir {}", sub.display()))?;
            let Some(name) = f.file_name().to_str().map(str::to_string) else { continue };
            if name.ends_with(".json") && name.contains(name_filter) {
                files.push(f.path());
            }
        }
    }
    files.sort();
    if files.is_empty() {
        bail!(
            "no '{name_filter}' sources found under {} (folders matching '{folder_filter}')",
            input_dir.display()
        );
    }

    fs::create_dir_all(output_dir)?;
    let mut written = 0usize;
    let mut skipped = 0usize;
    for path in &files {
        let source = JsonTreeSource::new(path, tree_name);
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let out_path = output_dir.join(csv_name(name));
        match dump_columns(&source, columns, &out_path)
            .with_context(|| format!("dumping {}", path.display()))?
        {
            EmitOutcome::Written { .. } => written += 1,
            EmitOutcome::SkippedMissingTable => skipped += 1,
        }
    }
    tracing::info!(written, skipped, "dump complete");
    Ok(())
}
