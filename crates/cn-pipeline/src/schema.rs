//! Output column schema and row assembly.
//!
//! The column order is declared once per run and consumed by both the
//! header writer and the row assembler, so the two cannot drift apart.

use crate::normalize::NormalizedFeatures;
use cn_core::{Error, EventRecord, LayerId, LayerSet, Result, Species};

/// One output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Raw deposited energy of a layer (`e_L`).
    Energy(LayerId),
    /// Normalized energy fraction of a layer (`ef_L`).
    Fraction(LayerId),
    /// Raw extrapolation weight of a layer (`extrapWeight_L`).
    ExtrapWeight(LayerId),
    /// Normalized true particle energy (`etrue`).
    TrueEnergy,
    /// Categorical species code (`pid`); only in joint multi-species runs.
    SpeciesCode,
}

impl Column {
    /// CSV header name of this column.
    pub fn name(self) -> String {
        match self {
            Column::Energy(l) => format!("e_{l}"),
            Column::Fraction(l) => format!("ef_{l}"),
            Column::ExtrapWeight(l) => format!("extrapWeight_{l}"),
            Column::TrueEnergy => "etrue".to_string(),
            Column::SpeciesCode => "pid".to_string(),
        }
    }
}

/// Fixed, ordered column declaration for one run's outputs.
///
/// Order: raw energies, normalized fractions, raw extrapolation weights,
/// normalized true energy, then the species code when several species are
/// processed jointly. Identical for every row of every file in the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    columns: Vec<Column>,
    with_species: bool,
}

impl ColumnSchema {
    /// Declare the schema for a run over `layers`.
    pub fn for_run(layers: &LayerSet, with_species: bool) -> Self {
        let mut columns = Vec::with_capacity(layers.len() * 3 + 2);
        columns.extend(layers.iter().map(Column::Energy));
        columns.extend(layers.iter().map(Column::Fraction));
        columns.extend(layers.iter().map(Column::ExtrapWeight));
        columns.push(Column::TrueEnergy);
        if with_species {
            columns.push(Column::SpeciesCode);
        }
        ColumnSchema { columns, with_species }
    }

    /// Whether rows carry the `pid` column.
    pub fn with_species(&self) -> bool {
        self.with_species
    }

    /// Ordered CSV header.
    pub fn header(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    /// Build one output row from the raw record and its normalized features.
    ///
    /// `species` is required exactly when the schema carries the `pid`
    /// column; a mismatch is a configuration defect, not a per-row choice.
    pub fn assemble_row(
        &self,
        event: &EventRecord,
        normalized: &NormalizedFeatures,
        species: Option<Species>,
    ) -> Result<Vec<String>> {
        if self.with_species != species.is_some() {
            return Err(Error::Validation(format!(
                "schema {} a species code but {} was supplied",
                if self.with_species { "requires" } else { "does not take" },
                if species.is_some() { "one" } else { "none" },
            )));
        }
        let mut row = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let cell = match *column {
                Column::Energy(l) => event.energy(l).to_string(),
                Column::Fraction(l) => normalized.fraction(l).to_string(),
                Column::ExtrapWeight(l) => event.extrap_weight(l).to_string(),
                Column::TrueEnergy => normalized.etrue().to_string(),
                // Checked above.
                Column::SpeciesCode => species.map(|s| s.code()).unwrap_or_default().to_string(),
            };
            row.push(cell);
        }
        Ok(row)
    }
}
