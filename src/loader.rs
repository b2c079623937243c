//! dataset loading + validation
//!
//! reads a header-first csv, figures out which of the wanted covariates are
//! actually there, and hands back a [`SurvivalData`] with every incomplete row
//! dropped. checks run in a fixed order: file → scenario derivation →
//! covariate intersection → required columns → row cleaning.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ndarray::Array2;
use tracing::{debug, info};

use crate::{
    data::{SurvivalData, DURATION_COLUMN, EVENT_COLUMN},
    error::{HazardError, Result},
};

/// cell texts that count as missing - pandas' default na_values
const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// turn a categorical column into a 0/1 covariate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioRule {
    pub source_column: String,   // e.g. "scenario"
    pub positive_value: String,  // value that maps to 1
    pub derived_column: String,  // name of the new covariate
}

impl ScenarioRule {
    pub fn new(
        source_column: impl Into<String>,
        positive_value: impl Into<String>,
        derived_column: impl Into<String>,
    ) -> Self {
        Self {
            source_column: source_column.into(),
            positive_value: positive_value.into(),
            derived_column: derived_column.into(),
        }
    }

    /// 1 on an exact match, 0 for anything else (missing included)
    pub fn indicator(&self, cell: Option<&str>) -> &'static str {
        match cell {
            Some(value) if value == self.positive_value => "1",
            _ => "0",
        }
    }
}

/// csv as read - header plus string cells, nulls already recognised
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// open and parse a csv file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let file = File::open(path).map_err(|e| HazardError::data_source_not_found(&source, e))?;
        Self::read(file, &source)
    }

    /// parse csv from anything readable
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::read(reader, "<reader>")
    }

    fn read<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| HazardError::data_source_not_found(source, e))?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(HazardError::data_source_not_found(source, "no header row"));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| HazardError::data_source_not_found(source, e))?;
            rows.push(record.iter().map(parse_null).collect());
        }

        debug!(source, rows = rows.len(), columns = headers.len(), "dataset read");
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// add (or overwrite) the rule's derived column - false if the source column isn't there
    fn derive_scenario(&mut self, rule: &ScenarioRule) -> bool {
        let Some(src) = self.column_index(&rule.source_column) else {
            return false;
        };

        let derived: Vec<Option<String>> = self
            .rows
            .iter()
            .map(|row| Some(rule.indicator(row[src].as_deref()).to_string()))
            .collect();

        match self.column_index(&rule.derived_column) {
            Some(dst) => {
                for (row, value) in self.rows.iter_mut().zip(derived) {
                    row[dst] = value;
                }
            }
            None => {
                self.headers.push(rule.derived_column.clone());
                for (row, value) in self.rows.iter_mut().zip(derived) {
                    row.push(value);
                }
            }
        }

        true
    }
}

// cells are kept untrimmed so categorical matches stay exact
fn parse_null(cell: &str) -> Option<String> {
    if cell.trim().is_empty() || NULL_MARKERS.contains(&cell) {
        None
    } else {
        Some(cell.to_string())
    }
}

/// cleaned data + the covariates it was projected onto
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    data: SurvivalData,
    covariates: Vec<String>,
}

impl LoadedDataset {
    pub fn data(&self) -> &SurvivalData {
        &self.data
    }

    /// effective covariates, candidate order
    pub fn covariates(&self) -> &[String] {
        &self.covariates
    }
}

/// candidates that are actually columns, order kept
///
/// repeats collapse onto their first position and the duration/event columns
/// never count as covariates.
pub fn effective_covariates(candidates: &[String], columns: &[String]) -> Vec<String> {
    let mut effective: Vec<String> = Vec::with_capacity(candidates.len());
    for c in candidates {
        let required = c == DURATION_COLUMN || c == EVENT_COLUMN;
        if !required && columns.contains(c) && !effective.contains(c) {
            effective.push(c.clone());
        }
    }
    effective
}

/// read the file and run every check
pub fn load(
    path: impl AsRef<Path>,
    candidates: &[String],
    scenario: Option<&ScenarioRule>,
) -> Result<LoadedDataset> {
    let table = RawTable::from_path(path)?;
    prepare(table, candidates, scenario)
}

/// validation + cleaning on an already-read table
pub fn prepare(
    mut table: RawTable,
    candidates: &[String],
    scenario: Option<&ScenarioRule>,
) -> Result<LoadedDataset> {
    let mut candidates = candidates.to_vec();

    if let Some(rule) = scenario {
        if table.derive_scenario(rule) && !candidates.contains(&rule.derived_column) {
            candidates.push(rule.derived_column.clone());
        }
    }

    let effective = effective_covariates(&candidates, table.headers());
    if effective.is_empty() {
        return Err(HazardError::no_usable_covariates(&candidates));
    }

    let missing: Vec<String> = [DURATION_COLUMN, EVENT_COLUMN]
        .into_iter()
        .filter(|c| !table.has_column(c))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(HazardError::missing_required_columns(missing));
    }

    let projected: Vec<String> = [DURATION_COLUMN, EVENT_COLUMN]
        .into_iter()
        .map(str::to_string)
        .chain(effective.iter().cloned())
        .collect();

    let indices = projected
        .iter()
        .map(|c| {
            table
                .column_index(c)
                .ok_or_else(|| HazardError::missing_required_columns(vec![c.clone()]))
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut flat = Vec::with_capacity(table.n_rows() * projected.len());
    let mut kept = 0;

    for (r, row) in table.rows.iter().enumerate() {
        // null anywhere in the projection → row is out
        let Some(cells) = indices.iter().map(|&j| row[j].as_deref()).collect::<Option<Vec<&str>>>() else {
            continue;
        };

        for (name, text) in projected.iter().zip(cells) {
            flat.push(parse_value(name, r + 1, text)?);
        }
        kept += 1;
    }

    let values = Array2::from_shape_vec((kept, projected.len()), flat)
        .map_err(|e| HazardError::invalid_value("<table>", 0, e.to_string()))?;
    let data = SurvivalData::new(projected, values)?;

    info!(
        rows = kept,
        dropped = table.n_rows() - kept,
        events = data.n_events(EVENT_COLUMN),
        covariates = ?effective,
        "modeling dataset cleaned"
    );

    Ok(LoadedDataset { data, covariates: effective })
}

/// numeric parse + the per-column range rules
fn parse_value(column: &str, row: usize, text: &str) -> Result<f64> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| HazardError::invalid_value(column, row, text))?;

    let ok = match column {
        DURATION_COLUMN => value.is_finite() && value >= 0.0,
        EVENT_COLUMN => value == 0.0 || value == 1.0,
        _ => value.is_finite(),
    };

    if ok {
        Ok(value)
    } else {
        Err(HazardError::invalid_value(column, row, text))
    }
}
