use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use crate::error::{HazardError, Result};

/// duration column every dataset has to carry
pub const DURATION_COLUMN: &str = "time_to_event";
/// 1 = acceptance observed, 0 = censored
pub const EVENT_COLUMN: &str = "event_status";

/// cleaned survival table - named numeric columns, no nulls, read-only after load
#[derive(Debug, Clone)]
pub struct SurvivalData {
    columns: Vec<String>,   // column names in projection order
    values: Array2<f64>,    // n_samples x n_columns
}

impl SurvivalData {
    /// wrap a column-named matrix
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.ncols() != columns.len() {
            return Err(HazardError::invalid_value(
                "<header>",
                0,
                format!("{} column names for {} value columns", columns.len(), values.ncols()),
            ));
        }

        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(HazardError::invalid_value("<header>", 0, format!("duplicate column {name}")));
            }
        }

        Ok(Self { columns, values })
    }

    /// how many subjects made it through cleaning
    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples() == 0
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// one column by name
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name).map(|j| self.values.column(j))
    }

    /// the whole matrix
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// every column except the ones named, in table order
    pub fn columns_except(&self, excluded: &[&str]) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !excluded.contains(&c.as_str()))
            .cloned()
            .collect()
    }

    /// copy out a sub-matrix of named columns (None if any name is unknown)
    pub fn select(&self, names: &[String]) -> Option<Array2<f64>> {
        let indices: Option<Vec<usize>> = names.iter().map(|n| self.column_index(n)).collect();
        Some(self.values.select(Axis(1), &indices?))
    }

    /// count of rows with a nonzero event flag
    pub fn n_events(&self, event_column: &str) -> usize {
        self.column(event_column)
            .map(|col| col.iter().filter(|&&e| e != 0.0).count())
            .unwrap_or(0)
    }
}
