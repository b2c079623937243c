use std::fmt;

use serde::Serialize;

use crate::{data::SurvivalData, metrics::FitDiagnostics};

/// one fitted covariate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientRecord {
    pub covariate: String,
    pub coefficient: f64,     // log hazard ratio
    pub standard_error: f64,
    pub ci_lower: f64,        // bounds on the coefficient, not the hazard ratio
    pub ci_upper: f64,
}

impl CoefficientRecord {
    /// exp(coef)
    pub fn hazard_ratio(&self) -> f64 {
        self.coefficient.exp()
    }

    /// Wald z statistic
    pub fn z(&self) -> f64 {
        self.coefficient / self.standard_error
    }
}

/// what a fit hands back - one record per covariate, in dataset order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientTable {
    records: Vec<CoefficientRecord>,
    diagnostics: Option<FitDiagnostics>,
}

impl CoefficientTable {
    pub fn new(records: Vec<CoefficientRecord>) -> Self {
        Self { records, diagnostics: None }
    }

    pub fn with_diagnostics(mut self, diagnostics: FitDiagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn records(&self) -> &[CoefficientRecord] {
        &self.records
    }

    pub fn diagnostics(&self) -> Option<&FitDiagnostics> {
        self.diagnostics.as_ref()
    }

    pub fn get(&self, covariate: &str) -> Option<&CoefficientRecord> {
        self.records.iter().find(|r| r.covariate == covariate)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// coefficient summary table - `{:.4}` picks the decimals (default 4)
impl fmt::Display for CoefficientTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = f.precision().unwrap_or(4);
        let w = p + 8;

        writeln!(f, "cox proportional hazards model")?;
        writeln!(
            f,
            "{:<24} {:>w$} {:>w$} {:>w$} {:>w$} {:>w$}",
            "covariate", "coef", "exp(coef)", "se(coef)", "coef lower", "coef upper"
        )?;
        writeln!(f, "{:-<1$}", "", 24 + 5 * (w + 1))?;

        for r in &self.records {
            writeln!(
                f,
                "{:<24} {:>w$.p$} {:>w$.p$} {:>w$.p$} {:>w$.p$} {:>w$.p$}",
                r.covariate,
                r.coefficient,
                r.hazard_ratio(),
                r.standard_error,
                r.ci_lower,
                r.ci_upper,
            )?;
        }

        if let Some(d) = &self.diagnostics {
            writeln!(f)?;
            write!(f, "{d:.p$}")?;
        }

        Ok(())
    }
}

/// the proportional-hazards solver seam
///
/// given cleaned data plus the duration/event column names, return one
/// [`CoefficientRecord`] per remaining column. errors are the solver's own -
/// callers surface them as-is.
pub trait HazardFitter {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fit(
        &self,
        data: &SurvivalData,
        duration_column: &str,
        event_column: &str,
    ) -> Result<CoefficientTable, Self::Error>;
}

impl<F: HazardFitter + ?Sized> HazardFitter for &F {
    type Error = F::Error;

    fn fit(
        &self,
        data: &SurvivalData,
        duration_column: &str,
        event_column: &str,
    ) -> Result<CoefficientTable, Self::Error> {
        (**self).fit(data, duration_column, event_column)
    }
}
