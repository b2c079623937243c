use std::path::Path;

use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::{
    config::VariantConfig,
    data::{DURATION_COLUMN, EVENT_COLUMN},
    error::{HazardError, Result},
    fitter::{CoefficientTable, HazardFitter},
    loader::{self, LoadedDataset, RawTable},
    render::ChartRenderer,
    report::{impact_chart, report, ImpactRecord},
};

/// where a run ended up when nothing went wrong
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// every row had a null somewhere - no model, no chart, not an error
    NoRowsToModel,
    Reported(Report),
}

impl PipelineOutcome {
    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::Reported(report) => Some(report),
            Self::NoRowsToModel => None,
        }
    }
}

/// the result of a full load → fit → rank run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub variant: String,
    pub n_rows: usize,
    pub n_events: usize,
    pub covariates: Vec<String>,
    pub coefficients: CoefficientTable,
    pub impacts: Vec<ImpactRecord>,
}

/// load → fit → report → render for one variant
#[derive(Debug, Clone)]
pub struct Pipeline<F> {
    config: VariantConfig,
    fitter: F,
    summary_decimals: Option<usize>,  // None = don't print the coefficient table
}

impl<F: HazardFitter> Pipeline<F> {
    pub fn new(config: VariantConfig, fitter: F) -> Self {
        Self {
            config,
            fitter,
            summary_decimals: Some(4),
        }
    }

    /// print the coefficient table to stdout w/ this many decimals (None to stay quiet)
    pub fn with_summary(mut self, decimals: Option<usize>) -> Self {
        self.summary_decimals = decimals;
        self
    }

    /// read a csv and run everything
    pub fn run(&self, path: impl AsRef<Path>, renderer: &mut impl ChartRenderer) -> Result<PipelineOutcome> {
        let path = path.as_ref();
        let _span = info_span!("pipeline", variant = %self.config.name).entered();
        info!(path = %path.display(), "loading dataset");

        let loaded = loader::load(
            path,
            &self.config.candidate_covariates,
            self.config.scenario_rule.as_ref(),
        )?;
        self.run_loaded(loaded, renderer)
    }

    /// same as [`run`](Self::run) for a table that's already in memory
    pub fn run_table(&self, table: RawTable, renderer: &mut impl ChartRenderer) -> Result<PipelineOutcome> {
        let _span = info_span!("pipeline", variant = %self.config.name).entered();

        let loaded = loader::prepare(
            table,
            &self.config.candidate_covariates,
            self.config.scenario_rule.as_ref(),
        )?;
        self.run_loaded(loaded, renderer)
    }

    fn run_loaded(&self, loaded: LoadedDataset, renderer: &mut impl ChartRenderer) -> Result<PipelineOutcome> {
        let data = loaded.data();

        if data.is_empty() {
            warn!("no rows left after cleaning - skipping model fit");
            return Ok(PipelineOutcome::NoRowsToModel);
        }

        info!(covariates = ?loaded.covariates(), "fitting cox model");
        let coefficients = self
            .fitter
            .fit(data, DURATION_COLUMN, EVENT_COLUMN)
            .map_err(HazardError::model_fit)?;

        if let Some(p) = self.summary_decimals {
            println!("{coefficients:.p$}");
        }

        let impacts = report(&coefficients);
        renderer.render(&impact_chart(&impacts, &self.config.labels))?;

        Ok(PipelineOutcome::Reported(Report {
            variant: self.config.name.clone(),
            n_rows: data.n_samples(),
            n_events: data.n_events(EVENT_COLUMN),
            covariates: loaded.covariates().to_vec(),
            coefficients,
            impacts,
        }))
    }
}
