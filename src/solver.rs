use ndarray::{Array1, Array2, Axis};
use thiserror::Error;
use tracing::debug;

use crate::{
    data::SurvivalData,
    fitter::{CoefficientRecord, CoefficientTable, HazardFitter},
    metrics::FitDiagnostics,
};

/// smallest step fraction tried before taking the step anyway
const MIN_STEP_SCALE: f64 = 1.0 / 1_048_576.0;

/// a converged fit whose last newton step still moved a coefficient this far
/// is sliding along a flat likelihood ridge, not sitting at a maximum
const MAX_FINAL_STEP: f64 = 0.1;

/// everything the bundled solver can trip over
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("no acceptance events observed - nothing to fit")]
    NoEvents,

    #[error("column '{column}' not in dataset")]
    UnknownColumn { column: String },

    #[error("information matrix is singular at iteration {iteration} - constant or collinear covariates?")]
    Singular { iteration: usize },

    #[error("newton-raphson didn't converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("coefficient for '{covariate}' is diverging ({coefficient:.2} and still moving) - the covariate separates accepted from censored rows")]
    Diverging { covariate: String, coefficient: f64 },

    #[error("partial likelihood went non-finite at iteration {iteration}")]
    NonFinite { iteration: usize },

    #[error("bad parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    #[error("dimensions don't match: {message}")]
    InvalidDimensions { message: String },
}

impl SolverError {
    pub fn unknown_column(column: impl Into<String>) -> Self {
        Self::UnknownColumn { column: column.into() }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    pub fn dimensions(message: impl Into<String>) -> Self {
        Self::InvalidDimensions { message: message.into() }
    }
}

/// plain maximum-partial-likelihood cox fit (Breslow ties, no penalty)
#[derive(Debug, Clone)]
pub struct NewtonRaphsonFitter {
    max_iterations: usize,
    tolerance: f64,          // stop once |Δ loglik| drops below this
    confidence_level: f64,   // two-sided, for the coefficient bounds
}

impl Default for NewtonRaphsonFitter {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-9,
            confidence_level: 0.95,
        }
    }
}

impl NewtonRaphsonFitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// iteration cap before giving up
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// how close is close enough for convergence
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol.abs();
        self
    }

    /// e.g. 0.95 for 95% bounds - checked at fit time
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    fn newton_raphson(&self, problem: &RiskSetProblem, names: &[String]) -> Result<Array1<f64>, SolverError> {
        let mut beta = Array1::zeros(problem.n_features());
        let mut current = problem.derivatives(&beta, 0)?;

        for iteration in 1..=self.max_iterations {
            let inverse = invert(&current.information)
                .ok_or(SolverError::Singular { iteration })?;
            let step = inverse.dot(&current.gradient);

            // halve until the likelihood stops getting worse
            let mut scale = 1.0;
            let (candidate, next) = loop {
                let candidate = &beta + &(&step * scale);
                let next = problem.derivatives(&candidate, iteration);
                let improved = matches!(
                    &next,
                    Ok(d) if d.loglik >= current.loglik - 1e-12 * current.loglik.abs().max(1.0)
                );
                if improved || scale < MIN_STEP_SCALE {
                    break (candidate, next?);
                }
                scale *= 0.5;
            };

            let change = (next.loglik - current.loglik).abs();
            let moved = (&candidate - &beta).mapv(f64::abs);
            beta = candidate;
            current = next;

            if change < self.tolerance {
                // monotone likelihood: loglik flattens out while beta keeps walking
                if let Some((j, &step)) = moved.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)) {
                    if step > MAX_FINAL_STEP {
                        return Err(SolverError::Diverging {
                            covariate: names.get(j).cloned().unwrap_or_default(),
                            coefficient: beta[j],
                        });
                    }
                }
                debug!(iterations = iteration, loglik = current.loglik, "cox fit converged");
                return Ok(beta);
            }
        }

        Err(SolverError::NotConverged { iterations: self.max_iterations })
    }
}

impl HazardFitter for NewtonRaphsonFitter {
    type Error = SolverError;

    fn fit(
        &self,
        data: &SurvivalData,
        duration_column: &str,
        event_column: &str,
    ) -> Result<CoefficientTable, SolverError> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(SolverError::invalid_parameter("confidence_level", self.confidence_level));
        }

        let times = data
            .column(duration_column)
            .ok_or_else(|| SolverError::unknown_column(duration_column))?
            .to_owned();
        let events: Vec<bool> = data
            .column(event_column)
            .ok_or_else(|| SolverError::unknown_column(event_column))?
            .iter()
            .map(|&e| e != 0.0)
            .collect();

        if !events.iter().any(|&e| e) {
            return Err(SolverError::NoEvents);
        }

        let names = data.columns_except(&[duration_column, event_column]);
        let covariates = data
            .select(&names)
            .ok_or_else(|| SolverError::unknown_column(names.join(", ")))?;

        let problem = RiskSetProblem::new(times, events, covariates);
        let beta = self.newton_raphson(&problem, &names)?;

        let last = problem.derivatives(&beta, self.max_iterations)?;
        let covariance = invert(&last.information)
            .ok_or(SolverError::Singular { iteration: self.max_iterations })?;
        let z = normal_quantile(0.5 + self.confidence_level / 2.0);

        let records = names
            .into_iter()
            .enumerate()
            .map(|(j, covariate)| {
                let se = covariance[[j, j]].max(0.0).sqrt();
                CoefficientRecord {
                    covariate,
                    coefficient: beta[j],
                    standard_error: se,
                    ci_lower: beta[j] - z * se,
                    ci_upper: beta[j] + z * se,
                }
            })
            .collect();

        let risk_scores = problem.covariates.dot(&beta);
        let diagnostics = FitDiagnostics::compute(
            risk_scores.view(),
            problem.times.view(),
            &problem.events,
            beta.len(),
        )?;

        Ok(CoefficientTable::new(records).with_diagnostics(diagnostics))
    }
}

/// loglik + first/second derivatives at one beta
#[derive(Debug, Clone)]
struct Derivatives {
    loglik: f64,
    gradient: Array1<f64>,
    information: Array2<f64>,  // negative hessian
}

/// data laid out for risk-set sweeps - latest time first, covariates centred
#[derive(Debug, Clone)]
struct RiskSetProblem {
    times: Array1<f64>,
    events: Vec<bool>,
    covariates: Array2<f64>,
    groups: Vec<Vec<usize>>,  // row indices sharing a time, descending time
}

impl RiskSetProblem {
    fn new(times: Array1<f64>, events: Vec<bool>, mut covariates: Array2<f64>) -> Self {
        // partial likelihood is shift-invariant in x
        if covariates.nrows() > 0 {
            if let Some(means) = covariates.mean_axis(Axis(0)) {
                covariates -= &means;
            }
        }

        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by(|&a, &b| times[b].total_cmp(&times[a]));

        let groups = order
            .chunk_by(|&a, &b| times[a] == times[b])
            .map(<[usize]>::to_vec)
            .collect();

        Self { times, events, covariates, groups }
    }

    fn n_features(&self) -> usize {
        self.covariates.ncols()
    }

    /// one sweep from the longest time down, growing the risk set as we go
    fn derivatives(&self, beta: &Array1<f64>, iteration: usize) -> Result<Derivatives, SolverError> {
        let k = self.n_features();
        let eta = self.covariates.dot(beta);
        let offset = eta.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let offset = if offset.is_finite() { offset } else { 0.0 };

        let mut loglik = 0.0;
        let mut gradient = Array1::zeros(k);
        let mut information = Array2::zeros((k, k));

        let mut s0 = 0.0;
        let mut s1 = Array1::<f64>::zeros(k);
        let mut s2 = Array2::<f64>::zeros((k, k));

        for group in &self.groups {
            for &i in group {
                let w = (eta[i] - offset).exp();
                let x = self.covariates.row(i);
                s0 += w;
                s1.scaled_add(w, &x);
                for a in 0..k {
                    for b in 0..k {
                        s2[[a, b]] += w * x[a] * x[b];
                    }
                }
            }

            let deaths: Vec<usize> = group.iter().copied().filter(|&i| self.events[i]).collect();
            if deaths.is_empty() {
                continue;
            }

            let d = deaths.len() as f64;
            let mean = &s1 / s0;

            loglik += deaths.iter().map(|&i| eta[i]).sum::<f64>() - d * (s0.ln() + offset);
            for &i in &deaths {
                gradient += &self.covariates.row(i);
            }
            gradient.scaled_add(-d, &mean);

            for a in 0..k {
                for b in 0..k {
                    information[[a, b]] += d * (s2[[a, b]] / s0 - mean[a] * mean[b]);
                }
            }
        }

        if !loglik.is_finite() || gradient.iter().any(|g| !g.is_finite()) {
            return Err(SolverError::NonFinite { iteration });
        }

        Ok(Derivatives { loglik, gradient, information })
    }
}

/// gauss-jordan inverse w/ partial pivoting - None if (numerically) singular
fn invert(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }

    let scale = a.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let threshold = 1e-10 * scale;

    let mut work = a.clone();
    let mut inverse = Array2::eye(n);

    for i in 0..n {
        // find pivot
        let mut max_row = i;
        for r in i + 1..n {
            if work[[r, i]].abs() > work[[max_row, i]].abs() {
                max_row = r;
            }
        }

        if work[[max_row, i]].abs() <= threshold {
            return None;
        }

        if max_row != i {
            for j in 0..n {
                work.swap([i, j], [max_row, j]);
                inverse.swap([i, j], [max_row, j]);
            }
        }

        let pivot = work[[i, i]];
        for j in 0..n {
            work[[i, j]] /= pivot;
            inverse[[i, j]] /= pivot;
        }

        for r in 0..n {
            if r == i {
                continue;
            }
            let factor = work[[r, i]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                work[[r, j]] -= factor * work[[i, j]];
                inverse[[r, j]] -= factor * inverse[[i, j]];
            }
        }
    }

    Some(inverse)
}

/// standard normal quantile (Acklam's rational approximation, ~1e-9 relative)
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01, 2.209460984245205e+02, -2.759285104469687e+02,
        1.383577518672690e+02, -3.066479806614716e+01, 2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01, 1.615858368580409e+02, -1.556989798598866e+02,
        6.680131188771972e+01, -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03, -3.223964580411365e-01, -2.400758277161838e+00,
        -2.549732539343734e+00, 4.374664141464968e+00, 2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03, 3.224671290700398e-01, 2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -normal_quantile(1.0 - p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DURATION_COLUMN, EVENT_COLUMN};
    use crate::metrics::log_partial_likelihood;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn dataset(rows: &[[f64; 4]]) -> SurvivalData {
        let columns = vec![
            DURATION_COLUMN.to_string(),
            EVENT_COLUMN.to_string(),
            "has_body_insurance".to_string(),
            "cargo_perishable".to_string(),
        ];
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        SurvivalData::new(columns, Array2::from_shape_vec((rows.len(), 4), flat).unwrap()).unwrap()
    }

    /// exponential acceptance times w/ known log hazard ratios
    fn synthetic(n: usize, coefs: [f64; 2], seed: u64) -> SurvivalData {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::with_capacity(n);

        for _ in 0..n {
            let x1 = if rng.gen_bool(0.5) { 1.0 } else { 0.0 };
            let x2 = if rng.gen_bool(0.4) { 1.0 } else { 0.0 };
            let hazard = 0.1 * (coefs[0] * x1 + coefs[1] * x2).exp();
            let time = -rng.gen::<f64>().ln() / hazard;
            let censor = rng.gen_range(5.0..40.0);

            if time < censor {
                rows.push([time, 1.0, x1, x2]);
            } else {
                rows.push([censor, 0.0, x1, x2]);
            }
        }

        dataset(&rows)
    }

    #[test]
    fn test_fitter_creation() {
        let fitter = NewtonRaphsonFitter::new()
            .with_max_iterations(20)
            .with_tolerance(1e-6)
            .with_confidence_level(0.9);

        assert_eq!(fitter.max_iterations, 20);
        assert_eq!(fitter.tolerance, 1e-6);
        assert_eq!(fitter.confidence_level(), 0.9);
    }

    #[test]
    fn test_normal_quantile() {
        assert_relative_eq!(normal_quantile(0.975), 1.959963985, epsilon = 1e-6);
        assert_relative_eq!(normal_quantile(0.5), 0.0, epsilon = 1e-12);
        assert_relative_eq!(normal_quantile(0.01), -2.326347874, epsilon = 1e-6);
        assert_relative_eq!(normal_quantile(0.95), 1.644853627, epsilon = 1e-6);
    }

    #[test]
    fn test_invert() {
        let a = Array2::from_shape_vec((2, 2), vec![4.0, 7.0, 2.0, 6.0]).unwrap();
        let inv = invert(&a).unwrap();
        let id = a.dot(&inv);
        assert_relative_eq!(id[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(id[[0, 1]], 0.0, epsilon = 1e-12);
        assert_relative_eq!(id[[1, 1]], 1.0, epsilon = 1e-12);

        let singular = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 2.0, 4.0]).unwrap();
        assert!(invert(&singular).is_none());
    }

    #[test]
    fn test_recovers_known_coefficients() {
        let data = synthetic(2000, [0.7, -0.5], 42);
        let table = NewtonRaphsonFitter::new()
            .fit(&data, DURATION_COLUMN, EVENT_COLUMN)
            .unwrap();

        assert_eq!(table.len(), 2);
        let ins = table.get("has_body_insurance").unwrap();
        let cargo = table.get("cargo_perishable").unwrap();

        assert!((ins.coefficient - 0.7).abs() < 0.2, "got {}", ins.coefficient);
        assert!((cargo.coefficient + 0.5).abs() < 0.2, "got {}", cargo.coefficient);
        assert!(ins.standard_error > 0.0 && ins.standard_error < 0.2);
        assert!(ins.ci_lower < ins.coefficient && ins.coefficient < ins.ci_upper);
        assert_relative_eq!(
            ins.ci_upper - ins.coefficient,
            1.959963985 * ins.standard_error,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_loglik_matches_metrics() {
        let data = synthetic(200, [0.4, 0.3], 7);
        let table = NewtonRaphsonFitter::new()
            .fit(&data, DURATION_COLUMN, EVENT_COLUMN)
            .unwrap();

        let d = table.diagnostics().unwrap();
        let beta = Array1::from(table.records().iter().map(|r| r.coefficient).collect::<Vec<_>>());
        let x = data.select(&["has_body_insurance".to_string(), "cargo_perishable".to_string()]).unwrap();
        let times = data.column(DURATION_COLUMN).unwrap();
        let events: Vec<bool> = data.column(EVENT_COLUMN).unwrap().iter().map(|&e| e != 0.0).collect();

        let ll = log_partial_likelihood(x.dot(&beta).view(), times, &events).unwrap();
        assert_relative_eq!(d.log_likelihood, ll, epsilon = 1e-8);
        assert!(d.lr_statistic >= 0.0);
    }

    #[test]
    fn test_tied_times() {
        let data = dataset(&[
            [1.0, 1.0, 1.0, 0.0],
            [1.0, 1.0, 0.0, 1.0],
            [2.0, 1.0, 1.0, 1.0],
            [2.0, 0.0, 0.0, 0.0],
            [3.0, 1.0, 0.0, 1.0],
            [3.0, 1.0, 1.0, 0.0],
            [4.0, 0.0, 0.0, 0.0],
            [5.0, 1.0, 0.0, 1.0],
            [6.0, 1.0, 1.0, 1.0],
            [7.0, 0.0, 1.0, 0.0],
        ]);

        let table = NewtonRaphsonFitter::new()
            .fit(&data, DURATION_COLUMN, EVENT_COLUMN)
            .unwrap();
        assert!(table.records().iter().all(|r| r.coefficient.is_finite()));
        assert!(table.records().iter().all(|r| r.standard_error.is_finite()));
    }

    #[test]
    fn test_constant_covariate_is_singular() {
        let data = dataset(&[
            [1.0, 1.0, 1.0, 0.0],
            [2.0, 0.0, 1.0, 1.0],
            [3.0, 1.0, 1.0, 0.0],
            [4.0, 1.0, 1.0, 1.0],
        ]);

        let err = NewtonRaphsonFitter::new()
            .fit(&data, DURATION_COLUMN, EVENT_COLUMN)
            .unwrap_err();
        assert!(matches!(err, SolverError::Singular { .. }));
    }

    #[test]
    fn test_collinear_covariates_are_singular() {
        let data = dataset(&[
            [1.0, 1.0, 1.0, 1.0],
            [2.0, 0.0, 0.0, 0.0],
            [3.0, 1.0, 1.0, 1.0],
            [4.0, 1.0, 0.0, 0.0],
            [5.0, 1.0, 1.0, 1.0],
        ]);

        let err = NewtonRaphsonFitter::new()
            .fit(&data, DURATION_COLUMN, EVENT_COLUMN)
            .unwrap_err();
        assert!(matches!(err, SolverError::Singular { .. }));
    }

    #[test]
    fn test_separated_covariate_is_diverging() {
        // every insured driver accepts before any uninsured one
        let columns = vec![
            DURATION_COLUMN.to_string(),
            EVENT_COLUMN.to_string(),
            "has_body_insurance".to_string(),
        ];
        let values = Array2::from_shape_vec((6, 3), vec![
            1.0, 1.0, 1.0,
            2.0, 1.0, 1.0,
            3.0, 1.0, 1.0,
            4.0, 1.0, 0.0,
            5.0, 1.0, 0.0,
            6.0, 0.0, 0.0,
        ]).unwrap();
        let data = SurvivalData::new(columns, values).unwrap();

        let err = NewtonRaphsonFitter::new()
            .fit(&data, DURATION_COLUMN, EVENT_COLUMN)
            .unwrap_err();
        match err {
            SolverError::Diverging { covariate, coefficient } => {
                assert_eq!(covariate, "has_body_insurance");
                assert!(coefficient > 5.0, "got {coefficient}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_events() {
        let data = dataset(&[[1.0, 0.0, 1.0, 0.0], [2.0, 0.0, 0.0, 1.0]]);
        let err = NewtonRaphsonFitter::new()
            .fit(&data, DURATION_COLUMN, EVENT_COLUMN)
            .unwrap_err();
        assert_eq!(err, SolverError::NoEvents);
    }

    #[test]
    fn test_unknown_column() {
        let data = dataset(&[[1.0, 1.0, 1.0, 0.0]]);
        let err = NewtonRaphsonFitter::new().fit(&data, "duration", EVENT_COLUMN).unwrap_err();
        assert_eq!(err, SolverError::unknown_column("duration"));
    }

    #[test]
    fn test_bad_confidence_level() {
        let data = synthetic(50, [0.1, 0.1], 3);
        let err = NewtonRaphsonFitter::new()
            .with_confidence_level(1.5)
            .fit(&data, DURATION_COLUMN, EVENT_COLUMN)
            .unwrap_err();
        assert!(matches!(err, SolverError::InvalidParameter { .. }));
    }

    #[test]
    fn test_iteration_cap() {
        let data = synthetic(100, [0.8, -0.6], 11);
        let err = NewtonRaphsonFitter::new()
            .with_max_iterations(1)
            .with_tolerance(0.0)
            .fit(&data, DURATION_COLUMN, EVENT_COLUMN)
            .unwrap_err();
        assert_eq!(err, SolverError::NotConverged { iterations: 1 });
    }
}
