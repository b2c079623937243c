use std::fmt;

use ndarray::{Array1, ArrayView1};
use serde::Serialize;

use crate::solver::SolverError;

type Result<T> = std::result::Result<T, SolverError>;

fn check_lengths(risk_scores: usize, times: usize, events: usize) -> Result<()> {
    if risk_scores != times || times != events {
        return Err(SolverError::dimensions(format!(
            "risk scores ({risk_scores}), times ({times}) and events ({events}) must have same length"
        )));
    }
    Ok(())
}

/// Harrell's C - how often does the higher risk score go with the earlier acceptance?
///
/// tied risk scores count as half. None when there are no comparable pairs.
pub fn concordance_index(
    risk_scores: ArrayView1<f64>,
    times: ArrayView1<f64>,
    events: &[bool],
) -> Result<Option<f64>> {
    check_lengths(risk_scores.len(), times.len(), events.len())?;

    let n = risk_scores.len();
    let mut concordant = 0.0;
    let mut comparable = 0.0;

    for i in 0..n {
        if !events[i] {
            continue; // censored obs can't anchor a pair
        }

        for j in 0..n {
            if i == j {
                continue;
            }

            // j outlasted i (or was censored no earlier)
            if times[j] > times[i] || (!events[j] && times[j] >= times[i]) {
                comparable += 1.0;

                if risk_scores[i] > risk_scores[j] {
                    concordant += 1.0;
                } else if risk_scores[i] == risk_scores[j] {
                    concordant += 0.5;
                }
            }
        }
    }

    if comparable == 0.0 {
        return Ok(None);
    }

    Ok(Some(concordant / comparable))
}

/// Breslow log partial likelihood for given linear predictors
pub fn log_partial_likelihood(
    risk_scores: ArrayView1<f64>,
    times: ArrayView1<f64>,
    events: &[bool],
) -> Result<f64> {
    check_lengths(risk_scores.len(), times.len(), events.len())?;

    let n = risk_scores.len();
    let mut loglik = 0.0;

    for i in 0..n {
        if !events[i] {
            continue;
        }

        let event_time = times[i];
        // log-sum-exp over the risk set (numerically stable)
        let max_risk = (0..n)
            .filter(|&j| times[j] >= event_time)
            .map(|j| risk_scores[j])
            .fold(f64::NEG_INFINITY, f64::max);
        let log_sum_exp = max_risk
            + (0..n)
                .filter(|&j| times[j] >= event_time)
                .map(|j| (risk_scores[j] - max_risk).exp())
                .sum::<f64>()
                .ln();

        loglik += risk_scores[i] - log_sum_exp;
    }

    Ok(loglik)
}

/// partial AIC: 2k - 2 ll
pub fn partial_aic(log_likelihood: f64, n_parameters: usize) -> f64 {
    2.0 * n_parameters as f64 - 2.0 * log_likelihood
}

/// likelihood-ratio statistic vs the all-zero model
pub fn likelihood_ratio(log_likelihood: f64, null_log_likelihood: f64) -> f64 {
    2.0 * (log_likelihood - null_log_likelihood)
}

/// the footer of the coefficient summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitDiagnostics {
    pub n_observations: usize,
    pub n_events: usize,
    pub log_likelihood: f64,
    pub null_log_likelihood: f64,
    pub concordance: Option<f64>,
    pub partial_aic: f64,
    pub lr_statistic: f64,
    pub lr_df: usize,
}

impl FitDiagnostics {
    /// everything at once from the fitted linear predictors
    pub fn compute(
        risk_scores: ArrayView1<f64>,
        times: ArrayView1<f64>,
        events: &[bool],
        n_parameters: usize,
    ) -> Result<Self> {
        let log_likelihood = log_partial_likelihood(risk_scores, times, events)?;
        let null_scores = Array1::zeros(risk_scores.len());
        let null_log_likelihood = log_partial_likelihood(null_scores.view(), times, events)?;

        Ok(Self {
            n_observations: times.len(),
            n_events: events.iter().filter(|&&e| e).count(),
            log_likelihood,
            null_log_likelihood,
            concordance: concordance_index(risk_scores, times, events)?,
            partial_aic: partial_aic(log_likelihood, n_parameters),
            lr_statistic: likelihood_ratio(log_likelihood, null_log_likelihood),
            lr_df: n_parameters,
        })
    }
}

impl fmt::Display for FitDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = f.precision().unwrap_or(4);

        writeln!(f, "observations:            {}", self.n_observations)?;
        writeln!(f, "events observed:         {}", self.n_events)?;
        writeln!(f, "partial log-likelihood:  {:.p$}", self.log_likelihood)?;
        match self.concordance {
            Some(c) => writeln!(f, "concordance:             {c:.p$}")?,
            None => writeln!(f, "concordance:             n/a")?,
        }
        writeln!(f, "partial AIC:             {:.p$}", self.partial_aic)?;
        writeln!(
            f,
            "log-likelihood ratio:    {:.p$} on {} df",
            self.lr_statistic, self.lr_df
        )
    }
}
