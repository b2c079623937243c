//! coefficients → percentage change in acceptance hazard, ranked
//!
//! a coefficient `c` multiplies the baseline hazard by `exp(c)`, so the
//! percentage change is `(exp(c) - 1) * 100`. ranking is descending with ties
//! left in input order. nothing here knows how a chart gets drawn - the
//! output is plain data for whichever [`ChartRenderer`](crate::render::ChartRenderer)
//! picks it up.

use serde::Serialize;

use crate::fitter::{CoefficientRecord, CoefficientTable};

/// which way a covariate pushes the hazard - presentation only, never affects order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignTag {
    IncreasesHazard,
    DecreasesOrNoEffect,
}

impl SignTag {
    pub fn of(hazard_change_pct: f64) -> Self {
        if hazard_change_pct > 0.0 {
            Self::IncreasesHazard
        } else {
            Self::DecreasesOrNoEffect
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::IncreasesHazard => "increases hazard",
            Self::DecreasesOrNoEffect => "decreases/no effect",
        }
    }
}

/// a fitted coefficient plus its percentage hazard change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactRecord {
    pub covariate: String,
    pub coefficient: f64,
    pub standard_error: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub hazard_change_pct: f64,
    pub sign: SignTag,
}

impl ImpactRecord {
    pub fn from_coefficient(record: &CoefficientRecord) -> Self {
        let pct = hazard_change_pct(record.coefficient);
        Self {
            covariate: record.covariate.clone(),
            coefficient: record.coefficient,
            standard_error: record.standard_error,
            ci_lower: record.ci_lower,
            ci_upper: record.ci_upper,
            hazard_change_pct: pct,
            sign: SignTag::of(pct),
        }
    }
}

/// (exp(c) - 1) * 100, unrounded
pub fn hazard_change_pct(coefficient: f64) -> f64 {
    coefficient.exp_m1() * 100.0
}

/// one decimal + percent sign, the only place values get rounded
pub fn format_pct(value: f64) -> String {
    format!("{value:.1}%")
}

/// impact records, largest increase first
pub fn report(table: &CoefficientTable) -> Vec<ImpactRecord> {
    let mut impacts: Vec<ImpactRecord> = table
        .records()
        .iter()
        .map(ImpactRecord::from_coefficient)
        .collect();

    // sort_by is stable → equal values keep input order
    impacts.sort_by(|a, b| b.hazard_change_pct.total_cmp(&a.hazard_change_pct));
    impacts
}

/// chart title + axis captions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartLabels {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl ChartLabels {
    pub fn new(title: impl Into<String>, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
        }
    }
}

/// one horizontal bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartBar {
    pub label: String,
    pub value: f64,
    pub sign: SignTag,
}

impl ChartBar {
    pub fn annotation(&self) -> String {
        format_pct(self.value)
    }
}

/// everything a renderer needs, bars already in display order
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub bars: Vec<ChartBar>,
}

impl ImpactChart {
    /// largest |value| across bars, 0 when empty
    pub fn max_magnitude(&self) -> f64 {
        self.bars
            .iter()
            .map(|b| b.value.abs())
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }
}

/// ranked impacts → render payload
pub fn impact_chart(impacts: &[ImpactRecord], labels: &ChartLabels) -> ImpactChart {
    ImpactChart {
        title: labels.title.clone(),
        x_label: labels.x_label.clone(),
        y_label: labels.y_label.clone(),
        bars: impacts
            .iter()
            .map(|r| ChartBar {
                label: r.covariate.clone(),
                value: r.hazard_change_pct,
                sign: r.sign,
            })
            .collect(),
    }
}
