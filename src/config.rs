use crate::{loader::ScenarioRule, report::ChartLabels};

/// the four situational covariates both device variants look for
pub const BASE_COVARIATES: [&str; 4] = [
    "has_body_insurance",
    "drive_continue_over_10",
    "cargo_perishable",
    "cruise_regular",
];

/// where each run reads its data when no path is given
pub const DEFAULT_DATA_PATH: &str = "sample_data.csv";

/// what makes one modeling variant different from another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantConfig {
    pub name: String,
    pub candidate_covariates: Vec<String>,   // wanted, in report order
    pub scenario_rule: Option<ScenarioRule>, // derived 0/1 covariate, if any
    pub labels: ChartLabels,
}

impl VariantConfig {
    pub fn new(name: impl Into<String>, candidate_covariates: Vec<String>, labels: ChartLabels) -> Self {
        Self {
            name: name.into(),
            candidate_covariates,
            scenario_rule: None,
            labels,
        }
    }

    pub fn with_scenario_rule(mut self, rule: ScenarioRule) -> Self {
        self.scenario_rule = Some(rule);
        self
    }

    /// acceptance of the in-cab application
    pub fn application_device() -> Self {
        Self::new(
            "application",
            BASE_COVARIATES.iter().map(|c| c.to_string()).collect(),
            ChartLabels::new(
                "Impact of Covariates on App Acceptance Hazard Rate",
                "Percentage Change in Hazard Rate of Acceptance (%)",
                "Covariate",
            ),
        )
    }

    /// acceptance of the probe device - adds the probe_camera scenario flag up front
    pub fn probe_device() -> Self {
        let rule = ScenarioRule::new("scenario", "probe_camera", "scenario_numeric");
        let candidates = std::iter::once(rule.derived_column.clone())
            .chain(BASE_COVARIATES.iter().map(|c| c.to_string()))
            .collect();

        Self::new(
            "probe",
            candidates,
            ChartLabels::new(
                "Impact of Factors on Acceptance Hazard Rate (%)",
                "Percentage Change in Hazard Rate (%)",
                "Covariate",
            ),
        )
        .with_scenario_rule(rule)
    }
}
