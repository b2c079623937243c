use acceptance_hazards::{
    loader, report::ImpactChart, ChartRenderer, CoefficientTable, HazardError, HazardFitter,
    NewtonRaphsonFitter, Pipeline, PipelineOutcome, Result, SignTag, SurvivalData,
    TextChartRenderer, VariantConfig,
};
use approx::assert_relative_eq;
use std::cell::Cell;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// exponential acceptance times, known log hazard ratios, uniform censoring
fn synthetic_csv(n_samples: usize, seed: u64, with_scenario: bool) -> String {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = String::from(
        "time_to_event,event_status,has_body_insurance,drive_continue_over_10,cargo_perishable,cruise_regular,scenario\n",
    );

    // insurance ↑, long drive ↓, perishable ↑↑, cruising ~0, probe camera ↑
    let true_coefficients = [0.4, -0.5, 0.8, 0.0, 0.3];

    for _ in 0..n_samples {
        let x: Vec<f64> = (0..4).map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 }).collect();
        let probe = with_scenario && rng.gen_bool(0.5);
        let linear_pred: f64 = x.iter().zip(&true_coefficients).map(|(a, b)| a * b).sum::<f64>()
            + if probe { true_coefficients[4] } else { 0.0 };

        let hazard = 0.05 * linear_pred.exp();
        let time = -rng.gen::<f64>().ln() / hazard;
        let censoring_time = rng.gen_range(10.0..60.0);
        let (t, e) = if time < censoring_time { (time, 1) } else { (censoring_time, 0) };

        let scenario = if probe { "probe_camera" } else { "app_only" };
        let _ = writeln!(csv, "{t:.4},{e},{},{},{},{},{scenario}", x[0], x[1], x[2], x[3]);
    }

    csv
}

fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// counts fits, never really fits
struct CountingFitter {
    calls: Cell<usize>,
}

impl HazardFitter for CountingFitter {
    type Error = std::io::Error;

    fn fit(&self, _: &SurvivalData, _: &str, _: &str) -> std::result::Result<CoefficientTable, std::io::Error> {
        self.calls.set(self.calls.get() + 1);
        Ok(CoefficientTable::new(Vec::new()))
    }
}

#[derive(Default)]
struct CountingRenderer {
    renders: usize,
}

impl ChartRenderer for CountingRenderer {
    fn render(&mut self, _: &ImpactChart) -> Result<()> {
        self.renders += 1;
        Ok(())
    }
}

fn run_counting(config: VariantConfig, path: &Path) -> (Result<PipelineOutcome>, usize, usize) {
    let fitter = CountingFitter { calls: Cell::new(0) };
    let mut renderer = CountingRenderer::default();
    let outcome = Pipeline::new(config, &fitter).with_summary(None).run(path, &mut renderer);
    (outcome, fitter.calls.get(), renderer.renders)
}

#[test]
fn test_application_pipeline_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "app.csv", &synthetic_csv(1500, 42, false));

    let mut chart = TextChartRenderer::new(Vec::new());
    let pipeline = Pipeline::new(VariantConfig::application_device(), NewtonRaphsonFitter::new())
        .with_summary(None);

    let outcome = pipeline.run(&path, &mut chart).unwrap();
    let report = outcome.report().unwrap();

    assert_eq!(report.variant, "application");
    assert_eq!(report.n_rows, 1500);
    assert_eq!(report.covariates.len(), 4);
    // scenario column exists but the application variant ignores it
    assert!(report.coefficients.get("scenario_numeric").is_none());

    // perishable cargo has the largest true effect
    assert_eq!(report.impacts[0].covariate, "cargo_perishable");
    assert_eq!(report.impacts[0].sign, SignTag::IncreasesHazard);
    assert_eq!(report.impacts.last().unwrap().covariate, "drive_continue_over_10");

    for pair in report.impacts.windows(2) {
        assert!(pair[0].hazard_change_pct >= pair[1].hazard_change_pct);
    }

    let perishable = report.coefficients.get("cargo_perishable").unwrap();
    assert!((perishable.coefficient - 0.8).abs() < 0.2);
    assert_relative_eq!(
        report.impacts[0].hazard_change_pct,
        (perishable.coefficient.exp() - 1.0) * 100.0,
        epsilon = 1e-9
    );

    let text = String::from_utf8(chart.into_inner()).unwrap();
    assert!(text.starts_with("Impact of Covariates on App Acceptance Hazard Rate"));
    assert!(text.contains("cargo_perishable"));
}

#[test]
fn test_probe_pipeline_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "probe.csv", &synthetic_csv(1500, 7, true));

    let mut chart = TextChartRenderer::new(Vec::new());
    let pipeline = Pipeline::new(VariantConfig::probe_device(), NewtonRaphsonFitter::new())
        .with_summary(None);

    let outcome = pipeline.run(&path, &mut chart).unwrap();
    let report = outcome.report().unwrap();

    assert_eq!(report.covariates[0], "scenario_numeric");
    assert_eq!(report.covariates.len(), 5);

    let scenario = report.coefficients.get("scenario_numeric").unwrap();
    assert!((scenario.coefficient - 0.3).abs() < 0.2, "got {}", scenario.coefficient);

    let diagnostics = report.coefficients.diagnostics().unwrap();
    assert_eq!(diagnostics.n_observations, 1500);
    assert!(diagnostics.concordance.unwrap() > 0.5);
    assert!(diagnostics.lr_statistic > 0.0);
}

#[test]
fn test_one_row_missing_event_status() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "five.csv",
        "time_to_event,event_status,has_body_insurance\n\
         1.0,1,1\n\
         2.0,0,0\n\
         3.0,,1\n\
         4.0,1,0\n\
         5.0,1,1\n",
    );

    let loaded = loader::load(
        &path,
        &VariantConfig::application_device().candidate_covariates,
        None,
    )
    .unwrap();

    assert_eq!(loaded.data().n_samples(), 4);
    assert_eq!(loaded.covariates(), &["has_body_insurance".to_string()]);
}

#[test]
fn test_empty_intersection_halts_before_fitting() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "xy.csv", "time_to_event,event_status,z\n1,1,0\n2,0,1\n");

    let config = VariantConfig::new(
        "xy",
        vec!["x".to_string(), "y".to_string()],
        VariantConfig::application_device().labels,
    );
    let (outcome, fits, renders) = run_counting(config, &path);

    match outcome.unwrap_err() {
        HazardError::NoUsableCovariates { candidates } => assert_eq!(candidates, vec!["x", "y"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fits, 0);
    assert_eq!(renders, 0);
}

#[test]
fn test_no_rows_after_cleaning() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "nulls.csv",
        "time_to_event,event_status,cargo_perishable\n,1,0\n2,,1\n3,1,\n",
    );

    let (outcome, fits, renders) = run_counting(VariantConfig::application_device(), &path);

    assert_eq!(outcome.unwrap(), PipelineOutcome::NoRowsToModel);
    assert_eq!(fits, 0);
    assert_eq!(renders, 0);
}

#[test]
fn test_missing_file_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let (outcome, fits, _) = run_counting(VariantConfig::probe_device(), &dir.path().join("nope.csv"));

    let err = outcome.unwrap_err();
    assert!(matches!(err, HazardError::DataSourceNotFound { .. }));
    assert!(err.is_validation());
    assert_eq!(fits, 0);
}

#[test]
fn test_missing_required_columns() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "no_time.csv", "event_status,cruise_regular\n1,0\n");

    let (outcome, fits, _) = run_counting(VariantConfig::application_device(), &path);

    match outcome.unwrap_err() {
        HazardError::MissingRequiredColumns { missing } => assert_eq!(missing, vec!["time_to_event"]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fits, 0);
}

#[test]
fn test_variants_run_independently() {
    let dir = TempDir::new().unwrap();
    // no scenario column and no base covariates: probe fails, application too
    let bad = write_csv(&dir, "bad.csv", "time_to_event,event_status\n1,1\n");
    let good = write_csv(&dir, "good.csv", &synthetic_csv(300, 3, true));

    let (bad_outcome, _, _) = run_counting(VariantConfig::probe_device(), &bad);
    assert!(bad_outcome.is_err());

    let mut chart = TextChartRenderer::new(Vec::new());
    let outcome = Pipeline::new(VariantConfig::application_device(), NewtonRaphsonFitter::new())
        .with_summary(None)
        .run(&good, &mut chart)
        .unwrap();
    assert!(outcome.report().is_some());
}

#[test]
fn test_collinear_data_surfaces_solver_error() {
    let dir = TempDir::new().unwrap();
    // cruise_regular duplicates has_body_insurance
    let path = write_csv(
        &dir,
        "collinear.csv",
        "time_to_event,event_status,has_body_insurance,cruise_regular\n\
         1,1,1,1\n2,0,0,0\n3,1,1,1\n4,1,0,0\n5,1,1,1\n6,1,0,0\n",
    );

    let mut renderer = CountingRenderer::default();
    let err = Pipeline::new(VariantConfig::application_device(), NewtonRaphsonFitter::new())
        .with_summary(None)
        .run(&path, &mut renderer)
        .unwrap_err();

    match &err {
        HazardError::ModelFit(inner) => {
            assert!(inner.downcast_ref::<acceptance_hazards::SolverError>().is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("singular"));
    assert_eq!(renderer.renders, 0);
}
