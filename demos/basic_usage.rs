use acceptance_hazards::{
    loader::{prepare, RawTable},
    report::{format_pct, impact_chart, report},
    render::ChartRenderer,
    HazardFitter, NewtonRaphsonFitter, TextChartRenderer, VariantConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Device Acceptance Hazards - Basic Usage Example");
    println!("===============================================\n");

    // 400 drivers, acceptance faster with insurance and perishable cargo,
    // slower after long continuous drives
    let mut rng = StdRng::seed_from_u64(2024);
    let mut csv = String::from(
        "time_to_event,event_status,has_body_insurance,drive_continue_over_10,cargo_perishable,cruise_regular\n",
    );
    for _ in 0..400 {
        let x: Vec<u8> = (0..4).map(|_| rng.gen_range(0..=1)).collect();
        let linear_pred = 0.4 * f64::from(x[0]) - 0.5 * f64::from(x[1]) + 0.8 * f64::from(x[2]);
        let time = -rng.gen::<f64>().ln() / (0.05 * linear_pred.exp());
        let censoring_time = rng.gen_range(10.0..60.0);
        let (t, e) = if time < censoring_time { (time, 1) } else { (censoring_time, 0) };
        writeln!(csv, "{t:.3},{e},{},{},{},{}", x[0], x[1], x[2], x[3])?;
    }

    let config = VariantConfig::application_device();
    let table = RawTable::from_reader(csv.as_bytes())?;
    let loaded = prepare(table, &config.candidate_covariates, None)?;

    println!("Dataset Information:");
    println!("  - rows:       {}", loaded.data().n_samples());
    println!("  - events:     {}", loaded.data().n_events("event_status"));
    println!("  - covariates: {}", loaded.covariates().join(", "));
    println!();

    // Step 1: fit
    println!("Step 1: Cox Regression (Newton-Raphson, Breslow ties)");
    println!("-----------------------------------------------------");

    let fitter = NewtonRaphsonFitter::new().with_confidence_level(0.90);
    let coefficients = fitter.fit(loaded.data(), "time_to_event", "event_status")?;
    println!("{coefficients:.3}");

    for record in coefficients.records() {
        println!(
            "  {:<24} HR = {:.3}  z = {:>6.2}",
            record.covariate,
            record.hazard_ratio(),
            record.z()
        );
    }
    println!();

    // Step 2: rank
    println!("Step 2: Ranked Hazard Changes");
    println!("-----------------------------");

    let impacts = report(&coefficients);
    for impact in &impacts {
        println!(
            "  {:<24} {:>8}  ({})",
            impact.covariate,
            format_pct(impact.hazard_change_pct),
            impact.sign.describe()
        );
    }
    println!();

    // Step 3: chart
    println!("Step 3: Chart");
    println!("-------------\n");

    let mut renderer = TextChartRenderer::new(std::io::stdout()).with_half_width(25);
    renderer.render(&impact_chart(&impacts, &config.labels))?;

    Ok(())
}
