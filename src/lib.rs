//! # acceptance hazards
//!
//! cox proportional hazards for device acceptance - which situational
//! covariates (insurance, long drives, perishable cargo, regular cruising,
//! probe-camera scenario) speed acceptance up and which slow it down.
//!
//! ## what you get
//!
//! - csv loading that keeps only the covariates actually present and drops incomplete rows
//! - a swappable [`HazardFitter`] seam, plus a bundled newton-raphson solver
//! - coefficients turned into `% change in hazard`, ranked
//! - text + svg bar charts
//!
//! ## quick start
//!
//! ```rust
//! use acceptance_hazards::{
//!     loader::RawTable, NewtonRaphsonFitter, Pipeline, PipelineOutcome, TextChartRenderer,
//!     VariantConfig,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let csv = "time_to_event,event_status,has_body_insurance\n\
//!            2.0,1,1\n3.5,1,0\n1.2,1,1\n6.0,0,0\n4.4,1,1\n5.1,1,0\n";
//!
//! let pipeline = Pipeline::new(VariantConfig::application_device(), NewtonRaphsonFitter::new())
//!     .with_summary(None);
//! let mut chart = TextChartRenderer::new(Vec::new());
//!
//! match pipeline.run_table(RawTable::from_reader(csv.as_bytes())?, &mut chart)? {
//!     PipelineOutcome::Reported(report) => {
//!         for impact in &report.impacts {
//!             println!("{}: {:.1}%", impact.covariate, impact.hazard_change_pct);
//!         }
//!     }
//!     PipelineOutcome::NoRowsToModel => println!("nothing to model"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod fitter;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod solver;

pub use config::VariantConfig;
pub use data::SurvivalData;
pub use error::{HazardError, Result};
pub use fitter::{CoefficientRecord, CoefficientTable, HazardFitter};
pub use loader::ScenarioRule;
pub use pipeline::{Pipeline, PipelineOutcome, Report};
pub use render::{ChartRenderer, SvgChartRenderer, TextChartRenderer};
pub use report::{hazard_change_pct, ImpactRecord, SignTag};
pub use solver::{NewtonRaphsonFitter, SolverError};
