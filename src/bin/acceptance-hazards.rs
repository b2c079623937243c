use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use acceptance_hazards::{
    config::DEFAULT_DATA_PATH,
    render::RenderSet,
    NewtonRaphsonFitter, Pipeline, PipelineOutcome, SvgChartRenderer, TextChartRenderer,
    VariantConfig,
};
use clap::{Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// rank situational covariates by their effect on device acceptance hazard
#[derive(Parser, Debug)]
#[command(name = "acceptance-hazards", version, about)]
struct Cli {
    #[command(subcommand)]
    variant: Variant,

    /// also write the chart as an svg file
    #[arg(long, global = true, value_name = "FILE")]
    svg: Option<PathBuf>,

    /// print ranked impacts as json instead of the text chart
    #[arg(long, global = true)]
    json: bool,

    /// debug-level logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Variant {
    /// application-device acceptance
    Application {
        /// csv with time_to_event, event_status and covariate columns
        #[arg(default_value = DEFAULT_DATA_PATH)]
        path: PathBuf,
    },
    /// probe-device acceptance (adds the probe_camera scenario flag)
    Probe {
        #[arg(default_value = DEFAULT_DATA_PATH)]
        path: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("acceptance_hazards={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (config, path) = match cli.variant {
        Variant::Application { path } => (VariantConfig::application_device(), path),
        Variant::Probe { path } => (VariantConfig::probe_device(), path),
    };

    let mut renderers = RenderSet::new();
    if !cli.json {
        renderers.push(TextChartRenderer::new(std::io::stdout()));
    }
    if let Some(svg) = &cli.svg {
        renderers.push(SvgChartRenderer::new(svg));
    }

    let summary = if cli.json { None } else { Some(4) };
    let pipeline = Pipeline::new(config, NewtonRaphsonFitter::new()).with_summary(summary);

    match pipeline.run(&path, &mut renderers) {
        Ok(PipelineOutcome::Reported(report)) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        error!(error = %e, "couldn't serialize report");
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Ok(PipelineOutcome::NoRowsToModel) => {
            warn!(path = %path.display(), "no complete rows - no model fit");
            ExitCode::SUCCESS
        }
        // bad input halts this variant only - reported, not fatal
        Err(e) if e.is_validation() => {
            error!(path = %path.display(), "{e}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(path = %path.display(), "{e}");
            ExitCode::FAILURE
        }
    }
}
