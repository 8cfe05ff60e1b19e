use anyhow::{Context, Result};
use clap::Parser;
use perfdelta::check::{render_reports, ChangeReport, ChangeSummary, CheckConfig, Checker};
use perfdelta::cli::{Cli, Command, OutputFormat};
use perfdelta::profile::{Configuration, Profile, ProfileDocument};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

#[derive(Serialize)]
struct DiffOutput<'a> {
    configuration: &'a Configuration,
    summary: ChangeSummary,
    reports: &'a [ChangeReport],
}

fn load_config(path: Option<&Path>) -> Result<CheckConfig> {
    match path {
        Some(path) => CheckConfig::from_toml_file(path),
        None => CheckConfig::default_strategies().context("Invalid built-in strategies"),
    }
}

fn run_diff(
    baseline: &Path,
    target: &Path,
    config: Option<&Path>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let baseline = Profile::from_json_file(baseline)?;
    let target = Profile::from_json_file(target)?;

    if baseline.configuration != target.configuration {
        anyhow::bail!(
            "Profiles are not comparable: '{}' vs '{}'",
            baseline.configuration,
            target.configuration
        );
    }

    let reports = Checker::new(config).check_profile_pair(&baseline, &target)?;
    let summary = ChangeSummary::from_reports(&reports);

    match format {
        OutputFormat::Json => {
            let output = DiffOutput {
                configuration: &target.configuration,
                summary,
                reports: &reports,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("{}", target.configuration);
            print!("{}", render_reports(&reports, verbose));
            println!("Summary: {}", summary);
        }
    }
    Ok(())
}

fn run_fit(profile: &Path, output: Option<&PathBuf>) -> Result<()> {
    let mut document = ProfileDocument::from_json_file(profile)?;
    let stored = document.attach_fitted_models();
    tracing::info!("Fitted {} models for {}", stored, profile.display());

    let json = serde_json::to_string_pretty(&document)?;
    match output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("Failed to write profile: {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    match args.command {
        Command::Diff {
            baseline,
            target,
            config,
            format,
            verbose,
        } => run_diff(&baseline, &target, config.as_deref(), format, verbose),
        Command::Fit { profile, output } => run_fit(&profile, output.as_ref()),
    }
}
