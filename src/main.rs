use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use inkystat::cli::{Cli, Commands};
use inkystat::core::display::{self, Display, PreviewDisplay};
use inkystat::core::metrics::Reading;
use inkystat::core::Dashboard;
use inkystat::utils::{AppConfig, InkyColor};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;
    let dashboard = Dashboard::from_config(&config);

    match cli.resolved_command() {
        Commands::Refresh { force } => {
            dashboard.refresh(force, || display::detect(&config))?;
        }
        Commands::Show { json } => {
            handle_show(&dashboard, json)?;
        }
        Commands::Preview { output } => {
            let output = output.unwrap_or_else(|| config.preview_path());
            handle_preview(&dashboard, output, config.display.border)?;
        }
        Commands::Reset => {
            dashboard.store().clear().context("Failed to remove persisted state")?;
            println!("Persisted state cleared; the next run will redraw the display");
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
}

fn handle_show(dashboard: &Dashboard, json: bool) -> Result<()> {
    let readings = dashboard.collect();
    let snapshot = readings.snapshot();
    let decision = dashboard.decide(&snapshot);

    if json {
        let report = serde_json::json!({
            "snapshot": snapshot,
            "degraded": readings.degraded(),
            "needs_refresh": decision.needs_refresh(),
            "reason": decision.reason(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:<20} {:<10}", "Metric", "Value");
    println!("{}", "-".repeat(32));
    print_reading("SSH sessions", &readings.ssh_sessions, "");
    print_reading("Temperature", &readings.temperature, "°C");
    print_reading("OTG usage", &readings.usage_percent, "%");
    println!();

    if decision.needs_refresh() {
        println!("Refresh due: {}", decision.reason().yellow());
    } else {
        println!("Display is up to date");
    }

    Ok(())
}

fn print_reading(label: &str, reading: &Reading, unit: &str) {
    match reading {
        Reading::Measured(value) => {
            println!("{:<20} {}", label, format!("{}{}", value, unit).green());
        }
        Reading::Degraded(err) => {
            println!("{:<20} {} ({})", label, format!("0{}", unit).red(), err);
        }
    }
}

fn handle_preview(dashboard: &Dashboard, output: PathBuf, border: InkyColor) -> Result<()> {
    let snapshot = dashboard.collect().snapshot();
    let image = dashboard.render(&snapshot)?;

    let mut preview = PreviewDisplay::new(&output);
    preview.set_border(border);
    preview.set_image(&image)?;
    preview.show()?;

    info!("Rendered {} to {}", snapshot, output.display());
    Ok(())
}
