use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use thermsim::config::{Config, SimulationConfig};
use thermsim::controller::RegulationMode;
use thermsim::simulation::{self, sweep, RunSummary, SimulationOutput};
use thermsim::telemetry::init_tracing;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Simulate a flashlight driver's thermal stepdown loop",
    long_about = None
)]
struct Cli {
    /// TOML config file; THERMSIM__* environment variables override it
    #[arg(long, env = "THERMSIM_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format written to stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Random seed for sensor jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Disable sensor jitter entirely
    #[arg(long)]
    no_noise: bool,

    /// Regulate normally or calibrate the ceiling
    #[arg(long)]
    mode: Option<RegulationMode>,

    /// 1-based level the light starts at
    #[arg(long)]
    starting_level: Option<usize>,

    /// 1-based level the user asked for
    #[arg(long)]
    target_level: Option<usize>,

    /// Only print the run summary instead of every tick
    #[arg(long)]
    summary_only: bool,

    /// Run once per thermal mass and print one summary row each
    #[arg(long, value_delimiter = ',', value_name = "MASS,...")]
    sweep_thermal_mass: Vec<f64>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(cli.json_logs || cfg.logging.json);
    apply_overrides(&cli, &mut cfg.simulation);

    if !cli.sweep_thermal_mass.is_empty() {
        return run_sweep(&cli, &cfg.simulation);
    }

    let output = simulation::simulate(&cfg.simulation).context("simulation failed")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.summary_only {
        write_rows(&mut out, cli.format, &[output.summary()])?;
    } else {
        write_records(&mut out, cli.format, &output)?;
    }
    out.flush()?;
    Ok(())
}

fn apply_overrides(cli: &Cli, config: &mut SimulationConfig) {
    if let Some(seed) = cli.seed {
        config.random_seed = Some(seed);
    }
    if cli.no_noise {
        config.noise_amplitude = 0;
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(level) = cli.starting_level {
        config.starting_level = Some(level);
    }
    if let Some(level) = cli.target_level {
        config.target_level = Some(level);
    }
}

#[derive(Debug, Serialize)]
struct SweepRow {
    thermal_mass: f64,
    ticks: usize,
    peak_true_temp_c: f64,
    peak_sensor_temp_c: f64,
    stepdowns: usize,
    blocked_stepdowns: usize,
    stepups: usize,
    first_stepdown_s: Option<f64>,
    final_level: usize,
}

impl SweepRow {
    fn new(thermal_mass: f64, summary: RunSummary) -> Self {
        Self {
            thermal_mass,
            ticks: summary.ticks,
            peak_true_temp_c: summary.peak_true_temp_c,
            peak_sensor_temp_c: summary.peak_sensor_temp_c,
            stepdowns: summary.stepdowns,
            blocked_stepdowns: summary.blocked_stepdowns,
            stepups: summary.stepups,
            first_stepdown_s: summary.first_stepdown_s,
            final_level: summary.final_level,
        }
    }
}

fn run_sweep(cli: &Cli, base: &SimulationConfig) -> Result<()> {
    let configs = sweep::vary_thermal_mass(base, &cli.sweep_thermal_mass);
    info!(runs = configs.len(), "starting thermal mass sweep");

    let mut rows = Vec::with_capacity(configs.len());
    for (config, result) in configs.iter().zip(sweep::run_sweep(&configs)) {
        match result.outcome {
            Ok(output) => rows.push(SweepRow::new(config.thermal_mass, output.summary())),
            Err(err) => error!(
                thermal_mass = config.thermal_mass,
                error = %err,
                "sweep run failed"
            ),
        }
    }
    if rows.is_empty() {
        bail!("every sweep run failed");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_rows(&mut out, cli.format, &rows)?;
    out.flush()?;
    Ok(())
}

fn write_records<W: Write>(out: &mut W, format: OutputFormat, output: &SimulationOutput) -> Result<()> {
    write_rows(out, format, output.records())
}

fn write_rows<W: Write, T: Serialize>(out: &mut W, format: OutputFormat, rows: &[T]) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for row in rows {
                writer.serialize(row).context("failed to write CSV row")?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, rows).context("failed to write JSON")?;
            writeln!(out)?;
        }
    }
    Ok(())
}
