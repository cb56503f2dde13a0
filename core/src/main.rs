//! INERTIAL: command line host for the IMU propagation engine.
//!
//! - `calibrate`: estimate IMU noise densities from a stationary CSV recording and store them as a
//!   propagation configuration (TOML/JSON/YAML).
//! - `propagate`: load an IMU CSV log, propagate a level, stationary start state over a time
//!   window and print the resulting state and covariance diagonal.
//! - `simulate`: write a synthetic IMU log with a chosen noise model.
//!
//! The IMU CSV format has a header line and the columns
//! `time, gyro_x, gyro_y, gyro_z, accel_x, accel_y, accel_z` (s, rad/s, m/s²).

use std::error::Error;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use nalgebra::Vector3;

use inertial::config::PropagatorConfig;
use inertial::equations::{
    self, ACCEL_BIAS, GYRO_BIAS, ORIENTATION, POSITION, STATE_SIZE, StateMatrix, StateVector,
    VELOCITY,
};
use inertial::estimation::{ImuParameterEstimation, axis_deviations};
use inertial::sim::{ImuRecord, SyntheticImu};
use inertial::{ImuDatabase, ImuPropagator, ImuSample, NoiseParameters};

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "IMU noise calibration and inertial state propagation.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        about = "Estimate IMU noise parameters from a stationary recording",
        long_about = "Run an Allan-variance chunk search on every gyroscope and accelerometer axis of a stationary IMU recording and derive the continuous-time white noise and bias random walk densities. The result is written as a propagation configuration file, or printed as YAML when no output path is given."
    )]
    Calibrate(CalibrateArgs),
    #[command(about = "Propagate state and covariance over an IMU log")]
    Propagate(PropagateArgs),
    #[command(about = "Write a synthetic IMU log")]
    Simulate(SimulateArgs),
}

#[derive(Args, Clone, Debug)]
struct CalibrateArgs {
    /// Input IMU CSV file
    #[arg(short, long)]
    input: PathBuf,
    /// Largest chunk size examined by the Allan-variance search
    #[arg(long, default_value_t = inertial::config::DEFAULT_MAX_CHUNK_SIZE)]
    max_chunk_size: usize,
    /// Output configuration file (.toml, .json, .yaml)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
struct PropagateArgs {
    /// Input IMU CSV file
    #[arg(short, long)]
    input: PathBuf,
    /// Propagation configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Start of the propagation window (s)
    #[arg(long)]
    start: f64,
    /// End of the propagation window (s)
    #[arg(long)]
    end: f64,
}

#[derive(Args, Clone, Debug)]
struct SimulateArgs {
    /// Output IMU CSV file
    #[arg(short, long)]
    output: PathBuf,
    /// Number of samples to generate
    #[arg(long, default_value_t = 10_000)]
    samples: usize,
    /// Sample rate (Hz)
    #[arg(long, default_value_t = 100.0)]
    rate: f64,
    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Take the noise model from this configuration file instead of the flags below
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Gyroscope white noise density (rad/s/√Hz)
    #[arg(long, default_value_t = 1e-3)]
    gyro_white: f64,
    /// Gyroscope bias random walk (rad/s²/√Hz)
    #[arg(long, default_value_t = 1e-5)]
    gyro_bias: f64,
    /// Accelerometer white noise density (m/s²/√Hz)
    #[arg(long, default_value_t = 1e-2)]
    accel_white: f64,
    /// Accelerometer bias random walk (m/s³/√Hz)
    #[arg(long, default_value_t = 1e-4)]
    accel_bias: f64,
}

/// Initialize the logger with the specified configuration
///
/// # Arguments
/// * `log_level` - Log level string (off, error, warn, info, debug, trace)
/// * `log_file` - Optional path to log file. If None, logs to stderr
fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{log_level}', defaulting to 'info'");
        log::LevelFilter::Info
    });
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });
    if let Some(path) = log_file {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init()?;
    Ok(())
}

fn load_samples(path: &Path) -> anyhow::Result<Vec<ImuSample>> {
    let records = ImuRecord::from_csv(path)
        .with_context(|| format!("failed to read IMU log {}", path.display()))?;
    if records.is_empty() {
        bail!("IMU log {} contains no samples", path.display());
    }
    info!("Loaded {} IMU samples from {}", records.len(), path.display());
    Ok(records.into_iter().map(ImuSample::from).collect())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PropagatorConfig> {
    match path {
        Some(path) => PropagatorConfig::from_file(path)
            .with_context(|| format!("failed to read configuration {}", path.display())),
        None => Ok(PropagatorConfig::default()),
    }
}

fn calibrate(args: &CalibrateArgs) -> anyhow::Result<()> {
    let samples = load_samples(&args.input)?;
    let (gyro_spread, accel_spread) = axis_deviations(&samples);
    info!(
        "Raw deviations: gyro [{:e}, {:e}, {:e}] accel [{:e}, {:e}, {:e}]",
        gyro_spread[0],
        gyro_spread[1],
        gyro_spread[2],
        accel_spread[0],
        accel_spread[1],
        accel_spread[2]
    );
    let noise = ImuParameterEstimation::new(args.max_chunk_size)?.estimate(&samples)?;
    let config = PropagatorConfig {
        noise,
        max_chunk_size: args.max_chunk_size,
        ..Default::default()
    };
    match &args.output {
        Some(path) => {
            config
                .to_file(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Calibration written to {}", path.display());
        }
        None => print!("{}", serde_yaml::to_string(&config)?),
    }
    Ok(())
}

fn propagate(args: &PropagateArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_ref())?;
    config.validate()?;
    let samples = load_samples(&args.input)?;
    if samples.len() > config.database_capacity {
        warn!(
            "IMU log holds {} samples but the database keeps {}; older samples are dropped",
            samples.len(),
            config.database_capacity
        );
    }
    let mut database = ImuDatabase::new(config.database_capacity)?;
    for sample in samples {
        database.add_imu_sample(sample)?;
    }

    let mut propagator = ImuPropagator::from_config(&config)?;
    let state = propagator.propagate(
        args.start,
        &StateVector::zeros(),
        &StateMatrix::zeros(),
        &database,
        args.end,
    )?;
    let orientation = equations::orientation(&state)?;
    let (roll, pitch, yaw) = orientation.euler_angles();

    println!(
        "t = {:.6} s",
        propagator.last_timestamp().unwrap_or(args.end)
    );
    println!(
        "attitude (deg): roll {:.4} pitch {:.4} yaw {:.4}",
        roll.to_degrees(),
        pitch.to_degrees(),
        yaw.to_degrees()
    );
    for (name, start) in [
        ("orientation", ORIENTATION),
        ("gyro bias", GYRO_BIAS),
        ("velocity", VELOCITY),
        ("accel bias", ACCEL_BIAS),
        ("position", POSITION),
    ] {
        let block = equations::block(&state, start);
        let sigma = Vector3::from_fn(|i, _| propagator.covariance()[(start + i, start + i)].sqrt());
        println!(
            "{name:>12}: [{:+.6e}, {:+.6e}, {:+.6e}]  σ [{:.3e}, {:.3e}, {:.3e}]",
            block[0], block[1], block[2], sigma[0], sigma[1], sigma[2]
        );
    }
    let diagonal: Vec<String> = (0..STATE_SIZE)
        .map(|i| format!("{:.6e}", propagator.covariance()[(i, i)]))
        .collect();
    println!("covariance diagonal: {}", diagonal.join(", "));
    Ok(())
}

fn simulate(args: &SimulateArgs) -> anyhow::Result<()> {
    let noise = match &args.config {
        Some(path) => load_config(Some(path))?.noise,
        None => NoiseParameters::isotropic(
            args.gyro_white,
            args.gyro_bias,
            args.accel_white,
            args.accel_bias,
        ),
    };
    let generator = SyntheticImu {
        rate_hz: args.rate,
        noise,
        seed: args.seed,
        ..Default::default()
    };
    let samples = generator.generate(args.samples)?;
    let records: Vec<ImuRecord> = samples.into_iter().map(ImuRecord::from).collect();
    ImuRecord::to_csv(&records, &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!(
        "Wrote {} synthetic samples at {} Hz to {}",
        records.len(),
        args.rate,
        args.output.display()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_file.as_ref())
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    match &cli.command {
        Command::Calibrate(args) => calibrate(args),
        Command::Propagate(args) => propagate(args),
        Command::Simulate(args) => simulate(args),
    }
}
