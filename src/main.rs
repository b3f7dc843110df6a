use beacon_positioning::api::{LogReporter, PositionEstimator, Ticker};
use beacon_positioning::core::BeaconRegistry;
use beacon_positioning::transport::UpdateListener;
use beacon_positioning::utils::config::EngineConfig;
use beacon_positioning::utils::logging::{init_logging, session_log_path, LogFormat};
use beacon_positioning::{OutputFormat, StartupError};
use chrono::Local;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Directory for `--logging` session files
const LOG_DIR: &str = "./logs";

/// Beacon positioning server
#[derive(Parser, Debug)]
#[command(name = "beacon-server", version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Beacon table (`beacon_id,pos_x,pos_y`) [default: beacon-config.csv]
    #[arg(long)]
    beacons: Option<PathBuf>,

    /// Address for distance updates [default: 127.0.0.1:8765]
    #[arg(long)]
    listen: Option<String>,

    /// Milliseconds between position computations [default: 5000]
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Print estimates and errors as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Also write the log to ./logs
    #[arg(short, long)]
    logging: bool,

    /// Only print errors
    #[arg(short, long)]
    mute: bool,
}

impl Cli {
    fn engine_config(&self) -> Result<EngineConfig, StartupError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };

        if let Some(beacons) = &self.beacons {
            config.beacons_path = beacons.clone();
        }
        if let Some(listen) = &self.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.tick_interval_ms = interval_ms;
        }
        if self.json {
            config.output = OutputFormat::Json;
            config.logging.format = LogFormat::Compact;
        }

        config.logging = config.logging.with_switches(self.debug, self.mute);
        if self.logging {
            let path = session_log_path(Path::new(LOG_DIR), self.debug, &Local::now());
            config.logging.file = Some(path);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let started = Instant::now();
    let cli = Cli::parse();

    let config = match cli.engine_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("ERROR: cannot open log file: {e}");
        return ExitCode::FAILURE;
    }

    match run(config, started).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: EngineConfig, started: Instant) -> Result<(), StartupError> {
    let registry = BeaconRegistry::from_csv_path(&config.beacons_path)?;
    info!(
        beacons = registry.count(),
        path = %config.beacons_path.display(),
        "Beacon table loaded in {} ms",
        started.elapsed().as_millis()
    );

    let estimator = Arc::new(
        PositionEstimator::new(registry, LogReporter::new(config.output))
            .with_solver_config(&config.solver),
    );

    let listener = UpdateListener::bind(&config.listen_addr).await?;
    let (stop_listener, listener_stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(listener.serve(Arc::clone(&estimator), async move {
        let _ = listener_stopped.await;
    }));

    let mut ticker = Ticker::new(config.tick_interval());
    info!(interval_ms = config.tick_interval_ms, "Positioning engine running");
    estimator.run_until(&mut ticker, shutdown_signal()).await;

    let _ = stop_listener.send(());
    if let Err(e) = server.await {
        warn!(error = %e, "update listener ended abnormally");
    }
    info!("Server stopped after {:.1} s", started.elapsed().as_secs_f64());
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, shutting down"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
