//! GatiBridge daemon
//!
//! Listens for goal messages from the planning host and streams planned
//! velocities to the motor controller over serial. If the networked session
//! fails, one configured goal is delivered on the fallback port.

use gati_bridge::config::BridgeConfig;
use gati_bridge::error::{Error, Result};
use gati_bridge::{CubicTrajectory, RunMode, SerialTransport, Supervisor, TcpHostServer, Transport};
use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const DEFAULT_CONFIG_PATH: &str = "gati.toml";

/// Command line options
struct Args {
    config_path: Option<String>,
    local_only: bool,
}

/// Parse command line arguments.
///
/// Supports:
/// - `gati-bridge <path>` (positional)
/// - `gati-bridge --config <path>` / `-c <path>`
/// - `--local` to run only the local fallback goal
fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args {
        config_path: None,
        local_only: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" if i + 1 < args.len() => {
                parsed.config_path = Some(args[i + 1].clone());
                i += 1;
            }
            "--local" => parsed.local_only = true,
            arg if !arg.starts_with('-') && parsed.config_path.is_none() => {
                parsed.config_path = Some(arg.to_string());
            }
            arg => eprintln!("Ignoring unknown argument: {}", arg),
        }
        i += 1;
    }
    parsed
}

fn load_config(path: Option<&str>) -> Result<(BridgeConfig, String)> {
    match path {
        Some(p) => Ok((BridgeConfig::load(p)?, p.to_string())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Ok((
            BridgeConfig::load(DEFAULT_CONFIG_PATH)?,
            DEFAULT_CONFIG_PATH.to_string(),
        )),
        None => Ok((BridgeConfig::default(), "built-in defaults".to_string())),
    }
}

fn run(args: Args, config: BridgeConfig) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let baud_rate = config.peripheral.baud_rate;
    let open_serial = move |port: &str| -> Result<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::open(port, baud_rate)?))
    };

    let generator = CubicTrajectory::new();
    let supervisor = Supervisor::new(config, &generator, running);

    if args.local_only {
        return supervisor.run_local(open_serial);
    }

    let mode = supervisor.run(open_serial, |config| {
        TcpHostServer::bind(
            config.network.bind_address.as_str(),
            &config.network.ack_token,
            config.network.read_timeout(),
        )
    })?;

    match mode {
        RunMode::Networked => log::info!("Networked session finished"),
        RunMode::Fallback => log::warn!("Finished in local fallback mode"),
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = parse_args();

    let (config, source) = match load_config(args.config_path.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("GatiBridge v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", source);
    log::info!(
        "Peripheral: {} (fallback {}), host listener: {}",
        config.peripheral.port,
        config.peripheral.fallback_port,
        config.network.bind_address
    );

    match run(args, config) {
        Ok(()) => {
            log::info!("Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("GatiBridge stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
