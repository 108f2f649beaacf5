//! MiniLab GW - stateful MIDI gateway
//!
//! Routes a performance keyboard and an Arturia MiniLab pad/knob surface
//! into a DAW through a virtual MIDI port, with velocity remapping, note
//! toggling, cancellable parameter sweeps, and LED/knob feedback.

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, trace, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;
mod controller;
mod feedback;
mod ids;
mod midi;
mod ports;
mod sweep;

use crate::config::AppConfig;
use crate::controller::{KeysController, Outbound, SurfaceController};
use crate::ports::OutputHandle;
use crate::sweep::SweepRegistry;

/// MiniLab Gateway - route a keyboard and pad/knob surface into a DAW
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Enable bass mode without prompting
    #[arg(long)]
    bass_mode: bool,

    /// Skip the interactive bass-mode prompt (bass mode stays off unless
    /// --bass-mode is also given)
    #[arg(long)]
    no_prompt: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    if args.list_ports {
        ports::print_ports()?;
        return Ok(());
    }

    info!("Starting MiniLab GW...");
    info!("Configuration file: {}", args.config);

    let config = AppConfig::load(&args.config).await?;

    let bass_mode = if args.bass_mode {
        true
    } else if args.no_prompt {
        false
    } else {
        cli::prompt_bass_mode()?
    };

    run_app(config, bass_mode, shutdown_signal()).await?;

    info!("MiniLab GW shutdown complete");
    Ok(())
}

async fn run_app(
    config: AppConfig,
    bass_mode: bool,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    // Outputs: the virtual DAW port and the surface's own feedback side.
    let synth_out = ports::open_output("minilab-gw-synth", &config.synth.output_port)?;
    let surface_fb = ports::open_output("minilab-gw-feedback", &config.surface.feedback_port)?;

    // Inbound: one channel per controller so each device's messages stay in
    // arrival order.
    let (keys_tx, mut keys_rx) = mpsc::unbounded_channel();
    let (surface_tx, mut surface_rx) = mpsc::unbounded_channel();
    let _keys_conn = ports::open_input("minilab-gw-keys", &config.keys.input_port, keys_tx)?;
    let _surface_conn =
        ports::open_input("minilab-gw-surface", &config.surface.input_port, surface_tx)?;

    // Shared sweep registry, injected into the surface controller and every
    // sweep it spawns.
    let registry = SweepRegistry::new();
    let (sweep_tx, mut sweep_rx) = mpsc::unbounded_channel();

    let mut keys = KeysController::new(config.keys.clone(), bass_mode);
    let mut surface = SurfaceController::new(
        config.surface.clone(),
        config.sweep.clone(),
        registry,
        sweep_tx,
    );

    // Bring the surface's LEDs and knob displays in line with our state.
    for out in surface.init_sync() {
        route(&out, &synth_out, &surface_fb);
    }

    info!(
        "Gateway running (bass mode {})",
        if bass_mode { "on" } else { "off" }
    );

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            Some(msg) = keys_rx.recv() => {
                trace!("[keys] {}", msg);
                for out in keys.handle(&msg) {
                    route(&out, &synth_out, &surface_fb);
                }
            }
            Some(msg) = surface_rx.recv() => {
                trace!("[surface] {}", msg);
                for out in surface.handle(&msg) {
                    route(&out, &synth_out, &surface_fb);
                }
            }
            Some(out) = sweep_rx.recv() => {
                route(&out, &synth_out, &surface_fb);
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    Ok(())
}

/// Send one outbound message to its port. Send failures are reported and
/// survived; a wedged port should not take the gateway down.
fn route(out: &Outbound, synth: &OutputHandle, feedback: &OutputHandle) {
    let result = match out {
        Outbound::Synth(msg) => synth.send(&msg.encode()),
        Outbound::Feedback(bytes) => feedback.send(bytes),
    };
    if let Err(e) = result {
        warn!("MIDI send failed: {:#}", e);
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
