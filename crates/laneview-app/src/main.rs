use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use laneview_app::{make_redraw, LogRenderSink, RenderSink, SharedViewport};
use laneview_client::{
    HttpSimulationClient, PollLoop, PollLoopConfig, SharedSession, SimulationClient,
};
use laneview_core::{
    InputEvent, SessionState, SimulationSettings, VehicleMix, ViewConfig, Viewport, WorldExtent,
};

/// Viewer/controller for a remotely executed traffic simulation.
#[derive(Debug, Parser)]
#[command(name = "laneview", version, about)]
struct Args {
    /// Base URL of the simulation service.
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Poll interval between step requests, in milliseconds.
    #[arg(long, default_value_t = 50)]
    poll_interval_ms: u64,

    /// Viewport width in pixels.
    #[arg(long, default_value_t = 800.0)]
    width: f64,

    /// Viewport height in pixels.
    #[arg(long, default_value_t = 600.0)]
    height: f64,

    /// Stop automatically after this many seconds (runs until Ctrl-C when
    /// omitted).
    #[arg(long)]
    run_for: Option<u64>,

    /// Simulation timestep in seconds.
    #[arg(long, default_value_t = 1.0)]
    dt: f64,

    /// Percentage of aggressive drivers.
    #[arg(long, default_value_t = 30)]
    aggressive_pct: u32,

    /// Percentage of defensive drivers.
    #[arg(long, default_value_t = 30)]
    defensive_pct: u32,

    /// New agents spawned per step.
    #[arg(long, default_value_t = 5)]
    agent_rate: u32,

    /// Target agent population.
    #[arg(long, default_value_t = 50)]
    agents: u32,

    /// Highway length in meters.
    #[arg(long, default_value_t = 100.0)]
    highway_length: f64,

    /// Number of lanes.
    #[arg(long, default_value_t = 4)]
    lanes: u32,

    /// Lane width in meters.
    #[arg(long, default_value_t = 3.657)]
    lane_width: f64,

    /// Disable server-side agent logging.
    #[arg(long)]
    no_agent_log: bool,

    /// Steps between agent log records.
    #[arg(long, default_value_t = 10)]
    log_interval: u32,
}

impl Args {
    fn settings(&self) -> SimulationSettings {
        SimulationSettings {
            dt: self.dt,
            aggressive_pct: self.aggressive_pct,
            defensive_pct: self.defensive_pct,
            agent_rate: self.agent_rate,
            n_agents: self.agents,
            highway_length_m: self.highway_length,
            lane_count: self.lanes,
            lane_width_m: self.lane_width,
            vehicle_mix: VehicleMix::default(),
            log_agents: !self.no_agent_log,
            log_interval: self.log_interval,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = args.settings();
    settings.validate().context("invalid simulation settings")?;

    let client: Arc<dyn SimulationClient> = Arc::new(HttpSimulationClient::new(&args.server));
    let session: SharedSession = Arc::new(Mutex::new(SessionState::new()));
    let viewport: SharedViewport = Arc::new(Mutex::new(Viewport::new(
        ViewConfig::default(),
        WorldExtent::default(),
    )));
    lock_viewport(&viewport).handle_input(InputEvent::Resize {
        width: args.width,
        height: args.height,
    });

    let sink: Arc<dyn RenderSink> = Arc::new(LogRenderSink);
    let redraw = make_redraw(&viewport, &session, sink);
    let poll = PollLoop::new(
        Arc::clone(&client),
        Arc::clone(&session),
        redraw,
        PollLoopConfig {
            poll_interval: Duration::from_millis(args.poll_interval_ms),
        },
    );

    info!(server = %args.server, "initializing simulation");
    poll.initialize(&settings)
        .await
        .context("simulation init failed")?;

    // The init response replaced the world extent; recenter the view on it.
    if let Some(world) = lock_session(&session).world {
        lock_viewport(&viewport).set_world(world);
    }

    poll.start().context("failed to start poll loop")?;

    match args.run_for {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
        }
    }

    poll.stop();
    let session = lock_session(&session);
    info!(
        step = session.step,
        agents = session.agent_count,
        status = %session.status.text,
        "session finished",
    );
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn lock_session(session: &SharedSession) -> std::sync::MutexGuard<'_, SessionState> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lock_viewport(viewport: &SharedViewport) -> std::sync::MutexGuard<'_, Viewport> {
    viewport.lock().unwrap_or_else(PoisonError::into_inner)
}
