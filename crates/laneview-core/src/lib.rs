//! Core types shared across the laneview workspace.
//!
//! The simulation itself runs remotely; everything here models the client
//! side of that contract: the world geometry delivered at initialization,
//! per-step agent snapshots, user-facing settings, and the session state the
//! viewer mutates as responses arrive.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod viewport;

pub use viewport::{InputEvent, ViewConfig, ViewSnapshot, Viewport};

/// Rectangular extent of the simulation world, in millimeters.
///
/// World coordinates have their origin at the bottom-left corner with Y
/// growing upward. The extent is fixed for the lifetime of a simulation
/// session and replaced wholesale on re-initialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldExtent {
    pub max_x: f64,
    pub max_y: f64,
}

impl WorldExtent {
    pub fn new(max_x: f64, max_y: f64) -> Self {
        Self { max_x, max_y }
    }
}

impl Default for WorldExtent {
    fn default() -> Self {
        Self {
            max_x: 1000.0,
            max_y: 1000.0,
        }
    }
}

/// Lane metadata reported by the remote service at initialization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HighwayLayout {
    pub lane_count: u32,
    /// Lane width in millimeters.
    pub lane_width: f64,
    /// Y coordinate of each lane center, sorted ascending.
    pub lane_centers: Vec<f64>,
}

impl HighwayLayout {
    pub fn new(lane_count: u32, lane_width: f64, mut lane_centers: Vec<f64>) -> Self {
        lane_centers.sort_by(|a, b| a.total_cmp(b));
        Self {
            lane_count,
            lane_width,
            lane_centers,
        }
    }
}

/// Driving behavior an agent reported for the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveStrategy {
    Accelerate,
    #[default]
    Cruise,
    Brake,
    HardBrake,
    /// Strategies introduced server-side that this client does not know yet.
    #[serde(other)]
    Other,
}

/// One vehicle record from a step response.
///
/// Positions are world millimeters; `heading` is radians counterclockwise
/// from the +X axis. Geometry fields default to zero when the server omits
/// them (older step payloads only carried `id`, `x`, `y`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub heading: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub drive_strategy: DriveStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensing_radius: Option<f64>,
}

/// Agent records for one step, fully replaced on every successful poll.
pub type AgentSnapshot = Vec<Agent>;

/// Vehicle-type ratios submitted at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleMix {
    pub truck_ratio: f64,
    pub suv_ratio: f64,
    pub motorcycle_ratio: f64,
}

impl Default for VehicleMix {
    fn default() -> Self {
        Self {
            truck_ratio: 0.1,
            suv_ratio: 0.2,
            motorcycle_ratio: 0.1,
        }
    }
}

/// User-facing simulation configuration sent with the init request.
///
/// Lengths are user-facing meters here; the wire layer converts them to the
/// millimeters the service expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Simulation timestep in seconds.
    pub dt: f64,
    /// Percentage of aggressive drivers, 0..=100.
    pub aggressive_pct: u32,
    /// Percentage of defensive drivers, 0..=100.
    pub defensive_pct: u32,
    /// New agents spawned per step.
    pub agent_rate: u32,
    /// Target agent population.
    pub n_agents: u32,
    /// Highway length in meters.
    pub highway_length_m: f64,
    pub lane_count: u32,
    /// Lane width in meters.
    pub lane_width_m: f64,
    pub vehicle_mix: VehicleMix,
    pub log_agents: bool,
    /// Steps between agent log records when logging is enabled.
    pub log_interval: u32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            dt: 1.0,
            aggressive_pct: 30,
            defensive_pct: 30,
            agent_rate: 5,
            n_agents: 50,
            highway_length_m: 100.0,
            lane_count: 4,
            lane_width_m: 3.657,
            vehicle_mix: VehicleMix::default(),
            log_agents: true,
            log_interval: 10,
        }
    }
}

/// Rejection reasons for [`SimulationSettings::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("driver percentages must not exceed 100 combined, got {0}")]
    DriverMix(u32),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mix = self.aggressive_pct + self.defensive_pct;
        if mix > 100 {
            return Err(SettingsError::DriverMix(mix));
        }
        if self.dt <= 0.0 {
            return Err(SettingsError::NonPositive("dt"));
        }
        if self.highway_length_m <= 0.0 {
            return Err(SettingsError::NonPositive("highway length"));
        }
        if self.lane_count == 0 {
            return Err(SettingsError::NonPositive("lane count"));
        }
        if self.lane_width_m <= 0.0 {
            return Err(SettingsError::NonPositive("lane width"));
        }
        Ok(())
    }
}

/// Text shown in the viewer's status area.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusLine {
    pub text: String,
    /// True while the message describes a healthy, active session.
    pub active: bool,
}

/// Mutable per-session state shared between the poll loop and the renderer.
///
/// All mutation is last-write-wins; the poll loop guarantees stale step
/// responses never reach these methods.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub world: Option<WorldExtent>,
    pub highway: HighwayLayout,
    pub agents: AgentSnapshot,
    pub step: u64,
    pub agent_count: usize,
    pub aggregates: Vec<Map<String, Value>>,
    pub status: StatusLine,
    /// Set by a successful init; cleared by reset. Starting the poll loop is
    /// rejected while false.
    pub ready: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install world geometry from a successful init response.
    pub fn apply_init(&mut self, world: WorldExtent, highway: HighwayLayout, message: &str) {
        self.world = Some(world);
        self.highway = highway;
        self.agents.clear();
        self.step = 0;
        self.agent_count = 0;
        self.aggregates.clear();
        self.ready = true;
        self.set_status(format!("{message}. Click Start to begin."), true);
    }

    /// Replace the snapshot and counters from a successful step response.
    pub fn apply_step(
        &mut self,
        step: u64,
        agents: AgentSnapshot,
        aggregates: Vec<Map<String, Value>>,
    ) {
        self.step = step;
        self.agent_count = agents.len();
        self.agents = agents;
        self.aggregates = aggregates;
    }

    /// Clear everything a reset invalidates. The session must be
    /// re-initialized before stepping again.
    pub fn clear_for_reset(&mut self) {
        self.world = None;
        self.highway = HighwayLayout::default();
        self.agents.clear();
        self.step = 0;
        self.agent_count = 0;
        self.aggregates.clear();
        self.ready = false;
        self.set_status("Simulation reset. Initialize a new simulation.".to_owned(), false);
    }

    pub fn set_status(&mut self, text: String, active: bool) {
        self.status = StatusLine { text, active };
    }

    /// Flattened `| key: value` rendering of the aggregate maps, matching
    /// the status bar of the reference UI.
    pub fn aggregate_summary(&self) -> String {
        let mut out = String::new();
        for map in &self.aggregates {
            for (key, value) in map {
                out.push_str("| ");
                out.push_str(key);
                out.push_str(": ");
                out.push_str(&value.to_string());
                out.push(' ');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_centers_sorted_on_construction() {
        let highway = HighwayLayout::new(3, 3657.0, vec![9142.5, 1828.5, 5485.5]);
        assert_eq!(highway.lane_centers, vec![1828.5, 5485.5, 9142.5]);
    }

    #[test]
    fn drive_strategy_decodes_unknown_variants() {
        let known: DriveStrategy = serde_json::from_str("\"brake\"").unwrap();
        assert_eq!(known, DriveStrategy::Brake);
        let unknown: DriveStrategy = serde_json::from_str("\"swerve\"").unwrap();
        assert_eq!(unknown, DriveStrategy::Other);
    }

    #[test]
    fn agent_decodes_minimal_payload() {
        let agent: Agent = serde_json::from_str(r#"{"id": 7, "x": 120.5, "y": 1828.5}"#).unwrap();
        assert_eq!(agent.id, 7);
        assert_eq!(agent.heading, 0.0);
        assert_eq!(agent.drive_strategy, DriveStrategy::Cruise);
        assert_eq!(agent.sensing_radius, None);
    }

    #[test]
    fn agent_decodes_full_payload() {
        let agent: Agent = serde_json::from_str(
            r#"{"id": 1, "x": 0.0, "y": 0.0, "heading": 1.5707,
                "length": 4500.0, "width": 1800.0,
                "driveStrategy": "accelerate", "sensingRadius": 30000.0}"#,
        )
        .unwrap();
        assert_eq!(agent.drive_strategy, DriveStrategy::Accelerate);
        assert_eq!(agent.sensing_radius, Some(30000.0));
    }

    #[test]
    fn settings_validation_rejects_bad_mix() {
        let mut settings = SimulationSettings::default();
        settings.aggressive_pct = 70;
        settings.defensive_pct = 40;
        assert_eq!(settings.validate(), Err(SettingsError::DriverMix(110)));
    }

    #[test]
    fn settings_validation_accepts_defaults() {
        assert!(SimulationSettings::default().validate().is_ok());
    }

    #[test]
    fn apply_init_resets_counters_and_marks_ready() {
        let mut session = SessionState::new();
        session.step = 42;
        session.agent_count = 9;
        session.apply_init(
            WorldExtent::new(100_000.0, 14_628.0),
            HighwayLayout::new(4, 3657.0, vec![]),
            "Traffic simulation initialized",
        );
        assert!(session.ready);
        assert_eq!(session.step, 0);
        assert_eq!(session.agent_count, 0);
        assert!(session.status.active);
        assert!(session.status.text.contains("Click Start"));
    }

    #[test]
    fn clear_for_reset_requires_reinit() {
        let mut session = SessionState::new();
        session.apply_init(WorldExtent::default(), HighwayLayout::default(), "ok");
        session.apply_step(5, vec![], vec![]);
        session.clear_for_reset();
        assert!(!session.ready);
        assert!(session.world.is_none());
        assert_eq!(session.step, 0);
        assert!(session.agents.is_empty());
    }

    #[test]
    fn aggregate_summary_flattens_maps() {
        let mut session = SessionState::new();
        let mut map = Map::new();
        map.insert("mean_speed".to_owned(), Value::from(27.5));
        session.aggregates.push(map);
        assert_eq!(session.aggregate_summary(), "| mean_speed: 27.5 ");
    }
}
