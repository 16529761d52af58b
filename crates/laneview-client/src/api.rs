//! Wire types for the remote simulation service.
//!
//! The service speaks JSON over three GET endpoints. Every response body
//! carries a `status` field; anything other than `"success"` means the
//! operation failed and `message` explains why.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use laneview_core::{AgentSnapshot, SimulationSettings};

use crate::ClientError;

/// `status` value marking a successful response.
pub const STATUS_SUCCESS: &str = "success";

/// Query parameters for `GET /api/init`.
///
/// Length fields are millimeters on the wire; [`InitRequest::from_settings`]
/// converts from the user-facing meters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitRequest {
    pub dt: f64,
    pub aggressive_pct: u32,
    pub defensive_pct: u32,
    pub agent_rate: u32,
    pub n_agents: u32,
    /// Millimeters.
    pub highway_length: f64,
    pub number_of_lanes: u32,
    /// Lane width in millimeters.
    pub size_of_lanes: f64,
    pub truck_ratio: f64,
    pub suv_ratio: f64,
    pub motorcycle_ratio: f64,
    pub is_logging_agents: bool,
    pub logging_dt: u32,
}

impl InitRequest {
    pub fn from_settings(settings: &SimulationSettings) -> Self {
        Self {
            dt: settings.dt,
            aggressive_pct: settings.aggressive_pct,
            defensive_pct: settings.defensive_pct,
            agent_rate: settings.agent_rate,
            n_agents: settings.n_agents,
            highway_length: settings.highway_length_m * 1000.0,
            number_of_lanes: settings.lane_count,
            size_of_lanes: settings.lane_width_m * 1000.0,
            truck_ratio: settings.vehicle_mix.truck_ratio,
            suv_ratio: settings.vehicle_mix.suv_ratio,
            motorcycle_ratio: settings.vehicle_mix.motorcycle_ratio,
            is_logging_agents: settings.log_agents,
            logging_dt: settings.log_interval,
        }
    }
}

/// Body of `GET /api/init`.
#[derive(Debug, Clone, Deserialize)]
pub struct InitResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub x_max: f64,
    #[serde(default)]
    pub y_max: f64,
    #[serde(default)]
    pub lane_count: u32,
    #[serde(default)]
    pub lane_width: f64,
    #[serde(default)]
    pub lane_centers: Vec<f64>,
}

/// Body of `GET /api/step`.
#[derive(Debug, Clone, Deserialize)]
pub struct StepResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub step: u64,
    #[serde(default)]
    pub agents: AgentSnapshot,
    #[serde(default, rename = "aggregateData")]
    pub aggregate_data: Vec<Map<String, Value>>,
}

/// Body of `GET /api/reset`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// The remote simulation contract.
///
/// The server is authoritative: one call to [`Self::step`] advances the
/// simulation exactly one tick and the client never computes physics.
/// Implementations must be cheap to call concurrently; the poll loop
/// pre-empts outstanding calls rather than serializing them.
#[async_trait]
pub trait SimulationClient: Send + Sync {
    async fn init(&self, request: &InitRequest) -> Result<InitResponse, ClientError>;
    async fn step(&self) -> Result<StepResponse, ClientError>;
    async fn reset(&self) -> Result<ResetResponse, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use laneview_core::DriveStrategy;

    #[test]
    fn init_request_converts_meters_to_millimeters() {
        let settings = SimulationSettings {
            highway_length_m: 100.0,
            lane_width_m: 3.657,
            ..SimulationSettings::default()
        };
        let request = InitRequest::from_settings(&settings);
        assert_eq!(request.highway_length, 100_000.0);
        assert_eq!(request.size_of_lanes, 3657.0);
        assert_eq!(request.number_of_lanes, settings.lane_count);
    }

    #[test]
    fn init_request_serializes_wire_field_names() {
        let request = InitRequest::from_settings(&SimulationSettings::default());
        let value = serde_json::to_value(&request).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "dt",
            "aggressive_pct",
            "defensive_pct",
            "agent_rate",
            "n_agents",
            "highway_length",
            "number_of_lanes",
            "size_of_lanes",
            "is_logging_agents",
            "logging_dt",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn step_response_decodes_success_payload() {
        let body = r#"{
            "status": "success",
            "step": 12,
            "agents": [
                {"id": 1, "x": 5000.0, "y": 1828.5, "driveStrategy": "brake"},
                {"id": 2, "x": 9000.0, "y": 5485.5}
            ],
            "aggregateData": [{"mean_speed": 27.1}]
        }"#;
        let response: StepResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.status, STATUS_SUCCESS);
        assert_eq!(response.step, 12);
        assert_eq!(response.agents.len(), 2);
        assert_eq!(response.agents[0].drive_strategy, DriveStrategy::Brake);
        assert_eq!(response.aggregate_data.len(), 1);
    }

    #[test]
    fn step_response_tolerates_error_payload_without_agents() {
        let body = r#"{"status": "error", "message": "No simulation initialized"}"#;
        let response: StepResponse = serde_json::from_str(body).unwrap();
        assert_ne!(response.status, STATUS_SUCCESS);
        assert!(response.agents.is_empty());
    }

    #[test]
    fn init_response_decodes_lane_metadata() {
        let body = r#"{
            "status": "success",
            "message": "Traffic simulation initialized",
            "x_max": 100000.0,
            "y_max": 14628.0,
            "lane_count": 4,
            "lane_width": 3657.0,
            "lane_centers": [12799.5, 1828.5, 5485.5, 9142.5]
        }"#;
        let response: InitResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.lane_count, 4);
        assert_eq!(response.lane_centers.len(), 4);
    }
}
