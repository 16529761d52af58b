//! Client side of the remote simulation service.
//!
//! [`SimulationClient`] abstracts the three-endpoint HTTP contract
//! (`/api/init`, `/api/step`, `/api/reset`); [`HttpSimulationClient`] is the
//! production implementation and [`PollLoop`] drives the step endpoint on a
//! fixed interval with cancellation and staleness handling.

use thiserror::Error;

pub mod api;
pub mod http;
pub mod poll;

pub use api::{InitRequest, InitResponse, ResetResponse, SimulationClient, StepResponse};
pub use http::HttpSimulationClient;
pub use poll::{PollError, PollLoop, PollLoopConfig, PollStatus, RedrawRequest, RunState, SharedSession};

/// Failures talking to the remote service.
///
/// Transport covers connection and decoding problems; `Api` carries the
/// `message` of a response whose `status` was not `"success"`. Both are
/// terminal for a running poll loop.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Api { message: String },
}
