//! Run-scoped step polling with cancellation and staleness handling.
//!
//! While running, a ticker fires every poll interval and issues one step
//! request, pre-empting whatever request is still outstanding. Cancellation
//! is advisory (the transport is asked to give up), so every response is
//! additionally checked against the run epoch and the running state before
//! it may touch the session. A failed step halts the run; the user must
//! re-initialize and restart.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use laneview_core::{HighwayLayout, SessionState, SimulationSettings, WorldExtent};

use crate::api::{InitRequest, SimulationClient, StepResponse, STATUS_SUCCESS};
use crate::ClientError;

/// Session state shared between the poll loop, the host shell, and render
/// sinks.
pub type SharedSession = Arc<Mutex<SessionState>>;

/// Callback asking the host to redraw after a state mutation.
pub type RedrawRequest = Arc<dyn Fn() + Send + Sync>;

/// Rejected control-surface operations.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("simulation must be initialized before it can run")]
    NotInitialized,
    #[error("simulation is already running")]
    AlreadyRunning,
    #[error("operation requires the simulation to be stopped")]
    NotStopped,
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Poll-loop run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

/// Timing knobs for the loop.
#[derive(Debug, Clone, Copy)]
pub struct PollLoopConfig {
    pub poll_interval: Duration,
}

impl Default for PollLoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Observable loop state, mainly for displays and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStatus {
    pub state: RunState,
    pub epoch: u64,
    pub request_in_flight: bool,
}

struct InFlightRequest {
    id: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct PollInner {
    state: RunState,
    epoch: u64,
    request_seq: u64,
    in_flight: Option<InFlightRequest>,
    ticker: Option<CancellationToken>,
}

impl PollInner {
    /// Leave `Running` without touching the status line. Cancels the ticker
    /// and any outstanding request; their eventual completions are discarded
    /// by the epoch/state checks regardless.
    fn halt(&mut self) {
        self.state = RunState::Stopped;
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        if let Some(request) = self.in_flight.take() {
            request.token.cancel();
        }
    }
}

/// The polling control loop. Cheap to clone; clones share one loop.
#[derive(Clone)]
pub struct PollLoop {
    client: Arc<dyn SimulationClient>,
    session: SharedSession,
    redraw: RedrawRequest,
    config: PollLoopConfig,
    inner: Arc<Mutex<PollInner>>,
}

impl PollLoop {
    pub fn new(
        client: Arc<dyn SimulationClient>,
        session: SharedSession,
        redraw: RedrawRequest,
        config: PollLoopConfig,
    ) -> Self {
        Self {
            client,
            session,
            redraw,
            config,
            inner: Arc::new(Mutex::new(PollInner::default())),
        }
    }

    pub fn status(&self) -> PollStatus {
        let inner = self.lock_inner();
        PollStatus {
            state: inner.state,
            epoch: inner.epoch,
            request_in_flight: inner.in_flight.is_some(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_inner().state == RunState::Running
    }

    /// Initialize a fresh simulation on the server. Only valid while
    /// stopped; a success installs the world geometry and arms [`Self::start`].
    pub async fn initialize(&self, settings: &SimulationSettings) -> Result<(), PollError> {
        if self.is_running() {
            return Err(PollError::NotStopped);
        }
        let request = InitRequest::from_settings(settings);
        match self.client.init(&request).await {
            Ok(response) if response.status == STATUS_SUCCESS => {
                let mut session = self.lock_session();
                session.apply_init(
                    WorldExtent::new(response.x_max, response.y_max),
                    HighwayLayout::new(
                        response.lane_count,
                        response.lane_width,
                        response.lane_centers,
                    ),
                    &response.message,
                );
                drop(session);
                (self.redraw)();
                Ok(())
            }
            Ok(response) => {
                self.report_error(&response.message);
                Err(ClientError::Api {
                    message: response.message,
                }
                .into())
            }
            Err(err) => {
                self.report_error(&err.to_string());
                Err(err.into())
            }
        }
    }

    /// Enter `Running`: bump the epoch and arm the repeating ticker. The
    /// first step request goes out one interval after start.
    pub fn start(&self) -> Result<(), PollError> {
        let ticker = {
            let mut inner = self.lock_inner();
            if inner.state == RunState::Running {
                return Err(PollError::AlreadyRunning);
            }
            if !self.lock_session().ready {
                return Err(PollError::NotInitialized);
            }
            inner.epoch += 1;
            inner.state = RunState::Running;
            let ticker = CancellationToken::new();
            inner.ticker = Some(ticker.clone());
            debug!(epoch = inner.epoch, "poll loop started");
            ticker
        };
        self.lock_session()
            .set_status("Simulation running...".to_owned(), true);
        (self.redraw)();

        let this = self.clone();
        let period = self.config.poll_interval;
        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.cancelled() => break,
                    _ = interval.tick() => this.step_once(),
                }
            }
        });
        Ok(())
    }

    /// Leave `Running`, cancelling the ticker and any in-flight request.
    /// No-op when already stopped.
    pub fn stop(&self) {
        {
            let mut inner = self.lock_inner();
            if inner.state != RunState::Running {
                return;
            }
            inner.halt();
            debug!(epoch = inner.epoch, "poll loop stopped");
        }
        self.lock_session()
            .set_status("Simulation paused".to_owned(), false);
        (self.redraw)();
    }

    /// Clear the server-side simulation. Only valid while stopped; a success
    /// clears the session and requires a new [`Self::initialize`] before
    /// [`Self::start`] is accepted again.
    pub async fn reset(&self) -> Result<(), PollError> {
        if self.is_running() {
            return Err(PollError::NotStopped);
        }
        match self.client.reset().await {
            Ok(response) if response.status == STATUS_SUCCESS => {
                self.lock_session().clear_for_reset();
                (self.redraw)();
                Ok(())
            }
            Ok(response) => {
                self.report_error(&response.message);
                Err(ClientError::Api {
                    message: response.message,
                }
                .into())
            }
            Err(err) => {
                self.report_error(&err.to_string());
                Err(err.into())
            }
        }
    }

    /// Issue one step request, pre-empting whatever is still outstanding.
    ///
    /// Invoked by the ticker on every tick while running; public so hosts
    /// can single-step a stopped-clock session in tests or tooling.
    pub fn step_once(&self) {
        let (epoch, id, token) = {
            let mut inner = self.lock_inner();
            if inner.state != RunState::Running {
                return;
            }
            // Single-outstanding-request invariant: newer ticks pre-empt
            // older in-flight requests.
            if let Some(previous) = inner.in_flight.take() {
                debug!(request = previous.id, "pre-empting in-flight step request");
                previous.token.cancel();
            }
            inner.request_seq += 1;
            let id = inner.request_seq;
            let token = CancellationToken::new();
            inner.in_flight = Some(InFlightRequest {
                id,
                token: token.clone(),
            });
            (inner.epoch, id, token)
        };

        let this = self.clone();
        tokio::spawn(async move {
            // Biased toward the response: a reply that was fully received
            // before cancellation took effect still reaches complete_step,
            // where the epoch/state guard decides its fate.
            let outcome = tokio::select! {
                biased;
                result = this.client.step() => Some(result),
                () = token.cancelled() => None,
            };
            this.complete_step(epoch, id, outcome);
        });
    }

    fn complete_step(
        &self,
        epoch: u64,
        id: u64,
        outcome: Option<Result<StepResponse, ClientError>>,
    ) {
        let mut inner = self.lock_inner();
        // Release the in-flight slot only if it is still ours; a newer
        // request may already occupy it.
        if matches!(&inner.in_flight, Some(request) if request.id == id) {
            inner.in_flight = None;
        }
        let Some(result) = outcome else {
            // Cancelled: silently discarded, the loop keeps its state.
            return;
        };
        if inner.state != RunState::Running || epoch != inner.epoch {
            debug!(
                request = id,
                response_epoch = epoch,
                current_epoch = inner.epoch,
                "discarding stale step response"
            );
            return;
        }
        match result {
            Ok(response) if response.status == STATUS_SUCCESS => {
                drop(inner);
                let mut session = self.lock_session();
                session.apply_step(response.step, response.agents, response.aggregate_data);
                drop(session);
                (self.redraw)();
            }
            Ok(response) => {
                inner.halt();
                drop(inner);
                warn!(message = %response.message, "step rejected by server; stopping");
                self.report_error(&response.message);
            }
            Err(err) => {
                inner.halt();
                drop(inner);
                warn!(error = %err, "step request failed; stopping");
                self.report_error(&err.to_string());
            }
        }
    }

    fn report_error(&self, message: &str) {
        self.lock_session()
            .set_status(format!("Error: {message}"), false);
        (self.redraw)();
    }

    fn lock_inner(&self) -> MutexGuard<'_, PollInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
