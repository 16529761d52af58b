//! HTTP implementation of [`SimulationClient`] backed by `reqwest`.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::api::{InitRequest, InitResponse, ResetResponse, SimulationClient, StepResponse};
use crate::ClientError;

/// Talks to the simulation service at a base URL such as
/// `http://127.0.0.1:5000`.
#[derive(Debug, Clone)]
pub struct HttpSimulationClient {
    client: Client,
    base_url: String,
}

impl HttpSimulationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }
}

#[async_trait]
impl SimulationClient for HttpSimulationClient {
    async fn init(&self, request: &InitRequest) -> Result<InitResponse, ClientError> {
        debug!(?request, "sending init request");
        let response = self
            .client
            .get(self.endpoint("init"))
            .query(request)
            .send()
            .await?
            .json()
            .await?;
        Ok(response)
    }

    async fn step(&self) -> Result<StepResponse, ClientError> {
        let response = self
            .client
            .get(self.endpoint("step"))
            .send()
            .await?
            .json()
            .await?;
        Ok(response)
    }

    async fn reset(&self) -> Result<ResetResponse, ClientError> {
        debug!("sending reset request");
        let response = self
            .client
            .get(self.endpoint("reset"))
            .send()
            .await?
            .json()
            .await?;
        Ok(response)
    }
}
