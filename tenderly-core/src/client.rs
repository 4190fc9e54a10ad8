use std::time::Duration;

use reqwest::Url;

use crate::{
    auth::TenderlyAuth,
    error::{SerializableReqwestError, TenderlyError},
    types::{SimulationCall, SimulationRequest, SimulationResponse, SimulationVerdict},
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.tenderly.co/api/v1";
pub const DEFAULT_DASHBOARD_BASE_URL: &str = "https://dashboard.tenderly.co";

pub struct TenderlyClient {
    pub client: reqwest::Client,
    pub simulate_url: Url,
    pub default_headers: reqwest::header::HeaderMap,
    pub account: String,
    pub project: String,
    pub dashboard_base_url: String,
}

pub struct TenderlyClientBuilder {
    pub api_base_url: String,
    pub dashboard_base_url: String,
    pub account: String,
    pub project: String,
    pub auth: TenderlyAuth,
    pub timeout: Duration,
}

impl TenderlyClientBuilder {
    pub fn new(account: &str, project: &str, auth: TenderlyAuth) -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            dashboard_base_url: DEFAULT_DASHBOARD_BASE_URL.to_string(),
            account: account.to_owned(),
            project: project.to_owned(),
            auth,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_base_url(mut self, api_base_url: &str) -> Self {
        self.api_base_url = api_base_url.trim_end_matches('/').to_owned();
        self
    }

    pub fn with_dashboard_base_url(mut self, dashboard_base_url: &str) -> Self {
        self.dashboard_base_url = dashboard_base_url.trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the TenderlyClient
    pub fn build(self) -> Result<TenderlyClient, TenderlyError> {
        if self.account.is_empty() || self.project.is_empty() {
            return Err(TenderlyError::NotConfigured {
                message: "simulation account and project must both be set".to_string(),
            });
        }

        let raw_url = format!(
            "{}/account/{}/project/{}/simulate",
            self.api_base_url, self.account, self.project
        );
        let simulate_url = Url::parse(&raw_url).map_err(|e| TenderlyError::url(raw_url, e))?;

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(TenderlyError::http_client_backend)?;

        Ok(TenderlyClient {
            client,
            simulate_url,
            default_headers: self.auth.to_header_map()?,
            account: self.account,
            project: self.project,
            dashboard_base_url: self.dashboard_base_url,
        })
    }
}

impl TenderlyClient {
    /// Link to the saved simulation in the web dashboard
    pub fn dashboard_url(&self, simulation_id: &str) -> String {
        format!(
            "{}/{}/{}/simulator/{}",
            self.dashboard_base_url, self.account, self.project, simulation_id
        )
    }

    /// Dry runs a call. Reverts come back as `Ok` with `success = false`; an `Err`
    /// means the service itself could not produce a verdict.
    pub async fn simulate(&self, call: &SimulationCall) -> Result<SimulationVerdict, TenderlyError> {
        let request = SimulationRequest::from(call);

        tracing::debug!(
            chain_id = call.chain_id,
            from = ?call.from,
            to = ?call.to,
            gas = call.gas_limit,
            "Submitting simulation"
        );

        let response = self
            .client
            .post(self.simulate_url.clone())
            .headers(self.default_headers.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Simulation request failed: {}", e);
                SerializableReqwestError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Simulation service rejected request");
            return Err(TenderlyError::UnexpectedResponse {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response.json::<SimulationResponse>().await.map_err(|e| {
            tracing::error!("Failed to decode simulation response: {}", e);
            SerializableReqwestError::from(e)
        })?;

        let dashboard_url = parsed
            .simulation
            .id
            .as_deref()
            .map(|id| self.dashboard_url(id));

        let verdict = SimulationVerdict::from_response(parsed, call.gas_limit, dashboard_url);

        tracing::info!(
            chain_id = call.chain_id,
            success = verdict.success,
            gas_used = verdict.gas_used,
            "Simulation finished"
        );

        Ok(verdict)
    }
}
