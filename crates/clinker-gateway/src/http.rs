//! HTTP data gateway against the backend REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use clinker_agent::{DataGateway, ExchangeRecord, GatewayError, HistorySink};
use clinker_core::config::GatewayConfig;
use clinker_core::types::{
    EmissionRecord, FacilityInfo, FacilitySummary, ProductionRecord, ResourceConsumption, Target,
};

use crate::envelope::{ApiEnvelope, ResourcesPayload, TargetsPayload};

/// [`DataGateway`] and [`HistorySink`] backed by the backend's JSON API.
///
/// Every request carries the `X-API-Key` header. A 404 or an envelope with
/// `success: false` reads as "no data"; other failures surface as
/// [`GatewayError`].
pub struct HttpDataGateway {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl HttpDataGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            GatewayError::Unavailable(format!("Invalid base_url '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Unavailable(format!(
                "base_url '{}' cannot carry a path",
                config.base_url
            )));
        }
        if config.api_key.is_empty() {
            warn!("Gateway API key is empty; backend requests will likely be rejected");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        info!(base_url = %base_url, "HTTP gateway configured");
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Join escaped path segments onto the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Unavailable("base_url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Option<T>, GatewayError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "Gateway GET");

        let resp = self
            .client
            .get(url.clone())
            .header("X-API-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url = %url, "Gateway resource not found");
            return Ok(None);
        }
        if !status.is_success() {
            warn!(url = %url, status = %status, "Gateway request failed");
            return Err(GatewayError::Status(status.as_u16()));
        }

        let envelope: ApiEnvelope<T> = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        Ok(envelope.into_data())
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

/// Query pairs, skipping absent values.
fn query(pairs: &[(&'static str, Option<String>)]) -> Vec<(&'static str, String)> {
    pairs
        .iter()
        .filter_map(|(k, v)| v.clone().map(|v| (*k, v)))
        .collect()
}

#[async_trait]
impl DataGateway for HttpDataGateway {
    async fn get_organization_facilities(
        &self,
        organization_id: &str,
    ) -> Result<Vec<FacilitySummary>, GatewayError> {
        let facilities: Option<Vec<FacilitySummary>> = self
            .get_json(&["api", "organizations", organization_id, "facilities", "ai"], &[])
            .await?;
        Ok(facilities.unwrap_or_default())
    }

    async fn get_facility(
        &self,
        facility_id: &str,
        organization_id: Option<&str>,
    ) -> Result<Option<FacilityInfo>, GatewayError> {
        let q = query(&[("organization_id", organization_id.map(str::to_string))]);
        self.get_json(&["api", "facilities", facility_id], &q).await
    }

    async fn get_emissions(
        &self,
        facility_id: &str,
        months: u32,
        organization_id: Option<&str>,
    ) -> Result<Option<Vec<EmissionRecord>>, GatewayError> {
        let q = query(&[
            ("months", Some(months.to_string())),
            ("organization_id", organization_id.map(str::to_string)),
        ]);
        self.get_json(&["api", "emissions", "facility", facility_id], &q)
            .await
    }

    async fn get_production(
        &self,
        facility_id: &str,
        months: u32,
        organization_id: Option<&str>,
    ) -> Result<Option<Vec<ProductionRecord>>, GatewayError> {
        let q = query(&[
            ("months", Some(months.to_string())),
            ("organization_id", organization_id.map(str::to_string)),
        ]);
        self.get_json(&["api", "production", "facility", facility_id], &q)
            .await
    }

    async fn get_targets(
        &self,
        organization_id: &str,
        facility_id: Option<&str>,
    ) -> Result<Option<Vec<Target>>, GatewayError> {
        let q = query(&[
            ("organizationId", Some(organization_id.to_string())),
            ("facilityId", facility_id.map(str::to_string)),
        ]);
        let payload: Option<TargetsPayload> = self.get_json(&["api", "targets"], &q).await?;
        Ok(payload.map(|p| p.targets))
    }

    async fn get_facility_resources(
        &self,
        facility_id: &str,
    ) -> Result<Option<Vec<ResourceConsumption>>, GatewayError> {
        let payload: Option<ResourcesPayload> = self
            .get_json(&["api", "facilities", facility_id, "resources", "ai"], &[])
            .await?;
        Ok(payload.map(|p| p.resources))
    }
}

#[async_trait]
impl HistorySink for HttpDataGateway {
    async fn save_exchange(&self, record: ExchangeRecord) -> Result<(), GatewayError> {
        let url = self.endpoint(&["api", "chat", "history"])?;
        let resp = self
            .client
            .post(url)
            .header("X-API-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&record)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }
        debug!(session_id = %record.session_id, "Chat exchange persisted");
        Ok(())
    }
}
