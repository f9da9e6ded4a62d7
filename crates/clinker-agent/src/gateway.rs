//! Data gateway abstraction.
//!
//! Defines the read-only [`DataGateway`] trait the aggregator and facility
//! resolver fetch through, the per-fetch [`Fetched`] outcome, and
//! [`StaticGateway`], an in-memory implementation backed by a JSON fixture.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use clinker_core::types::{
    EmissionRecord, FacilityInfo, FacilitySummary, ProductionRecord, ResourceConsumption, Target,
};

use crate::error::GatewayError;

/// Read-only access to backend facility data.
///
/// Every method is retry-safe. `Ok(None)` (or an empty list) means the
/// backend has nothing for the request; `Err` means the call itself failed.
#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn get_organization_facilities(
        &self,
        organization_id: &str,
    ) -> Result<Vec<FacilitySummary>, GatewayError>;

    async fn get_facility(
        &self,
        facility_id: &str,
        organization_id: Option<&str>,
    ) -> Result<Option<FacilityInfo>, GatewayError>;

    async fn get_emissions(
        &self,
        facility_id: &str,
        months: u32,
        organization_id: Option<&str>,
    ) -> Result<Option<Vec<EmissionRecord>>, GatewayError>;

    async fn get_production(
        &self,
        facility_id: &str,
        months: u32,
        organization_id: Option<&str>,
    ) -> Result<Option<Vec<ProductionRecord>>, GatewayError>;

    async fn get_targets(
        &self,
        organization_id: &str,
        facility_id: Option<&str>,
    ) -> Result<Option<Vec<Target>>, GatewayError>;

    async fn get_facility_resources(
        &self,
        facility_id: &str,
    ) -> Result<Option<Vec<ResourceConsumption>>, GatewayError>;
}

// =============================================================================
// Fetch outcome
// =============================================================================

/// How a single planned fetch settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Data(T),
    Empty,
    Failed(String),
}

impl<T> Fetched<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Fetched::Failed(_))
    }

    pub fn data(self) -> Option<T> {
        match self {
            Fetched::Data(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> Fetched<Vec<T>> {
    /// Treat `Ok(None)` and `Ok([])` alike as empty.
    pub fn from_list(result: Result<Option<Vec<T>>, GatewayError>) -> Self {
        match result {
            Ok(Some(items)) if !items.is_empty() => Fetched::Data(items),
            Ok(_) => Fetched::Empty,
            Err(e) => Fetched::Failed(e.to_string()),
        }
    }
}

impl<T> Fetched<T> {
    pub fn from_option(result: Result<Option<T>, GatewayError>) -> Self {
        match result {
            Ok(Some(v)) => Fetched::Data(v),
            Ok(None) => Fetched::Empty,
            Err(e) => Fetched::Failed(e.to_string()),
        }
    }
}

// =============================================================================
// StaticGateway
// =============================================================================

/// Gateway operations, used for fault injection and call logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOp {
    OrganizationFacilities,
    Facility,
    Emissions,
    Production,
    Targets,
    Resources,
}

/// Injected misbehavior for one operation.
#[derive(Debug, Clone)]
pub enum Fault {
    Error(GatewayError),
    Delay(Duration),
    Panic,
}

/// Snapshot of backend data, keyed by organization or facility id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayFixture {
    pub organizations: HashMap<String, Vec<FacilitySummary>>,
    pub facilities: HashMap<String, FacilityInfo>,
    pub emissions: HashMap<String, Vec<EmissionRecord>>,
    pub production: HashMap<String, Vec<ProductionRecord>>,
    /// Keyed by organization id.
    pub targets: HashMap<String, Vec<Target>>,
    pub resources: HashMap<String, Vec<ResourceConsumption>>,
}

/// In-memory [`DataGateway`] serving a [`GatewayFixture`].
///
/// Records every call it receives and can be told to fail, stall, or panic
/// on specific operations.
#[derive(Default)]
pub struct StaticGateway {
    fixture: GatewayFixture,
    faults: Mutex<HashMap<GatewayOp, Fault>>,
    calls: Mutex<Vec<GatewayOp>>,
}

impl StaticGateway {
    pub fn new(fixture: GatewayFixture) -> Self {
        Self {
            fixture,
            ..Self::default()
        }
    }

    /// Load a fixture from a JSON file.
    pub fn from_json_file(path: &Path) -> clinker_core::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let fixture: GatewayFixture = serde_json::from_str(&content)?;
        tracing::info!(path = %path.display(), "Gateway fixture loaded");
        Ok(Self::new(fixture))
    }

    /// Make `op` misbehave on every subsequent call.
    pub fn inject(&self, op: GatewayOp, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(op, fault);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    /// Operations received so far, in arrival order.
    pub fn calls(&self) -> Vec<GatewayOp> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, op: GatewayOp) -> usize {
        self.calls().iter().filter(|c| **c == op).count()
    }

    async fn enter(&self, op: GatewayOp) -> Result<(), GatewayError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(op);
        }
        let fault = self
            .faults
            .lock()
            .ok()
            .and_then(|faults| faults.get(&op).cloned());
        match fault {
            None => Ok(()),
            Some(Fault::Error(e)) => Err(e),
            Some(Fault::Delay(d)) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
            Some(Fault::Panic) => panic!("injected gateway panic on {op:?}"),
        }
    }
}

/// The `months` most recent records, oldest first.
fn recent<T: clinker_core::types::Periodic + Clone>(records: &[T], months: u32) -> Vec<T> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|r| r.period());
    let skip = sorted.len().saturating_sub(months as usize);
    sorted.split_off(skip)
}

#[async_trait]
impl DataGateway for StaticGateway {
    async fn get_organization_facilities(
        &self,
        organization_id: &str,
    ) -> Result<Vec<FacilitySummary>, GatewayError> {
        self.enter(GatewayOp::OrganizationFacilities).await?;
        Ok(self
            .fixture
            .organizations
            .get(organization_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_facility(
        &self,
        facility_id: &str,
        organization_id: Option<&str>,
    ) -> Result<Option<FacilityInfo>, GatewayError> {
        self.enter(GatewayOp::Facility).await?;
        let info = self.fixture.facilities.get(facility_id).cloned();
        // a facility owned by another organization is invisible
        Ok(info.filter(|f| match (organization_id, f.organization_id.as_deref()) {
            (Some(wanted), Some(owner)) => wanted == owner,
            _ => true,
        }))
    }

    async fn get_emissions(
        &self,
        facility_id: &str,
        months: u32,
        _organization_id: Option<&str>,
    ) -> Result<Option<Vec<EmissionRecord>>, GatewayError> {
        self.enter(GatewayOp::Emissions).await?;
        Ok(self
            .fixture
            .emissions
            .get(facility_id)
            .map(|r| recent(r, months)))
    }

    async fn get_production(
        &self,
        facility_id: &str,
        months: u32,
        _organization_id: Option<&str>,
    ) -> Result<Option<Vec<ProductionRecord>>, GatewayError> {
        self.enter(GatewayOp::Production).await?;
        Ok(self
            .fixture
            .production
            .get(facility_id)
            .map(|r| recent(r, months)))
    }

    async fn get_targets(
        &self,
        organization_id: &str,
        facility_id: Option<&str>,
    ) -> Result<Option<Vec<Target>>, GatewayError> {
        self.enter(GatewayOp::Targets).await?;
        Ok(self.fixture.targets.get(organization_id).map(|targets| {
            targets
                .iter()
                .filter(|t| match (facility_id, t.facility_id.as_deref()) {
                    (Some(wanted), Some(owner)) => wanted == owner,
                    _ => true,
                })
                .cloned()
                .collect()
        }))
    }

    async fn get_facility_resources(
        &self,
        facility_id: &str,
    ) -> Result<Option<Vec<ResourceConsumption>>, GatewayError> {
        self.enter(GatewayOp::Resources).await?;
        Ok(self.fixture.resources.get(facility_id).cloned())
    }
}
