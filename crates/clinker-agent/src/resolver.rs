//! Requirement and facility resolution.
//!
//! Turns an [`AnalysisResult`] into a [`Resolution`]: the canonical
//! requirement set, the time window to fetch, and the facility to fetch it
//! for. A default facility is picked from the organization's list when the
//! question needs facility data and the caller did not name one.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use clinker_core::config::FacilitySelection;
use clinker_core::types::FacilitySummary;

use crate::classifier::DEFAULT_TIME_RANGE_MONTHS;
use crate::gateway::DataGateway;
use crate::types::{AnalysisResult, DataRequirement, Requirements};

/// What the aggregator should fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub effective_facility_id: Option<String>,
    pub organization_id: Option<String>,
    pub requirements: Requirements,
    pub time_range_months: u32,
    /// True when `effective_facility_id` was picked rather than given.
    pub auto_selected: bool,
}

impl Resolution {
    pub fn needs_data(&self) -> bool {
        !self.requirements.contains(&DataRequirement::None)
    }
}

// =============================================================================
// FacilityResolver
// =============================================================================

/// Picks a default facility for an organization.
pub struct FacilityResolver {
    gateway: Arc<dyn DataGateway>,
    selection: FacilitySelection,
    timeout: Duration,
}

impl FacilityResolver {
    pub fn new(gateway: Arc<dyn DataGateway>, selection: FacilitySelection, timeout: Duration) -> Self {
        Self {
            gateway,
            selection,
            timeout,
        }
    }

    /// Apply a selection policy to a facility list.
    pub fn select(
        facilities: &[FacilitySummary],
        selection: FacilitySelection,
    ) -> Option<&FacilitySummary> {
        match selection {
            FacilitySelection::FirstReturned => facilities.first(),
            FacilitySelection::Oldest => facilities.iter().min_by(|a, b| {
                (a.created_at.is_none(), a.created_at, &a.id).cmp(&(
                    b.created_at.is_none(),
                    b.created_at,
                    &b.id,
                ))
            }),
        }
    }

    /// Fetch the organization's facilities and pick one.
    ///
    /// Returns `None` when the list is empty or the lookup fails, times out,
    /// or panics. The lookup runs on its own task; a panic there reads as a
    /// failed lookup.
    pub async fn default_facility(&self, organization_id: &str) -> Option<String> {
        let gateway = Arc::clone(&self.gateway);
        let org = organization_id.to_string();
        let timeout = self.timeout;
        let lookup = tokio::spawn(async move {
            tokio::time::timeout(timeout, gateway.get_organization_facilities(&org)).await
        });

        let facilities = match lookup.await {
            Ok(Ok(Ok(list))) => list,
            Ok(Ok(Err(e))) => {
                warn!(organization_id, error = %e, "Facility lookup failed");
                return None;
            }
            Ok(Err(_)) => {
                warn!(organization_id, "Facility lookup timed out");
                return None;
            }
            Err(e) => {
                warn!(organization_id, error = %e, "Facility lookup task aborted");
                return None;
            }
        };

        let chosen = Self::select(&facilities, self.selection)?;
        info!(
            organization_id,
            facility_id = %chosen.id,
            facility_name = %chosen.name,
            candidates = facilities.len(),
            "Default facility selected"
        );
        Some(chosen.id.clone())
    }
}

// =============================================================================
// RequirementResolver
// =============================================================================

/// Produces a [`Resolution`] from a classification.
pub struct RequirementResolver {
    facilities: FacilityResolver,
}

impl RequirementResolver {
    pub fn new(facilities: FacilityResolver) -> Self {
        Self { facilities }
    }

    pub async fn resolve(
        &self,
        analysis: &AnalysisResult,
        facility_id: Option<&str>,
        organization_id: Option<&str>,
    ) -> Resolution {
        let time_range_months = analysis
            .suggested_time_range_months
            .unwrap_or(DEFAULT_TIME_RANGE_MONTHS);
        let mut resolution = Resolution {
            effective_facility_id: facility_id.map(str::to_string),
            organization_id: organization_id.map(str::to_string),
            requirements: analysis.data_requirements.clone(),
            time_range_months,
            auto_selected: false,
        };

        if !resolution.needs_data() {
            debug!("No data required");
            return resolution;
        }

        let facility_scoped = resolution
            .requirements
            .iter()
            .any(DataRequirement::is_facility_scoped);

        if facility_scoped && facility_id.is_none() {
            match organization_id {
                Some(org) => {
                    if let Some(chosen) = self.facilities.default_facility(org).await {
                        resolution.effective_facility_id = Some(chosen);
                        resolution.auto_selected = true;
                    }
                }
                None => debug!("Facility data required but no organization to pick from"),
            }
        }

        resolution
    }
}
