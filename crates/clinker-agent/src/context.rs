//! Context bundles handed to the generation step.
//!
//! A [`ContextBundle`] is one of three tagged shapes, discriminated on the
//! wire by `context_type`. Derived metrics (the facility summary and the
//! consumption breakdown) are computed here from raw gateway records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinker_core::types::{
    latest, EmissionRecord, FacilityInfo, FacilitySummary, Period, Periodic, ProductionRecord,
    ResourceConsumption, Target,
};

use crate::gateway::GatewayOp;

/// Scope or category label used when the backend leaves one blank.
pub const UNKNOWN_LABEL: &str = "unknown";

// =============================================================================
// Bundle
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "context_type", rename_all = "snake_case")]
pub enum ContextBundle {
    General(GeneralContext),
    FacilitySpecific(Box<FacilityContext>),
    Error(ErrorContext),
}

impl ContextBundle {
    pub fn general(message: impl Into<String>, time_range_months: Option<u32>) -> Self {
        ContextBundle::General(GeneralContext {
            message: message.into(),
            time_range_months,
        })
    }

    pub fn context_type(&self) -> &'static str {
        match self {
            ContextBundle::General(_) => "general",
            ContextBundle::FacilitySpecific(_) => "facility_specific",
            ContextBundle::Error(_) => "error",
        }
    }

    pub fn as_facility(&self) -> Option<&FacilityContext> {
        match self {
            ContextBundle::FacilitySpecific(ctx) => Some(ctx),
            _ => None,
        }
    }
}

/// No facility data was needed or none could be gathered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneralContext {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range_months: Option<u32>,
}

/// Every planned fetch failed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub message: String,
    pub failures: Vec<SourceFailure>,
}

/// A data source that could not be reached for this request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: GatewayOp,
    pub reason: String,
}

/// Facility data gathered for one request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacilityContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility: Option<FacilityInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emissions: Option<Vec<EmissionRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<Vec<ProductionRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<TargetsSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesSection>,
    pub summary: SummaryMetrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<SourceFailure>,
    pub time_range_months: u32,
    pub data_freshness: DateTime<Utc>,
}

impl FacilityContext {
    /// Whether any data section is populated.
    pub fn has_data(&self) -> bool {
        self.facility.is_some()
            || self.organization.is_some()
            || self.emissions.is_some()
            || self.production.is_some()
            || self.targets.is_some()
            || self.resources.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSection {
    pub facilities: Vec<FacilitySummary>,
    pub facility_count: usize,
}

impl OrganizationSection {
    pub fn new(facilities: Vec<FacilitySummary>) -> Self {
        Self {
            facility_count: facilities.len(),
            facilities,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetsSection {
    pub targets: Vec<Target>,
    pub target_count: usize,
}

impl TargetsSection {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            target_count: targets.len(),
            targets,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourcesSection {
    pub resources: Vec<ResourceConsumption>,
    pub resource_count: usize,
    pub consumption_summary: ConsumptionSummary,
}

impl ResourcesSection {
    pub fn new(resources: Vec<ResourceConsumption>) -> Self {
        Self {
            consumption_summary: consumption_summary(&resources),
            resource_count: resources.len(),
            resources,
        }
    }
}

// =============================================================================
// Consumption summary
// =============================================================================

/// Most recent consumption reading for a (scope, category) cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionSnapshot {
    pub resource_name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub year: i32,
    pub month: u32,
}

impl ConsumptionSnapshot {
    fn period(&self) -> Period {
        Period {
            year: self.year,
            month: self.month,
        }
    }
}

/// scope → category → latest reading.
pub type ConsumptionSummary = BTreeMap<String, BTreeMap<String, ConsumptionSnapshot>>;

/// Group resources by scope and category, keeping the newest reading per cell.
///
/// Resources without any consumption are skipped.
pub fn consumption_summary(resources: &[ResourceConsumption]) -> ConsumptionSummary {
    let mut summary = ConsumptionSummary::new();

    for rc in resources {
        let Some(record) = latest(&rc.recent_consumption) else {
            continue;
        };
        let scope = rc.resource.scope.as_deref().unwrap_or(UNKNOWN_LABEL);
        let category = rc.resource.category.as_deref().unwrap_or(UNKNOWN_LABEL);
        let snapshot = ConsumptionSnapshot {
            resource_name: rc.resource.name.clone(),
            value: record.consumption,
            unit: record.consumption_unit.clone(),
            year: record.year,
            month: record.month,
        };

        let cells = summary.entry(scope.to_string()).or_default();
        match cells.get(category) {
            Some(existing) if existing.period() >= record.period() => {}
            _ => {
                cells.insert(category.to_string(), snapshot);
            }
        }
    }

    summary
}

// =============================================================================
// Summary metrics
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub facility_name: String,
    pub data_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_total_emissions: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emission_intensity: Option<f64>,
    pub emission_data_points: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_cement_production: Option<f64>,
    pub production_data_points: usize,
    /// Latest emissions divided by latest cement production; only when production > 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_emission_intensity: Option<f64>,
}

impl SummaryMetrics {
    pub fn derive(
        facility: Option<&FacilityInfo>,
        emissions: Option<&[EmissionRecord]>,
        production: Option<&[ProductionRecord]>,
        data_available: bool,
    ) -> Self {
        let latest_emission = emissions.and_then(latest);
        let latest_production = production.and_then(latest);

        let latest_total_emissions = latest_emission.map(|e| e.total_emissions);
        let latest_cement_production = latest_production.map(|p| p.cement_production);

        let calculated_emission_intensity = match (latest_total_emissions, latest_cement_production)
        {
            (Some(total), Some(cement)) if cement > 0.0 => Some(total / cement),
            _ => None,
        };

        Self {
            facility_name: facility
                .map(|f| f.name.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            data_available,
            latest_total_emissions,
            emission_intensity: latest_emission.and_then(|e| e.emission_intensity),
            emission_data_points: emissions.map_or(0, <[EmissionRecord]>::len),
            latest_cement_production,
            production_data_points: production.map_or(0, <[ProductionRecord]>::len),
            calculated_emission_intensity,
        }
    }
}
