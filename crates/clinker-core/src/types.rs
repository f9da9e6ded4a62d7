use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Reporting periods
// =============================================================================

/// A monthly reporting period, ordered chronologically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

/// Records that belong to a monthly reporting period.
pub trait Periodic {
    fn period(&self) -> Period;
}

/// Return the record with the most recent period, if any.
///
/// When two records share a period the earlier one in the slice wins.
pub fn latest<T: Periodic>(records: &[T]) -> Option<&T> {
    records.iter().fold(None, |best: Option<&T>, r| match best {
        Some(b) if b.period() >= r.period() => Some(b),
        _ => Some(r),
    })
}

// =============================================================================
// Facilities
// =============================================================================

/// A facility as listed for an organization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacilitySummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Detailed facility information.
///
/// The backend sends an open-ended payload; fields the core does not
/// interpret are kept in `extra` and passed through to generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacilityInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Monthly data
// =============================================================================

/// Monthly emission totals for a facility.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub year: i32,
    pub month: u32,
    /// Total emissions in kgCO2e.
    #[serde(default)]
    pub total_emissions: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emission_intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_energy: Option<f64>,
}

impl Periodic for EmissionRecord {
    fn period(&self) -> Period {
        Period {
            year: self.year,
            month: self.month,
        }
    }
}

/// Monthly production figures for a facility.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub year: i32,
    pub month: u32,
    /// Cement produced, in tonnes.
    #[serde(default)]
    pub cement_production: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinker_production: Option<f64>,
}

impl Periodic for ProductionRecord {
    fn period(&self) -> Period {
        Period {
            year: self.year,
            month: self.month,
        }
    }
}

// =============================================================================
// Targets
// =============================================================================

/// A sustainability target set by an organization or facility.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub name: String,
    /// Absent for organization-wide targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// =============================================================================
// Resources
// =============================================================================

/// An emission resource configured at a facility (fuel, electricity, raw material).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: String,
    pub name: String,
    /// Reporting scope, e.g. "scope1".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// One month of consumption for a resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub consumption: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumption_unit: Option<String>,
}

impl Periodic for ConsumptionRecord {
    fn period(&self) -> Period {
        Period {
            year: self.year,
            month: self.month,
        }
    }
}

/// A configured resource together with its recent consumption history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceConsumption {
    pub resource: ResourceInfo,
    #[serde(default, rename = "recentConsumption", alias = "recent_consumption")]
    pub recent_consumption: Vec<ConsumptionRecord>,
}
