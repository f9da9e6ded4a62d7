//! Backend response envelope.
//!
//! Every backend endpoint wraps its payload as
//! `{ "success": bool, "data": ..., "message": "..." }`.

use serde::Deserialize;

use clinker_core::types::{ResourceConsumption, Target};

#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// The payload, or `None` when the backend reported failure or sent nothing.
    pub fn into_data(self) -> Option<T> {
        if self.success {
            self.data
        } else {
            if let Some(message) = &self.message {
                tracing::debug!(message = %message, "Backend reported unsuccessful response");
            }
            None
        }
    }
}

/// `data` shape of the targets endpoint.
#[derive(Debug, Deserialize)]
pub struct TargetsPayload {
    #[serde(default)]
    pub targets: Vec<Target>,
}

/// `data` shape of the facility resources endpoint.
#[derive(Debug, Deserialize)]
pub struct ResourcesPayload {
    #[serde(default)]
    pub resources: Vec<ResourceConsumption>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinker_core::types::FacilitySummary;

    #[test]
    fn test_successful_envelope() {
        let env: ApiEnvelope<Vec<FacilitySummary>> = serde_json::from_str(
            r#"{"success":true,"data":[{"id":"f-1","name":"North Plant"}]}"#,
        )
        .unwrap();
        let data = env.into_data().unwrap();
        assert_eq!(data[0].name, "North Plant");
    }

    #[test]
    fn test_unsuccessful_envelope_is_absent() {
        let env: ApiEnvelope<Vec<FacilitySummary>> = serde_json::from_str(
            r#"{"success":false,"data":[{"id":"f-1","name":"x"}],"message":"Facility not found"}"#,
        )
        .unwrap();
        assert!(env.into_data().is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let env: ApiEnvelope<Vec<FacilitySummary>> = serde_json::from_str("{}").unwrap();
        assert!(!env.success);
        assert!(env.into_data().is_none());

        let env: ApiEnvelope<Vec<FacilitySummary>> =
            serde_json::from_str(r#"{"success":true,"data":null}"#).unwrap();
        assert!(env.into_data().is_none());
    }

    #[test]
    fn test_targets_payload() {
        let env: ApiEnvelope<TargetsPayload> = serde_json::from_str(
            r#"{"success":true,"data":{"targets":[{"id":"t-1","name":"Net zero","target_year":2050}]}}"#,
        )
        .unwrap();
        let targets = env.into_data().unwrap().targets;
        assert_eq!(targets[0].target_year, Some(2050));
    }

    #[test]
    fn test_resources_payload() {
        let env: ApiEnvelope<ResourcesPayload> = serde_json::from_str(
            r#"{"success":true,"data":{"resources":[{"resource":{"id":"r-1","name":"Coal"},"recentConsumption":[]}]}}"#,
        )
        .unwrap();
        assert_eq!(env.into_data().unwrap().resources.len(), 1);
    }
}
