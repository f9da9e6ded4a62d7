//! Concurrent context gathering.
//!
//! Plans the minimal set of gateway fetches for a requirement set, runs each
//! as its own task under a timeout, waits for all of them to settle, and
//! assembles a [`ContextBundle`]. A failed fetch is recorded and logged but
//! never aborts the others, and aggregation itself never returns an error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::{
    ContextBundle, ErrorContext, FacilityContext, OrganizationSection, ResourcesSection,
    SourceFailure, SummaryMetrics, TargetsSection,
};
use crate::error::GatewayError;
use crate::gateway::{DataGateway, Fetched, GatewayOp};
use crate::resolver::Resolution;
use crate::types::{DataRequirement, Requirements};

pub const NO_DATA_REQUIRED: &str = "No specific facility data required";
pub const NO_DATA_FOUND: &str = "No facility data available for this request";
pub const ALL_SOURCES_FAILED: &str = "Unable to retrieve facility data at this time";

/// Which fetches a request needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchPlan {
    pub organization: bool,
    pub facility: bool,
    pub emissions: bool,
    pub production: bool,
    pub targets: bool,
    pub resources: bool,
}

impl FetchPlan {
    /// Decide fetches from requirements and the identifiers at hand.
    ///
    /// A fetch is only planned when its identifiers exist.
    pub fn build(
        requirements: &Requirements,
        facility_id: Option<&str>,
        organization_id: Option<&str>,
    ) -> Self {
        use DataRequirement::{
            EmissionData, FacilityBasic, HistoricalTrends, OrganizationData, ProductionData,
            ResourcesConfig, TargetsGoals,
        };

        let has = |r: DataRequirement| requirements.contains(&r);
        let facility = facility_id.is_some();
        let org = organization_id.is_some();

        Self {
            organization: org && has(OrganizationData),
            facility: facility
                && [FacilityBasic, EmissionData, ProductionData, TargetsGoals, ResourcesConfig]
                    .into_iter()
                    .any(has),
            emissions: facility && (has(EmissionData) || has(HistoricalTrends)),
            production: facility && (has(ProductionData) || has(HistoricalTrends)),
            targets: org && has(TargetsGoals),
            resources: facility && has(ResourcesConfig),
        }
    }

    pub fn count(&self) -> usize {
        [
            self.organization,
            self.facility,
            self.emissions,
            self.production,
            self.targets,
            self.resources,
        ]
        .into_iter()
        .filter(|planned| *planned)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Gathers facility context through a [`DataGateway`].
pub struct ContextAggregator {
    gateway: Arc<dyn DataGateway>,
    fetch_timeout: Duration,
}

impl ContextAggregator {
    pub fn new(gateway: Arc<dyn DataGateway>, fetch_timeout: Duration) -> Self {
        Self {
            gateway,
            fetch_timeout,
        }
    }

    pub async fn aggregate_resolution(&self, resolution: &Resolution) -> ContextBundle {
        self.aggregate(
            &resolution.requirements,
            resolution.effective_facility_id.as_deref(),
            resolution.organization_id.as_deref(),
            resolution.time_range_months,
        )
        .await
    }

    pub async fn aggregate(
        &self,
        requirements: &Requirements,
        facility_id: Option<&str>,
        organization_id: Option<&str>,
        time_range_months: u32,
    ) -> ContextBundle {
        if requirements.is_empty()
            || (requirements.len() == 1 && requirements.contains(&DataRequirement::None))
        {
            return ContextBundle::general(NO_DATA_REQUIRED, Some(time_range_months));
        }

        let plan = FetchPlan::build(requirements, facility_id, organization_id);
        if plan.is_empty() {
            debug!(requirements = ?requirements, "Nothing fetchable for requirements");
            return ContextBundle::general(NO_DATA_REQUIRED, Some(time_range_months));
        }

        let facility_id = facility_id.map(str::to_string);
        let organization_id = organization_id.map(str::to_string);
        let months = time_range_months;

        // Spawn every planned fetch before awaiting any of them.
        let organization = match (plan.organization, organization_id.clone()) {
            (true, Some(org)) => Some(self.spawn(move |gw| async move {
                gw.get_organization_facilities(&org).await.map(Some)
            })),
            _ => None,
        };
        let facility = match (plan.facility, facility_id.clone()) {
            (true, Some(fid)) => {
                let org = organization_id.clone();
                Some(self.spawn(move |gw| async move {
                    gw.get_facility(&fid, org.as_deref()).await
                }))
            }
            _ => None,
        };
        let emissions = match (plan.emissions, facility_id.clone()) {
            (true, Some(fid)) => {
                let org = organization_id.clone();
                Some(self.spawn(move |gw| async move {
                    gw.get_emissions(&fid, months, org.as_deref()).await
                }))
            }
            _ => None,
        };
        let production = match (plan.production, facility_id.clone()) {
            (true, Some(fid)) => {
                let org = organization_id.clone();
                Some(self.spawn(move |gw| async move {
                    gw.get_production(&fid, months, org.as_deref()).await
                }))
            }
            _ => None,
        };
        let targets = match (plan.targets, organization_id.clone()) {
            (true, Some(org)) => {
                let fid = facility_id.clone();
                Some(self.spawn(move |gw| async move {
                    gw.get_targets(&org, fid.as_deref()).await
                }))
            }
            _ => None,
        };
        let resources = match (plan.resources, facility_id.clone()) {
            (true, Some(fid)) => Some(self.spawn(move |gw| async move {
                gw.get_facility_resources(&fid).await
            })),
            _ => None,
        };

        let mut failures: Vec<SourceFailure> = Vec::new();
        let organization =
            settle_list(GatewayOp::OrganizationFacilities, organization, &mut failures).await;
        let facility = settle_one(GatewayOp::Facility, facility, &mut failures).await;
        let emissions = settle_list(GatewayOp::Emissions, emissions, &mut failures).await;
        let production = settle_list(GatewayOp::Production, production, &mut failures).await;
        let targets = settle_list(GatewayOp::Targets, targets, &mut failures).await;
        let resources = settle_list(GatewayOp::Resources, resources, &mut failures).await;

        let planned = plan.count();
        if failures.len() == planned {
            warn!(
                planned,
                facility_id = facility_id.as_deref().unwrap_or("-"),
                "Every planned fetch failed"
            );
            return ContextBundle::Error(ErrorContext {
                message: ALL_SOURCES_FAILED.to_string(),
                failures,
            });
        }

        let organization = counted(organization).map(OrganizationSection::new);
        let targets = counted(targets).map(TargetsSection::new);
        let resources = counted(resources).map(ResourcesSection::new);
        let facility = facility.and_then(Fetched::data);
        let emissions = emissions.and_then(Fetched::data);
        let production = production.and_then(Fetched::data);

        let mut ctx = FacilityContext {
            summary: SummaryMetrics::derive(
                facility.as_ref(),
                emissions.as_deref(),
                production.as_deref(),
                false,
            ),
            facility,
            organization,
            emissions,
            production,
            targets,
            resources,
            unavailable: failures,
            time_range_months,
            data_freshness: Utc::now(),
        };

        let has_data = ctx.has_data();
        ctx.summary.data_available = has_data;

        info!(
            planned,
            failed = ctx.unavailable.len(),
            has_data,
            facility_id = facility_id.as_deref().unwrap_or("-"),
            "Context aggregated"
        );

        if has_data {
            ContextBundle::FacilitySpecific(Box::new(ctx))
        } else {
            ContextBundle::general(NO_DATA_FOUND, Some(time_range_months))
        }
    }

    /// Run one gateway call on its own task under the fetch timeout.
    fn spawn<T, F, Fut>(&self, call: F) -> JoinHandle<Result<Option<T>, GatewayError>>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn DataGateway>) -> Fut,
        Fut: Future<Output = Result<Option<T>, GatewayError>> + Send + 'static,
    {
        let fut = call(Arc::clone(&self.gateway));
        let timeout = self.fetch_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout),
            }
        })
    }
}

/// Counted sections keep an empty result as a zero count.
fn counted<T>(fetched: Option<Fetched<Vec<T>>>) -> Option<Vec<T>> {
    match fetched? {
        Fetched::Data(items) => Some(items),
        Fetched::Empty => Some(Vec::new()),
        Fetched::Failed(_) => None,
    }
}

/// Await a spawned fetch; a panicked task counts as a failure.
async fn join<T>(
    op: GatewayOp,
    handle: JoinHandle<Result<Option<T>, GatewayError>>,
) -> Result<Option<T>, GatewayError> {
    match handle.await {
        Ok(result) => result,
        Err(e) => {
            warn!(source = ?op, error = %e, "Fetch task aborted");
            Err(GatewayError::Unavailable(format!("fetch task aborted: {e}")))
        }
    }
}

fn record<T>(op: GatewayOp, fetched: &Fetched<T>, failures: &mut Vec<SourceFailure>) {
    match fetched {
        Fetched::Failed(reason) => {
            warn!(source = ?op, reason = %reason, "Fetch failed");
            failures.push(SourceFailure {
                source: op,
                reason: reason.clone(),
            });
        }
        Fetched::Empty => debug!(source = ?op, "Fetch returned no data"),
        Fetched::Data(_) => debug!(source = ?op, "Fetch succeeded"),
    }
}

async fn settle_list<T>(
    op: GatewayOp,
    handle: Option<JoinHandle<Result<Option<Vec<T>>, GatewayError>>>,
    failures: &mut Vec<SourceFailure>,
) -> Option<Fetched<Vec<T>>> {
    let fetched = Fetched::from_list(join(op, handle?).await);
    record(op, &fetched, failures);
    Some(fetched)
}

async fn settle_one<T>(
    op: GatewayOp,
    handle: Option<JoinHandle<Result<Option<T>, GatewayError>>>,
    failures: &mut Vec<SourceFailure>,
) -> Option<Fetched<T>> {
    let fetched = Fetched::from_option(join(op, handle?).await);
    record(op, &fetched, failures);
    Some(fetched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{Fault, GatewayFixture, StaticGateway};
    use serde_json::json;

    fn reqs(items: &[DataRequirement]) -> Requirements {
        items.iter().copied().collect()
    }

    fn fixture() -> GatewayFixture {
        serde_json::from_value(json!({
            "organizations": {
                "org-1": [
                    { "id": "f-1", "name": "North Plant" },
                    { "id": "f-2", "name": "South Plant" },
                    { "id": "f-3", "name": "East Plant" }
                ]
            },
            "facilities": {
                "f-1": { "id": "f-1", "organization_id": "org-1", "name": "North Plant" }
            },
            "emissions": {
                "f-1": [
                    { "year": 2024, "month": 1, "total_emissions": 500.0, "emission_intensity": 0.8 },
                    { "year": 2024, "month": 2, "total_emissions": 600.0, "emission_intensity": 0.75 }
                ]
            },
            "production": {
                "f-1": [
                    { "year": 2024, "month": 1, "cement_production": 800.0 },
                    { "year": 2024, "month": 2, "cement_production": 1000.0 }
                ]
            },
            "resources": {
                "f-1": [
                    {
                        "resource": { "id": "r-1", "name": "Coal", "scope": "scope1", "category": "fuel" },
                        "recentConsumption": [{ "year": 2024, "month": 2, "consumption": 40.0 }]
                    }
                ]
            }
        }))
        .unwrap()
    }

    fn aggregator(gw: Arc<StaticGateway>, timeout_ms: u64) -> ContextAggregator {
        ContextAggregator::new(gw, Duration::from_millis(timeout_ms))
    }

    #[test]
    fn test_plan_requires_identifiers() {
        use DataRequirement::{
            EmissionData, FacilityBasic, OrganizationData, ProductionData, ResourcesConfig,
            TargetsGoals,
        };
        let all = reqs(&[
            FacilityBasic,
            EmissionData,
            ProductionData,
            TargetsGoals,
            ResourcesConfig,
            OrganizationData,
        ]);

        let plan = FetchPlan::build(&all, Some("f-1"), Some("org-1"));
        assert_eq!(plan.count(), 6);

        let plan = FetchPlan::build(&all, None, Some("org-1"));
        assert!(plan.organization && plan.targets);
        assert!(!plan.facility && !plan.emissions && !plan.production && !plan.resources);

        let plan = FetchPlan::build(&all, Some("f-1"), None);
        assert!(!plan.organization && !plan.targets);
        assert!(plan.facility && plan.resources);
    }

    #[test]
    fn test_plan_historical_pulls_both_series() {
        let plan = FetchPlan::build(&reqs(&[DataRequirement::HistoricalTrends]), Some("f-1"), None);
        assert!(plan.emissions && plan.production);
        assert!(!plan.facility);
    }

    #[test]
    fn test_plan_benchmarks_only_is_empty() {
        let plan = FetchPlan::build(
            &reqs(&[DataRequirement::IndustryBenchmarks]),
            Some("f-1"),
            Some("org-1"),
        );
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn test_none_requirement_makes_no_calls() {
        let gw = Arc::new(StaticGateway::new(fixture()));
        let bundle = aggregator(gw.clone(), 500)
            .aggregate(&reqs(&[DataRequirement::None]), Some("f-1"), Some("org-1"), 6)
            .await;
        assert_eq!(bundle.context_type(), "general");
        assert!(gw.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unplannable_is_general() {
        let gw = Arc::new(StaticGateway::new(fixture()));
        let bundle = aggregator(gw.clone(), 500)
            .aggregate(&reqs(&[DataRequirement::EmissionData]), None, None, 6)
            .await;
        match bundle {
            ContextBundle::General(g) => assert_eq!(g.message, NO_DATA_REQUIRED),
            other => panic!("expected general, got {other:?}"),
        }
        assert!(gw.calls().is_empty());
    }

    #[tokio::test]
    async fn test_full_facility_context() {
        use DataRequirement::{EmissionData, FacilityBasic, ProductionData, ResourcesConfig};
        let gw = Arc::new(StaticGateway::new(fixture()));
        let bundle = aggregator(gw, 500)
            .aggregate(
                &reqs(&[FacilityBasic, EmissionData, ProductionData, ResourcesConfig]),
                Some("f-1"),
                Some("org-1"),
                6,
            )
            .await;
        let ctx = bundle.as_facility().expect("facility context");
        assert_eq!(ctx.summary.facility_name, "North Plant");
        assert!(ctx.summary.data_available);
        assert_eq!(ctx.summary.latest_total_emissions, Some(600.0));
        assert_eq!(ctx.summary.calculated_emission_intensity, Some(0.6));
        assert_eq!(ctx.summary.emission_data_points, 2);
        let resources = ctx.resources.as_ref().unwrap();
        assert_eq!(resources.resource_count, 1);
        assert_eq!(resources.consumption_summary["scope1"]["fuel"].value, 40.0);
        assert!(ctx.unavailable.is_empty());
        assert!(ctx.targets.is_none());
    }

    #[tokio::test]
    async fn test_one_failure_keeps_others() {
        use DataRequirement::{EmissionData, FacilityBasic, ProductionData};
        let gw = Arc::new(StaticGateway::new(fixture()));
        gw.inject(GatewayOp::Emissions, Fault::Error(GatewayError::Status(500)));
        let bundle = aggregator(gw, 500)
            .aggregate(
                &reqs(&[FacilityBasic, EmissionData, ProductionData]),
                Some("f-1"),
                None,
                6,
            )
            .await;
        assert_eq!(bundle.context_type(), "facility_specific");
        let ctx = bundle.as_facility().unwrap();
        assert!(ctx.facility.is_some());
        assert!(ctx.production.is_some());
        assert!(ctx.emissions.is_none());
        assert_eq!(ctx.unavailable.len(), 1);
        assert_eq!(ctx.unavailable[0].source, GatewayOp::Emissions);
        assert!(ctx.summary.calculated_emission_intensity.is_none());
    }

    #[tokio::test]
    async fn test_all_failures_is_error_context() {
        let gw = Arc::new(StaticGateway::new(fixture()));
        gw.inject(
            GatewayOp::Facility,
            Fault::Error(GatewayError::Transport("refused".into())),
        );
        gw.inject(GatewayOp::Resources, Fault::Error(GatewayError::Status(502)));
        let bundle = aggregator(gw, 500)
            .aggregate(
                &reqs(&[DataRequirement::FacilityBasic, DataRequirement::ResourcesConfig]),
                Some("f-1"),
                None,
                6,
            )
            .await;
        match bundle {
            ContextBundle::Error(e) => {
                assert_eq!(e.failures.len(), 2);
                assert_eq!(e.message, ALL_SOURCES_FAILED);
            }
            other => panic!("expected error context, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        use DataRequirement::{FacilityBasic, ProductionData};
        let gw = Arc::new(StaticGateway::new(fixture()));
        gw.inject(GatewayOp::Production, Fault::Delay(Duration::from_secs(60)));
        let bundle = aggregator(gw, 100)
            .aggregate(&reqs(&[FacilityBasic, ProductionData]), Some("f-1"), None, 6)
            .await;
        let ctx = bundle.as_facility().unwrap();
        assert!(ctx.facility.is_some());
        assert!(ctx.production.is_none());
        assert_eq!(ctx.unavailable[0].reason, GatewayError::Timeout.to_string());
    }

    #[tokio::test]
    async fn test_panicking_fetch_is_contained() {
        use DataRequirement::{EmissionData, FacilityBasic};
        let gw = Arc::new(StaticGateway::new(fixture()));
        gw.inject(GatewayOp::Emissions, Fault::Panic);
        let bundle = aggregator(gw, 500)
            .aggregate(&reqs(&[FacilityBasic, EmissionData]), Some("f-1"), None, 6)
            .await;
        let ctx = bundle.as_facility().unwrap();
        assert!(ctx.facility.is_some());
        assert_eq!(ctx.unavailable.len(), 1);
        assert!(ctx.unavailable[0].reason.contains("aborted"));
    }

    #[tokio::test]
    async fn test_organization_count() {
        let gw = Arc::new(StaticGateway::new(fixture()));
        let bundle = aggregator(gw.clone(), 500)
            .aggregate(&reqs(&[DataRequirement::OrganizationData]), None, Some("org-1"), 6)
            .await;
        let ctx = bundle.as_facility().unwrap();
        assert_eq!(ctx.organization.as_ref().unwrap().facility_count, 3);
        assert_eq!(gw.calls(), vec![GatewayOp::OrganizationFacilities]);
    }

    #[tokio::test]
    async fn test_empty_counted_sections_kept() {
        use DataRequirement::{OrganizationData, TargetsGoals};
        let gw = Arc::new(StaticGateway::new(fixture()));
        let bundle = aggregator(gw, 500)
            .aggregate(&reqs(&[TargetsGoals, OrganizationData]), None, Some("org-empty"), 6)
            .await;
        let ctx = bundle.as_facility().expect("counted sections count as data");
        assert_eq!(ctx.targets.as_ref().unwrap().target_count, 0);
        assert_eq!(ctx.organization.as_ref().unwrap().facility_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_facility_is_general() {
        use DataRequirement::{EmissionData, FacilityBasic};
        let gw = Arc::new(StaticGateway::new(fixture()));
        let bundle = aggregator(gw, 500)
            .aggregate(&reqs(&[FacilityBasic, EmissionData]), Some("f-404"), None, 6)
            .await;
        match bundle {
            ContextBundle::General(g) => assert_eq!(g.message, NO_DATA_FOUND),
            other => panic!("expected general, got {other:?}"),
        }
    }
}
