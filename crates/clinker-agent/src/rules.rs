//! Declarative question-category rules.
//!
//! Each category carries its case-insensitive matchers, a weight, and the
//! data requirements it implies. Table order is significant: it breaks
//! scoring ties in favor of the earlier category.

use regex::Regex;

use crate::types::{DataRequirement, Requirements};

use DataRequirement::{
    EmissionData, FacilityBasic, HistoricalTrends, IndustryBenchmarks, OrganizationData,
    ProductionData, ResourcesConfig, TargetsGoals,
};

/// One question category.
pub struct CategoryRule {
    pub name: &'static str,
    pub patterns: Vec<Regex>,
    pub weight: f64,
    pub requirements: Requirements,
}

impl CategoryRule {
    /// Compile a rule from pattern strings. Patterns are forced case-insensitive.
    pub fn new(
        name: &'static str,
        weight: f64,
        requirements: &[DataRequirement],
        patterns: &[&str],
    ) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name,
            patterns,
            weight,
            requirements: requirements.iter().copied().collect(),
        })
    }

    /// Number of distinct patterns that match somewhere in `text`.
    pub fn match_count(&self, text: &str) -> usize {
        self.patterns.iter().filter(|p| p.is_match(text)).count()
    }

    pub fn score(&self, text: &str) -> f64 {
        self.match_count(text) as f64 * self.weight
    }
}

/// Ordered collection of category rules.
pub struct RuleTable {
    rules: Vec<CategoryRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleTable {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn get(&self, name: &str) -> Option<&CategoryRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// The cement-industry rule set.
    pub fn standard() -> Self {
        let specs: Vec<(&'static str, f64, Vec<DataRequirement>, Vec<&'static str>)> = vec![
            // =================================================================
            // Facility performance
            // =================================================================
            (
                "performance",
                0.9,
                vec![FacilityBasic, EmissionData, ProductionData],
                vec![
                    r"\b(performance|performing|metrics|efficiency|intensity)\b",
                    r"\b(how\s+(are\s+)?(we|am\s+I|is\s+my)\s+(doing|performing))",
                    r"\b(what\s+(is|are)\s+(my|our)\s+(current|latest))",
                    r"\b(show\s+(me\s+)?(my|our)\s+(performance|metrics|data))",
                ],
            ),
            (
                "facility_state",
                0.95,
                vec![
                    FacilityBasic,
                    EmissionData,
                    ProductionData,
                    TargetsGoals,
                    ResourcesConfig,
                ],
                vec![
                    r"\b(current\s+state|facility.*state|state.*facility)\b",
                    r"\b(overview|summary|status|current\s+status)\b",
                    r"\b(what.*my\s+facility|how.*my\s+facility)\b",
                    r"\b(facility.*current|current.*facility)\b",
                    r"\b(comprehensive|complete|full)\s+(view|picture|assessment)\b",
                ],
            ),
            // =================================================================
            // Emissions and production
            // =================================================================
            (
                "emissions",
                0.95,
                vec![FacilityBasic, EmissionData, HistoricalTrends],
                vec![
                    // bare "emission" substring, so every mention of it scores
                    r"(emission|\bcarbon\b|\bco2\b|\bgreenhouse\s+gas\b)",
                    r"\b(scope\s+[123]|emission\s+intensity|carbon\s+footprint)\b",
                    r"\b(reduce\s+emissions|emission\s+reduction|decarboniz)",
                ],
            ),
            (
                "production",
                0.9,
                vec![FacilityBasic, ProductionData, HistoricalTrends],
                vec![
                    r"\b(production|output|cement\s+production|clinker|capacity)\b",
                    r"\b(tons?\s+(of\s+)?cement|monthly\s+production|annual\s+production)\b",
                    r"\b(utilization|capacity\s+utilization|production\s+efficiency)\b",
                ],
            ),
            // =================================================================
            // Targets and benchmarking
            // =================================================================
            (
                "targets",
                0.9,
                vec![FacilityBasic, TargetsGoals, EmissionData],
                vec![
                    r"\b(target|targets|goal|goals|objective|commitment)\b",
                    r"\b(net\s+zero|carbon\s+neutral|sustainability\s+target)\b",
                    r"\b(progress\s+towards|achievement|meeting\s+targets)\b",
                    r"\b(2030|2040|2050)\b",
                    r"\b(what.*targets|which.*targets|my.*targets|our.*targets)\b",
                    r"\b(facility.*targets|target.*facility|targets.*taken|targets.*set)\b",
                    r"\b(baseline|target\s+value|reduction\s+target|efficiency\s+target)\b",
                    r"\b(suggest.*targets|recommend.*targets|industry.*standards?)\b",
                ],
            ),
            (
                "benchmarking",
                0.8,
                vec![FacilityBasic, EmissionData, IndustryBenchmarks],
                vec![
                    r"\b(benchmark|compare|comparison|industry\s+average)\b",
                    r"\b(how\s+do\s+(we|I)\s+compare|against\s+peers|vs\s+industry)\b",
                    r"\b(best\s+practice|leading|top\s+performer)\b",
                ],
            ),
            // =================================================================
            // Fuels and resources
            // =================================================================
            (
                "alternative_fuels",
                0.9,
                vec![FacilityBasic, ResourcesConfig, EmissionData],
                vec![
                    r"\b(alternative\s+fuel|alt\s+fuel|biomass|RDF|refuse\s+derived)\b",
                    r"\b(waste\s+fuel|fuel\s+substitution|fuel\s+mix)\b",
                    r"\b(thermal\s+substitution|tsr|fuel\s+replacement)\b",
                    r"\b(what.*fuel|which.*fuel|fuel.*should|recommend.*fuel)\b",
                ],
            ),
            (
                "resources",
                0.8,
                vec![FacilityBasic, ResourcesConfig],
                vec![
                    r"\b(equipment|kiln|mill|resources|configuration)\b",
                    r"\b(machinery|plant\s+setup|facility\s+configuration)\b",
                    r"\b(what\s+equipment|available\s+resources)\b",
                    r"\b(consumption|fuel\s+consumption|energy\s+consumption|resource\s+usage)\b",
                    r"\b(current\s+state|facility\s+resources|resource\s+breakdown)\b",
                    r"\b(what.*consuming|how\s+much.*using|usage\s+patterns)\b",
                ],
            ),
            // =================================================================
            // Organization and general knowledge
            // =================================================================
            (
                "organization",
                0.9,
                vec![OrganizationData],
                vec![
                    r"\b(how\s+many\s+facilities|number\s+of\s+facilities|list\s+(of\s+)?facilities)\b",
                    r"\b(my\s+facilities|our\s+facilities|all\s+(my|our)\s+facilities)\b",
                    r"\b(facilities\s+(do\s+)?(i|we)\s+have|organization\s+overview)\b",
                    r"\b(show\s+(me\s+)?(my|our)\s+facilities|facility\s+list)\b",
                    r"\b(what\s+facilities|which\s+facilities)\b",
                ],
            ),
            (
                "general",
                0.7,
                vec![DataRequirement::None],
                vec![
                    r"\b(what\s+is|define|explain|tell\s+me\s+about)\b",
                    r"\b(how\s+does.*work|manufacturing\s+process|industry\s+standard)\b",
                    r"\b(best\s+practices|guidelines|recommendations)\b",
                ],
            ),
        ];

        let rules = specs
            .into_iter()
            .map(|(name, weight, reqs, patterns)| {
                CategoryRule::new(name, weight, &reqs, &patterns).expect("Invalid category regex")
            })
            .collect();
        Self { rules }
    }
}
