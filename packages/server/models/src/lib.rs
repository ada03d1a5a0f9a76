#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the water map server.
//!
//! Envelopes are serialized as camelCase JSON. Query parameters use
//! snake_case names and also accept the camelCase spelling. System rows
//! are returned exactly as they appear in the artifact, so their field
//! names follow the artifact's column names.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use water_map_system_models::{PolishedSystem, RiskLevel};

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: usize = 100;

/// Largest page size a client may request.
pub const MAX_LIMIT: usize = 10_000;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Whether an artifact is currently cached.
    pub artifact_loaded: bool,
}

/// Query parameters for the water systems endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemQueryParams {
    /// Maximum number of systems to return.
    pub limit: Option<usize>,
    /// Number of matching systems to skip.
    pub offset: Option<usize>,
    /// Case-insensitive search over PWSID, name, and address.
    pub q: Option<String>,
    /// Only systems with this risk tier, matched case-insensitively.
    #[serde(default, alias = "riskLevel", deserialize_with = "risk_level_param")]
    pub risk_level: Option<RiskLevel>,
    /// Only systems with a resolved coordinate.
    #[serde(default, alias = "mappableOnly")]
    pub mappable_only: Option<bool>,
}

fn risk_level_param<'de, D>(deserializer: D) -> Result<Option<RiskLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|value| {
            value
                .trim()
                .parse::<RiskLevel>()
                .map_err(|_| serde::de::Error::custom(format!("unknown risk level: {value}")))
        })
        .transpose()
}

impl SystemQueryParams {
    /// Page size, defaulted and capped.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }

    /// Page offset, defaulting to 0.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// One page of water systems.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSystemsPage {
    /// Systems matching the filters, before pagination.
    pub total: usize,
    /// Offset of the first returned system.
    pub offset: usize,
    /// Page size used.
    pub limit: usize,
    /// The page of systems.
    pub systems: Vec<PolishedSystem>,
}

/// Aggregate statistics over the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStats {
    /// Number of systems.
    pub total_systems: usize,
    /// Systems with at least one violation.
    pub systems_with_violations: usize,
    /// Sum of population served.
    pub population_served: u64,
    /// Systems per risk tier; every tier is present.
    pub risk_levels: BTreeMap<RiskLevel, usize>,
    /// Systems with a resolved coordinate.
    pub with_coordinates: usize,
    /// Percentage of systems without violations, 0-100. 100 for an empty
    /// artifact.
    pub compliance_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_default_and_cap() {
        let params: SystemQueryParams =
            serde_json::from_str(r#"{"limit": 50000, "risk_level": "High"}"#).unwrap();
        assert_eq!(params.limit(), MAX_LIMIT);
        assert_eq!(params.offset(), 0);
        assert_eq!(params.risk_level, Some(RiskLevel::High));
        assert_eq!(SystemQueryParams::default().limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn query_params_accept_both_spellings() {
        let snake: SystemQueryParams =
            serde_json::from_str(r#"{"risk_level": "medium", "mappable_only": true}"#).unwrap();
        assert_eq!(snake.risk_level, Some(RiskLevel::Medium));
        assert_eq!(snake.mappable_only, Some(true));

        let camel: SystemQueryParams =
            serde_json::from_str(r#"{"riskLevel": "HIGH", "mappableOnly": false}"#).unwrap();
        assert_eq!(camel.risk_level, Some(RiskLevel::High));
        assert_eq!(camel.mappable_only, Some(false));
    }

    #[test]
    fn unknown_risk_level_is_rejected() {
        assert!(serde_json::from_str::<SystemQueryParams>(r#"{"risk_level": "severe"}"#).is_err());
    }

    #[test]
    fn stats_serialize_risk_levels_by_name() {
        let stats = ApiStats {
            total_systems: 1,
            systems_with_violations: 0,
            population_served: 10,
            risk_levels: RiskLevel::all().iter().map(|l| (*l, 0)).collect(),
            with_coordinates: 1,
            compliance_rate: 100.0,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["riskLevels"]["Good"], 0);
        assert_eq!(json["complianceRate"], 100.0);
        assert_eq!(json["totalSystems"], 1);
    }
}
