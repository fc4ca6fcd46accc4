//! Pricing results and the hourly audit trail.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::models::HierarchyLevel;
use super::resolver::{BasePrice, Candidate, PriceSource};
use super::surge::SurgeState;

/// Non-fatal condition found while pricing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum PricingIssue {
    InvalidWindow {
        ratesheet_id: Uuid,
        window_index: usize,
        reason: String,
    },
    InvalidSurgeWindow {
        surge_config_id: Uuid,
        window_index: usize,
        reason: String,
    },
    InvalidSurgeConfig {
        surge_config_id: Uuid,
        reason: String,
    },
    SurgeSupplyZero {
        surge_config_id: Uuid,
    },
    UnresolvablePricing {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Kind of rule a segment price refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    Ratesheet,
    DefaultRate,
    SurgeConfig,
}

/// Reference to the rule or entity that produced a price
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRef {
    pub kind: RuleKind,
    pub id: Uuid,
    pub name: Option<String>,
}

impl From<&BasePrice> for RuleRef {
    fn from(base: &BasePrice) -> Self {
        match base {
            BasePrice::Ratesheet(m) => RuleRef {
                kind: RuleKind::Ratesheet,
                id: m.ratesheet_id,
                name: Some(m.name.clone()),
            },
            BasePrice::DefaultRate(d) => RuleRef {
                kind: RuleKind::DefaultRate,
                id: d.entity_id,
                name: None,
            },
        }
    }
}

/// A priced hourly segment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlySegment {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::str")]
    pub duration_hours: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_per_hour: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_price: Decimal,
    pub source: PriceSource,
    /// Level of the base price (the matched rule or default rate)
    pub level: HierarchyLevel,
    /// The base rule, also for surged segments
    pub matched_rule: RuleRef,
    #[serde(with = "rust_decimal::serde::str")]
    pub base_price_per_hour: Decimal,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub surge_factor: Option<Decimal>,
    pub surge_config_id: Option<Uuid>,
}

/// A segment with no matching rule and no positive default rate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedSegment {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::str")]
    pub duration_hours: Decimal,
}

/// One contender as recorded in the decision log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    pub source: PriceSource,
    pub id: Uuid,
    pub name: String,
    pub level: HierarchyLevel,
    pub priority: i32,
    /// Hourly price for ratesheets, factor for surge
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
}

impl From<&Candidate> for CandidateSummary {
    fn from(candidate: &Candidate) -> Self {
        let value = match candidate {
            Candidate::Ratesheet(m) => m.price_per_hour,
            Candidate::Surge(s) => s.factor,
        };
        CandidateSummary {
            source: candidate.source(),
            id: candidate.id(),
            name: candidate.name().to_string(),
            level: candidate.level(),
            priority: candidate.priority(),
            value,
        }
    }
}

/// Why a segment got its price
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionLogEntry {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub candidate_count: usize,
    pub candidates: Vec<CandidateSummary>,
    pub selected_rule: Option<String>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub price_per_hour: Option<Decimal>,
    pub source: Option<PriceSource>,
    pub issues: Vec<PricingIssue>,
}

/// Result of pricing a booking interval
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResult {
    pub sub_location_id: Uuid,
    pub currency: String,
    pub timezone: String,
    pub is_event_booking: bool,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_hours: Decimal,
    pub segments: Vec<HourlySegment>,
    pub unresolved: Vec<UnresolvedSegment>,
    pub decision_log: Vec<DecisionLogEntry>,
    pub surge_states: Vec<SurgeState>,
    /// De-duplicated across segments
    pub issues: Vec<PricingIssue>,
}

impl PricingResult {
    /// True when every segment got a price
    pub fn is_fully_priced(&self) -> bool {
        self.unresolved.is_empty()
    }
}
