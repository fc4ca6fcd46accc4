//! Pricing data model.
//!
//! Entities, ratesheets and surge configurations are authored elsewhere; the
//! engine only reads them. Field names follow the camelCase JSON snapshot format.

use chrono::{DateTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of entity, used in `NotFound` errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Customer,
    Location,
    SubLocation,
    Venue,
    Event,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Customer => "Customer",
            EntityKind::Location => "Location",
            EntityKind::SubLocation => "SubLocation",
            EntityKind::Venue => "Venue",
            EntityKind::Event => "Event",
        };
        f.write_str(name)
    }
}

/// Hierarchy level a rule is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HierarchyLevel {
    #[serde(rename = "CUSTOMER")]
    Customer,
    #[serde(rename = "LOCATION")]
    Location,
    #[serde(rename = "SUBLOCATION")]
    SubLocation,
    #[serde(rename = "EVENT")]
    Event,
}

/// Scope of a ratesheet or surge config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliesTo {
    pub level: HierarchyLevel,
    pub entity_id: Uuid,
}

/// Half-open instant range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// Check if `[from, to]` fully covers the given range.
///
/// An inverted range (`to < from`) never covers anything.
pub fn effective_range_covers(
    from: DateTime<Utc>,
    to: Option<DateTime<Utc>>,
    range: &DateRange,
) -> bool {
    if let Some(end) = to {
        if end < from || range.end > end {
            return false;
        }
    }
    from <= range.start
}

/// Check if `[from, to]` overlaps the given range at all.
pub fn effective_range_overlaps(
    from: DateTime<Utc>,
    to: Option<DateTime<Utc>>,
    range: &DateRange,
) -> bool {
    if from >= range.end {
        return false;
    }
    match to {
        Some(end) => end >= from && end > range.start,
        None => true,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub default_hourly_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub default_hourly_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubLocation {
    pub id: Uuid,
    pub location_id: Uuid,
    #[serde(default)]
    pub venue_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub default_hourly_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
}

/// Entity an event hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum EventParent {
    #[serde(rename = "SUBLOCATION")]
    SubLocation(Uuid),
    #[serde(rename = "LOCATION")]
    Location(Uuid),
    #[serde(rename = "VENUE")]
    Venue(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub parent: EventParent,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Minutes added before `start`
    #[serde(default)]
    pub grace_period_before: Option<i64>,
    /// Minutes added after `end`
    #[serde(default)]
    pub grace_period_after: Option<i64>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub default_hourly_rate: Option<Decimal>,
}

impl Event {
    /// Event start pulled forward by the grace period
    pub fn padded_start(&self) -> DateTime<Utc> {
        self.start - chrono::Duration::minutes(self.grace_period_before.unwrap_or(0).max(0))
    }

    /// Event end pushed back by the grace period
    pub fn padded_end(&self) -> DateTime<Utc> {
        self.end + chrono::Duration::minutes(self.grace_period_after.unwrap_or(0).max(0))
    }

    /// Inclusive overlap test between the grace-padded event and a range:
    /// `start - before <= range.end && end + after >= range.start`.
    pub fn overlaps(&self, range: &DateRange) -> bool {
        self.padded_start() <= range.end && self.padded_end() >= range.start
    }
}

/// Kind of time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowType {
    AbsoluteTime,
    DurationBased,
}

/// A sub-daily (HH:MM) or booking-relative (minutes) interval with one hourly price
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub window_type: WindowType,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub start_minute: Option<i64>,
    #[serde(default)]
    pub end_minute: Option<i64>,
    #[serde(with = "rust_decimal::serde::str")]
    pub price_per_hour: Decimal,
}

impl TimeWindow {
    pub fn absolute(start: &str, end: &str, price_per_hour: Decimal) -> Self {
        Self {
            window_type: WindowType::AbsoluteTime,
            start_time: Some(start.to_string()),
            end_time: Some(end.to_string()),
            start_minute: None,
            end_minute: None,
            price_per_hour,
        }
    }

    pub fn duration(start_minute: i64, end_minute: i64, price_per_hour: Decimal) -> Self {
        Self {
            window_type: WindowType::DurationBased,
            start_time: None,
            end_time: None,
            start_minute: Some(start_minute),
            end_minute: Some(end_minute),
            price_per_hour,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A named, priority-ordered pricing rule scoped to one hierarchy level
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ratesheet {
    pub id: Uuid,
    pub name: String,
    pub applies_to: AppliesTo,
    /// Higher wins
    pub priority: i32,
    pub effective_from: DateTime<Utc>,
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub time_windows: Vec<TimeWindow>,
}

impl Ratesheet {
    /// Check if the rule is active and its effective range covers the range
    pub fn is_effective_over(&self, range: &DateRange) -> bool {
        self.is_active && effective_range_covers(self.effective_from, self.effective_to, range)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemandSupplyParams {
    pub current_demand: f64,
    pub current_supply: f64,
    pub historical_avg_pressure: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgeParams {
    pub alpha: f64,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
    pub ema_alpha: f64,
}

impl SurgeParams {
    /// Returns a description of the problem when the bounds are unusable
    pub fn validate(&self) -> Result<(), String> {
        if !self.min_multiplier.is_finite() || !self.max_multiplier.is_finite() {
            return Err("multiplier bounds must be finite".to_string());
        }
        if self.min_multiplier > self.max_multiplier {
            return Err(format!(
                "minMultiplier {} exceeds maxMultiplier {}",
                self.min_multiplier, self.max_multiplier
            ));
        }
        Ok(())
    }
}

/// Day-of-week and HH:MM constraint on a surge config.
///
/// `startTime > endTime` wraps past midnight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgeWindow {
    /// Empty means every day
    #[serde(default)]
    pub days_of_week: Vec<Weekday>,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgeConfig {
    pub id: Uuid,
    pub name: String,
    pub applies_to: AppliesTo,
    pub priority: i32,
    pub demand_supply_params: DemandSupplyParams,
    pub surge_params: SurgeParams,
    pub effective_from: DateTime<Utc>,
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub time_windows: Vec<SurgeWindow>,
}

impl SurgeConfig {
    pub fn is_effective_over(&self, range: &DateRange) -> bool {
        self.is_active && effective_range_covers(self.effective_from, self.effective_to, range)
    }
}
