//! Hourly pricing engine.
//!
//! Pure computation over an already-fetched snapshot: identical inputs give
//! identical results. The booking interval is cut at local wall-clock hour
//! boundaries; each segment runs candidate resolution, priority selection and
//! surge, and lands in the totals and the decision log.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use super::calculators::{apply_surge, hours_between, segment_total};
use super::hierarchy::HierarchyChain;
use super::models::{DateRange, Event, Ratesheet, SurgeConfig};
use super::requests::PricingOptions;
use super::resolver::{
    collect_candidates, resolve_base, select_winner, BasePrice, Candidate, PriceSource,
    ResolverContext,
};
use super::responses::{
    CandidateSummary, DecisionLogEntry, HourlySegment, PricingIssue, PricingResult, RuleRef,
    UnresolvedSegment,
};
use super::services::PricingError;
use super::surge::{prepare_surges, select_surge, DEFAULT_SURGE_PRIORITY};

/// Everything one resolution pass needs
#[derive(Debug, Clone)]
pub struct PricingInput {
    pub chain: HierarchyChain,
    /// Events eligible for event-level rules
    pub events: Vec<Event>,
    /// Rules in declaration order
    pub ratesheets: Vec<Ratesheet>,
    pub surge_configs: Vec<SurgeConfig>,
    /// Smoothed pressure per surge config from the previous pass
    pub previous_pressures: HashMap<Uuid, f64>,
    pub timezone: Tz,
    pub currency: String,
    pub options: PricingOptions,
    pub surge_priority: i32,
}

impl PricingInput {
    pub fn new(chain: HierarchyChain, timezone: Tz, currency: impl Into<String>) -> Self {
        Self {
            chain,
            events: Vec::new(),
            ratesheets: Vec::new(),
            surge_configs: Vec::new(),
            previous_pressures: HashMap::new(),
            timezone,
            currency: currency.into(),
            options: PricingOptions::default(),
            surge_priority: DEFAULT_SURGE_PRIORITY,
        }
    }
}

/// First local wall-clock hour boundary strictly after `instant`
fn next_hour_boundary(instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local = instant.with_timezone(&tz);
    let into_hour = i64::from(local.minute()) * 60 + i64::from(local.second());
    let nanos = i64::from(local.nanosecond().min(999_999_999));
    instant + Duration::seconds(3600 - into_hour) - Duration::nanoseconds(nanos)
}

/// Cut `[start, end)` at local hour boundaries
pub fn hourly_segments(range: &DateRange, tz: Tz) -> Vec<DateRange> {
    let mut segments = Vec::new();
    let mut cursor = range.start;
    while cursor < range.end {
        let next = next_hour_boundary(cursor, tz).min(range.end);
        segments.push(DateRange::new(cursor, next));
        cursor = next;
    }
    segments
}

fn base_label(base: &BasePrice) -> String {
    match base {
        BasePrice::Ratesheet(m) => m.name.clone(),
        BasePrice::DefaultRate(d) => format!("default rate ({:?})", d.level),
    }
}

fn record_issue(issues: &mut Vec<PricingIssue>, issue: &PricingIssue) {
    if issues.contains(issue) {
        return;
    }
    match issue {
        PricingIssue::InvalidWindow { ratesheet_id, window_index, reason } => {
            warn!(%ratesheet_id, window_index, %reason, "Ratesheet window never matches");
        }
        PricingIssue::InvalidSurgeWindow { surge_config_id, window_index, reason } => {
            warn!(%surge_config_id, window_index, %reason, "Surge window never matches");
        }
        PricingIssue::UnresolvablePricing { start, end } => {
            warn!(%start, %end, "No ratesheet or positive default rate for segment");
        }
        PricingIssue::InvalidSurgeConfig { .. } | PricingIssue::SurgeSupplyZero { .. } => {}
    }
    issues.push(issue.clone());
}

/// Price `[range.start, range.end)` for the input's SubLocation
pub fn price_interval(input: &PricingInput, range: DateRange) -> Result<PricingResult, PricingError> {
    if range.end <= range.start {
        return Err(PricingError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }

    let tz = input.timezone;
    let ctx = ResolverContext {
        chain: &input.chain,
        events: &input.events,
        timezone: tz,
        reference: input.options.duration_reference(range.start),
        pinned_event: input.options.event_id,
    };

    let mut issues = Vec::new();
    let mut surge_issues = Vec::new();
    let prepared = prepare_surges(
        &input.surge_configs,
        &input.chain,
        &input.previous_pressures,
        &mut surge_issues,
    );
    for issue in &surge_issues {
        record_issue(&mut issues, issue);
    }

    let mut segments = Vec::new();
    let mut unresolved = Vec::new();
    let mut decision_log = Vec::new();
    let mut total_price = Decimal::ZERO;
    let mut total_hours = Decimal::ZERO;

    for segment in hourly_segments(&range, tz) {
        let mut segment_issues = Vec::new();
        let mut candidates = collect_candidates(&input.ratesheets, &ctx, &segment, &mut segment_issues);
        let base = resolve_base(&candidates, &input.chain);

        if let Some(surge) = select_surge(&prepared, &segment, tz, input.surge_priority, &mut segment_issues) {
            if surge.supply_zero {
                segment_issues.push(PricingIssue::SurgeSupplyZero {
                    surge_config_id: surge.config_id,
                });
            }
            candidates.push(Candidate::Surge(surge));
        }
        let winner = select_winner(&candidates);
        let duration_hours = hours_between(segment.start, segment.end);

        let mut entry = DecisionLogEntry {
            start_time: segment.start,
            end_time: segment.end,
            candidate_count: candidates.len(),
            candidates: candidates.iter().map(CandidateSummary::from).collect(),
            selected_rule: None,
            price_per_hour: None,
            source: None,
            issues: Vec::new(),
        };

        match base {
            Some(base) => {
                let base_price = base.price_per_hour();
                let (price_per_hour, source, selected_rule, surge) = match winner {
                    Some(Candidate::Surge(s)) => (
                        apply_surge(base_price, s.factor),
                        PriceSource::Surge,
                        s.name.clone(),
                        Some((s.factor, s.config_id)),
                    ),
                    _ => (base_price, base.source(), base_label(&base), None),
                };
                let total = segment_total(price_per_hour, segment.start, segment.end);

                debug!(
                    start = %segment.start,
                    candidates = candidates.len(),
                    ?source,
                    %price_per_hour,
                    "Priced segment"
                );

                entry.selected_rule = Some(selected_rule);
                entry.price_per_hour = Some(price_per_hour);
                entry.source = Some(source);

                total_price += total;
                total_hours += duration_hours;
                segments.push(HourlySegment {
                    start_time: segment.start,
                    end_time: segment.end,
                    duration_hours,
                    price_per_hour,
                    total_price: total,
                    source,
                    level: base.level(),
                    matched_rule: RuleRef::from(&base),
                    base_price_per_hour: base_price,
                    surge_factor: surge.map(|(factor, _)| factor),
                    surge_config_id: surge.map(|(_, id)| id),
                });
            }
            None => {
                segment_issues.push(PricingIssue::UnresolvablePricing {
                    start: segment.start,
                    end: segment.end,
                });
                unresolved.push(UnresolvedSegment {
                    start_time: segment.start,
                    end_time: segment.end,
                    duration_hours,
                });
            }
        }

        for issue in &segment_issues {
            record_issue(&mut issues, issue);
        }
        entry.issues = segment_issues;
        decision_log.push(entry);
    }

    Ok(PricingResult {
        sub_location_id: input.chain.sub_location.id,
        currency: input.currency.clone(),
        timezone: tz.name().to_string(),
        is_event_booking: input.options.is_event_booking,
        total_price,
        total_hours,
        segments,
        unresolved,
        decision_log,
        surge_states: prepared.iter().map(|p| p.state()).collect(),
        issues,
    })
}
