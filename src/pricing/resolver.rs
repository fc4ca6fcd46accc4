//! Candidate resolution and priority selection for one segment.
//!
//! Candidates are gathered in ratesheet declaration order. The winner is the
//! highest priority; among equal priorities the first one found wins. With no
//! candidate the default rate cascades SubLocation -> Location -> Customer.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::hierarchy::HierarchyChain;
use super::models::{DateRange, Event, HierarchyLevel, Ratesheet};
use super::responses::PricingIssue;
use super::surge::SurgeMatch;
use super::windows::match_window;

/// Where an hourly price came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    Ratesheet,
    DefaultRate,
    Surge,
}

/// A ratesheet with a window matching the segment
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub ratesheet_id: Uuid,
    pub name: String,
    pub level: HierarchyLevel,
    pub entity_id: Uuid,
    pub priority: i32,
    pub price_per_hour: Decimal,
    /// Index of the first matching window
    pub window_index: usize,
}

/// Fallback default rate and the level it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultRate {
    pub level: HierarchyLevel,
    pub entity_id: Uuid,
    pub rate: Decimal,
}

/// One contender for a segment
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    Ratesheet(RuleMatch),
    Surge(SurgeMatch),
}

impl Candidate {
    pub fn priority(&self) -> i32 {
        match self {
            Candidate::Ratesheet(m) => m.priority,
            Candidate::Surge(s) => s.priority,
        }
    }

    pub fn source(&self) -> PriceSource {
        match self {
            Candidate::Ratesheet(_) => PriceSource::Ratesheet,
            Candidate::Surge(_) => PriceSource::Surge,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Candidate::Ratesheet(m) => m.ratesheet_id,
            Candidate::Surge(s) => s.config_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Candidate::Ratesheet(m) => &m.name,
            Candidate::Surge(s) => &s.name,
        }
    }

    pub fn level(&self) -> HierarchyLevel {
        match self {
            Candidate::Ratesheet(m) => m.level,
            Candidate::Surge(s) => s.level,
        }
    }
}

/// Price the segment would have without surge
#[derive(Debug, Clone, PartialEq)]
pub enum BasePrice {
    Ratesheet(RuleMatch),
    DefaultRate(DefaultRate),
}

impl BasePrice {
    pub fn price_per_hour(&self) -> Decimal {
        match self {
            BasePrice::Ratesheet(m) => m.price_per_hour,
            BasePrice::DefaultRate(d) => d.rate,
        }
    }

    pub fn level(&self) -> HierarchyLevel {
        match self {
            BasePrice::Ratesheet(m) => m.level,
            BasePrice::DefaultRate(d) => d.level,
        }
    }

    pub fn source(&self) -> PriceSource {
        match self {
            BasePrice::Ratesheet(_) => PriceSource::Ratesheet,
            BasePrice::DefaultRate(_) => PriceSource::DefaultRate,
        }
    }
}

/// Per-resolution inputs shared by every segment
#[derive(Debug, Clone, Copy)]
pub struct ResolverContext<'a> {
    pub chain: &'a HierarchyChain,
    pub events: &'a [Event],
    pub timezone: Tz,
    /// Duration-window reference; `None` disables DURATION_BASED windows
    pub reference: Option<DateTime<Utc>>,
    /// Only this event's rules are eligible when set
    pub pinned_event: Option<Uuid>,
}

impl ResolverContext<'_> {
    /// Whether a rule's scope applies to the segment
    fn scope_applies(&self, sheet: &Ratesheet, segment: &DateRange) -> bool {
        let scope = sheet.applies_to;
        match scope.level {
            HierarchyLevel::Event => {
                if self.pinned_event.is_some_and(|pinned| pinned != scope.entity_id) {
                    return false;
                }
                self.events
                    .iter()
                    .any(|e| e.id == scope.entity_id && e.overlaps(segment))
            }
            level => self.chain.contains(level, scope.entity_id),
        }
    }
}

/// Gather every ratesheet with a matching window for the segment.
///
/// Invalid windows are skipped and reported in `issues`.
pub fn collect_candidates(
    ratesheets: &[Ratesheet],
    ctx: &ResolverContext<'_>,
    segment: &DateRange,
    issues: &mut Vec<PricingIssue>,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for sheet in ratesheets {
        if !ctx.scope_applies(sheet, segment) || !sheet.is_effective_over(segment) {
            continue;
        }

        for (index, window) in sheet.time_windows.iter().enumerate() {
            match match_window(window, segment.start, ctx.timezone, ctx.reference) {
                Ok(Some(price_per_hour)) => {
                    candidates.push(Candidate::Ratesheet(RuleMatch {
                        ratesheet_id: sheet.id,
                        name: sheet.name.clone(),
                        level: sheet.applies_to.level,
                        entity_id: sheet.applies_to.entity_id,
                        priority: sheet.priority,
                        price_per_hour,
                        window_index: index,
                    }));
                    // first matching window wins within a rule
                    break;
                }
                Ok(None) => {}
                Err(invalid) => issues.push(PricingIssue::InvalidWindow {
                    ratesheet_id: sheet.id,
                    window_index: index,
                    reason: invalid.reason,
                }),
            }
        }
    }

    candidates
}

/// Highest priority wins; ties go to the earliest candidate
pub fn select_winner<'a, I>(candidates: I) -> Option<&'a Candidate>
where
    I: IntoIterator<Item = &'a Candidate>,
{
    let mut winner: Option<&Candidate> = None;
    for candidate in candidates {
        if winner.map_or(true, |w| candidate.priority() > w.priority()) {
            winner = Some(candidate);
        }
    }
    winner
}

/// First strictly positive default rate, most specific level first
pub fn default_rate(chain: &HierarchyChain) -> Option<DefaultRate> {
    chain
        .default_rate_cascade()
        .into_iter()
        .find_map(|(level, entity_id, rate)| {
            rate.filter(|r| *r > Decimal::ZERO).map(|rate| DefaultRate {
                level,
                entity_id,
                rate,
            })
        })
}

/// Base price for a segment from its ratesheet candidates, ignoring surge
pub fn resolve_base(candidates: &[Candidate], chain: &HierarchyChain) -> Option<BasePrice> {
    let ratesheet_winner = select_winner(
        candidates
            .iter()
            .filter(|c| matches!(c, Candidate::Ratesheet(_))),
    );

    match ratesheet_winner {
        Some(Candidate::Ratesheet(m)) => Some(BasePrice::Ratesheet(m.clone())),
        _ => default_rate(chain).map(BasePrice::DefaultRate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::models::{
        AppliesTo, Customer, EventParent, Location, SubLocation, TimeWindow,
    };
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 7, h, 0, 0).unwrap()
    }

    fn hour(h: u32) -> DateRange {
        DateRange::new(at(h), at(h + 1))
    }

    fn chain(sub_rate: Option<Decimal>, loc_rate: Option<Decimal>, cust_rate: Option<Decimal>) -> HierarchyChain {
        let customer_id = Uuid::new_v4();
        let location_id = Uuid::new_v4();
        HierarchyChain {
            sub_location: SubLocation {
                id: Uuid::new_v4(),
                location_id,
                venue_id: None,
                name: "Studio".to_string(),
                timezone: None,
                default_hourly_rate: sub_rate,
            },
            location: Location {
                id: location_id,
                customer_id,
                name: "Main".to_string(),
                timezone: None,
                default_hourly_rate: loc_rate,
            },
            customer: Customer {
                id: customer_id,
                name: "Acme".to_string(),
                timezone: None,
                currency: None,
                default_hourly_rate: cust_rate,
            },
        }
    }

    fn sheet(name: &str, level: HierarchyLevel, entity_id: Uuid, priority: i32, windows: Vec<TimeWindow>) -> Ratesheet {
        Ratesheet {
            id: Uuid::new_v4(),
            name: name.to_string(),
            applies_to: AppliesTo { level, entity_id },
            priority,
            effective_from: at(0),
            effective_to: None,
            is_active: true,
            time_windows: windows,
        }
    }

    fn ctx(chain: &HierarchyChain) -> ResolverContext<'_> {
        ResolverContext {
            chain,
            events: &[],
            timezone: Tz::UTC,
            reference: None,
            pinned_event: None,
        }
    }

    fn names(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.name()).collect()
    }

    // ==================== collect_candidates tests ====================

    #[test]
    fn test_collects_across_levels_in_declaration_order() {
        let chain = chain(None, None, None);
        let all_day = || vec![TimeWindow::absolute("00:00", "24:00", dec!(10))];
        let sheets = vec![
            sheet("customer", HierarchyLevel::Customer, chain.customer.id, 100, all_day()),
            sheet("sub", HierarchyLevel::SubLocation, chain.sub_location.id, 300, all_day()),
            sheet("foreign", HierarchyLevel::SubLocation, Uuid::new_v4(), 900, all_day()),
            sheet("location", HierarchyLevel::Location, chain.location.id, 200, all_day()),
        ];
        let mut issues = vec![];
        let candidates = collect_candidates(&sheets, &ctx(&chain), &hour(9), &mut issues);
        assert_eq!(names(&candidates), vec!["customer", "sub", "location"]);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_inactive_and_out_of_range_rules_are_dropped() {
        let chain = chain(None, None, None);
        let windows = vec![TimeWindow::absolute("00:00", "24:00", dec!(10))];
        let mut inactive = sheet("inactive", HierarchyLevel::SubLocation, chain.sub_location.id, 1, windows.clone());
        inactive.is_active = false;
        let mut ended = sheet("ended", HierarchyLevel::SubLocation, chain.sub_location.id, 1, windows.clone());
        ended.effective_to = Some(at(9));
        let mut mid_hour = sheet("mid", HierarchyLevel::SubLocation, chain.sub_location.id, 1, windows);
        mid_hour.effective_from = at(9) + chrono::Duration::minutes(30);

        let mut issues = vec![];
        let candidates = collect_candidates(&[inactive, ended, mid_hour], &ctx(&chain), &hour(9), &mut issues);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_first_matching_window_of_a_rule_wins() {
        let chain = chain(None, None, None);
        let sheets = vec![sheet(
            "overlapping",
            HierarchyLevel::SubLocation,
            chain.sub_location.id,
            500,
            vec![
                TimeWindow::absolute("18:00", "20:00", dec!(99)),
                TimeWindow::absolute("08:00", "12:00", dec!(30)),
                TimeWindow::absolute("09:00", "10:00", dec!(45)),
            ],
        )];
        let mut issues = vec![];
        let candidates = collect_candidates(&sheets, &ctx(&chain), &hour(9), &mut issues);
        assert_eq!(candidates.len(), 1);
        match &candidates[0] {
            Candidate::Ratesheet(m) => {
                assert_eq!(m.price_per_hour, dec!(30));
                assert_eq!(m.window_index, 1);
            }
            other => panic!("unexpected candidate {other:?}"),
        }
    }

    #[test]
    fn test_invalid_window_reported_and_skipped() {
        let chain = chain(None, None, None);
        let sheets = vec![sheet(
            "broken",
            HierarchyLevel::SubLocation,
            chain.sub_location.id,
            500,
            vec![
                TimeWindow::absolute("12:00", "08:00", dec!(99)),
                TimeWindow::absolute("08:00", "12:00", dec!(30)),
            ],
        )];
        let mut issues = vec![];
        let candidates = collect_candidates(&sheets, &ctx(&chain), &hour(9), &mut issues);
        assert_eq!(candidates.len(), 1);
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], PricingIssue::InvalidWindow { window_index: 0, .. }));
    }

    #[test]
    fn test_event_rules_need_overlapping_event() {
        let chain = chain(None, None, None);
        let event = Event {
            id: Uuid::new_v4(),
            name: "Concert".to_string(),
            parent: EventParent::SubLocation(chain.sub_location.id),
            start: at(19),
            end: at(22),
            grace_period_before: Some(60),
            grace_period_after: None,
            default_hourly_rate: None,
        };
        let sheets = vec![sheet(
            "concert",
            HierarchyLevel::Event,
            event.id,
            800,
            vec![TimeWindow::absolute("00:00", "24:00", dec!(120))],
        )];
        let events = [event.clone()];
        let context = ResolverContext {
            events: &events,
            ..ctx(&chain)
        };
        let mut issues = vec![];
        // 17:00-18:00 touches the padded start at 18:00
        assert_eq!(collect_candidates(&sheets, &context, &hour(17), &mut issues).len(), 1);
        assert!(collect_candidates(&sheets, &context, &hour(15), &mut issues).is_empty());

        let pinned_elsewhere = ResolverContext {
            pinned_event: Some(Uuid::new_v4()),
            ..context
        };
        assert!(collect_candidates(&sheets, &pinned_elsewhere, &hour(20), &mut issues).is_empty());
    }

    #[test]
    fn test_duration_windows_only_with_reference() {
        let chain = chain(None, None, None);
        let sheets = vec![sheet(
            "first-two-hours",
            HierarchyLevel::SubLocation,
            chain.sub_location.id,
            600,
            vec![TimeWindow::duration(0, 120, dec!(25))],
        )];
        let mut issues = vec![];
        assert!(collect_candidates(&sheets, &ctx(&chain), &hour(9), &mut issues).is_empty());

        let with_reference = ResolverContext {
            reference: Some(at(8)),
            ..ctx(&chain)
        };
        assert_eq!(collect_candidates(&sheets, &with_reference, &hour(9), &mut issues).len(), 1);
        assert!(collect_candidates(&sheets, &with_reference, &hour(10), &mut issues).is_empty());
    }

    // ==================== select_winner tests ====================

    fn rule(name: &str, priority: i32) -> Candidate {
        Candidate::Ratesheet(RuleMatch {
            ratesheet_id: Uuid::new_v4(),
            name: name.to_string(),
            level: HierarchyLevel::SubLocation,
            entity_id: Uuid::nil(),
            priority,
            price_per_hour: dec!(10),
            window_index: 0,
        })
    }

    #[test]
    fn test_tie_goes_to_first_declared() {
        let candidates = vec![rule("B", 500), rule("A", 500)];
        assert_eq!(select_winner(&candidates).map(|c| c.name()), Some("B"));
    }

    #[test]
    fn test_raising_loser_priority_flips_winner() {
        let mut candidates = vec![rule("low", 100), rule("high", 700)];
        assert_eq!(select_winner(&candidates).map(|c| c.name()), Some("high"));
        assert_eq!(select_winner(&candidates).map(|c| c.name()), Some("high"));
        candidates[0] = rule("low", 701);
        assert_eq!(select_winner(&candidates).map(|c| c.name()), Some("low"));
    }

    #[test]
    fn test_select_winner_empty() {
        let none: Vec<Candidate> = vec![];
        assert!(select_winner(&none).is_none());
    }

    // ==================== default cascade tests ====================

    #[test]
    fn test_sub_location_default_preempts_location() {
        let chain = chain(Some(dec!(20)), Some(dec!(35)), Some(dec!(50)));
        let rate = default_rate(&chain).unwrap();
        assert_eq!(rate.level, HierarchyLevel::SubLocation);
        assert_eq!(rate.rate, dec!(20));
    }

    #[test]
    fn test_cascade_skips_non_positive_rates() {
        let chain = chain(Some(dec!(0)), None, Some(dec!(50)));
        let rate = default_rate(&chain).unwrap();
        assert_eq!(rate.level, HierarchyLevel::Customer);
        assert_eq!(rate.entity_id, chain.customer.id);
    }

    #[test]
    fn test_cascade_unresolvable() {
        let chain = chain(Some(dec!(-5)), Some(dec!(0)), None);
        assert!(default_rate(&chain).is_none());
        assert!(resolve_base(&[], &chain).is_none());
    }

    #[test]
    fn test_resolve_base_prefers_ratesheet_over_default() {
        let chain = chain(Some(dec!(20)), None, None);
        let base = resolve_base(&[rule("A", 1)], &chain).unwrap();
        assert_eq!(base.source(), PriceSource::Ratesheet);
        let fallback = resolve_base(&[], &chain).unwrap();
        assert_eq!(fallback.source(), PriceSource::DefaultRate);
        assert_eq!(fallback.price_per_hour(), dec!(20));
    }
}
