//! Demand-driven surge pricing.
//!
//! The surge factor is computed once per config per resolution pass:
//!
//! ```text
//! pressure            = demand / supply
//! normalized_pressure = pressure / historical_avg_pressure
//! smoothed_pressure   = ema_alpha * normalized + (1 - ema_alpha) * previous
//! surge_factor        = clamp(1 + alpha * (smoothed - 1), min, max)
//! ```
//!
//! The smoothed pressure from the previous pass is an explicit input; the new
//! value is returned so the caller decides where it lives.

use std::collections::HashMap;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::calculators::surge_factor_to_decimal;
use super::hierarchy::HierarchyChain;
use super::models::{DateRange, DemandSupplyParams, HierarchyLevel, SurgeConfig, SurgeParams};
use super::responses::PricingIssue;
use super::windows::match_surge_window;

/// Default priority of the synthetic surge candidate
pub const DEFAULT_SURGE_PRIORITY: i32 = 1_000_000;

/// Output of the surge formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurgeComputation {
    pub factor: f64,
    /// `None` when supply was zero and there was nothing to carry forward
    pub smoothed_pressure: Option<f64>,
    pub supply_zero: bool,
}

/// Compute the clamped surge factor.
///
/// Total for any input: zero supply clamps to `max_multiplier`, a non-positive
/// historical average normalises against 1.0, and NaN clamps to
/// `min_multiplier`.
pub fn compute_surge_factor(
    demand: &DemandSupplyParams,
    params: &SurgeParams,
    previous_smoothed_pressure: Option<f64>,
) -> SurgeComputation {
    let previous = previous_smoothed_pressure.filter(|p| p.is_finite());

    if !(demand.current_supply > 0.0) || !demand.current_supply.is_finite() {
        return SurgeComputation {
            factor: params.max_multiplier,
            smoothed_pressure: previous,
            supply_zero: true,
        };
    }

    let pressure = demand.current_demand.max(0.0) / demand.current_supply;
    let baseline = if demand.historical_avg_pressure.is_finite() && demand.historical_avg_pressure > 0.0 {
        demand.historical_avg_pressure
    } else {
        1.0
    };
    let normalized = pressure / baseline;

    let ema_alpha = if params.ema_alpha.is_nan() {
        1.0
    } else {
        params.ema_alpha.clamp(0.0, 1.0)
    };
    let prior = previous.unwrap_or(normalized);
    let smoothed = ema_alpha * normalized + (1.0 - ema_alpha) * prior;

    let raw = 1.0 + params.alpha * (smoothed - 1.0);
    // f64::max drops NaN, so a NaN raw factor lands on the lower bound
    let factor = raw.max(params.min_multiplier).min(params.max_multiplier);

    SurgeComputation {
        factor,
        smoothed_pressure: smoothed.is_finite().then_some(smoothed),
        supply_zero: false,
    }
}

/// A surge config with its factor computed for this pass
#[derive(Debug, Clone)]
pub struct PreparedSurge<'a> {
    pub config: &'a SurgeConfig,
    pub computation: SurgeComputation,
    pub factor: Decimal,
}

/// Snapshot of a config's surge state after a pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgeState {
    pub surge_config_id: Uuid,
    pub surge_factor: f64,
    pub smoothed_pressure: Option<f64>,
    pub supply_zero: bool,
}

impl PreparedSurge<'_> {
    pub fn state(&self) -> SurgeState {
        SurgeState {
            surge_config_id: self.config.id,
            surge_factor: self.computation.factor,
            smoothed_pressure: self.computation.smoothed_pressure,
            supply_zero: self.computation.supply_zero,
        }
    }
}

/// The synthetic surge candidate for one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SurgeMatch {
    pub config_id: Uuid,
    pub name: String,
    pub level: HierarchyLevel,
    /// Synthetic priority, above every ratesheet
    pub priority: i32,
    /// The config's own priority, used between surge configs
    pub config_priority: i32,
    pub factor: Decimal,
    pub supply_zero: bool,
}

/// Compute factors for every usable config in the chain.
///
/// Configs with invalid multiplier bounds, or scoped outside
/// LOCATION/SUBLOCATION of this chain, are dropped.
pub fn prepare_surges<'a>(
    configs: &'a [SurgeConfig],
    chain: &HierarchyChain,
    previous: &HashMap<Uuid, f64>,
    issues: &mut Vec<PricingIssue>,
) -> Vec<PreparedSurge<'a>> {
    let mut prepared = Vec::new();

    for config in configs {
        let scope = config.applies_to;
        if !matches!(scope.level, HierarchyLevel::Location | HierarchyLevel::SubLocation)
            || !chain.contains(scope.level, scope.entity_id)
        {
            continue;
        }
        if let Err(reason) = config.surge_params.validate() {
            warn!(surge_config_id = %config.id, %reason, "Skipping invalid surge config");
            issues.push(PricingIssue::InvalidSurgeConfig {
                surge_config_id: config.id,
                reason,
            });
            continue;
        }

        let computation = compute_surge_factor(
            &config.demand_supply_params,
            &config.surge_params,
            previous.get(&config.id).copied(),
        );
        let Some(factor) = surge_factor_to_decimal(computation.factor) else {
            issues.push(PricingIssue::InvalidSurgeConfig {
                surge_config_id: config.id,
                reason: format!("non-finite surge factor {}", computation.factor),
            });
            continue;
        };
        if computation.supply_zero {
            warn!(surge_config_id = %config.id, "Surge supply is zero, clamping to max multiplier");
        }
        debug!(
            surge_config_id = %config.id,
            factor = computation.factor,
            smoothed = ?computation.smoothed_pressure,
            "Computed surge factor"
        );

        prepared.push(PreparedSurge {
            config,
            computation,
            factor,
        });
    }

    prepared
}

/// Whether a config applies to the segment's start, honoring its windows
fn applies_to_segment(
    surge: &PreparedSurge<'_>,
    segment: &DateRange,
    tz: Tz,
    issues: &mut Vec<PricingIssue>,
) -> bool {
    if !surge.config.is_effective_over(segment) {
        return false;
    }
    if surge.config.time_windows.is_empty() {
        return true;
    }

    let mut matched = false;
    for (index, window) in surge.config.time_windows.iter().enumerate() {
        match match_surge_window(window, segment.start, tz) {
            Ok(true) => {
                matched = true;
                break;
            }
            Ok(false) => {}
            Err(invalid) => issues.push(PricingIssue::InvalidSurgeWindow {
                surge_config_id: surge.config.id,
                window_index: index,
                reason: invalid.reason,
            }),
        }
    }
    matched
}

fn level_rank(level: HierarchyLevel) -> u8 {
    match level {
        HierarchyLevel::SubLocation => 1,
        _ => 0,
    }
}

/// Pick the surge for a segment: highest config priority, then SUBLOCATION
/// over LOCATION, then declaration order.
pub fn select_surge(
    prepared: &[PreparedSurge<'_>],
    segment: &DateRange,
    tz: Tz,
    synthetic_priority: i32,
    issues: &mut Vec<PricingIssue>,
) -> Option<SurgeMatch> {
    let mut best: Option<&PreparedSurge<'_>> = None;

    for surge in prepared {
        if !applies_to_segment(surge, segment, tz, issues) {
            continue;
        }
        let beats = match best {
            None => true,
            Some(current) => {
                let key = (surge.config.priority, level_rank(surge.config.applies_to.level));
                let current_key = (current.config.priority, level_rank(current.config.applies_to.level));
                key > current_key
            }
        };
        if beats {
            best = Some(surge);
        }
    }

    best.map(|surge| SurgeMatch {
        config_id: surge.config.id,
        name: surge.config.name.clone(),
        level: surge.config.applies_to.level,
        priority: synthetic_priority,
        config_priority: surge.config.priority,
        factor: surge.factor,
        supply_zero: surge.computation.supply_zero,
    })
}
