//! Pricing service with collaborator access.
//!
//! `PricingService::resolve_price` is the entry point: it fetches the chain,
//! events, ratesheets and surge configs once for the whole interval, runs the
//! pure engine, then stores the new smoothed surge pressures.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::AppCache;
use crate::config::Settings;

use super::engine::{price_interval, PricingInput};
use super::hierarchy::{resolve_chain, resolve_event, HierarchyChain, HierarchyLookup};
use super::models::{DateRange, EntityKind, Event};
use super::requests::PricingOptions;
use super::responses::PricingResult;
use super::store::RatesheetStore;
use super::surge::SurgeState;

/// Pricing calculation error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("Invalid booking range: end {end} is not after start {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Resolves booking prices against a hierarchy and ratesheet store
pub struct PricingService<S> {
    store: Arc<S>,
    cache: AppCache,
    settings: Settings,
}

impl<S> PricingService<S>
where
    S: HierarchyLookup + RatesheetStore,
{
    pub fn new(store: Arc<S>, cache: AppCache, settings: Settings) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }

    pub fn cache(&self) -> &AppCache {
        &self.cache
    }

    /// Ancestor chain, from cache when possible
    async fn chain(&self, sub_location_id: Uuid) -> Result<Arc<HierarchyChain>, PricingError> {
        if let Some(cached) = self.cache.chains.get(&sub_location_id).await {
            return Ok(cached);
        }
        let chain = Arc::new(resolve_chain(self.store.as_ref(), sub_location_id).await?);
        self.cache
            .chains
            .insert(sub_location_id, Arc::clone(&chain))
            .await;
        Ok(chain)
    }

    /// Events eligible for event-level rules: the pinned one, or every event
    /// on the chain overlapping the booking.
    async fn events(
        &self,
        chain: &HierarchyChain,
        range: &DateRange,
        pinned: Option<Uuid>,
    ) -> Result<Vec<Event>, PricingError> {
        match pinned {
            Some(event_id) => {
                let context = resolve_event(self.store.as_ref(), event_id).await?;
                debug!(%event_id, ancestor = ?context.ancestor, "Pinned event");
                Ok(vec![context.event])
            }
            None => self.store.get_overlapping_events(chain, range).await,
        }
    }

    async fn previous_pressures(&self, sub_location_id: Uuid, configs: &[Uuid]) -> HashMap<Uuid, f64> {
        let mut previous = HashMap::new();
        for config_id in configs {
            let key = AppCache::pressure_key(sub_location_id, *config_id);
            if let Some(pressure) = self.cache.pressures.get(&key).await {
                previous.insert(*config_id, pressure);
            }
        }
        previous
    }

    async fn store_pressures(&self, sub_location_id: Uuid, states: &[SurgeState]) {
        for state in states {
            if let Some(pressure) = state.smoothed_pressure {
                let key = AppCache::pressure_key(sub_location_id, state.surge_config_id);
                self.cache.pressures.insert(key, pressure).await;
            }
        }
    }

    /// Price `[start, end)` for a SubLocation.
    ///
    /// Fails with `InvalidRange` before any fetch, and with `NotFound` when
    /// any link of the chain (or the pinned event) is missing. Unresolvable
    /// hours are reported in the result, not raised.
    pub async fn resolve_price(
        &self,
        sub_location_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: PricingOptions,
    ) -> Result<PricingResult, PricingError> {
        if end <= start {
            return Err(PricingError::InvalidRange { start, end });
        }
        let range = DateRange::new(start, end);

        let chain = self.chain(sub_location_id).await?;
        let timezone = chain.timezone(self.settings.default_timezone);
        let currency = chain.currency(&self.settings.default_currency);

        let events = self.events(&chain, &range, options.event_id).await?;
        let ratesheets = self
            .store
            .get_effective_ratesheets(&chain, &range, options.ratesheet_query())
            .await?;
        let surge_configs = self.store.get_active_surge_configs(&chain, &range).await?;

        let config_ids: Vec<Uuid> = surge_configs.iter().map(|c| c.id).collect();
        let previous_pressures = self.previous_pressures(sub_location_id, &config_ids).await;

        let mut input = PricingInput::new(chain.as_ref().clone(), timezone, currency);
        input.events = events;
        input.ratesheets = ratesheets;
        input.surge_configs = surge_configs;
        input.previous_pressures = previous_pressures;
        input.options = options;
        input.surge_priority = self.settings.surge_priority;

        let result = price_interval(&input, range)?;
        self.store_pressures(sub_location_id, &result.surge_states).await;

        if !result.is_fully_priced() {
            warn!(
                %sub_location_id,
                unresolved = result.unresolved.len(),
                "Booking has unresolvable hours"
            );
        }
        info!(
            %sub_location_id,
            %start,
            %end,
            timezone = %result.timezone,
            total_price = %result.total_price,
            total_hours = %result.total_hours,
            event_booking = result.is_event_booking,
            "Resolved price"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::models::{
        AppliesTo, Customer, DemandSupplyParams, EventParent, HierarchyLevel, Location, Ratesheet,
        SubLocation, SurgeConfig, SurgeParams, TimeWindow,
    };
    use crate::pricing::resolver::PriceSource;
    use crate::pricing::store::{Snapshot, SnapshotStore};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    struct Fixture {
        service: PricingService<SnapshotStore>,
        sub_location: Uuid,
        location: Uuid,
        event: Uuid,
        surge: Uuid,
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 2, h, 0, 0).unwrap()
    }

    fn sheet(name: &str, level: HierarchyLevel, entity_id: Uuid, priority: i32, window: TimeWindow) -> Ratesheet {
        Ratesheet {
            id: Uuid::new_v4(),
            name: name.to_string(),
            applies_to: AppliesTo { level, entity_id },
            priority,
            effective_from: at(0),
            effective_to: None,
            is_active: true,
            time_windows: vec![window],
        }
    }

    fn service_for(snapshot: Snapshot) -> PricingService<SnapshotStore> {
        let settings = Settings::default();
        PricingService::new(
            Arc::new(SnapshotStore::new(snapshot)),
            AppCache::new(&settings),
            settings,
        )
    }

    fn fixture(with_surge: bool) -> Fixture {
        let customer = Uuid::new_v4();
        let location = Uuid::new_v4();
        let sub_location = Uuid::new_v4();
        let event = Uuid::new_v4();
        let surge = Uuid::new_v4();

        let mut snapshot = Snapshot {
            customers: vec![Customer {
                id: customer,
                name: "Acme".to_string(),
                timezone: None,
                currency: Some("EUR".to_string()),
                default_hourly_rate: Some(dec!(10)),
            }],
            locations: vec![Location {
                id: location,
                customer_id: customer,
                name: "Harbor".to_string(),
                timezone: None,
                default_hourly_rate: None,
            }],
            sub_locations: vec![SubLocation {
                id: sub_location,
                location_id: location,
                venue_id: None,
                name: "Studio 1".to_string(),
                timezone: None,
                default_hourly_rate: Some(dec!(20)),
            }],
            events: vec![Event {
                id: event,
                name: "Expo".to_string(),
                parent: EventParent::Location(location),
                start: at(12),
                end: at(14),
                grace_period_before: None,
                grace_period_after: None,
                default_hourly_rate: None,
            }],
            ratesheets: vec![
                sheet(
                    "Expo rate",
                    HierarchyLevel::Event,
                    event,
                    900,
                    TimeWindow::absolute("00:00", "24:00", dec!(80)),
                ),
                sheet(
                    "Harbor evening",
                    HierarchyLevel::Location,
                    location,
                    100,
                    TimeWindow::absolute("18:00", "22:00", dec!(45)),
                ),
            ],
            ..Snapshot::default()
        };
        if with_surge {
            snapshot.surge_configs.push(SurgeConfig {
                id: surge,
                name: "Harbor rush".to_string(),
                applies_to: AppliesTo {
                    level: HierarchyLevel::Location,
                    entity_id: location,
                },
                priority: 1,
                demand_supply_params: DemandSupplyParams {
                    current_demand: 20.0,
                    current_supply: 10.0,
                    historical_avg_pressure: 1.0,
                },
                surge_params: SurgeParams {
                    alpha: 1.0,
                    min_multiplier: 1.0,
                    max_multiplier: 3.0,
                    ema_alpha: 0.5,
                },
                effective_from: at(0),
                effective_to: None,
                is_active: true,
                time_windows: vec![],
            });
        }

        Fixture {
            service: service_for(snapshot),
            sub_location,
            location,
            event,
            surge,
        }
    }

    #[tokio::test]
    async fn test_resolve_price_uses_default_and_event_rules() {
        let f = fixture(false);
        let result = f
            .service
            .resolve_price(f.sub_location, at(11), at(14), PricingOptions::default())
            .await
            .unwrap();

        assert_eq!(result.currency, "EUR");
        assert_eq!(result.timezone, "UTC");
        // event span 12-14 touches 11-12 at its inclusive boundary
        assert_eq!(result.segments[0].source, PriceSource::Ratesheet);
        assert_eq!(result.segments[0].price_per_hour, dec!(80));
        assert_eq!(result.segments[1].price_per_hour, dec!(80));
        assert_eq!(result.segments[2].price_per_hour, dec!(80));
        assert_eq!(result.total_price, dec!(240));
    }

    #[tokio::test]
    async fn test_resolve_price_before_event_falls_to_default() {
        let f = fixture(false);
        let result = f
            .service
            .resolve_price(f.sub_location, at(8), at(10), PricingOptions::default())
            .await
            .unwrap();
        assert!(result.segments.iter().all(|s| s.source == PriceSource::DefaultRate));
        assert_eq!(result.total_price, dec!(40));
    }

    #[tokio::test]
    async fn test_pinned_unknown_event_is_not_found() {
        let f = fixture(false);
        let missing = Uuid::new_v4();
        let options = PricingOptions {
            event_id: Some(missing),
            ..PricingOptions::default()
        };
        let err = f
            .service
            .resolve_price(f.sub_location, at(12), at(13), options)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PricingError::NotFound {
                kind: EntityKind::Event,
                id: missing
            }
        );
    }

    #[tokio::test]
    async fn test_pinned_event_prices_event_hours() {
        let f = fixture(false);
        let options = PricingOptions {
            event_id: Some(f.event),
            is_event_booking: true,
            ..PricingOptions::default()
        };
        let result = f
            .service
            .resolve_price(f.sub_location, at(12), at(13), options)
            .await
            .unwrap();
        assert!(result.is_event_booking);
        assert_eq!(result.segments[0].level, HierarchyLevel::Event);
    }

    #[tokio::test]
    async fn test_unknown_sub_location_is_not_found() {
        let f = fixture(false);
        let missing = Uuid::new_v4();
        let err = f
            .service
            .resolve_price(missing, at(9), at(10), PricingOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SubLocation"));
    }

    #[tokio::test]
    async fn test_invalid_range_rejected_before_fetch() {
        let f = fixture(false);
        let err = f
            .service
            .resolve_price(Uuid::new_v4(), at(10), at(9), PricingOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::InvalidRange { .. }));
    }

    #[tokio::test]
    async fn test_chain_is_cached() {
        let f = fixture(false);
        f.service
            .resolve_price(f.sub_location, at(8), at(9), PricingOptions::default())
            .await
            .unwrap();
        let cached = f.service.cache().chains.get(&f.sub_location).await.unwrap();
        assert_eq!(cached.location.id, f.location);
    }

    #[tokio::test]
    async fn test_smoothed_pressure_carries_between_calls() {
        let f = fixture(true);
        let first = f
            .service
            .resolve_price(f.sub_location, at(8), at(9), PricingOptions::default())
            .await
            .unwrap();
        // pressure 2.0 on first use
        assert_eq!(first.segments[0].price_per_hour, dec!(40));
        assert_eq!(first.segments[0].source, PriceSource::Surge);

        let key = AppCache::pressure_key(f.sub_location, f.surge);
        assert_eq!(f.service.cache().pressures.get(&key).await, Some(2.0));

        // seed a calmer history: 0.5 * 2.0 + 0.5 * 1.0 = 1.5
        f.service.cache().pressures.insert(key, 1.0).await;
        let second = f
            .service
            .resolve_price(f.sub_location, at(8), at(9), PricingOptions::default())
            .await
            .unwrap();
        assert_eq!(second.segments[0].surge_factor, Some(dec!(1.5)));
        assert_eq!(second.segments[0].price_per_hour, dec!(30));
    }

    #[tokio::test]
    async fn test_sub_location_only_skips_ancestor_ratesheets() {
        let f = fixture(false);
        let full = f
            .service
            .resolve_price(f.sub_location, at(18), at(19), PricingOptions::default())
            .await
            .unwrap();
        assert_eq!(full.segments[0].price_per_hour, dec!(45));
        assert_eq!(full.segments[0].level, HierarchyLevel::Location);

        let options = PricingOptions {
            sub_location_only: true,
            ..PricingOptions::default()
        };
        let narrowed = f
            .service
            .resolve_price(f.sub_location, at(18), at(19), options)
            .await
            .unwrap();
        assert_eq!(narrowed.segments[0].source, PriceSource::DefaultRate);
        assert_eq!(narrowed.segments[0].price_per_hour, dec!(20));
    }

    #[tokio::test]
    async fn test_chain_timezone_drives_window_matching() {
        let customer = Uuid::new_v4();
        let location = Uuid::new_v4();
        let sub_location = Uuid::new_v4();
        let snapshot = Snapshot {
            customers: vec![Customer {
                id: customer,
                name: "Acme".to_string(),
                timezone: Some("Europe/London".to_string()),
                currency: None,
                default_hourly_rate: None,
            }],
            locations: vec![Location {
                id: location,
                customer_id: customer,
                name: "Midtown".to_string(),
                timezone: Some("America/New_York".to_string()),
                default_hourly_rate: Some(dec!(20)),
            }],
            sub_locations: vec![SubLocation {
                id: sub_location,
                location_id: location,
                venue_id: None,
                name: "Loft".to_string(),
                timezone: None,
                default_hourly_rate: None,
            }],
            ratesheets: vec![sheet(
                "Business hours",
                HierarchyLevel::SubLocation,
                sub_location,
                700,
                TimeWindow::absolute("09:00", "17:00", dec!(50)),
            )],
            ..Snapshot::default()
        };
        let service = service_for(snapshot);

        // New York is UTC-4 in June: 12:00Z is 08:00 local, 13:00Z is 09:00
        let result = service
            .resolve_price(sub_location, at(12), at(14), PricingOptions::default())
            .await
            .unwrap();
        assert_eq!(result.timezone, "America/New_York");
        assert_eq!(result.currency, "USD");
        assert_eq!(result.segments[0].source, PriceSource::DefaultRate);
        assert_eq!(result.segments[0].level, HierarchyLevel::Location);
        assert_eq!(result.segments[1].start_time, at(13));
        assert_eq!(result.segments[1].source, PriceSource::Ratesheet);
        assert_eq!(result.segments[1].price_per_hour, dec!(50));
        assert_eq!(result.total_price, dec!(70));
    }
}
