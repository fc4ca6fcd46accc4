//! Ratesheet store.
//!
//! Rules are fetched once for the whole booking interval; per-hour filtering
//! happens in memory in the resolver. `SnapshotStore` serves both collaborator
//! traits from a JSON snapshot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::hierarchy::{HierarchyChain, HierarchyLookup};
use super::models::{
    effective_range_overlaps, Customer, DateRange, EntityKind, Event, HierarchyLevel, Location,
    Ratesheet, SubLocation, SurgeConfig, Venue,
};
use super::services::PricingError;

/// Options for a ratesheet fetch
#[derive(Debug, Clone, Copy, Default)]
pub struct RatesheetQuery {
    /// Include Location and Customer rules, not just the SubLocation's own
    pub resolve_hierarchy: bool,
    /// Restrict event-level rules to this event
    pub event_id: Option<Uuid>,
}

/// Read access to pricing rules.
///
/// Callers pass the chain they already resolved, so implementations never
/// walk the hierarchy again.
#[async_trait]
pub trait RatesheetStore: Send + Sync {
    /// Union of rules across the chain's hierarchy levels (and events) whose
    /// effective range overlaps `range`, in declaration order.
    async fn get_effective_ratesheets(
        &self,
        chain: &HierarchyChain,
        range: &DateRange,
        query: RatesheetQuery,
    ) -> Result<Vec<Ratesheet>, PricingError>;

    /// Active LOCATION/SUBLOCATION surge configs of the chain overlapping `range`
    async fn get_active_surge_configs(
        &self,
        chain: &HierarchyChain,
        range: &DateRange,
    ) -> Result<Vec<SurgeConfig>, PricingError>;

    /// Events attached to the chain whose grace-padded span overlaps `range`
    async fn get_overlapping_events(
        &self,
        chain: &HierarchyChain,
        range: &DateRange,
    ) -> Result<Vec<Event>, PricingError>;
}

/// Immutable set of entities and rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub customers: Vec<Customer>,
    pub locations: Vec<Location>,
    pub sub_locations: Vec<SubLocation>,
    pub venues: Vec<Venue>,
    pub events: Vec<Event>,
    pub ratesheets: Vec<Ratesheet>,
    pub surge_configs: Vec<SurgeConfig>,
}

/// In-memory store backed by a `Snapshot`
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshot: Snapshot,
}

impl SnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn events_for(&self, chain: &HierarchyChain, range: &DateRange) -> Vec<Event> {
        self.snapshot
            .events
            .iter()
            .filter(|e| chain.is_event_attached(e) && e.overlaps(range))
            .cloned()
            .collect()
    }
}

fn not_found(kind: EntityKind, id: Uuid) -> PricingError {
    PricingError::NotFound { kind, id }
}

#[async_trait]
impl HierarchyLookup for SnapshotStore {
    async fn get_sub_location(&self, id: Uuid) -> Result<SubLocation, PricingError> {
        self.snapshot
            .sub_locations
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::SubLocation, id))
    }

    async fn get_location(&self, id: Uuid) -> Result<Location, PricingError> {
        self.snapshot
            .locations
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Location, id))
    }

    async fn get_customer(&self, id: Uuid) -> Result<Customer, PricingError> {
        self.snapshot
            .customers
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Customer, id))
    }

    async fn get_venue(&self, id: Uuid) -> Result<Venue, PricingError> {
        self.snapshot
            .venues
            .iter()
            .find(|v| v.id == id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Venue, id))
    }

    async fn get_event(&self, id: Uuid) -> Result<Event, PricingError> {
        self.snapshot
            .events
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| not_found(EntityKind::Event, id))
    }
}

#[async_trait]
impl RatesheetStore for SnapshotStore {
    async fn get_effective_ratesheets(
        &self,
        chain: &HierarchyChain,
        range: &DateRange,
        query: RatesheetQuery,
    ) -> Result<Vec<Ratesheet>, PricingError> {
        let event_ids: Vec<Uuid> = match query.event_id {
            Some(id) => vec![id],
            None => self.events_for(chain, range).iter().map(|e| e.id).collect(),
        };

        let sheets: Vec<Ratesheet> = self
            .snapshot
            .ratesheets
            .iter()
            .filter(|r| effective_range_overlaps(r.effective_from, r.effective_to, range))
            .filter(|r| {
                let scope = r.applies_to;
                match scope.level {
                    HierarchyLevel::SubLocation => chain.sub_location.id == scope.entity_id,
                    HierarchyLevel::Location | HierarchyLevel::Customer => {
                        query.resolve_hierarchy && chain.contains(scope.level, scope.entity_id)
                    }
                    HierarchyLevel::Event => event_ids.contains(&scope.entity_id),
                }
            })
            .cloned()
            .collect();

        debug!(
            sub_location_id = %chain.sub_location.id,
            count = sheets.len(),
            "Fetched effective ratesheets"
        );
        Ok(sheets)
    }

    async fn get_active_surge_configs(
        &self,
        chain: &HierarchyChain,
        range: &DateRange,
    ) -> Result<Vec<SurgeConfig>, PricingError> {
        Ok(self
            .snapshot
            .surge_configs
            .iter()
            .filter(|c| c.is_active)
            .filter(|c| effective_range_overlaps(c.effective_from, c.effective_to, range))
            .filter(|c| {
                matches!(
                    c.applies_to.level,
                    HierarchyLevel::Location | HierarchyLevel::SubLocation
                ) && chain.contains(c.applies_to.level, c.applies_to.entity_id)
            })
            .cloned()
            .collect())
    }

    async fn get_overlapping_events(
        &self,
        chain: &HierarchyChain,
        range: &DateRange,
    ) -> Result<Vec<Event>, PricingError> {
        Ok(self.events_for(chain, range))
    }
}
