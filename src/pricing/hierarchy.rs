//! Hierarchy lookup and ancestor chain resolution.
//!
//! A SubLocation resolves to a fixed-shape chain (SubLocation, Location,
//! Customer). Events resolve to whichever ancestor they hang off.

use async_trait::async_trait;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::models::{
    Customer, Event, EventParent, HierarchyLevel, Location, SubLocation, Venue,
};
use super::services::PricingError;

/// Read-only access to the entity hierarchy.
///
/// Implementations return `PricingError::NotFound` for unknown ids.
#[async_trait]
pub trait HierarchyLookup: Send + Sync {
    async fn get_sub_location(&self, id: Uuid) -> Result<SubLocation, PricingError>;
    async fn get_location(&self, id: Uuid) -> Result<Location, PricingError>;
    async fn get_customer(&self, id: Uuid) -> Result<Customer, PricingError>;
    async fn get_venue(&self, id: Uuid) -> Result<Venue, PricingError>;
    async fn get_event(&self, id: Uuid) -> Result<Event, PricingError>;
}

/// Ancestor chain of a SubLocation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyChain {
    pub sub_location: SubLocation,
    pub location: Location,
    pub customer: Customer,
}

impl HierarchyChain {
    /// Whether a rule scoped to `(level, entity_id)` belongs to this chain.
    /// Event scopes are resolved separately.
    pub fn contains(&self, level: HierarchyLevel, entity_id: Uuid) -> bool {
        match level {
            HierarchyLevel::SubLocation => self.sub_location.id == entity_id,
            HierarchyLevel::Location => self.location.id == entity_id,
            HierarchyLevel::Customer => self.customer.id == entity_id,
            HierarchyLevel::Event => false,
        }
    }

    /// Whether an event is attached somewhere on this chain
    pub fn is_event_attached(&self, event: &Event) -> bool {
        match event.parent {
            EventParent::SubLocation(id) => self.sub_location.id == id,
            EventParent::Location(id) => self.location.id == id,
            EventParent::Venue(id) => self.sub_location.venue_id == Some(id),
        }
    }

    /// Default rates, most specific first: SubLocation, Location, Customer
    pub fn default_rate_cascade(&self) -> [(HierarchyLevel, Uuid, Option<Decimal>); 3] {
        [
            (
                HierarchyLevel::SubLocation,
                self.sub_location.id,
                self.sub_location.default_hourly_rate,
            ),
            (
                HierarchyLevel::Location,
                self.location.id,
                self.location.default_hourly_rate,
            ),
            (
                HierarchyLevel::Customer,
                self.customer.id,
                self.customer.default_hourly_rate,
            ),
        ]
    }

    /// Timezone of the most specific entity that declares a valid one
    pub fn timezone(&self, fallback: Tz) -> Tz {
        let declared = [
            (HierarchyLevel::SubLocation, self.sub_location.timezone.as_deref()),
            (HierarchyLevel::Location, self.location.timezone.as_deref()),
            (HierarchyLevel::Customer, self.customer.timezone.as_deref()),
        ];
        for (level, name) in declared {
            let Some(name) = name else { continue };
            match name.parse::<Tz>() {
                Ok(tz) => return tz,
                Err(_) => warn!(?level, timezone = name, "Ignoring unknown timezone"),
            }
        }
        fallback
    }

    pub fn currency(&self, fallback: &str) -> String {
        self.customer
            .currency
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Walk SubLocation -> Location -> Customer.
///
/// Any missing link aborts with `NotFound`.
pub async fn resolve_chain<L>(lookup: &L, sub_location_id: Uuid) -> Result<HierarchyChain, PricingError>
where
    L: HierarchyLookup + ?Sized,
{
    let sub_location = lookup.get_sub_location(sub_location_id).await?;
    let location = lookup.get_location(sub_location.location_id).await?;
    let customer = lookup.get_customer(location.customer_id).await?;
    Ok(HierarchyChain {
        sub_location,
        location,
        customer,
    })
}

/// Ancestor an event is attached to
#[derive(Debug, Clone)]
pub enum EventAncestor {
    SubLocation(SubLocation),
    Location(Location),
    Venue(Venue),
}

/// An event with its resolved ancestor
#[derive(Debug, Clone)]
pub struct EventContext {
    pub event: Event,
    pub ancestor: EventAncestor,
}

/// Fetch an event and the entity it hangs off
pub async fn resolve_event<L>(lookup: &L, event_id: Uuid) -> Result<EventContext, PricingError>
where
    L: HierarchyLookup + ?Sized,
{
    let event = lookup.get_event(event_id).await?;
    let ancestor = match event.parent {
        EventParent::SubLocation(id) => EventAncestor::SubLocation(lookup.get_sub_location(id).await?),
        EventParent::Location(id) => EventAncestor::Location(lookup.get_location(id).await?),
        EventParent::Venue(id) => EventAncestor::Venue(lookup.get_venue(id).await?),
    };
    Ok(EventContext { event, ancestor })
}
