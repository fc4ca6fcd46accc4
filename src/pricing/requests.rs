//! Request options for price resolution.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::store::RatesheetQuery;

/// Options for `resolve_price`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingOptions {
    /// Evaluate DURATION_BASED windows
    #[serde(default)]
    pub use_duration_context: bool,
    /// Reference instant for DURATION_BASED windows; defaults to the booking start
    #[serde(default)]
    pub booking_reference: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_event_booking: bool,
    /// Pin event-level rules to one event instead of auto-detecting
    #[serde(default)]
    pub event_id: Option<Uuid>,
    /// Skip Location and Customer ratesheets; default rates still cascade
    #[serde(default)]
    pub sub_location_only: bool,
}

impl PricingOptions {
    /// Store query for this booking's ratesheets
    pub fn ratesheet_query(&self) -> RatesheetQuery {
        RatesheetQuery {
            resolve_hierarchy: !self.sub_location_only,
            event_id: self.event_id,
        }
    }

    /// Duration-window reference instant, or `None` when disabled
    pub fn duration_reference(&self, booking_start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.use_duration_context
            .then(|| self.booking_reference.unwrap_or(booking_start))
    }
}
