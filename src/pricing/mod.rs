//! Pricing engine module.
//!
//! Resolves the price of renting a SubLocation over an interval from layered
//! ratesheets, default rates and demand-driven surge, with an hourly audit
//! trail.

pub mod calculators;
pub mod engine;
pub mod hierarchy;
pub mod models;
pub mod requests;
pub mod resolver;
pub mod responses;
pub mod services;
pub mod store;
pub mod surge;
pub mod windows;

// Re-export commonly used items
pub use calculators::round_money;
pub use engine::{price_interval, PricingInput};
pub use hierarchy::{HierarchyChain, HierarchyLookup};
pub use requests::PricingOptions;
pub use resolver::PriceSource;
pub use responses::{PricingIssue, PricingResult};
pub use services::{PricingError, PricingService};
pub use store::{RatesheetQuery, RatesheetStore, Snapshot, SnapshotStore};
