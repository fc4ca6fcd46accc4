//! Hierarchical ratesheet and surge pricing for bookable spaces.
//!
//! Rules are declared at Customer, Location, SubLocation or Event level; a
//! booking is cut into hourly segments, each priced by the highest-priority
//! matching rule (or the default-rate cascade) and optionally surged.

pub mod cache;
pub mod config;
pub mod error;
pub mod pricing;
pub mod telemetry;

pub use cache::AppCache;
pub use config::Settings;
pub use error::{AppError, Result};
