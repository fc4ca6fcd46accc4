//! In-memory caching using moka
//!
//! Holds resolved hierarchy chains and the smoothed surge pressure carried
//! between resolution passes. Hierarchy rarely changes, so chains get a short
//! TTL.

use moka::future::Cache;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Settings;
use crate::pricing::hierarchy::HierarchyChain;

/// Application cache for hierarchy chains and surge state
#[derive(Clone)]
pub struct AppCache {
    /// Ancestor chains (sub_location_id -> HierarchyChain)
    pub chains: Cache<Uuid, Arc<HierarchyChain>>,
    /// Smoothed surge pressure ("{sub_location_id}:{surge_config_id}" -> pressure)
    pub pressures: Cache<String, f64>,
}

impl AppCache {
    /// Create a new cache instance with TTLs from settings
    pub fn new(settings: &Settings) -> Self {
        Self {
            // Chains: 10k sublocations, short TTL so hierarchy edits show up
            chains: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(settings.chain_cache_ttl)
                .build(),

            // Pressures: one entry per (sublocation, surge config)
            pressures: Cache::builder()
                .max_capacity(50_000)
                .time_to_live(settings.pressure_cache_ttl)
                .time_to_idle(settings.pressure_cache_ttl / 2)
                .build(),
        }
    }

    /// Generate cache key for a smoothed pressure
    pub fn pressure_key(sub_location_id: Uuid, surge_config_id: Uuid) -> String {
        format!("{}:{}", sub_location_id, surge_config_id)
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}
