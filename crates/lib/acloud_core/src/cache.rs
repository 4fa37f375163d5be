//! In-memory thing metadata cache with a single shared expiry.
//!
//! The whole thing set is fetched, replaced and expired as one unit; there
//! are no per-entry timestamps.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::CloudClient;
use crate::error::Result;
use crate::models::Thing;

#[derive(Debug, Default)]
struct CacheState {
    things: Vec<Thing>,
    /// Device id → index into `things`.
    by_device: HashMap<String, usize>,
    expires_at: Option<DateTime<Utc>>,
}

impl CacheState {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        !self.things.is_empty() && self.expires_at.is_some_and(|at| now < at)
    }

    fn lookup(&self, device_id: &str) -> Option<Thing> {
        self.by_device
            .get(device_id)
            .map(|&idx| self.things[idx].clone())
    }

    fn replace(&mut self, things: Vec<Thing>, expires_at: DateTime<Utc>) {
        let by_device = things
            .iter()
            .enumerate()
            .filter_map(|(idx, thing)| thing.device_id.clone().map(|id| (id, idx)))
            .collect();
        *self = Self {
            things,
            by_device,
            expires_at: Some(expires_at),
        };
    }
}

/// Thing cache keyed by device id.
///
/// The state lock is held for the duration of a refresh, so concurrent
/// callers wait for one `list_things` call and never see a half-built map.
#[derive(Debug)]
pub struct ThingCache {
    state: Mutex<CacheState>,
    ttl: chrono::Duration,
}

impl ThingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// All things; refetched when the cache is empty or expired.
    pub async fn get_things(&self, client: &CloudClient) -> Result<Vec<Thing>> {
        let mut state = self.state.lock().await;
        if state.is_fresh(Utc::now()) {
            return Ok(state.things.clone());
        }
        self.refresh(&mut state, client).await?;
        Ok(state.things.clone())
    }

    /// Thing bound to `device_id`.
    ///
    /// A miss forces one refresh even before expiry. `None` after that means
    /// no thing is bound to the device.
    pub async fn get_thing_by_device_id(
        &self,
        client: &CloudClient,
        device_id: &str,
    ) -> Result<Option<Thing>> {
        let mut state = self.state.lock().await;
        if let Some(thing) = state.lookup(device_id) {
            return Ok(Some(thing));
        }
        debug!(device_id, "device not in thing cache, refreshing");
        self.refresh(&mut state, client).await?;
        Ok(state.lookup(device_id))
    }

    async fn refresh(&self, state: &mut CacheState, client: &CloudClient) -> Result<()> {
        // Fetch first: a failed call leaves the previous state untouched.
        let things = client.list_things().await?;
        let expires_at = Utc::now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        debug!(count = things.len(), %expires_at, "thing cache refreshed");
        state.replace(things, expires_at);
        Ok(())
    }
}
