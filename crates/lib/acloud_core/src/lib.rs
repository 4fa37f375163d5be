//! # acloud_core
//!
//! Core domain logic for the Arduino Cloud MCP adapter.
//!
//! [`ArduinoCloud`] composes the credential manager, the resource client, the
//! thing metadata cache and the light resolver behind one explicitly
//! constructed object. Callers own it (usually behind an `Arc`) and pass it to
//! whatever serves the host-facing tools.

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod lights;
pub mod models;

use serde_json::Value;

pub use client::CloudClient;
pub use config::CloudConfig;
pub use error::{CloudError, Result};
pub use lights::{ControlReport, ControlledLight, LightAction, LightRequest};
pub use models::{Device, Property, PropertyKind, PropertyPermission, Thing};

use cache::ThingCache;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Arduino IoT Cloud facade: resource client plus the thing cache.
#[derive(Debug)]
pub struct ArduinoCloud {
    client: CloudClient,
    things: ThingCache,
}

impl ArduinoCloud {
    /// Build the facade from a validated configuration.
    pub fn new(config: CloudConfig) -> Result<Self> {
        let cache_ttl = config.cache_ttl;
        let client = CloudClient::new(config)?;
        Ok(Self {
            client,
            things: ThingCache::new(cache_ttl),
        })
    }

    /// Direct access to the uncached resource client.
    pub fn client(&self) -> &CloudClient {
        &self.client
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.client.list_devices().await
    }

    pub async fn get_device(&self, device_id: &str) -> Result<Device> {
        self.client.get_device(device_id).await
    }

    /// All things, served from the metadata cache while it is fresh.
    pub async fn things(&self) -> Result<Vec<Thing>> {
        self.things.get_things(&self.client).await
    }

    /// The thing bound to `device_id`, refreshing the cache once on a miss.
    pub async fn thing_by_device_id(&self, device_id: &str) -> Result<Option<Thing>> {
        self.things
            .get_thing_by_device_id(&self.client, device_id)
            .await
    }

    pub async fn list_properties(&self, thing_id: &str) -> Result<Vec<Property>> {
        self.client.list_properties(thing_id).await
    }

    pub async fn get_property(&self, thing_id: &str, property_id: &str) -> Result<Property> {
        self.client.get_property(thing_id, property_id).await
    }

    pub async fn set_property(&self, thing_id: &str, property_id: &str, value: &Value) -> Result<()> {
        self.client
            .publish_property(thing_id, property_id, value)
            .await
    }

    /// Resolve lights by partial name and apply `request` to every match.
    pub async fn control_light(&self, request: &LightRequest) -> Result<ControlReport> {
        lights::control_light(&self.client, &self.things, request).await
    }
}
