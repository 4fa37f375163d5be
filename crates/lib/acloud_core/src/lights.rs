//! Light resolution and control by partial name.
//!
//! A free-text fragment is matched case-insensitively against the names of
//! every light-family property of every thing. All matches are driven, in
//! discovery order, with a value encoded for the concrete light type.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::ThingCache;
use crate::client::CloudClient;
use crate::error::{CloudError, Result};
use crate::models::{Property, PropertyKind, Thing};

/// Brightness used by `on` when none is given.
pub const DEFAULT_ON_BRIGHTNESS: u8 = 100;

/// Brightness used by `dim` when none is given.
pub const DEFAULT_DIM_BRIGHTNESS: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LightAction {
    On,
    Off,
    Dim,
}

impl LightAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Dim => "dim",
        }
    }
}

impl fmt::Display for LightAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with every light whose name contains `name`.
#[derive(Debug, Clone)]
pub struct LightRequest {
    pub name: String,
    pub action: LightAction,
    /// 0–100; ignored by `off` and by lights without dimming.
    pub brightness: Option<u8>,
}

/// Platform encoding of a dimmable light value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct DimmedLightValue {
    #[serde(rename = "swi")]
    switch: bool,
    #[serde(rename = "bri", skip_serializing_if = "Option::is_none")]
    brightness: Option<u8>,
}

/// One light that was written.
#[derive(Debug, Clone, Serialize)]
pub struct ControlledLight {
    pub thing_id: String,
    pub thing_name: String,
    pub property_id: String,
    pub property_name: String,
    pub action: LightAction,
    /// Brightness actually written, if the value carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
}

impl ControlledLight {
    /// Human-readable `property (thing)` label.
    pub fn label(&self) -> String {
        format!("{} ({})", self.property_name, self.thing_name)
    }
}

/// Outcome of a light control request. An empty `lights` means nothing matched.
#[derive(Debug, Clone, Serialize)]
pub struct ControlReport {
    pub query: String,
    pub lights: Vec<ControlledLight>,
}

impl ControlReport {
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

/// A matched light with the value it will receive.
struct PlannedWrite<'a> {
    thing: &'a Thing,
    property: &'a Property,
    value: Value,
    brightness: Option<u8>,
}

/// Every (thing, property) pair whose property is a light named like `fragment`.
pub fn find_lights<'a>(things: &'a [Thing], fragment: &str) -> Vec<(&'a Thing, &'a Property)> {
    let needle = fragment.to_lowercase();
    things
        .iter()
        .flat_map(|thing| thing.properties.iter().map(move |prop| (thing, prop)))
        .filter(|(_, prop)| prop.kind.is_light() && prop.name.to_lowercase().contains(&needle))
        .collect()
}

/// Encode `action` for a light of type `kind`.
///
/// Returns the value to publish and the brightness it carries, if any.
pub fn light_value(
    kind: &PropertyKind,
    action: LightAction,
    brightness: Option<u8>,
) -> Result<(Value, Option<u8>)> {
    match kind {
        PropertyKind::DimmedLight => {
            let value = match action {
                LightAction::On => DimmedLightValue {
                    switch: true,
                    brightness: Some(brightness.unwrap_or(DEFAULT_ON_BRIGHTNESS)),
                },
                LightAction::Off => DimmedLightValue {
                    switch: false,
                    brightness: None,
                },
                LightAction::Dim => DimmedLightValue {
                    switch: true,
                    brightness: Some(brightness.unwrap_or(DEFAULT_DIM_BRIGHTNESS)),
                },
            };
            let applied = value.brightness;
            let json = serde_json::to_value(&value)
                .map_err(|e| CloudError::InvariantViolation(format!("light value encoding: {e}")))?;
            Ok((json, applied))
        }
        // No brightness concept: `dim` degrades to `on`.
        PropertyKind::Light => Ok((Value::Bool(action != LightAction::Off), None)),
        other => Err(CloudError::InvariantViolation(format!(
            "no value encoding for light type {other}"
        ))),
    }
}

/// Find every light matching `request.name` and apply the action to each.
///
/// Values for all matches are computed before the first write. Writes run in
/// discovery order; the first failure abandons the rest and is returned
/// wrapped with the labels of the writes that already succeeded.
pub async fn control_light(
    client: &CloudClient,
    cache: &ThingCache,
    request: &LightRequest,
) -> Result<ControlReport> {
    let things = cache.get_things(client).await?;
    let matches = find_lights(&things, &request.name);

    if matches.is_empty() {
        info!(query = %request.name, "no lights matched");
        return Ok(ControlReport {
            query: request.name.clone(),
            lights: Vec::new(),
        });
    }

    let plan = matches
        .into_iter()
        .map(|(thing, property)| {
            let (value, brightness) = light_value(&property.kind, request.action, request.brightness)?;
            Ok(PlannedWrite {
                thing,
                property,
                value,
                brightness,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut lights = Vec::with_capacity(plan.len());
    for write in plan {
        let light = ControlledLight {
            thing_id: write.thing.id.clone(),
            thing_name: write.thing.name.clone(),
            property_id: write.property.id.clone(),
            property_name: write.property.name.clone(),
            action: request.action,
            brightness: write.brightness,
        };

        if let Err(e) = client
            .publish_property(&light.thing_id, &light.property_id, &write.value)
            .await
        {
            warn!(light = %light.label(), error = %e, "light write failed, abandoning remaining writes");
            return Err(CloudError::LightControlAborted {
                applied: lights.iter().map(ControlledLight::label).collect(),
                source: Box::new(e),
            });
        }

        info!(light = %light.label(), action = %request.action, brightness = ?light.brightness, "light updated");
        lights.push(light);
    }

    Ok(ControlReport {
        query: request.name.clone(),
        lights,
    })
}
