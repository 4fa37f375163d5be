//! Parameter types for the Arduino Cloud MCP tools.

use schemars::JsonSchema;
use serde::Deserialize;

use acloud_core::LightAction;

/// Parameters for `get_device` and `get_device_thing`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    /// The ID of the device.
    pub device_id: String,
}

/// Parameters for `list_properties`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThingRequest {
    /// The ID of the thing.
    pub thing_id: String,
}

/// Parameters for `get_property`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRequest {
    /// The ID of the thing.
    pub thing_id: String,
    /// The ID of the property.
    pub property_id: String,
}

/// Parameters for `set_property`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetPropertyRequest {
    /// The ID of the thing.
    pub thing_id: String,
    /// The ID of the property.
    pub property_id: String,
    /// The value to set. Strings holding JSON (e.g. "42", "{\"swi\":true}") are parsed first.
    pub value: serde_json::Value,
}

/// What to do with the matched lights.
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LightActionParam {
    On,
    Off,
    Dim,
}

impl From<LightActionParam> for LightAction {
    fn from(action: LightActionParam) -> Self {
        match action {
            LightActionParam::On => LightAction::On,
            LightActionParam::Off => LightAction::Off,
            LightActionParam::Dim => LightAction::Dim,
        }
    }
}

/// Parameters for `control_light`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ControlLightRequest {
    /// Part of the light name (e.g. "office", "kitchen", "bedroom").
    pub light_name: String,
    /// What to do with the light.
    pub action: LightActionParam,
    /// Brightness level 0-100 (used by dimmable lights).
    #[schemars(range(min = 0, max = 100))]
    pub brightness: Option<f64>,
}
