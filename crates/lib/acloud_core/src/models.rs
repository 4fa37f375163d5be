//! Arduino Cloud resource models.
//!
//! Only the fields the adapter reasons about are typed. Everything else the
//! platform returns is kept in `extra` so tool output forwards it verbatim.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A physical board registered with the cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A device together with its properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thing {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Owning device; things can exist without a bound device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named, typed attribute of a thing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub permission: PropertyPermission,
    #[serde(rename = "type")]
    pub kind: PropertyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyPermission {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Declared property type.
///
/// The two lights the adapter can drive are named; every other platform type
/// is carried as its raw string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PropertyKind {
    /// `HOME_LIGHT`: on/off only.
    Light,
    /// `HOME_DIMMED_LIGHT`: on/off plus brightness.
    DimmedLight,
    /// `HOME_COLORED_LIGHT`: a light with hue/saturation, not driven here.
    ColoredLight,
    Other(String),
}

impl PropertyKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Light => "HOME_LIGHT",
            Self::DimmedLight => "HOME_DIMMED_LIGHT",
            Self::ColoredLight => "HOME_COLORED_LIGHT",
            Self::Other(raw) => raw,
        }
    }

    /// Whether the type represents controllable illumination.
    pub fn is_light(&self) -> bool {
        self.as_str().contains("LIGHT")
    }
}

impl From<String> for PropertyKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "HOME_LIGHT" => Self::Light,
            "HOME_DIMMED_LIGHT" => Self::DimmedLight,
            "HOME_COLORED_LIGHT" => Self::ColoredLight,
            _ => Self::Other(raw),
        }
    }
}

impl From<PropertyKind> for String {
    fn from(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
