//! MCP server handler: defines the Arduino Cloud MCP server and its tools.

use std::sync::Arc;

use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use tracing::{info, warn};

use acloud_core::{ArduinoCloud, CloudError, LightRequest};

use crate::tools::report::render_control_report;
use crate::tools::types::{
    ControlLightRequest, DeviceRequest, PropertyRequest, SetPropertyRequest, ThingRequest,
};
use crate::tools::values::{brightness_percent, parse_property_value};

/// Arduino Cloud MCP server handler.
///
/// Cheap to clone: every session shares the same [`ArduinoCloud`], so the
/// access token and thing cache are process-wide.
#[derive(Clone)]
pub struct ArduinoMcpServer {
    cloud: Arc<ArduinoCloud>,
    tool_router: ToolRouter<Self>,
}

/// Helper to serialize a value to a pretty JSON CallToolResult.
fn json_result<T: serde::Serialize>(value: &T) -> Result<CallToolResult, ErrorData> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ErrorData::new(ErrorCode::INTERNAL_ERROR, e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn text_result(text: impl Into<String>) -> Result<CallToolResult, ErrorData> {
    Ok(CallToolResult::success(vec![Content::text(text.into())]))
}

/// Convert a core failure into the host-facing error.
pub(crate) fn tool_error(tool: &str, err: CloudError) -> ErrorData {
    warn!(tool, error = %err, "tool call failed");
    match err {
        CloudError::NotFound { .. } => {
            ErrorData::new(ErrorCode::RESOURCE_NOT_FOUND, err.to_string(), None)
        }
        other => ErrorData::new(
            ErrorCode::INTERNAL_ERROR,
            format!("Tool execution failed: {other}"),
            None,
        ),
    }
}

#[tool_router]
impl ArduinoMcpServer {
    pub fn new(cloud: Arc<ArduinoCloud>) -> Self {
        Self {
            cloud,
            tool_router: Self::tool_router(),
        }
    }

    /// Return tool definitions registered in this server.
    #[cfg(test)]
    pub(crate) fn list_tools() -> Vec<rmcp::model::Tool> {
        Self::tool_router().list_all()
    }

    #[tool(description = "List all Arduino Cloud devices")]
    async fn list_devices(&self) -> Result<CallToolResult, ErrorData> {
        let devices = self
            .cloud
            .list_devices()
            .await
            .map_err(|e| tool_error("list_devices", e))?;
        json_result(&devices)
    }

    #[tool(description = "Get details of a specific device")]
    async fn get_device(
        &self,
        Parameters(DeviceRequest { device_id }): Parameters<DeviceRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let device = self
            .cloud
            .get_device(&device_id)
            .await
            .map_err(|e| tool_error("get_device", e))?;
        json_result(&device)
    }

    #[tool(description = "List all Arduino Cloud things (devices with properties)")]
    async fn list_things(&self) -> Result<CallToolResult, ErrorData> {
        let things = self
            .cloud
            .things()
            .await
            .map_err(|e| tool_error("list_things", e))?;
        json_result(&things)
    }

    #[tool(description = "Find the thing (with its properties) bound to a device")]
    async fn get_device_thing(
        &self,
        Parameters(DeviceRequest { device_id }): Parameters<DeviceRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let thing = self
            .cloud
            .thing_by_device_id(&device_id)
            .await
            .map_err(|e| tool_error("get_device_thing", e))?;
        match thing {
            Some(thing) => json_result(&thing),
            None => text_result(format!("No thing is linked to device {device_id}")),
        }
    }

    #[tool(description = "List all properties of a thing")]
    async fn list_properties(
        &self,
        Parameters(ThingRequest { thing_id }): Parameters<ThingRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let properties = self
            .cloud
            .list_properties(&thing_id)
            .await
            .map_err(|e| tool_error("list_properties", e))?;
        json_result(&properties)
    }

    #[tool(description = "Get the current value of a thing property")]
    async fn get_property(
        &self,
        Parameters(PropertyRequest {
            thing_id,
            property_id,
        }): Parameters<PropertyRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let property = self
            .cloud
            .get_property(&thing_id, &property_id)
            .await
            .map_err(|e| tool_error("get_property", e))?;
        json_result(&property)
    }

    #[tool(description = "Set the value of a thing property")]
    async fn set_property(
        &self,
        Parameters(SetPropertyRequest {
            thing_id,
            property_id,
            value,
        }): Parameters<SetPropertyRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let value = parse_property_value(value);
        self.cloud
            .set_property(&thing_id, &property_id, &value)
            .await
            .map_err(|e| tool_error("set_property", e))?;
        info!(%thing_id, %property_id, "property updated");
        text_result(format!(
            "Successfully updated property {property_id} on thing {thing_id}"
        ))
    }

    #[tool(description = "Easy control for lights - automatically finds and controls lights by name")]
    async fn control_light(
        &self,
        Parameters(ControlLightRequest {
            light_name,
            action,
            brightness,
        }): Parameters<ControlLightRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let brightness = brightness_percent(brightness)
            .map_err(|msg| ErrorData::new(ErrorCode::INVALID_PARAMS, msg, None))?;
        let request = LightRequest {
            name: light_name,
            action: action.into(),
            brightness,
        };

        let report = self
            .cloud
            .control_light(&request)
            .await
            .map_err(|e| tool_error("control_light", e))?;
        text_result(render_control_report(&report))
    }
}

#[tool_handler]
impl ServerHandler for ArduinoMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Arduino Cloud MCP server — list devices and things, read and set properties, \
                 and control lights by name"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
