//! The operations the model may call, their parameter schemas and the typed
//! decoding of tool calls.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::MAX_BRIGHTNESS;

pub const TURN_ON_OR_OFF: &str = "turn_on_or_off";
pub const SET_BRIGHTNESS: &str = "set_brightness";

// ── Params ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TurnOnOrOffParams {
    /// Name of the light or group of lights.
    pub light_name: String,
    /// true to turn the lights on, false to turn them off.
    pub on: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetBrightnessParams {
    /// Name of the light or group of lights.
    pub light_name: String,
    /// Brightness from 0 (dimmest) to 254 (brightest).
    pub brightness: u8,
}

// ── Operation ────────────────────────────────────────────────────

/// A structured invocation decoded from the model's tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    TurnOnOrOff { light_name: String, on: bool },
    SetBrightness { light_name: String, brightness: u8 },
    /// Unknown operation name, or arguments that do not fit the declared schema.
    Unrecognized { name: String, arguments: Value },
}

impl Operation {
    pub fn from_tool_call(name: &str, input: &Value) -> Self {
        let decoded = match name {
            TURN_ON_OR_OFF => de::<TurnOnOrOffParams>(input).map(|p| Operation::TurnOnOrOff {
                light_name: p.light_name,
                on: p.on,
            }),
            SET_BRIGHTNESS => de::<SetBrightnessParams>(input).map(|p| Operation::SetBrightness {
                light_name: p.light_name,
                brightness: p.brightness,
            }),
            _ => Err(format!("Unknown operation: {name}")),
        };

        decoded.unwrap_or_else(|reason| {
            tracing::debug!(name, %reason, "tool call not recognized");
            Operation::Unrecognized {
                name: name.to_string(),
                arguments: input.clone(),
            }
        })
    }

    /// Operation name as declared to the model.
    pub fn name(&self) -> &str {
        match self {
            Operation::TurnOnOrOff { .. } => TURN_ON_OR_OFF,
            Operation::SetBrightness { .. } => SET_BRIGHTNESS,
            Operation::Unrecognized { name, .. } => name.as_str(),
        }
    }
}

fn de<T: serde::de::DeserializeOwned>(input: &Value) -> Result<T, String> {
    serde_json::from_value(input.clone()).map_err(|e| e.to_string())
}

// ── Declarations ─────────────────────────────────────────────────

fn schema_value<T: JsonSchema>() -> Value {
    let root = schema_for!(T);
    let mut value = serde_json::to_value(root)
        .unwrap_or_else(|_| serde_json::json!({ "type": "object", "properties": {} }));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// Restrict `light_name` to the addressable names. Skipped when there are
/// none, since an empty enum is rejected by the providers.
fn restrict_light_names(schema: &mut Value, names: &[&str]) {
    if names.is_empty() {
        return;
    }
    if let Some(prop) = schema
        .pointer_mut("/properties/light_name")
        .and_then(Value::as_object_mut)
    {
        prop.insert("enum".to_string(), serde_json::json!(names));
    }
}

/// Tool definitions in `{name, description, input_schema}` form.
pub fn tool_definitions(names: &[&str]) -> Value {
    let mut power = schema_value::<TurnOnOrOffParams>();
    restrict_light_names(&mut power, names);

    let mut brightness = schema_value::<SetBrightnessParams>();
    restrict_light_names(&mut brightness, names);
    if let Some(prop) = brightness
        .pointer_mut("/properties/brightness")
        .and_then(Value::as_object_mut)
    {
        prop.insert("minimum".to_string(), serde_json::json!(0));
        prop.insert("maximum".to_string(), serde_json::json!(MAX_BRIGHTNESS));
    }

    serde_json::json!([
        {
            "name": TURN_ON_OR_OFF,
            "description": "Turn a light or group of lights on or off",
            "input_schema": power,
        },
        {
            "name": SET_BRIGHTNESS,
            "description": "Set the brightness of a light or group of lights. This also turns them on.",
            "input_schema": brightness,
        }
    ])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn decodes_turn_on_or_off() {
        let op = Operation::from_tool_call(
            "turn_on_or_off",
            &serde_json::json!({ "light_name": "Office", "on": true }),
        );
        assert_eq!(
            op,
            Operation::TurnOnOrOff {
                light_name: "Office".to_string(),
                on: true
            }
        );
        assert_eq!(op.name(), "turn_on_or_off");
    }

    #[test]
    fn decodes_set_brightness() {
        let op = Operation::from_tool_call(
            "set_brightness",
            &serde_json::json!({ "light_name": "Kitchen", "brightness": 127 }),
        );
        assert_eq!(
            op,
            Operation::SetBrightness {
                light_name: "Kitchen".to_string(),
                brightness: 127
            }
        );
    }

    #[test]
    fn unknown_name_is_unrecognized() {
        let args = serde_json::json!({ "color": "red" });
        let op = Operation::from_tool_call("set_color", &args);
        assert_eq!(
            op,
            Operation::Unrecognized {
                name: "set_color".to_string(),
                arguments: args
            }
        );
        assert_eq!(op.name(), "set_color");
    }

    #[test]
    fn malformed_arguments_are_unrecognized() {
        let op = Operation::from_tool_call(
            "set_brightness",
            &serde_json::json!({ "light_name": "Kitchen", "brightness": 900 }),
        );
        assert!(matches!(op, Operation::Unrecognized { ref name, .. } if name == "set_brightness"));

        let op = Operation::from_tool_call("turn_on_or_off", &Value::Null);
        assert!(matches!(op, Operation::Unrecognized { .. }));
    }

    #[test]
    fn definitions_declare_both_operations() {
        let tools = tool_definitions(&["Office", "Lamp Group"]);
        let tools = tools.as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "turn_on_or_off");
        assert_eq!(tools[1]["name"], "set_brightness");
    }

    #[test]
    fn light_name_is_restricted_to_known_names() {
        let tools = tool_definitions(&["Office", "Lamp Group"]);
        for tool in tools.as_array().unwrap() {
            let schema = &tool["input_schema"];
            assert_eq!(schema["type"], "object");
            assert_eq!(
                schema["properties"]["light_name"]["enum"],
                serde_json::json!(["Office", "Lamp Group"])
            );
            assert!(schema.get("$schema").is_none());
        }
    }

    #[test]
    fn brightness_is_bounded() {
        let tools = tool_definitions(&["Office"]);
        let brightness = &tools[1]["input_schema"]["properties"]["brightness"];
        assert_eq!(brightness["type"], "integer");
        assert_eq!(brightness["maximum"], 254);
        assert_eq!(brightness["minimum"], 0);
        let required = tools[1]["input_schema"]["required"].as_array().unwrap();
        assert!(required.contains(&serde_json::json!("brightness")));
        assert!(required.contains(&serde_json::json!("light_name")));
    }

    #[test]
    fn no_enum_without_names() {
        let tools = tool_definitions(&[]);
        assert!(tools[0]["input_schema"]["properties"]["light_name"]
            .get("enum")
            .is_none());
    }
}
