//! Extra simulated devices loaded from a JSON scenario file.
//!
//! ```json
//! {
//!   "devices": [{
//!     "name": "lab/stage/x",
//!     "class": "Stage",
//!     "attributes": [
//!       { "name": "Position", "data_type": "Double", "writable": true,
//!         "min": -10.0, "max": 10.0, "unit": "mm", "value": 1.5 }
//!     ],
//!     "commands": ["Stop"],
//!     "properties": { "no_direct_control": ["false"] },
//!     "online": true
//!   }],
//!   "free_properties": [
//!     { "object": "LaserCamera", "key": "camera", "values": ["lab/cam/1"] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use labpanel_core::attribute::{AttrValue, AttributeDescriptor, DataFormat, DataType, DevState};
use labpanel_core::error::{AppResult, PanelError};
use serde::Deserialize;
use serde_json::Value;

use crate::bus::SimBus;
use crate::device::SimDevice;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub devices: Vec<DeviceSpec>,
    pub free_properties: Vec<FreePropertySpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSpec {
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_online")]
    pub online: bool,
}

fn default_online() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    pub data_type: DataType,
    #[serde(default = "default_format")]
    pub data_format: DataFormat,
    #[serde(default)]
    pub writable: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub enum_labels: Vec<String>,
    #[serde(default)]
    pub value: Value,
}

fn default_format() -> DataFormat {
    DataFormat::Scalar
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreePropertySpec {
    pub object: String,
    pub key: String,
    pub values: Vec<String>,
}

impl AttributeSpec {
    fn descriptor(&self) -> AttributeDescriptor {
        let mut desc = AttributeDescriptor::new(&self.name, self.data_type)
            .with_data_format(self.data_format)
            .with_unit(&self.unit)
            .with_format(&self.format)
            .with_enum_labels(self.enum_labels.iter().cloned());
        desc.min = self.min;
        desc.max = self.max;
        if self.writable {
            desc = desc.writable();
        }
        desc
    }

    /// Initial value converted to the declared type.
    fn initial_value(&self) -> AppResult<AttrValue> {
        let bad = || {
            PanelError::Configuration(format!(
                "Attribute '{}': value {} does not match {:?}",
                self.name, self.value, self.data_type
            ))
        };
        if self.data_format == DataFormat::Spectrum {
            let values = match &self.value {
                Value::Null => Vec::new(),
                Value::Array(items) => items
                    .iter()
                    .map(|v| v.as_f64().ok_or_else(bad))
                    .collect::<AppResult<Vec<f64>>>()?,
                _ => return Err(bad()),
            };
            return Ok(AttrValue::Spectrum(values));
        }
        if self.data_format == DataFormat::Image {
            return Err(PanelError::Unsupported(format!(
                "Image attribute '{}' cannot be declared in a scenario",
                self.name
            )));
        }

        let value = match (self.data_type, &self.value) {
            (DataType::Boolean, Value::Null) => AttrValue::Bool(false),
            (DataType::Boolean, v) => AttrValue::Bool(v.as_bool().ok_or_else(bad)?),
            (DataType::String, Value::Null) => AttrValue::Str(String::new()),
            (DataType::String, v) => AttrValue::Str(v.as_str().ok_or_else(bad)?.to_string()),
            (DataType::State, Value::Null) => AttrValue::State(DevState::Unknown),
            (DataType::State, v) => {
                AttrValue::State(v.as_str().and_then(DevState::from_name).ok_or_else(bad)?)
            }
            (DataType::Enum, v) => AttrValue::Enum(v.as_i64().unwrap_or(0)),
            (dt, Value::Null) if dt.is_integer() => AttrValue::Int(0),
            (dt, v) if dt.is_integer() => AttrValue::Int(v.as_i64().ok_or_else(bad)?),
            (dt, Value::Null) if dt.is_float() => AttrValue::Float(0.0),
            (dt, v) if dt.is_float() => AttrValue::Float(v.as_f64().ok_or_else(bad)?),
            _ => return Err(bad()),
        };
        Ok(value)
    }
}

impl Scenario {
    pub fn from_json(text: &str) -> AppResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| PanelError::Configuration(format!("Invalid scenario: {}", e)))
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Register every device and free property on `bus`.
    pub fn install(&self, bus: &SimBus) -> AppResult<()> {
        for entry in &self.devices {
            let mut builder = SimDevice::builder(&entry.name, &entry.class);
            for attr in &entry.attributes {
                builder = builder.attribute(attr.descriptor(), attr.initial_value()?);
            }
            for cmd in &entry.commands {
                builder = builder.command(cmd);
            }
            for (key, values) in &entry.properties {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                builder = builder.property(key, &values);
            }
            let device = bus.add_device(builder.build());
            device.set_online(entry.online);
            tracing::debug!(device = %entry.name, class = %entry.class, "Scenario device added");
        }
        for prop in &self.free_properties {
            bus.set_free_property(&prop.object, &prop.key, prop.values.clone());
        }
        Ok(())
    }
}
