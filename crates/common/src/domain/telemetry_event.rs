use crate::domain::result::{DomainError, DomainResult};
use serde_json::{Map, Value};

/// Device identifier substituted when a record carries no `deviceId`
pub const UNKNOWN_DEVICE_ID: &str = "unknown";

pub const DEVICE_ID_FIELD: &str = "deviceId";
pub const TEMPERATURE_FIELD: &str = "temperature";
pub const HUMIDITY_FIELD: &str = "humidity";
pub const VIBRATION_FIELD: &str = "vibration";
pub const LATITUDE_FIELD: &str = "latitude";
pub const LONGITUDE_FIELD: &str = "longitude";

/// A decoded telemetry record
///
/// Keeps the full set of fields as received, plus typed slots for the
/// readings the pipeline interprets. Built once by the decoder and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    device_id: Option<String>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    vibration: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    fields: Map<String, Value>,
}

impl TelemetryEvent {
    /// Build an event from a decoded JSON object
    ///
    /// Reading fields must be numbers when present; `null` counts as absent.
    /// `deviceId` may be a string or a number.
    pub fn from_fields(fields: Map<String, Value>) -> DomainResult<Self> {
        let device_id = match fields.get(DEVICE_ID_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            Some(other) => {
                return Err(DomainError::InvalidTelemetryField(format!(
                    "{} must be a string, got {}",
                    DEVICE_ID_FIELD,
                    json_type_name(other)
                )))
            }
        };

        Ok(Self {
            device_id,
            temperature: numeric_field(&fields, TEMPERATURE_FIELD)?,
            humidity: numeric_field(&fields, HUMIDITY_FIELD)?,
            vibration: numeric_field(&fields, VIBRATION_FIELD)?,
            latitude: numeric_field(&fields, LATITUDE_FIELD)?,
            longitude: numeric_field(&fields, LONGITUDE_FIELD)?,
            fields,
        })
    }

    /// Device identifier, or the `"unknown"` sentinel when the record has none
    pub fn device_id(&self) -> &str {
        self.device_id.as_deref().unwrap_or(UNKNOWN_DEVICE_ID)
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn humidity(&self) -> Option<f64> {
        self.humidity
    }

    pub fn vibration(&self) -> Option<f64> {
        self.vibration
    }

    /// `(latitude, longitude)` when both are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    /// All fields as received
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

fn numeric_field(fields: &Map<String, Value>, name: &str) -> DomainResult<Option<f64>> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| {
            DomainError::InvalidTelemetryField(format!("{} is not representable as f64", name))
        }),
        Some(other) => Err(DomainError::InvalidTelemetryField(format!(
            "{} must be numeric, got {}",
            name,
            json_type_name(other)
        ))),
    }
}

/// JSON type of a value, for error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
