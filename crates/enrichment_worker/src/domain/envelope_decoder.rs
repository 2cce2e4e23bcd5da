use crate::domain::{ProcessingError, RecordResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::domain::{json_type_name, TelemetryEvent};
use serde_json::{Map, Value};

/// Turns one opaque batch element into a telemetry event
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait EnvelopeDecoder: Send + Sync {
    fn decode(&self, envelope: &Value) -> RecordResult<TelemetryEvent>;
}

/// Decoder for the envelope shapes a stream batch can carry:
///
/// - stream-framed: `{"kinesis": {"data": "<base64 of UTF-8 JSON>"}}`
/// - an already decoded JSON object
/// - a JSON object encoded as a string
#[derive(Debug, Default, Clone)]
pub struct StreamEnvelopeDecoder;

impl StreamEnvelopeDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_framed(&self, frame: &Value, envelope: &Value) -> RecordResult<Map<String, Value>> {
        let data = frame
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| ProcessingError::decode("stream frame has no string data", envelope))?;

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| ProcessingError::decode(format!("invalid base64: {}", e), envelope))?;

        let text = std::str::from_utf8(&bytes)
            .map_err(|e| ProcessingError::decode(format!("payload is not UTF-8: {}", e), envelope))?;

        parse_object(text, envelope)
    }
}

impl EnvelopeDecoder for StreamEnvelopeDecoder {
    fn decode(&self, envelope: &Value) -> RecordResult<TelemetryEvent> {
        let fields = match envelope {
            Value::Object(map) => match map.get("kinesis") {
                Some(frame) => self.decode_framed(frame, envelope)?,
                None => map.clone(),
            },
            Value::String(text) => parse_object(text, envelope)?,
            other => {
                return Err(ProcessingError::decode(
                    format!("unsupported envelope: {}", json_type_name(other)),
                    envelope,
                ))
            }
        };

        TelemetryEvent::from_fields(fields)
            .map_err(|e| ProcessingError::decode(e.to_string(), envelope))
    }
}

fn parse_object(text: &str, envelope: &Value) -> RecordResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ProcessingError::decode(
            format!("payload must be a JSON object, got {}", json_type_name(&other)),
            envelope,
        )),
        Err(e) => Err(ProcessingError::decode(
            format!("invalid JSON payload: {}", e),
            envelope,
        )),
    }
}
