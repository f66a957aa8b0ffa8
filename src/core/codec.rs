//! Envelope framing.
//!
//! Every data frame on the wire is exactly one JSON envelope
//! `{"type": string, "data": value, "timestamp": ISO-8601}`. Transports and the dispatch
//! registry never touch raw bytes; they go through [`encode`] and [`decode`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sonic_rs::{JsonValueTrait, Value};

use super::types::CodecError;

/// One unit exchanged over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Absent on some server frames (e.g. `pong`); decodes as null.
    #[serde(default)]
    pub data: Value,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Envelope {
    /// Build an envelope stamped with the current time.
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: Some(Utc::now()),
        }
    }

    /// Build an envelope from any serializable payload.
    pub fn from_payload<T>(kind: impl Into<String>, data: &T) -> Result<Self, CodecError>
    where
        T: Serialize + ?Sized,
    {
        let kind = kind.into();
        if kind.is_empty() {
            return Err(CodecError::MissingType);
        }
        let data = sonic_rs::to_value(data).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(Self::new(kind, data))
    }

    #[inline]
    pub fn has_payload(&self) -> bool {
        !self.data.is_null()
    }
}

/// Serialize a typed payload into one wire envelope.
pub fn encode<T>(kind: &str, data: &T) -> Result<String, CodecError>
where
    T: Serialize + ?Sized,
{
    encode_envelope(&Envelope::from_payload(kind, data)?)
}

/// Serialize an envelope for the wire. One without a timestamp is stamped with the current time.
pub fn encode_envelope(envelope: &Envelope) -> Result<String, CodecError> {
    if envelope.kind.is_empty() {
        return Err(CodecError::MissingType);
    }
    let wire = WireEnvelope {
        kind: &envelope.kind,
        data: &envelope.data,
        timestamp: envelope.timestamp.unwrap_or_else(Utc::now),
    };
    sonic_rs::to_string(&wire).map_err(|e| CodecError::Encode(e.to_string()))
}

#[derive(Serialize)]
struct WireEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: &'a Value,
    timestamp: DateTime<Utc>,
}

/// Parse one wire envelope. Malformed input fails without side effects.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    let envelope: Envelope =
        sonic_rs::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
    if envelope.kind.is_empty() {
        return Err(CodecError::MissingType);
    }
    Ok(envelope)
}

// Python's `isoformat()` omits the offset; those stamps are taken as UTC. Anything else that
// does not parse is dropped rather than failing the frame.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
