use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, EnumString};

use ocstream_api::proto::{OpenConfigData, key_value};

/// Sensor path that carries per-interface counters and queue statistics.
pub const LINECARD_INTERFACE_PATH: &str = "/junos/system/linecard/interface/";
/// Sensor path that carries logical interface usage.
pub const LINECARD_LOGICAL_PATH: &str = "/junos/system/linecard/interface/logical/usage/";
/// Sensor path that carries interface state attributes.
pub const INTERFACES_PATH: &str = "/interfaces/";

/// Which subscription a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    Counters,
    State,
    Logical,
    Unknown,
}

impl Dataset {
    /// Classify a message path of the form
    /// `sensor:<configured path>:<sensor path>:<component>`.
    ///
    /// The third `:`-separated segment is the discriminator; paths with
    /// fewer than four segments are `Unknown`.
    pub fn from_path(path: &str) -> Self {
        let segments: Vec<&str> = path.split(':').collect();
        if segments.len() < 4 {
            return Self::Unknown;
        }
        match segments[2] {
            LINECARD_INTERFACE_PATH => Self::Counters,
            INTERFACES_PATH => Self::State,
            LINECARD_LOGICAL_PATH => Self::Logical,
            _ => Self::Unknown,
        }
    }
}

/// A typed telemetry value.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryValue {
    Int(i64),
    Uint(u64),
    Double(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
}

impl TelemetryValue {
    /// Integer view; unsigned values above `i64::MAX` do not fit.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Uint(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Double(_) => "double",
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<key_value::Value> for TelemetryValue {
    fn from(value: key_value::Value) -> Self {
        match value {
            key_value::Value::IntValue(v) | key_value::Value::SintValue(v) => Self::Int(v),
            key_value::Value::UintValue(v) => Self::Uint(v),
            key_value::Value::DoubleValue(v) => Self::Double(v),
            key_value::Value::BoolValue(v) => Self::Bool(v),
            key_value::Value::StrValue(v) => Self::Str(v),
            key_value::Value::BytesValue(v) => Self::Bytes(v),
        }
    }
}

/// One key/value pair from a telemetry message.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryUpdate {
    pub key: String,
    pub value: TelemetryValue,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryUpdate {
    pub fn new(key: impl Into<String>, value: TelemetryValue, timestamp: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp,
        }
    }

    /// Split a message into updates, in wire order.
    ///
    /// Pairs without a value are skipped. The message timestamp is in
    /// milliseconds since the epoch.
    pub fn from_message(message: OpenConfigData) -> Vec<Self> {
        let timestamp = i64::try_from(message.timestamp)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        message
            .kv
            .into_iter()
            .filter_map(|kv| {
                kv.value.map(|value| Self {
                    key: kv.key,
                    value: value.into(),
                    timestamp,
                })
            })
            .collect()
    }
}
