//! Protocol buffer messages for the device RPC surface.
//!
//! Two services are consumed: `authentication.Login` (optional credential
//! check) and `telemetry.OpenConfigTelemetry` (server-streamed key/value
//! telemetry). Only the messages and fields the collector reads or sends
//! are declared; unknown fields on the wire are skipped by prost.

#![allow(clippy::all, clippy::pedantic)]

// ── authentication ──────────────────────────────────────────────────

/// `authentication.LoginRequest`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoginRequest {
    #[prost(string, tag = "1")]
    pub user_name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub password: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub client_id: ::prost::alloc::string::String,
}

/// `authentication.LoginReply`
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct LoginReply {
    #[prost(bool, tag = "1")]
    pub result: bool,
}

// ── telemetry ───────────────────────────────────────────────────────

/// `telemetry.SubscriptionRequest`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscriptionRequest {
    #[prost(message, repeated, tag = "2")]
    pub path_list: ::prost::alloc::vec::Vec<Path>,
    #[prost(message, optional, tag = "3")]
    pub additional_config: ::core::option::Option<SubscriptionAdditionalConfig>,
}

/// `telemetry.Path`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Path {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub filter: ::prost::alloc::string::String,
    #[prost(bool, tag = "3")]
    pub suppress_unchanged: bool,
    #[prost(uint32, tag = "4")]
    pub max_silent_interval: u32,
    #[prost(uint32, tag = "5")]
    pub sample_frequency: u32,
    #[prost(bool, tag = "6")]
    pub need_eom: bool,
}

/// `telemetry.SubscriptionAdditionalConfig`
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct SubscriptionAdditionalConfig {
    #[prost(int32, tag = "1")]
    pub limit_records: i32,
    #[prost(int32, tag = "2")]
    pub limit_time_seconds: i32,
    #[prost(bool, tag = "3")]
    pub need_eos: bool,
}

/// `telemetry.OpenConfigData` — one streamed message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OpenConfigData {
    #[prost(string, tag = "1")]
    pub system_id: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub component_id: u32,
    #[prost(uint32, tag = "3")]
    pub sub_component_id: u32,
    #[prost(string, tag = "4")]
    pub path: ::prost::alloc::string::String,
    #[prost(uint64, tag = "5")]
    pub sequence_number: u64,
    /// Milliseconds since the Unix epoch.
    #[prost(uint64, tag = "6")]
    pub timestamp: u64,
    #[prost(message, repeated, tag = "7")]
    pub kv: ::prost::alloc::vec::Vec<KeyValue>,
    #[prost(bool, tag = "10")]
    pub sync_response: bool,
}

/// `telemetry.KeyValue`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeyValue {
    #[prost(string, tag = "1")]
    pub key: ::prost::alloc::string::String,
    #[prost(oneof = "key_value::Value", tags = "5, 6, 7, 8, 9, 10, 11")]
    pub value: ::core::option::Option<key_value::Value>,
}

/// Nested types of [`KeyValue`].
pub mod key_value {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(double, tag = "5")]
        DoubleValue(f64),
        #[prost(int64, tag = "6")]
        IntValue(i64),
        #[prost(uint64, tag = "7")]
        UintValue(u64),
        #[prost(sint64, tag = "8")]
        SintValue(i64),
        #[prost(bool, tag = "9")]
        BoolValue(bool),
        #[prost(string, tag = "10")]
        StrValue(::prost::alloc::string::String),
        #[prost(bytes = "vec", tag = "11")]
        BytesValue(::prost::alloc::vec::Vec<u8>),
    }
}

impl KeyValue {
    /// Build a string-valued pair.
    pub fn str(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(key_value::Value::StrValue(value.into())),
        }
    }

    /// Build an integer-valued pair.
    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            value: Some(key_value::Value::IntValue(value)),
        }
    }

    /// Build an unsigned-valued pair.
    pub fn uint(key: impl Into<String>, value: u64) -> Self {
        Self {
            key: key.into(),
            value: Some(key_value::Value::UintValue(value)),
        }
    }

    /// Build a boolean-valued pair.
    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self {
            key: key.into(),
            value: Some(key_value::Value::BoolValue(value)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn open_config_data_decodes_oneof_values() {
        let data = OpenConfigData {
            path: "sensor_1000:/junos/system/linecard/interface/:/junos/system/linecard/interface/:PFE"
                .into(),
            timestamp: 1_700_000_000_123,
            kv: vec![
                KeyValue::str("__prefix__", "/interfaces/interface[name='ge-0/0/0']/"),
                KeyValue::uint("counters/in-octets", 100),
                KeyValue::bool("state/enabled", true),
            ],
            ..Default::default()
        };

        let bytes = data.encode_to_vec();
        let decoded = OpenConfigData::decode(bytes.as_slice()).unwrap();

        assert_eq!(decoded.kv.len(), 3);
        assert_eq!(
            decoded.kv[1].value,
            Some(key_value::Value::UintValue(100))
        );
        assert_eq!(decoded.timestamp, 1_700_000_000_123);
    }

    #[test]
    fn missing_value_decodes_as_none() {
        let kv = KeyValue {
            key: "counters/in-errors".into(),
            value: None,
        };
        let decoded = KeyValue::decode(kv.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.value, None);
    }
}
