// InfluxDB 1.x HTTP write client.
//
// Points are rendered to line protocol and POSTed to `/write` in one
// request per batch. Retrying a failed batch is the caller's job.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;

// ── Points ──────────────────────────────────────────────────────────

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

/// One tagged, timestamped measurement.
///
/// Tags and fields are kept sorted so rendered lines are stable.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Render as one line of line protocol.
    ///
    /// Empty tag values are omitted. Returns `None` for a point with no
    /// fields, which the database would reject.
    pub fn to_line(&self, precision: Precision) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }

        let mut line = escape(&self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }

        let mut sep = ' ';
        for (key, value) in &self.fields {
            line.push(sep);
            sep = ',';
            line.push_str(&escape(key, &[',', '=', ' ']));
            line.push('=');
            match value {
                FieldValue::Int(v) => {
                    let _ = write!(line, "{v}i");
                }
                FieldValue::Float(v) => {
                    let _ = write!(line, "{v}");
                }
                FieldValue::Bool(v) => {
                    let _ = write!(line, "{v}");
                }
                FieldValue::Str(v) => {
                    let _ = write!(line, "\"{}\"", escape(v, &['"', '\\']));
                }
            }
        }

        let _ = write!(line, " {}", precision.timestamp(self.timestamp));
        Some(line)
    }
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ── Precision ───────────────────────────────────────────────────────

/// Timestamp precision of written points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Precision {
    #[serde(rename = "ns")]
    Nanoseconds,
    #[serde(rename = "us")]
    Microseconds,
    #[default]
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    Seconds,
}

impl Precision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "us",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
        }
    }

    fn timestamp(self, ts: DateTime<Utc>) -> i64 {
        match self {
            Self::Nanoseconds => ts.timestamp_nanos_opt().unwrap_or(i64::MAX),
            Self::Microseconds => ts.timestamp_micros(),
            Self::Milliseconds => ts.timestamp_millis(),
            Self::Seconds => ts.timestamp(),
        }
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// Connection settings for the InfluxDB write endpoint.
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: Url,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub precision: Precision,
    pub timeout: Duration,
}

/// Batched line-protocol writer.
pub struct InfluxClient {
    http: reqwest::Client,
    write_url: Url,
    config: InfluxConfig,
}

impl InfluxClient {
    pub fn new(config: InfluxConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("ocstream/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_client(http, config)
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, config: InfluxConfig) -> Result<Self, Error> {
        let mut write_url = config.url.clone();
        write_url
            .path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("write");
        write_url
            .query_pairs_mut()
            .append_pair("db", &config.database)
            .append_pair("precision", config.precision.as_str());

        Ok(Self {
            http,
            write_url,
            config,
        })
    }

    /// The fully qualified write URL, query included.
    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// Write a batch of points in a single request.
    ///
    /// Points without fields are skipped. An empty batch is a no-op.
    pub async fn write(&self, points: &[Point]) -> Result<(), Error> {
        let body = points
            .iter()
            .filter_map(|p| p.to_line(self.config.precision))
            .collect::<Vec<_>>()
            .join("\n");
        if body.is_empty() {
            return Ok(());
        }

        debug!(points = points.len(), url = %self.write_url, "POST write");

        let mut req = self.http.post(self.write_url.clone()).body(body);
        if let Some(ref user) = self.config.username {
            let password = self.config.password.as_ref().map(|p| p.expose_secret().to_owned());
            req = req.basic_auth(user, password);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(Error::SinkRejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
    }

    #[test]
    fn renders_tags_fields_and_timestamp() {
        let point = Point::new("phy_interface", ts())
            .tag("name", "ge-0/0/0")
            .tag("host", "mx1")
            .tag("desc", "")
            .field("in_octets", 100_i64)
            .field("mtu", 1500_u32);

        insta::assert_snapshot!(
            point.to_line(Precision::Milliseconds).unwrap(),
            @"phy_interface,host=mx1,name=ge-0/0/0 in_octets=100i,mtu=1500i 1700000000123"
        );
    }

    #[test]
    fn escapes_special_characters() {
        let point = Point::new("my measurement", ts())
            .tag("desc", "uplink to core, rack=2")
            .field("note", "say \"hi\"\\")
            .field("up", true)
            .field("ratio", 0.5);

        insta::assert_snapshot!(
            point.to_line(Precision::Seconds).unwrap(),
            @r#"my\ measurement,desc=uplink\ to\ core\,\ rack\=2 note="say \"hi\"\\",ratio=0.5,up=true 1700000000"#
        );
    }

    #[test]
    fn point_without_fields_is_not_rendered() {
        let point = Point::new("phy_interface", ts()).tag("name", "ge-0/0/0");
        assert_eq!(point.to_line(Precision::Milliseconds), None);
    }

    #[test]
    fn write_url_carries_database_and_precision() {
        let client = InfluxClient::new(InfluxConfig {
            url: Url::parse("http://influx:8086/").unwrap(),
            database: "ot".into(),
            username: None,
            password: None,
            precision: Precision::Milliseconds,
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        assert_eq!(
            client.write_url().as_str(),
            "http://influx:8086/write?db=ot&precision=ms"
        );
    }

    #[test]
    fn precision_parses_from_short_names() {
        let p: Precision = serde_json::from_str("\"us\"").unwrap();
        assert_eq!(p, Precision::Microseconds);
    }
}
