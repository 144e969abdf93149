// ── Device definitions ──
//
// `DeviceConfig` is the persisted record of one telemetry device. It is
// an immutable snapshot once handed to a session; the only mutable
// per-device state is the `DeviceLifecycle` cell.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use ocstream_api::proto::{LoginRequest, Path, SubscriptionAdditionalConfig, SubscriptionRequest};
use ocstream_api::{ChannelConfig, Compression, MetadataCredentials, TlsFiles};

use crate::error::CoreError;

/// One subscribed sensor path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPath {
    pub path: String,
    /// Sample frequency in milliseconds.
    #[serde(rename = "freq", default)]
    pub frequency: u64,
    /// Free-form mode label, stored and echoed but not interpreted.
    #[serde(default)]
    pub mode: String,
}

/// TLS material locations as stored with the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsMaterial {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub client_crt: String,
    #[serde(default)]
    pub client_key: String,
    #[serde(default)]
    pub ca: String,
    #[serde(default)]
    pub server_name: String,
}

impl TlsMaterial {
    /// TLS is used when explicitly enabled or when a CA bundle is set.
    pub fn is_active(&self) -> bool {
        self.enabled || !self.ca.is_empty()
    }
}

/// Configuration for one telemetry device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique key. Defaults to `host` when empty.
    #[serde(default)]
    pub id: String,
    pub host: String,
    pub port: u16,
    #[serde(rename = "user", default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(
        default,
        serialize_with = "serialize_secret",
        deserialize_with = "deserialize_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<SecretString>,
    /// Send credentials as request metadata instead of calling login.
    #[serde(rename = "meta", default)]
    pub metadata_credentials: bool,
    /// Ask the device for an end-of-sync marker.
    #[serde(rename = "eos", default)]
    pub end_of_sync: bool,
    /// Client id passed to the login call.
    #[serde(rename = "cid", default)]
    pub client_id: String,
    /// Initial HTTP/2 stream window in bytes; 0 keeps the default.
    #[serde(rename = "ws", default)]
    pub window_size: u32,
    #[serde(default)]
    pub tls: TlsMaterial,
    #[serde(default)]
    pub paths: Vec<SubscriptionPath>,
    #[serde(default)]
    pub compression: Compression,
}

fn serialize_secret<S: Serializer>(
    value: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secret<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<SecretString>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

impl DeviceConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            id: host.clone(),
            host,
            port,
            username: String::new(),
            password: None,
            metadata_credentials: false,
            end_of_sync: false,
            client_id: String::new(),
            window_size: 0,
            tls: TlsMaterial::default(),
            paths: Vec::new(),
            compression: Compression::None,
        }
    }

    /// Fill defaulted fields: an empty id becomes the host.
    pub fn normalized(mut self) -> Self {
        if self.id.trim().is_empty() {
            self.id.clone_from(&self.host);
        }
        self
    }

    /// Reject records no session could ever use.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.host.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "host must not be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(CoreError::ValidationFailed {
                message: format!("{}: port must not be 0", self.host),
            });
        }
        if self.tls.enabled
            && (self.tls.ca.is_empty()
                || self.tls.client_crt.is_empty()
                || self.tls.client_key.is_empty())
        {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "{}: TLS needs ca, client_crt and client_key",
                    self.host
                ),
            });
        }
        if let Some(p) = self.paths.iter().find(|p| p.path.is_empty()) {
            return Err(CoreError::ValidationFailed {
                message: format!("{}: empty subscription path (mode {:?})", self.host, p.mode),
            });
        }
        Ok(())
    }

    /// `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// A copy safe to hand out over the admin API.
    pub fn redacted(&self) -> Self {
        Self {
            password: None,
            ..self.clone()
        }
    }

    fn has_credentials(&self) -> bool {
        !self.username.is_empty()
            && self
                .password
                .as_ref()
                .is_some_and(|p| !p.expose_secret().is_empty())
    }

    // ── Wire requests ────────────────────────────────────────────────

    /// Channel options for dialing this device.
    pub fn channel_config(&self, connect_timeout: Duration) -> ChannelConfig {
        let mut channel = ChannelConfig::new(self.host.clone(), self.port);
        channel.compression = self.compression;
        channel.connect_timeout = connect_timeout;
        channel.initial_window_size = (self.window_size != 0).then_some(self.window_size);
        if self.tls.is_active() {
            channel.tls = Some(TlsFiles {
                ca: PathBuf::from(&self.tls.ca),
                client_cert: PathBuf::from(&self.tls.client_crt),
                client_key: PathBuf::from(&self.tls.client_key),
                server_name: Some(self.tls.server_name.clone()).filter(|s| !s.is_empty()),
            });
        }
        channel
    }

    /// Login request, when this device authenticates with a login call.
    pub fn login_request(&self) -> Option<LoginRequest> {
        if self.metadata_credentials || !self.has_credentials() {
            return None;
        }
        Some(LoginRequest {
            user_name: self.username.clone(),
            password: self
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_owned())
                .unwrap_or_default(),
            client_id: self.client_id.clone(),
        })
    }

    /// Credentials to attach to the subscribe call as metadata.
    pub fn metadata_credentials(&self) -> Option<MetadataCredentials<'_>> {
        if !self.metadata_credentials {
            return None;
        }
        Some(MetadataCredentials {
            username: &self.username,
            password: self.password.as_ref().map_or("", |p| p.expose_secret()),
        })
    }

    /// One subscription request covering every configured path.
    pub fn subscription_request(&self) -> SubscriptionRequest {
        SubscriptionRequest {
            path_list: self
                .paths
                .iter()
                .map(|p| Path {
                    path: p.path.clone(),
                    sample_frequency: u32::try_from(p.frequency).unwrap_or(u32::MAX),
                    ..Default::default()
                })
                .collect(),
            additional_config: Some(SubscriptionAdditionalConfig {
                need_eos: self.end_of_sync,
                ..Default::default()
            }),
        }
    }
}

// ── Session timing ──────────────────────────────────────────────────

/// Waits used by the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Pause before a new connect cycle after dial or login failure.
    pub retry_delay: Duration,
    /// Pause after a mid-stream receive error.
    pub recv_error_cooldown: Duration,
    /// How often session statistics are emitted. Zero disables them.
    pub stats_interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(10),
            recv_error_cooldown: Duration::from_secs(60),
            stats_interval: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

// ── Lifecycle cell ──────────────────────────────────────────────────

/// Shared removal state for one device.
///
/// Written by the fleet, read by the session. Removal both sets the
/// flag (checked at the session's poll points) and cancels the token
/// (interrupting whatever the session is waiting on).
#[derive(Debug, Clone)]
pub struct DeviceLifecycle {
    inner: Arc<LifecycleInner>,
}

#[derive(Debug)]
struct LifecycleInner {
    removed: AtomicBool,
    cancel: CancellationToken,
}

impl DeviceLifecycle {
    /// A lifecycle cell cancelled together with `parent`.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            inner: Arc::new(LifecycleInner {
                removed: AtomicBool::new(false),
                cancel: parent.child_token(),
            }),
        }
    }

    pub fn mark_removed(&self) {
        self.inner.removed.store(true, Ordering::Release);
        self.inner.cancel.cancel();
    }

    pub fn is_removed(&self) -> bool {
        self.inner.removed.load(Ordering::Acquire)
    }

    /// Removed, or the whole collector is shutting down.
    pub fn is_stopped(&self) -> bool {
        self.is_removed() || self.inner.cancel.is_cancelled()
    }

    /// Resolves once the device is removed or the collector stops.
    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancel.cancelled()
    }
}
