// Shared channel configuration for dialing telemetry devices.
//
// Every device connection goes through `ChannelConfig::connect`, which
// loads TLS material, applies compression and flow-control options, and
// hands back a `tonic` channel ready for the login and subscribe clients.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rustls::RootCertStore;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use serde::{Deserialize, Serialize};
use tonic::codec::CompressionEncoding;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tracing::debug;

use crate::error::Error;

/// Payload compression the device is asked to use on the stream.
///
/// Serialized lowercase; an empty string reads as `none`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    #[serde(alias = "")]
    None,
    Gzip,
    Deflate,
}

impl Compression {
    pub(crate) fn encoding(self) -> Option<CompressionEncoding> {
        match self {
            Self::None => None,
            Self::Gzip => Some(CompressionEncoding::Gzip),
            Self::Deflate => Some(CompressionEncoding::Deflate),
        }
    }
}

/// File locations of a device's TLS material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// PEM bundle of trusted CA certificates.
    pub ca: PathBuf,
    /// Client certificate presented to the device.
    pub client_cert: PathBuf,
    /// Private key for `client_cert`.
    pub client_key: PathBuf,
    /// Expected server name; defaults to the dialed host when empty.
    pub server_name: Option<String>,
}

/// Everything needed to open a channel to one device.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsFiles>,
    pub compression: Compression,
    /// Initial HTTP/2 stream window in bytes. `None` keeps the default.
    pub initial_window_size: Option<u32>,
    pub connect_timeout: Duration,
}

impl ChannelConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: None,
            compression: Compression::None,
            initial_window_size: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// `scheme://host:port` for the configured security mode.
    pub fn endpoint_uri(&self) -> String {
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Build the endpoint without dialing.
    ///
    /// TLS material is loaded and validated here, so a broken bundle is
    /// reported before any network traffic.
    pub fn endpoint(&self) -> Result<Endpoint, Error> {
        let uri = self.endpoint_uri();
        let mut endpoint =
            Endpoint::from_shared(uri.clone()).map_err(|e| Error::InvalidEndpoint {
                endpoint: uri.clone(),
                reason: e.to_string(),
            })?;

        endpoint = endpoint
            .connect_timeout(self.connect_timeout)
            .initial_stream_window_size(self.initial_window_size);

        if let Some(ref files) = self.tls {
            let tls = load_tls(files, &self.host)?;
            endpoint = endpoint.tls_config(tls).map_err(|e| Error::Tls(e.to_string()))?;
        }

        Ok(endpoint)
    }

    /// Dial the device.
    pub async fn connect(&self) -> Result<Channel, Error> {
        let endpoint = self.endpoint()?;
        debug!(endpoint = %self.endpoint_uri(), "dialing device");
        endpoint.connect().await.map_err(|source| Error::Connect {
            endpoint: self.endpoint_uri(),
            source,
        })
    }
}

// ── TLS loading ─────────────────────────────────────────────────────

fn read_file(what: &'static str, path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|source| Error::TlsRead {
        what,
        path: path.display().to_string(),
        source,
    })
}

/// Load client identity and CA bundle into a `ClientTlsConfig`.
///
/// The CA bundle must contribute at least one certificate to a trust
/// pool; the client certificate and key must both parse as PEM.
fn load_tls(files: &TlsFiles, host: &str) -> Result<ClientTlsConfig, Error> {
    let cert_pem = read_file("client certificate", &files.client_cert)?;
    let key_pem = read_file("client key", &files.client_key)?;
    let ca_pem = read_file("CA bundle", &files.ca)?;

    let cert_count = CertificateDer::pem_slice_iter(&cert_pem)
        .filter_map(Result::ok)
        .count();
    if cert_count == 0 {
        return Err(Error::Tls(format!(
            "no certificate found in {}",
            files.client_cert.display()
        )));
    }
    PrivateKeyDer::from_pem_slice(&key_pem).map_err(|e| {
        Error::Tls(format!(
            "invalid private key in {}: {e}",
            files.client_key.display()
        ))
    })?;

    let pool = trust_pool(&ca_pem)?;
    debug!(anchors = pool.len(), "loaded CA bundle");

    let server_name = files
        .server_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| host.to_owned());

    Ok(ClientTlsConfig::new()
        .ca_certificate(Certificate::from_pem(ca_pem))
        .identity(Identity::from_pem(cert_pem, key_pem))
        .domain_name(server_name))
}

/// Append every certificate of a PEM bundle to a fresh trust pool.
pub fn trust_pool(ca_pem: &[u8]) -> Result<RootCertStore, Error> {
    let mut pool = RootCertStore::empty();
    for cert in CertificateDer::pem_slice_iter(ca_pem) {
        let cert = cert.map_err(|e| Error::Tls(format!("unreadable CA certificate: {e}")))?;
        pool.add(cert)
            .map_err(|e| Error::Tls(format!("CA certificate rejected by trust pool: {e}")))?;
    }
    if pool.is_empty() {
        return Err(Error::Tls("no certificates in CA bundle".into()));
    }
    Ok(pool)
}
