//! Device subcommand handlers. These edit the store file directly; a
//! running collector picks changes up on its next start (use the admin
//! API to change a live fleet).

use secrecy::SecretString;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use ocstream_core::{DeviceConfig, DeviceStore, SubscriptionPath};

use crate::cli::{DeviceAddArgs, DevicesArgs, DevicesCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Auth")]
    auth: &'static str,
    #[tabled(rename = "TLS")]
    tls: &'static str,
    #[tabled(rename = "Paths")]
    paths: String,
}

impl From<&DeviceConfig> for DeviceRow {
    fn from(d: &DeviceConfig) -> Self {
        Self {
            id: d.id.clone(),
            endpoint: d.endpoint(),
            user: d.username.clone(),
            auth: if d.metadata_credentials {
                "metadata"
            } else if d.login_request().is_some() {
                "login"
            } else {
                "-"
            },
            tls: if d.tls.is_active() { "yes" } else { "no" },
            paths: d
                .paths
                .iter()
                .map(|p| format!("{}@{}", p.path, p.frequency))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

pub fn handle(args: DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = super::load_config(global)?;
    let store = super::open_store(global, &cfg);

    match args.command {
        DevicesCommand::List { output } => {
            let devices: Vec<DeviceConfig> =
                store.list()?.iter().map(DeviceConfig::redacted).collect();
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&devices)?),
                OutputFormat::Table => {
                    let rows: Vec<DeviceRow> = devices.iter().map(DeviceRow::from).collect();
                    println!("{}", Table::new(rows).with(Style::rounded()));
                }
            }
            Ok(())
        }

        DevicesCommand::Add(add) => {
            let device = build_device(*add)?.normalized();
            device.validate()?;
            let stored = store.upsert(device)?;
            eprintln!("Stored device {} ({})", stored.id, stored.endpoint());
            Ok(())
        }

        DevicesCommand::Remove { id } => {
            if store.remove(&id)? {
                eprintln!("Removed device {id}");
                Ok(())
            } else {
                Err(CliError::NotFound { identifier: id })
            }
        }
    }
}

fn build_device(args: DeviceAddArgs) -> Result<DeviceConfig, CliError> {
    if let Some(path) = args.from_file {
        let raw = std::fs::read_to_string(&path)?;
        return Ok(serde_json::from_str(&raw)?);
    }

    let (Some(host), Some(port)) = (args.host, args.port) else {
        return Err(CliError::Validation {
            field: "host/port".into(),
            reason: "both --host and --port are required".into(),
        });
    };

    let mut device = DeviceConfig::new(host, port);
    if let Some(id) = args.id {
        device.id = id;
    }
    device.username = args.user.unwrap_or_default();
    device.password = args.password.filter(|p| !p.is_empty()).map(SecretString::from);
    device.metadata_credentials = args.meta;
    device.end_of_sync = args.eos;
    device.client_id = args.cid.unwrap_or_default();
    device.window_size = args.window_size.unwrap_or_default();
    if let Some(compression) = args.compression {
        device.compression = compression.into();
    }
    if let Some(ca) = args.ca {
        device.tls.enabled = true;
        device.tls.ca = ca;
        device.tls.client_crt = args.client_crt.unwrap_or_default();
        device.tls.client_key = args.client_key.unwrap_or_default();
        device.tls.server_name = args.server_name.unwrap_or_default();
    }
    device.paths = args
        .paths
        .iter()
        .map(String::as_str)
        .map(parse_path)
        .collect::<Result<_, _>>()?;
    Ok(device)
}

/// `PATH[@FREQ]`, frequency in milliseconds.
fn parse_path(raw: &str) -> Result<SubscriptionPath, CliError> {
    let (path, frequency) = match raw.rsplit_once('@') {
        Some((path, freq)) => {
            let frequency = freq.parse().map_err(|_| CliError::Validation {
                field: "path".into(),
                reason: format!("sample frequency is not a number: {raw}"),
            })?;
            (path, frequency)
        }
        None => (raw, 0),
    };
    Ok(SubscriptionPath {
        path: path.to_owned(),
        frequency,
        mode: String::new(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn path_with_frequency() {
        let p = parse_path("/interfaces/@2000").unwrap();
        assert_eq!(p.path, "/interfaces/");
        assert_eq!(p.frequency, 2000);

        let p = parse_path("/junos/system/linecard/interface/").unwrap();
        assert_eq!(p.frequency, 0);

        assert!(parse_path("/interfaces/@fast").is_err());
    }
}
