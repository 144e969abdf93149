//! Clap derive structures for the `ocstream` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use ocstream_core::Compression;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// ocstream -- OpenConfig streaming telemetry collector
#[derive(Debug, Parser)]
#[command(
    name = "ocstream",
    version,
    about = "Collect OpenConfig streaming telemetry into InfluxDB",
    long_about = "Keeps a gRPC telemetry subscription open to every configured device,\n\
        rebuilds per-interface records from the key/value stream and writes\n\
        them to InfluxDB in batches.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "OCSTREAM_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Device store file (overrides store_path from the config)
    #[arg(long, env = "OCSTREAM_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the collector
    Run(RunArgs),

    /// Manage stored device definitions
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Inspect and initialize the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Do not start the admin HTTP API
    #[arg(long)]
    pub no_admin: bool,

    /// Admin API listen address (overrides admin.listen)
    #[arg(long)]
    pub listen: Option<String>,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List stored devices
    #[command(alias = "ls")]
    List {
        #[arg(long, short = 'o', default_value = "table")]
        output: OutputFormat,
    },

    /// Add or replace a device
    Add(Box<DeviceAddArgs>),

    /// Remove a device by id
    #[command(alias = "rm")]
    Remove {
        /// Device id (defaults to the host when the device was added)
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct DeviceAddArgs {
    /// Read the device definition from a JSON file instead of flags
    #[arg(long, conflicts_with_all = ["host", "port"])]
    pub from_file: Option<PathBuf>,

    /// Device hostname or address
    #[arg(long, required_unless_present = "from_file")]
    pub host: Option<String>,

    /// gRPC port
    #[arg(long, required_unless_present = "from_file")]
    pub port: Option<u16>,

    /// Device id (defaults to the host)
    #[arg(long)]
    pub id: Option<String>,

    /// Login user
    #[arg(long)]
    pub user: Option<String>,

    /// Login password
    #[arg(long, env = "OCSTREAM_DEVICE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Send credentials as request metadata instead of calling login
    #[arg(long)]
    pub meta: bool,

    /// Request an end-of-sync marker
    #[arg(long)]
    pub eos: bool,

    /// Client id for the login call
    #[arg(long)]
    pub cid: Option<String>,

    /// Initial HTTP/2 stream window in bytes
    #[arg(long)]
    pub window_size: Option<u32>,

    /// Stream compression
    #[arg(long, value_enum)]
    pub compression: Option<CompressionArg>,

    /// CA bundle; enables TLS
    #[arg(long)]
    pub ca: Option<String>,

    /// Client certificate (PEM)
    #[arg(long, requires = "ca")]
    pub client_crt: Option<String>,

    /// Client key (PEM)
    #[arg(long, requires = "ca")]
    pub client_key: Option<String>,

    /// Expected TLS server name
    #[arg(long, requires = "ca")]
    pub server_name: Option<String>,

    /// Sensor path, optionally with a sample frequency in ms: PATH[@FREQ]
    #[arg(long = "path", value_name = "PATH[@FREQ]")]
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CompressionArg {
    None,
    Gzip,
    Deflate,
}

impl From<CompressionArg> for Compression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => Self::None,
            CompressionArg::Gzip => Self::Gzip,
            CompressionArg::Deflate => Self::Deflate,
        }
    }
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
