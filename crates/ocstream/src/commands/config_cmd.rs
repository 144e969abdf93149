//! Config subcommand handlers.

use ocstream_config::{CollectorConfig, save_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = super::config_path(global);

    match args.command {
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }

        ConfigCommand::Show => {
            let mut cfg = super::load_config(global)?;
            if cfg.sink.password.is_some() {
                cfg.sink.password = Some("********".into());
            }
            if cfg.store_path.is_none() {
                cfg.store_path = Some(super::open_store(global, &cfg).path().to_path_buf());
            }
            let rendered =
                toml::to_string_pretty(&cfg).map_err(ocstream_config::ConfigError::from)?;
            print!("{rendered}");
            Ok(())
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            save_config(&CollectorConfig::default(), &path)?;
            eprintln!("Wrote {}", path.display());
            Ok(())
        }
    }
}
