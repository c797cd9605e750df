use anyhow::{anyhow, Result};
use clap::ArgMatches;
use std::path::Path;

use crate::api::modbus::LinkConfig;

/// Read a link config from a TOML file.
pub fn load_config_file(path: &Path) -> Result<LinkConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| anyhow!("Failed to read config {}: {err}", path.display()))?;
    LinkConfig::from_toml(&text).map_err(|err| anyhow!("{}: {err}", path.display()))
}

/// Config file (or defaults) with command-line overrides applied on top.
pub fn resolve_config(matches: &ArgMatches) -> Result<LinkConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            log::info!("Loading configuration from file: {path}");
            load_config_file(Path::new(path))?
        }
        None => LinkConfig::default(),
    };

    if let Some(port) = matches.get_one::<String>("port") {
        config.port_name = port.clone();
    }
    if let Some(baud) = matches.get_one::<u32>("baud") {
        config.baud_rate = *baud;
    }
    if let Some(slave) = matches.get_one::<u8>("slave") {
        config.slave_address = *slave;
    }

    config.validate()?;
    Ok(config)
}
