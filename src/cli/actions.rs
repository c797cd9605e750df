use anyhow::{anyhow, Result};
use clap::ArgMatches;
use serde::Serialize;
use std::time::Duration;

use super::config::resolve_config;
use crate::{
    api::{
        modbus::{LinkConfig, ModbusMaster},
        utils::available_ports,
    },
    core::task_manager::spawn_blocking_task,
    protocol::{
        modbus::RegisterClass,
        registers::{RegisterId, CATALOG},
    },
};

/// Dispatch the selected subcommand.
pub async fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("ports", _)) => list_ports(),
        Some(("registers", sub)) => print_catalog(sub.get_flag("json")),
        Some(("poll", sub)) => {
            let every = Duration::from_secs(*sub.get_one::<u64>("every").unwrap_or(&5));
            poll(resolve_config(sub)?, every).await
        }
        Some(("read", sub)) => {
            let class = match sub.get_one::<String>("class").map(String::as_str) {
                Some("holding") => RegisterClass::Holding,
                _ => RegisterClass::Input,
            };
            let start = *sub
                .get_one::<u16>("start")
                .ok_or_else(|| anyhow!("start address is required"))?;
            let quantity = *sub.get_one::<u16>("quantity").unwrap_or(&1);
            read_once(resolve_config(sub)?, class, start, quantity).await
        }
        Some(("write", sub)) => {
            let address = *sub
                .get_one::<u16>("address")
                .ok_or_else(|| anyhow!("address is required"))?;
            let values: Vec<u16> = sub
                .get_many::<u16>("values")
                .map(|values| values.copied().collect())
                .unwrap_or_default();
            write_once(resolve_config(sub)?, address, values).await
        }
        _ => Err(anyhow!("No command given, see --help")),
    }
}

fn list_ports() -> Result<()> {
    let ports = available_ports()?;
    if ports.is_empty() {
        eprintln!("No serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

#[derive(Serialize)]
struct CatalogRow {
    id: &'static str,
    class: RegisterClass,
    address: u16,
    name: &'static str,
    rule: crate::protocol::registers::DecodeRule,
}

fn print_catalog(json: bool) -> Result<()> {
    if json {
        let rows: Vec<CatalogRow> = CATALOG
            .iter()
            .map(|desc| CatalogRow {
                id: desc.id.label(),
                class: desc.class,
                address: desc.address,
                name: desc.name,
                rule: desc.rule,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for desc in CATALOG.iter() {
        println!(
            "{:<8} {:>5}  {:<24} {}",
            desc.class.to_string(),
            desc.address,
            desc.id.label(),
            desc.name
        );
    }
    Ok(())
}

/// Open the link on the blocking pool; serial setup and I/O are synchronous.
async fn with_master<F, T>(config: LinkConfig, job: F) -> Result<T>
where
    F: FnOnce(&ModbusMaster) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking_task("cts602-oneshot", move || {
        let master = ModbusMaster::open(config)?;
        job(&master)
    })?
    .await?
}

async fn read_once(
    config: LinkConfig,
    class: RegisterClass,
    start: u16,
    quantity: u16,
) -> Result<()> {
    let values = with_master(config, move |master| {
        let values = match class {
            RegisterClass::Input => master.read_input_block(start, quantity)?,
            RegisterClass::Holding => master.read_holding_block(start, quantity)?,
        };
        Ok(values)
    })
    .await?;

    for (offset, raw) in values.iter().enumerate() {
        let address = start.wrapping_add(offset as u16);
        match RegisterId::find(class, address) {
            Some(id) => {
                let desc = id.descriptor();
                println!(
                    "{class} {address:>5} = {raw:>5}  {} ({})",
                    desc.decode(*raw),
                    desc.name
                );
            }
            None => println!("{class} {address:>5} = {raw:>5}"),
        }
    }
    Ok(())
}

async fn write_once(config: LinkConfig, address: u16, values: Vec<u16>) -> Result<()> {
    with_master(config, move |master| {
        match values.as_slice() {
            [value] => master.write_single_holding(address, *value)?,
            many => master.write_multiple_holding(address, many)?,
        }
        Ok(())
    })
    .await?;
    println!("OK");
    Ok(())
}

async fn poll(config: LinkConfig, every: Duration) -> Result<()> {
    let master = spawn_blocking_task("cts602-open", move || ModbusMaster::open(config))?.await??;
    master.start_polling()?;

    let (stop_tx, stop_rx) = flume::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .map_err(|err| anyhow!("Failed to install Ctrl-C handler: {err}"))?;

    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => print_status(&master),
            _ = stop_rx.recv_async() => break,
        }
    }

    log::info!("Stopping poll loop");
    if let Some(handle) = master.stop_polling() {
        handle.await?;
    }
    Ok(())
}

fn print_status(master: &ModbusMaster) {
    let health = master.health();
    println!(
        "online={} ok={} fail={} last_error={} since_last_ok={:.1}s",
        health.online,
        health.ok_count,
        health.fail_count,
        health.last_error,
        health.seconds_since_last_ok
    );
    for (id, state) in master.cache_snapshot() {
        if state.valid {
            let desc = id.descriptor();
            println!("  {:<32} {}", desc.name, desc.decode(state.raw));
        }
    }
}
