use chrono::Local;
use log::{LevelFilter, Record};
use std::io::{self, Write};

use env_logger::{Builder, Target};

/// Environment variable naming a file that receives all log output.
pub const LOG_FILE_ENV: &str = "CTS602_LOG_FILE";

/// Logger setup shared by every entrypoint. `RUST_LOG` filters as usual.
pub fn init_logging() {
    match std::env::var(LOG_FILE_ENV) {
        Ok(path) if !path.trim().is_empty() => {
            if let Err(err) = init_file_logger(&path) {
                eprintln!("Failed to initialize file logger at '{path}': {err}");
                init_console_logger();
            }
        }
        _ => init_console_logger(),
    }
}

fn init_console_logger() {
    Builder::new()
        .filter_level(LevelFilter::Warn)
        .parse_default_env()
        .init();
}

fn init_file_logger(path: &str) -> io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
            writeln!(buf, "{}", log_line(&timestamp, record))
        })
        .target(Target::Pipe(Box::new(file)))
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .init();

    log::info!("File logger initialized at {path}");

    Ok(())
}

/// `<timestamp> <LEVEL> [<module>] <message> (<file>:<line>)`, with the
/// crate prefix dropped from the module path.
fn log_line(timestamp: &str, record: &Record) -> String {
    let module = record.module_path().unwrap_or(record.target());
    let module = module.strip_prefix("cts602::").unwrap_or(module);
    format!(
        "{timestamp} {:<5} [{module}] {} ({}:{})",
        record.level(),
        record.args(),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0)
    )
}
