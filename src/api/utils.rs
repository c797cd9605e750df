use anyhow::{anyhow, Result};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};

/// Open a serial port with the controller's 8E1 framing, enabling exclusive access on Unix systems.
pub fn open_serial_port(
    port: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn serialport::SerialPort>> {
    if port.trim().is_empty() {
        return Err(anyhow!("No serial port configured"));
    }

    let builder = serialport::new(port, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::Even)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(timeout);

    #[cfg(unix)]
    {
        let mut handle = builder
            .open_native()
            .map_err(|err| anyhow!("Failed to open port {port}: {err}"))?;
        handle
            .set_exclusive(true)
            .map_err(|err| anyhow!("Failed to acquire exclusive access to {port}: {err}"))?;
        Ok(Box::new(handle))
    }

    #[cfg(not(unix))]
    {
        builder
            .open()
            .map_err(|err| anyhow!("Failed to open port {port}: {err}"))
    }
}

/// Names of the serial ports the OS reports.
pub fn available_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()
        .map_err(|err| anyhow!("Failed to enumerate serial ports: {err}"))?;
    Ok(ports.into_iter().map(|info| info.port_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_port_name_rejected() {
        let err = open_serial_port("  ", 19200, Duration::from_millis(100)).unwrap_err();
        assert!(err.to_string().contains("No serial port"));
    }
}
