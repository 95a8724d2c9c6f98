use std::io::Read;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Connector, Link, LinkConfig};

/// Opens [`SerialLink`]s on real serial devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    type Link = SerialLink;

    fn open(&self, config: &LinkConfig) -> Result<SerialLink> {
        SerialLink::open(config)
    }
}

/// A serial port configured 8N1 without flow control.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    device: String,
}

impl SerialLink {
    /// Open the device named in `config`.
    pub fn open(config: &LinkConfig) -> Result<Self> {
        config.validate()?;
        let port = serialport::new(&config.device, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|err| TransportError::Open {
                device: config.device.clone(),
                baud_rate: config.baud_rate,
                source: err.into(),
            })?;

        info!(device = %config.device, baud_rate = config.baud_rate, "opened serial link");
        Ok(Self {
            port,
            device: config.device.clone(),
        })
    }

    /// Device this link was opened on.
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Link for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }

    fn bytes_to_read(&mut self) -> std::io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(Into::into)
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        debug!(device = %self.device, "closing serial link");
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device", &self.device)
            .finish()
    }
}

/// One enumerated serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSummary {
    pub name: String,
    pub kind: &'static str,
    pub description: Option<String>,
}

/// List the serial ports visible to this process.
pub fn available_ports() -> Result<Vec<PortSummary>> {
    let ports =
        serialport::available_ports().map_err(|err| TransportError::Enumerate(err.to_string()))?;
    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, description) = match port.port_type {
                SerialPortType::UsbPort(usb) => {
                    let product = usb.product.unwrap_or_default();
                    (
                        "usb",
                        Some(format!("{:04x}:{:04x} {}", usb.vid, usb.pid, product)),
                    )
                }
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortSummary {
                name: port.port_name,
                kind,
                description: description.map(|d| d.trim().to_string()),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_device_reports_open_error() {
        let cfg = LinkConfig::new("/dev/serialpose-does-not-exist", 115_200);
        let err = SerialLink::open(&cfg).unwrap_err();
        match err {
            TransportError::Open {
                device, baud_rate, ..
            } => {
                assert_eq!(device, "/dev/serialpose-does-not-exist");
                assert_eq!(baud_rate, 115_200);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn open_rejects_invalid_config_before_touching_the_device() {
        let cfg = LinkConfig::new("", 115_200);
        let err = SerialConnector.open(&cfg).unwrap_err();
        assert!(matches!(err, TransportError::InvalidConfig(_)));
    }
}
