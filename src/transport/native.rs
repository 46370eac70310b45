//! Real serial I/O backed by the `serialport` crate.

use super::descriptor::{dedupe_call_in_nodes, known_plotter_name, PortDescriptor};
use super::duplex::SerialDuplex;
use super::error::TransportError;
use serialport::SerialPort;
use std::io;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

/// Baud rate and read/write timeout for a new connection.
#[derive(Clone, Copy, Debug)]
pub struct OpenOptions {
    pub baud: u32,
    pub timeout: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            baud: 115_200,
            timeout: Duration::from_millis(3_000),
        }
    }
}

/// Settle time after opening the port, before the first write (§4.1 `open`).
pub const PORT_SETTLE: Duration = Duration::from_millis(150);

/// Enumerates physical serial ports, deduplicating macOS call-in/call-out
/// node pairs and tagging entries that match the known-plotter VID/PID list.
pub fn enumerate_ports() -> Result<Vec<PortDescriptor>, TransportError> {
    let raw = serialport::available_ports().map_err(|_| TransportError::NoDeviceFound)?;
    let descriptors: Vec<PortDescriptor> = raw
        .into_iter()
        .map(|p| {
            let (vendor_id, product_id, hardware_id) = match &p.port_type {
                serialport::SerialPortType::UsbPort(usb) => (
                    Some(usb.vid),
                    Some(usb.pid),
                    usb.serial_number.clone(),
                ),
                _ => (None, None, None),
            };
            let description = match &p.port_type {
                serialport::SerialPortType::UsbPort(usb) => usb.product.clone(),
                _ => None,
            };
            PortDescriptor::new(p.port_name, description, vendor_id, product_id, hardware_id)
        })
        .collect();
    Ok(dedupe_call_in_nodes(descriptors))
}

/// Returns the first enumerated port whose VID/PID matches the known-plotter
/// list, in enumeration order (§4.1 `find_compatible_port`).
pub fn find_compatible_port() -> Result<Option<PortDescriptor>, TransportError> {
    Ok(enumerate_ports()?.into_iter().find(|p| {
        p.vendor_id
            .zip(p.product_id)
            .map(|(v, p)| known_plotter_name(v, p).is_some())
            .unwrap_or(false)
    }))
}

/// Opens `path` at `options.baud`, 8N1, no flow control, and waits
/// [`PORT_SETTLE`] before returning.
pub fn open_port(path: &str, options: OpenOptions) -> Result<NativePort, TransportError> {
    let port = serialport::new(path, options.baud)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .flow_control(serialport::FlowControl::None)
        .timeout(options.timeout)
        .open()
        .map_err(classify_open_error)?;
    std::thread::sleep(PORT_SETTLE);
    debug!(path, baud = options.baud, "serial port opened");
    Ok(NativePort { port })
}

fn classify_open_error(err: serialport::Error) -> TransportError {
    use serialport::ErrorKind;
    match err.kind {
        ErrorKind::NoDevice => TransportError::NoDeviceFound,
        ErrorKind::Io(io::ErrorKind::PermissionDenied) => TransportError::PermissionDenied,
        ErrorKind::Io(io::ErrorKind::AddrInUse) => TransportError::PortInUse,
        _ => TransportError::NotResponding,
    }
}

/// The real [`SerialDuplex`] realization, backed by an OS serial handle.
pub struct NativePort {
    port: Box<dyn SerialPort>,
}

impl SerialDuplex for NativePort {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.port.write_all(buf)
    }

    fn read_available(&mut self, timeout: Duration) -> io::Result<Vec<u8>> {
        self.port.set_timeout(timeout).ok();
        let mut buf = [0u8; 1024];
        match self.port.read(&mut buf) {
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
