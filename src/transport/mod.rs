//! Serial transport layer: port discovery, the byte-level duplex
//! abstraction, and the request/response + character-counting streaming
//! connection built on top of it.

pub mod connection;
pub mod descriptor;
pub mod duplex;
pub mod error;
pub mod reconnect;

#[cfg(feature = "serial")]
pub mod native;

#[cfg(test)]
pub mod mock;

pub use connection::{Connection, StreamingStatus, RX_BUFFER_CAPACITY};
pub use descriptor::PortDescriptor;
pub use duplex::SerialDuplex;
pub use error::TransportError;
pub use reconnect::{ReconnectSupervisor, OPEN_BACKOFF_UNIT, RECONNECT_BACKOFF_UNIT};

#[cfg(feature = "serial")]
pub use native::{NativePort, OpenOptions};

/// Opens a connection to `path` (or the first compatible auto-detected
/// port if `None`), retrying through [`ReconnectSupervisor`] on failure
/// (§4.1 `open`).
#[cfg(feature = "serial")]
pub async fn open(
    path: Option<String>,
    options: OpenOptions,
) -> Result<Connection<NativePort>, TransportError> {
    let path = match path {
        Some(p) => p,
        None => native::find_compatible_port()?
            .map(|d| d.path)
            .ok_or(TransportError::NoDeviceFound)?,
    };
    ReconnectSupervisor::run_with_backoff(
        || {
            let path = path.clone();
            async move {
                let port = tokio::task::spawn_blocking(move || native::open_port(&path, options))
                    .await
                    .map_err(|_| TransportError::NotResponding)??;
                Ok(Connection::new(port))
            }
        },
        OPEN_BACKOFF_UNIT,
    )
    .await
}
