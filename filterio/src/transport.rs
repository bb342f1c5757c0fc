use std::net::SocketAddr;

use bytes::Bytes;

use crate::Error;

/// The write/close half of a connection, as seen by a session.
///
/// Implemented by the I/O layer driving the session. `write` must queue the bytes and
/// return immediately; the I/O layer reports the completed write back through
/// [`EventHandler::handle_write_complete`](crate::EventHandler::handle_write_complete).
pub trait Transport: Send + Sync + 'static {
    /// Queues `bytes` for writing.
    fn write(&self, bytes: Bytes) -> Result<(), Error>;

    /// Asks the I/O layer to shut the connection down. Idempotent.
    fn close(&self);

    /// Local address of the connection.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Remote address of the connection.
    fn peer_addr(&self) -> Option<SocketAddr>;
}
