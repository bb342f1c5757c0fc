use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{Error, Transport};

/// Records writes and closes instead of touching a socket.
#[derive(Default)]
pub(crate) struct MockTransport {
    written: Mutex<Vec<Vec<u8>>>,
    closes: Mutex<usize>,
    fail_writes: bool,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_writes: true,
            ..Self::default()
        })
    }

    pub(crate) fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        *self.closes.lock()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

impl Transport for MockTransport {
    fn write(&self, bytes: Bytes) -> Result<(), Error> {
        if self.fail_writes {
            return Err(Error::Transport(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        self.written.lock().push(bytes.to_vec());
        Ok(())
    }

    fn close(&self) {
        *self.closes.lock() += 1;
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        "127.0.0.1:9000".parse().ok()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        "127.0.0.1:54321".parse().ok()
    }
}
