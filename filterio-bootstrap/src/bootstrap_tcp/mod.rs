use std::{
    io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use bytes::Bytes;
use log::{trace, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::{Notify, broadcast, mpsc},
};

use filterio::{Error, EventHandler, IoHandler, Transport};

use super::DEFAULT_TIMEOUT_DURATION;

pub(crate) mod tcp_client;
pub(crate) mod tcp_server;

/// [`Transport`] handed to a session: queues writes for the connection task.
struct TcpTransport {
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    write_tx: mpsc::UnboundedSender<Bytes>,
    close_notify: Arc<Notify>,
    closed: AtomicBool,
}

impl Transport for TcpTransport {
    fn write(&self, bytes: Bytes) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Transport(io::Error::new(
                io::ErrorKind::NotConnected,
                "transport is closed",
            )));
        }
        self.write_tx
            .send(bytes)
            .map_err(|_| Error::Transport(io::ErrorKind::BrokenPipe.into()))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.close_notify.notify_one();
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer_addr)
    }
}

/// An established TCP connection whose session has been opened.
pub(crate) struct Connection<H: IoHandler> {
    stream: TcpStream,
    events: EventHandler<H>,
    write_rx: mpsc::UnboundedReceiver<Bytes>,
    close_notify: Arc<Notify>,
}

impl<H: IoHandler> Connection<H> {
    /// Attaches the socket to the session and fires `on_connect`.
    ///
    /// Fails if the socket is already unusable; the session is then closed through
    /// `on_exception` with the same error.
    pub(crate) fn open(stream: TcpStream, events: EventHandler<H>) -> Result<Self, Error> {
        let addrs = stream
            .local_addr()
            .and_then(|local_addr| Ok((local_addr, stream.peer_addr()?)));
        let (local_addr, peer_addr) = match addrs {
            Ok(addrs) => addrs,
            Err(err) => {
                let err = Error::Transport(err);
                events.handle_connect_failed(&err);
                return Err(err);
            }
        };

        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let close_notify = Arc::new(Notify::new());
        let transport = Arc::new(TcpTransport {
            local_addr,
            peer_addr,
            write_tx,
            close_notify: Arc::clone(&close_notify),
            closed: AtomicBool::new(false),
        });
        events.handle_connected(transport);

        Ok(Self {
            stream,
            events,
            write_rx,
            close_notify,
        })
    }

    /// Drives the session until either side closes it or the bootstrap stops.
    pub(crate) async fn run(self, max_payload_size: usize, mut close_rx: broadcast::Receiver<()>) {
        let Self {
            mut stream,
            events,
            mut write_rx,
            close_notify,
        } = self;
        let session_id = events.session().id();
        let mut buf = vec![0u8; max_payload_size];

        loop {
            let eto = events
                .poll_timeout()
                .unwrap_or_else(|| Instant::now() + DEFAULT_TIMEOUT_DURATION);
            let timer = tokio::time::sleep_until(tokio::time::Instant::from_std(eto));
            tokio::pin!(timer);

            // prioritize stream.write than stream.read
            tokio::select! {
                biased;
                _ = close_rx.recv() => {
                    trace!("session {} stopped by bootstrap", session_id);
                    events.session().close();
                    break;
                }
                _ = close_notify.notified() => {
                    trace!("session {} transport closed", session_id);
                    break;
                }
                Some(transmit) = write_rx.recv() => {
                    match stream.write_all(&transmit).await {
                        Ok(()) => {
                            trace!("stream write {} bytes", transmit.len());
                            events.handle_write_complete();
                        }
                        Err(err) => {
                            warn!("stream write error {}", err);
                            events.handle_error(Error::Transport(err));
                            break;
                        }
                    }
                }
                _ = timer.as_mut() => {
                    events.handle_timeout(Instant::now());
                }
                res = stream.read(&mut buf) => {
                    match res {
                        Ok(0) => {
                            trace!("session {} peer closed", session_id);
                            break;
                        }
                        Ok(n) => {
                            trace!("stream read {} bytes", n);
                            events.handle_read(&buf[..n]);
                        }
                        Err(err) => {
                            warn!("stream read error {}", err);
                            events.handle_error(Error::Transport(err));
                            break;
                        }
                    }
                }
            }
        }

        // flush replies queued right before the close
        while let Ok(transmit) = write_rx.try_recv() {
            if let Err(err) = stream.write_all(&transmit).await {
                trace!("session {} dropped queued write: {}", session_id, err);
                break;
            }
        }
        events.handle_closed();
        let _ = stream.shutdown().await;

        trace!("tcp session {} is gracefully down", session_id);
    }
}
