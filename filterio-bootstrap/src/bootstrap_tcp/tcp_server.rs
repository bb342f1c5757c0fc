use std::{net::SocketAddr, sync::Arc};

use log::{debug, info, trace, warn};
use tokio::{net::TcpListener, sync::broadcast};

use filterio::{Error, EventHandler, FilterChain, IoHandler, Session};

use super::Connection;
use crate::{Bootstrap, ServerConfig, registry::SessionRegistry};

/// A TCP server that runs one filterio [`Session`] per accepted connection.
///
/// Every connection gets a fresh filter chain from the factory set with
/// [`filter_chain`](Self::filter_chain) and shares the server's handler. Dropping the
/// server stops it.
pub struct TcpServer<H: IoHandler> {
    config: ServerConfig,
    handler: Arc<H>,
    bootstrap: Bootstrap,
    sessions: SessionRegistry,
}

impl<H: IoHandler> TcpServer<H> {
    /// Creates a new server.
    pub fn new(config: ServerConfig, handler: H) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
            bootstrap: Bootstrap::new(),
            sessions: SessionRegistry::default(),
        }
    }

    /// Sets the maximum number of bytes read from a socket at once.
    pub fn max_payload_size(&mut self, max_payload_size: usize) -> &mut Self {
        self.bootstrap.max_payload_size(max_payload_size);
        self
    }

    /// Sets the factory that builds each session's filter chain.
    pub fn filter_chain(
        &mut self,
        filter_chain_factory: impl Fn() -> FilterChain + Send + Sync + 'static,
    ) -> &mut Self {
        self.bootstrap.filter_chain(Arc::new(filter_chain_factory));
        self
    }

    /// The handler shared by all sessions.
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the listener and starts accepting connections in the background.
    ///
    /// Returns the bound address. A bind failure is returned as [`Error::Bind`] and
    /// nothing is retried.
    pub async fn start(&self) -> Result<SocketAddr, Error> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|err| Error::bind(&addr, err))?;
        let local_addr = listener.local_addr()?;
        info!("tcp server listening on {}", local_addr);

        let mut close_rx = self.bootstrap.subscribe_close();
        let worker = self.bootstrap.add_worker();

        let filter_chain_factory = Arc::clone(&self.bootstrap.filter_chain_factory);
        let handler = Arc::clone(&self.handler);
        let sessions = self.sessions.clone();
        let max_payload_size = self.bootstrap.max_payload_size;
        let idle_timeout = self.config.idle_timeout();
        let heartbeat = self.config.heartbeat().cloned();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = close_rx.recv() => {
                        trace!("listener exit loop");
                        break;
                    }
                    res = listener.accept() => {
                        match res {
                            Ok((socket, peer_addr)) => {
                                debug!("accepted connection from {}", peer_addr);
                                // A new task is spawned for each inbound socket. The socket is
                                // moved to the new task and processed there.
                                let session = Session::new((filter_chain_factory)(), idle_timeout);
                                let mut events = EventHandler::new(session.clone(), Arc::clone(&handler));
                                if let Some(heartbeat) = heartbeat.clone() {
                                    events = events.with_heartbeat(heartbeat);
                                }
                                let child_close_rx = close_rx.resubscribe();
                                let child_worker = worker.add(1);
                                let sessions = sessions.clone();
                                tokio::spawn(async move {
                                    Self::serve(socket, session, events, sessions, max_payload_size, child_close_rx).await;
                                    child_worker.done();
                                });
                            }
                            Err(err) => {
                                warn!("listener accept error {}", err);
                            }
                        }
                    }
                }
            }

            worker.done();
        });

        Ok(local_addr)
    }

    async fn serve(
        socket: tokio::net::TcpStream,
        session: Session,
        events: EventHandler<H>,
        sessions: SessionRegistry,
        max_payload_size: usize,
        close_rx: broadcast::Receiver<()>,
    ) {
        sessions.insert(session.clone());
        match Connection::open(socket, events) {
            Ok(connection) => connection.run(max_payload_size, close_rx).await,
            Err(err) => debug!("session {} not opened: {}", session.id(), err),
        }
        sessions.remove(session.id());
    }

    /// Snapshot of the sessions currently served.
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.snapshot()
    }

    /// Number of sessions currently served.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Stops accepting and closes every session.
    pub async fn stop(&self) {
        self.bootstrap.stop().await
    }

    /// Waits until the listener and every session task have finished.
    pub async fn wait_for_stop(&self) {
        self.bootstrap.wait_for_stop().await
    }

    /// [`stop`](Self::stop) followed by [`wait_for_stop`](Self::wait_for_stop).
    pub async fn graceful_stop(&self) {
        self.bootstrap.graceful_stop().await
    }
}
