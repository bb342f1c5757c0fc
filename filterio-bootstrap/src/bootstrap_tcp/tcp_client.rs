use std::sync::Arc;

use log::{debug, info};
use tokio::net::TcpStream;

use filterio::{Error, EventHandler, FilterChain, IoHandler, Session};

use super::Connection;
use crate::{Bootstrap, ClientConfig};

/// A TCP client that opens filterio [`Session`]s to one remote address.
///
/// Each call to [`connect`](Self::connect) opens a new connection with its own session and
/// filter chain. Dropping the client closes its sessions.
pub struct TcpClient<H: IoHandler> {
    config: ClientConfig,
    handler: Arc<H>,
    bootstrap: Bootstrap,
}

impl<H: IoHandler> TcpClient<H> {
    /// Creates a new client.
    pub fn new(config: ClientConfig, handler: H) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
            bootstrap: Bootstrap::new(),
        }
    }

    /// Sets the maximum number of bytes read from the socket at once.
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

    /// The handler shared by all sessions of this client.
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Opens a connection and returns its session, already `Open`.
    ///
    /// If the connection cannot be established within the configured connect timeout,
    /// the session goes straight to `Closed`, `on_exception` fires once, and the error
    /// is returned as well. A session closed before `connect` returns, for example from
    /// `on_connect`, yields [`Error::SessionClosed`].
    pub async fn connect(&self) -> Result<Session, Error> {
        let session = Session::new(
            (self.bootstrap.filter_chain_factory)(),
            self.config.idle_timeout(),
        );
        let mut events = EventHandler::new(session.clone(), Arc::clone(&self.handler));
        if let Some(heartbeat) = self.config.heartbeat().cloned() {
            events = events.with_heartbeat(heartbeat);
        }

        let addr = self.config.addr();
        let connect_timeout = self.config.connect_timeout();
        debug!("session {} connecting to {}", session.id(), addr);

        let stream =
            match tokio::time::timeout(connect_timeout, TcpStream::connect(addr.as_str())).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(err)) => {
                    let err = Error::connect(&addr, err);
                    events.handle_connect_failed(&err);
                    return Err(err);
                }
                Err(_) => {
                    let err = Error::connect_timeout(&addr, connect_timeout);
                    events.handle_connect_failed(&err);
                    return Err(err);
                }
            };

        let connection = Connection::open(stream, events)?;
        info!(
            "session {} connected to {:?}",
            session.id(),
            session.remote_addr()
        );

        let close_rx = self.bootstrap.subscribe_close();
        let worker = self.bootstrap.add_worker();
        let max_payload_size = self.bootstrap.max_payload_size;
        tokio::spawn(async move {
            connection.run(max_payload_size, close_rx).await;
            worker.done();
        });

        // closed before or during on_connect; the task above still flushes and shuts down
        if !session.is_open() {
            return Err(Error::SessionClosed(session.id()));
        }
        Ok(session)
    }

    /// Closes every session opened by this client.
    pub async fn stop(&self) {
        self.bootstrap.stop().await
    }

    /// Waits until every connection task has finished.
    pub async fn wait_for_stop(&self) {
        self.bootstrap.wait_for_stop().await
    }

    /// [`stop`](Self::stop) followed by [`wait_for_stop`](Self::wait_for_stop).
    pub async fn graceful_stop(&self) {
        self.bootstrap.graceful_stop().await
    }
}
