//! The helpful bootstrap APIs which run filterio sessions over real TCP sockets on tokio.
//!
//! [`TcpServer`] binds an address and manufactures a [`Session`](filterio::Session),
//! a fresh [`FilterChain`] and an [`EventHandler`](filterio::EventHandler) for every
//! accepted connection. [`TcpClient`] does the same for outbound connections, under a
//! connect timeout. Each connection runs on its own tokio task, so sessions are driven in
//! parallel on a multi-threaded runtime while the events of one session stay ordered.
//!
//! ```rust,no_run
//! use filterio::{FilterChain, FnHandler};
//! use filterio_bootstrap::{ServerConfig, TcpServer};
//! use filterio_codec::{LineFramingFilter, StringFilter, TerminatorType};
//!
//! # async fn run() -> Result<(), filterio::Error> {
//! let handler = FnHandler::new(|_session, line: String| Some(line));
//! let mut server = TcpServer::new(ServerConfig::new("127.0.0.1", 8080), handler);
//! server.filter_chain(|| {
//!     FilterChain::new()
//!         .with(LineFramingFilter::new(8192, true, TerminatorType::BOTH))
//!         .with(StringFilter::new())
//! });
//! let local_addr = server.start().await?;
//! println!("listening on {local_addr}");
//! server.graceful_stop().await;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use wg::AsyncWaitGroup;

use filterio::{FilterChain, FilterChainFactory};

mod bootstrap_tcp;
mod config;
mod registry;

pub use bootstrap_tcp::{tcp_client::TcpClient, tcp_server::TcpServer};
pub use config::{ClientConfig, ServerConfig};

/// Sleep used when no session timer is armed.
const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(86400); // 1 day duration

/// Settings and stop machinery shared by servers and clients.
struct Bootstrap {
    max_payload_size: usize,
    filter_chain_factory: FilterChainFactory,
    close_tx: Mutex<Option<broadcast::Sender<()>>>,
    wg: Mutex<Option<AsyncWaitGroup>>,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootstrap {
    fn new() -> Self {
        Self {
            max_payload_size: 2048, // Typical internet MTU = 1500, rounded up to a power of 2
            filter_chain_factory: Arc::new(FilterChain::new),
            close_tx: Mutex::new(None),
            wg: Mutex::new(None),
        }
    }

    /// Read buffer size, at least one byte; an empty buffer reads as EOF.
    fn max_payload_size(&mut self, max_payload_size: usize) -> &mut Self {
        self.max_payload_size = max_payload_size.max(1);
        self
    }

    fn filter_chain(&mut self, filter_chain_factory: FilterChainFactory) -> &mut Self {
        self.filter_chain_factory = filter_chain_factory;
        self
    }

    /// Receiver that fires when [`stop`](Self::stop) is called.
    fn subscribe_close(&self) -> broadcast::Receiver<()> {
        let mut close_tx = self.close_tx.lock();
        close_tx
            .get_or_insert_with(|| broadcast::channel(1).0)
            .subscribe()
    }

    /// Registers one more task that [`wait_for_stop`](Self::wait_for_stop) waits for.
    fn add_worker(&self) -> AsyncWaitGroup {
        let mut wg = self.wg.lock();
        wg.get_or_insert_with(AsyncWaitGroup::new).add(1)
    }

    async fn stop(&self) {
        let close_tx = self.close_tx.lock().take();
        if let Some(close_tx) = close_tx {
            let _ = close_tx.send(());
        }
    }

    async fn wait_for_stop(&self) {
        let wg = self.wg.lock().take();
        if let Some(wg) = wg {
            wg.wait().await;
        }
    }

    async fn graceful_stop(&self) {
        self.stop().await;
        self.wait_for_stop().await;
    }
}
