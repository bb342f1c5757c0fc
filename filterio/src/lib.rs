//! # filterio - Event-Driven Sessions over Filter Chains
//!
//! `filterio` is the I/O-free core of an event-driven TCP framework. It models one
//! connection as a [`Session`], turns bytes into application objects (and back) with a
//! composable [`FilterChain`], and bridges connection events to user callbacks through an
//! [`EventHandler`].
//!
//! The actual sockets live elsewhere: an I/O layer (see `filterio-bootstrap`) reports
//! completions to the [`EventHandler`] and implements [`Transport`] for the writes and
//! closes the session issues.
//!
//! ## Core Concepts
//!
//! ### Filter and FilterChain
//!
//! A [`Filter`] is one bidirectional transformation stage. Filters are chained in order:
//! the first filter faces the wire, the last filter faces the application.
//!
//! - **Inbound**: Network → Filter 1 → Filter 2 → ... → Filter N → `on_receive`
//! - **Outbound**: reply → Filter N → ... → Filter 2 → Filter 1 → Network
//!
//! A stage that needs more input keeps what it has and reports "need more data", so
//! arbitrary fragmentation of the byte stream never changes the decoded objects.
//!
//! ### Session
//!
//! ```text
//!   Connecting ──► Open ──► Closing ──► Closed
//! ```
//!
//! A session carries the connection's filter chain, a typed attribute map, and its
//! lifecycle state. Closing is idempotent and may be requested from any thread.
//! An optional [`Heartbeat`] keeps quiet connections alive with a raw ping/pong exchange.
//!
//! ### IoHandler
//!
//! [`IoHandler`] is the callback surface: `on_connect`, `on_receive`, `on_sent`,
//! `on_disconnect` and `on_exception`. [`FnHandler`] builds one from closures.
//!
//! ## Event Flow
//!
//! ```text
//!   +------------------------------------------------------------------+
//!   |                          IoHandler                               |
//!   |   on_connect   on_receive   on_sent   on_disconnect  on_exception|
//!   +------/|\-----------/|\-------/|\-----------/|\-----------/|\-----+
//!   |       |             |         |             |             |      |
//!   |   +---+-------------+---------+-------------+-------------+--+   |
//!   |   |                      EventHandler                        |   |
//!   |   +---/|\------------+-------------------------------+-------+   |
//!   |        | decode()    | encode()                      |           |
//!   |   +----+-------------+---------------+               |           |
//!   |   |   FilterChain (per Session)      |               |           |
//!   |   +---/|\------------+---------------+               |           |
//!   +--------+-------------+-------------------------------+-----------+
//!            | handle_read | Transport::write              | handle_connected,
//!            |            \|/                              | handle_closed, ...
//!   +--------+-------------+-------------------------------+-----------+
//!   |                 I/O layer (filterio-bootstrap)                   |
//!   +------------------------------------------------------------------+
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::BytesMut;
//! use filterio::{EventHandler, FilterChain, FnHandler, Session};
//!
//! let handler = Arc::new(FnHandler::new(|_session, msg: BytesMut| Some(msg)));
//! let session = Session::new(FilterChain::new(), None);
//! let events = EventHandler::new(session, handler);
//! // The I/O layer now calls events.handle_connected(..), events.handle_read(..), ...
//! # let _ = events;
//! ```

#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

use std::any::Any;

mod callbacks;
mod error;
mod event_handler;
mod filter;
mod filter_chain;
mod filter_internal;
mod heartbeat;
mod io_handler;
mod session;
mod transport;

#[cfg(test)]
mod test_filters;
#[cfg(test)]
mod test_transport;

pub use callbacks::FnHandler;
pub use error::Error;
pub use event_handler::EventHandler;
pub use filter::{Buffer, Filter};
pub use filter_chain::{FilterChain, FilterChainFactory};
pub use heartbeat::{DEFAULT_MAX_MISSED, Heartbeat};
pub use io_handler::IoHandler;
pub use session::{CloseReason, Session, SessionState};
pub use transport::Transport;

/// A type-erased object travelling between filter stages.
pub type Message = Box<dyn Any + Send>;
