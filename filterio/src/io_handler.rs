//! # IoHandler
//!
//! [`IoHandler`] is the user-facing callback surface. One handler instance is shared by
//! every session of a server, so it takes `&self` and must be `Send + Sync`; per-connection
//! state belongs in [`Session`] attributes.
//!
//! Callbacks for one session are never run concurrently or reentered. They must not block:
//! they run on the task that drives the session's I/O.
//!
//! ## Example: echo
//!
//! ```rust
//! use filterio::{IoHandler, Session};
//!
//! struct Echo;
//!
//! impl IoHandler for Echo {
//!     type Rin = String;
//!     type Wout = String;
//!
//!     fn on_receive(&self, _session: &Session, msg: String) -> Option<String> {
//!         Some(msg)
//!     }
//! }
//! ```

use log::warn;

use crate::{Error, Session};

/// Callbacks invoked for session events.
///
/// Returning `Some` from [`on_connect`](IoHandler::on_connect) or
/// [`on_receive`](IoHandler::on_receive) encodes the value through the session's filter
/// chain and writes it. To close the session from any callback, call
/// [`Session::close`]; the close completes as soon as the callback returns.
pub trait IoHandler: Send + Sync + 'static {
    /// Object type produced by the last filter of the chain.
    type Rin: Send + 'static;

    /// Object type written back. Cloned so the sent object can be handed to
    /// [`on_sent`](IoHandler::on_sent) once the write completes.
    type Wout: Clone + Send + 'static;

    /// The connection is established. A returned payload is sent immediately.
    fn on_connect(&self, _session: &Session) -> Option<Self::Wout> {
        None
    }

    /// A complete object was decoded.
    fn on_receive(&self, session: &Session, msg: Self::Rin) -> Option<Self::Wout>;

    /// An object handed to the transport has been written.
    ///
    /// Only objects of type `Wout` are reported.
    fn on_sent(&self, _session: &Session, _msg: Self::Wout) {}

    /// The session was open and is now closed. Fires at most once per session.
    fn on_disconnect(&self, _session: &Session) {}

    /// A connect, transport or codec failure. The session closes right after.
    fn on_exception(&self, session: &Session, err: &Error) {
        warn!("session {} error: {}", session.id(), err);
    }
}
