use std::{any::type_name, sync::Arc, time::Instant};

use bytes::Bytes;
use log::{debug, trace};
use parking_lot::Mutex;

use crate::heartbeat::{Beat, HeartbeatState};
use crate::{CloseReason, Error, Heartbeat, IoHandler, Session, SessionState, Transport};

/// Binds one [`Session`] to one [`IoHandler`] and translates I/O completions into callbacks.
///
/// The I/O layer calls the `handle_*` methods in the order events happen on the
/// connection, one at a time. The event handler drives the session's filter chain and
/// guarantees:
///
/// - `on_connect` fires only after the transport confirmed the connection,
/// - `on_exception` fires at most once, and is always followed by the close,
/// - `on_disconnect` fires at most once, and only for sessions that were open.
///
/// ```text
///   I/O layer                 EventHandler                       IoHandler
///   ─────────                 ────────────                       ─────────
///   handle_connected    ──►   Connecting → Open            ──►   on_connect
///   handle_read(bytes)  ──►   feed + decode*               ──►   on_receive (per object)
///   handle_write_complete ──► pop in-flight object         ──►   on_sent
///   handle_closed       ──►   Closing → Closed             ──►   on_disconnect
///   handle_error(err)   ──►   Closing → Closed             ──►   on_exception, on_disconnect
///   handle_timeout(now) ──►   idle? Closing → Closed       ──►   on_disconnect
///                             beat due? ping, or close     ──►   on_disconnect
/// ```
///
/// With a [`Heartbeat`] attached, heartbeat messages are answered and stripped from the
/// input before the filter chain sees it, and a peer that falls silent for too many beats
/// is closed with [`CloseReason::HeartbeatTimeout`].
pub struct EventHandler<H: IoHandler> {
    session: Session,
    handler: Arc<H>,
    heartbeat: Option<Heartbeat>,
    beat: Mutex<Option<HeartbeatState>>,
}

impl<H: IoHandler> EventHandler<H> {
    /// Creates an event handler for `session`.
    pub fn new(session: Session, handler: Arc<H>) -> Self {
        Self {
            session,
            handler,
            heartbeat: None,
            beat: Mutex::new(None),
        }
    }

    /// Runs `heartbeat` while the session is open. A zero interval disables it.
    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = Some(heartbeat).filter(|h| !h.interval().is_zero());
        self
    }

    /// The session this handler drives.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The transport confirmed the connection.
    pub fn handle_connected(&self, transport: Arc<dyn Transport>) {
        if !self.session.mark_open(transport) {
            debug!(
                "session {} closed before the connection was confirmed",
                self.session.id()
            );
            self.finish(CloseReason::Requested);
            return;
        }
        debug!(
            "session {} open, peer {:?}",
            self.session.id(),
            self.session.remote_addr()
        );

        self.session.touch();
        if let Some(heartbeat) = self.heartbeat.clone() {
            *self.beat.lock() = Some(HeartbeatState::new(heartbeat, Instant::now()));
        }
        let reply = self.handler.on_connect(&self.session);
        self.reply(reply);
        self.after_callback();
    }

    /// The connection could not be established. The session never opens.
    pub fn handle_connect_failed(&self, err: &Error) {
        self.fail(err);
    }

    /// Bytes arrived from the peer.
    ///
    /// Every complete object the chain can decode is delivered to `on_receive` in order;
    /// incomplete input stays buffered for the next call.
    pub fn handle_read(&self, bytes: &[u8]) {
        if !self.session.is_open() {
            trace!(
                "session {} dropped {} bytes read while {:?}",
                self.session.id(),
                bytes.len(),
                self.session.state()
            );
            return;
        }
        self.session.touch();

        let (bytes, pings) = match self.beat.lock().as_mut() {
            Some(state) => state.intercept(bytes),
            None => (bytes.into(), 0),
        };
        for _ in 0..pings {
            if !self.send_heartbeat(|h| h.pong().clone()) {
                return;
            }
        }
        if bytes.is_empty() {
            return;
        }
        self.session.with_io(|io| io.chain.feed(&bytes));

        loop {
            let decoded = match self.session.with_io(|io| io.chain.decode()) {
                Ok(Some(decoded)) => decoded,
                Ok(None) => break,
                Err(err) => {
                    self.fail(&err);
                    return;
                }
            };
            let msg = match decoded.downcast::<H::Rin>() {
                Ok(msg) => *msg,
                Err(_) => {
                    self.fail(&Error::decode(
                        "FilterChain",
                        format!("decoded object is not {}", type_name::<H::Rin>()),
                    ));
                    return;
                }
            };

            if !self.session.is_open() {
                break;
            }
            let reply = self.handler.on_receive(&self.session, msg);
            self.reply(reply);
            if self.after_callback() {
                return;
            }
        }
    }

    /// The oldest queued write reached the wire.
    pub fn handle_write_complete(&self) {
        self.session.touch();
        let Some(Some(sent)) = self.session.with_io(|io| io.in_flight.pop_front()) else {
            return;
        };
        if self.session.state() == SessionState::Closed {
            return;
        }
        match sent.downcast::<H::Wout>() {
            Ok(msg) => {
                self.handler.on_sent(&self.session, *msg);
                self.after_callback();
            }
            Err(_) => trace!(
                "session {} sent an object that is not {}",
                self.session.id(),
                type_name::<H::Wout>()
            ),
        }
    }

    /// The peer closed or reset the connection, or the I/O layer shut it down.
    pub fn handle_closed(&self) {
        self.finish(CloseReason::PeerClosed);
    }

    /// A transport failure on an established connection.
    pub fn handle_error(&self, err: Error) {
        self.fail(&err);
    }

    /// The next instant [`handle_timeout`](Self::handle_timeout) needs to run, if any.
    pub fn poll_timeout(&self) -> Option<Instant> {
        let idle = self.session.idle_deadline();
        if !self.session.is_open() {
            return idle;
        }
        let beat = self.beat.lock().as_ref().map(HeartbeatState::next_beat);
        match (idle, beat) {
            (Some(idle), Some(beat)) => Some(idle.min(beat)),
            (idle, beat) => idle.or(beat),
        }
    }

    /// Closes the session through the normal path if it has been idle past its timeout,
    /// and runs the heartbeat when a beat is due.
    pub fn handle_timeout(&self, now: Instant) {
        if let Some(deadline) = self.session.idle_deadline() {
            if now >= deadline {
                debug!("session {} idle timeout", self.session.id());
                self.finish(CloseReason::IdleTimeout);
                return;
            }
        }
        if !self.session.is_open() {
            return;
        }

        let beat = match self.beat.lock().as_mut() {
            Some(state) => state.beat(now),
            None => return,
        };
        match beat {
            Beat::Idle => {}
            Beat::SendPing => {
                self.send_heartbeat(|h| h.ping().clone());
            }
            Beat::Expired => {
                debug!("session {} heartbeat lost", self.session.id());
                self.finish(CloseReason::HeartbeatTimeout);
            }
        }
    }

    /// Writes a heartbeat message. Returns false if the session failed.
    fn send_heartbeat(&self, message: impl FnOnce(&Heartbeat) -> Bytes) -> bool {
        let bytes = match self.beat.lock().as_ref() {
            Some(state) => message(state.config()),
            None => return true,
        };
        match self.session.send_raw(bytes) {
            Ok(()) => true,
            Err(Error::SessionClosed(_)) => false,
            Err(err) => {
                self.fail(&err);
                false
            }
        }
    }

    fn reply(&self, reply: Option<H::Wout>) {
        let Some(msg) = reply else {
            return;
        };
        match self.session.send(msg) {
            Ok(()) => {}
            Err(Error::SessionClosed(id)) => trace!("session {} closed, reply dropped", id),
            Err(err) => self.fail(&err),
        }
    }

    /// Completes a close requested during a callback. Returns true if the session is done.
    fn after_callback(&self) -> bool {
        match self.session.state() {
            SessionState::Open => false,
            SessionState::Closing => {
                self.finish(CloseReason::Requested);
                true
            }
            SessionState::Connecting | SessionState::Closed => true,
        }
    }

    fn fail(&self, err: &Error) {
        if !self.session.begin_close(CloseReason::Error) {
            trace!(
                "session {} already closing, dropping error: {}",
                self.session.id(),
                err
            );
            return;
        }
        debug!("session {} failed: {}", self.session.id(), err);
        self.handler.on_exception(&self.session, err);
        if self.session.was_opened() {
            self.handler.on_disconnect(&self.session);
        }
        self.session.release();
    }

    fn finish(&self, reason: CloseReason) {
        if !self.session.begin_close(reason) {
            return;
        }
        if self.session.was_opened() {
            self.handler.on_disconnect(&self.session);
        }
        self.session.release();
    }
}
