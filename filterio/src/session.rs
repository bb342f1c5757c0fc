use std::{
    any::Any,
    collections::{HashMap, VecDeque},
    fmt,
    net::SocketAddr,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use bytes::Bytes;
use log::{debug, trace};
use parking_lot::Mutex;

use crate::{Error, FilterChain, Message, Transport};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a [`Session`].
///
/// ```text
///   Connecting ──► Open ──► Closing ──► Closed
///        │                                ▲
///        └────── connect failure ─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Waiting for the transport to confirm the connection.
    Connecting,
    /// Connected; data flows in both directions.
    Open,
    /// Close requested; callbacks are being completed.
    Closing,
    /// Terminal. All resources have been released.
    Closed,
}

/// Why a session left the `Open` state. The first recorded reason wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The peer closed or reset the connection.
    PeerClosed,
    /// [`Session::close`] was called.
    Requested,
    /// Nothing was received or sent within the idle timeout.
    IdleTimeout,
    /// The peer stopped taking part in the heartbeat exchange.
    HeartbeatTimeout,
    /// A transport or codec failure.
    Error,
}

pub(crate) struct SessionIo {
    pub(crate) chain: FilterChain,
    /// Writes handed to the transport, oldest first, awaiting completion.
    /// Raw writes have no object to report.
    pub(crate) in_flight: VecDeque<Option<Message>>,
}

struct SessionInner {
    id: u64,
    idle_timeout: Option<Duration>,
    state: Mutex<SessionState>,
    io: Mutex<SessionIo>,
    transport: OnceLock<Arc<dyn Transport>>,
    attributes: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    last_activity: Mutex<Instant>,
    close_reason: Mutex<Option<CloseReason>>,
    opened: AtomicBool,
    finished: AtomicBool,
}

/// The live state of one connection.
///
/// `Session` is a cheap handle; clones refer to the same connection and may be moved to
/// other threads. The session owns its [`FilterChain`], a typed attribute map for user
/// context, and the transport it writes to once connected.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("remote_addr", &self.remote_addr())
            .finish()
    }
}

impl Session {
    /// Creates a session in the `Connecting` state.
    ///
    /// A zero `idle_timeout` disables idle detection, same as `None`.
    pub fn new(chain: FilterChain, idle_timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
                idle_timeout: idle_timeout.filter(|t| !t.is_zero()),
                state: Mutex::new(SessionState::Connecting),
                io: Mutex::new(SessionIo {
                    chain,
                    in_flight: VecDeque::new(),
                }),
                transport: OnceLock::new(),
                attributes: Mutex::new(HashMap::new()),
                last_activity: Mutex::new(Instant::now()),
                close_reason: Mutex::new(None),
                opened: AtomicBool::new(false),
                finished: AtomicBool::new(false),
            }),
        }
    }

    /// Process-unique session id.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Remote address, known once the connection is confirmed.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.transport.get().and_then(|t| t.peer_addr())
    }

    /// Local address, known once the connection is confirmed.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.transport.get().and_then(|t| t.local_addr())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    /// True while the session is `Open`.
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// True once the session reached `Closed`.
    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Why the session closed, if it has started closing.
    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.inner.close_reason.lock()
    }

    /// Idle timeout applied to this session, if any.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.inner.idle_timeout
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set_attribute<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.inner
            .attributes
            .lock()
            .insert(key.into(), Arc::new(value));
    }

    /// Returns the value stored under `key` if it has type `T`.
    pub fn attribute<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.inner.attributes.lock().get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Returns true if any value is stored under `key`.
    pub fn contains_attribute(&self, key: &str) -> bool {
        self.inner.attributes.lock().contains_key(key)
    }

    /// Removes the value stored under `key`, returning whether there was one.
    pub fn remove_attribute(&self, key: &str) -> bool {
        self.inner.attributes.lock().remove(key).is_some()
    }

    /// Encodes `msg` through the filter chain and queues it for writing.
    ///
    /// May be called from any thread. Fails with [`Error::SessionClosed`] unless the
    /// session is `Open`; encoding failures are returned to the caller.
    pub fn send<M: Any + Send + Clone>(&self, msg: M) -> Result<(), Error> {
        let mut io = self.inner.io.lock();
        if !self.is_open() {
            return Err(Error::SessionClosed(self.inner.id));
        }
        let transport = self
            .inner
            .transport
            .get()
            .ok_or(Error::SessionClosed(self.inner.id))?;

        let bytes = io.chain.encode(Box::new(msg.clone()))?;
        trace!("session {} send {} bytes", self.inner.id, bytes.len());
        transport.write(bytes)?;
        io.in_flight.push_back(Some(Box::new(msg)));
        Ok(())
    }

    /// Queues `bytes` for writing as they are, bypassing the filter chain.
    ///
    /// Raw writes keep their place in the write order but never trigger `on_sent`.
    pub fn send_raw(&self, bytes: impl Into<Bytes>) -> Result<(), Error> {
        let mut io = self.inner.io.lock();
        if !self.is_open() {
            return Err(Error::SessionClosed(self.inner.id));
        }
        let transport = self
            .inner
            .transport
            .get()
            .ok_or(Error::SessionClosed(self.inner.id))?;

        let bytes = bytes.into();
        trace!("session {} send {} raw bytes", self.inner.id, bytes.len());
        transport.write(bytes)?;
        io.in_flight.push_back(None);
        Ok(())
    }

    /// Requests the session to close. Idempotent, callable from any thread.
    ///
    /// The session passes through `Closing`; `on_disconnect` fires once the I/O layer
    /// or the current callback completes the close.
    pub fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            match *state {
                SessionState::Connecting | SessionState::Open => {
                    *state = SessionState::Closing;
                }
                SessionState::Closing | SessionState::Closed => return,
            }
        }
        self.record_close_reason(CloseReason::Requested);
        debug!("session {} close requested", self.inner.id);
        if let Some(transport) = self.inner.transport.get() {
            transport.close();
        }
    }

    /// Attaches the transport and moves `Connecting` to `Open`.
    ///
    /// Returns false if the session was closed before the connection was confirmed.
    pub(crate) fn mark_open(&self, transport: Arc<dyn Transport>) -> bool {
        let _ = self.inner.transport.set(transport);
        let mut state = self.inner.state.lock();
        if *state != SessionState::Connecting {
            return false;
        }
        *state = SessionState::Open;
        self.inner.opened.store(true, Ordering::Release);
        true
    }

    pub(crate) fn was_opened(&self) -> bool {
        self.inner.opened.load(Ordering::Acquire)
    }

    pub(crate) fn touch(&self) {
        *self.inner.last_activity.lock() = Instant::now();
    }

    /// Instant after which the session counts as idle.
    pub(crate) fn idle_deadline(&self) -> Option<Instant> {
        let timeout = self.inner.idle_timeout?;
        if !self.is_open() {
            return None;
        }
        Some(*self.inner.last_activity.lock() + timeout)
    }

    pub(crate) fn with_io<T>(&self, f: impl FnOnce(&mut SessionIo) -> T) -> T {
        f(&mut self.inner.io.lock())
    }

    fn record_close_reason(&self, reason: CloseReason) {
        let mut close_reason = self.inner.close_reason.lock();
        if close_reason.is_none() {
            *close_reason = Some(reason);
        }
    }

    /// Claims the one-time teardown of this session.
    ///
    /// Returns false if another caller already claimed it.
    pub(crate) fn begin_close(&self, reason: CloseReason) -> bool {
        if self.inner.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.record_close_reason(reason);
        let mut state = self.inner.state.lock();
        if *state != SessionState::Closed {
            *state = SessionState::Closing;
        }
        true
    }

    /// Moves to `Closed` and frees the chain, queued objects, attributes and transport.
    pub(crate) fn release(&self) {
        *self.inner.state.lock() = SessionState::Closed;
        {
            let mut io = self.inner.io.lock();
            io.chain.clear();
            io.in_flight.clear();
        }
        self.inner.attributes.lock().clear();
        if let Some(transport) = self.inner.transport.get() {
            transport.close();
        }
        debug!(
            "session {} closed ({:?})",
            self.inner.id,
            self.close_reason()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_transport::MockTransport;

    #[test]
    fn test_new_session_is_connecting() {
        let session = Session::new(FilterChain::new(), None);
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.remote_addr().is_none());
        assert!(session.close_reason().is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Session::new(FilterChain::new(), None);
        let b = Session::new(FilterChain::new(), None);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn test_zero_idle_timeout_disables_idle() {
        let session = Session::new(FilterChain::new(), Some(Duration::ZERO));
        assert!(session.idle_timeout().is_none());
        assert!(session.mark_open(MockTransport::new()));
        assert!(session.idle_deadline().is_none());
    }

    #[test]
    fn test_attributes() {
        let session = Session::new(FilterChain::new(), None);
        session.set_attribute("user", "alice".to_owned());
        session.set_attribute("count", 3u32);

        assert_eq!(session.attribute::<String>("user").as_deref(), Some(&"alice".to_owned()));
        assert_eq!(session.attribute::<u32>("count").as_deref(), Some(&3));
        assert!(session.attribute::<u64>("count").is_none());
        assert!(session.attribute::<u32>("missing").is_none());

        assert!(session.contains_attribute("user"));
        assert!(session.remove_attribute("user"));
        assert!(!session.remove_attribute("user"));
        assert!(!session.contains_attribute("user"));
    }

    #[test]
    fn test_send_before_open_fails() {
        let session = Session::new(FilterChain::new(), None);
        assert!(matches!(
            session.send(b"hi".to_vec()),
            Err(Error::SessionClosed(id)) if id == session.id()
        ));
    }

    #[test]
    fn test_send_writes_encoded_bytes() {
        let transport = MockTransport::new();
        let session = Session::new(FilterChain::new(), None);
        assert!(session.mark_open(transport.clone()));

        session.send("hello".to_owned()).unwrap();
        assert_eq!(transport.written(), vec![b"hello".to_vec()]);
        assert_eq!(session.with_io(|io| io.in_flight.len()), 1);
    }

    #[test]
    fn test_send_raw_bypasses_chain() {
        let transport = MockTransport::new();
        let chain = FilterChain::new().with(crate::test_filters::LineFilter);
        let session = Session::new(chain, None);
        assert!(matches!(
            session.send_raw(&b"early"[..]),
            Err(Error::SessionClosed(_))
        ));
        assert!(session.mark_open(transport.clone()));

        session.send_raw(&b"PING"[..]).unwrap();
        session.send("line".to_owned()).unwrap();
        assert_eq!(
            transport.written(),
            vec![b"PING".to_vec(), b"line\n".to_vec()]
        );
        let queued = session.with_io(|io| {
            io.in_flight
                .iter()
                .map(Option::is_some)
                .collect::<Vec<_>>()
        });
        assert_eq!(queued, vec![false, true]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let transport = MockTransport::new();
        let session = Session::new(FilterChain::new(), None);
        assert!(session.mark_open(transport.clone()));

        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closing);
        assert_eq!(session.close_reason(), Some(CloseReason::Requested));
        assert_eq!(transport.close_count(), 1);
    }

    #[test]
    fn test_teardown_is_claimed_once() {
        let session = Session::new(FilterChain::new(), None);
        assert!(session.begin_close(CloseReason::PeerClosed));
        assert!(!session.begin_close(CloseReason::Error));
        assert_eq!(session.close_reason(), Some(CloseReason::PeerClosed));
    }

    #[test]
    fn test_release_frees_everything() {
        let transport = MockTransport::new();
        let session = Session::new(FilterChain::new(), None);
        assert!(session.mark_open(transport.clone()));
        session.set_attribute("k", 1u8);
        session.with_io(|io| io.chain.feed(b"leftover"));

        assert!(session.begin_close(CloseReason::Requested));
        session.release();

        assert!(session.is_closed());
        assert!(!session.contains_attribute("k"));
        assert!(!session.with_io(|io| io.chain.has_buffered()));
        assert!(transport.is_closed());
        assert!(matches!(session.send(1u8), Err(Error::SessionClosed(_))));
        session.close();
        assert!(session.is_closed());
    }

    #[test]
    fn test_closed_before_connect_never_opens() {
        let session = Session::new(FilterChain::new(), None);
        session.close();
        assert!(!session.mark_open(MockTransport::new()));
        assert!(!session.was_opened());
    }
}
