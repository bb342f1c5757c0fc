use log::warn;

use crate::{Error, IoHandler, Session};

type ConnectFn<W> = Box<dyn Fn(&Session) -> Option<W> + Send + Sync>;
type ReceiveFn<R, W> = Box<dyn Fn(&Session, R) -> Option<W> + Send + Sync>;
type SentFn<W> = Box<dyn Fn(&Session, W) + Send + Sync>;
type SessionFn = Box<dyn Fn(&Session) + Send + Sync>;
type ExceptionFn = Box<dyn Fn(&Session, &Error) + Send + Sync>;

/// An [`IoHandler`] assembled from closures.
///
/// Only the receive callback is required; every other event falls back to the
/// [`IoHandler`] defaults.
///
/// ```rust
/// use filterio::FnHandler;
///
/// let handler = FnHandler::new(|_session, line: String| Some(line.to_uppercase()))
///     .with_disconnect(|session| println!("session {} gone", session.id()));
/// ```
pub struct FnHandler<R, W> {
    connect: Option<ConnectFn<W>>,
    receive: ReceiveFn<R, W>,
    sent: Option<SentFn<W>>,
    disconnect: Option<SessionFn>,
    exception: Option<ExceptionFn>,
}

impl<R, W> FnHandler<R, W>
where
    R: Send + 'static,
    W: Clone + Send + 'static,
{
    /// Creates a handler around the receive callback.
    pub fn new(receive: impl Fn(&Session, R) -> Option<W> + Send + Sync + 'static) -> Self {
        Self {
            connect: None,
            receive: Box::new(receive),
            sent: None,
            disconnect: None,
            exception: None,
        }
    }

    /// Sets the connect callback.
    pub fn with_connect(
        mut self,
        connect: impl Fn(&Session) -> Option<W> + Send + Sync + 'static,
    ) -> Self {
        self.connect = Some(Box::new(connect));
        self
    }

    /// Sets the write-completion callback.
    pub fn with_sent(mut self, sent: impl Fn(&Session, W) + Send + Sync + 'static) -> Self {
        self.sent = Some(Box::new(sent));
        self
    }

    /// Sets the disconnect callback.
    pub fn with_disconnect(mut self, disconnect: impl Fn(&Session) + Send + Sync + 'static) -> Self {
        self.disconnect = Some(Box::new(disconnect));
        self
    }

    /// Sets the error callback.
    pub fn with_exception(
        mut self,
        exception: impl Fn(&Session, &Error) + Send + Sync + 'static,
    ) -> Self {
        self.exception = Some(Box::new(exception));
        self
    }
}

impl<R, W> IoHandler for FnHandler<R, W>
where
    R: Send + 'static,
    W: Clone + Send + 'static,
{
    type Rin = R;
    type Wout = W;

    fn on_connect(&self, session: &Session) -> Option<W> {
        self.connect.as_ref().and_then(|f| f(session))
    }

    fn on_receive(&self, session: &Session, msg: R) -> Option<W> {
        (self.receive)(session, msg)
    }

    fn on_sent(&self, session: &Session, msg: W) {
        if let Some(f) = &self.sent {
            f(session, msg);
        }
    }

    fn on_disconnect(&self, session: &Session) {
        if let Some(f) = &self.disconnect {
            f(session);
        }
    }

    fn on_exception(&self, session: &Session, err: &Error) {
        match &self.exception {
            Some(f) => f(session, err),
            None => warn!("session {} error: {}", session.id(), err),
        }
    }
}
