use std::time::Duration;

use filterio::Heartbeat;

/// Connect timeout applied when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Listening address and per-session settings of a [`TcpServer`](crate::TcpServer).
///
/// Immutable once handed to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    host: String,
    port: u16,
    idle_timeout: Option<Duration>,
    heartbeat: Option<Heartbeat>,
}

impl ServerConfig {
    /// Listen on `host:port`. Port 0 picks a free port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            idle_timeout: None,
            heartbeat: None,
        }
    }

    /// Closes sessions that neither receive nor send for `idle_timeout`.
    /// Zero disables idle detection.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout).filter(|t| !t.is_zero());
        self
    }

    /// Runs `heartbeat` on every session.
    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Host to bind.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port to bind.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Idle timeout applied to every session.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Heartbeat run on every session.
    pub fn heartbeat(&self) -> Option<&Heartbeat> {
        self.heartbeat.as_ref()
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }
}

/// Remote address and timeouts of a [`TcpClient`](crate::TcpClient).
///
/// Immutable once handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    host: String,
    port: u16,
    connect_timeout: Duration,
    idle_timeout: Option<Duration>,
    heartbeat: Option<Heartbeat>,
}

impl ClientConfig {
    /// Connect to `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: None,
            heartbeat: None,
        }
    }

    /// Fails the connection with `ConnectTimeout` if it is not established in time.
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Same as [`with_connect_timeout`](Self::with_connect_timeout), in milliseconds.
    pub fn with_timeout_millis(self, millis: u64) -> Self {
        self.with_connect_timeout(Duration::from_millis(millis))
    }

    /// Closes the session if it neither receives nor sends for `idle_timeout`.
    /// Zero disables idle detection.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout).filter(|t| !t.is_zero());
        self
    }

    /// Runs `heartbeat` on the session, usually as the initiator.
    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Remote host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Remote port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Idle timeout of the session.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Heartbeat run on the session.
    pub fn heartbeat(&self) -> Option<&Heartbeat> {
        self.heartbeat.as_ref()
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }
}
