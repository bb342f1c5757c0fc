use std::{
    borrow::Cow,
    time::{Duration, Instant},
};

use bytes::Bytes;

/// Silent heartbeat intervals tolerated before the session is closed.
pub const DEFAULT_MAX_MISSED: u32 = 3;

/// Keep-alive settings for a session: a ping/pong exchange on a fixed interval.
///
/// The initiating side writes `ping` every interval and the other side answers each ping
/// with `pong`. Either side counts an interval in which nothing of the exchange arrived
/// as missed; `max_missed` consecutive misses close the session.
///
/// Heartbeat messages are written raw, outside the filter chain, and removed from inbound
/// bytes before the chain sees them. Choose `ping` and `pong` sequences that never occur
/// in application data, and short enough to arrive in one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    ping: Bytes,
    pong: Bytes,
    interval: Duration,
    max_missed: u32,
    initiator: bool,
}

impl Heartbeat {
    /// A heartbeat that answers `PING` with `PONG` every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            ping: Bytes::from_static(b"PING"),
            pong: Bytes::from_static(b"PONG"),
            interval,
            max_missed: DEFAULT_MAX_MISSED,
            initiator: false,
        }
    }

    /// Replaces the ping and pong messages.
    pub fn with_messages(mut self, ping: impl Into<Bytes>, pong: impl Into<Bytes>) -> Self {
        self.ping = ping.into();
        self.pong = pong.into();
        self
    }

    /// Closes the session after `max_missed` silent intervals in a row. At least 1.
    pub fn with_max_missed(mut self, max_missed: u32) -> Self {
        self.max_missed = max_missed.max(1);
        self
    }

    /// Makes this side send the pings.
    pub fn initiator(mut self, initiator: bool) -> Self {
        self.initiator = initiator;
        self
    }

    /// Ping message.
    pub fn ping(&self) -> &Bytes {
        &self.ping
    }

    /// Pong message.
    pub fn pong(&self) -> &Bytes {
        &self.pong
    }

    /// Beat interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Silent intervals tolerated in a row.
    pub fn max_missed(&self) -> u32 {
        self.max_missed
    }

    /// True if this side sends the pings.
    pub fn is_initiator(&self) -> bool {
        self.initiator
    }
}

/// What the I/O side has to do after a beat.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Beat {
    Idle,
    SendPing,
    Expired,
}

/// Per-session heartbeat bookkeeping.
pub(crate) struct HeartbeatState {
    config: Heartbeat,
    next_beat: Instant,
    heard: bool,
    missed: u32,
}

impl HeartbeatState {
    pub(crate) fn new(config: Heartbeat, now: Instant) -> Self {
        Self {
            next_beat: now + config.interval,
            config,
            // the first beat always passes, the peer may still be starting up
            heard: true,
            missed: 0,
        }
    }

    pub(crate) fn config(&self) -> &Heartbeat {
        &self.config
    }

    pub(crate) fn next_beat(&self) -> Instant {
        self.next_beat
    }

    /// Strips heartbeat messages from `bytes`.
    ///
    /// Returns the remaining application bytes and the number of pings to answer.
    pub(crate) fn intercept<'a>(&mut self, bytes: &'a [u8]) -> (Cow<'a, [u8]>, usize) {
        let ping = &self.config.ping[..];
        let pong = &self.config.pong[..];
        let mut pings = 0;
        let mut matched = false;
        let mut rest = Vec::new();

        let mut i = 0;
        while i < bytes.len() {
            if !ping.is_empty() && bytes[i..].starts_with(ping) {
                pings += 1;
                matched = true;
                i += ping.len();
            } else if !pong.is_empty() && bytes[i..].starts_with(pong) {
                matched = true;
                i += pong.len();
            } else {
                rest.push(bytes[i]);
                i += 1;
            }
        }

        if !matched {
            return (Cow::Borrowed(bytes), 0);
        }
        self.heard = true;
        (Cow::Owned(rest), pings)
    }

    /// Runs the beat due at `now`, if any.
    pub(crate) fn beat(&mut self, now: Instant) -> Beat {
        if now < self.next_beat {
            return Beat::Idle;
        }
        self.next_beat = now + self.config.interval;
        if self.heard {
            self.missed = 0;
        } else {
            self.missed += 1;
        }
        self.heard = false;

        if self.missed >= self.config.max_missed {
            Beat::Expired
        } else if self.config.initiator {
            Beat::SendPing
        } else {
            Beat::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intercept_strips_ping_and_pong() {
        let mut state = HeartbeatState::new(Heartbeat::new(Duration::from_secs(1)), Instant::now());
        let (rest, pings) = state.intercept(b"PINGabcPONGdefPING");
        assert_eq!(&rest[..], b"abcdef");
        assert_eq!(pings, 2);
    }

    #[test]
    fn test_intercept_without_heartbeat_borrows() {
        let mut state = HeartbeatState::new(Heartbeat::new(Duration::from_secs(1)), Instant::now());
        let (rest, pings) = state.intercept(b"hello");
        assert!(matches!(rest, Cow::Borrowed(b"hello")));
        assert_eq!(pings, 0);
    }

    #[test]
    fn test_silence_expires_after_max_missed() {
        let start = Instant::now();
        let interval = Duration::from_millis(10);
        let config = Heartbeat::new(interval).with_max_missed(2);
        let mut state = HeartbeatState::new(config, start);

        assert_eq!(state.beat(start), Beat::Idle);
        assert_eq!(state.beat(start + interval), Beat::Idle);
        assert_eq!(state.beat(start + interval * 2), Beat::Idle);
        assert_eq!(state.beat(start + interval * 3), Beat::Expired);
    }

    #[test]
    fn test_pong_resets_missed_count() {
        let start = Instant::now();
        let interval = Duration::from_millis(10);
        let config = Heartbeat::new(interval).with_max_missed(2).initiator(true);
        let mut state = HeartbeatState::new(config, start);

        assert_eq!(state.beat(start + interval), Beat::SendPing);
        assert_eq!(state.beat(start + interval * 2), Beat::SendPing);
        state.intercept(b"PONG");
        assert_eq!(state.beat(start + interval * 3), Beat::SendPing);
        assert_eq!(state.beat(start + interval * 4), Beat::SendPing);
        assert_eq!(state.beat(start + interval * 5), Beat::Expired);
    }

    #[test]
    fn test_custom_messages() {
        let config = Heartbeat::new(Duration::from_secs(1))
            .with_messages("hb?", "hb!")
            .with_max_missed(0);
        assert_eq!(&config.ping()[..], b"hb?");
        assert_eq!(&config.pong()[..], b"hb!");
        assert_eq!(config.max_missed(), 1);
        assert!(!config.is_initiator());
    }
}
