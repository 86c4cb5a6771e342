//! The keep-alive state machine (C8, spec §4.8).
//!
//! Modeled as a **polled** state machine — `poll()` is the only thing that
//! advances it, called from `ClientSession::update_state()` — rather than as
//! a background timer thread. This deliberately departs from the teacher's
//! own `mqtt-sync-client`, whose `keepalive.rs` spawns an OS thread per
//! connection; a polled design matches the state table in spec §4.8 and the
//! `needs_keeping_alive`/`reset`/`start_reset_timeout` shape of
//! `terraqtt/keep_aliver.hpp` more directly.

use std::time::{Duration, Instant};

/// How long the session waits for a PINGRESP after sending PINGREQ, per
/// spec §4.8 and §7 ("no PINGRESP within 15 s of the ping").
const PING_RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// A source of monotonic time. `SystemClock` backs real connections;
/// `FakeClock` (test-only) lets keep-alive timing tests advance time
/// without sleeping.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// `Clock` backed by `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// What `poll()` observed and what the caller should do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveAction {
    /// Nothing to do.
    Idle,
    /// The session should emit PINGREQ now.
    SendPing,
    /// No PINGRESP arrived within the ping response timeout.
    TimedOut,
}

/// The two clock-stamped fields from spec §4.8, plus the configured
/// interval. `timeout == Duration::ZERO` disables keep-alive entirely.
pub struct KeepAlive<C: Clock = SystemClock> {
    clock: C,
    timeout: Duration,
    next_ping: Instant,
    ping_timeout: Option<Instant>,
}

impl<C: Clock> KeepAlive<C> {
    pub fn new(clock: C, timeout: Duration) -> Self {
        let next_ping = clock.now() + timeout;
        KeepAlive {
            clock,
            timeout,
            next_ping,
            ping_timeout: None,
        }
    }

    /// "Reset" row of the state table: any packet sent by the client pushes
    /// the next scheduled ping back out. Deliberately does not clear an
    /// in-flight `ping_timeout` — that still only clears on `on_pong` or by
    /// firing (see module doc and DESIGN.md for why the row's "ping_timeout
    /// cleared" wording is a no-op outside of that case).
    pub fn reset_next_ping(&mut self) {
        if self.timeout.is_zero() {
            return;
        }
        self.next_ping = self.clock.now() + self.timeout;
    }

    /// Re-arms the configured interval, e.g. once CONNECT has actually been
    /// written and the negotiated keep-alive is known. Clears any in-flight
    /// ping wait, since this only ever runs right after a fresh CONNECT.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        self.next_ping = self.clock.now() + timeout;
        self.ping_timeout = None;
    }

    /// Arms the ping response timeout if one isn't already running. Called
    /// whenever a PINGREQ is actually written to the wire.
    pub fn note_ping_sent(&mut self) {
        if self.ping_timeout.is_none() {
            self.ping_timeout = Some(self.clock.now() + PING_RESPONSE_TIMEOUT);
        }
    }

    /// "Complete" row: PINGRESP received.
    pub fn on_pong(&mut self) {
        self.ping_timeout = None;
    }

    /// Advances the state machine and reports what happened.
    pub fn poll(&mut self) -> KeepAliveAction {
        if self.timeout.is_zero() {
            return KeepAliveAction::Idle;
        }
        let now = self.clock.now();
        if let Some(ping_timeout) = self.ping_timeout {
            if now >= ping_timeout {
                KeepAliveAction::TimedOut
            } else {
                KeepAliveAction::Idle
            }
        } else if now >= self.next_ping {
            KeepAliveAction::SendPing
        } else {
            KeepAliveAction::Idle
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::cell::Cell;
    use std::time::{Duration, Instant};

    use super::Clock;

    /// A clock tests can move forward by hand. `now()` is `origin + offset`;
    /// `advance`/`set` only ever move `offset` forward.
    pub struct FakeClock {
        origin: Instant,
        offset: Cell<Duration>,
    }

    impl FakeClock {
        pub fn new() -> Self {
            FakeClock {
                origin: Instant::now(),
                offset: Cell::new(Duration::ZERO),
            }
        }

        pub fn set(&self, elapsed: Duration) {
            self.offset.set(elapsed);
        }
    }

    impl Clock for &FakeClock {
        fn now(&self) -> Instant {
            self.origin + self.offset.get()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::test_support::FakeClock;
    use super::{KeepAlive, KeepAliveAction};

    #[test]
    fn idle_before_interval_elapses() {
        let clock = FakeClock::new();
        let mut ka = KeepAlive::new(&clock, Duration::from_secs(10));
        clock.set(Duration::from_secs(5));
        assert_eq!(ka.poll(), KeepAliveAction::Idle);
    }

    #[test]
    fn zero_timeout_disables_keep_alive() {
        let clock = FakeClock::new();
        let mut ka = KeepAlive::new(&clock, Duration::ZERO);
        clock.set(Duration::from_secs(1_000_000));
        assert_eq!(ka.poll(), KeepAliveAction::Idle);
    }

    #[test]
    fn scenario_6_keep_alive_timing() {
        let clock = FakeClock::new();
        let mut ka = KeepAlive::new(&clock, Duration::from_secs(10));

        clock.set(Duration::from_secs(11));
        assert_eq!(ka.poll(), KeepAliveAction::SendPing);
        ka.reset_next_ping();
        ka.note_ping_sent();

        clock.set(Duration::from_secs(27));
        assert_eq!(ka.poll(), KeepAliveAction::TimedOut);
    }

    #[test]
    fn pong_before_timeout_clears_it() {
        let clock = FakeClock::new();
        let mut ka = KeepAlive::new(&clock, Duration::from_secs(10));

        clock.set(Duration::from_secs(11));
        assert_eq!(ka.poll(), KeepAliveAction::SendPing);
        ka.reset_next_ping();
        ka.note_ping_sent();

        clock.set(Duration::from_secs(13));
        ka.on_pong();

        clock.set(Duration::from_secs(27));
        assert_ne!(ka.poll(), KeepAliveAction::TimedOut);
    }
}
