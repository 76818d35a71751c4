//! Bounded, fixed-interval polling.
//!
//! Used for SSH reachability, bot API pings and waiting for a bot to stop.
//! The delay between attempts is constant on purpose: callers size
//! `max_attempts × interval` to a known worst-case wait (e.g. a machine
//! reboot), and backoff would stretch that.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use log::{debug, error};

/// How many times to try, and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Policy with no delay between attempts (tests, immediate retries).
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

/// Run `op` until it succeeds, at most `policy.max_attempts` times.
///
/// `op` receives the 1-based attempt number. Sleeps `policy.interval`
/// between attempts but not after the last one. Returns `None` (after
/// logging an error) when every attempt failed; never panics.
pub fn poll<T, E, F>(what: &str, policy: &PollPolicy, mut op: F) -> Option<T>
where
    E: Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let mut attempt = 1;
    while attempt <= policy.max_attempts {
        debug!("attempt {attempt}/{} to {what}", policy.max_attempts);
        match op(attempt) {
            Ok(value) => return Some(value),
            Err(e) => debug!("attempt {attempt} to {what} failed: {e}"),
        }

        if attempt < policy.max_attempts && !policy.interval.is_zero() {
            thread::sleep(policy.interval);
        }
        attempt += 1;
    }

    error!("giving up on {what} after {} attempts", policy.max_attempts);
    None
}
