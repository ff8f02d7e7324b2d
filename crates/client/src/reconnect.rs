//! Fixed-delay reconnection policy for the push channel.
//!
//! [`ReconnectState`] is the pure decision machine: every failure
//! either schedules one more retry after [`ReconnectPolicy::delay`] or,
//! once `max_attempts` retries have been spent, declares the connection
//! exhausted. A successful connection resets the counter.

use std::time::Duration;

/// Tunable parameters for reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before every retry.
    pub delay: Duration,
    /// Retries allowed after consecutive failures.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(5_000),
            max_attempts: 10,
        }
    }
}

/// What to do after a connection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Retry number `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// The budget is spent.
    Exhausted { attempts: u32 },
}

/// Connection state published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub connected: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub exhausted: bool,
}

/// Retry bookkeeping for one connection.
#[derive(Debug, Clone)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    attempts: u32,
    connected: bool,
    exhausted: bool,
}

impl ReconnectState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            connected: false,
            exhausted: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// A connection (and its subscriptions) succeeded.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.connected = true;
    }

    /// A connection attempt failed or an established connection
    /// dropped. The counter is incremented before the retry it counts.
    pub fn on_failure(&mut self) -> ReconnectDecision {
        self.connected = false;
        if self.exhausted || self.attempts >= self.policy.max_attempts {
            self.exhausted = true;
            return ReconnectDecision::Exhausted {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay: self.policy.delay,
        }
    }

    pub fn snapshot(&self) -> ConnectionState {
        ConnectionState {
            connected: self.connected,
            reconnect_attempts: self.attempts,
            max_reconnect_attempts: self.policy.max_attempts,
            exhausted: self.exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::from_millis(100),
            max_attempts,
        }
    }

    #[test]
    fn default_policy() {
        let p = ReconnectPolicy::default();
        assert_eq!(p.delay, Duration::from_secs(5));
        assert_eq!(p.max_attempts, 10);
    }

    #[test]
    fn retries_until_budget_spent() {
        let mut state = ReconnectState::new(policy(3));
        for expected in 1..=3 {
            assert_eq!(
                state.on_failure(),
                ReconnectDecision::Retry {
                    attempt: expected,
                    delay: Duration::from_millis(100)
                }
            );
        }
        assert_eq!(state.on_failure(), ReconnectDecision::Exhausted { attempts: 3 });
        assert!(state.is_exhausted());
    }

    #[test]
    fn exhausted_is_terminal() {
        let mut state = ReconnectState::new(policy(1));
        state.on_failure();
        state.on_failure();
        state.on_connected();
        assert_eq!(state.on_failure(), ReconnectDecision::Exhausted { attempts: 0 });
    }

    #[test]
    fn success_resets_counter() {
        let mut state = ReconnectState::new(policy(10));
        for _ in 0..4 {
            state.on_failure();
        }
        assert_eq!(state.attempts(), 4);

        state.on_connected();
        assert_eq!(state.attempts(), 0);
        assert!(state.snapshot().connected);

        assert_eq!(
            state.on_failure(),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(100)
            }
        );
    }

    #[test]
    fn zero_budget_exhausts_immediately() {
        let mut state = ReconnectState::new(policy(0));
        assert_eq!(state.on_failure(), ReconnectDecision::Exhausted { attempts: 0 });
    }

    #[test]
    fn snapshot_reports_counts() {
        let mut state = ReconnectState::new(policy(10));
        state.on_failure();
        state.on_failure();
        let snap = state.snapshot();
        assert!(!snap.connected);
        assert_eq!(snap.reconnect_attempts, 2);
        assert_eq!(snap.max_reconnect_attempts, 10);
        assert!(!snap.exhausted);
    }
}
