//! Retry state machine for a single path.
//!
//! ```text
//! Attempting(n) --ok(rename)--> Succeeded
//! Attempting(n) --ok(copy)----> FallbackSucceeded
//! Attempting(n) --transient---> Retrying(n, delay) --sleep--> Attempting(n + 1)
//! Attempting(n) --permanent or n == max--> ExhaustedFailed
//! ```
//!
//! The delay before retry `r` (1-based) is `base * 2^(r - 1)`.

use std::io;
use std::time::Duration;

use super::MoveStrategy;

/// How many attempts a path gets and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Never zero.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `retries` extra attempts after the first.
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            base_delay,
        }
    }
}

/// Backoff before the `retry`-th retry (1-based). Saturates instead of overflowing.
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let factor = 2u32.saturating_pow(retry.saturating_sub(1));
    base.saturating_mul(factor)
}

#[derive(Debug)]
pub enum MoveState {
    Attempting {
        attempt: u32,
    },
    Retrying {
        attempt: u32,
        delay: Duration,
        error: io::Error,
    },
    Succeeded {
        attempts: u32,
    },
    FallbackSucceeded {
        attempts: u32,
    },
    ExhaustedFailed {
        attempts: u32,
        error: io::Error,
    },
}

impl MoveState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MoveState::Succeeded { .. }
                | MoveState::FallbackSucceeded { .. }
                | MoveState::ExhaustedFailed { .. }
        )
    }
}

/// False for errors that another attempt cannot fix: the source is gone, the request is bad, or
/// the filesystem refuses the write outright.
pub fn is_transient(e: &io::Error) -> bool {
    match e.kind() {
        io::ErrorKind::NotFound
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::StorageFull
        | io::ErrorKind::ReadOnlyFilesystem => false,
        // Windows reports files held open by another process as access denied.
        io::ErrorKind::PermissionDenied => cfg!(windows),
        _ => true,
    }
}

/// The state after attempt number `attempt` finished with `result`.
pub fn transition(
    attempt: u32,
    policy: &RetryPolicy,
    result: io::Result<MoveStrategy>,
) -> MoveState {
    match result {
        Ok(MoveStrategy::Rename) => MoveState::Succeeded { attempts: attempt },
        Ok(MoveStrategy::CopyDelete) => MoveState::FallbackSucceeded { attempts: attempt },
        Err(error) if attempt < policy.max_attempts && is_transient(&error) => MoveState::Retrying {
            attempt,
            delay: backoff_delay(policy.base_delay, attempt),
            error,
        },
        Err(error) => MoveState::ExhaustedFailed {
            attempts: attempt,
            error,
        },
    }
}

/// Run attempts until a terminal state.
///
/// `attempt_once` performs attempt `n`; `on_retry` sees each retry before `sleep` waits it out.
pub fn drive<A, R, S>(policy: &RetryPolicy, mut attempt_once: A, mut on_retry: R, sleep: S) -> MoveState
where
    A: FnMut(u32) -> io::Result<MoveStrategy>,
    R: FnMut(u32, Duration, &io::Error),
    S: Fn(Duration),
{
    let mut state = MoveState::Attempting { attempt: 1 };
    loop {
        state = match state {
            MoveState::Attempting { attempt } => transition(attempt, policy, attempt_once(attempt)),
            MoveState::Retrying {
                attempt,
                delay,
                error,
            } => {
                on_retry(attempt, delay, &error);
                sleep(delay);
                MoveState::Attempting {
                    attempt: attempt + 1,
                }
            }
            terminal => return terminal,
        };
    }
}
