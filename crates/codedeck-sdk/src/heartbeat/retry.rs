// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Retry strategies for failed heartbeats.
//!
//! Heartbeats are best-effort. The default strategy, [`NextTriggerRetry`],
//! never schedules anything: the next interval tick or the next activity
//! event is the retry.

use std::time::Duration;

use crate::error::SdkError;

/// What to do after a heartbeat failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do nothing; rely on the next tick or activity event.
    WaitForNextTrigger,
    /// Send again after the given delay (only if the same run is still active).
    RetryAfter(Duration),
}

/// Strategy consulted after every failed heartbeat (401 excluded).
pub trait RetryPolicy: Send + Sync {
    /// `attempt` is 1 for the original send, 2 for the first retry, and so on.
    fn decide(&self, attempt: u32, error: &SdkError) -> RetryDecision;
}

/// No explicit retries, no backoff, no attempt limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NextTriggerRetry;

impl RetryPolicy for NextTriggerRetry {
    fn decide(&self, _attempt: u32, _error: &SdkError) -> RetryDecision {
        RetryDecision::WaitForNextTrigger
    }
}

/// Retry after a fixed delay, up to `max_attempts` sends in total.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelayRetry {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl FixedDelayRetry {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl RetryPolicy for FixedDelayRetry {
    fn decide(&self, attempt: u32, _error: &SdkError) -> RetryDecision {
        if attempt < self.max_attempts {
            RetryDecision::RetryAfter(self.delay)
        } else {
            RetryDecision::WaitForNextTrigger
        }
    }
}
