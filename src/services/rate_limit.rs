// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Multi-window rolling rate limiter.
//!
//! A call is admitted only when every configured window has room. The
//! limiter only makes timing decisions; it never touches business data.

use crate::models::Provider;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// `limit` calls per rolling `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCap {
    pub limit: u32,
    pub window: Duration,
}

impl WindowCap {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub fn daily(limit: u32) -> Self {
        Self::new(limit, DAY)
    }

    /// Documented caps for a provider; empty means unbounded.
    pub fn provider_defaults(provider: Provider) -> Vec<WindowCap> {
        match provider {
            // Strava read limits: 100 per 15 minutes, 1000 per day.
            Provider::Strava => vec![
                WindowCap::new(100, Duration::from_secs(15 * 60)),
                WindowCap::daily(1000),
            ],
            Provider::Garmin => Vec::new(),
        }
    }
}

/// Outcome of asking for a call slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Proceed,
    /// A slot opens after this delay
    Wait(Duration),
    /// No slot opens within the allowed wait; stop this run
    Exhausted,
}

#[derive(Debug)]
struct Window {
    cap: WindowCap,
    calls: VecDeque<Instant>,
}

impl Window {
    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) >= self.cap.window {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// Delay until this window can take one more call.
    fn wait_needed(&self, now: Instant) -> Duration {
        if (self.calls.len() as u32) < self.cap.limit {
            return Duration::ZERO;
        }
        // The call that must age out is `len - limit` from the front.
        let idx = self.calls.len() - self.cap.limit as usize;
        let release = self.calls[idx] + self.cap.window;
        release.saturating_duration_since(now)
    }
}

/// Rolling-window limiter over any number of caps.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Vec<Window>,
    max_wait: Duration,
}

impl RateLimiter {
    pub fn new(caps: Vec<WindowCap>, max_wait: Duration) -> Self {
        Self {
            windows: caps
                .into_iter()
                .map(|cap| Window {
                    cap,
                    calls: VecDeque::new(),
                })
                .collect(),
            max_wait,
        }
    }

    /// A limiter that admits everything.
    pub fn unbounded() -> Self {
        Self::new(Vec::new(), Duration::ZERO)
    }

    /// Decide whether a call may go out at `now`.
    pub fn check(&mut self, now: Instant) -> Admission {
        let mut wait = Duration::ZERO;
        for window in &mut self.windows {
            window.prune(now);
            wait = wait.max(window.wait_needed(now));
        }

        if wait.is_zero() {
            Admission::Proceed
        } else if wait > self.max_wait {
            Admission::Exhausted
        } else {
            Admission::Wait(wait)
        }
    }

    /// Record an outbound call.
    pub fn record(&mut self, now: Instant) {
        for window in &mut self.windows {
            window.calls.push_back(now);
        }
    }

    /// Wait for a slot and record the call, or report exhaustion.
    ///
    /// Returns `false` when the run should stop instead of sleeping.
    pub async fn admit_call(&mut self) -> bool {
        loop {
            match self.check(Instant::now()) {
                Admission::Proceed => {
                    self.record(Instant::now());
                    return true;
                }
                Admission::Wait(delay) => {
                    tracing::info!(
                        wait_secs = delay.as_secs(),
                        "Rate limit window full, waiting"
                    );
                    tokio::time::sleep(delay).await;
                }
                Admission::Exhausted => return false,
            }
        }
    }

    /// Align local accounting with usage the provider reports.
    ///
    /// `usage[i]` is the count the server has seen in window `i`. Local
    /// counts are only ever raised, since the server may count calls made
    /// by other clients of the same account.
    pub fn observe_usage(&mut self, usage: &[u32], now: Instant) {
        for (window, &used) in self.windows.iter_mut().zip(usage) {
            window.prune(now);
            while (window.calls.len() as u32) < used.min(window.cap.limit) {
                window.calls.push_back(now);
            }
        }
    }
}
