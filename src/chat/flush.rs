// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Flush rate gate
//!
//! Streaming deltas arrive far faster than a UI usefully repaints, so
//! visible content updates are coalesced: a flush happens only when the
//! minimum interval has elapsed since the previous one. The decision is a
//! pure function of (last flush, now, interval) so it can be tested
//! without clocks; the final flush at stream end bypasses the gate
//! entirely.

use std::time::{Duration, Instant};

/// Default minimum interval between visible content flushes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(200);

/// Whether a flush is due given the last flush time and the minimum interval
pub fn flush_due(last_flush: Instant, now: Instant, min_interval: Duration) -> bool {
    now.saturating_duration_since(last_flush) >= min_interval
}

/// Stateful wrapper tracking the last flush instant for one streaming run
#[derive(Debug)]
pub struct FlushGate {
    min_interval: Duration,
    last_flush: Instant,
}

impl FlushGate {
    /// Open a gate at stream start; the first flush becomes due one full
    /// interval later.
    pub fn new(min_interval: Duration, now: Instant) -> Self {
        Self {
            min_interval,
            last_flush: now,
        }
    }

    /// Check the gate; records `now` as the flush time when due.
    pub fn poll(&mut self, now: Instant) -> bool {
        if flush_due(self.last_flush, now, self.min_interval) {
            self.last_flush = now;
            true
        } else {
            false
        }
    }
}
