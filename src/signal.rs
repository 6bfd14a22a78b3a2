// SPDX-License-Identifier: Apache-2.0

//! Handoff between the acquisition-complete interrupt and the polling loop.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Ready flag plus completion counter, shared by exactly one interrupt producer and one polling
/// consumer.
///
/// Only [`signal`](Self::signal) may run in interrupt context, and only one loop may call
/// [`take_ready`](Self::take_ready). Cortex-M0+ has no read-modify-write atomics, so both sides
/// use plain loads and stores; the single-writer/single-clearer split makes that sufficient.
///
/// ```
/// use adc_throughput::signal::CompletionSignal;
///
/// static COMPLETION: CompletionSignal = CompletionSignal::new();
///
/// COMPLETION.signal();
/// assert!(COMPLETION.take_ready());
/// assert!(!COMPLETION.take_ready());
/// assert_eq!(COMPLETION.completions(), 1);
/// ```
#[derive(Debug, Default)]
pub struct CompletionSignal {
    /// At least one completion happened since the last [`take_ready`](Self::take_ready)
    ready: AtomicBool,
    /// Total completions since boot, wrapping at [`u32::MAX`]
    completions: AtomicU32,
}

impl CompletionSignal {
    /// Both fields start cleared
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            completions: AtomicU32::new(0),
        }
    }

    /// Record one completion. Interrupt context only: never blocks, allocates or logs.
    pub fn signal(&self) {
        let total = self.completions.load(Ordering::Relaxed);
        self.completions
            .store(total.wrapping_add(1), Ordering::Relaxed);
        // Publishes the counter update along with the flag
        self.ready.store(true, Ordering::Release);
    }

    /// Read and clear the ready flag, returning its previous value.
    ///
    /// Completions that land between the load and the clear are coalesced into this one, which
    /// is harmless since the consumer always fetches the newest frame.
    pub fn take_ready(&self) -> bool {
        if self.ready.load(Ordering::Acquire) {
            self.ready.store(false, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Total completions recorded so far (wraps at [`u32::MAX`], see [`CompletionTally`])
    pub fn completions(&self) -> u32 {
        self.completions.load(Ordering::Acquire)
    }
}

/// Widens the 32-bit completion counter to 64 bits by counting wrap-arounds.
///
/// Valid as long as it is updated at least once every 2^32 completions, which the polling loop
/// does by a wide margin.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct CompletionTally {
    /// Raw counter value seen on the previous update
    last_raw: u32,
    /// Number of times the raw counter wrapped
    wraps: u32,
}

impl CompletionTally {
    /// Fold in a fresh raw counter reading and return the widened total
    pub fn update(&mut self, raw: u32) -> u64 {
        if raw < self.last_raw {
            self.wraps = self.wraps.wrapping_add(1);
        }
        self.last_raw = raw;
        self.total()
    }

    /// Widened total as of the last update
    pub fn total(&self) -> u64 {
        (u64::from(self.wraps) << 32) | u64::from(self.last_raw)
    }
}
