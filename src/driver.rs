// SPDX-License-Identifier: Apache-2.0

//! Boundary to the continuous-mode ADC peripheral driver.

use core::ops::RangeInclusive;

use crate::{
    config::{Attenuation, ChannelSet, ConfigError, Resolution},
    signal::CompletionSignal,
};

/// A continuous (free-running) multi-channel ADC.
///
/// Implementations sample the configured channels round-robin into frames of
/// `channels x conversions_per_channel` samples, and call
/// [`CompletionSignal::signal`] from interrupt context each time a frame completes.
pub trait ContinuousAdc {
    /// Aggregate sample rates supported in continuous mode, in samples per second
    const SAMPLE_RATE_HZ: RangeInclusive<u32>;

    /// Whether `channel` can be sampled on this target
    fn is_analog_channel(&self, channel: u8) -> bool;

    /// Select the conversion width
    fn set_resolution(&mut self, resolution: Resolution) -> Result<(), ConfigError>;

    /// Select the input attenuation
    fn set_attenuation(&mut self, attenuation: Attenuation) -> Result<(), ConfigError>;

    /// Configure the channel sequence and rate, and register `on_complete` as the completion
    /// callback. Nothing is sampled until [`start`](Self::start).
    fn configure(
        &mut self,
        channels: &ChannelSet,
        conversions_per_channel: u8,
        sample_rate_hz: u32,
        on_complete: &'static CompletionSignal,
    ) -> Result<(), ConfigError>;

    /// Begin continuous acquisition
    fn start(&mut self) -> Result<(), ConfigError>;

    /// Fetch the most recently completed frame, waiting up to `timeout_ms` for one to arrive.
    ///
    /// Returns [`None`] if no new frame completed since the previous call. The snapshot borrows
    /// the driver, so it cannot outlive the next retrieval.
    fn read_latest(&mut self, timeout_ms: u32) -> Option<Snapshot<'_>>;
}

/// Borrowed view of one completed frame.
///
/// Samples are interleaved: one per channel in sampling order, repeated for every conversion.
#[derive(Debug, Copy, Clone)]
pub struct Snapshot<'a> {
    /// Raw conversion results
    samples: &'a [u16],
    /// Channels per round
    channel_count: usize,
}

impl<'a> Snapshot<'a> {
    /// Wrap a frame of interleaved samples. `channel_count` must be non-zero.
    pub fn new(samples: &'a [u16], channel_count: usize) -> Self {
        Self {
            samples,
            channel_count: channel_count.max(1),
        }
    }

    /// All samples in acquisition order
    pub fn samples(&self) -> &'a [u16] {
        self.samples
    }

    /// Channels per round
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Samples belonging to the channel at position `index` of the channel set. Empty if `index`
    /// is out of range.
    pub fn channel(&self, index: usize) -> impl Iterator<Item = u16> + 'a {
        let rounds = if index < self.channel_count {
            usize::MAX
        } else {
            0
        };
        self.samples
            .iter()
            .skip(index)
            .step_by(self.channel_count)
            .take(rounds)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_view_deinterleaves() {
        let frame = [10, 20, 30, 11, 21, 31];
        let snapshot = Snapshot::new(&frame, 3);

        assert_eq!(snapshot.channel_count(), 3);
        assert!(snapshot.channel(0).eq([10, 11]));
        assert!(snapshot.channel(2).eq([30, 31]));
        assert_eq!(snapshot.channel(3).count(), 0);
        assert_eq!(snapshot.samples().len(), 6);
    }
}
