// SPDX-License-Identifier: Apache-2.0

//! Acquisition lifecycle and the reporting loop.

use core::fmt::Write;

use crate::{
    config::{ChannelSet, ConfigError, SamplingConfig, READ_TIMEOUT_MS},
    driver::ContinuousAdc,
    signal::{CompletionSignal, CompletionTally},
};

/// Printed when a completion was signalled but the driver had no frame to hand over
pub const READ_ERROR_MSG: &str =
    "Error occurred during reading data. Raise the log level to debug or lower for more information.";

/// Effective sampling throughput, averaged since boot
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EffectiveRate {
    /// Milliseconds since boot at the time of the report
    pub elapsed_ms: u64,
    /// Frames completed since boot
    pub completions: u64,
    /// Samples per second across all channels
    pub aggregate_sps: f32,
    /// Samples per second for each channel
    pub per_channel_sps: f32,
}

impl EffectiveRate {
    /// Cumulative average rate since boot:
    /// `completions x channel_count x conversions_per_channel / elapsed seconds`.
    ///
    /// Returns [`None`] when no time has elapsed or there are no channels.
    pub fn compute(
        completions: u64,
        channel_count: usize,
        conversions_per_channel: u8,
        elapsed_ms: u64,
    ) -> Option<Self> {
        if elapsed_ms == 0 || channel_count == 0 {
            return None;
        }

        let samples =
            completions as f32 * channel_count as f32 * f32::from(conversions_per_channel);
        let elapsed_s = elapsed_ms as f32 / 1000.0;
        let aggregate_sps = samples / elapsed_s;
        Some(Self {
            elapsed_ms,
            completions,
            aggregate_sps,
            per_channel_sps: aggregate_sps / channel_count as f32,
        })
    }
}

/// Result of one [`Supervisor::poll_and_report`] call
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PollOutcome {
    /// No completion pending; nothing was done
    Idle,
    /// A frame was retrieved and the rate reported
    Reported(EffectiveRate),
    /// A frame was retrieved, but no time has elapsed yet to compute a rate from
    NotReportable,
    /// A completion was signalled, but the driver had no frame available
    RetrievalFailed,
}

/// Acquisition could not be started. The driver is handed back untouched by the supervisor.
#[derive(Debug)]
pub struct StartError<A> {
    /// Driver, still unconfigured or not started
    pub adc: A,
    /// What went wrong
    pub error: ConfigError,
}

/// Owns a running ADC, polls for completed frames and reports the effective sample rate as text
/// lines on `serial`.
pub struct Supervisor<A, W> {
    /// Running driver
    adc: A,
    /// Channels being sampled
    channels: ChannelSet,
    /// Parameters acquisition was started with
    config: SamplingConfig,
    /// Completion handoff registered with the driver
    signal: &'static CompletionSignal,
    /// Widened completion count
    tally: CompletionTally,
    /// Report output
    serial: W,
}

impl<A: ContinuousAdc, W: Write> Supervisor<A, W> {
    /// Validate the configuration, register `on_complete` with the driver and start continuous
    /// acquisition.
    ///
    /// On failure nothing is started and the driver is returned inside [`StartError`].
    pub fn configure_and_start(
        mut adc: A,
        channels: ChannelSet,
        config: SamplingConfig,
        on_complete: &'static CompletionSignal,
        serial: W,
    ) -> Result<Self, StartError<A>> {
        if let Err(error) = Self::apply(&mut adc, &channels, &config, on_complete) {
            error!("Unable to start acquisition: {}", error);
            return Err(StartError { adc, error });
        }

        info!(
            "Continuous acquisition started on {} channels at {} Hz",
            channels.len(),
            config.sample_rate_hz
        );
        Ok(Self {
            adc,
            channels,
            config,
            signal: on_complete,
            tally: CompletionTally::default(),
            serial,
        })
    }

    /// Validation and driver setup, in the order the peripheral expects them
    fn apply(
        adc: &mut A,
        channels: &ChannelSet,
        config: &SamplingConfig,
        on_complete: &'static CompletionSignal,
    ) -> Result<(), ConfigError> {
        if config.conversions_per_channel == 0 {
            return Err(ConfigError::InvalidConversions(0));
        }
        if let Some(&ch) = channels
            .as_slice()
            .iter()
            .find(|&&ch| !adc.is_analog_channel(ch))
        {
            return Err(ConfigError::NonAnalogChannel(ch));
        }
        if !A::SAMPLE_RATE_HZ.contains(&config.sample_rate_hz) {
            return Err(ConfigError::UnsupportedSampleRate(config.sample_rate_hz));
        }

        adc.set_resolution(config.resolution)?;
        adc.set_attenuation(config.attenuation)?;
        adc.configure(
            channels,
            config.conversions_per_channel,
            config.sample_rate_hz,
            on_complete,
        )?;
        adc.start()
    }

    /// Loop body: if a frame completed since the last call, fetch it and report the effective
    /// sample rate. Never blocks, and does nothing at all when no completion is pending.
    pub fn poll_and_report(&mut self, now_millis: u64) -> PollOutcome {
        if !self.signal.take_ready() {
            return PollOutcome::Idle;
        }

        let channel_count = self.channels.len();
        let Some(snapshot) = self.adc.read_latest(READ_TIMEOUT_MS) else {
            warn!("Completion signalled but no frame was available");
            if writeln!(self.serial, "{}\r", READ_ERROR_MSG).is_err() {
                warn!("Unable to write to serial");
            }
            return PollOutcome::RetrievalFailed;
        };

        #[cfg(feature = "trace_snapshots")]
        for (idx, ch) in self.channels.as_slice().iter().enumerate() {
            if let Some(sample) = snapshot.channel(idx).next() {
                trace!("channel {}: {}", ch, sample);
            }
        }
        #[cfg(not(feature = "trace_snapshots"))]
        let _ = snapshot;

        let completions = self.tally.update(self.signal.completions());
        let Some(rate) = EffectiveRate::compute(
            completions,
            channel_count,
            self.config.conversions_per_channel,
            now_millis,
        ) else {
            debug!("No elapsed time yet, skipping report");
            return PollOutcome::NotReportable;
        };

        info!(
            "millis: {} completions: {} rate: {} S/s per channel: {} S/s",
            rate.elapsed_ms,
            rate.completions,
            rate.aggregate_sps,
            rate.per_channel_sps
        );
        if writeln!(
            self.serial,
            "millis: {}  completions: {}  effective_rate: {:.2} S/s  effective_rate_per_channel: {:.2} S/s\r",
            rate.elapsed_ms, rate.completions, rate.aggregate_sps, rate.per_channel_sps
        )
        .is_err()
        {
            warn!("Unable to write to serial");
        }
        PollOutcome::Reported(rate)
    }

    /// Channels being sampled
    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Parameters acquisition was started with
    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Underlying driver
    pub fn driver(&self) -> &A {
        &self.adc
    }
}

#[cfg(test)]
mod tests {
    use core::ops::RangeInclusive;

    use super::*;
    use crate::{
        config::{Attenuation, Resolution, SAMPLING},
        driver::Snapshot,
    };

    /// Driver double: channels 0..=4 are analog, frames are always available unless
    /// `frame_available` is cleared.
    #[derive(Debug, Default)]
    struct FakeAdc {
        resolution: Option<Resolution>,
        configured_with: Option<(Vec<u8>, u8, u32)>,
        registered: bool,
        started: bool,
        frame_available: bool,
        reads: u32,
        frame: Vec<u16>,
    }

    impl FakeAdc {
        fn new() -> Self {
            Self {
                frame_available: true,
                ..Self::default()
            }
        }
    }

    impl ContinuousAdc for FakeAdc {
        const SAMPLE_RATE_HZ: RangeInclusive<u32> = 611..=83_333;

        fn is_analog_channel(&self, channel: u8) -> bool {
            channel <= 4
        }

        fn set_resolution(&mut self, resolution: Resolution) -> Result<(), ConfigError> {
            if resolution.bits() < 9 {
                return Err(ConfigError::UnsupportedResolution(resolution));
            }
            self.resolution = Some(resolution);
            Ok(())
        }

        fn set_attenuation(&mut self, attenuation: Attenuation) -> Result<(), ConfigError> {
            match attenuation {
                Attenuation::Attenuation2p5dB => {
                    Err(ConfigError::UnsupportedAttenuation(attenuation))
                }
                _ => Ok(()),
            }
        }

        fn configure(
            &mut self,
            channels: &ChannelSet,
            conversions_per_channel: u8,
            sample_rate_hz: u32,
            _on_complete: &'static CompletionSignal,
        ) -> Result<(), ConfigError> {
            self.configured_with = Some((
                channels.as_slice().to_vec(),
                conversions_per_channel,
                sample_rate_hz,
            ));
            self.registered = true;
            self.frame = (0..channels.len() * usize::from(conversions_per_channel))
                .map(|n| n as u16)
                .collect();
            Ok(())
        }

        fn start(&mut self) -> Result<(), ConfigError> {
            if self.configured_with.is_none() {
                return Err(ConfigError::NotConfigured);
            }
            self.started = true;
            Ok(())
        }

        fn read_latest(&mut self, _timeout_ms: u32) -> Option<Snapshot<'_>> {
            self.reads += 1;
            if !self.frame_available {
                return None;
            }
            let channels = self.configured_with.as_ref().map_or(1, |c| c.0.len());
            Some(Snapshot::new(&self.frame, channels))
        }
    }

    fn leak_signal() -> &'static CompletionSignal {
        Box::leak(Box::new(CompletionSignal::new()))
    }

    fn start(
        adc: FakeAdc,
        channels: &[u8],
        config: SamplingConfig,
    ) -> Result<Supervisor<FakeAdc, String>, StartError<FakeAdc>> {
        Supervisor::configure_and_start(
            adc,
            ChannelSet::new(channels).unwrap(),
            config,
            leak_signal(),
            String::new(),
        )
    }

    #[test]
    fn valid_configuration_starts_acquisition() {
        for channels in [&[0u8][..], &[1, 2, 3, 4][..], &[4, 0, 2][..]] {
            let supervisor = start(FakeAdc::new(), channels, SAMPLING).unwrap();
            let adc = supervisor.driver();
            assert!(adc.started);
            assert!(adc.registered);
            assert_eq!(adc.resolution, Some(Resolution::BITS12));
            assert_eq!(
                adc.configured_with,
                Some((channels.to_vec(), 1, SAMPLING.sample_rate_hz))
            );
            assert_eq!(supervisor.channels().as_slice(), channels);
            assert_eq!(supervisor.config(), &SAMPLING);
        }
    }

    #[test]
    fn non_analog_channel_leaves_system_unconfigured() {
        let err = start(FakeAdc::new(), &[1, 9, 2], SAMPLING).err().unwrap();
        assert_eq!(err.error, ConfigError::NonAnalogChannel(9));
        assert!(!err.adc.started);
        assert!(err.adc.configured_with.is_none());
    }

    #[test]
    fn sample_rate_outside_range_is_rejected() {
        for rate in [0, 610, 83_334] {
            let config = SamplingConfig {
                sample_rate_hz: rate,
                ..SAMPLING
            };
            let err = start(FakeAdc::new(), &[0, 1], config).err().unwrap();
            assert_eq!(err.error, ConfigError::UnsupportedSampleRate(rate));
            assert!(!err.adc.started);
        }
    }

    #[test]
    fn driver_rejections_are_surfaced() {
        let config = SamplingConfig {
            resolution: Resolution::BITS8,
            ..SAMPLING
        };
        let err = start(FakeAdc::new(), &[0], config).err().unwrap();
        assert_eq!(
            err.error,
            ConfigError::UnsupportedResolution(Resolution::BITS8)
        );

        let config = SamplingConfig {
            attenuation: Attenuation::Attenuation2p5dB,
            ..SAMPLING
        };
        let err = start(FakeAdc::new(), &[0], config).err().unwrap();
        assert_eq!(
            err.error,
            ConfigError::UnsupportedAttenuation(Attenuation::Attenuation2p5dB)
        );
        assert!(!err.adc.started);
    }

    #[test]
    fn zero_conversions_rejected() {
        let config = SamplingConfig {
            conversions_per_channel: 0,
            ..SAMPLING
        };
        let err = start(FakeAdc::new(), &[0], config).err().unwrap();
        assert_eq!(err.error, ConfigError::InvalidConversions(0));
    }

    #[test]
    fn rate_is_cumulative_average() {
        let rate = EffectiveRate::compute(1000, 4, 1, 10_000).unwrap();
        assert_eq!(rate.aggregate_sps, 400.0);
        assert_eq!(rate.per_channel_sps, 100.0);
        assert_eq!(rate.completions, 1000);
        assert_eq!(rate.elapsed_ms, 10_000);

        let rate = EffectiveRate::compute(500, 2, 4, 2_000).unwrap();
        assert_eq!(rate.aggregate_sps, 2000.0);
        assert_eq!(rate.per_channel_sps, 1000.0);
    }

    #[test]
    fn rate_undefined_without_elapsed_time() {
        assert_eq!(EffectiveRate::compute(1000, 4, 1, 0), None);
        assert_eq!(EffectiveRate::compute(0, 4, 1, 0), None);
    }

    #[test]
    fn one_completion_reports_expected_line() {
        let mut supervisor = start(FakeAdc::new(), &[1, 2, 3, 4], SAMPLING).unwrap();
        supervisor.signal.signal();

        let outcome = supervisor.poll_and_report(1000);
        let PollOutcome::Reported(rate) = outcome else {
            panic!("expected a report, got {outcome:?}");
        };
        assert_eq!(rate.completions, 1);
        assert!((rate.aggregate_sps - 4.0).abs() < 1e-6);
        assert!((rate.per_channel_sps - 1.0).abs() < 1e-6);

        assert_eq!(
            supervisor.serial,
            "millis: 1000  completions: 1  effective_rate: 4.00 S/s  effective_rate_per_channel: 1.00 S/s\r\n"
        );
        assert_eq!(supervisor.driver().reads, 1);
    }

    #[test]
    fn idle_poll_is_a_no_op() {
        let mut supervisor = start(FakeAdc::new(), &[0, 1], SAMPLING).unwrap();
        let tally = supervisor.tally;

        assert_eq!(supervisor.poll_and_report(5_000), PollOutcome::Idle);
        assert_eq!(supervisor.poll_and_report(6_000), PollOutcome::Idle);
        assert!(supervisor.serial.is_empty());
        assert_eq!(supervisor.driver().reads, 0);
        assert_eq!(supervisor.tally, tally);
    }

    #[test]
    fn failed_retrieval_emits_diagnostic_and_stays_cleared() {
        let mut adc = FakeAdc::new();
        adc.frame_available = false;
        let mut supervisor = start(adc, &[0, 1, 2, 3], SAMPLING).unwrap();
        supervisor.signal.signal();

        assert_eq!(
            supervisor.poll_and_report(1_000),
            PollOutcome::RetrievalFailed
        );
        assert_eq!(supervisor.serial, format!("{READ_ERROR_MSG}\r\n"));

        // Not re-armed: the next poll without a new completion is idle
        assert_eq!(supervisor.poll_and_report(1_001), PollOutcome::Idle);
        assert_eq!(supervisor.driver().reads, 1);
    }

    #[test]
    fn zero_elapsed_time_is_not_reported() {
        let mut supervisor = start(FakeAdc::new(), &[0, 1, 2, 3], SAMPLING).unwrap();
        supervisor.signal.signal();

        assert_eq!(supervisor.poll_and_report(0), PollOutcome::NotReportable);
        assert!(supervisor.serial.is_empty());
    }

    #[test]
    fn coalesced_completions_are_all_counted() {
        let mut supervisor = start(FakeAdc::new(), &[0, 1, 2, 3], SAMPLING).unwrap();
        for _ in 0..1000 {
            supervisor.signal.signal();
        }

        let outcome = supervisor.poll_and_report(10_000);
        assert_eq!(supervisor.poll_and_report(10_001), PollOutcome::Idle);
        let PollOutcome::Reported(rate) = outcome else {
            panic!("expected a report, got {outcome:?}");
        };
        assert_eq!(rate.completions, 1000);
        assert_eq!(rate.aggregate_sps, 400.0);
        assert_eq!(rate.per_channel_sps, 100.0);
        assert_eq!(supervisor.serial.lines().count(), 1);
    }
}
