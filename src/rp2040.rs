// SPDX-License-Identifier: Apache-2.0

//! [RP2040](rp2040_hal) continuous ADC: free-running FIFO with hardware round-robin, drained by
//! DMA into rotating frames.
//!
//! Channel 0 to 3 are GPIO26 to GPIO29, channel 4 is the on-die temperature sensor. The ADC runs
//! from the 48 MHz USB PLL and needs 96 clock cycles per conversion.

use core::ops::RangeInclusive;

/// ADC clock, from `pll_usb`
pub const ADC_CLOCK_HZ: u32 = 48_000_000;
/// Clock cycles taken by one conversion
pub const CYCLES_PER_CONVERSION: u32 = 96;
/// Channel wired to the temperature sensor
pub const TEMP_SENSOR_CHANNEL: u8 = 4;
/// Channels wired to GPIO26 to GPIO29
pub const GPIO_CHANNELS: RangeInclusive<u8> = 0..=3;
/// Sample rates reachable in free-running mode.
///
/// The upper bound is one conversion back-to-back; the lower bound is the largest 16.8
/// fixed-point divider.
pub const SAMPLE_RATE_HZ: RangeInclusive<u32> = 733..=ADC_CLOCK_HZ / CYCLES_PER_CONVERSION;

/// Divider (integer, fraction/256) giving `sample_rate_hz` in free-running mode.
///
/// The ADC samples every `1 + int + frac/256` cycles. Ex. 48 MHz at 83333 samples/s -> sample
/// every 576.004 cycles -> `(575, 1)`. Returns [`None`] outside [`SAMPLE_RATE_HZ`].
pub fn clock_divider(sample_rate_hz: u32) -> Option<(u16, u8)> {
    if !SAMPLE_RATE_HZ.contains(&sample_rate_hz) {
        return None;
    }
    let rate = u64::from(sample_rate_hz);
    let period_256 = (u64::from(ADC_CLOCK_HZ) * 256 + rate / 2) / rate;
    let divider = period_256 - 256;
    let int = u16::try_from(divider >> 8).ok()?;
    Some((int, (divider & 0xff) as u8))
}

/// Sample rate actually produced by a divider, rounded down
pub fn divided_rate_hz(int: u16, frac: u8) -> u32 {
    let period_256 = 256 + (u64::from(int) << 8) + u64::from(frac);
    (u64::from(ADC_CLOCK_HZ) * 256 / period_256) as u32
}

/// Order in which the hardware visits the channels in `mask`, starting from `first`.
///
/// After each conversion the ADC moves to the next higher channel in the mask, wrapping around
/// after channel 4.
pub fn round_robin_order(first: u8, mask: u8) -> impl Iterator<Item = u8> {
    (0..=TEMP_SENSOR_CHANNEL)
        .map(move |offset| (first + offset) % (TEMP_SENSOR_CHANNEL + 1))
        .filter(move |&ch| mask & (1 << ch) != 0)
}

#[cfg(feature = "rp2040")]
pub use board::{AnalogInputs, AnalogPin, Rp2040Adc};

#[cfg(feature = "rp2040")]
mod board {
    use core::ops::RangeInclusive;

    use cortex_m::singleton;
    use rp2040_hal::{
        adc::{Adc, AdcFifo, AdcPin, TempSense},
        dma::{single_buffer, Channel, SingleChannel, CH0},
        gpio::{
            bank0::{Gpio26, Gpio27, Gpio28, Gpio29},
            FunctionSioInput, Pin, PullNone,
        },
        pac, Timer,
    };

    use super::{clock_divider, round_robin_order, GPIO_CHANNELS, TEMP_SENSOR_CHANNEL};
    use crate::{
        buffer::{Frame, FramePool, FrameStorage, FRAME_CAPACITY},
        config::{Attenuation, ChannelSet, ConfigError, Resolution},
        driver::{ContinuousAdc, Snapshot},
        interrupt::{ACTIVE_TRANSFER, FRAMES, ON_COMPLETE},
        signal::CompletionSignal,
    };

    /// GPIO configured as an ADC input
    pub type AnalogPin<I> = AdcPin<Pin<I, FunctionSioInput, PullNone>>;

    /// The four ADC-capable GPIOs, held for as long as acquisition may use them
    pub struct AnalogInputs {
        /// Channel 0
        pub gpio26: AnalogPin<Gpio26>,
        /// Channel 1
        pub gpio27: AnalogPin<Gpio27>,
        /// Channel 2
        pub gpio28: AnalogPin<Gpio28>,
        /// Channel 3
        pub gpio29: AnalogPin<Gpio29>,
    }

    /// Register values derived from the configuration
    struct Acquisition {
        /// AINSEL: channel converted first
        first: u8,
        /// RROBIN: channels visited round-robin
        mask: u8,
        /// Integer and fractional clock divider
        divider: (u16, u8),
        /// Samples per frame
        frame_len: usize,
    }

    /// Continuous ADC on the RP2040, with completion reported from `DMA_IRQ_0`
    pub struct Rp2040Adc {
        /// ADC, until the FIFO takes it over
        adc: Option<&'static mut Adc>,
        /// Running FIFO
        fifo: Option<AdcFifo<'static, u16>>,
        /// DMA channel, until the first transfer takes it over
        dma: Option<Channel<CH0>>,
        /// Pins kept out of reach of other drivers
        _inputs: AnalogInputs,
        /// Enables channel 4 while held
        temp_sensor: Option<TempSense>,
        /// Time base for read timeouts
        timer: Timer,
        /// Pending or applied configuration
        acquisition: Option<Acquisition>,
        /// Frame currently lent out as a [`Snapshot`]
        held: Option<Frame>,
        /// Channels per round
        channel_count: usize,
    }

    impl Rp2040Adc {
        /// Wrap the ADC, enabling the temperature sensor as channel 4
        pub fn new(
            adc: &'static mut Adc,
            inputs: AnalogInputs,
            dma: Channel<CH0>,
            timer: Timer,
        ) -> Self {
            let temp_sensor = adc.take_temp_sensor();
            Self {
                adc: Some(adc),
                fifo: None,
                dma: Some(dma),
                _inputs: inputs,
                temp_sensor,
                timer,
                acquisition: None,
                held: None,
                channel_count: 0,
            }
        }

        /// Whether the FIFO has been started
        pub fn is_running(&self) -> bool {
            self.fifo.is_some()
        }
    }

    impl ContinuousAdc for Rp2040Adc {
        const SAMPLE_RATE_HZ: RangeInclusive<u32> = super::SAMPLE_RATE_HZ;

        fn is_analog_channel(&self, channel: u8) -> bool {
            GPIO_CHANNELS.contains(&channel)
                || (channel == TEMP_SENSOR_CHANNEL && self.temp_sensor.is_some())
        }

        fn set_resolution(&mut self, resolution: Resolution) -> Result<(), ConfigError> {
            match resolution {
                Resolution::BITS12 => Ok(()),
                _ => Err(ConfigError::UnsupportedResolution(resolution)),
            }
        }

        fn set_attenuation(&mut self, attenuation: Attenuation) -> Result<(), ConfigError> {
            match attenuation {
                Attenuation::Attenuation0dB => Ok(()),
                _ => Err(ConfigError::UnsupportedAttenuation(attenuation)),
            }
        }

        fn configure(
            &mut self,
            channels: &ChannelSet,
            conversions_per_channel: u8,
            sample_rate_hz: u32,
            on_complete: &'static CompletionSignal,
        ) -> Result<(), ConfigError> {
            if self.is_running() {
                return Err(ConfigError::AlreadyStarted);
            }
            if let Some(&ch) = channels
                .as_slice()
                .iter()
                .find(|&&ch| !self.is_analog_channel(ch))
            {
                return Err(ConfigError::NonAnalogChannel(ch));
            }
            let frame_len = channels.len() * usize::from(conversions_per_channel);
            if frame_len == 0 || frame_len > FRAME_CAPACITY {
                return Err(ConfigError::FrameTooLarge(frame_len));
            }
            let divider = clock_divider(sample_rate_hz)
                .ok_or(ConfigError::UnsupportedSampleRate(sample_rate_hz))?;

            let first = channels.as_slice()[0];
            let mask = channels.mask() as u8;
            if !channels
                .as_slice()
                .iter()
                .copied()
                .eq(round_robin_order(first, mask))
            {
                warn!("Channel order differs from hardware round-robin; frames follow hardware order");
            }

            debug!(
                "ADC divider {}.{} for {} Hz, {} samples per frame",
                divider.0,
                divider.1,
                sample_rate_hz,
                frame_len
            );
            self.acquisition = Some(Acquisition {
                first,
                mask,
                divider,
                frame_len,
            });
            self.channel_count = channels.len();

            debug!("critical_section: register completion signal");
            critical_section::with(|cs| ON_COMPLETE.borrow(cs).set(Some(on_complete)));
            Ok(())
        }

        fn start(&mut self) -> Result<(), ConfigError> {
            if self.is_running() {
                return Err(ConfigError::AlreadyStarted);
            }
            let acquisition = self.acquisition.as_ref().ok_or(ConfigError::NotConfigured)?;
            let frames = singleton!(: FrameStorage = [[0u16; FRAME_CAPACITY]; 3])
                .ok_or(ConfigError::AlreadyStarted)?;
            let (Some(adc), Some(mut dma)) = (self.adc.take(), self.dma.take()) else {
                return Err(ConfigError::AlreadyStarted);
            };

            let len = acquisition.frame_len;
            let [dma_frame, spare_frame, held_frame] = frames;
            let (int, frac) = acquisition.divider;
            let mut fifo = adc
                .build_fifo()
                .clock_divider(int, frac)
                .enable_dma()
                .start_paused();

            // Round-robin is set directly so the channel set can be chosen at runtime.
            // SAFETY: the FIFO is paused; only AINSEL and RROBIN change.
            let regs = unsafe { &*pac::ADC::ptr() };
            regs.cs().modify(|_, w| unsafe {
                w.ainsel()
                    .bits(acquisition.first)
                    .rrobin()
                    .bits(acquisition.mask)
            });

            dma.enable_irq0();
            let transfer =
                single_buffer::Config::new(dma, fifo.dma_read_target(), &mut dma_frame[..len])
                    .start();
            debug!("critical_section: hand frames and transfer to DMA_IRQ_0");
            critical_section::with(|cs| {
                FRAMES.replace(cs, FramePool::with_spare(&mut spare_frame[..len]));
                ACTIVE_TRANSFER.replace(cs, Some(transfer));
            });
            self.held = Some(&mut held_frame[..len]);

            unsafe { pac::NVIC::unmask(pac::Interrupt::DMA_IRQ_0) }
            fifo.resume();
            self.fifo = Some(fifo);
            Ok(())
        }

        fn read_latest(&mut self, timeout_ms: u32) -> Option<Snapshot<'_>> {
            let started = self.timer.get_counter().ticks();
            let timeout_us = u64::from(timeout_ms) * 1000;
            let held = &mut self.held;
            let fresh = loop {
                let fresh =
                    critical_section::with(|cs| FRAMES.borrow_ref_mut(cs).take_latest(held));
                if fresh || self.timer.get_counter().ticks().wrapping_sub(started) >= timeout_us {
                    break fresh;
                }
            };

            if !fresh {
                let (discarded, overruns) = critical_section::with(|cs| {
                    let frames = FRAMES.borrow_ref(cs);
                    (frames.discarded(), frames.overruns())
                });
                debug!(
                    "No frame available ({} discarded, {} overruns so far)",
                    discarded,
                    overruns
                );
                return None;
            }
            self.held
                .as_deref()
                .map(|frame| Snapshot::new(frame, self.channel_count))
        }
    }
}
