// SPDX-License-Identifier: Apache-2.0

//! Startup configuration: channel set, sampling parameters and the errors raised while applying
//! them.

use core::fmt::{self, Display, Formatter};

/// Channels sampled round-robin: GPIO26 to GPIO29
pub const ADC_CHANNELS: [u8; 4] = [0, 1, 2, 3];
/// Conversions per channel in each completed frame
pub const CONVERSIONS_PER_CHANNEL: u8 = 1;
/// Aggregate sample rate across all channels
pub const SAMPLE_RATE_HZ: u32 = 83_333;
/// Baud rate of the reporting UART
pub const SERIAL_BAUD: u32 = 115_200;
/// Wait used when fetching the latest frame. 0 never blocks the polling loop.
pub const READ_TIMEOUT_MS: u32 = 0;

/// Sampling parameters applied at startup
pub const SAMPLING: SamplingConfig = SamplingConfig {
    resolution: Resolution::BITS12,
    attenuation: Attenuation::Attenuation0dB,
    conversions_per_channel: CONVERSIONS_PER_CHANNEL,
    sample_rate_hz: SAMPLE_RATE_HZ,
};

/// Largest channel set supported by [`ChannelSet`]
pub const MAX_CHANNELS: usize = 8;

/// Conversion width
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// 8 bit
    BITS8,
    /// 9 bit
    BITS9,
    /// 10 bit
    BITS10,
    /// 11 bit
    BITS11,
    /// 12 bit
    BITS12,
}

impl Resolution {
    /// Width in bits
    pub const fn bits(self) -> u8 {
        match self {
            Resolution::BITS8 => 8,
            Resolution::BITS9 => 9,
            Resolution::BITS10 => 10,
            Resolution::BITS11 => 11,
            Resolution::BITS12 => 12,
        }
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Input attenuation, which sets the measurable voltage range
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Attenuation {
    /// No attenuation
    Attenuation0dB,
    /// 2.5 dB
    Attenuation2p5dB,
    /// 6 dB
    Attenuation6dB,
    /// 11 dB
    Attenuation11dB,
}

impl Display for Attenuation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Attenuation::Attenuation0dB => "0 dB",
            Attenuation::Attenuation2p5dB => "2.5 dB",
            Attenuation::Attenuation6dB => "6 dB",
            Attenuation::Attenuation11dB => "11 dB",
        })
    }
}

/// Sampling parameters. Fixed once acquisition has started.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SamplingConfig {
    /// Conversion width
    pub resolution: Resolution,
    /// Input attenuation
    pub attenuation: Attenuation,
    /// Conversions of every channel in one completed frame
    pub conversions_per_channel: u8,
    /// Target aggregate rate across all channels, in samples per second
    pub sample_rate_hz: u32,
}

/// Reasons acquisition could not be configured or started
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// No channels were given
    EmptyChannelSet,
    /// More than [`MAX_CHANNELS`] channels were given
    TooManyChannels(usize),
    /// A channel appears more than once
    DuplicateChannel(u8),
    /// The channel is not routed to the ADC on this target
    NonAnalogChannel(u8),
    /// Sample rate outside the continuous-mode range of the driver
    UnsupportedSampleRate(u32),
    /// The driver cannot convert at this width
    UnsupportedResolution(Resolution),
    /// The driver cannot apply this attenuation
    UnsupportedAttenuation(Attenuation),
    /// Conversions per channel must be at least 1
    InvalidConversions(u8),
    /// One frame (channels x conversions) does not fit the DMA buffers
    FrameTooLarge(usize),
    /// Acquisition was started before being configured
    NotConfigured,
    /// Acquisition is already running
    AlreadyStarted,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyChannelSet => f.write_str("channel set is empty"),
            ConfigError::TooManyChannels(count) => {
                write!(f, "{count} channels given, at most {MAX_CHANNELS} supported")
            }
            ConfigError::DuplicateChannel(ch) => write!(f, "channel {ch} listed twice"),
            ConfigError::NonAnalogChannel(ch) => write!(f, "channel {ch} is not analog-capable"),
            ConfigError::UnsupportedSampleRate(rate) => {
                write!(f, "sample rate {rate} Hz is outside the continuous range")
            }
            ConfigError::UnsupportedResolution(res) => write!(f, "{res} resolution unsupported"),
            ConfigError::UnsupportedAttenuation(atten) => {
                write!(f, "{atten} attenuation unsupported")
            }
            ConfigError::InvalidConversions(n) => {
                write!(f, "{n} conversions per channel, at least 1 required")
            }
            ConfigError::FrameTooLarge(len) => write!(f, "frame of {len} samples is too large"),
            ConfigError::NotConfigured => f.write_str("acquisition started before configuration"),
            ConfigError::AlreadyStarted => f.write_str("acquisition already running"),
        }
    }
}

/// Ordered, non-empty set of distinct hardware channel ids
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChannelSet {
    /// Channel ids, valid up to `len`
    channels: [u8; MAX_CHANNELS],
    /// Number of channels in use
    len: usize,
}

impl ChannelSet {
    /// Build a channel set, keeping the given order.
    ///
    /// Whether each channel is analog-capable depends on the driver and is checked when
    /// acquisition is configured.
    pub fn new(channels: &[u8]) -> Result<Self, ConfigError> {
        if channels.is_empty() {
            return Err(ConfigError::EmptyChannelSet);
        } else if channels.len() > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels(channels.len()));
        }

        let mut set = Self {
            channels: [0; MAX_CHANNELS],
            len: 0,
        };
        for &ch in channels {
            if set.contains(ch) {
                return Err(ConfigError::DuplicateChannel(ch));
            }
            set.channels[set.len] = ch;
            set.len += 1;
        }
        Ok(set)
    }

    /// Channel ids in sampling order
    pub fn as_slice(&self) -> &[u8] {
        &self.channels[..self.len]
    }

    /// Number of channels (never 0)
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false, kept for API symmetry with slices
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `channel` is part of the set
    pub fn contains(&self, channel: u8) -> bool {
        self.as_slice().contains(&channel)
    }

    /// Bitmask with bit `n` set for every channel `n` (channels above 31 are ignored)
    pub fn mask(&self) -> u32 {
        self.as_slice()
            .iter()
            .filter(|&&ch| ch < 32)
            .fold(0, |mask, &ch| mask | (1 << ch))
    }
}
