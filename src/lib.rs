//! This [RP2040](rp2040_hal) project continuously samples several ADC channels at a fixed
//! aggregate rate and reports the effective sample rate it actually achieves over a serial link.
//!
//! The ADC runs free, round-robin over the configured channels, and DMA moves every completed
//! frame out of the FIFO. Each completed frame raises `DMA_IRQ_0`, which only publishes the frame
//! and flags a [`CompletionSignal`](signal::CompletionSignal). The main loop polls that flag,
//! takes the newest frame and prints the rate averaged since boot.
//!
//! ## Crate features
//!
//! - `rp2040`: Board support (HAL, boot loader, RTT logging, panic handler). Required by the
//!   firmware binary; without it only the portable core is built, which is what the unit tests
//!   run against.
//! - `defmt`: Routes log messages to [`defmt`](https://docs.rs/defmt) instead of [`log`].
//!   Enabled by `rp2040`.
//! - `trace_snapshots`: Logs the first sample of every channel on each report. Noisy at high
//!   report rates!
//!
//! ## Demo
//!
//! A trimmed version of the firmware binary (`src/main.rs`):
//!
//! ```ignore
//! #![no_std]
//! #![no_main]
//!
//! use adc_throughput::{
//!     config::{self, ChannelSet},
//!     interrupt::COMPLETION,
//!     rp2040::{AnalogInputs, Rp2040Adc},
//!     supervisor::Supervisor,
//! };
//! use rp2040_hal::{adc::{Adc, AdcPin}, dma::DMAExt, entry, pac, Timer};
//!
//! #[entry]
//! fn main() -> ! {
//!     // ... clocks, pins, uart ...
//!     let adc = cortex_m::singleton!(: Adc = Adc::new(pac.ADC, &mut pac.RESETS)).unwrap();
//!     let inputs = AnalogInputs {
//!         gpio26: AdcPin::new(pins.gpio26.into_floating_input()).unwrap(),
//!         gpio27: AdcPin::new(pins.gpio27.into_floating_input()).unwrap(),
//!         gpio28: AdcPin::new(pins.gpio28.into_floating_input()).unwrap(),
//!         gpio29: AdcPin::new(pins.gpio29.into_floating_input()).unwrap(),
//!     };
//!     let dma = pac.DMA.split(&mut pac.RESETS);
//!     let driver = Rp2040Adc::new(adc, inputs, dma.ch0, timer);
//!
//!     let channels = ChannelSet::new(&config::ADC_CHANNELS).unwrap();
//!     let mut supervisor = Supervisor::configure_and_start(
//!         driver, channels, config::SAMPLING, &COMPLETION, uart,
//!     )
//!     .ok()
//!     .unwrap();
//!     loop {
//!         supervisor.poll_and_report(timer.get_counter().ticks() / 1000);
//!     }
//! }
//! ```

// Copyright 2024 Cameron Rodriguez
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_auto_cfg), feature(doc_cfg_hide))]

// Must come first so the logging macros are visible to every module
mod fmt;

pub mod buffer;
pub mod components;
pub mod config;
pub mod driver;
pub mod interrupt;
pub mod rp2040;
pub mod signal;
pub mod supervisor;
