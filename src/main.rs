//! Samples the RP2040 ADC channels continuously and reports the effective sample rate over UART0.
#![no_std]
#![no_main]
#![doc(html_playground_url = "https://play.rust-lang.org/")]
#![warn(missing_docs)]

use adc_throughput::{
    components::StatusLed,
    config::{self, ChannelSet, ConfigError},
    interrupt::COMPLETION,
    rp2040::{AnalogInputs, Rp2040Adc},
    supervisor::{PollOutcome, StartError, Supervisor},
};
use cortex_m::singleton;
use defmt::{debug, info};
#[allow(unused_imports)]
use defmt_rtt as _;
use embedded_hal::digital::OutputPin;
#[allow(unused_imports)]
use panic_probe as _;
use rp2040_hal::{
    adc::{Adc, AdcPin},
    clocks::init_clocks_and_plls,
    dma::DMAExt,
    entry,
    fugit::RateExtU32,
    gpio::{FunctionUart, Pins},
    pac,
    uart::{DataBits, StopBits, UartConfig, UartPeripheral},
    Clock, Sio, Timer, Watchdog,
};

/// Second-stage bootloader, from [rp2040-boot2](https://docs.rs/rp2040-boot2)
#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;
/// External high-speed crystal on the pico board is 12Mhz
pub const XOSC_FREQ_HZ: u32 = 12_000_000;

/// Main operation loop
#[entry]
fn main() -> ! {
    info!("ADC throughput demo startup");
    let mut pac = pac::Peripherals::take().unwrap();
    let mut watchdog = Watchdog::new(pac.WATCHDOG);
    let sio = Sio::new(pac.SIO);

    let clocks = init_clocks_and_plls(
        XOSC_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();
    let timer = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);
    let pins = Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );

    // Status LED
    let mut status_led = StatusLed::new(pins.gpio25.into_push_pull_output());

    // Report output on GPIO0 (TX) and GPIO1 (RX)
    let uart_pins = (
        pins.gpio0.into_function::<FunctionUart>(),
        pins.gpio1.into_function::<FunctionUart>(),
    );
    let uart = UartPeripheral::new(pac.UART0, uart_pins, &mut pac.RESETS)
        .enable(
            UartConfig::new(
                config::SERIAL_BAUD.Hz(),
                DataBits::Eight,
                None,
                StopBits::One,
            ),
            clocks.peripheral_clock.freq(),
        )
        .unwrap();

    // Setup ADC pins and DMA
    let adc = singleton!(: Adc = Adc::new(pac.ADC, &mut pac.RESETS)).unwrap();
    let inputs = AnalogInputs {
        gpio26: AdcPin::new(pins.gpio26.into_floating_input()).unwrap(),
        gpio27: AdcPin::new(pins.gpio27.into_floating_input()).unwrap(),
        gpio28: AdcPin::new(pins.gpio28.into_floating_input()).unwrap(),
        gpio29: AdcPin::new(pins.gpio29.into_floating_input()).unwrap(),
    };
    let dma = pac.DMA.split(&mut pac.RESETS);
    let driver = Rp2040Adc::new(adc, inputs, dma.ch0, timer);

    debug!("Starting continuous acquisition");
    let channels = match ChannelSet::new(&config::ADC_CHANNELS) {
        Ok(channels) => channels,
        Err(error) => halt(&mut status_led, &error),
    };
    let mut supervisor = match Supervisor::configure_and_start(
        driver,
        channels,
        config::SAMPLING,
        &COMPLETION,
        uart,
    ) {
        Ok(supervisor) => supervisor,
        Err(StartError { error, .. }) => halt(&mut status_led, &error),
    };
    status_led.set_running();

    loop {
        let now_millis = timer.get_counter().ticks() / 1000;
        if let PollOutcome::Reported(_) = supervisor.poll_and_report(now_millis) {
            status_led.heartbeat();
        }
    }
}

/// Show a configuration error and stop. Acquisition never started, so only a reset recovers.
fn halt<P: OutputPin>(status_led: &mut StatusLed<P>, error: &ConfigError) -> ! {
    status_led.set_error(error);
    loop {
        cortex_m::asm::wfi();
    }
}
