// SPDX-License-Identifier: Apache-2.0

//! Basic component structs

use embedded_hal::digital::{OutputPin, PinState};

use crate::config::ConfigError;

/// All states for the status LED
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusLedStates {
    /// Off, acquisition not started yet
    Startup,
    /// Acquisition running. The LED toggles on every report.
    Running,
    /// Configuration failed; LED stays off
    Error,
}

/// Single status LED (the on-board LED on the Pico)
pub struct StatusLed<P> {
    /// Current LED state
    state: StatusLedStates,
    /// Level currently driven while running
    level: PinState,
    /// Output pin
    led: P,
}

impl<P: OutputPin> StatusLed<P> {
    /// Message appended to configuration errors
    const RESET_MSG: &'static str = "System must be reset to restart acquisition.";

    /// Take ownership of the LED pin and switch it off
    pub fn new(mut led: P) -> Self {
        if led.set_low().is_err() {
            warn!("Unable to drive status LED");
        }
        Self {
            state: StatusLedStates::Startup,
            level: PinState::Low,
            led,
        }
    }

    /// Current LED state
    pub fn state(&self) -> StatusLedStates {
        self.state
    }

    /// Acquisition started: light the LED
    pub fn set_running(&mut self) {
        self.state = StatusLedStates::Running;
        self.drive(PinState::High);
    }

    /// Toggle the LED to show reports are flowing. Ignored unless running.
    pub fn heartbeat(&mut self) {
        if self.state == StatusLedStates::Running {
            self.drive(!self.level);
        }
    }

    /// Configuration failed: switch off and log the cause
    pub fn set_error(&mut self, err: &ConfigError) {
        error!(
            "Error encountered during configuration: {}\n{}",
            err,
            Self::RESET_MSG
        );
        self.state = StatusLedStates::Error;
        self.drive(PinState::Low);
    }

    /// Give back the pin
    pub fn release(self) -> P {
        self.led
    }

    /// Set the pin level, remembering it for [`heartbeat`](Self::heartbeat)
    fn drive(&mut self, level: PinState) {
        if self.led.set_state(level).is_err() {
            warn!("Unable to drive status LED");
        }
        self.level = level;
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    use super::*;

    #[test]
    fn running_then_heartbeat_toggles() {
        let expectations = [
            Transaction::set(State::Low),
            Transaction::set(State::High),
            Transaction::set(State::Low),
            Transaction::set(State::High),
        ];
        let mut led = StatusLed::new(PinMock::new(&expectations));
        assert_eq!(led.state(), StatusLedStates::Startup);

        led.set_running();
        led.heartbeat();
        led.heartbeat();
        assert_eq!(led.state(), StatusLedStates::Running);

        led.release().done();
    }

    #[test]
    fn heartbeat_ignored_before_running() {
        let expectations = [Transaction::set(State::Low)];
        let mut led = StatusLed::new(PinMock::new(&expectations));
        led.heartbeat();
        led.release().done();
    }

    #[test]
    fn error_switches_off_and_stops_heartbeat() {
        let expectations = [
            Transaction::set(State::Low),
            Transaction::set(State::High),
            Transaction::set(State::Low),
        ];
        let mut led = StatusLed::new(PinMock::new(&expectations));
        led.set_running();
        led.set_error(&ConfigError::NonAnalogChannel(9));
        led.heartbeat();
        assert_eq!(led.state(), StatusLedStates::Error);

        led.release().done();
    }
}
