//! System OFF entry.
//!
//! nRF52840 deep sleep draws ~0.3 µA and only a GPIO DETECT (or reset)
//! brings it back; the wake is a full reboot.  Wake pins get the pull-up
//! and a SENSE level away from their current one, then the SoftDevice is
//! asked to power the system off.

use defmt::info;
use dialscroll::config::{wake_sense, WakeSense, WakeSources};
use dialscroll::error::SleepError;
use dialscroll::ports::PowerController;
use embassy_nrf::pac;
use embassy_nrf::pac::gpio::vals;
use embassy_time::{block_for, Duration};

/// Poll period while waiting for a held button to come up.
const RELEASE_POLL_MS: u64 = 10;

pub struct SystemOff;

impl SystemOff {
    fn arm_wake_pin(pin: u8) -> Result<(), SleepError> {
        if pin > 31 {
            return Err(SleepError::WakeSourceConfig);
        }
        let n = pin as usize;
        pac::P1.pin_cnf(n).write(|w| {
            w.set_dir(vals::Dir::INPUT);
            w.set_input(vals::Input::CONNECT);
            w.set_pull(vals::Pull::PULLUP);
        });

        // A button still held from a long press would wake us at once.
        let sense = loop {
            if let Some(sense) = wake_sense(pin, pac::P1.in_().read().pin(n)) {
                break sense;
            }
            block_for(Duration::from_millis(RELEASE_POLL_MS));
        };

        pac::P1.pin_cnf(n).modify(|w| {
            w.set_sense(match sense {
                WakeSense::Low => vals::Sense::LOW,
                WakeSense::High => vals::Sense::HIGH,
            })
        });
        Ok(())
    }
}

impl PowerController for SystemOff {
    fn enter_deep_sleep(&mut self, wake: WakeSources) -> Result<(), SleepError> {
        for &pin in wake.pins() {
            Self::arm_wake_pin(pin)?;
        }
        info!("System OFF, wake on {}", wake);

        // Only returns when the SoftDevice refuses.
        let ret = unsafe { nrf_softdevice::raw::sd_power_system_off() };
        Err(SleepError::Rejected(ret))
    }
}
