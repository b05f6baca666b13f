//! Battery voltage through the SAADC.
//!
//! The cell sits behind a 1M/510k divider that only conducts while the
//! enable pin is held low, so the divider is switched off on release.

use defmt::debug;
use dialscroll::battery::BatteryReading;
use dialscroll::error::InputError;
use dialscroll::ports::BatteryMonitor;
use embassy_nrf::gpio::Output;
use embassy_nrf::saadc::Saadc;

/// SAADC full scale with the default gain (1/6) and 0.6 V reference.
const FULL_SCALE_MV: u64 = 3_600;
const ADC_COUNTS: u64 = 4_096;
const DIVIDER_TOP_KOHM: u64 = 1_000;
const DIVIDER_BOTTOM_KOHM: u64 = 510;

/// Cell voltage for a raw 12-bit sample of the divided input.
fn millivolts(raw: i16) -> u32 {
    let raw = raw.max(0) as u64;
    let mv = raw * FULL_SCALE_MV * (DIVIDER_TOP_KOHM + DIVIDER_BOTTOM_KOHM)
        / (ADC_COUNTS * DIVIDER_BOTTOM_KOHM);
    mv as u32
}

pub struct SaadcBattery {
    saadc: Saadc<'static, 1>,
    enable: Output<'static>,
}

impl SaadcBattery {
    pub fn new(saadc: Saadc<'static, 1>, enable: Output<'static>) -> Self {
        Self { saadc, enable }
    }
}

impl BatteryMonitor for SaadcBattery {
    fn sample(&mut self) -> Result<BatteryReading, InputError> {
        self.enable.set_low();
        let mut buf = [0i16; 1];
        embassy_futures::block_on(self.saadc.sample(&mut buf));
        let mv = millivolts(buf[0]);
        debug!("Battery raw={} mv={}", buf[0], mv);

        // Nothing on the pin reads as zero; a real cell never does.
        if mv == 0 {
            return Err(InputError::BatteryRead);
        }
        Ok(BatteryReading::from_millivolts(mv))
    }

    fn release(&mut self) {
        self.enable.set_high();
    }
}
