//! Active-low status LED.

use dialscroll::config::ACK_BLINK_MS;
use dialscroll::ports::Indicator;
use embassy_nrf::gpio::Output;
use embassy_time::{block_for, Duration};

pub struct StatusLed {
    pin: Output<'static>,
    on: bool,
}

impl StatusLed {
    /// Takes a pin already driven high (LED off).
    pub fn new(pin: Output<'static>) -> Self {
        Self { pin, on: false }
    }

    pub fn toggle(&mut self) {
        let on = !self.on;
        self.set(on);
    }
}

impl Indicator for StatusLed {
    fn set(&mut self, on: bool) {
        self.on = on;
        if on {
            self.pin.set_low();
        } else {
            self.pin.set_high();
        }
    }

    fn acknowledge(&mut self) {
        let restore = self.on;
        for _ in 0..2 {
            self.set(false);
            block_for(Duration::from_millis(ACK_BLINK_MS));
            self.set(true);
            block_for(Duration::from_millis(ACK_BLINK_MS));
        }
        self.set(restore);
    }
}
