//! Rotary encoder and push button.
//!
//! The QDEC driver only yields once the shaft moves, so a task owns it and
//! folds every reading into `POSITION`.  `DialInput::read` just loads that
//! counter alongside the button level, which keeps the main loop from
//! ever waiting on the encoder.

use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use defmt::{debug, info};
use dialscroll::error::InputError;
use dialscroll::input::RawSample;
use dialscroll::ports::InputPort;
use embassy_futures::select::{select, Either};
use embassy_nrf::gpio::Input;
use embassy_nrf::peripherals::{P1_12, P1_13, QDEC};
use embassy_nrf::qdec::{self, Qdec};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::Irqs;

static POSITION: AtomicI32 = AtomicI32::new(0);
static ENCODER_LIVE: AtomicBool = AtomicBool::new(false);
static ENCODER_RELEASE: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static ENCODER_RESUME: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Owns the quadrature decoder.  Dropping the driver on release powers the
/// QDEC down; a resume builds a fresh one.
#[embassy_executor::task]
pub async fn encoder_task(mut qdec: QDEC, mut a: P1_12, mut b: P1_13) -> ! {
    loop {
        {
            let mut config = qdec::Config::default();
            config.debounce = true;
            let mut dec = Qdec::new(&mut qdec, Irqs, &mut a, &mut b, config);
            ENCODER_LIVE.store(true, Ordering::Release);
            debug!("Encoder running");

            loop {
                match select(dec.read(), ENCODER_RELEASE.wait()).await {
                    Either::First(delta) => {
                        POSITION.fetch_add(i32::from(delta), Ordering::AcqRel);
                    }
                    Either::Second(()) => break,
                }
            }
        }

        ENCODER_LIVE.store(false, Ordering::Release);
        debug!("Encoder released");
        ENCODER_RESUME.wait().await;
    }
}

/// Encoder counter plus the active-low button.
pub struct DialInput {
    button: Input<'static>,
    released: bool,
}

impl DialInput {
    pub fn new(button: Input<'static>) -> Self {
        Self {
            button,
            released: false,
        }
    }
}

impl InputPort for DialInput {
    fn read(&mut self) -> Result<RawSample, InputError> {
        if self.released {
            return Err(InputError::Released);
        }
        Ok(RawSample {
            ticks: POSITION.load(Ordering::Acquire),
            pressed: self.button.is_low(),
        })
    }

    fn release_encoder(&mut self) {
        ENCODER_RESUME.reset();
        ENCODER_RELEASE.signal(());
    }

    fn release_all(&mut self) {
        self.release_encoder();
        self.released = true;
    }

    fn reinit(&mut self) -> Result<(), InputError> {
        // A release the task has not picked up yet is simply withdrawn.
        ENCODER_RELEASE.reset();
        if !ENCODER_LIVE.load(Ordering::Acquire) {
            ENCODER_RESUME.signal(());
            info!("Encoder re-armed");
        }
        self.released = false;
        Ok(())
    }
}
