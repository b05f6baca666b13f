//! dialscroll firmware - BLE HID scroll dial on the nRF52840.
//!
//! Task layout:
//!   - `softdevice_task` runs the SoftDevice event loop
//!   - `link_task`       advertises on request and serves the connected host
//!   - `encoder_task`    owns the QDEC and accumulates the shaft position
//!   - `main`            the dial loop: one `Session::tick` per iteration

#![no_std]
#![no_main]

mod ble {
    pub mod bonder;
    pub mod gatt;
    pub mod link;
}
mod hw;
mod power;

use core::mem;

use defmt::{debug, error, info, warn};
use dialscroll::ble::adv::{device_name, DeviceName};
use dialscroll::config::{BLE_APPEARANCE, STATUS_BLINK_HALF_PERIOD_MS};
use dialscroll::error::InitStage;
use dialscroll::ports::{Indicator, Ports};
use dialscroll::{DialConfig, Error, Notice, Session, TickOutcome};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Input, Level, Output, OutputDrive, Pull};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::saadc::{self, Saadc};
use embassy_nrf::{bind_interrupts, pac, peripherals, qdec};
use embassy_time::{Instant, Timer};
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::ble::gatt::DialServer;
use crate::ble::link::{link_task, BleHidSink};
use crate::hw::{encoder_task, DialInput, SaadcBattery, StatusLed};
use crate::power::SystemOff;

bind_interrupts!(struct Irqs {
    QDEC => qdec::InterruptHandler<peripherals::QDEC>;
    SAADC => saadc::InterruptHandler;
});

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Name derived from the factory device ID, so several dials can be told
/// apart in a host's pairing list.
fn unique_name() -> &'static DeviceName {
    static NAME: StaticCell<DeviceName> = StaticCell::new();
    let lo = pac::FICR.deviceid(0).read();
    let hi = pac::FICR.deviceid(1).read();
    let mut uid = [0u8; 8];
    uid[..4].copy_from_slice(&lo.to_le_bytes());
    uid[4..].copy_from_slice(&hi.to_le_bytes());
    NAME.init(device_name(&uid))
}

fn softdevice_config(name: &'static str) -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 256 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: name.as_ptr() as _,
            current_len: name.len() as u16,
            max_len: name.len() as u16,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(raw::BLE_GATTS_VLOC_STACK as u8),
        }),
        ..Default::default()
    }
}

/// Bring-up failed: blink forever so the fault is visible without a probe.
async fn distress(led: &mut StatusLed) -> ! {
    loop {
        led.toggle();
        Timer::after_millis(STATUS_BLINK_HALF_PERIOD_MS).await;
    }
}

fn log_notice(notice: &Notice) {
    match notice {
        Notice::Fault(e) => warn!("Fault: {}", e),
        Notice::PowerTransition { from, to } => info!("Power: {} -> {}", from, to),
        Notice::SleepRequested(wake) => info!("Sleep requested, wake on {}", wake),
        Notice::LinkUp => info!("Link up"),
        Notice::LinkDown => info!("Link down"),
        Notice::LongPress => info!("Long press"),
        Notice::AdvertisingStarted => info!("Advertising requested"),
        Notice::InputRecovered => info!("Input recovered"),
        Notice::BatteryRefreshed(reading) => info!("Battery: {}", reading),
        other => debug!("{}", other),
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("dialscroll starting");

    // SoftDevice reserves priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);
    interrupt::QDEC.set_priority(Priority::P3);
    interrupt::SAADC.set_priority(Priority::P3);

    let mut led = StatusLed::new(Output::new(p.P0_26, Level::High, OutputDrive::Standard));

    // - BLE stack ------------------------------------------
    let name = unique_name().as_str();
    let sd = Softdevice::enable(&softdevice_config(name));
    let ret = unsafe { raw::sd_ble_gap_appearance_set(BLE_APPEARANCE) };
    if ret != raw::NRF_SUCCESS {
        warn!("Appearance rejected: {}", ret);
    }

    static SERVER: StaticCell<DialServer> = StaticCell::new();
    let server: &'static DialServer = match DialServer::new(sd) {
        Ok(server) => SERVER.init(server),
        Err(e) => {
            error!("GATT registration failed: {}", e);
            error!("Bring-up failed: {}", Error::CriticalInit(InitStage::Radio));
            distress(&mut led).await
        }
    };
    let sd: &'static Softdevice = sd;

    spawner.must_spawn(softdevice_task(sd));
    spawner.must_spawn(link_task(sd, server, name));
    spawner.must_spawn(encoder_task(p.QDEC, p.P1_12, p.P1_13));
    info!("Device name: {}", name);

    // - Dial hardware --------------------------------------
    let button = Input::new(p.P1_15, Pull::Up);

    let mut adc_config = saadc::Config::default();
    adc_config.resolution = saadc::Resolution::_12BIT;
    let channel = saadc::ChannelConfig::single_ended(p.P0_31);
    let adc = Saadc::new(p.SAADC, Irqs, adc_config, [channel]);
    let vbat_enable = Output::new(p.P0_14, Level::High, OutputDrive::Standard);

    let ports = Ports {
        input: DialInput::new(button),
        hid: BleHidSink::new(sd, server),
        power: SystemOff,
        battery: SaadcBattery::new(adc, vbat_enable),
        indicator: &mut led,
    };

    let mut dial = match Session::start(DialConfig::default(), ports, Instant::now().as_millis()) {
        Ok(dial) => dial,
        Err(e) => {
            error!("Bring-up failed: {}", e);
            distress(&mut led).await
        }
    };
    info!("Dial ready: {}", dial.config());

    loop {
        let report = dial.tick(Instant::now().as_millis());
        for notice in &report.notices {
            log_notice(notice);
        }

        match report.outcome {
            TickOutcome::Continue { delay_ms } => Timer::after_millis(delay_ms).await,
            TickOutcome::Asleep => {
                // System OFF does not return; park if the chip lingers.
                dial.ports_mut().indicator.set(false);
                loop {
                    cortex_m::asm::wfe();
                }
            }
        }
    }
}
