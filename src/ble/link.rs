//! Host link: advertising / connection task and the HID sink the main
//! loop talks to.
//!
//! The loop is synchronous, the SoftDevice API is not.  The two meet in a
//! few statics: the sink raises `ADVERTISE` / `STOP_ADVERTISING` signals
//! and reads the `CONNECTED` / `ADVERTISING` flags; `link_task` owns the
//! async side and keeps the flags current.  Every sink call returns
//! without waiting.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{info, warn};
use dialscroll::ble::adv::{advertising_data, scan_response};
use dialscroll::config::{
    BLE_ADV_INTERVAL, BLE_CONN_INTERVAL_MAX, BLE_CONN_INTERVAL_MIN, BLE_SLAVE_LATENCY,
    BLE_SUP_TIMEOUT,
};
use dialscroll::dispatch::Action;
use dialscroll::error::LinkError;
use dialscroll::hid::{reports_for, HidReport, MAX_REPORT_SIZE};
use dialscroll::ports::HidSink;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use nrf_softdevice::ble::gatt_server::{self, NotifyValueError};
use nrf_softdevice::ble::{peripheral, Connection};
use nrf_softdevice::{raw, RawError, Softdevice};

use super::bonder::bonder;
use super::gatt::DialServer;

static CONNECTED: AtomicBool = AtomicBool::new(false);
static ADVERTISING: AtomicBool = AtomicBool::new(false);
static ADVERTISE: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static STOP_ADVERTISING: Signal<CriticalSectionRawMutex, ()> = Signal::new();
static CONNECTION: Mutex<CriticalSectionRawMutex, RefCell<Option<Connection>>> =
    Mutex::new(RefCell::new(None));

fn current_connection() -> Option<Connection> {
    CONNECTION.lock(|c| c.borrow().clone())
}

fn raw_code(e: RawError) -> u32 {
    e as u32
}

/// Advertise on request, then serve the connected host until it leaves.
#[embassy_executor::task]
pub async fn link_task(sd: &'static Softdevice, server: &'static DialServer, name: &'static str) -> ! {
    let adv_data = advertising_data();
    let scan_data = scan_response(name);
    let config = peripheral::Config {
        interval: BLE_ADV_INTERVAL,
        ..Default::default()
    };

    loop {
        ADVERTISE.wait().await;
        STOP_ADVERTISING.reset();
        info!("Advertising as {}", name);

        let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
            adv_data: &adv_data,
            scan_data: &scan_data,
        };
        let advertise = peripheral::advertise_pairable(sd, adv, &config, bonder());

        let conn = match select(advertise, STOP_ADVERTISING.wait()).await {
            Either::First(Ok(conn)) => conn,
            Either::First(Err(e)) => {
                warn!("Advertising failed: {}", e);
                ADVERTISING.store(false, Ordering::Release);
                continue;
            }
            Either::Second(()) => {
                info!("Advertising stopped");
                ADVERTISING.store(false, Ordering::Release);
                continue;
            }
        };

        info!("Host connected");
        if let Err(e) = conn.set_conn_params(raw::ble_gap_conn_params_t {
            min_conn_interval: BLE_CONN_INTERVAL_MIN,
            max_conn_interval: BLE_CONN_INTERVAL_MAX,
            slave_latency: BLE_SLAVE_LATENCY,
            conn_sup_timeout: BLE_SUP_TIMEOUT,
        }) {
            warn!("Connection parameter request failed: {}", e);
        }

        CONNECTION.lock(|c| c.replace(Some(conn.clone())));
        CONNECTED.store(true, Ordering::Release);
        ADVERTISING.store(false, Ordering::Release);

        let reason = gatt_server::run(&conn, server, |_| {}).await;
        info!("Host disconnected: {}", reason);

        CONNECTED.store(false, Ordering::Release);
        CONNECTION.lock(|c| c.replace(None));
    }
}

/// [`HidSink`] over the SoftDevice GATT server.
pub struct BleHidSink {
    sd: &'static Softdevice,
    server: &'static DialServer,
}

impl BleHidSink {
    pub fn new(sd: &'static Softdevice, server: &'static DialServer) -> Self {
        Self { sd, server }
    }

    fn notify(&self, conn: &Connection, report: &HidReport) -> Result<(), LinkError> {
        let handle = match report {
            HidReport::Keyboard(_) => self.server.hid.keyboard_input,
            HidReport::Mouse(_) => self.server.hid.mouse_input,
        };
        let mut buf = [0u8; MAX_REPORT_SIZE];
        let len = report.serialize(&mut buf);
        gatt_server::notify_value(conn, handle, &buf[..len]).map_err(|e| match e {
            NotifyValueError::Disconnected => LinkError::NotConnected,
            NotifyValueError::Raw(e) => LinkError::Raw(raw_code(e)),
        })
    }
}

impl HidSink for BleHidSink {
    fn dispatch(&mut self, action: &Action) -> Result<(), LinkError> {
        let conn = current_connection().ok_or(LinkError::NotConnected)?;
        for report in reports_for(action) {
            self.notify(&conn, &report)?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        CONNECTED.load(Ordering::Acquire)
    }

    fn is_advertising(&self) -> bool {
        ADVERTISING.load(Ordering::Acquire)
    }

    fn start_advertising(&mut self) -> Result<(), LinkError> {
        if self.is_connected() {
            return Err(LinkError::Advertise);
        }
        // Raised here so the next tick already sees it.
        ADVERTISING.store(true, Ordering::Release);
        ADVERTISE.signal(());
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), LinkError> {
        ADVERTISE.reset();
        if ADVERTISING.swap(false, Ordering::AcqRel) {
            STOP_ADVERTISING.signal(());
        }
        Ok(())
    }

    fn disconnect_all(&mut self) -> Result<(), LinkError> {
        match current_connection() {
            Some(conn) => conn.disconnect().map_err(|_| LinkError::Disconnect),
            None => Ok(()),
        }
    }

    fn set_battery_level(&mut self, percent: u8) -> Result<(), LinkError> {
        let handle = self.server.battery.level;
        gatt_server::set_value(self.sd, handle, &[percent]).map_err(|_| LinkError::Notify)?;
        if let Some(conn) = current_connection() {
            // Fails while the host has not subscribed; the value is still
            // readable.
            let _ = gatt_server::notify_value(&conn, handle, &[percent]);
        }
        Ok(())
    }
}
