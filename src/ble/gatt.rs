//! GATT server: HID-over-GATT, Battery and Device Information services.
//!
//! The HID service needs a Report Reference descriptor on every Report
//! characteristic, which the derive macros cannot express, so all three
//! services are registered through the `ServiceBuilder` API.

use defmt::{debug, info};
use dialscroll::config::{DIS_MANUFACTURER, DIS_SOFTWARE_REVISION};
use dialscroll::hid::keyboard::KEYBOARD_REPORT_SIZE;
use dialscroll::hid::mouse::MOUSE_REPORT_SIZE;
use dialscroll::hid::{KEYBOARD_REPORT_ID, MOUSE_REPORT_ID, REPORT_MAP};
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{self, RegisterError, WriteOp};
use nrf_softdevice::ble::{Connection, SecurityMode, Uuid};
use nrf_softdevice::Softdevice;

const HID_SERVICE: Uuid = Uuid::new_16(0x1812);
const HID_INFORMATION: Uuid = Uuid::new_16(0x2A4A);
const HID_REPORT_MAP: Uuid = Uuid::new_16(0x2A4B);
const HID_CONTROL_POINT: Uuid = Uuid::new_16(0x2A4C);
const HID_REPORT: Uuid = Uuid::new_16(0x2A4D);
const HID_PROTOCOL_MODE: Uuid = Uuid::new_16(0x2A4E);
const REPORT_REFERENCE: Uuid = Uuid::new_16(0x2908);

const BATTERY_SERVICE: Uuid = Uuid::new_16(0x180F);
const BATTERY_LEVEL: Uuid = Uuid::new_16(0x2A19);

const DEVICE_INFORMATION: Uuid = Uuid::new_16(0x180A);
const MANUFACTURER_NAME: Uuid = Uuid::new_16(0x2A29);
const SOFTWARE_REVISION: Uuid = Uuid::new_16(0x2A28);

/// bcdHID 1.11, no country code, normally connectable.
const HID_INFO_VALUE: [u8; 4] = [0x11, 0x01, 0x00, 0x02];

/// Report Reference report types.
const REPORT_TYPE_INPUT: u8 = 1;
const REPORT_TYPE_OUTPUT: u8 = 2;

/// Protocol Mode value for report protocol.
const PROTOCOL_MODE_REPORT: u8 = 1;

/// Attribute handles of the HID service.
pub struct HidService {
    pub keyboard_input: u16,
    pub mouse_input: u16,
    keyboard_output: u16,
    control_point: u16,
    protocol_mode: u16,
}

impl HidService {
    fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut sb = ServiceBuilder::new(sd, HID_SERVICE)?;

        sb.add_characteristic(
            HID_INFORMATION,
            Attribute::new(HID_INFO_VALUE).security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read()),
        )?
        .build();

        sb.add_characteristic(
            HID_REPORT_MAP,
            Attribute::new(&REPORT_MAP[..]).security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read()),
        )?
        .build();

        let control_point = sb
            .add_characteristic(
                HID_CONTROL_POINT,
                Attribute::new([0u8]).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().write_without_response()),
            )?
            .build();

        let protocol_mode = sb
            .add_characteristic(
                HID_PROTOCOL_MODE,
                Attribute::new([PROTOCOL_MODE_REPORT]).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().read().write_without_response()),
            )?
            .build();

        let keyboard_input = input_report(&mut sb, KEYBOARD_REPORT_ID, &[0u8; KEYBOARD_REPORT_SIZE])?;
        let mouse_input = input_report(&mut sb, MOUSE_REPORT_ID, &[0u8; MOUSE_REPORT_SIZE])?;

        // Keyboard LED output report declared by the report map.
        let mut output = sb.add_characteristic(
            HID_REPORT,
            Attribute::new([0u8]).security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read().write().write_without_response()),
        )?;
        output.add_descriptor(
            REPORT_REFERENCE,
            Attribute::new([KEYBOARD_REPORT_ID, REPORT_TYPE_OUTPUT]).security(SecurityMode::JustWorks),
        )?;
        let keyboard_output = output.build();

        let _service = sb.build();

        Ok(Self {
            keyboard_input,
            mouse_input,
            keyboard_output: keyboard_output.value_handle,
            control_point: control_point.value_handle,
            protocol_mode: protocol_mode.value_handle,
        })
    }

    fn on_write(&self, handle: u16, data: &[u8]) {
        let Some(&value) = data.first() else {
            return;
        };
        if handle == self.control_point {
            // 0 = suspend, 1 = exit suspend
            debug!("HID control point: {}", value);
        } else if handle == self.protocol_mode {
            debug!("HID protocol mode: {}", value);
        } else if handle == self.keyboard_output {
            debug!("Host keyboard LEDs: {:08b}", value);
        }
    }
}

/// Register one notifying input report with its Report Reference.
/// Returns the value handle.
fn input_report(sb: &mut ServiceBuilder<'_>, report_id: u8, initial: &[u8]) -> Result<u16, RegisterError> {
    let mut report = sb.add_characteristic(
        HID_REPORT,
        Attribute::new(initial).security(SecurityMode::JustWorks),
        Metadata::new(Properties::new().read().notify()),
    )?;
    report.add_descriptor(
        REPORT_REFERENCE,
        Attribute::new([report_id, REPORT_TYPE_INPUT]).security(SecurityMode::JustWorks),
    )?;
    Ok(report.build().value_handle)
}

/// Battery Level characteristic handle.
pub struct BatteryService {
    pub level: u16,
}

impl BatteryService {
    fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut sb = ServiceBuilder::new(sd, BATTERY_SERVICE)?;
        let level = sb
            .add_characteristic(
                BATTERY_LEVEL,
                Attribute::new([100u8]).security(SecurityMode::JustWorks),
                Metadata::new(Properties::new().read().notify()),
            )?
            .build();
        let _service = sb.build();
        Ok(Self {
            level: level.value_handle,
        })
    }
}

fn register_device_information(sd: &mut Softdevice) -> Result<(), RegisterError> {
    let mut sb = ServiceBuilder::new(sd, DEVICE_INFORMATION)?;
    for (uuid, value) in [
        (MANUFACTURER_NAME, DIS_MANUFACTURER),
        (SOFTWARE_REVISION, DIS_SOFTWARE_REVISION),
    ] {
        sb.add_characteristic(
            uuid,
            Attribute::new(value.as_bytes()),
            Metadata::new(Properties::new().read()),
        )?
        .build();
    }
    let _service = sb.build();
    Ok(())
}

/// Every service the dial exposes.
pub struct DialServer {
    pub hid: HidService,
    pub battery: BatteryService,
}

impl DialServer {
    /// Register all services.  Must run before the SoftDevice task starts.
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let hid = HidService::new(sd)?;
        let battery = BatteryService::new(sd)?;
        register_device_information(sd)?;
        info!("GATT server ready");
        Ok(Self { hid, battery })
    }
}

impl gatt_server::Server for DialServer {
    type Event = ();

    fn on_write(
        &self,
        _conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        data: &[u8],
    ) -> Option<Self::Event> {
        self.hid.on_write(handle, data);
        None
    }
}
