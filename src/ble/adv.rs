//! Advertising payload builders.
//!
//! Legacy advertising only: both the advertising data and the scan
//! response are limited to 31 bytes of AD structures
//! (`len, type, data...`).

use crate::config::{BLE_APPEARANCE, BLE_NAME_PREFIX};
use core::fmt::Write;
use heapless::{String, Vec};

/// Maximum legacy advertising / scan response payload.
pub const MAX_ADV_LEN: usize = 31;

/// Device name buffer: prefix plus four hex digits.
pub type DeviceName = String<20>;

/// One advertising payload.
pub type AdvPayload = Vec<u8, MAX_ADV_LEN>;

/// AD type codes used here.
pub mod ad_type {
    pub const FLAGS: u8 = 0x01;
    pub const INCOMPLETE_16BIT_UUIDS: u8 = 0x02;
    pub const COMPLETE_16BIT_UUIDS: u8 = 0x03;
    pub const SHORTENED_LOCAL_NAME: u8 = 0x08;
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
    pub const APPEARANCE: u8 = 0x19;
}

/// 16-bit service UUIDs.
pub mod uuid {
    pub const HID: u16 = 0x1812;
    pub const BATTERY: u16 = 0x180F;
    pub const DEVICE_INFORMATION: u16 = 0x180A;
}

/// LE General Discoverable, BR/EDR not supported.
const FLAGS_GENERAL_DISC_NO_BREDR: u8 = 0x06;

/// `"Dial Scroll XXXX"` from the last two bytes of the chip's unique id.
pub fn device_name(uid: &[u8]) -> DeviceName {
    let mut name = DeviceName::new();
    let _ = name.push_str(BLE_NAME_PREFIX);
    let tail = &uid[uid.len().saturating_sub(2)..];
    for b in tail {
        let _ = write!(name, "{:02X}", b);
    }
    name
}

/// Flags, the service list and the appearance.
pub fn advertising_data() -> AdvPayload {
    let mut out = AdvPayload::new();
    push_ad(&mut out, ad_type::FLAGS, &[FLAGS_GENERAL_DISC_NO_BREDR]);

    let mut uuids = [0u8; 6];
    for (chunk, id) in uuids
        .chunks_exact_mut(2)
        .zip([uuid::HID, uuid::BATTERY, uuid::DEVICE_INFORMATION])
    {
        chunk.copy_from_slice(&id.to_le_bytes());
    }
    push_ad(&mut out, ad_type::COMPLETE_16BIT_UUIDS, &uuids);
    push_ad(&mut out, ad_type::APPEARANCE, &BLE_APPEARANCE.to_le_bytes());
    out
}

/// Complete local name, shortened if it would not fit.
pub fn scan_response(name: &str) -> AdvPayload {
    let mut out = AdvPayload::new();
    let room = MAX_ADV_LEN - 2;
    if name.len() <= room {
        push_ad(&mut out, ad_type::COMPLETE_LOCAL_NAME, name.as_bytes());
    } else {
        push_ad(&mut out, ad_type::SHORTENED_LOCAL_NAME, &name.as_bytes()[..room]);
    }
    out
}

/// Append one AD structure; dropped whole if it does not fit.
fn push_ad(out: &mut AdvPayload, kind: u8, data: &[u8]) {
    if out.len() + 2 + data.len() > MAX_ADV_LEN {
        return;
    }
    let _ = out.push(data.len() as u8 + 1);
    let _ = out.push(kind);
    let _ = out.extend_from_slice(data);
}

/// Iterate `(type, data)` pairs of a raw payload, stopping at the first
/// malformed structure.
pub fn ad_structures(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut i = 0;
    core::iter::from_fn(move || {
        let len = *data.get(i)? as usize;
        if len == 0 || i + len >= data.len() {
            return None;
        }
        let item = (data[i + 1], &data[i + 2..i + 1 + len]);
        i += len + 1;
        Some(item)
    })
}

/// Check if raw advertisement data lists the HID Service UUID (0x1812).
pub fn contains_hid_service_uuid(data: &[u8]) -> bool {
    let hid_uuid_le = uuid::HID.to_le_bytes();
    ad_structures(data)
        .filter(|(kind, _)| {
            *kind == ad_type::INCOMPLETE_16BIT_UUIDS || *kind == ad_type::COMPLETE_16BIT_UUIDS
        })
        .any(|(_, uuids)| uuids.chunks_exact(2).any(|c| c == hid_uuid_le))
}

/// Complete or shortened local name, if present and valid UTF-8.
pub fn local_name(data: &[u8]) -> Option<&str> {
    ad_structures(data)
        .find(|(kind, _)| {
            *kind == ad_type::COMPLETE_LOCAL_NAME || *kind == ad_type::SHORTENED_LOCAL_NAME
        })
        .and_then(|(_, name)| core::str::from_utf8(name).ok())
}
