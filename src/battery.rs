//! Battery level mapping.

use crate::config::{BATTERY_EMPTY_MV, BATTERY_FULL_MV};

/// One battery sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryReading {
    pub percent: u8,
    pub millivolts: u32,
}

impl BatteryReading {
    pub fn from_millivolts(millivolts: u32) -> Self {
        Self {
            percent: percent_from_millivolts(millivolts),
            millivolts,
        }
    }
}

/// Linear LiPo estimate between the empty and full cell voltages, clamped
/// to 0..=100.
pub fn percent_from_millivolts(mv: u32) -> u8 {
    if mv <= BATTERY_EMPTY_MV {
        return 0;
    }
    if mv >= BATTERY_FULL_MV {
        return 100;
    }
    let span = BATTERY_FULL_MV - BATTERY_EMPTY_MV;
    ((mv - BATTERY_EMPTY_MV) * 100 / span) as u8
}
