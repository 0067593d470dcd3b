//! casa-switch-core: HID++ 2.0 host switching for Logitech Casa peripherals.
//!
//! This crate finds the HID++ interface of each Casa device, resolves the
//! Change Host feature through the Root feature table and sends
//! SetCurrentHost, one device at a time.

pub mod config;
pub mod device;
pub mod error;
pub mod feature;
pub mod hidpp;
pub mod host;
pub mod probe;
pub mod scan;
pub mod session;
pub mod switch;
pub mod transport;

/// Logitech USB Vendor ID.
pub const LOGITECH_VID: u16 = 0x046D;

/// Vendor usage page of the interface that speaks HID++ on Casa devices.
pub const HIDPP_USAGE_PAGE: u16 = 0xFF43;

/// Known Logitech Casa product IDs.
pub mod pids {
    /// Casa Pop-Up Desk keyboard.
    pub const CASA_KEYBOARD: u16 = 0xB371;
    /// Casa Pop-Up Desk touchpad.
    pub const CASA_TOUCHPAD: u16 = 0xBB00;
}
