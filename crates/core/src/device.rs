//! Device model: known Casa peripherals and their identifiers.

use std::fmt;

use tracing::debug;

use crate::error::TransportError;
use crate::transport::HidBackend;
use crate::{pids, LOGITECH_VID};

/// Supported Logitech Casa models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasaModel {
    Keyboard,
    Touchpad,
}

impl CasaModel {
    /// Look up model from USB product ID.
    pub fn from_pid(pid: u16) -> Option<Self> {
        match pid {
            pids::CASA_KEYBOARD => Some(Self::Keyboard),
            pids::CASA_TOUCHPAD => Some(Self::Touchpad),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyboard => "Logitech Casa Keyboard",
            Self::Touchpad => "Logitech Casa Touchpad",
        }
    }

    /// USB Product ID.
    pub fn pid(&self) -> u16 {
        match self {
            Self::Keyboard => pids::CASA_KEYBOARD,
            Self::Touchpad => pids::CASA_TOUCHPAD,
        }
    }
}

/// Identifies a class of physical peripheral, not a specific unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIdentifier {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentifier {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// The model this identifier belongs to, if it is a known Casa device.
    pub fn model(&self) -> Option<CasaModel> {
        if self.vendor_id != LOGITECH_VID {
            return None;
        }
        CasaModel::from_pid(self.product_id)
    }

    /// Human-readable label, falling back to the raw identifier.
    pub fn label(&self) -> String {
        match self.model() {
            Some(model) => format!("{} ({self})", model.name()),
            None => self.to_string(),
        }
    }
}

impl From<CasaModel> for DeviceIdentifier {
    fn from(model: CasaModel) -> Self {
        Self::new(LOGITECH_VID, model.pid())
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:04X}", self.vendor_id, self.product_id)
    }
}

/// The devices switched by default. The keyboard goes first: it is the device
/// most likely to drop off the bus mid-chord.
pub const KNOWN_DEVICES: [DeviceIdentifier; 2] = [
    DeviceIdentifier::new(LOGITECH_VID, pids::CASA_KEYBOARD),
    DeviceIdentifier::new(LOGITECH_VID, pids::CASA_TOUCHPAD),
];

/// A product found while enumerating every interface of a vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorProduct {
    pub product_id: u16,
    pub product_string: Option<String>,
}

/// List the distinct products of `vendor_id` currently connected.
///
/// Used to hint at a wrong product ID when a known device is missing.
pub fn list_vendor_products<B: HidBackend>(
    backend: &B,
    vendor_id: u16,
) -> Result<Vec<VendorProduct>, TransportError> {
    let mut products: Vec<VendorProduct> = Vec::new();
    for interface in backend.enumerate(vendor_id, 0)? {
        if products.iter().any(|p| p.product_id == interface.product_id) {
            continue;
        }
        products.push(VendorProduct {
            product_id: interface.product_id,
            product_string: interface.product_string,
        });
    }

    debug!(
        vid = format_args!("0x{:04X}", vendor_id),
        count = products.len(),
        "Vendor product enumeration complete"
    );
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockBackend;

    #[test]
    fn casa_model_from_known_pid() {
        assert_eq!(CasaModel::from_pid(0xB371), Some(CasaModel::Keyboard));
        assert_eq!(CasaModel::from_pid(0xBB00), Some(CasaModel::Touchpad));
    }

    #[test]
    fn casa_model_from_unknown_pid() {
        assert_eq!(CasaModel::from_pid(0x1234), None);
    }

    #[test]
    fn known_devices_keyboard_first() {
        assert_eq!(KNOWN_DEVICES[0].model(), Some(CasaModel::Keyboard));
        assert_eq!(KNOWN_DEVICES[1].model(), Some(CasaModel::Touchpad));
    }

    #[test]
    fn identifier_display_is_hex() {
        let id = DeviceIdentifier::from(CasaModel::Touchpad);
        assert_eq!(id.to_string(), "046D:BB00");
        assert_eq!(id.label(), "Logitech Casa Touchpad (046D:BB00)");
    }

    #[test]
    fn foreign_vendor_has_no_model() {
        let id = DeviceIdentifier::new(0x1234, pids::CASA_KEYBOARD);
        assert_eq!(id.model(), None);
        assert_eq!(id.label(), "1234:B371");
    }

    #[test]
    fn vendor_products_are_deduplicated() {
        let mock = MockBackend::new();
        mock.add_interface(0xC52B, "receiver-0", 0xFF00);
        mock.add_interface(0xC52B, "receiver-1", 0x0001);
        mock.add_interface(0xB023, "mouse-0", 0xFF43);

        let products = list_vendor_products(&mock, LOGITECH_VID).unwrap();
        let pids: Vec<u16> = products.iter().map(|p| p.product_id).collect();
        assert_eq!(pids, vec![0xC52B, 0xB023]);
    }
}
