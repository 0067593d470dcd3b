//! Error types for casa-switch-core.
//!
//! Every pipeline stage has its own error enum so callers can tell a missing
//! device from a locked one, and an absent reply from an unsupported feature.

use thiserror::Error;

use crate::device::DeviceIdentifier;

/// Failure of the raw HID transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// HID device communication failure.
    #[error("HID error: {0}")]
    Hid(String),

    /// The interface is opened exclusively by another process.
    #[error("interface is locked by another process: {0}")]
    Locked(String),
}

/// Failure to find a HID++ speaking interface for a device.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No HID interface matches the vendor/product pair.
    #[error("no HID interface found for {0}")]
    NotFound(DeviceIdentifier),

    /// Candidate interfaces exist but another application holds them.
    #[error("{device} is locked by another application (close Logi Options+ and retry): {message}")]
    Locked {
        device: DeviceIdentifier,
        message: String,
    },

    /// Every candidate interface stayed silent on the probe request.
    #[error("none of the {candidates} interface(s) of {device} answered HID++")]
    NoHidppInterface {
        device: DeviceIdentifier,
        candidates: usize,
    },

    /// Enumerating interfaces failed.
    #[error("enumeration failed: {0}")]
    Communication(#[from] TransportError),
}

/// Failure to map a feature ID to its runtime feature index.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Nothing (or a truncated report) came back within the timeout.
    #[error("no response to feature lookup for 0x{feature_id:04X}")]
    NoResponse { feature_id: u16 },

    /// The device reports index 0 for the feature.
    #[error("feature 0x{feature_id:04X} is not supported by the device")]
    Unsupported { feature_id: u16 },

    /// The device answered with a HID++ error report.
    ///
    /// Reported as a failed lookup with its error code, never as
    /// `Unsupported`, even though the frame has `0x00` where a reply
    /// carries the index.
    #[error("HID++ error for feature 0x{feature_id:04X}: code 0x{code:02X}")]
    Device { feature_id: u16, code: u8 },

    /// Writing the request or reading the reply failed.
    #[error("feature lookup failed: {0}")]
    Communication(#[from] TransportError),
}

/// Failure to deliver the host switch command.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("switch command failed: {0}")]
    Communication(#[from] TransportError),
}

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Enumerating or talking to a device failed outside the switch path.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Value out of safe range.
    #[error("value out of range: {field} = {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
