//! Locating the HID++ interface of a composite device.
//!
//! A Casa device enumerates several HID interfaces and only one of them
//! answers HID++. The prober tries them in preference order and keeps the
//! first one that replies to a harmless Root lookup.

use std::time::Duration;

use tracing::{debug, info};

use crate::device::DeviceIdentifier;
use crate::error::{ProbeError, TransportError};
use crate::hidpp::{features, HidppRequest};
use crate::session::HidppSession;
use crate::transport::{HidBackend, HidInterfaceDescriptor};
use crate::HIDPP_USAGE_PAGE;

/// How long a candidate interface gets to answer the probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);
/// Per-read timeout while discarding stale input after a successful probe.
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
/// Upper bound on stale reports discarded after a successful probe.
pub const DRAIN_LIMIT: usize = 16;

/// Put vendor usage page interfaces first, keeping enumeration order otherwise.
pub fn order_candidates(mut candidates: Vec<HidInterfaceDescriptor>) -> Vec<HidInterfaceDescriptor> {
    // sort_by_key is stable.
    candidates.sort_by_key(|c| c.usage_page != HIDPP_USAGE_PAGE);
    candidates
}

/// Open the first interface of `device` that speaks HID++.
///
/// The returned session belongs to the caller. Every handle opened for a
/// rejected candidate is closed before the next one is tried.
pub fn probe<B: HidBackend>(
    backend: &B,
    device: DeviceIdentifier,
) -> Result<HidppSession<B::Handle>, ProbeError> {
    let candidates = backend.enumerate(device.vendor_id, device.product_id)?;
    if candidates.is_empty() {
        debug!(device = %device, "No HID interfaces");
        return Err(ProbeError::NotFound(device));
    }

    let candidates = order_candidates(candidates);
    let total = candidates.len();
    let probe_req = HidppRequest::get_feature(features::FEATURE_SET);
    let mut lock_message: Option<String> = None;

    for candidate in candidates {
        debug!(
            device = %device,
            path = %candidate.path,
            usage_page = format_args!("0x{:04X}", candidate.usage_page),
            "Probing interface"
        );

        let handle = match backend.open(&candidate.path) {
            Ok(handle) => handle,
            Err(TransportError::Locked(message)) => {
                debug!(path = %candidate.path, %message, "Interface locked");
                if lock_message.is_none() {
                    lock_message = Some(message);
                }
                continue;
            }
            Err(e) => {
                debug!(path = %candidate.path, error = %e, "Cannot open interface");
                continue;
            }
        };

        let session = HidppSession::new(handle, candidate);
        match session.request(&probe_req, PROBE_TIMEOUT) {
            Ok(Some(_)) => {
                session.drain(DRAIN_TIMEOUT, DRAIN_LIMIT);
                info!(
                    device = %device,
                    path = %session.interface().path,
                    usage_page = format_args!("0x{:04X}", session.interface().usage_page),
                    "Found HID++ interface"
                );
                return Ok(session);
            }
            Ok(None) => {
                debug!(path = %session.interface().path, "Interface silent");
            }
            Err(e) => {
                debug!(path = %session.interface().path, error = %e, "Probe failed");
            }
        }
    }

    match lock_message {
        Some(message) => Err(ProbeError::Locked { device, message }),
        None => Err(ProbeError::NoHidppInterface {
            device,
            candidates: total,
        }),
    }
}
