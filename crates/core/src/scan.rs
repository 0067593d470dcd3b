//! Diagnostic scan of the known devices.
//!
//! Reports which host switching features each device exposes, or why it
//! could not be reached at all (absent, locked by Logi Options+, no HID++
//! interface).

use std::time::Duration;

use tracing::{debug, warn};

use crate::device::{list_vendor_products, DeviceIdentifier, VendorProduct};
use crate::error::{ProbeError, ResolveError, Result, TransportError};
use crate::feature::{decode_feature_reply, FeatureIndex};
use crate::hidpp::{features, HidppRequest, HidppResponse, DEVICE_INDEX_SELF};
use crate::probe::probe;
use crate::session::HidppSession;
use crate::transport::{HidBackend, HidHandle, HidInterfaceDescriptor};

/// Features queried on every reachable device, in order.
pub const SCAN_FEATURES: [u16; 3] = [
    features::CHANGE_HOST,
    features::HOST_SWITCHING,
    features::FEATURE_SET,
];

/// How long each scan query waits for a reply.
pub const SCAN_TIMEOUT: Duration = Duration::from_millis(500);

/// What a single feature query returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureProbe {
    Found(FeatureIndex),
    Unsupported,
    NoResponse,
    /// HID++ error report with this code.
    Error(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureReport {
    pub feature_id: u16,
    pub result: FeatureProbe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Device absent. Lists the vendor's other products, which helps spot a
    /// wrong product ID.
    NotFound { other_products: Vec<VendorProduct> },
    Locked { message: String },
    NoHidppInterface { candidates: usize },
    Scanned {
        interface: HidInterfaceDescriptor,
        features: Vec<FeatureReport>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub device: DeviceIdentifier,
    pub outcome: ScanOutcome,
}

impl ScanReport {
    /// Whether Change Host or Host Switching was found.
    pub fn supports_host_switching(&self) -> bool {
        let ScanOutcome::Scanned { features: found, .. } = &self.outcome else {
            return false;
        };
        found.iter().any(|f| {
            matches!(f.feature_id, features::CHANGE_HOST | features::HOST_SWITCHING)
                && matches!(f.result, FeatureProbe::Found(_))
        })
    }
}

/// Scan one device.
///
/// Only enumeration failures are errors, as [`Error::Transport`]; everything
/// else ends up in the report.
///
/// [`Error::Transport`]: crate::error::Error::Transport
pub fn scan_device<B: HidBackend>(backend: &B, device: DeviceIdentifier) -> Result<ScanReport> {
    let outcome = match probe(backend, device) {
        Ok(session) => {
            let features = SCAN_FEATURES
                .iter()
                .map(|&feature_id| FeatureReport {
                    feature_id,
                    result: query_feature(&session, feature_id),
                })
                .collect();
            ScanOutcome::Scanned {
                interface: session.interface().clone(),
                features,
            }
        }
        Err(ProbeError::NotFound(_)) => ScanOutcome::NotFound {
            other_products: list_vendor_products(backend, device.vendor_id)?
                .into_iter()
                .filter(|p| p.product_id != device.product_id)
                .collect(),
        },
        Err(ProbeError::Locked { message, .. }) => ScanOutcome::Locked { message },
        Err(ProbeError::NoHidppInterface { candidates, .. }) => {
            ScanOutcome::NoHidppInterface { candidates }
        }
        Err(ProbeError::Communication(e)) => return Err(e.into()),
    };

    let report = ScanReport { device, outcome };
    if matches!(report.outcome, ScanOutcome::Scanned { .. }) && !report.supports_host_switching() {
        warn!(device = %device, "Device opened but exposes no host switching feature");
    }
    Ok(report)
}

/// Query one feature, short report first, long report if the short one goes
/// unanswered.
fn query_feature<H: HidHandle>(session: &HidppSession<H>, feature_id: u16) -> FeatureProbe {
    let req = HidppRequest::get_feature(feature_id);

    if let Some(short) = req.to_short() {
        let reply = session
            .send_short(&short)
            .and_then(|()| read_device_reply(session));
        match reply {
            Ok(Some(raw)) => return classify(feature_id, &raw),
            Ok(None) => debug!(
                feature_id = format_args!("0x{:04X}", feature_id),
                "No reply to short request, retrying long"
            ),
            Err(e) => debug!(error = %e, "Short request failed, retrying long"),
        }
    }

    let reply = session.send(&req.to_long()).and_then(|()| read_device_reply(session));
    match reply {
        Ok(Some(raw)) => classify(feature_id, &raw),
        Ok(None) => FeatureProbe::NoResponse,
        Err(e) => {
            debug!(error = %e, "Long request failed");
            FeatureProbe::NoResponse
        }
    }
}

/// Read one reply and keep it only if it is a HID++ report from the device
/// itself.
fn read_device_reply<H: HidHandle>(
    session: &HidppSession<H>,
) -> std::result::Result<Option<Vec<u8>>, TransportError> {
    let Some(raw) = session.read(SCAN_TIMEOUT)? else {
        return Ok(None);
    };
    match HidppResponse::parse(&raw) {
        Some(resp) if resp.is_hidpp() && resp.device_index == DEVICE_INDEX_SELF => Ok(Some(raw)),
        _ => {
            debug!(report_hex = format_args!("{:02X?}", raw), "Ignoring foreign report");
            Ok(None)
        }
    }
}

fn classify(feature_id: u16, raw: &[u8]) -> FeatureProbe {
    match decode_feature_reply(feature_id, raw) {
        Ok(index) => FeatureProbe::Found(index),
        Err(ResolveError::Unsupported { .. }) => FeatureProbe::Unsupported,
        Err(ResolveError::Device { code, .. }) => FeatureProbe::Error(code),
        Err(ResolveError::NoResponse { .. } | ResolveError::Communication(_)) => {
            FeatureProbe::NoResponse
        }
    }
}
