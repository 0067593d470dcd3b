//! Feature table resolution through the Root feature.

use std::fmt;
use std::num::NonZeroU8;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::hidpp::{HidppRequest, HidppResponse, HEADER_LEN, ROOT_FEATURE_INDEX};
use crate::session::HidppSession;
use crate::transport::HidHandle;

/// How long the device gets to answer a feature lookup.
pub const FEATURE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Runtime position of a feature in the device's feature table.
///
/// Index 0 belongs to Root and is what devices answer for unsupported
/// features, so it cannot be represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureIndex(NonZeroU8);

impl FeatureIndex {
    pub fn new(index: u8) -> Option<Self> {
        NonZeroU8::new(index).map(Self)
    }

    pub fn get(self) -> u8 {
        self.0.get()
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.get())
    }
}

/// Look up the runtime index of `feature_id`.
///
/// Root getFeature: params[0..2] = feature ID (big-endian), reply
/// params[0] = feature index, params[1] = type, params[2] = version.
///
/// Reports that are not a reply to the lookup (notifications from other
/// features) are skipped until [`FEATURE_TIMEOUT`] runs out.
pub fn resolve_feature<H: HidHandle>(
    session: &HidppSession<H>,
    feature_id: u16,
) -> Result<FeatureIndex, ResolveError> {
    let req = HidppRequest::get_feature(feature_id);
    session.send(&req.to_long())?;

    let deadline = Instant::now() + FEATURE_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let raw = match session.read(remaining)? {
            Some(raw) if !remaining.is_zero() => raw,
            _ => {
                debug!(feature_id = format_args!("0x{:04X}", feature_id), "Feature lookup timed out");
                return Err(ResolveError::NoResponse { feature_id });
            }
        };

        if !is_root_reply(&req, &raw) {
            debug!(report_hex = format_args!("{:02X?}", raw), "Skipping unrelated report");
            continue;
        }

        let index = decode_feature_reply(feature_id, &raw)?;
        debug!(
            feature_id = format_args!("0x{:04X}", feature_id),
            feature_index = index.get(),
            "Feature lookup success"
        );
        return Ok(index);
    }
}

/// Whether `raw` answers the Root request `req`.
///
/// A reply echoes the Root index and function byte. An error report carries
/// the Root index where a reply has its feature index.
fn is_root_reply(req: &HidppRequest, raw: &[u8]) -> bool {
    let Some(resp) = HidppResponse::parse(raw) else {
        return false;
    };
    if resp.is_error() {
        return resp.function_sw == ROOT_FEATURE_INDEX;
    }
    resp.feature_index == ROOT_FEATURE_INDEX && resp.function_sw == req.function_sw
}

/// Interpret a raw getFeature reply.
pub(crate) fn decode_feature_reply(feature_id: u16, raw: &[u8]) -> Result<FeatureIndex, ResolveError> {
    let resp = match HidppResponse::parse(raw) {
        Some(resp) if raw.len() > HEADER_LEN => resp,
        _ => {
            debug!(
                feature_id = format_args!("0x{:04X}", feature_id),
                len = raw.len(),
                "Truncated feature lookup reply"
            );
            return Err(ResolveError::NoResponse { feature_id });
        }
    };

    if resp.is_error() {
        let code = resp.error_code().unwrap_or(0);
        warn!(
            feature_id = format_args!("0x{:04X}", feature_id),
            error_code = format_args!("0x{:02X}", code),
            "HID++ error response"
        );
        return Err(ResolveError::Device { feature_id, code });
    }

    FeatureIndex::new(resp.params[0]).ok_or(ResolveError::Unsupported { feature_id })
}
