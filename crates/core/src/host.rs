//! Host slots and the Change Host command.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, InvokeError};
use crate::feature::FeatureIndex;
use crate::hidpp::{change_host, HidppRequest, DEVICE_INDEX_SELF};
use crate::session::HidppSession;
use crate::transport::HidHandle;

/// How long to wait for an acknowledgement after SetCurrentHost.
pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);

/// One of the three pairing slots of a multi-host device, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct HostSlot(u8);

impl HostSlot {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 3;

    pub const HOST_1: Self = Self(1);
    pub const HOST_2: Self = Self(2);
    pub const HOST_3: Self = Self(3);

    /// The 1-based slot number printed on the device.
    pub fn number(self) -> u8 {
        self.0
    }

    /// The zero-based index sent on the wire.
    pub fn target_index(self) -> u8 {
        self.0 - 1
    }
}

impl Default for HostSlot {
    fn default() -> Self {
        Self::HOST_1
    }
}

impl TryFrom<u8> for HostSlot {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(Error::OutOfRange {
                field: "host",
                value: value as u32,
                min: Self::MIN as u32,
                max: Self::MAX as u32,
            });
        }
        Ok(Self(value))
    }
}

impl From<HostSlot> for u8 {
    fn from(slot: HostSlot) -> u8 {
        slot.0
    }
}

impl FromStr for HostSlot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("invalid host number: {s:?}")))?;
        let value = u8::try_from(value).map_err(|_| Error::OutOfRange {
            field: "host",
            value,
            min: Self::MIN as u32,
            max: Self::MAX as u32,
        })?;
        Self::try_from(value)
    }
}

impl fmt::Display for HostSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Send SetCurrentHost to a resolved Change Host feature.
///
/// The device usually drops off the bus as soon as it switches, so a missing
/// or failed acknowledgement still counts as accepted. Only a failed write is
/// an error.
pub fn switch_host<H: HidHandle>(
    session: &HidppSession<H>,
    feature_index: FeatureIndex,
    host: HostSlot,
) -> Result<(), InvokeError> {
    let req = HidppRequest::new(
        DEVICE_INDEX_SELF,
        feature_index.get(),
        change_host::SET_CURRENT_HOST,
        [host.target_index()],
    );
    session.send(&req.to_long())?;
    info!(
        path = %session.interface().path,
        feature_index = feature_index.get(),
        host = host.number(),
        "Sent SetCurrentHost"
    );

    match session.read(COMMAND_TIMEOUT) {
        Ok(Some(_)) => debug!("SetCurrentHost acknowledged"),
        Ok(None) => debug!("No acknowledgement, device probably left the bus"),
        Err(e) => debug!(error = %e, "Read after SetCurrentHost failed"),
    }
    Ok(())
}
