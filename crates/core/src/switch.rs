//! Switching every known device to another host.
//!
//! Each device runs through probe, feature lookup and SetCurrentHost on its
//! own. A failure is recorded for that device and the batch moves on, so one
//! unplugged touchpad never keeps the keyboard from switching.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::device::DeviceIdentifier;
use crate::error::{InvokeError, ProbeError, ResolveError};
use crate::feature::resolve_feature;
use crate::hidpp::features;
use crate::host::{switch_host, HostSlot};
use crate::probe::probe;
use crate::transport::HidBackend;

/// Delays applied around a batch switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchOptions {
    /// Pause between two consecutive devices.
    pub device_pacing: Duration,
    /// Pause after the pre-switch hook, before the first device.
    pub settle_delay: Duration,
}

impl SwitchOptions {
    /// 500 ms between devices, 300 ms after the pre-switch hook.
    pub const fn strict() -> Self {
        Self {
            device_pacing: Duration::from_millis(500),
            settle_delay: Duration::from_millis(300),
        }
    }

    /// No delays at all.
    pub const fn minimal() -> Self {
        Self {
            device_pacing: Duration::ZERO,
            settle_delay: Duration::ZERO,
        }
    }
}

impl Default for SwitchOptions {
    fn default() -> Self {
        Self::strict()
    }
}

/// Why a device could not be switched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchFailure {
    #[error("device not found")]
    DeviceNotFound,

    #[error("no interface answered HID++")]
    NoHidppInterface,

    #[error("locked by another application (close Logi Options+ and retry)")]
    Locked,

    #[error("Change Host feature not supported")]
    FeatureUnsupported,

    #[error("no response from device")]
    NoResponse,

    #[error("communication error: {0}")]
    CommunicationError(String),
}

impl From<ProbeError> for SwitchFailure {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::NotFound(_) => Self::DeviceNotFound,
            ProbeError::Locked { .. } => Self::Locked,
            ProbeError::NoHidppInterface { .. } => Self::NoHidppInterface,
            ProbeError::Communication(e) => Self::CommunicationError(e.to_string()),
        }
    }
}

impl From<ResolveError> for SwitchFailure {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NoResponse { .. } => Self::NoResponse,
            ResolveError::Unsupported { .. } => Self::FeatureUnsupported,
            ResolveError::Device { .. } => Self::CommunicationError(err.to_string()),
            ResolveError::Communication(e) => Self::CommunicationError(e.to_string()),
        }
    }
}

impl From<InvokeError> for SwitchFailure {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Communication(e) => Self::CommunicationError(e.to_string()),
        }
    }
}

/// Outcome for one device of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchResult {
    Success,
    Failed(SwitchFailure),
}

impl SwitchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Result of a cleanup step whose failure must not stop the switch.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort {
    Done,
    Failed(String),
}

impl BestEffort {
    /// Log the outcome of `step`.
    pub fn log(&self, step: &str) {
        match self {
            Self::Done => debug!(step, "Best-effort step done"),
            Self::Failed(reason) => warn!(step, %reason, "Best-effort step failed, continuing"),
        }
    }
}

/// Runs once before a batch switch, e.g. to release held modifier keys so the
/// next host does not see them stuck.
pub trait PreSwitch {
    fn prepare(&self) -> BestEffort;
}

/// This machine's slot and the host the devices were last sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostState {
    this_host: HostSlot,
    current: Option<HostSlot>,
}

impl HostState {
    pub fn new(this_host: HostSlot) -> Self {
        Self {
            this_host,
            current: None,
        }
    }

    pub fn this_host(&self) -> HostSlot {
        self.this_host
    }

    /// Host of the last switch, if any happened.
    pub fn current(&self) -> Option<HostSlot> {
        self.current
    }

    /// The "other" host: 2 when this machine is host 1, otherwise 1.
    pub fn away_target(&self) -> HostSlot {
        if self.this_host == HostSlot::HOST_1 {
            HostSlot::HOST_2
        } else {
            HostSlot::HOST_1
        }
    }

    pub fn record(&mut self, host: HostSlot) {
        self.current = Some(host);
    }
}

/// Sequences the switch over a list of devices.
pub struct Switcher<B: HidBackend> {
    backend: B,
    options: SwitchOptions,
    pre_switch: Option<Box<dyn PreSwitch>>,
}

impl<B: HidBackend> Switcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            options: SwitchOptions::default(),
            pre_switch: None,
        }
    }

    pub fn with_options(mut self, options: SwitchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_pre_switch(mut self, hook: Box<dyn PreSwitch>) -> Self {
        self.pre_switch = Some(hook);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> SwitchOptions {
        self.options
    }

    /// Switch one device. Never retries.
    pub fn switch_device(&self, device: DeviceIdentifier, host: HostSlot) -> SwitchResult {
        match self.try_switch(device, host) {
            Ok(()) => {
                info!(device = %device, host = host.number(), "Device switched");
                SwitchResult::Success
            }
            Err(failure) => {
                warn!(device = %device, host = host.number(), %failure, "Device not switched");
                SwitchResult::Failed(failure)
            }
        }
    }

    fn try_switch(&self, device: DeviceIdentifier, host: HostSlot) -> Result<(), SwitchFailure> {
        let session = probe(&self.backend, device)?;
        let index = resolve_feature(&session, features::CHANGE_HOST)?;
        switch_host(&session, index, host)?;
        Ok(())
    }

    /// Switch every device in order, returning one result per device.
    pub fn switch_all(
        &self,
        devices: &[DeviceIdentifier],
        host: HostSlot,
    ) -> Vec<(DeviceIdentifier, SwitchResult)> {
        info!(host = host.number(), devices = devices.len(), "Switching devices");

        if let Some(hook) = &self.pre_switch {
            hook.prepare().log("pre-switch");
            pause(self.options.settle_delay);
        }

        devices
            .iter()
            .enumerate()
            .map(|(i, &device)| {
                if i > 0 {
                    pause(self.options.device_pacing);
                }
                (device, self.switch_device(device, host))
            })
            .collect()
    }

    /// Send every device to the host "away" from this machine.
    pub fn switch_away(
        &self,
        state: &mut HostState,
        devices: &[DeviceIdentifier],
    ) -> Vec<(DeviceIdentifier, SwitchResult)> {
        let target = state.away_target();
        debug!(this_host = state.this_host().number(), target = target.number(), "Switching away");
        state.record(target);
        self.switch_all(devices, target)
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
