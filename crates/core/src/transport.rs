//! HID transport abstraction for device communication.
//!
//! Provides a trait-based transport layer so that real HID devices and
//! mock devices share the same interface. A handle is closed when it is
//! dropped.

use std::ffi::CString;
use std::sync::Mutex;
use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use tracing::{debug, trace};

use crate::error::TransportError;

/// One enumerated HID interface of a device.
///
/// Composite devices expose several of these (keyboard, consumer control,
/// vendor HID++), each with its own path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidInterfaceDescriptor {
    /// Platform-specific path, opaque to this crate.
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage_page: u16,
    pub product_string: Option<String>,
}

/// Enumerates and opens HID interfaces.
pub trait HidBackend {
    type Handle: HidHandle;

    /// List interfaces of `vendor_id`/`product_id`. A product ID of 0 matches
    /// every product of the vendor.
    fn enumerate(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Vec<HidInterfaceDescriptor>, TransportError>;

    /// Open an interface by path.
    ///
    /// Fails with [`TransportError::Locked`] if another process holds the
    /// interface exclusively.
    fn open(&self, path: &str) -> Result<Self::Handle, TransportError>;
}

/// An open HID interface. Dropping the handle closes it.
pub trait HidHandle {
    /// Write a raw HID report. Returns the number of bytes written.
    fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read one input report, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` when the timeout elapses without data.
    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;
}

/// Whether an open failure means another process holds the interface.
///
/// Windows reports exclusive access (Logi Options+) as "Access is denied";
/// Linux reports `EBUSY`. A Linux `EACCES` ("Permission denied") means missing
/// hidraw access rights, not a competing process, and is not a lock.
pub fn is_lock_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("access denied")
        || lower.contains("access is denied")
        || lower.contains("resource busy")
        || lower.contains("sharing violation")
}

/// Classify an error returned while opening an interface.
pub fn classify_open_error(message: String) -> TransportError {
    if is_lock_error(&message) {
        TransportError::Locked(message)
    } else {
        TransportError::Hid(message)
    }
}

/// [`HidBackend`] on top of the `hidapi` crate.
pub struct HidApiBackend {
    api: Mutex<HidApi>,
}

impl HidApiBackend {
    pub fn new() -> Result<Self, TransportError> {
        let api = HidApi::new().map_err(|e| TransportError::Hid(format!("hidapi init: {e}")))?;
        Ok(Self {
            api: Mutex::new(api),
        })
    }

    fn api(&self) -> Result<std::sync::MutexGuard<'_, HidApi>, TransportError> {
        self.api
            .lock()
            .map_err(|_| TransportError::Hid("hidapi handle poisoned".into()))
    }
}

impl HidBackend for HidApiBackend {
    type Handle = HidDevice;

    fn enumerate(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Vec<HidInterfaceDescriptor>, TransportError> {
        let mut api = self.api()?;
        // Connectivity changes between calls, so the list is never reused.
        api.refresh_devices()
            .map_err(|e| TransportError::Hid(format!("refresh_devices: {e}")))?;

        let interfaces: Vec<HidInterfaceDescriptor> = api
            .device_list()
            .filter(|info| info.vendor_id() == vendor_id)
            .filter(|info| product_id == 0 || info.product_id() == product_id)
            .map(|info| HidInterfaceDescriptor {
                path: info.path().to_string_lossy().into_owned(),
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                usage_page: info.usage_page(),
                product_string: info.product_string().map(str::to_owned),
            })
            .collect();

        debug!(
            vid = format_args!("0x{:04X}", vendor_id),
            pid = format_args!("0x{:04X}", product_id),
            count = interfaces.len(),
            "HID interface enumeration complete"
        );
        Ok(interfaces)
    }

    fn open(&self, path: &str) -> Result<HidDevice, TransportError> {
        let c_path = CString::new(path)
            .map_err(|_| TransportError::Hid(format!("invalid device path: {path:?}")))?;
        let api = self.api()?;
        api.open_path(&c_path)
            .map_err(|e| classify_open_error(e.to_string()))
    }
}

impl HidHandle for HidDevice {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        trace!(report_hex = format_args!("{:02X?}", data), "HID write");
        HidDevice::write(self, data).map_err(|e| TransportError::Hid(format!("write: {e}")))
    }

    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        HidDevice::read_timeout(self, buf, millis)
            .map_err(|e| TransportError::Hid(format!("read_timeout: {e}")))
    }
}

/// A mock HID backend for testing.
///
/// Stores predefined request→response mappings per interface path and keeps
/// count of open handles so tests can check that nothing leaks.
#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::hidpp::{
        DEVICE_INDEX_SELF, HEADER_LEN, LONG_REPORT_ID, LONG_REPORT_LEN, SHORT_REPORT_ID,
        SHORT_REPORT_LEN,
    };
    use crate::LOGITECH_VID;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;

    struct MockInterface {
        descriptor: HidInterfaceDescriptor,
        locked: bool,
        fail_writes: bool,
        responses: HashMap<Vec<u8>, Vec<Vec<u8>>>,
        stale: Vec<Vec<u8>>,
    }

    #[derive(Default)]
    struct MockState {
        interfaces: Vec<MockInterface>,
        open_handles: usize,
        open_attempts: Vec<String>,
        writes: Vec<(String, Vec<u8>)>,
        fail_enumeration: bool,
    }

    impl MockState {
        fn interface_mut(&mut self, path: &str) -> &mut MockInterface {
            self.interfaces
                .iter_mut()
                .find(|i| i.descriptor.path == path)
                .unwrap_or_else(|| panic!("mock: unknown interface {path}"))
        }
    }

    /// Mock backend that returns preconfigured responses.
    #[derive(Clone, Default)]
    pub struct MockBackend {
        state: Arc<Mutex<MockState>>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a Logitech interface, in enumeration order.
        pub fn add_interface(&self, product_id: u16, path: &str, usage_page: u16) {
            self.state.lock().unwrap().interfaces.push(MockInterface {
                descriptor: HidInterfaceDescriptor {
                    path: path.to_string(),
                    vendor_id: LOGITECH_VID,
                    product_id,
                    usage_page,
                    product_string: None,
                },
                locked: false,
                fail_writes: false,
                responses: HashMap::new(),
                stale: Vec::new(),
            });
        }

        /// Make `open` fail as if another process held the interface.
        pub fn lock_interface(&self, path: &str) {
            self.state.lock().unwrap().interface_mut(path).locked = true;
        }

        /// Make every enumeration fail.
        pub fn fail_enumeration(&self) {
            self.state.lock().unwrap().fail_enumeration = true;
        }

        /// Make every write on the interface fail.
        pub fn fail_writes(&self, path: &str) {
            self.state.lock().unwrap().interface_mut(path).fail_writes = true;
        }

        /// Queue input that is already pending when the interface is opened.
        pub fn queue_stale(&self, path: &str, report: Vec<u8>) {
            self.state.lock().unwrap().interface_mut(path).stale.push(report);
        }

        /// Register a response for a given request. Several responses for the
        /// same request are delivered in order.
        pub fn on_request(&self, path: &str, request: Vec<u8>, response: Vec<u8>) {
            self.state
                .lock()
                .unwrap()
                .interface_mut(path)
                .responses
                .entry(request)
                .or_default()
                .push(response);
        }

        /// Register a long HID++ response for a long request.
        pub fn on_long_request(
            &self,
            path: &str,
            feature_idx: u8,
            function_sw: u8,
            req_params: &[u8],
            resp_params: &[u8],
        ) {
            let req = frame(LONG_REPORT_ID, LONG_REPORT_LEN, feature_idx, function_sw, req_params);
            let resp = frame(LONG_REPORT_ID, LONG_REPORT_LEN, feature_idx, function_sw, resp_params);
            self.on_request(path, req, resp);
        }

        /// Register a short HID++ response for a short request.
        pub fn on_short_request(
            &self,
            path: &str,
            feature_idx: u8,
            function_sw: u8,
            req_params: &[u8],
            resp_params: &[u8],
        ) {
            let req = frame(SHORT_REPORT_ID, SHORT_REPORT_LEN, feature_idx, function_sw, req_params);
            let resp = frame(SHORT_REPORT_ID, SHORT_REPORT_LEN, feature_idx, function_sw, resp_params);
            self.on_request(path, req, resp);
        }

        /// Answer the interface probe (ROOT getFeature(FEATURE_SET)).
        pub fn answer_probe(&self, path: &str) {
            self.on_long_request(path, 0x00, 0x00, &[0x00, 0x01], &[0x01, 0x00, 0x00]);
        }

        /// Answer ROOT getFeature(`feature_id`) with `index`.
        pub fn answer_feature(&self, path: &str, feature_id: u16, index: u8) {
            let [hi, lo] = feature_id.to_be_bytes();
            self.on_long_request(path, 0x00, 0x00, &[hi, lo], &[index, 0x00, 0x00]);
        }

        /// Number of handles currently open.
        pub fn open_handles(&self) -> usize {
            self.state.lock().unwrap().open_handles
        }

        /// Paths passed to `open`, in call order.
        pub fn open_attempts(&self) -> Vec<String> {
            self.state.lock().unwrap().open_attempts.clone()
        }

        /// Every report written through any handle.
        pub fn writes(&self) -> Vec<(String, Vec<u8>)> {
            self.state.lock().unwrap().writes.clone()
        }

        /// Reports written to one interface.
        pub fn writes_to(&self, path: &str) -> Vec<Vec<u8>> {
            self.writes()
                .into_iter()
                .filter(|(p, _)| p == path)
                .map(|(_, data)| data)
                .collect()
        }
    }

    fn frame(
        report_id: u8,
        len: usize,
        feature_idx: u8,
        function_sw: u8,
        params: &[u8],
    ) -> Vec<u8> {
        let mut buf = vec![report_id, DEVICE_INDEX_SELF, feature_idx, function_sw];
        buf.extend_from_slice(params);
        buf.resize(len.max(HEADER_LEN + params.len()), 0);
        buf
    }

    /// Handle returned by [`MockBackend::open`].
    pub struct MockHandle {
        path: String,
        pending: Mutex<VecDeque<Vec<u8>>>,
        state: Arc<Mutex<MockState>>,
    }

    impl HidBackend for MockBackend {
        type Handle = MockHandle;

        fn enumerate(
            &self,
            vendor_id: u16,
            product_id: u16,
        ) -> Result<Vec<HidInterfaceDescriptor>, TransportError> {
            let state = self.state.lock().unwrap();
            if state.fail_enumeration {
                return Err(TransportError::Hid("mock: enumeration failed".into()));
            }
            Ok(state
                .interfaces
                .iter()
                .map(|i| &i.descriptor)
                .filter(|d| d.vendor_id == vendor_id)
                .filter(|d| product_id == 0 || d.product_id == product_id)
                .cloned()
                .collect())
        }

        fn open(&self, path: &str) -> Result<MockHandle, TransportError> {
            let mut state = self.state.lock().unwrap();
            state.open_attempts.push(path.to_string());
            let interface = state.interface_mut(path);
            if interface.locked {
                return Err(TransportError::Locked(format!("mock: {path} is in use")));
            }
            let pending = interface.stale.iter().cloned().collect();
            state.open_handles += 1;

            Ok(MockHandle {
                path: path.to_string(),
                pending: Mutex::new(pending),
                state: Arc::clone(&self.state),
            })
        }
    }

    impl HidHandle for MockHandle {
        fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
            let mut state = self.state.lock().unwrap();
            state.writes.push((self.path.clone(), data.to_vec()));

            let interface = state.interface_mut(&self.path);
            if interface.fail_writes {
                return Err(TransportError::Hid("mock: write failed".into()));
            }
            if let Some(responses) = interface.responses.get(data) {
                self.pending
                    .lock()
                    .unwrap()
                    .extend(responses.iter().cloned());
            }
            Ok(data.len())
        }

        fn read_timeout(&self, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
            let Some(report) = self.pending.lock().unwrap().pop_front() else {
                return Ok(0);
            };
            let len = report.len().min(buf.len());
            buf[..len].copy_from_slice(&report[..len]);
            Ok(len)
        }
    }

    impl Drop for MockHandle {
        fn drop(&mut self) {
            if let Ok(mut state) = self.state.lock() {
                state.open_handles -= 1;
            }
        }
    }
}
