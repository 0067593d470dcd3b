//! HID++ 2.0 report framing.
//!
//! HID++ uses two report formats:
//! - Short reports: 7 bytes (report ID 0x10)
//! - Long reports: 20 bytes (report ID 0x11)
//!
//! Every frame starts with the same four header bytes:
//!
//! ```text
//! [report_id, device_index, feature_index, function_sw, params...]
//! ```
//!
//! where `function_sw` carries the function ID in bits 7:4 and the software ID
//! in bits 3:0. Outgoing frames are fixed-size [`Report`] buffers; replies are
//! parsed leniently into [`HidppResponse`] because firmware does not always
//! honour the nominal report length.

/// HID++ report ID for short messages (7 bytes total).
pub const SHORT_REPORT_ID: u8 = 0x10;
/// HID++ report ID for long messages (20 bytes total).
pub const LONG_REPORT_ID: u8 = 0x11;

/// Short report length (including report ID).
pub const SHORT_REPORT_LEN: usize = 7;
/// Long report length (including report ID).
pub const LONG_REPORT_LEN: usize = 20;

/// Number of header bytes preceding the parameters.
pub const HEADER_LEN: usize = 4;
/// Parameter capacity of a short report.
pub const SHORT_PARAMS_LEN: usize = SHORT_REPORT_LEN - HEADER_LEN;
/// Parameter capacity of a long report.
pub const LONG_PARAMS_LEN: usize = LONG_REPORT_LEN - HEADER_LEN;

/// Device index addressing the peripheral itself rather than a paired sub-device.
pub const DEVICE_INDEX_SELF: u8 = 0xFF;

/// Software ID placed in the low nibble of `function_sw`.
///
/// Casa firmware answers with the same nibble, so function 0 goes out as
/// `0x00` and function 1 as `0x10`.
pub const SOFTWARE_ID: u8 = 0x00;

/// Feature index byte marking a HID++ 2.0 error report.
pub const ERROR_FEATURE_INDEX: u8 = 0xFF;
/// Sub ID byte marking a HID++ 1.0 error report.
pub const HIDPP10_ERROR_SUB_ID: u8 = 0x8F;

/// HID++ 2.0 well-known feature IDs.
pub mod features {
    /// Root feature: ping and feature index lookup. Always at index 0.
    pub const ROOT: u16 = 0x0000;
    /// Feature set: enumerate all supported features.
    pub const FEATURE_SET: u16 = 0x0001;
    /// Change host: move the peripheral to another paired host.
    pub const CHANGE_HOST: u16 = 0x1814;
    /// Host switching, the newer variant found on Bolt-era devices.
    pub const HOST_SWITCHING: u16 = 0x4500;
}

/// Runtime index of the Root feature.
pub const ROOT_FEATURE_INDEX: u8 = 0x00;

/// Root feature functions.
pub mod root {
    /// getFeature(featureId) -> featureIndex, featureType, featureVersion
    pub const GET_FEATURE: u8 = 0x0;
}

/// Change Host feature functions.
pub mod change_host {
    /// setCurrentHost(hostIndex), host index is zero-based.
    pub const SET_CURRENT_HOST: u8 = 0x1;
}

/// A fixed-size outgoing HID++ frame.
///
/// `N` is either [`SHORT_REPORT_LEN`] or [`LONG_REPORT_LEN`]; unused parameter
/// bytes are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Report<const N: usize>([u8; N]);

/// A 20-byte long report.
pub type LongReport = Report<LONG_REPORT_LEN>;
/// A 7-byte short report.
pub type ShortReport = Report<SHORT_REPORT_LEN>;

impl<const N: usize> Report<N> {
    fn encode(report_id: u8, req: &HidppRequest) -> Self {
        let params = req.params();
        let mut buf = [0u8; N];
        buf[0] = report_id;
        buf[1] = req.device_index;
        buf[2] = req.feature_index;
        buf[3] = req.function_sw;
        buf[HEADER_LEN..HEADER_LEN + params.len()].copy_from_slice(params);
        Self(buf)
    }

    pub fn report_id(&self) -> u8 {
        self.0[0]
    }

    pub fn device_index(&self) -> u8 {
        self.0[1]
    }

    pub fn feature_index(&self) -> u8 {
        self.0[2]
    }

    /// Function ID (bits 7:4) and software ID (bits 3:0).
    pub fn function_sw(&self) -> u8 {
        self.0[3]
    }

    pub fn function(&self) -> u8 {
        self.0[3] >> 4
    }

    /// All parameter bytes, including the zero padding.
    pub fn params(&self) -> &[u8] {
        &self.0[HEADER_LEN..]
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

/// A HID++ 2.0 request message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidppRequest {
    /// Device index (0xFF for the device itself).
    pub device_index: u8,
    /// Feature index (looked up from feature ID via ROOT feature).
    pub feature_index: u8,
    /// Function ID within the feature (bits 7:4) and software ID (bits 3:0).
    pub function_sw: u8,
    params: [u8; LONG_PARAMS_LEN],
    param_len: usize,
}

impl HidppRequest {
    /// Create a new request for a given feature index and function.
    ///
    /// The parameter array length is checked at compile time against the
    /// long report capacity, so a request can never be truncated on encode.
    pub fn new<const P: usize>(
        device_index: u8,
        feature_index: u8,
        function: u8,
        params: [u8; P],
    ) -> Self {
        const { assert!(P <= LONG_PARAMS_LEN, "HID++ requests carry at most 16 parameter bytes") };

        let mut buf = [0u8; LONG_PARAMS_LEN];
        buf[..P].copy_from_slice(&params);
        Self {
            device_index,
            feature_index,
            function_sw: ((function & 0x0F) << 4) | SOFTWARE_ID,
            params: buf,
            param_len: P,
        }
    }

    /// Root getFeature request for `feature_id`, addressed to the device itself.
    pub fn get_feature(feature_id: u16) -> Self {
        let [hi, lo] = feature_id.to_be_bytes();
        Self::new(DEVICE_INDEX_SELF, ROOT_FEATURE_INDEX, root::GET_FEATURE, [hi, lo])
    }

    /// The meaningful parameter bytes, without padding.
    pub fn params(&self) -> &[u8] {
        &self.params[..self.param_len]
    }

    /// Encode as a zero-padded long report.
    pub fn to_long(&self) -> LongReport {
        Report::encode(LONG_REPORT_ID, self)
    }

    /// Encode as a zero-padded short report.
    ///
    /// Returns `None` if the parameters do not fit into 3 bytes.
    pub fn to_short(&self) -> Option<ShortReport> {
        (self.param_len <= SHORT_PARAMS_LEN).then(|| Report::encode(SHORT_REPORT_ID, self))
    }
}

/// A decoded HID++ reply.
///
/// Parsing only requires the 4 header bytes; `params` holds whatever followed,
/// so a truncated reply surfaces as missing parameters instead of a panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidppResponse {
    pub report_id: u8,
    pub device_index: u8,
    pub feature_index: u8,
    /// Function and software ID byte.
    pub function_sw: u8,
    /// Response payload bytes.
    pub params: Vec<u8>,
}

impl HidppResponse {
    /// Decode a raw HID report. Returns `None` if the header is incomplete.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN {
            return None;
        }

        Some(Self {
            report_id: data[0],
            device_index: data[1],
            feature_index: data[2],
            function_sw: data[3],
            params: data[HEADER_LEN..].to_vec(),
        })
    }

    /// Extract the function ID from the function_sw byte.
    pub fn function(&self) -> u8 {
        self.function_sw >> 4
    }

    /// Whether the report ID is one of the HID++ report IDs.
    pub fn is_hidpp(&self) -> bool {
        matches!(self.report_id, SHORT_REPORT_ID | LONG_REPORT_ID)
    }

    /// Check if this response is an error report.
    ///
    /// HID++ 2.0 errors carry feature index 0xFF; HID++ 1.0 receivers and
    /// devices answer unknown requests with sub ID 0x8F in the same position.
    pub fn is_error(&self) -> bool {
        matches!(self.feature_index, ERROR_FEATURE_INDEX | HIDPP10_ERROR_SUB_ID)
    }

    /// Error code of an error report (byte 5 of the frame).
    pub fn error_code(&self) -> Option<u8> {
        if !self.is_error() {
            return None;
        }
        self.params.get(1).copied()
    }
}
