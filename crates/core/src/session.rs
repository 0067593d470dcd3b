//! An open HID++ conversation with one interface.

use std::time::Duration;

use tracing::trace;

use crate::error::TransportError;
use crate::hidpp::{HidppRequest, LongReport, ShortReport};
use crate::transport::{HidHandle, HidInterfaceDescriptor};

/// Size of the buffer used for a single input report read.
pub const READ_BUF_LEN: usize = 64;

/// An open handle bound to the interface it was opened on.
///
/// The session owns the handle exclusively; dropping the session closes it.
pub struct HidppSession<H: HidHandle> {
    handle: H,
    interface: HidInterfaceDescriptor,
}

impl<H: HidHandle> HidppSession<H> {
    pub fn new(handle: H, interface: HidInterfaceDescriptor) -> Self {
        Self { handle, interface }
    }

    /// The interface this session talks to.
    pub fn interface(&self) -> &HidInterfaceDescriptor {
        &self.interface
    }

    /// Write a 20-byte long report.
    pub fn send(&self, report: &LongReport) -> Result<(), TransportError> {
        self.write_frame(report.as_bytes())
    }

    /// Write a 7-byte short report.
    pub fn send_short(&self, report: &ShortReport) -> Result<(), TransportError> {
        self.write_frame(report.as_bytes())
    }

    fn write_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        trace!(
            path = %self.interface.path,
            report_hex = format_args!("{:02X?}", frame),
            "HID++ TX"
        );
        self.handle.write(frame)?;
        Ok(())
    }

    /// Read one input report.
    ///
    /// Returns `Ok(None)` when nothing arrived within `timeout`.
    pub fn read(&self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        let mut buf = [0u8; READ_BUF_LEN];
        let n = self.handle.read_timeout(&mut buf, timeout)?;
        if n == 0 {
            return Ok(None);
        }

        trace!(
            path = %self.interface.path,
            report_hex = format_args!("{:02X?}", &buf[..n]),
            "HID++ RX"
        );
        Ok(Some(buf[..n].to_vec()))
    }

    /// Send `req` as a long report and wait for one reply.
    pub fn request(
        &self,
        req: &HidppRequest,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        self.send(&req.to_long())?;
        self.read(timeout)
    }

    /// Discard pending input.
    ///
    /// Stops at the first empty read, the first read failure, or after
    /// `limit` reads. Returns the number of reports discarded.
    pub fn drain(&self, timeout: Duration, limit: usize) -> usize {
        let mut discarded = 0;
        while discarded < limit {
            match self.read(timeout) {
                Ok(Some(_)) => discarded += 1,
                Ok(None) | Err(_) => break,
            }
        }
        if discarded > 0 {
            trace!(path = %self.interface.path, discarded, "Drained stale input");
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hidpp::{features, LONG_REPORT_LEN};
    use crate::transport::mock::MockBackend;
    use crate::transport::HidBackend;

    fn open(mock: &MockBackend, path: &str) -> HidppSession<crate::transport::mock::MockHandle> {
        let interface = mock
            .enumerate(crate::LOGITECH_VID, 0)
            .unwrap()
            .into_iter()
            .find(|i| i.path == path)
            .unwrap();
        HidppSession::new(mock.open(path).unwrap(), interface)
    }

    #[test]
    fn request_writes_long_frame_and_reads_reply() {
        let mock = MockBackend::new();
        mock.add_interface(0xBB00, "pad-0", 0xFF43);
        mock.answer_feature("pad-0", features::CHANGE_HOST, 0x04);

        let session = open(&mock, "pad-0");
        let req = HidppRequest::get_feature(features::CHANGE_HOST);
        let reply = session.request(&req, Duration::from_millis(10)).unwrap().unwrap();

        assert_eq!(reply[4], 0x04);
        let writes = mock.writes_to("pad-0");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), LONG_REPORT_LEN);
    }

    #[test]
    fn read_timeout_is_none() {
        let mock = MockBackend::new();
        mock.add_interface(0xBB00, "pad-0", 0xFF43);
        let session = open(&mock, "pad-0");
        assert_eq!(session.read(Duration::from_millis(10)).unwrap(), None);
    }

    #[test]
    fn drain_respects_limit() {
        let mock = MockBackend::new();
        mock.add_interface(0xBB00, "pad-0", 0xFF43);
        for i in 0..5 {
            mock.queue_stale("pad-0", vec![0x11, 0xFF, 0x00, i]);
        }

        let session = open(&mock, "pad-0");
        assert_eq!(session.drain(Duration::from_millis(1), 3), 3);
        assert_eq!(session.drain(Duration::from_millis(1), 16), 2);
        assert_eq!(session.drain(Duration::from_millis(1), 16), 0);
    }

    #[test]
    fn dropping_session_closes_handle() {
        let mock = MockBackend::new();
        mock.add_interface(0xBB00, "pad-0", 0xFF43);
        let session = open(&mock, "pad-0");
        assert_eq!(mock.open_handles(), 1);
        drop(session);
        assert_eq!(mock.open_handles(), 0);
    }
}
