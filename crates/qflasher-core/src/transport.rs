//! Bulk transport abstraction
//!
//! The Sahara and Firehose engines only need a bulk IN and a bulk OUT pipe.
//! Implementations provide single transfers; the chunked write with
//! zero-length-packet termination is built on top of them here so every
//! backend frames messages the same way.

use std::time::Duration;

use crate::error::{Error, Result};

/// Timeout applied to each packet-sized chunk of a chunked [`Transport::write`]
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// A pair of bulk endpoints on a claimed USB interface
pub trait Transport {
    /// Maximum packet size of the bulk OUT endpoint
    fn out_max_packet_size(&self) -> usize;

    /// Perform one bulk IN transfer into `buf`
    ///
    /// A timeout is not an error: implementations return `Ok(0)`.
    fn bulk_read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Perform one bulk OUT transfer of `data`
    ///
    /// An empty `data` slice sends a zero-length packet.
    fn bulk_write(&mut self, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Submit `data` as a single request, optionally followed by a
    /// zero-length packet
    ///
    /// Used by protocol phases that need explicit control over message
    /// termination (Firehose commands and raw program data).
    fn submit_write(&mut self, data: &[u8], zero_packet: bool, timeout: Duration)
        -> Result<usize>;

    /// Read one message, mapping timeouts and transfer errors to 0 bytes
    ///
    /// Callers treat 0 as "no message".
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> usize {
        match self.bulk_read(buf, timeout) {
            Ok(n) => n,
            Err(e) => {
                log::debug!("Bulk read failed: {}", e);
                0
            }
        }
    }

    /// Write a message in max-packet-size chunks
    ///
    /// Every chunk is sent before returning. When the message length is an
    /// exact multiple of the max packet size a zero-length packet follows so
    /// the device sees the end of the message.
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let max_packet_size = self.out_max_packet_size().max(1);

        let mut written = 0;
        for chunk in data.chunks(max_packet_size) {
            let n = self.bulk_write(chunk, WRITE_TIMEOUT)?;
            if n != chunk.len() {
                log::error!("Short bulk write: {} of {} bytes", n, chunk.len());
                return Err(Error::Transport(format!(
                    "short bulk write: {} of {} bytes",
                    n,
                    chunk.len()
                )));
            }
            written += n;
        }

        if data.len() % max_packet_size == 0 {
            log::trace!("Sending zero-length packet after {} bytes", data.len());
            self.bulk_write(&[], WRITE_TIMEOUT)?;
        }

        Ok(written)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn out_max_packet_size(&self) -> usize {
        (**self).out_max_packet_size()
    }

    fn bulk_read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        (**self).bulk_read(buf, timeout)
    }

    fn bulk_write(&mut self, data: &[u8], timeout: Duration) -> Result<usize> {
        (**self).bulk_write(data, timeout)
    }

    fn submit_write(
        &mut self,
        data: &[u8],
        zero_packet: bool,
        timeout: Duration,
    ) -> Result<usize> {
        (**self).submit_write(data, zero_packet, timeout)
    }
}

/// Scripted in-memory transport for engine tests
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// Replays queued device messages and records everything the host sends
    #[derive(Debug)]
    pub(crate) struct MockTransport {
        /// Messages returned by successive bulk reads; an empty entry is a
        /// timeout
        pub reads: VecDeque<Vec<u8>>,
        /// Every bulk OUT transfer, including zero-length packets
        pub writes: Vec<Vec<u8>>,
        /// Every submitted request with its zero-packet flag
        pub submits: Vec<(Vec<u8>, bool)>,
        pub max_packet_size: usize,
    }

    impl MockTransport {
        pub fn new(max_packet_size: usize) -> Self {
            Self {
                reads: VecDeque::new(),
                writes: Vec::new(),
                submits: Vec::new(),
                max_packet_size,
            }
        }

        pub fn push_read(&mut self, data: impl Into<Vec<u8>>) {
            self.reads.push_back(data.into());
        }

        /// All bytes sent with `bulk_write`, concatenated
        pub fn written_bytes(&self) -> Vec<u8> {
            self.writes.concat()
        }

        /// Submitted requests that decode as text
        pub fn submitted_text(&self) -> Vec<String> {
            self.submits
                .iter()
                .filter_map(|(data, _)| String::from_utf8(data.clone()).ok())
                .collect()
        }
    }

    impl Transport for MockTransport {
        fn out_max_packet_size(&self) -> usize {
            self.max_packet_size
        }

        fn bulk_read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
            let Some(msg) = self.reads.pop_front() else {
                return Ok(0);
            };
            let len = msg.len().min(buf.len());
            buf[..len].copy_from_slice(&msg[..len]);
            Ok(len)
        }

        fn bulk_write(&mut self, data: &[u8], _timeout: Duration) -> Result<usize> {
            self.writes.push(data.to_vec());
            Ok(data.len())
        }

        fn submit_write(
            &mut self,
            data: &[u8],
            zero_packet: bool,
            _timeout: Duration,
        ) -> Result<usize> {
            self.submits.push((data.to_vec(), zero_packet));
            Ok(data.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn test_write_exact_multiple_appends_zlp() {
        let mut t = MockTransport::new(512);
        let data = vec![0xA5u8; 1024];

        assert_eq!(t.write(&data).unwrap(), 1024);
        assert_eq!(t.writes.len(), 3);
        assert_eq!(t.writes[0].len(), 512);
        assert_eq!(t.writes[1].len(), 512);
        assert!(t.writes[2].is_empty());
    }

    #[test]
    fn test_write_partial_packet_no_zlp() {
        let mut t = MockTransport::new(512);
        let data = vec![0u8; 700];

        assert_eq!(t.write(&data).unwrap(), 700);
        let lens: Vec<usize> = t.writes.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![512, 188]);
    }

    #[test]
    fn test_write_small_message() {
        let mut t = MockTransport::new(512);
        t.write(b"hello").unwrap();
        assert_eq!(t.writes, vec![b"hello".to_vec()]);
    }

    #[test]
    fn test_read_timeout_is_zero() {
        let mut t = MockTransport::new(512);
        let mut buf = [0u8; 16];
        assert_eq!(t.read(&mut buf, Duration::from_millis(10)), 0);

        t.push_read(vec![1, 2, 3]);
        assert_eq!(t.read(&mut buf, Duration::from_millis(10)), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }
}
