use crate::packet::{self, HEADER};
use crate::{Result, StatusPacket, TransportError};
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

/// Reassembles status packets from a byte stream that may deliver them in
/// arbitrary chunks, with line noise in between.
#[derive(Debug, Default)]
pub struct StatusFramer {
    pending: Vec<u8>,
}

impl StatusFramer {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(256),
        }
    }

    /// Drop buffered bytes left over from an earlier exchange.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Read from `port` until one complete status packet is framed.
    ///
    /// A read that times out or returns no bytes ends the wait with
    /// [`TransportError::Timeout`]; bytes already received stay buffered.
    pub fn recv_status<R: Read + ?Sized>(
        &mut self,
        port: &mut R,
        timeout: Duration,
    ) -> Result<StatusPacket> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 128];
        loop {
            if let Some(frame) = self.next_frame() {
                return packet::decode_status(&frame);
            }
            if Instant::now() >= deadline {
                return Err(TransportError::Timeout);
            }
            match port.read(&mut buf) {
                Ok(0) => return Err(TransportError::Timeout),
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => return Err(TransportError::Timeout),
                Err(e) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }

    /// Like [`recv_status`](Self::recv_status), but the reply must come from `id`.
    pub fn recv_status_from<R: Read + ?Sized>(
        &mut self,
        port: &mut R,
        timeout: Duration,
        id: u8,
    ) -> Result<StatusPacket> {
        let status = self.recv_status(port, timeout)?;
        if status.id != id {
            return Err(TransportError::UnexpectedId {
                expected: id,
                actual: status.id,
            });
        }
        Ok(status)
    }

    /// Collect up to `expected` replies to a sync read. Replies that arrived
    /// before the first missing one are kept.
    pub fn recv_statuses<R: Read + ?Sized>(
        &mut self,
        port: &mut R,
        timeout: Duration,
        expected: usize,
    ) -> Result<Vec<StatusPacket>> {
        let mut out = Vec::with_capacity(expected);
        while out.len() < expected {
            match self.recv_status(port, timeout) {
                Ok(status) => out.push(status),
                Err(TransportError::Timeout) if !out.is_empty() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    fn next_frame(&mut self) -> Option<Vec<u8>> {
        match packet::find_header(&self.pending) {
            Some(start) => {
                self.pending.drain(..start);
            }
            None => {
                // Noise; only a header prefix at the tail can still matter.
                let keep = self.pending.len().min(HEADER.len() - 1);
                let cut = self.pending.len() - keep;
                self.pending.drain(..cut);
                return None;
            }
        }
        let total = packet::frame_len(&self.pending)?;
        if self.pending.len() < total {
            return None;
        }
        Some(self.pending.drain(..total).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{self, Cursor};

    const WAIT: Duration = Duration::from_secs(1);

    /// Hands out one queued chunk per read, then behaves like a port whose
    /// read timeout expired.
    struct Chunked(VecDeque<Vec<u8>>);

    impl Chunked {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self(chunks.into())
        }
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(io::Error::new(ErrorKind::TimedOut, "read timed out")),
            }
        }
    }

    fn position_reply(id: u8, value: u32) -> Vec<u8> {
        packet::status_packet(id, 0, &value.to_le_bytes())
    }

    #[test]
    fn test_noise_before_header_is_skipped() {
        let mut wire = vec![0x00, 0xFF, 0x13, 0xFF, 0xFF];
        wire.extend(position_reply(3, 2048));
        let mut framer = StatusFramer::new();
        let status = framer
            .recv_status_from(&mut Cursor::new(wire), WAIT, 3)
            .unwrap();
        assert_eq!(status.params, 2048u32.to_le_bytes().to_vec());
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_packet_split_across_reads() {
        let reply = position_reply(1, 1024);
        let (head, tail) = reply.split_at(6);
        let (middle, tail) = tail.split_at(3);
        let mut port = Chunked::new(vec![head.to_vec(), middle.to_vec(), tail.to_vec()]);
        let status = StatusFramer::new().recv_status(&mut port, WAIT).unwrap();
        assert_eq!(status.id, 1);
        assert_eq!(status.params, 1024u32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_header_split_after_noise() {
        let reply = position_reply(2, 7);
        let mut first = vec![0x42; 200];
        first.extend_from_slice(&reply[..2]);
        let mut port = Chunked::new(vec![
            first[..100].to_vec(),
            first[100..].to_vec(),
            reply[2..].to_vec(),
        ]);
        let status = StatusFramer::new().recv_status(&mut port, WAIT).unwrap();
        assert_eq!(status.id, 2);
    }

    #[test]
    fn test_back_to_back_replies_in_one_read() {
        let mut wire = position_reply(1, 10);
        wire.extend(position_reply(2, 20));
        let mut port = Chunked::new(vec![wire]);
        let replies = StatusFramer::new()
            .recv_statuses(&mut port, WAIT, 2)
            .unwrap();
        let ids: Vec<u8> = replies.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_partial_sync_read_keeps_early_replies() {
        // motor 3 never answers and motor 2's reply is cut short
        let mut wire = position_reply(1, 10);
        let second = position_reply(2, 20);
        wire.extend_from_slice(&second[..8]);
        let mut framer = StatusFramer::new();
        let replies = framer
            .recv_statuses(&mut Cursor::new(wire), WAIT, 3)
            .unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].id, 1);
        assert_eq!(framer.buffered(), 8);

        framer.clear();
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_silent_bus_times_out() {
        let mut port = Chunked::new(Vec::new());
        let err = StatusFramer::new()
            .recv_statuses(&mut port, WAIT, 2)
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_reply_from_wrong_motor() {
        let mut port = Cursor::new(position_reply(4, 0));
        let err = StatusFramer::new()
            .recv_status_from(&mut port, WAIT, 5)
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::UnexpectedId {
                expected: 5,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_corrupted_reply_reports_crc() {
        let mut reply = position_reply(1, 99);
        let last = reply.len() - 1;
        reply[last] ^= 0xFF;
        let err = StatusFramer::new()
            .recv_status(&mut Cursor::new(reply), WAIT)
            .unwrap_err();
        assert!(matches!(err, TransportError::Crc { .. }));
    }
}
