//! Dynamixel Protocol 2.0 framing.
//!
//! Packet layout: `FF FF FD 00 | id | len_lo len_hi | instruction | params | crc_lo crc_hi`
//! where `len` counts the instruction byte, the (stuffed) parameters and the CRC.
//! Status packets use instruction `0x55` and carry the device error byte as
//! their first parameter.

use crate::{Instruction, Result, StatusPacket, TransportError, BROADCAST_ID};
use crc::{Crc, CRC_16_UMTS};

pub const HEADER: [u8; 4] = [0xFF, 0xFF, 0xFD, 0x00];

/// Polynomial 0x8005, init 0, no reflection.
const DXL_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_UMTS);

// header(4) + id + len(2) + instruction + crc(2)
const MIN_PACKET_LEN: usize = 10;

pub fn checksum(data: &[u8]) -> u16 {
    DXL_CRC.checksum(data)
}

/// Insert an extra `FD` after every `FF FF FD` sequence so the body can never
/// be mistaken for a header.
pub fn stuff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 4);
    for &b in body {
        out.push(b);
        if out.len() >= 3 && out[out.len() - 3..] == [0xFF, 0xFF, 0xFD] {
            out.push(0xFD);
        }
    }
    out
}

pub fn unstuff(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        out.push(body[i]);
        if out.len() >= 3
            && out[out.len() - 3..] == [0xFF, 0xFF, 0xFD]
            && body.get(i + 1) == Some(&0xFD)
        {
            i += 1;
        }
        i += 1;
    }
    out
}

/// Build a complete packet for `id` carrying `instruction` and `params`.
pub fn encode(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(params.len() + 1);
    body.push(instruction.code());
    body.extend_from_slice(params);
    let body = stuff(&body);

    let len = (body.len() + 2) as u16;
    let mut out = Vec::with_capacity(body.len() + 9);
    out.extend_from_slice(&HEADER);
    out.push(id);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&body);
    let crc = checksum(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

pub fn ping_packet(id: u8) -> Vec<u8> {
    encode(id, Instruction::Ping, &[])
}

pub fn read_packet(id: u8, address: u16, length: u16) -> Vec<u8> {
    let mut params = [0u8; 4];
    params[..2].copy_from_slice(&address.to_le_bytes());
    params[2..].copy_from_slice(&length.to_le_bytes());
    encode(id, Instruction::Read, &params)
}

pub fn write_packet(id: u8, address: u16, data: &[u8]) -> Vec<u8> {
    let mut params = Vec::with_capacity(data.len() + 2);
    params.extend_from_slice(&address.to_le_bytes());
    params.extend_from_slice(data);
    encode(id, Instruction::Write, &params)
}

pub fn sync_read_packet(address: u16, length: u16, ids: &[u8]) -> Vec<u8> {
    let mut params = Vec::with_capacity(ids.len() + 4);
    params.extend_from_slice(&address.to_le_bytes());
    params.extend_from_slice(&length.to_le_bytes());
    params.extend_from_slice(ids);
    encode(BROADCAST_ID, Instruction::SyncRead, &params)
}

/// Every parameter must carry exactly `length` data bytes.
pub fn sync_write_packet(address: u16, length: u16, params: &[(u8, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4 + params.len() * (length as usize + 1));
    out.extend_from_slice(&address.to_le_bytes());
    out.extend_from_slice(&length.to_le_bytes());
    for (id, data) in params {
        if data.len() != length as usize {
            return Err(TransportError::InvalidPacket("sync write data length"));
        }
        out.push(*id);
        out.extend_from_slice(data);
    }
    Ok(encode(BROADCAST_ID, Instruction::SyncWrite, &out))
}

pub fn status_packet(id: u8, error: u8, params: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(params.len() + 1);
    body.push(error);
    body.extend_from_slice(params);
    encode(id, Instruction::Status, &body)
}

/// Offset of the first header in `buf`, if any.
pub fn find_header(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER.len()).position(|w| w == HEADER)
}

/// Total length of the packet starting at `buf[0]`, once enough bytes are
/// available to know it.
pub fn frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < 7 || buf[..4] != HEADER {
        return None;
    }
    let len = u16::from_le_bytes([buf[5], buf[6]]) as usize;
    Some(7 + len)
}

/// A packet decoded from the wire, parameters already unstuffed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    pub id: u8,
    pub instruction: Instruction,
    pub params: Vec<u8>,
}

/// Decode one packet that starts at `buf[0]`. Trailing bytes are ignored.
pub fn decode(buf: &[u8]) -> Result<Packet> {
    if buf.len() < MIN_PACKET_LEN {
        return Err(TransportError::InvalidPacket("short packet"));
    }
    if buf[..4] != HEADER {
        return Err(TransportError::InvalidPacket("bad header"));
    }
    let total = frame_len(buf).ok_or(TransportError::InvalidPacket("bad header"))?;
    if total < MIN_PACKET_LEN {
        return Err(TransportError::InvalidPacket("bad length"));
    }
    if buf.len() < total {
        return Err(TransportError::InvalidPacket("truncated packet"));
    }
    let expected = checksum(&buf[..total - 2]);
    let actual = u16::from_le_bytes([buf[total - 2], buf[total - 1]]);
    if expected != actual {
        return Err(TransportError::Crc { expected, actual });
    }
    let instruction =
        Instruction::from_code(buf[7]).ok_or(TransportError::InvalidPacket("instruction"))?;
    Ok(Packet {
        id: buf[4],
        instruction,
        params: unstuff(&buf[8..total - 2]),
    })
}

pub fn decode_status(buf: &[u8]) -> Result<StatusPacket> {
    let packet = decode(buf)?;
    if packet.instruction != Instruction::Status {
        return Err(TransportError::InvalidPacket("not a status packet"));
    }
    let (error, params) = packet
        .params
        .split_first()
        .ok_or(TransportError::InvalidPacket("missing error byte"))?;
    Ok(StatusPacket {
        id: packet.id,
        error: *error,
        params: params.to_vec(),
    })
}

/// Split a buffer holding several back-to-back status packets.
pub fn decode_statuses(mut buf: &[u8]) -> Result<Vec<StatusPacket>> {
    let mut out = Vec::new();
    while let Some(start) = find_header(buf) {
        buf = &buf[start..];
        let total = frame_len(buf).ok_or(TransportError::InvalidPacket("bad header"))?;
        out.push(decode_status(buf)?);
        buf = buf.get(total..).unwrap_or(&[]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_status_vector() {
        let data = [
            0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x07, 0x00, 0x55, 0x00, 0x06, 0x04, 0x26,
        ];
        assert_eq!(checksum(&data), 0x5D65);
    }

    #[test]
    fn test_ping_packet_bytes() {
        assert_eq!(
            ping_packet(1),
            vec![0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x03, 0x00, 0x01, 0x19, 0x4E]
        );
    }

    #[test]
    fn test_read_present_position_bytes() {
        assert_eq!(
            read_packet(1, 132, 4),
            vec![0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x07, 0x00, 0x02, 0x84, 0x00, 0x04, 0x00, 0x1D, 0x15]
        );
    }

    #[test]
    fn test_sync_write_layout() {
        let params = vec![(1u8, vec![0x00, 0x04, 0x00, 0x00]), (2u8, vec![0x00, 0xFC, 0xFF, 0xFF])];
        let pkt = sync_write_packet(116, 4, &params).unwrap();
        assert_eq!(pkt[4], BROADCAST_ID);
        assert_eq!(pkt[7], 0x83);
        assert_eq!(&pkt[8..12], &[116, 0, 4, 0]);
        assert_eq!(&pkt[12..17], &[1, 0x00, 0x04, 0x00, 0x00]);
        assert_eq!(&pkt[17..22], &[2, 0x00, 0xFC, 0xFF, 0xFF]);
    }

    #[test]
    fn test_sync_write_rejects_wrong_width() {
        let params = vec![(1u8, vec![0x00, 0x04])];
        assert!(sync_write_packet(116, 4, &params).is_err());
    }

    #[test]
    fn test_stuffing_is_undone_on_decode() {
        let payload = [0x10, 0xFF, 0xFF, 0xFD, 0x22];
        let pkt = status_packet(3, 0, &payload);
        // one FD inserted
        assert_eq!(u16::from_le_bytes([pkt[5], pkt[6]]), 1 + 1 + 6 + 2);
        let status = decode_status(&pkt).unwrap();
        assert_eq!(status.params, payload.to_vec());
    }

    #[test]
    fn test_decode_rejects_bad_crc() {
        let mut pkt = status_packet(1, 0, &[0x06, 0x04, 0x26]);
        let last = pkt.len() - 1;
        pkt[last] ^= 0xFF;
        assert!(matches!(decode_status(&pkt), Err(TransportError::Crc { .. })));
    }

    #[test]
    fn test_decode_statuses_back_to_back() {
        let mut buf = vec![0x00, 0x13];
        buf.extend(status_packet(1, 0, &[1, 2, 3, 4]));
        buf.extend(status_packet(2, 0x80, &[5, 6, 7, 8]));
        let statuses = decode_statuses(&buf).unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].id, 1);
        assert!(statuses[1].hardware_alert());
        assert_eq!(statuses[1].params, vec![5, 6, 7, 8]);
    }
}
