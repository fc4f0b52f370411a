//! Checksummed record framing.
//!
//! Segment snapshots and backing-store rows share one layout:
//!
//! ```text
//! [record_len u32 LE][kind u8][payload ...][crc32 u32 LE]
//! ```
//!
//! `record_len` counts the whole frame including itself and the CRC. The
//! CRC covers everything before it.

use crate::error::{CoreError, CoreResult};

/// What a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Entity Store snapshot inside a segment.
    EntityStore = 1,
    /// Log Store snapshot inside a segment.
    LogStore = 2,
    /// One backing-store table row.
    Row = 3,
}

impl FrameKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::EntityStore),
            2 => Some(Self::LogStore),
            3 => Some(Self::Row),
            _ => None,
        }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind.
    pub kind: FrameKind,
    /// Frame payload.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Header size: record_len (4) + kind (1).
    const HEADER_SIZE: usize = 5;
    /// CRC size.
    const CRC_SIZE: usize = 4;

    /// Creates a frame.
    #[must_use]
    pub fn new(kind: FrameKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Encodes the frame to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Codec`] if the payload does not fit a `u32`
    /// length.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let record_len = self.encoded_size();
        let len = u32::try_from(record_len)
            .map_err(|_| CoreError::codec(format!("frame of {record_len} bytes is too large")))?;

        let mut buf = Vec::with_capacity(record_len);
        buf.extend_from_slice(&len.to_le_bytes());
        buf.push(self.kind as u8);
        buf.extend_from_slice(&self.payload);
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes one frame from the start of `data`, returning it with the
    /// number of bytes consumed.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidFormat`] for a short, truncated or unknown frame
    /// and [`CoreError::ChecksumMismatch`] when the CRC does not match.
    pub fn decode(data: &[u8]) -> CoreResult<(Self, usize)> {
        if data.len() < Self::HEADER_SIZE + Self::CRC_SIZE {
            return Err(CoreError::invalid_format("frame too short"));
        }

        let record_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if record_len < Self::HEADER_SIZE + Self::CRC_SIZE {
            return Err(CoreError::invalid_format("frame length below header size"));
        }
        if data.len() < record_len {
            return Err(CoreError::invalid_format("incomplete frame"));
        }

        let stored_crc = u32::from_le_bytes([
            data[record_len - 4],
            data[record_len - 3],
            data[record_len - 2],
            data[record_len - 1],
        ]);
        let computed_crc = compute_crc32(&data[..record_len - 4]);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let kind = FrameKind::from_byte(data[4])
            .ok_or_else(|| CoreError::invalid_format(format!("unknown frame kind {}", data[4])))?;
        let payload = data[Self::HEADER_SIZE..record_len - Self::CRC_SIZE].to_vec();

        Ok((Self { kind, payload }, record_len))
    }

    /// Returns the encoded size of this frame.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len() + Self::CRC_SIZE
    }
}

/// Decodes consecutive frames until the data ends or a frame is bad.
///
/// Returns the good frames and, when decoding stopped early, the error and
/// offset of the first bad frame. A torn tail therefore costs only the
/// frames after the last good one.
#[must_use]
pub fn decode_all(data: &[u8]) -> (Vec<Frame>, Option<(usize, CoreError)>) {
    let mut frames = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        match Frame::decode(&data[offset..]) {
            Ok((frame, used)) => {
                frames.push(frame);
                offset += used;
            }
            Err(err) => return (frames, Some((offset, err))),
        }
    }
    (frames, None)
}

/// Computes a CRC32 checksum (IEEE polynomial).
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn frame_encode_decode() {
        let frame = Frame::new(FrameKind::Row, b"payload".to_vec());
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes.len(), frame.encoded_size());

        let (decoded, used) = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(used, bytes.len());
    }

    #[test]
    fn flipped_byte_is_detected() {
        let mut bytes = Frame::new(FrameKind::LogStore, vec![1, 2, 3])
            .encode()
            .unwrap();
        bytes[6] ^= 0xff;
        assert!(matches!(
            Frame::decode(&bytes),
            Err(CoreError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn torn_tail_keeps_good_prefix() {
        let mut data = Frame::new(FrameKind::Row, b"one".to_vec()).encode().unwrap();
        let first_len = data.len();
        data.extend(Frame::new(FrameKind::Row, b"two".to_vec()).encode().unwrap());
        let second = Frame::new(FrameKind::Row, b"three".to_vec()).encode().unwrap();
        data.extend_from_slice(&second[..second.len() - 2]);

        let (frames, stop) = decode_all(&data);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].payload, b"two");
        let (offset, _) = stop.unwrap();
        assert_eq!(offset, first_len * 2);
    }

    #[test]
    fn short_and_zero_length_frames_are_rejected() {
        assert!(Frame::decode(&[1, 2, 3]).is_err());
        assert!(Frame::decode(&[0u8; 12]).is_err());
    }
}
