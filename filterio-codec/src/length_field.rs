use bytes::{Buf, BufMut, BytesMut};
use log::trace;

use filterio::{Error, Filter};

/// Size of the frame header: marker, big-endian `u32` length, marker.
pub const HEADER_LENGTH: usize = 6;

const MARKER: u8 = 0x00;

/// Default largest payload accepted by [`LengthFieldFilter::default`].
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Length-prefixed binary framing.
///
/// ```text
///   +------+----------------------+------+----------------+
///   | 0x00 | payload length (u32) | 0x00 | payload ...    |
///   +------+----------------------+------+----------------+
/// ```
///
/// A header whose markers are not `0x00`, or whose length exceeds the configured maximum,
/// is a decode error. Zero-length payloads are valid frames.
pub struct LengthFieldFilter {
    max_frame_length: usize,
}

impl Default for LengthFieldFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LENGTH)
    }
}

impl LengthFieldFilter {
    /// Creates a filter that rejects payloads longer than `max_frame_length`.
    pub fn new(max_frame_length: usize) -> Self {
        Self { max_frame_length }
    }
}

impl Filter for LengthFieldFilter {
    type Inner = BytesMut;
    type Outer = BytesMut;

    fn name(&self) -> &str {
        "LengthFieldFilter"
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, Error> {
        if src.len() < HEADER_LENGTH {
            return Ok(None);
        }
        if src[0] != MARKER || src[5] != MARKER {
            trace!("bad frame header {:02x?}", &src[..HEADER_LENGTH]);
            let which = if src[0] != MARKER { "head" } else { "end" };
            return Err(Error::decode(
                self.name(),
                format!("missing length {} marker", which),
            ));
        }
        let length = u32::from_be_bytes([src[1], src[2], src[3], src[4]]) as usize;
        if length > self.max_frame_length {
            trace!(
                "rejecting {} byte frame, max {}",
                length, self.max_frame_length
            );
            return Err(Error::decode(
                self.name(),
                format!(
                    "frame length {} exceeds max {}",
                    length, self.max_frame_length
                ),
            ));
        }
        if src.len() < HEADER_LENGTH + length {
            return Ok(None);
        }

        src.advance(HEADER_LENGTH);
        Ok(Some(src.split_to(length)))
    }

    fn encode(&mut self, item: BytesMut) -> Result<BytesMut, Error> {
        if item.len() > self.max_frame_length {
            return Err(Error::encode(
                self.name(),
                format!(
                    "frame length {} exceeds max {}",
                    item.len(),
                    self.max_frame_length
                ),
            ));
        }
        let length = u32::try_from(item.len())
            .map_err(|_| Error::encode(self.name(), "frame length does not fit in u32"))?;

        let mut buf = BytesMut::with_capacity(HEADER_LENGTH + item.len());
        buf.put_u8(MARKER);
        buf.put_u32(length);
        buf.put_u8(MARKER);
        buf.put_slice(&item);
        Ok(buf)
    }
}
