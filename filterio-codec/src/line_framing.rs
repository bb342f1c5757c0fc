use bytes::{BufMut, BytesMut};
use log::trace;

use filterio::{Error, Filter};

/// Line terminators recognised by [`LineFramingFilter`].
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminatorType {
    /// Delimiter is either `\n` or `\r\n`; encodes with `\r\n`.
    #[default]
    BOTH,
    /// Delimiter is `\n` only.
    NEWLINE,
    /// Delimiter is `\r\n` only.
    CarriageNewline,
}

impl TerminatorType {
    fn as_bytes(&self) -> &'static [u8] {
        match self {
            TerminatorType::NEWLINE => b"\n",
            TerminatorType::BOTH | TerminatorType::CarriageNewline => b"\r\n",
        }
    }
}

/// Splits a byte stream into lines.
///
/// Inbound, each complete line becomes one `BytesMut` frame, with or without its
/// terminator. A line longer than `max_length` (terminator excluded) is a decode error.
/// Outbound, the configured terminator is appended to every frame.
pub struct LineFramingFilter {
    max_length: usize,
    strip_delimiter: bool,
    terminator_type: TerminatorType,
    /// Bytes already scanned for a terminator.
    offset: usize,
}

impl LineFramingFilter {
    /// Creates a new filter.
    pub fn new(max_length: usize, strip_delimiter: bool, terminator_type: TerminatorType) -> Self {
        Self {
            max_length,
            strip_delimiter,
            terminator_type,
            offset: 0,
        }
    }

    /// Returns `(line_end, delimiter_len)` of the first complete line in `buf`.
    fn find_line(&mut self, buf: &BytesMut) -> Option<(usize, usize)> {
        for i in self.offset..buf.len() {
            if buf[i] != b'\n' {
                continue;
            }
            let crlf = i > 0 && buf[i - 1] == b'\r';
            let found = match self.terminator_type {
                TerminatorType::NEWLINE => Some((i, 1)),
                TerminatorType::BOTH if crlf => Some((i - 1, 2)),
                TerminatorType::BOTH => Some((i, 1)),
                TerminatorType::CarriageNewline if crlf => Some((i - 1, 2)),
                // a bare `\n` is payload
                TerminatorType::CarriageNewline => None,
            };
            if found.is_some() {
                self.offset = 0;
                return found;
            }
        }
        self.offset = buf.len();
        None
    }
}

impl Filter for LineFramingFilter {
    type Inner = BytesMut;
    type Outer = BytesMut;

    fn name(&self) -> &str {
        "LineFramingFilter"
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, Error> {
        match self.find_line(src) {
            Some((line_end, delimiter_len)) => {
                if line_end > self.max_length {
                    trace!("rejecting {} byte line, max {}", line_end, self.max_length);
                    return Err(Error::decode(
                        self.name(),
                        format!(
                            "frame length {} exceeds max {}",
                            line_end, self.max_length
                        ),
                    ));
                }
                let mut frame = src.split_to(line_end + delimiter_len);
                if self.strip_delimiter {
                    frame.truncate(line_end);
                }
                Ok(Some(frame))
            }
            None => {
                if src.len() > self.max_length + 1 {
                    trace!("no line terminator in {} buffered bytes", src.len());
                    return Err(Error::decode(
                        self.name(),
                        format!(
                            "over {} bytes buffered without a line terminator",
                            self.max_length
                        ),
                    ));
                }
                Ok(None)
            }
        }
    }

    fn encode(&mut self, item: BytesMut) -> Result<BytesMut, Error> {
        let terminator = self.terminator_type.as_bytes();
        let mut buf = BytesMut::with_capacity(item.len() + terminator.len());
        buf.put_slice(&item);
        buf.put_slice(terminator);
        Ok(buf)
    }
}
