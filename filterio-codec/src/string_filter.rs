use std::collections::VecDeque;

use bytes::BytesMut;
use log::trace;

use filterio::{Error, Filter};

/// Converts frames to UTF-8 strings and back.
///
/// Every frame delivered by the previous stage becomes exactly one `String`, empty frames
/// included, so this filter belongs after a framing filter. Invalid UTF-8 is a decode error.
#[derive(Default)]
pub struct StringFilter;

impl StringFilter {
    /// Creates a new filter.
    pub fn new() -> Self {
        StringFilter
    }
}

impl Filter for StringFilter {
    type Inner = VecDeque<BytesMut>;
    type Outer = String;

    fn name(&self) -> &str {
        "StringFilter"
    }

    fn decode(&mut self, src: &mut VecDeque<BytesMut>) -> Result<Option<String>, Error> {
        let Some(frame) = src.pop_front() else {
            return Ok(None);
        };
        String::from_utf8(frame.to_vec()).map(Some).map_err(|err| {
            trace!("rejecting {} byte frame: {}", frame.len(), err);
            Error::decode(self.name(), err)
        })
    }

    fn encode(&mut self, item: String) -> Result<BytesMut, Error> {
        Ok(BytesMut::from(item.as_bytes()))
    }
}
