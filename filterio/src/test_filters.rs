use std::collections::VecDeque;

use bytes::{BufMut, BytesMut};

use crate::{Error, Filter};

/// Splits on `\n` and yields UTF-8 lines without the delimiter.
pub(crate) struct LineFilter;

impl Filter for LineFilter {
    type Inner = BytesMut;
    type Outer = String;

    fn name(&self) -> &str {
        "LineFilter"
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Error> {
        let Some(pos) = src.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let mut line = src.split_to(pos + 1);
        line.truncate(pos);
        String::from_utf8(line.to_vec())
            .map(Some)
            .map_err(|err| Error::decode(self.name(), err))
    }

    fn encode(&mut self, item: String) -> Result<BytesMut, Error> {
        let mut buf = BytesMut::with_capacity(item.len() + 1);
        buf.put_slice(item.as_bytes());
        buf.put_u8(b'\n');
        Ok(buf)
    }
}

/// Consumes everything buffered and appends `|tag` in both directions.
pub(crate) struct TagFilter {
    tag: String,
}

impl TagFilter {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
        }
    }
}

impl Filter for TagFilter {
    type Inner = BytesMut;
    type Outer = String;

    fn name(&self) -> &str {
        "TagFilter"
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Error> {
        if src.is_empty() {
            return Ok(None);
        }
        let raw = src.split();
        Ok(Some(format!(
            "{}|{}",
            String::from_utf8_lossy(&raw),
            self.tag
        )))
    }

    fn encode(&mut self, item: String) -> Result<BytesMut, Error> {
        Ok(BytesMut::from(format!("{}|{}", item, self.tag).as_bytes()))
    }
}

/// String to string variant of [`TagFilter`].
pub(crate) struct TagStringFilter {
    tag: String,
}

impl TagStringFilter {
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
        }
    }
}

impl Filter for TagStringFilter {
    type Inner = String;
    type Outer = String;

    fn name(&self) -> &str {
        "TagStringFilter"
    }

    fn decode(&mut self, src: &mut String) -> Result<Option<String>, Error> {
        if src.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("{}|{}", std::mem::take(src), self.tag)))
    }

    fn encode(&mut self, item: String) -> Result<String, Error> {
        Ok(format!("{}|{}", item, self.tag))
    }
}

/// Fails on any input containing `!`.
pub(crate) struct StrictFilter;

impl Filter for StrictFilter {
    type Inner = String;
    type Outer = String;

    fn name(&self) -> &str {
        "StrictFilter"
    }

    fn decode(&mut self, src: &mut String) -> Result<Option<String>, Error> {
        if src.contains('!') {
            return Err(Error::decode(self.name(), "bang"));
        }
        if src.is_empty() {
            return Ok(None);
        }
        Ok(Some(std::mem::take(src)))
    }

    fn encode(&mut self, item: String) -> Result<String, Error> {
        Ok(item)
    }
}

/// Splits everything buffered on `,` at once and hands the pieces out one per `decode`.
#[derive(Default)]
pub(crate) struct BatchFilter {
    ready: VecDeque<String>,
}

impl Filter for BatchFilter {
    type Inner = BytesMut;
    type Outer = String;

    fn name(&self) -> &str {
        "BatchFilter"
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Error> {
        if self.ready.is_empty() && !src.is_empty() {
            let raw = src.split();
            self.ready.extend(
                String::from_utf8_lossy(&raw)
                    .split(',')
                    .map(str::to_owned),
            );
        }
        Ok(self.ready.pop_front())
    }

    fn encode(&mut self, item: String) -> Result<BytesMut, Error> {
        Ok(BytesMut::from(item.as_bytes()))
    }
}
