use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use log::trace;

use crate::filter::Filter;
use crate::filter_internal::FilterInternal;
use crate::{Error, Message};

/// Builds a fresh [`FilterChain`] for every new session.
///
/// Servers and clients call the factory once per connection, so filters with private
/// buffering state are never shared between sessions.
pub type FilterChainFactory = Arc<dyn Fn() -> FilterChain + Send + Sync>;

/// An ordered list of [`Filter`]s applied end to end on inbound and outbound data.
///
/// Decoding feeds raw bytes to the first filter and hands each object it produces to the
/// next one. Encoding runs the mirror path, from the last filter back to the first. A chain
/// with no filters is the identity transform.
///
/// # Examples
///
/// ```rust
/// use bytes::BytesMut;
/// use filterio::FilterChain;
///
/// let mut chain = FilterChain::new();
/// chain.feed(b"ping");
/// let msg = chain.decode().unwrap().unwrap();
/// assert_eq!(&msg.downcast::<BytesMut>().unwrap()[..], b"ping");
/// ```
pub struct FilterChain {
    names: Vec<String>,
    filters: Vec<Box<dyn FilterInternal>>,
    /// Raw bytes received but not yet handed to the first filter.
    accumulator: BytesMut,
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self {
            names: vec![],
            filters: vec![],
            accumulator: BytesMut::new(),
        }
    }

    /// Appends `filter` and returns the chain, for building chains in factories.
    pub fn with(mut self, filter: impl Filter) -> Self {
        self.add_last(filter);
        self
    }

    /// Appends a filter at the application-facing end.
    pub fn add_last(&mut self, filter: impl Filter) -> &mut Self {
        let (name, filter) = filter.generate();
        self.names.push(name);
        self.filters.push(filter);
        self
    }

    /// Inserts a filter at the wire-facing end.
    pub fn add_first(&mut self, filter: impl Filter) -> &mut Self {
        let (name, filter) = filter.generate();
        self.names.insert(0, name);
        self.filters.insert(0, filter);
        self
    }

    /// Removes every filter named `name`.
    pub fn remove(&mut self, name: &str) -> Result<(), Error> {
        let before = self.names.len();
        let mut index = 0;
        while index < self.names.len() {
            if self.names[index] == name {
                self.names.remove(index);
                self.filters.remove(index);
            } else {
                index += 1;
            }
        }

        if self.names.len() == before {
            Err(Error::FilterNotFound(name.to_owned()))
        } else {
            Ok(())
        }
    }

    /// Removes the wire-facing filter, returning its name.
    pub fn remove_first(&mut self) -> Option<String> {
        if self.names.is_empty() {
            return None;
        }
        self.filters.remove(0);
        Some(self.names.remove(0))
    }

    /// Removes the application-facing filter, returning its name.
    pub fn remove_last(&mut self) -> Option<String> {
        self.filters.pop();
        self.names.pop()
    }

    /// Returns the number of filters.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the chain has no filters.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Filter names, wire-facing first.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Appends raw bytes received from the wire.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.accumulator.extend_from_slice(bytes);
    }

    /// Returns true while any stage holds input it has not turned into an object yet.
    pub fn has_buffered(&self) -> bool {
        !self.accumulator.is_empty() || self.filters.iter().any(|f| f.buffered_internal())
    }

    /// Removes every filter and drops all buffered input.
    pub fn clear(&mut self) {
        self.accumulator.clear();
        self.filters.clear();
        self.names.clear();
    }

    /// Decodes the next application object.
    ///
    /// Returns `Ok(None)` when more data is needed; everything received so far stays
    /// buffered. Call repeatedly after each [`feed`](Self::feed) until it returns `None`.
    pub fn decode(&mut self) -> Result<Option<Message>, Error> {
        self.pull(self.filters.len())
    }

    /// Encodes an application object into wire bytes, last filter first.
    pub fn encode(&mut self, msg: Message) -> Result<Bytes, Error> {
        let mut msg = msg;
        for filter in self.filters.iter_mut().rev() {
            msg = filter.encode_internal(msg)?;
        }
        let bytes = into_wire(msg)?;
        trace!("filter chain encoded {} bytes", bytes.len());
        Ok(bytes)
    }

    /// Pulls one object out of the first `depth` stages.
    fn pull(&mut self, depth: usize) -> Result<Option<Message>, Error> {
        if depth == 0 {
            if self.accumulator.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Box::new(self.accumulator.split())));
        }

        let index = depth - 1;
        loop {
            if let Some(msg) = self.filters[index].decode_internal()? {
                return Ok(Some(msg));
            }
            match self.pull(index)? {
                Some(msg) => self.filters[index].feed_internal(msg)?,
                None => return Ok(None),
            }
        }
    }
}

fn into_wire(msg: Message) -> Result<Bytes, Error> {
    let msg = match msg.downcast::<BytesMut>() {
        Ok(bytes) => return Ok(bytes.freeze()),
        Err(msg) => msg,
    };
    let msg = match msg.downcast::<Bytes>() {
        Ok(bytes) => return Ok(*bytes),
        Err(msg) => msg,
    };
    let msg = match msg.downcast::<Vec<u8>>() {
        Ok(bytes) => return Ok(Bytes::from(*bytes)),
        Err(msg) => msg,
    };
    let msg = match msg.downcast::<String>() {
        Ok(s) => return Ok(Bytes::from(*s)),
        Err(msg) => msg,
    };
    match msg.downcast::<&'static str>() {
        Ok(s) => Ok(Bytes::from_static(s.as_bytes())),
        Err(_) => Err(Error::encode(
            "FilterChain",
            "outbound message did not end as bytes",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_filters::{BatchFilter, LineFilter, TagFilter, TagStringFilter};

    fn tagged_chain() -> FilterChain {
        FilterChain::new()
            .with(TagFilter::new("A"))
            .with(TagStringFilter::new("B"))
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let mut chain = FilterChain::new();
        chain.feed(b"abc");
        chain.feed(b"def");
        let msg = chain.decode().unwrap().unwrap();
        assert_eq!(&msg.downcast::<BytesMut>().unwrap()[..], b"abcdef");
        assert!(chain.decode().unwrap().is_none());

        let wire = chain.encode(Box::new(BytesMut::from("xyz"))).unwrap();
        assert_eq!(&wire[..], b"xyz");
    }

    #[test]
    fn test_empty_chain_with_nothing_fed() {
        let mut chain = FilterChain::new();
        assert!(chain.decode().unwrap().is_none());
        assert!(!chain.has_buffered());
    }

    #[test]
    fn test_decode_runs_first_to_last() {
        let mut chain = tagged_chain();
        chain.feed(b"x");
        let msg = chain.decode().unwrap().unwrap();
        assert_eq!(*msg.downcast::<String>().unwrap(), "x|A|B");
    }

    #[test]
    fn test_encode_runs_last_to_first() {
        let mut chain = tagged_chain();
        let wire = chain.encode(Box::new("y".to_owned())).unwrap();
        assert_eq!(&wire[..], b"y|B|A");
    }

    #[test]
    fn test_partial_input_is_retained() {
        let mut chain = FilterChain::new().with(LineFilter);
        chain.feed(b"hel");
        assert!(chain.decode().unwrap().is_none());
        assert!(chain.has_buffered());

        chain.feed(b"lo\nwor");
        let msg = chain.decode().unwrap().unwrap();
        assert_eq!(*msg.downcast::<String>().unwrap(), "hello");
        assert!(chain.decode().unwrap().is_none());

        chain.feed(b"ld\n");
        let msg = chain.decode().unwrap().unwrap();
        assert_eq!(*msg.downcast::<String>().unwrap(), "world");
        assert!(!chain.has_buffered());
    }

    #[test]
    fn test_one_read_yields_many_objects() {
        let mut chain = FilterChain::new().with(LineFilter);
        chain.feed(b"a\nb\nc\n");
        let mut out = vec![];
        while let Some(msg) = chain.decode().unwrap() {
            out.push(*msg.downcast::<String>().unwrap());
        }
        assert_eq!(out, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_privately_buffered_objects_are_drained() {
        let mut chain = FilterChain::new()
            .with(BatchFilter::default())
            .with(TagStringFilter::new("B"));
        chain.feed(b"a,b,c");
        let mut out = vec![];
        while let Some(msg) = chain.decode().unwrap() {
            out.push(*msg.downcast::<String>().unwrap());
        }
        assert_eq!(out, vec!["a|B", "b|B", "c|B"]);
        assert!(!chain.has_buffered());
    }

    #[test]
    fn test_mismatched_stages_fail_decode() {
        // LineFilter yields String, TagFilter expects BytesMut.
        let mut chain = FilterChain::new().with(LineFilter).with(TagFilter::new("A"));
        chain.feed(b"x\n");
        let err = chain.decode().unwrap_err();
        assert!(matches!(err, Error::Decode { ref filter, .. } if filter == "TagFilter"));
    }

    #[test]
    fn test_wrong_outbound_type_fails_encode() {
        let mut chain = tagged_chain();
        let err = chain.encode(Box::new(42u32)).unwrap_err();
        assert!(matches!(err, Error::Encode { ref filter, .. } if filter == "TagStringFilter"));

        let mut empty = FilterChain::new();
        let err = empty.encode(Box::new(42u32)).unwrap_err();
        assert!(matches!(err, Error::Encode { .. }));
    }

    #[test]
    fn test_add_and_remove() {
        let mut chain = FilterChain::new();
        chain.add_last(TagStringFilter::new("B"));
        chain.add_first(TagFilter::new("A"));
        assert_eq!(chain.names(), &["TagFilter", "TagStringFilter"]);
        assert_eq!(chain.len(), 2);

        assert!(matches!(
            chain.remove("Nope"),
            Err(Error::FilterNotFound(name)) if name == "Nope"
        ));
        chain.remove("TagFilter").unwrap();
        assert_eq!(chain.names(), &["TagStringFilter"]);

        assert_eq!(chain.remove_last().as_deref(), Some("TagStringFilter"));
        assert!(chain.is_empty());
        assert!(chain.remove_first().is_none());
        assert!(chain.remove_last().is_none());
    }

    #[test]
    fn test_remove_first() {
        let mut chain = tagged_chain();
        assert_eq!(chain.remove_first().as_deref(), Some("TagFilter"));
        assert_eq!(chain.names(), &["TagStringFilter"]);
    }

    #[test]
    fn test_clear_drops_buffered_input() {
        let mut chain = FilterChain::new().with(LineFilter);
        chain.feed(b"partial");
        assert!(chain.decode().unwrap().is_none());
        chain.clear();
        assert!(!chain.has_buffered());
        assert!(chain.is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn decode_all(chain: &mut FilterChain) -> Vec<String> {
            let mut out = vec![];
            while let Some(msg) = chain.decode().unwrap() {
                out.push(*msg.downcast::<String>().unwrap());
            }
            out
        }

        proptest! {
            #[test]
            fn fragmentation_does_not_change_output(
                lines in proptest::collection::vec("[a-z]{0,12}", 1..8),
                cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..6),
            ) {
                let wire: Vec<u8> = lines.iter().flat_map(|l| format!("{l}\n").into_bytes()).collect();

                let mut whole = FilterChain::new().with(LineFilter);
                whole.feed(&wire);
                let expected = decode_all(&mut whole);
                prop_assert_eq!(&expected, &lines);

                let mut points: Vec<usize> = cuts.iter().map(|i| i.index(wire.len() + 1)).collect();
                points.push(0);
                points.push(wire.len());
                points.sort_unstable();

                let mut chunked = FilterChain::new().with(LineFilter);
                let mut got = vec![];
                for pair in points.windows(2) {
                    chunked.feed(&wire[pair[0]..pair[1]]);
                    got.extend(decode_all(&mut chunked));
                }
                prop_assert_eq!(got, expected);
            }

            #[test]
            fn encode_then_decode_is_identity(line in "[a-zA-Z0-9 ]{0,40}") {
                let mut chain = FilterChain::new().with(LineFilter);
                let wire = chain.encode(Box::new(line.clone())).unwrap();
                chain.feed(&wire);
                let msg = chain.decode().unwrap().unwrap();
                prop_assert_eq!(*msg.downcast::<String>().unwrap(), line);
            }
        }
    }
}
