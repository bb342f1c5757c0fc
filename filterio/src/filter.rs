//! # Filter
//!
//! A [`Filter`] is one bidirectional transformation stage of a [`FilterChain`](crate::FilterChain).
//! Inbound it turns an accumulated `Inner` buffer into zero or one `Outer` object; outbound it
//! turns an `Outer` object back into `Inner`.
//!
//! The first filter of a chain sits next to the wire and takes `BytesMut` items. Each later
//! filter's `Inner` items must match the previous filter's `Outer`.
//!
//! ```text
//!   wire bytes ──► [Filter 1] ──► [Filter 2] ──► ... ──► [Filter N] ──► application object
//!   wire bytes ◄── [Filter 1] ◄── [Filter 2] ◄── ... ◄── [Filter N] ◄── application object
//! ```
//!
//! ## Example: a filter that upper-cases strings
//!
//! ```rust
//! use filterio::{Error, Filter};
//!
//! struct UpperCase;
//!
//! impl Filter for UpperCase {
//!     type Inner = String;
//!     type Outer = String;
//!
//!     fn name(&self) -> &str {
//!         "UpperCase"
//!     }
//!
//!     fn decode(&mut self, src: &mut String) -> Result<Option<String>, Error> {
//!         if src.is_empty() {
//!             return Ok(None);
//!         }
//!         Ok(Some(std::mem::take(src).to_uppercase()))
//!     }
//!
//!     fn encode(&mut self, item: String) -> Result<String, Error> {
//!         Ok(item)
//!     }
//! }
//! ```

use std::collections::VecDeque;

use bytes::BytesMut;

use crate::Error;
use crate::filter_internal::{FilterInternal, FilterStage};

/// An accumulating input buffer for a filter stage.
///
/// Every object the previous stage produces is pushed into the buffer as an [`Item`](Buffer::Item)
/// and stays there until [`Filter::decode`] consumes it, so partially delivered input
/// survives across reads. Byte and string buffers concatenate their items; queues keep
/// each item apart, which preserves the boundaries of empty frames.
pub trait Buffer: Default + Send + 'static {
    /// One object handed over by the previous stage, and what [`Filter::encode`] returns.
    type Item: Send + 'static;

    /// Adds `item` at the end of this buffer.
    fn push(&mut self, item: Self::Item);

    /// Returns true if nothing is buffered.
    fn is_empty(&self) -> bool;
}

impl Buffer for BytesMut {
    type Item = BytesMut;

    fn push(&mut self, item: BytesMut) {
        self.unsplit(item);
    }

    fn is_empty(&self) -> bool {
        BytesMut::is_empty(self)
    }
}

impl Buffer for String {
    type Item = String;

    fn push(&mut self, item: String) {
        self.push_str(&item);
    }

    fn is_empty(&self) -> bool {
        String::is_empty(self)
    }
}

impl<T: Send + 'static> Buffer for Vec<T> {
    type Item = T;

    fn push(&mut self, item: T) {
        Vec::push(self, item);
    }

    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

impl<T: Send + 'static> Buffer for VecDeque<T> {
    type Item = T;

    fn push(&mut self, item: T) {
        self.push_back(item);
    }

    fn is_empty(&self) -> bool {
        VecDeque::is_empty(self)
    }
}

/// One bidirectional transformation stage of a filter chain.
///
/// # Type Parameters
///
/// - `Inner`: wire-facing buffer, accumulated between calls to [`decode`](Filter::decode)
/// - `Outer`: application-facing type produced by `decode` and consumed by `encode`
///
/// A filter owns whatever state it needs privately. Each session builds its own
/// filter instances, so that state is never shared between connections.
pub trait Filter: Send + 'static {
    /// Wire-facing input type.
    type Inner: Buffer;

    /// Application-facing output type.
    type Outer: Send + 'static;

    /// Returns the filter's name.
    ///
    /// Used in error reports and by [`FilterChain::remove`](crate::FilterChain::remove).
    fn name(&self) -> &str;

    /// Decodes one object from the front of `src`.
    ///
    /// Called whenever the chain needs the next object, even when `src` is empty, so a
    /// filter may hand out objects it keeps privately. Returns `Ok(None)` when nothing
    /// complete is available; unconsumed input must be left in `src` for the next call.
    /// An error is terminal for the session.
    fn decode(&mut self, src: &mut Self::Inner) -> Result<Option<Self::Outer>, Error>;

    /// Encodes one outbound object.
    fn encode(&mut self, item: Self::Outer) -> Result<<Self::Inner as Buffer>::Item, Error>;

    #[doc(hidden)]
    fn generate(self) -> (String, Box<dyn FilterInternal>)
    where
        Self: Sized,
    {
        let name = self.name().to_owned();
        (name, Box::new(FilterStage::new(self)))
    }
}
