//! # filterio Codec - Reusable Filters for filterio
//!
//! `filterio-codec` provides ready-made [`Filter`](filterio::Filter) implementations for
//! building filter chains: stream framing and UTF-8 conversion.
//!
//! ## Features
//!
//! - **Line Framing**: split a byte stream on `\n`, `\r\n` or both
//! - **Length Framing**: `0x00 | u32 length | 0x00 | payload` binary frames
//! - **Strings**: UTF-8 encoding/decoding of whole frames
//!
//! ## Building a Chain with Codecs
//!
//! ```rust
//! use filterio::FilterChain;
//! use filterio_codec::{LineFramingFilter, StringFilter, TerminatorType};
//!
//! let mut chain = FilterChain::new()
//!     .with(LineFramingFilter::new(8192, true, TerminatorType::BOTH))
//!     .with(StringFilter::new());
//!
//! chain.feed(b"hel");
//! assert!(chain.decode().unwrap().is_none());
//! chain.feed(b"lo\r\n");
//! let line = chain.decode().unwrap().unwrap();
//! assert_eq!(*line.downcast::<String>().unwrap(), "hello");
//!
//! let wire = chain.encode(Box::new("bye".to_owned())).unwrap();
//! assert_eq!(&wire[..], b"bye\r\n");
//! ```

#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

/// Length-prefixed binary framing
pub mod length_field;

/// Line-delimited framing
pub mod line_framing;

/// UTF-8 string conversion
pub mod string_filter;

pub use length_field::LengthFieldFilter;
pub use line_framing::{LineFramingFilter, TerminatorType};
pub use string_filter::StringFilter;
