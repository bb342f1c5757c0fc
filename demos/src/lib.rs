//! # filterio Demos
//!
//! This crate contains runnable examples demonstrating how to use the filterio crates.
//!
//! ## Running Examples
//!
//! Start the echo server:
//!
//! ```bash
//! cargo run --example echo_server_tcp -- --debug
//! ```
//!
//! Then talk to it with the echo client (or `nc 127.0.0.1 8080`):
//!
//! ```bash
//! cargo run --example echo_client_tcp -- --debug
//! ```

#![warn(rust_2018_idioms)]

// Helper modules that examples can use
pub mod helpers;
