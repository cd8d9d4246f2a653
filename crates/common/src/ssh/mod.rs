//! SSH Module
//!
//! Remote command execution over the system ssh client.

pub mod connection;

pub use connection::*;
