//! WCS session handling
//!
//! The LCU serves one WCS connection at a time; frames are read, parsed and
//! acknowledged in arrival order.

mod connection;

pub use connection::serve;
