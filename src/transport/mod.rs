//! Transport to the LCU command port

pub mod tcp;

pub use tcp::{TcpConnector, DEFAULT_CONNECT_TIMEOUT};
