//! Cross-messenger abstractions: inbound events, outbound port and the
//! rate-limited gateway every send goes through.

pub mod gateway;
pub mod port;
pub mod types;
