//! Waypoint - a minimal authoritative DNS server.
//!
//! This library exposes the wire codec, record table, resolver and UDP
//! transport for the binary, benchmarks and tests.

pub mod dns;
pub mod records;
pub mod resolver;
pub mod server;
pub mod stats;
pub mod transport;
