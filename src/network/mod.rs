//! Network module - Delivers packets to Growl daemons
//!
//! Provides:
//! - Transports that put a packet on the wire (UDP) or record it
//! - A connection per daemon that tracks registration state
//! - A hub that fans notifications out to named daemons

mod connection;
mod hub;
mod transport;

pub use connection::*;
pub use hub::*;
pub use transport::*;
