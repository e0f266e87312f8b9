//! Protocol module - Defines the Growl Network Transport wire format
//!
//! The protocol is a single UDP datagram per request:
//! - 1 byte protocol version
//! - 1 byte packet type (registration or notification)
//! - Fixed big-endian header fields, then variable length UTF-8 sections
//! - 16 byte MD5 checksum over everything before it plus the password

mod message;
mod codec;

pub use message::*;
pub use codec::*;

/// Protocol version carried in the first byte of every packet
pub const PROTOCOL_VERSION: u8 = 1;

/// Packet type of a registration request
pub const TYPE_REGISTRATION: u8 = 0;

/// Packet type of a notification request
pub const TYPE_NOTIFICATION: u8 = 1;

/// Default UDP port of a Growl daemon
pub const DEFAULT_PORT: u16 = 9887;

/// Length of the trailing checksum in bytes
pub const CHECKSUM_LEN: usize = 16;
