//! Protocol codec for encoding requests
//!
//! Builds registration and notification datagrams byte for byte, including
//! the trailing checksum. There is no decode path.

use bytes::{BufMut, Bytes, BytesMut};
use md5::{Digest, Md5};
use thiserror::Error;

use super::{Notification, CHECKSUM_LEN, PROTOCOL_VERSION, TYPE_NOTIFICATION, TYPE_REGISTRATION};

/// Largest payload a single IPv4 UDP datagram can carry
pub const MAX_PACKET_SIZE: usize = 65_507;

/// Maximum number of notification types in one registration
pub const MAX_NOTIFICATION_TYPES: usize = u8::MAX as usize;

/// Registration header: version(1) + type(1) + app name length(2) + count(1) + defaults(1)
const REGISTRATION_HEADER_SIZE: usize = 6;

/// Notification header: version(1) + type(1) + flags(2) + 4 lengths(8)
const NOTIFICATION_HEADER_SIZE: usize = 12;

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("{field} is too long: {len} bytes (max: {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Too many notification types: {0} (max: {max})", max = MAX_NOTIFICATION_TYPES)]
    TooManyNotifications(usize),

    #[error("Packet too large: {0} bytes (max: {1})")]
    PacketTooLarge(usize, usize),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Length of a text field as written into its u16 prefix
fn field_len(field: &'static str, value: &str) -> CodecResult<u16> {
    u16::try_from(value.len()).map_err(|_| CodecError::FieldTooLong {
        field,
        len: value.len(),
        max: u16::MAX as usize,
    })
}

/// MD5 over the packet so far followed by the password
pub fn checksum(packet: &[u8], password: &str) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Md5::new();
    hasher.update(packet);
    hasher.update(password.as_bytes());

    let mut digest = [0u8; CHECKSUM_LEN];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Append the checksum and enforce the datagram size limit
fn finish(mut buf: BytesMut, password: &str) -> CodecResult<Bytes> {
    let total = buf.len() + CHECKSUM_LEN;
    if total > MAX_PACKET_SIZE {
        return Err(CodecError::PacketTooLarge(total, MAX_PACKET_SIZE));
    }

    let digest = checksum(&buf, password);
    buf.put_slice(&digest);
    Ok(buf.freeze())
}

/// Encode a registration packet announcing every notification type.
///
/// Registration replaces whatever the daemon knew before, so the whole
/// roster goes out each time. Every type is marked enabled by default.
pub fn encode_registration<S: AsRef<str>>(
    app_name: &str,
    notification_types: &[S],
    password: &str,
) -> CodecResult<Bytes> {
    let count = notification_types.len();
    if count > MAX_NOTIFICATION_TYPES {
        return Err(CodecError::TooManyNotifications(count));
    }
    let app_name_len = field_len("application name", app_name)?;

    let body: usize = notification_types
        .iter()
        .map(|t| 2 + t.as_ref().len())
        .sum();
    let mut buf = BytesMut::with_capacity(
        REGISTRATION_HEADER_SIZE + app_name.len() + body + count + CHECKSUM_LEN,
    );

    // Header
    buf.put_u8(PROTOCOL_VERSION);
    buf.put_u8(TYPE_REGISTRATION);
    buf.put_u16(app_name_len);
    buf.put_u8(count as u8);
    buf.put_u8(count as u8);
    buf.put_slice(app_name.as_bytes());

    for notification_type in notification_types {
        let name = notification_type.as_ref();
        buf.put_u16(field_len("notification type", name)?);
        buf.put_slice(name.as_bytes());
    }

    // Default-enabled list, by roster position
    for index in 0..count {
        buf.put_u8(index as u8);
    }

    finish(buf, password)
}

/// Encode a notification packet
pub fn encode_notify(
    notification: &Notification,
    app_name: &str,
    password: &str,
) -> CodecResult<Bytes> {
    let name_len = field_len("notification name", &notification.name)?;
    let title_len = field_len("title", &notification.title)?;
    let message_len = field_len("message", &notification.message)?;
    let app_name_len = field_len("application name", app_name)?;

    let mut buf = BytesMut::with_capacity(
        NOTIFICATION_HEADER_SIZE
            + notification.name.len()
            + notification.title.len()
            + notification.message.len()
            + app_name.len()
            + CHECKSUM_LEN,
    );

    // Header
    buf.put_u8(PROTOCOL_VERSION);
    buf.put_u8(TYPE_NOTIFICATION);
    buf.put_u16(notification.flags());
    buf.put_u16(name_len);
    buf.put_u16(title_len);
    buf.put_u16(message_len);
    buf.put_u16(app_name_len);

    // Payload
    buf.put_slice(notification.name.as_bytes());
    buf.put_slice(notification.title.as_bytes());
    buf.put_slice(notification.message.as_bytes());
    buf.put_slice(app_name.as_bytes());

    finish(buf, password)
}
