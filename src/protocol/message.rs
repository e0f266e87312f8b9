//! Protocol message definitions
//!
//! Defines the notification request and the priority levels it carries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Notification priority, transported as a signed integer
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[repr(i8)]
pub enum Priority {
    Low = -2,
    Moderate = -1,
    #[default]
    Normal = 0,
    High = 1,
    Emergency = 2,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid priority: {0} (expected -2..=2)")]
pub struct InvalidPriority(pub i8);

impl Priority {
    pub fn as_i8(self) -> i8 {
        self as i8
    }
}

impl TryFrom<i8> for Priority {
    type Error = InvalidPriority;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -2 => Ok(Priority::Low),
            -1 => Ok(Priority::Moderate),
            0 => Ok(Priority::Normal),
            1 => Ok(Priority::High),
            2 => Ok(Priority::Emergency),
            other => Err(InvalidPriority(other)),
        }
    }
}

/// Pack priority and sticky into the notification flags field.
///
/// The low three bits of the priority land in bits 1..=3, bit 3 is forced on
/// for negative priorities and bit 0 carries the sticky flag.
pub fn pack_flags(priority: Priority, sticky: bool) -> u16 {
    let priority = priority.as_i8() as i16;
    let mut flags = (priority & 7) * 2;
    if priority < 0 {
        flags |= 8;
    }
    if sticky {
        flags |= 1;
    }
    flags as u16
}

/// A single notification event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Notification type name, must be one the daemon was registered with
    pub name: String,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    /// Ask the daemon not to auto-dismiss
    pub sticky: bool,
}

impl Notification {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            message: message.into(),
            priority: Priority::Normal,
            sticky: false,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }

    /// Flags field as sent on the wire
    pub fn flags(&self) -> u16 {
        pack_flags(self.priority, self.sticky)
    }
}
