use thiserror::Error;

/// Errors that can occur while writing an event record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The destination does not have room for the whole record
    #[error("Event record of {needed} bytes does not fit in the {available} bytes left in the destination")]
    InsufficientCapacity { needed: usize, available: usize },

    /// The source address of a new session has a family that cannot be rendered
    #[error("Cannot encode source address of family {family}. Only IPv4 and IPv6 are supported")]
    UnsupportedAddressFamily { family: u16 },

    /// A string field is longer than its 4-byte length prefix can describe
    #[error("String field `{field}` of {len} bytes exceeds the 4-byte length prefix")]
    StringTooLong { field: &'static str, len: usize },
}

/// Errors that can occur while reading event records from queue bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The record kind is not one of the known kinds
    #[error("Unknown event kind {code} in event queue. The queue bytes are malformed or out of sync")]
    UnknownEventKind { code: u32 },

    /// The bytes end before the record does
    #[error("Event record truncated: needed {needed} more bytes but only {remaining} remain")]
    Truncated { needed: usize, remaining: usize },

    /// A string field does not hold valid UTF-8
    #[error("String field `{field}` is not valid UTF-8")]
    InvalidString { field: &'static str },
}
