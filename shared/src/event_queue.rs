use thiserror::Error;

use crate::events::{EncodeError, Encoder, Event};

/// Errors that can occur while building or appending to an EventQueue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventQueueError {
    /// A queue must be able to hold at least one byte
    #[error("Event queue capacity must be greater than zero")]
    InvalidCapacity,

    /// The queue buffer could not be allocated
    #[error("Failed to allocate event queue of {capacity} bytes")]
    AllocationFailed { capacity: usize },

    /// The record does not fit in what is left of the queue
    #[error("Event queue overflow: record of {needed} bytes does not fit, {remaining} of {capacity} bytes remain. Increase the queue capacity")]
    Overflow {
        needed: usize,
        remaining: usize,
        capacity: usize,
    },

    /// The record itself could not be produced
    #[error("Failed to encode event: {0}")]
    Encode(#[from] EncodeError),

    /// The consumer tried to move its read offset past the written bytes
    #[error("Cannot advance read offset by {requested} bytes, only {available} unread bytes exist")]
    ReadPastEnd { requested: usize, available: usize },
}

/// Bounded append-only buffer of encoded event records. One producer appends
/// while the loop runs, one consumer reads between runs. Offsets only move
/// back to zero through `reset`.
pub struct EventQueue {
    buf: Box<[u8]>,
    write_offset: usize,
    read_offset: usize,
    encoder: Encoder,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Result<Self, EventQueueError> {
        if capacity == 0 {
            return Err(EventQueueError::InvalidCapacity);
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| EventQueueError::AllocationFailed { capacity })?;
        buf.resize(capacity, 0);

        Ok(Self {
            buf: buf.into_boxed_slice(),
            write_offset: 0,
            read_offset: 0,
            encoder: Encoder::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Write offset, the number of bytes appended since the last reset
    pub fn offset(&self) -> usize {
        self.write_offset
    }

    pub fn read_offset(&self) -> usize {
        self.read_offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.write_offset
    }

    pub fn is_empty(&self) -> bool {
        self.write_offset == 0
    }

    /// Encodes `event` at the write offset. Fails closed: on overflow or
    /// encode failure the write offset does not move.
    pub fn append(&mut self, event: &Event) -> Result<usize, EventQueueError> {
        let needed = event.encoded_len();
        if needed > self.remaining() {
            return Err(self.overflow(needed));
        }

        let written = self
            .encoder
            .write(event, &mut self.buf[self.write_offset..])?;
        self.write_offset += written;
        Ok(written)
    }

    /// Every byte appended since the last reset
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.write_offset]
    }

    /// Bytes the consumer has not read yet
    pub fn unread(&self) -> &[u8] {
        &self.buf[self.read_offset..self.write_offset]
    }

    pub fn advance_read(&mut self, count: usize) -> Result<(), EventQueueError> {
        let available = self.write_offset - self.read_offset;
        if count > available {
            return Err(EventQueueError::ReadPastEnd {
                requested: count,
                available,
            });
        }
        self.read_offset += count;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.write_offset = 0;
        self.read_offset = 0;
    }

    fn overflow(&self, needed: usize) -> EventQueueError {
        EventQueueError::Overflow {
            needed,
            remaining: self.remaining(),
            capacity: self.capacity(),
        }
    }
}
