use xbridge_shared::{MemoryKey, MsgId, PoolId};

/// One slot of a MsgPool: an input half and an output half of the pool's
/// region. Not clonable, so exactly one owner holds a slot at any time: the
/// pool's free list, the consumer, or the transport while the Msg is in
/// flight.
#[derive(Debug, PartialEq, Eq)]
pub struct Msg {
    id: MsgId,
    in_offset: usize,
    in_size: usize,
    out_offset: usize,
    out_size: usize,
    in_len: usize,
    out_len: usize,
    key: MemoryKey,
}

impl Msg {
    pub(crate) fn new(
        id: MsgId,
        in_offset: usize,
        in_size: usize,
        out_size: usize,
        key: MemoryKey,
    ) -> Self {
        Self {
            id,
            in_offset,
            in_size,
            out_offset: in_offset + in_size,
            out_size,
            in_len: in_size,
            out_len: out_size,
            key,
        }
    }

    pub fn id(&self) -> MsgId {
        self.id
    }

    pub fn pool(&self) -> PoolId {
        self.id.pool()
    }

    pub fn key(&self) -> MemoryKey {
        self.key
    }

    pub fn in_capacity(&self) -> usize {
        self.in_size
    }

    pub fn out_capacity(&self) -> usize {
        self.out_size
    }

    /// Declared length of the input half
    pub fn in_len(&self) -> usize {
        self.in_len
    }

    /// Declared length of the output half
    pub fn out_len(&self) -> usize {
        self.out_len
    }

    /// Declares how much of the output half is to be sent. Returns false when
    /// `len` exceeds the output capacity.
    pub(crate) fn set_out_len(&mut self, len: usize) -> bool {
        if len > self.out_size {
            return false;
        }
        self.out_len = len;
        true
    }

    pub(crate) fn set_in_len(&mut self, len: usize) {
        self.in_len = len.min(self.in_size);
    }

    /// Makes the whole input half available for an incoming reply
    pub(crate) fn reset_in_len(&mut self) {
        self.in_len = self.in_size;
    }

    pub(crate) fn reset(&mut self) {
        self.in_len = self.in_size;
        self.out_len = self.out_size;
    }

    pub(crate) fn in_range(&self) -> std::ops::Range<usize> {
        self.in_offset..self.in_offset + self.in_len
    }

    pub(crate) fn in_capacity_range(&self) -> std::ops::Range<usize> {
        self.in_offset..self.in_offset + self.in_size
    }

    pub(crate) fn out_range(&self) -> std::ops::Range<usize> {
        self.out_offset..self.out_offset + self.out_len
    }

    pub(crate) fn out_capacity_range(&self) -> std::ops::Range<usize> {
        self.out_offset..self.out_offset + self.out_size
    }
}
