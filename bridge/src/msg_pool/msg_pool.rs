use std::sync::Arc;

use log::{debug, warn};

use xbridge_shared::{MsgId, OutgoingMsg, PoolId, Transport};

use crate::config::MsgPoolConfig;

use super::{
    memory::{AllocationStrategy, PoolMemory},
    Msg, MsgPoolError,
};

/// Fixed set of Msg slots carved out of one registered region. Slot `i`
/// starts at `i * (in_size + out_size)`, its input half first.
pub struct MsgPool {
    id: PoolId,
    config: MsgPoolConfig,
    memory: Option<PoolMemory>,
    free_list: Vec<Msg>,
    in_pool: Vec<bool>,
    transport: Arc<dyn Transport>,
}

impl MsgPool {
    pub fn new(
        transport: Arc<dyn Transport>,
        id: PoolId,
        config: MsgPoolConfig,
    ) -> Result<Self, MsgPoolError> {
        let len = config.region_len()?;
        let memory = PoolMemory::allocate(&*transport, len)?;

        let mut free_list = Vec::new();
        let mut in_pool = Vec::new();
        if free_list.try_reserve_exact(config.msg_num).is_err()
            || in_pool.try_reserve_exact(config.msg_num).is_err()
        {
            memory.release(&*transport);
            return Err(MsgPoolError::AllocationFailed { len });
        }

        let key = memory.key();
        let stride = config.in_size + config.out_size;
        // pushed in reverse so the lowest slot is handed out first
        for index in (0..config.msg_num).rev() {
            let msg_id = MsgId::new(id, index as u32);
            free_list.push(Msg::new(
                msg_id,
                index * stride,
                config.in_size,
                config.out_size,
                key,
            ));
        }
        in_pool.resize(config.msg_num, true);

        debug!(
            "created Msg pool {:?}: {} msgs of {} + {} bytes ({:?})",
            id,
            config.msg_num,
            config.in_size,
            config.out_size,
            memory.strategy()
        );

        Ok(Self {
            id,
            config,
            memory: Some(memory),
            free_list,
            in_pool,
            transport,
        })
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn config(&self) -> &MsgPoolConfig {
        &self.config
    }

    pub fn strategy(&self) -> AllocationStrategy {
        match &self.memory {
            Some(memory) => memory.strategy(),
            None => AllocationStrategy::HeapRegistered,
        }
    }

    pub fn capacity(&self) -> usize {
        self.config.msg_num
    }

    pub fn available(&self) -> usize {
        self.free_list.len()
    }

    /// Most recently released Msg first; `None` when every Msg is out
    pub fn acquire(&mut self) -> Option<Msg> {
        let mut msg = self.free_list.pop()?;
        self.in_pool[msg.id().index() as usize] = false;
        msg.reset();
        Some(msg)
    }

    /// Hands `msg` back if it was carved from another pool
    pub fn release(&mut self, msg: Msg) -> Result<(), Msg> {
        if msg.pool() != self.id {
            warn!("msg {:?} does not belong to pool {:?}", msg.id(), self.id);
            return Err(msg);
        }
        let index = msg.id().index() as usize;
        debug_assert!(
            !self.in_pool[index],
            "msg {:?} released twice to pool {:?}",
            msg.id(),
            self.id
        );
        self.in_pool[index] = true;
        self.free_list.push(msg);
        Ok(())
    }

    /// Declared input bytes: the received payload once one arrived
    pub fn in_buf(&self, msg: &Msg) -> &[u8] {
        &self.region()[msg.in_range()]
    }

    /// Declared output bytes, what the next send transmits
    pub fn out_buf(&self, msg: &Msg) -> &[u8] {
        &self.region()[msg.out_range()]
    }

    /// The whole output half, for the consumer to fill before sending
    pub fn out_buf_mut(&mut self, msg: &Msg) -> &mut [u8] {
        let range = msg.out_capacity_range();
        &mut self.region_mut()[range]
    }

    pub fn in_buf_mut(&mut self, msg: &Msg) -> &mut [u8] {
        let range = msg.in_capacity_range();
        &mut self.region_mut()[range]
    }

    /// Copies a received payload into the input half and declares its length
    pub(crate) fn write_in(&mut self, msg: &mut Msg, payload: &[u8]) -> Result<(), MsgPoolError> {
        if payload.len() > msg.in_capacity() {
            return Err(MsgPoolError::PayloadTooLarge {
                msg: msg.id(),
                len: payload.len(),
                capacity: msg.in_capacity(),
            });
        }
        let range = msg.in_capacity_range();
        self.region_mut()[range.start..range.start + payload.len()].copy_from_slice(payload);
        msg.set_in_len(payload.len());
        Ok(())
    }

    pub(crate) fn outgoing<'a>(&'a self, msg: &Msg) -> OutgoingMsg<'a> {
        OutgoingMsg {
            id: msg.id(),
            data: self.out_buf(msg),
            key: msg.key(),
            in_capacity: msg.in_capacity(),
        }
    }

    fn region(&self) -> &[u8] {
        match &self.memory {
            Some(memory) => memory.bytes(),
            None => &[],
        }
    }

    fn region_mut(&mut self) -> &mut [u8] {
        match &mut self.memory {
            Some(memory) => memory.bytes_mut(),
            None => &mut [],
        }
    }
}

impl Drop for MsgPool {
    fn drop(&mut self) {
        let outstanding = self.config.msg_num - self.free_list.len();
        if outstanding > 0 {
            warn!(
                "Msg pool {:?} dropped with {} msgs still out of the pool",
                self.id, outstanding
            );
        }
        self.free_list.clear();
        if let Some(memory) = self.memory.take() {
            memory.release(&*self.transport);
        }
    }
}
