use std::sync::Arc;

use xbridge_shared::{LoopHandle, Transport};

/// Stops a context's event loop from any thread
#[derive(Clone)]
pub struct LoopBreaker {
    transport: Arc<dyn Transport>,
    event_loop: LoopHandle,
}

impl LoopBreaker {
    pub(crate) fn new(transport: Arc<dyn Transport>, event_loop: LoopHandle) -> Self {
        Self {
            transport,
            event_loop,
        }
    }

    pub fn break_loop(&self) {
        self.transport.stop_loop(self.event_loop, false);
    }
}
