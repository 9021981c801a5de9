use std::sync::Arc;

use log::info;

use xbridge_shared::{KeyGenerator, Transport, TransportLogLevel};

use crate::{
    config::{BridgeConfig, ContextConfig},
    context::Context,
    logging::transport_log_sink,
    session::SessionRegistry,
    BridgeError,
};

/// Process-level owner of the transport, the session registry and the
/// identity generator. Every Context is created through it.
pub struct Bridge {
    transport: Arc<dyn Transport>,
    registry: Arc<SessionRegistry>,
    keys: Arc<KeyGenerator>,
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(transport: Arc<dyn Transport>, config: BridgeConfig) -> Self {
        Self::with_registry(transport, Arc::new(SessionRegistry::new()), config)
    }

    /// Uses an existing registry, shared with whoever else needs to find
    /// server sessions by transport handle
    pub fn with_registry(
        transport: Arc<dyn Transport>,
        registry: Arc<SessionRegistry>,
        config: BridgeConfig,
    ) -> Self {
        transport.set_log_sink(Some(transport_log_sink()));
        let bridge = Self {
            transport,
            registry,
            keys: Arc::new(KeyGenerator::new()),
            config,
        };
        bridge.set_log_threshold(bridge.config.log_threshold);
        bridge
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Context with the bridge's default configuration
    pub fn create_context(&self) -> Result<Context, BridgeError> {
        self.create_context_with(&self.config.context)
    }

    pub fn create_context_with(&self, config: &ContextConfig) -> Result<Context, BridgeError> {
        let context = Context::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.registry),
            Arc::clone(&self.keys),
            config,
        )?;
        Ok(context)
    }

    /// Most verbose level logged, for the bridge and the transport alike
    pub fn set_log_threshold(&self, threshold: log::LevelFilter) {
        log::set_max_level(threshold);
        let level = TransportLogLevel::from_level_filter(threshold);
        self.transport.set_log_level(level);
        info!("log threshold set to {} ({:?} for the transport)", threshold, level);
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.transport.set_log_sink(None);
    }
}
