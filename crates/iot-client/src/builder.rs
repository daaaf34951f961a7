//! Poll loop builder

use iot_transport::Connector;
use tracing::warn;

use crate::collaborators::{Network, NoUpdates, ResetHook, StaticLink, Updater};
use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::device::Device;
use crate::poll::{AppContext, PollLoop};
use crate::session::Session;
use crate::store::{ConfigStore, DeviceConfig, MemoryConfigStore};

/// Builder for [`PollLoop`]
pub struct PollLoopBuilder<C: Connector, D: Device> {
    connector: C,
    device: D,
    device_config: DeviceConfig,
    client_config: ClientConfig,
    network: Option<Box<dyn Network>>,
    updater: Option<Box<dyn Updater>>,
    store: Option<Box<dyn ConfigStore>>,
    reset: ResetHook,
}

impl<C: Connector, D: Device> PollLoopBuilder<C, D> {
    /// Create a builder for `device`, identified by `device_config`
    pub fn new(connector: C, device: D, device_config: DeviceConfig) -> Self {
        Self {
            connector,
            device,
            device_config,
            client_config: ClientConfig::default(),
            network: None,
            updater: None,
            store: None,
            reset: ResetHook::new(),
        }
    }

    /// Set runtime settings (framing, retries, timings)
    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = config;
        self
    }

    /// Set network provisioning; defaults to an always-up link
    pub fn network(mut self, network: impl Network + 'static) -> Self {
        self.network = Some(Box::new(network));
        self
    }

    /// Set the update checker; defaults to none
    pub fn updater(mut self, updater: impl Updater + 'static) -> Self {
        self.updater = Some(Box::new(updater));
        self
    }

    /// Set the configuration store erased on reset; defaults to an
    /// in-memory store holding the device config
    pub fn store(mut self, store: impl ConfigStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Share an existing reset hook
    pub fn reset_hook(mut self, hook: ResetHook) -> Self {
        self.reset = hook;
        self
    }

    pub fn build(self) -> PollLoop<C, D> {
        if self.device_config.device_type != self.device.device_type() {
            warn!(
                "Stored device type {:?} differs from the running device {:?}",
                self.device_config.device_type,
                self.device.device_type()
            );
        }

        let codec = self.client_config.codec();
        let session = Session::new(
            &self.device_config.host,
            self.device_config.port,
            self.device_config.identity(),
            codec.max_wire_len(),
        );

        let store = self.store.unwrap_or_else(|| {
            Box::new(MemoryConfigStore::with_record(self.device_config.clone()))
        });

        let ctx = AppContext {
            session,
            device: self.device,
            network: self.network.unwrap_or_else(|| Box::new(StaticLink)),
            updater: self.updater.unwrap_or_else(|| Box::new(NoUpdates)),
            store,
            reset: self.reset,
        };

        PollLoop::new(
            ctx,
            ConnectionManager::new(self.connector, self.client_config.retry_policy()),
            codec,
            self.client_config.read_window(),
            self.client_config.tick_interval(),
        )
    }
}
