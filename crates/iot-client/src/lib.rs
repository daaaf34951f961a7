//! iotclient Client Library
//!
//! Everything a device runs after boot:
//! - [`Session`] and [`ConnectionManager`]: the one outbound connection
//! - [`Interpreter`]: core protocol commands and device dispatch
//! - [`device`]: the [`Device`] capability, command tables and device variants
//! - [`PollLoop`]: the single-threaded loop tying it together
//! - [`config`] / [`store`]: runtime settings and the persisted device record
//!
//! # Example
//!
//! ```ignore
//! use iot_client::prelude::*;
//! use iot_transport::TcpConnector;
//!
//! let device = AnyDevice::Lock(LockDevice::new(Box::new(my_lock_pin))?);
//! let mut poll = PollLoopBuilder::new(TcpConnector::new(), device, device_config)
//!     .client_config(client_config)
//!     .build();
//! poll.run().await;
//! ```

pub mod builder;
pub mod collaborators;
pub mod config;
pub mod connection;
pub mod device;
pub mod error;
pub mod interpreter;
pub mod poll;
pub mod session;
pub mod store;

pub use builder::PollLoopBuilder;
pub use collaborators::{Network, NoUpdates, ResetHook, StaticLink, Updater};
pub use config::ClientConfig;
pub use connection::ConnectionManager;
pub use device::{AnyDevice, Device, DeviceKind};
pub use error::{ConfigError, DeviceError};
pub use interpreter::{Interpreter, Outcome, ProtocolStats, Rejection};
pub use poll::{AppContext, Exit, PollLoop, Tick};
pub use session::{Session, SessionState};
pub use store::{boot, Boot, ConfigStore, DeviceConfig, FileConfigStore, MemoryConfigStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::builder::PollLoopBuilder;
    pub use crate::config::ClientConfig;
    pub use crate::device::light::{LightDevice, LightOutput, LightState, Rgb};
    pub use crate::device::lock::{LockActuator, LockDevice};
    pub use crate::device::{AnyDevice, Device, DeviceKind};
    pub use crate::error::{ConfigError, DeviceError};
    pub use crate::poll::{Exit, PollLoop};
    pub use crate::store::{boot, Boot, ConfigStore, DeviceConfig};
    pub use iot_core::{Frame, FramingStrategy};
}
