//! Room synchronization: wire events, publish throttling, inbound application

pub mod gateway;
pub mod protocol;
pub mod throttle;

pub use gateway::{Applied, Ignored, Inbound, SyncConfig, SyncGateway};
pub use protocol::{EventPayload, GameEvent};
pub use throttle::PublishThrottle;
