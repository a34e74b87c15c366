//! Ocular Channel - The request/response boundary to a stereo sensor
//!
//! Every operation blocks until the sensor answers or the transport gives up.
//! Timeouts and retries belong to the transport; callers see a status-coded
//! [`ChannelError`].

pub mod channel;
pub mod simulated;

pub use channel::{Channel, ChannelError, Operation};
pub use simulated::{Call, Journal, SensorProfile, SimulatedChannel};
