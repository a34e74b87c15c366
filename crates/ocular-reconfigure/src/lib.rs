//! Ocular Reconfigure - Reconcile desired camera state against a live sensor
//!
//! Given the operator's desired configuration, the sensor's capabilities, and
//! its live state, [`Reconfigure`] issues the minimal ordered sequence of
//! channel operations: it pauses streams only around a resolution change,
//! validates resolutions against a lazily fetched mode table, diffs IMU
//! element configs, and permanently skips features the sensor declines.

pub mod cache;
pub mod error;
pub mod flags;
pub mod reconfigure;

pub use cache::CapabilityCache;
pub use error::{ReconfigureError, ValidationError};
pub use flags::{CapabilityFlags, Feature};
pub use reconfigure::{
    FeatureOutcome, ImuOutcome, ReconcileReport, Reconfigure, ResolutionHook, ResolutionOutcome,
    StreamState, RADIANS_PER_SECOND_TO_RPM,
};
