//! Reconciliation error taxonomy

use ocular_channel::{ChannelError, Operation};
use ocular_core::{Resolution, ResolutionParseError, SchemaMismatch, VariantError};
use thiserror::Error;

use crate::flags::Feature;

/// A desired setting that cannot be applied as requested
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    MalformedResolution(#[from] ResolutionParseError),
    #[error("sensor does not support a resolution of {0}")]
    UnsupportedResolution(Resolution),
    #[error("resolution {resolution} exceeds the {width}x{height} imager")]
    ExceedsImager {
        resolution: Resolution,
        width: u32,
        height: u32,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconfigureError {
    /// The channel call failed; the step was skipped or the cycle aborted
    #[error("failed to {operation}: {source}")]
    Transport {
        operation: Operation,
        source: ChannelError,
    },
    /// The sensor declined the feature; it stays disabled for the process lifetime
    #[error("{0} is not supported by this sensor")]
    UnsupportedFeature(Feature),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// No schema exists for this sensor; the reconciler never becomes active
    #[error("no configuration schema for this sensor: {0}")]
    FatalConfiguration(#[from] VariantError),
    #[error("desired state rejected: {0}")]
    SchemaMismatch(#[from] SchemaMismatch),
}

impl ReconfigureError {
    pub(crate) fn transport(operation: Operation) -> impl FnOnce(ChannelError) -> Self {
        move |source| Self::Transport { operation, source }
    }

    /// Short machine-readable category
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport_failure",
            Self::UnsupportedFeature(_) => "unsupported_feature",
            Self::Validation(_) => "validation_failure",
            Self::FatalConfiguration(_) => "fatal_configuration",
            Self::SchemaMismatch(_) => "schema_mismatch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_message() {
        let err = ReconfigureError::transport(Operation::GetDeviceModes)(ChannelError::TimedOut);
        assert_eq!(err.to_string(), "failed to get_device_modes: Timed out");
        assert_eq!(err.kind(), "transport_failure");
    }

    #[test]
    fn test_validation_message() {
        let err: ReconfigureError =
            ValidationError::UnsupportedResolution(Resolution::new(999, 999, 1)).into();
        assert_eq!(
            err.to_string(),
            "validation failed: sensor does not support a resolution of 999x999x1"
        );
    }
}
