//! Error types for GPU resource and job management.

use thiserror::Error;

use crate::device::{ContextId, DeviceError, ObjectKind, ObjectName};

/// Errors reported by resources, releasers, arenas and promises.
///
/// None of these are fatal to the process. A failed allocation leaves the
/// dependent feature without its GPU object, a failed release is reported
/// and the object is dropped from tracking anyway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The device returned the sentinel name when asked for a new object.
    #[error("failed to allocate {kind} '{label}' on context {context}")]
    AllocationFailed {
        kind: ObjectKind,
        label: String,
        context: ContextId,
    },
    /// A bindless handle could not be resolved for a texture.
    #[error("failed to resolve bindless handle for texture '{label}'")]
    ResolveFailed { label: String },
    /// The device refused to delete an object. The object is invalid afterwards.
    #[error("failed to delete {kind} {name} '{label}': {source}")]
    DeletionFailed {
        kind: ObjectKind,
        name: ObjectName,
        label: String,
        #[source]
        source: DeviceError,
    },
    /// A job arena was drained against a context it is not bound to.
    #[error("job arena '{arena}' is bound to {bound:?}, not context {requested}")]
    StaleContextBinding {
        arena: String,
        bound: Option<ContextId>,
        requested: ContextId,
    },
    /// A promise was resolved more than once.
    #[error("promise already resolved")]
    AlreadyResolved,
}

/// Result alias used throughout the crate.
pub type GpuResult<T> = Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GpuError::AllocationFailed {
            kind: ObjectKind::Buffer,
            label: "terrain vertices".to_string(),
            context: ContextId(2),
        };
        assert_eq!(
            err.to_string(),
            "failed to allocate buffer 'terrain vertices' on context 2"
        );

        assert_eq!(
            GpuError::AlreadyResolved.to_string(),
            "promise already resolved"
        );
    }

    #[test]
    fn test_deletion_failed_keeps_source() {
        use std::error::Error;

        let err = GpuError::DeletionFailed {
            kind: ObjectKind::Texture,
            name: ObjectName(7),
            label: "splat atlas".to_string(),
            source: DeviceError::Rejected("context lost".to_string()),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("splat atlas"));
    }
}
