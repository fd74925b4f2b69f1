//! Error types for batch decoding.
//!
//! Every failure surfaces synchronously from [`decode`](crate::decode):
//! argument validation runs before any kernel work, and resource or device
//! failures abort the call with no partial output.

/// Errors reported by the decoder.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    /// A shape, length, or range precondition on the inputs failed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Back-pointer or device scratch allocation failed, or the request
    /// exceeds a device buffer limit.
    #[error("out of resources: {0}")]
    OutOfResources(String),

    /// GPU adapter selection, device acquisition, or kernel execution
    /// failed.
    #[error("device error: {0}")]
    DeviceError(String),

    /// An invariant of the decoder itself was violated. Never expected on
    /// valid inputs.
    #[error("internal error: {0}")]
    InternalError(String),
}
