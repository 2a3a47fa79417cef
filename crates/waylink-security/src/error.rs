//! Errors raised while wiring or running a security measure.

use thiserror::Error;

/// Errors raised while registering a [`crate::Measure`] on a serializer.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// A measure's `apply` tried to extend a scheme that rejected it.
    #[error("failed to register security measure layer: {0}")]
    Scheme(#[from] waylink_core::SchemeError),
}
