//! Errors raised by network overlays.

use thiserror::Error;

/// Errors raised while wiring or running a network overlay.
#[derive(Debug, Error)]
pub enum NetError {
    /// An overlay's `init_connection` tried to extend a scheme that rejected it.
    #[error("failed to register overlay layers: {0}")]
    Scheme(#[from] waylink_core::SchemeError),

    /// An address did not match the configured `address_size`.
    #[error("address length {actual} does not match the configured size {expected}")]
    AddressSize {
        /// Configured address size.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// A multi-hop send was attempted before a route to the destination was known.
    #[error("no route to destination address")]
    NoRoute,
}
