//! Error taxonomy for the orchestrator, scheduler and channel façade.

use thiserror::Error;

/// Errors raised by a [`crate::channel::Channel`].
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The serializer rejected a frame while encoding or decoding.
    #[error(transparent)]
    Codec(#[from] waylink_core::CodecError),

    /// The scheme rejected a registration made during `init_connection`.
    #[error(transparent)]
    Scheme(#[from] waylink_core::SchemeError),

    /// A network overlay rejected a send or its own registration.
    #[error(transparent)]
    Net(#[from] waylink_net::NetError),

    /// A security measure rejected its own registration.
    #[error(transparent)]
    Security(#[from] waylink_security::SecurityError),

    /// `send` was attempted before `init_connection`.
    #[error("channel is not connected")]
    NotConnected,
}
