#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![doc = include_str!("../README.md")]

pub mod base;
pub mod broadcast;
pub mod error;
pub mod flooding;
pub mod multihop;
pub mod overlay;
pub mod unicast;

pub use base::{broadcast_address, Network, SendOptions, IS_ACK, NEEDS_ACK};
pub use broadcast::Broadcast;
pub use error::NetError;
pub use flooding::{Flooding, FloodingParams};
pub use multihop::{MultiHopUnicast, RecvAction};
pub use overlay::{Overlay, OverlayOutcome};
pub use unicast::Unicast;
