#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![doc = include_str!("../README.md")]

pub mod clock;
pub mod random;
pub mod socket;

pub use clock::ManualClock;
pub use random::SeededRandom;
pub use socket::{loopback_pair, LoopbackSocket};
