#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![doc = include_str!("../README.md")]

pub mod channel;
pub mod clock;
pub mod error;
pub mod flooding_channel;
pub mod orchestrator;
pub mod random;
pub mod scheduler;
pub mod socket;

pub use channel::Channel;
pub use clock::{Clock, SystemClock};
pub use error::ChannelError;
pub use flooding_channel::{flooding_scheme, FloodingChannel, DATA_ATTR};
pub use orchestrator::{ChannelWorker, Orchestrator};
pub use random::{Random, ThreadRandom};
pub use scheduler::{ConnectionParams, ScheduleMode, Scheduler, DEFAULT_BUFFER_SIZE};
pub use socket::Socket;
