#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![doc = include_str!("../README.md")]

pub use waylink_core as core;
pub use waylink_net as net;
pub use waylink_runtime as runtime;
pub use waylink_security as security;

/// The common set of imports an application wiring up a channel needs.
pub mod prelude {
    pub use waylink_core::{
        attr, bytes_attr, int_attr, variable_bytes_attr, AttrDescriptor, AttrKind, AttrValue,
        CodecError, Endianness, Frame, Layer, Meta, PreEncodeFrame, RingBuffer, Scheme,
        SchemeError, Serializer,
    };
    pub use waylink_net::{
        broadcast_address, Broadcast, Flooding, FloodingParams, MultiHopUnicast, NetError,
        Network, Overlay, OverlayOutcome, RecvAction, SendOptions, Unicast, IS_ACK, NEEDS_ACK,
    };
    pub use waylink_runtime::{
        flooding_scheme, Channel, ChannelError, ChannelWorker, Clock, ConnectionParams,
        FloodingChannel, Orchestrator, Random, ScheduleMode, Scheduler, Socket, SystemClock,
        ThreadRandom, DATA_ATTR, DEFAULT_BUFFER_SIZE,
    };
    pub use waylink_security::{AesCtrMeasure, HmacMeasure, Measure, Security, SecurityError};
}
