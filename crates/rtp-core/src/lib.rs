//! Core RTP data model for the mediaswitch forwarding pipeline
//!
//! This crate defines the packet and frame types shared by every stage of
//! the forwarding pipeline (depacketizers, listener bridges, simulcast
//! combiners and stream transponders), the sliding-window statistics
//! accumulator used for bitrate/frame-rate/wait-time tracking, and the
//! capability traits that connect the pipeline to its collaborators
//! (frame listeners, packet listeners, upstream receivers, outgoing
//! senders, layer selectors and black-box encoders).
//!
//! Packets arrive at this layer with their 16-bit sequence numbers and
//! 32-bit timestamps already unwrapped to monotonic extended counters;
//! reordering and duplicate suppression happen upstream.

pub mod frame;
pub mod layer;
pub mod listeners;
pub mod packet;
pub mod stats;
pub mod time;
pub mod traits;

pub use frame::{FramePacketization, MediaCodec, MediaFrame, MediaType};
pub use layer::{LayerInfo, LayerSelection, PayloadPatch};
pub use listeners::ListenerSet;
pub use packet::MediaPacket;
pub use stats::Accumulator;
pub use traits::{
    MediaFrameListener, MediaStreamListener, RtpIncomingMediaStream, RtpReceiver, RtpSender,
    VideoEncoder, VideoLayerSelector,
};

/// Extended (unwrapped) RTP sequence number.
pub type RtpExtSeqNum = u32;

/// Extended (unwrapped) RTP timestamp.
pub type RtpExtTimestamp = u64;

/// Synchronization source identifier.
pub type RtpSsrc = u32;

/// Sentinel meaning "no sequence number seen yet".
pub const NO_SEQ_NUM: RtpExtSeqNum = u32::MAX;

/// Sentinel meaning "no timestamp seen yet".
pub const NO_TIMESTAMP: RtpExtTimestamp = u64::MAX;
