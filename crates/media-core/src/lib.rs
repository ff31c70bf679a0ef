//! Media-forwarding core for the mediaswitch pipeline
//!
//! The forwarding path, stage by stage:
//!
//! 1. [`depacketizer`] reassembles ordered RTP packets into media frames,
//!    tracking the packet boundaries so the frames can be re-packetized
//!    later without touching the codec bitstream.
//! 2. [`bridge`] fans completed frames out to frame-level consumers and
//!    re-derives a packet stream from them, optionally smoothing the
//!    packets over each frame's duration.
//! 3. [`simulcast`] merges several simulcast encodings of one source into
//!    a single continuous frame stream, switching layers at keyframes.
//! 4. [`transponder`] republishes an incoming packet stream under a new
//!    identity, rewriting sequence numbers and timestamps so drops and
//!    insertions stay invisible, filtering scalable layers through
//!    [`selector`] and rate-limiting upstream keyframe requests.
//!
//! Everything here is transport-agnostic: packets arrive already
//! validated and unwrapped, and leave through the [`RtpSender`] trait.
//!
//! [`RtpSender`]: mediaswitch_rtp_core::RtpSender

pub mod bridge;
pub mod depacketizer;
pub mod error;
pub mod selector;
pub mod simulcast;
pub mod transponder;

pub use bridge::{BridgeConfig, BridgeStats, MediaFrameListenerBridge};
pub use depacketizer::{Depacketizer, H265Depacketizer};
pub use error::{Error, Result};
pub use selector::{H265LayerSelector, NoneLayerSelector};
pub use simulcast::{SimulcastConfig, SimulcastMediaFrameListener};
pub use transponder::{RtpStreamTransponder, TransponderConfig};
