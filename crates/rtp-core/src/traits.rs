//! Capability traits at the seams of the forwarding pipeline
//!
//! Each role is a single flat capability: frame-level consumers,
//! packet-level consumers, the upstream control channel, the outgoing
//! packet sink, the per-codec scalable-layer selector and the black-box
//! video encoder consumed by an external capture worker. Listeners are
//! shared via `Arc` because one listener may be registered with several
//! sources at once and must outlive any one of them; delivery happens
//! synchronously on the delivering thread and listeners must not block
//! for unbounded time.

use std::sync::Arc;

use crate::frame::MediaFrame;
use crate::layer::LayerSelection;
use crate::packet::MediaPacket;
use crate::RtpSsrc;

/// Consumer of reassembled media frames.
///
/// Frames are delivered by reference and must not be retained beyond the
/// callback; listeners needing persistence clone the frame.
pub trait MediaFrameListener: Send + Sync {
    /// A completed frame was produced by the source identified by `ssrc`.
    fn on_media_frame(&self, ssrc: RtpSsrc, frame: &MediaFrame);
}

/// Consumer of RTP packets from an incoming media stream.
pub trait MediaStreamListener: Send + Sync {
    /// A packet arrived on the stream identified by `ssrc`.
    fn on_rtp(&self, ssrc: RtpSsrc, packet: &MediaPacket);

    /// The stream signalled a BYE; it may resume later.
    fn on_bye(&self, ssrc: RtpSsrc) {
        let _ = ssrc;
    }

    /// The stream is gone and will not deliver further packets.
    fn on_ended(&self, ssrc: RtpSsrc) {
        let _ = ssrc;
    }
}

/// An incoming media stream that packet listeners can attach to.
pub trait RtpIncomingMediaStream: Send + Sync {
    /// SSRC identifying the stream's media source.
    fn media_ssrc(&self) -> RtpSsrc;

    /// Register a packet-level listener; delivery order is insertion order.
    fn add_listener(&self, listener: Arc<dyn MediaStreamListener>);

    /// Unregister a previously added listener.
    fn remove_listener(&self, listener: &Arc<dyn MediaStreamListener>);
}

/// Control channel back to the upstream receiver feeding a stream.
pub trait RtpReceiver: Send + Sync {
    /// Ask the remote sender for a fresh keyframe. Returns false when the
    /// request could not be issued.
    fn send_pli(&self, ssrc: RtpSsrc) -> bool;

    /// Reset reception state for the source after a discontinuity.
    fn reset(&self, ssrc: RtpSsrc) -> bool;

    /// Pass a receiver-estimated maximum bitrate through to the encoder
    /// control path. Default implementations ignore it.
    fn on_bitrate_estimate(&self, ssrc: RtpSsrc, bitrate: u32) {
        let _ = (ssrc, bitrate);
    }
}

/// Outgoing sink accepting rewritten packets for transmission.
pub trait RtpSender: Send + Sync {
    /// Queue one packet for transmission.
    fn send(&self, packet: &MediaPacket);
}

/// Per-codec scalable-layer selector consumed by the stream transponder.
///
/// Given a packet and the configured (spatial, temporal) ceiling, decides
/// accept/drop and supplies in-payload rewrite instructions so the
/// forwarded subset stays self-consistent. Implementations are stateful
/// (they track frame boundaries and layer switch points) and are owned by
/// a single transponder.
pub trait VideoLayerSelector: Send {
    /// Set the spatial layer ceiling.
    fn select_spatial_layer(&mut self, id: u8);

    /// Set the temporal layer ceiling.
    fn select_temporal_layer(&mut self, id: u8);

    /// Currently selected spatial layer.
    fn spatial_layer_id(&self) -> u8;

    /// Currently selected temporal layer.
    fn temporal_layer_id(&self) -> u8;

    /// Decide whether to forward `packet`. `None` means the payload could
    /// not be interpreted; callers drop the packet.
    fn select(&mut self, packet: &MediaPacket) -> Option<LayerSelection>;
}

/// Black-box video encoder driven by an external capture worker.
///
/// The forwarding core never implements this; it is the interface the
/// core assumes of hardware or software encoder bindings living outside
/// it.
pub trait VideoEncoder: Send {
    /// Encode one raw picture captured at `time` (milliseconds).
    fn encode_frame(&mut self, picture: &[u8], time: u64) -> Option<MediaFrame>;

    /// Reconfigure the output resolution. Returns false on failure.
    fn set_size(&mut self, width: u32, height: u32) -> bool;

    /// Reconfigure frame rate (fps) and target bitrate (bps).
    fn set_frame_rate(&mut self, fps: u32, bitrate: u32) -> bool;

    /// Force the next encoded frame to be an intra frame.
    fn fast_picture_update(&mut self);
}
