//! Codec-specific RTP depacketizers
//!
//! A depacketizer is a stateful per-stream reassembler: it consumes RTP
//! packets for one source in extended-sequence order and accumulates them
//! into a [`MediaFrame`]. A frame reference is returned on every call;
//! the frame is complete (ready to hand to listeners) only once a packet
//! carrying the marker bit has been absorbed, so callers check the
//! packet's marker rather than waiting for a distinct "done" signal.

pub mod h265;

pub use h265::H265Depacketizer;

use mediaswitch_rtp_core::{MediaCodec, MediaFrame, MediaPacket, MediaType};

use crate::error::{Error, Result};

/// Stateful reassembler turning ordered RTP packets into media frames.
pub trait Depacketizer: Send {
    /// Media type of the frames this depacketizer produces.
    fn media_type(&self) -> MediaType;

    /// Codec this depacketizer understands.
    fn codec(&self) -> MediaCodec;

    /// Absorb one packet into the frame under construction.
    ///
    /// A packet whose timestamp differs from the current frame discards
    /// the unfinished frame and restarts reassembly. Returns the frame
    /// being built, or `None` when the payload left the reassembly state
    /// inconsistent and the frame had to be abandoned.
    fn add_packet(&mut self, packet: &MediaPacket) -> Option<&MediaFrame>;

    /// Clear accumulated buffer and fragment state, e.g. after a source
    /// discontinuity.
    fn reset(&mut self);
}

/// Create the depacketizer for a codec.
pub fn for_codec(codec: MediaCodec) -> Result<Box<dyn Depacketizer>> {
    match codec {
        MediaCodec::H265 => Ok(Box::new(H265Depacketizer::new())),
        other => Err(Error::UnsupportedCodec {
            codec: other.name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_codec() {
        assert!(for_codec(MediaCodec::H265).is_ok());
        assert!(matches!(
            for_codec(MediaCodec::Opus),
            Err(Error::UnsupportedCodec { .. })
        ));
    }
}
