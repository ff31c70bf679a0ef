//! Reassembled media frames and their packetization map
//!
//! A [`MediaFrame`] is what a depacketizer produces from a run of RTP
//! packets sharing one timestamp: a contiguous buffer of elementary units,
//! each preceded by a 4-byte big-endian length prefix (an Annex-B-style
//! bitstream ready for a decoder), plus a list of
//! [`FramePacketization`] records mapping buffer regions back to the
//! packets that produced them. The records let a later stage re-derive
//! per-packet boundaries without re-fragmenting the frame.

use crate::{RtpSsrc, NO_TIMESTAMP};

/// Media type of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Audio frame.
    Audio,
    /// Video frame.
    Video,
}

/// Codecs understood by the forwarding pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCodec {
    /// H.264 / AVC video.
    H264,
    /// H.265 / HEVC video.
    H265,
    /// VP8 video.
    Vp8,
    /// VP9 video.
    Vp9,
    /// Opus audio.
    Opus,
}

impl MediaCodec {
    /// Media type this codec belongs to.
    pub fn media_type(&self) -> MediaType {
        match self {
            Self::H264 | Self::H265 | Self::Vp8 | Self::Vp9 => MediaType::Video,
            Self::Opus => MediaType::Audio,
        }
    }

    /// Default RTP clock rate for this codec.
    pub fn clock_rate(&self) -> u32 {
        match self {
            Self::H264 | Self::H265 | Self::Vp8 | Self::Vp9 => 90000,
            Self::Opus => 48000,
        }
    }

    /// Human-readable codec name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::H264 => "H264",
            Self::H265 => "H265",
            Self::Vp8 => "VP8",
            Self::Vp9 => "VP9",
            Self::Opus => "OPUS",
        }
    }
}

/// Maps one region of a frame buffer back to the packet that produced it.
///
/// `prefix` holds the original in-payload header bytes that were stripped
/// while reassembling (for example the FU indicator and FU header of a
/// fragmented unit); it is empty for regions that were carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePacketization {
    /// Byte offset of the region inside the frame buffer.
    pub pos: usize,
    /// Length of the region in bytes.
    pub len: usize,
    /// Original packet header bytes preceding the region, if any.
    pub prefix: Vec<u8>,
}

/// A reassembled media frame.
#[derive(Debug, Clone)]
pub struct MediaFrame {
    media: MediaType,
    codec: MediaCodec,
    timestamp: u64,
    clock_rate: u32,
    time: u64,
    sender_time: u64,
    ssrc: RtpSsrc,
    intra: bool,
    buffer: Vec<u8>,
    packetization: Vec<FramePacketization>,
}

impl MediaFrame {
    /// Create an empty frame for the given codec.
    pub fn new(media: MediaType, codec: MediaCodec, clock_rate: u32) -> Self {
        Self {
            media,
            codec,
            timestamp: NO_TIMESTAMP,
            clock_rate,
            time: 0,
            sender_time: 0,
            ssrc: 0,
            intra: false,
            buffer: Vec::new(),
            packetization: Vec::new(),
        }
    }

    /// Clear accumulated media and packetization info, keeping identity.
    ///
    /// The timestamp reverts to [`NO_TIMESTAMP`] so the next packet
    /// re-latches frame timing.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.packetization.clear();
        self.intra = false;
        self.timestamp = NO_TIMESTAMP;
    }

    /// Append bytes to the frame buffer, returning the offset at which
    /// they were written.
    pub fn append_media(&mut self, data: &[u8]) -> usize {
        let pos = self.buffer.len();
        self.buffer.extend_from_slice(data);
        pos
    }

    /// Record that `len` bytes at `pos` came from a packet whose payload
    /// carried the given header bytes before them.
    pub fn add_rtp_packet(&mut self, pos: usize, len: usize, prefix: &[u8]) {
        self.packetization.push(FramePacketization {
            pos,
            len,
            prefix: prefix.to_vec(),
        });
    }

    /// Patch a previously reserved 4-byte big-endian length prefix.
    pub fn write_length_at(&mut self, pos: usize, len: u32) {
        self.buffer[pos..pos + 4].copy_from_slice(&len.to_be_bytes());
    }

    /// Current frame buffer length in bytes.
    pub fn length(&self) -> usize {
        self.buffer.len()
    }

    /// The frame buffer: length-prefixed elementary units.
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Packet mapping records in append order.
    pub fn packetization(&self) -> &[FramePacketization] {
        &self.packetization
    }

    /// Iterate over the elementary units, stripping the 4-byte prefixes.
    ///
    /// Stops at the first malformed prefix (declared length past the end
    /// of the buffer), which can only happen for a frame still carrying an
    /// unpatched in-progress fragment.
    pub fn units(&self) -> impl Iterator<Item = &[u8]> {
        UnitIter {
            buffer: &self.buffer,
            pos: 0,
        }
    }

    pub fn media_type(&self) -> MediaType {
        self.media
    }

    pub fn codec(&self) -> MediaCodec {
        self.codec
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// True once the first packet of the frame has latched a timestamp.
    pub fn has_timestamp(&self) -> bool {
        self.timestamp != NO_TIMESTAMP
    }

    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    pub fn set_clock_rate(&mut self, clock_rate: u32) {
        self.clock_rate = clock_rate;
    }

    /// Wall-clock capture time in milliseconds.
    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn set_time(&mut self, time: u64) {
        self.time = time;
    }

    /// Sender-reported time in milliseconds.
    pub fn sender_time(&self) -> u64 {
        self.sender_time
    }

    pub fn set_sender_time(&mut self, sender_time: u64) {
        self.sender_time = sender_time;
    }

    pub fn ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    pub fn set_ssrc(&mut self, ssrc: RtpSsrc) {
        self.ssrc = ssrc;
    }

    /// True when the frame contains a keyframe or parameter-set unit.
    pub fn is_intra(&self) -> bool {
        self.intra
    }

    pub fn set_intra(&mut self, intra: bool) {
        self.intra = intra;
    }
}

struct UnitIter<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for UnitIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.pos + 4 > self.buffer.len() {
            return None;
        }
        let len = u32::from_be_bytes(self.buffer[self.pos..self.pos + 4].try_into().ok()?) as usize;
        let start = self.pos + 4;
        if start + len > self.buffer.len() {
            return None;
        }
        self.pos = start + len;
        Some(&self.buffer[start..start + len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_units() {
        let mut frame = MediaFrame::new(MediaType::Video, MediaCodec::H265, 90000);
        assert!(!frame.has_timestamp());

        let unit = [0x26, 0x01, 0x11, 0x22];
        frame.append_media(&(unit.len() as u32).to_be_bytes());
        let pos = frame.append_media(&unit);
        frame.add_rtp_packet(pos, unit.len(), &[]);

        let units: Vec<&[u8]> = frame.units().collect();
        assert_eq!(units, vec![&unit[..]]);
        assert_eq!(frame.packetization().len(), 1);
        assert_eq!(frame.packetization()[0].pos, 4);
    }

    #[test]
    fn test_length_patch() {
        let mut frame = MediaFrame::new(MediaType::Video, MediaCodec::H265, 90000);
        let prefix_pos = frame.append_media(&[0u8; 4]);
        frame.append_media(&[0xaa, 0xbb, 0xcc]);
        frame.write_length_at(prefix_pos, 3);

        let units: Vec<&[u8]> = frame.units().collect();
        assert_eq!(units, vec![&[0xaa, 0xbb, 0xcc][..]]);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut frame = MediaFrame::new(MediaType::Video, MediaCodec::H265, 90000);
        frame.set_timestamp(1000);
        frame.set_intra(true);
        frame.append_media(&[1, 2, 3]);
        frame.add_rtp_packet(0, 3, &[]);

        frame.reset();
        assert!(!frame.has_timestamp());
        assert!(!frame.is_intra());
        assert_eq!(frame.length(), 0);
        assert!(frame.packetization().is_empty());
    }
}
