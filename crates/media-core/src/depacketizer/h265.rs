//! H.265 (HEVC) RTP depacketizer
//!
//! Reassembles H.265 NAL units from the three RFC 7798 payload shapes:
//! single NAL unit packets, aggregation packets (AP, type 48) and
//! fragmentation units (FU, type 49). Each reconstructed unit lands in
//! the frame buffer behind a 4-byte big-endian length prefix.
//!
//! The NAL unit header is two bytes:
//!
//! ```text
//! +---------------+---------------+
//! |0|1|2|3|4|5|6|7|0|1|2|3|4|5|6|7|
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |F|   Type    |  LayerId  | TID |
//! +-------------+-----------------+
//! ```
//!
//! Only the type field (and the FU start/end bits) are interpreted here.
//!
//! Malformed input is recovered locally: a truncated aggregation keeps the
//! sub-units already appended, a fragment arriving before its start
//! fragment is ignored, and only an inconsistent end-fragment patch
//! abandons the frame.

use tracing::{trace, warn};

use mediaswitch_rtp_core::{MediaCodec, MediaFrame, MediaPacket, MediaType};

use super::Depacketizer;

/// Aggregation packet NAL type (RFC 7798 §4.4.2).
const NAL_UNIT_TYPE_AP: u8 = 48;
/// Fragmentation unit NAL type (RFC 7798 §4.4.3).
const NAL_UNIT_TYPE_FU: u8 = 49;

/// FU header start bit.
const FU_START: u8 = 0x80;
/// FU header end bit.
const FU_END: u8 = 0x40;

fn nal_unit_type(header_byte: u8) -> u8 {
    (header_byte >> 1) & 0x3f
}

/// Keyframe and parameter-set unit types: IDR_W_RADL, IDR_N_LP, SPS, PPS.
fn is_intra_unit_type(unit_type: u8) -> bool {
    matches!(unit_type, 19 | 20 | 33 | 34)
}

/// Control unit types that carry no frame data: AUD, EOS, EOB, FD.
fn is_control_unit_type(unit_type: u8) -> bool {
    matches!(unit_type, 35..=38)
}

enum PayloadOutcome {
    /// Unit data was appended to the frame.
    Appended,
    /// Payload was recognized but contributed no data.
    Ignored,
    /// Reassembly state became inconsistent; the frame is abandoned.
    Aborted,
}

/// Stateful H.265 frame reassembler for one incoming stream.
pub struct H265Depacketizer {
    frame: MediaFrame,
    /// Buffer offset of the length prefix reserved for the fragment in
    /// progress.
    ini_frag_nalu: usize,
    started_frag: bool,
}

impl H265Depacketizer {
    pub fn new() -> Self {
        Self {
            frame: MediaFrame::new(MediaType::Video, MediaCodec::H265, 90000),
            ini_frag_nalu: 0,
            started_frag: false,
        }
    }

    fn reset_frame(&mut self) {
        self.frame.reset();
        self.ini_frag_nalu = 0;
        self.started_frag = false;
    }

    /// Append one complete NAL unit behind its 4-byte length prefix and
    /// record the packet mapping for the region.
    fn append_nal_unit(&mut self, unit: &[u8]) {
        self.frame.append_media(&(unit.len() as u32).to_be_bytes());
        let pos = self.frame.append_media(unit);
        self.frame.add_rtp_packet(pos, unit.len(), &[]);
    }

    fn add_payload(&mut self, payload: &[u8]) -> PayloadOutcome {
        if payload.len() < 2 {
            return PayloadOutcome::Ignored;
        }

        let unit_type = nal_unit_type(payload[0]);
        trace!(
            "h265 nal [type:{},size:{}]",
            unit_type,
            payload.len()
        );

        if is_control_unit_type(unit_type) {
            return PayloadOutcome::Ignored;
        }

        match unit_type {
            NAL_UNIT_TYPE_AP => self.add_aggregation(&payload[2..]),
            NAL_UNIT_TYPE_FU => self.add_fragment(payload),
            _ => {
                // Single NAL unit packet: the entire payload is the unit.
                if is_intra_unit_type(unit_type) {
                    self.frame.set_intra(true);
                }
                self.append_nal_unit(payload);
                PayloadOutcome::Appended
            }
        }
    }

    /// Aggregation packet: a run of (2-byte length, NAL unit) pairs.
    fn add_aggregation(&mut self, mut aggregated: &[u8]) -> PayloadOutcome {
        while aggregated.len() > 2 {
            let nal_size = u16::from_be_bytes([aggregated[0], aggregated[1]]) as usize;
            aggregated = &aggregated[2..];

            if nal_size == 0 || nal_size > aggregated.len() {
                // Malformed aggregation; keep what was already appended.
                warn!(
                    "h265 truncated aggregation [declared:{},remaining:{}]",
                    nal_size,
                    aggregated.len()
                );
                break;
            }

            let unit = &aggregated[..nal_size];
            if is_intra_unit_type(nal_unit_type(unit[0])) {
                self.frame.set_intra(true);
            }
            self.append_nal_unit(unit);

            aggregated = &aggregated[nal_size..];
        }
        PayloadOutcome::Appended
    }

    /// Fragmentation unit: payload header, 1-byte FU header, fragment data.
    fn add_fragment(&mut self, payload: &[u8]) -> PayloadOutcome {
        if payload.len() < 3 {
            return PayloadOutcome::Ignored;
        }

        let fu_header = payload[2];
        let start = fu_header & FU_START != 0;
        let end = fu_header & FU_END != 0;
        let fu_type = fu_header & 0x3f;

        if start {
            // Reconstruct the NAL unit header of the fragmented unit: the
            // payload header with its type field replaced by the FU type.
            let nal_header = [(payload[0] & 0x81) | (fu_type << 1), payload[1]];

            if is_intra_unit_type(fu_type) {
                self.frame.set_intra(true);
            }

            // Reserve the length prefix; it is patched on the end fragment.
            self.ini_frag_nalu = self.frame.length();
            self.frame.append_media(&[0u8; 4]);
            self.frame.append_media(&nal_header);
            self.started_frag = true;
        }

        if !self.started_frag {
            // Fragment loss at stream start; ignore until a start arrives.
            return PayloadOutcome::Ignored;
        }

        let fragment = &payload[3..];
        let pos = self.frame.append_media(fragment);
        self.frame.add_rtp_packet(pos, fragment.len(), &payload[..3]);

        if end {
            if self.ini_frag_nalu + 4 > self.frame.length() {
                warn!("h265 inconsistent fragment state, abandoning frame");
                return PayloadOutcome::Aborted;
            }
            let nal_size = self.frame.length() - self.ini_frag_nalu - 4;
            self.frame.write_length_at(self.ini_frag_nalu, nal_size as u32);
            self.ini_frag_nalu = 0;
            self.started_frag = false;
        }

        PayloadOutcome::Appended
    }
}

impl Depacketizer for H265Depacketizer {
    fn media_type(&self) -> MediaType {
        MediaType::Video
    }

    fn codec(&self) -> MediaCodec {
        MediaCodec::H265
    }

    fn add_packet(&mut self, packet: &MediaPacket) -> Option<&MediaFrame> {
        // A new timestamp always means a new frame, discarding any
        // unfinished previous one.
        if self.frame.has_timestamp() && self.frame.timestamp() != packet.ext_timestamp {
            self.reset_frame();
        }

        if !self.frame.has_timestamp() {
            self.frame.set_timestamp(packet.ext_timestamp);
            self.frame.set_clock_rate(packet.clock_rate);
            self.frame.set_time(packet.time);
            self.frame.set_sender_time(packet.sender_time);
        }
        self.frame.set_ssrc(packet.ssrc);

        match self.add_payload(packet.media_data()) {
            PayloadOutcome::Aborted => None,
            _ => Some(&self.frame),
        }
    }

    fn reset(&mut self) {
        self.reset_frame();
    }
}
