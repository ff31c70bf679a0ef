//! RTP packet view used across the forwarding pipeline
//!
//! A [`MediaPacket`] is the unit handed to depacketizers and transponders.
//! It is not a wire parser: the transport layer has already validated the
//! RTP header, unwrapped the sequence number and timestamp, and stripped
//! header extensions, leaving only the fields the forwarding core needs.

use bytes::Bytes;

use crate::frame::MediaCodec;
use crate::{RtpExtSeqNum, RtpExtTimestamp, RtpSsrc};

/// One RTP packet belonging to an incoming media source.
#[derive(Debug, Clone)]
pub struct MediaPacket {
    /// Synchronization source of the packet.
    pub ssrc: RtpSsrc,
    /// RTP payload type.
    pub payload_type: u8,
    /// Codec carried by the payload.
    pub codec: MediaCodec,
    /// Extended (unwrapped) sequence number.
    pub ext_seq_num: RtpExtSeqNum,
    /// Extended (unwrapped) RTP timestamp, in clock-rate units.
    pub ext_timestamp: RtpExtTimestamp,
    /// RTP clock rate in Hz.
    pub clock_rate: u32,
    /// Marker bit; true on the last packet of a frame.
    pub mark: bool,
    /// Wall-clock receive/capture time in milliseconds.
    pub time: u64,
    /// Sender-reported time in milliseconds, zero when unknown.
    pub sender_time: u64,
    /// Codec payload bytes (RTP header already stripped).
    pub payload: Bytes,
}

impl MediaPacket {
    /// Create a packet with the given identity and payload.
    pub fn new(
        ssrc: RtpSsrc,
        payload_type: u8,
        codec: MediaCodec,
        ext_seq_num: RtpExtSeqNum,
        ext_timestamp: RtpExtTimestamp,
        mark: bool,
        payload: Bytes,
    ) -> Self {
        Self {
            ssrc,
            payload_type,
            codec,
            ext_seq_num,
            ext_timestamp,
            clock_rate: codec.clock_rate(),
            mark,
            time: 0,
            sender_time: 0,
            payload,
        }
    }

    /// Codec payload bytes.
    pub fn media_data(&self) -> &[u8] {
        &self.payload
    }

    /// Length of the codec payload in bytes.
    pub fn media_length(&self) -> usize {
        self.payload.len()
    }

    /// The wrapped 16-bit sequence number as it appears on the wire.
    pub fn seq_num(&self) -> u16 {
        self.ext_seq_num as u16
    }

    /// The wrapped 32-bit timestamp as it appears on the wire.
    pub fn timestamp(&self) -> u32 {
        self.ext_timestamp as u32
    }
}
