//! RTP stream transponder
//!
//! Attaches to one incoming media stream and republishes it to an
//! outgoing sender under a new identity. Every forwarded packet gets its
//! sequence number and timestamp rewritten through an affine mapping
//!
//! ```text
//! out = in - first + base - dropped + added
//! ```
//!
//! so locally dropped packets (layer filtering, empty payloads) leave no
//! gap downstream, while inserted packets (out-of-band parameter sets)
//! shift the numbering forward. Rebinding to another incoming stream
//! re-latches `base` to continue right after the last forwarded packet.
//!
//! Keyframe requests to the upstream receiver are rate limited so a storm
//! of downstream PLIs does not hammer the sender.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, warn};

use mediaswitch_rtp_core::time::now_ms;
use mediaswitch_rtp_core::{
    LayerInfo, LayerSelection, MediaCodec, MediaPacket, MediaStreamListener,
    RtpIncomingMediaStream, RtpReceiver, RtpSender, RtpSsrc, VideoLayerSelector, NO_SEQ_NUM,
    NO_TIMESTAMP,
};

use crate::error::{Error, Result};
use crate::selector;

/// Configuration for a stream transponder.
#[derive(Debug, Clone)]
pub struct TransponderConfig {
    /// Minimum spacing between keyframe requests to the upstream sender.
    pub pli_min_interval_ms: u64,
}

impl Default for TransponderConfig {
    fn default() -> Self {
        Self {
            pli_min_interval_ms: 500,
        }
    }
}

struct TransponderState {
    incoming: Option<Arc<dyn RtpIncomingMediaStream>>,
    receiver: Option<Arc<dyn RtpReceiver>>,
    selector: Option<Box<dyn VideoLayerSelector>>,
    target: LayerInfo,
    first_ext_seq: u32,
    base_ext_seq: u32,
    last_ext_seq: u32,
    first_ext_ts: u64,
    base_ext_ts: u64,
    last_ext_ts: u64,
    last_in_ts: u64,
    dropped: u32,
    added: u32,
    reset: bool,
    last_sent_pli: u64,
    h264_parameters: Option<Bytes>,
    send_parameters: bool,
    num_forwarded: u64,
    num_dropped: u64,
}

/// Rewrites and forwards one incoming stream to an outgoing sender.
pub struct RtpStreamTransponder {
    ssrc: RtpSsrc,
    config: TransponderConfig,
    sender: Arc<dyn RtpSender>,
    muted: AtomicBool,
    state: Mutex<TransponderState>,
}

impl RtpStreamTransponder {
    /// Create a transponder publishing under `ssrc` to `sender`.
    pub fn new(ssrc: RtpSsrc, sender: Arc<dyn RtpSender>, config: TransponderConfig) -> Self {
        Self {
            ssrc,
            config,
            sender,
            muted: AtomicBool::new(false),
            state: Mutex::new(TransponderState {
                incoming: None,
                receiver: None,
                selector: None,
                target: LayerInfo::no_restriction(),
                first_ext_seq: NO_SEQ_NUM,
                base_ext_seq: 0,
                last_ext_seq: 0,
                first_ext_ts: NO_TIMESTAMP,
                base_ext_ts: 0,
                last_ext_ts: 0,
                last_in_ts: NO_TIMESTAMP,
                dropped: 0,
                added: 0,
                reset: false,
                last_sent_pli: 0,
                h264_parameters: None,
                send_parameters: false,
                num_forwarded: 0,
                num_dropped: 0,
            }),
        }
    }

    /// Outgoing ssrc this transponder publishes under.
    pub fn ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    /// Packets forwarded so far.
    pub fn num_forwarded(&self) -> u64 {
        self.state.lock().num_forwarded
    }

    /// Packets locally dropped (and erased from the output numbering).
    pub fn num_dropped(&self) -> u64 {
        self.state.lock().num_dropped
    }

    /// Bind to an incoming stream, replacing any previous binding.
    ///
    /// The transponder registers itself as a packet listener on the
    /// stream. Output numbering continues seamlessly from the previous
    /// binding, and a keyframe is requested so the new source becomes
    /// decodable as soon as possible.
    pub fn set_incoming(
        self: &Arc<Self>,
        stream: Arc<dyn RtpIncomingMediaStream>,
        receiver: Option<Arc<dyn RtpReceiver>>,
    ) {
        let old = {
            let mut state = self.state.lock();
            let old = state.incoming.take();
            debug!(
                "transponder ssrc:{} attaching to incoming ssrc:{}",
                self.ssrc,
                stream.media_ssrc()
            );
            state.incoming = Some(stream.clone());
            state.receiver = receiver;
            state.selector = None;
            state.reset = true;
            if state.h264_parameters.is_some() {
                state.send_parameters = true;
            }
            old
        };
        if let Some(old) = old {
            let listener: Arc<dyn MediaStreamListener> = self.clone();
            old.remove_listener(&listener);
        }
        stream.add_listener(self.clone());
        self.request_update();
    }

    /// Detach from the incoming stream. Idempotent.
    pub fn close(self: &Arc<Self>) {
        let old = {
            let mut state = self.state.lock();
            state.receiver = None;
            state.incoming.take()
        };
        if let Some(old) = old {
            let listener: Arc<dyn MediaStreamListener> = self.clone();
            old.remove_listener(&listener);
            debug!("transponder ssrc:{} closed", self.ssrc);
        }
    }

    /// Suppress (or resume) forwarding.
    ///
    /// Muted packets are not erased from the output numbering, so the
    /// receiver sees an honest gap and can NACK if it wants to. Unmuting
    /// requests a keyframe to resynchronize the decoder.
    pub fn mute(&self, muting: bool) {
        if self.muted.swap(muting, Ordering::Relaxed) != muting {
            debug!("transponder ssrc:{} muted:{}", self.ssrc, muting);
            if !muting {
                self.request_update();
            }
        }
    }

    /// Install a custom layer selector, replacing the codec default.
    ///
    /// The current layer targets are applied to it. Without this call a
    /// selector is created from the codec of the first forwarded packet.
    pub fn set_layer_selector(&self, mut selector: Box<dyn VideoLayerSelector>) {
        let mut state = self.state.lock();
        selector.select_spatial_layer(state.target.spatial_layer_id);
        selector.select_temporal_layer(state.target.temporal_layer_id);
        state.selector = Some(selector);
    }

    /// Restrict forwarding to the given spatial and temporal layers.
    ///
    /// Use [`LayerInfo::MAX_LAYER_ID`] to lift a restriction.
    pub fn select_layer(&self, spatial_layer_id: u8, temporal_layer_id: u8) {
        let spatial_changed = {
            let mut state = self.state.lock();
            let changed = state.target.spatial_layer_id != spatial_layer_id;
            state.target = LayerInfo {
                spatial_layer_id,
                temporal_layer_id,
            };
            if let Some(selector) = state.selector.as_mut() {
                selector.select_spatial_layer(spatial_layer_id);
                selector.select_temporal_layer(temporal_layer_id);
            }
            if changed && state.h264_parameters.is_some() {
                state.send_parameters = true;
            }
            changed
        };
        // A spatial move needs a keyframe at the new resolution.
        if spatial_changed {
            self.request_update();
        }
    }

    /// Ask the upstream sender for a keyframe, at most once per the
    /// configured interval.
    pub fn request_update(&self) -> bool {
        self.request_update_at(now_ms())
    }

    /// Rate-limited keyframe request at an explicit time (milliseconds).
    ///
    /// The refractory window starts only when a request is actually
    /// issued; an attempt with no receiver bound does not consume it.
    pub fn request_update_at(&self, now: u64) -> bool {
        let (receiver, media_ssrc) = {
            let mut state = self.state.lock();
            if state.last_sent_pli != 0
                && now.saturating_sub(state.last_sent_pli) < self.config.pli_min_interval_ms
            {
                return false;
            }
            let receiver = match state.receiver.clone() {
                Some(receiver) => receiver,
                None => return false,
            };
            state.last_sent_pli = now;
            (
                receiver,
                state.incoming.as_ref().map(|s| s.media_ssrc()).unwrap_or(0),
            )
        };
        receiver.send_pli(media_ssrc)
    }

    /// Pass a downstream bandwidth estimate to the upstream receiver.
    pub fn on_remb(&self, bitrate: u32) {
        let (receiver, media_ssrc) = {
            let state = self.state.lock();
            (
                state.receiver.clone(),
                state.incoming.as_ref().map(|s| s.media_ssrc()).unwrap_or(0),
            )
        };
        if let Some(receiver) = receiver {
            receiver.on_bitrate_estimate(media_ssrc, bitrate);
        }
    }

    /// Store out-of-band H.264 parameter sets from a comma-separated
    /// base64 `sprop-parameter-sets` value.
    ///
    /// They are packed into a single STAP-A payload and injected into the
    /// output right before the next frame whenever the binding or the
    /// spatial layer changes.
    pub fn append_h264_parameter_sets(&self, sprop: &str) -> Result<()> {
        let mut payload: Vec<u8> = vec![0x18]; // STAP-A
        for encoded in sprop.split(',') {
            let unit = base64::decode(encoded).map_err(|e| Error::InvalidParameterSets {
                details: format!("bad base64 in sprop-parameter-sets: {e}"),
            })?;
            if unit.is_empty() {
                return Err(Error::InvalidParameterSets {
                    details: "empty parameter set".into(),
                });
            }
            payload.extend_from_slice(&(unit.len() as u16).to_be_bytes());
            payload.extend_from_slice(&unit);
        }
        let mut state = self.state.lock();
        state.h264_parameters = Some(Bytes::from(payload));
        state.send_parameters = true;
        Ok(())
    }

    fn handle_rtp(&self, packet: &MediaPacket) {
        let mut out: Vec<MediaPacket> = Vec::with_capacity(2);
        let mut request_keyframe = false;
        {
            let mut state = self.state.lock();

            // Rebind discontinuity: continue numbering right after the
            // last forwarded packet.
            if state.reset {
                if state.first_ext_seq != NO_SEQ_NUM {
                    state.base_ext_seq = state.last_ext_seq.wrapping_add(1);
                    state.base_ext_ts = state.last_ext_ts.wrapping_add(1);
                }
                state.first_ext_seq = NO_SEQ_NUM;
                state.first_ext_ts = NO_TIMESTAMP;
                state.last_in_ts = NO_TIMESTAMP;
                state.dropped = 0;
                state.added = 0;
                state.reset = false;
            }

            if state.selector.is_none() {
                let mut sel = selector::for_codec(packet.codec);
                sel.select_spatial_layer(state.target.spatial_layer_id);
                sel.select_temporal_layer(state.target.temporal_layer_id);
                state.selector = Some(sel);
            }

            if state.first_ext_seq == NO_SEQ_NUM {
                state.first_ext_seq = packet.ext_seq_num;
                state.first_ext_ts = packet.ext_timestamp;
            }

            // Padding-only packets carry nothing a receiver needs unless
            // they close a frame.
            if packet.media_length() == 0 && !packet.mark {
                state.dropped = state.dropped.wrapping_add(1);
                state.num_dropped += 1;
                return;
            }

            let selection = match state
                .selector
                .as_mut()
                .and_then(|sel| sel.select(packet))
            {
                Some(selection) => selection,
                None => {
                    warn!(
                        "transponder ssrc:{} unselectable payload, dropping seq:{}",
                        self.ssrc,
                        packet.seq_num()
                    );
                    request_keyframe = true;
                    LayerSelection::drop()
                }
            };

            if !selection.forward {
                state.dropped = state.dropped.wrapping_add(1);
                state.num_dropped += 1;
            } else {
                if self.muted.load(Ordering::Relaxed) {
                    // No dropped increment: the gap stays visible.
                    return;
                }

                let out_ts = packet
                    .ext_timestamp
                    .wrapping_sub(state.first_ext_ts)
                    .wrapping_add(state.base_ext_ts);

                // Inject stored parameter sets at the start of the next
                // frame after a binding or layer change.
                if state.send_parameters
                    && packet.codec == MediaCodec::H264
                    && packet.ext_timestamp != state.last_in_ts
                {
                    if let Some(parameters) = state.h264_parameters.clone() {
                        let seq = packet
                            .ext_seq_num
                            .wrapping_sub(state.first_ext_seq)
                            .wrapping_add(state.base_ext_seq)
                            .wrapping_sub(state.dropped)
                            .wrapping_add(state.added);
                        let mut sps = MediaPacket::new(
                            self.ssrc,
                            packet.payload_type,
                            packet.codec,
                            seq,
                            out_ts,
                            false,
                            parameters,
                        );
                        sps.clock_rate = packet.clock_rate;
                        sps.time = packet.time;
                        state.added = state.added.wrapping_add(1);
                        state.send_parameters = false;
                        out.push(sps);
                    }
                }

                let out_seq = packet
                    .ext_seq_num
                    .wrapping_sub(state.first_ext_seq)
                    .wrapping_add(state.base_ext_seq)
                    .wrapping_sub(state.dropped)
                    .wrapping_add(state.added);

                let payload = if selection.patches.is_empty() {
                    packet.payload.clone()
                } else {
                    let mut bytes = packet.payload.to_vec();
                    for patch in &selection.patches {
                        let end = patch.offset + patch.bytes.len();
                        if end <= bytes.len() {
                            bytes[patch.offset..end].copy_from_slice(&patch.bytes);
                        }
                    }
                    Bytes::from(bytes)
                };

                let mut forwarded = MediaPacket::new(
                    self.ssrc,
                    packet.payload_type,
                    packet.codec,
                    out_seq,
                    out_ts,
                    selection.mark,
                    payload,
                );
                forwarded.clock_rate = packet.clock_rate;
                forwarded.time = packet.time;
                forwarded.sender_time = packet.sender_time;

                state.last_ext_seq = out_seq;
                state.last_ext_ts = out_ts;
                state.last_in_ts = packet.ext_timestamp;
                state.num_forwarded += 1;
                out.push(forwarded);
            }
        }

        for packet in &out {
            self.sender.send(packet);
        }
        if request_keyframe {
            self.request_update();
        }
    }
}

impl MediaStreamListener for RtpStreamTransponder {
    fn on_rtp(&self, _ssrc: RtpSsrc, packet: &MediaPacket) {
        self.handle_rtp(packet);
    }

    fn on_bye(&self, _ssrc: RtpSsrc) {
        // The source may resume; re-latch numbering when it does.
        self.state.lock().reset = true;
    }

    fn on_ended(&self, ssrc: RtpSsrc) {
        let mut state = self.state.lock();
        let bound = state
            .incoming
            .as_ref()
            .map(|s| s.media_ssrc() == ssrc)
            .unwrap_or(false);
        if bound {
            state.incoming = None;
            state.receiver = None;
            state.reset = true;
            debug!("transponder ssrc:{} incoming stream ended", self.ssrc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaswitch_rtp_core::ListenerSet;
    use std::sync::atomic::AtomicUsize;

    struct SentLog {
        packets: Mutex<Vec<MediaPacket>>,
    }

    impl SentLog {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                packets: Mutex::new(Vec::new()),
            })
        }

        fn seqs(&self) -> Vec<u32> {
            self.packets.lock().iter().map(|p| p.ext_seq_num).collect()
        }
    }

    impl RtpSender for SentLog {
        fn send(&self, packet: &MediaPacket) {
            self.packets.lock().push(packet.clone());
        }
    }

    struct FakeStream {
        ssrc: RtpSsrc,
        listeners: ListenerSet<dyn MediaStreamListener>,
    }

    impl FakeStream {
        fn new(ssrc: RtpSsrc) -> Arc<Self> {
            Arc::new(Self {
                ssrc,
                listeners: ListenerSet::new(),
            })
        }

        fn push(&self, packet: &MediaPacket) {
            for listener in self.listeners.snapshot() {
                listener.on_rtp(self.ssrc, packet);
            }
        }
    }

    impl RtpIncomingMediaStream for FakeStream {
        fn media_ssrc(&self) -> RtpSsrc {
            self.ssrc
        }

        fn add_listener(&self, listener: Arc<dyn MediaStreamListener>) {
            self.listeners.add(listener);
        }

        fn remove_listener(&self, listener: &Arc<dyn MediaStreamListener>) {
            self.listeners.remove(listener);
        }
    }

    struct FakeReceiver {
        plis: AtomicUsize,
    }

    impl FakeReceiver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                plis: AtomicUsize::new(0),
            })
        }
    }

    impl RtpReceiver for FakeReceiver {
        fn send_pli(&self, _ssrc: RtpSsrc) -> bool {
            self.plis.fetch_add(1, Ordering::Relaxed);
            true
        }

        fn reset(&self, _ssrc: RtpSsrc) -> bool {
            true
        }
    }

    fn h265_packet(seq: u32, ts: u64, mark: bool, tid: u8) -> MediaPacket {
        MediaPacket::new(
            0x2000,
            96,
            MediaCodec::H265,
            seq,
            ts,
            mark,
            Bytes::copy_from_slice(&[0x02, 0x01 + tid]),
        )
    }

    fn transponder() -> (Arc<RtpStreamTransponder>, Arc<SentLog>) {
        let log = SentLog::new();
        let transponder = Arc::new(RtpStreamTransponder::new(
            0x9000,
            log.clone(),
            TransponderConfig::default(),
        ));
        (transponder, log)
    }

    #[test]
    fn test_rewrite_is_dense_across_drops() {
        let (transponder, log) = transponder();
        let stream = FakeStream::new(0x2000);
        transponder.set_incoming(stream.clone(), None);
        transponder.select_layer(LayerInfo::MAX_LAYER_ID, 0);

        stream.push(&h265_packet(100, 9000, false, 0));
        stream.push(&h265_packet(101, 9000, true, 0));
        // Higher temporal sub-layer, filtered out.
        stream.push(&h265_packet(102, 12000, true, 1));
        stream.push(&h265_packet(103, 15000, true, 0));

        // The dropped packet leaves no hole in the output numbering.
        assert_eq!(log.seqs(), vec![0, 1, 2]);
        assert_eq!(transponder.num_dropped(), 1);
        let packets = log.packets.lock();
        assert_eq!(packets[0].ssrc, 0x9000);
        assert_eq!(packets[0].ext_timestamp, 0);
        assert_eq!(packets[2].ext_timestamp, 6000);
    }

    #[test]
    fn test_empty_non_marker_is_erased() {
        let (transponder, log) = transponder();
        let stream = FakeStream::new(0x2000);
        transponder.set_incoming(stream.clone(), None);

        stream.push(&h265_packet(10, 9000, false, 0));
        let padding = MediaPacket::new(0x2000, 96, MediaCodec::H265, 11, 9000, false, Bytes::new());
        stream.push(&padding);
        stream.push(&h265_packet(12, 9000, true, 0));

        assert_eq!(log.seqs(), vec![0, 1]);
    }

    #[test]
    fn test_rebind_continues_numbering() {
        let (transponder, log) = transponder();
        let first = FakeStream::new(0x2000);
        transponder.set_incoming(first.clone(), None);
        first.push(&h265_packet(500, 90_000, true, 0));
        first.push(&h265_packet(501, 93_000, true, 0));

        // New source with a completely unrelated numbering.
        let second = FakeStream::new(0x3000);
        transponder.set_incoming(second.clone(), None);
        second.push(&h265_packet(77, 1_000_000, true, 0));

        assert_eq!(log.seqs(), vec![0, 1, 2]);
        let packets = log.packets.lock();
        // Timestamps continue one tick after the last forwarded packet.
        assert_eq!(packets[1].ext_timestamp, 3000);
        assert_eq!(packets[2].ext_timestamp, 3001);

        // The first stream no longer feeds the transponder.
        drop(packets);
        first.push(&h265_packet(502, 96_000, true, 0));
        assert_eq!(log.seqs().len(), 3);
    }

    #[test]
    fn test_mute_leaves_visible_gap() {
        let (transponder, log) = transponder();
        let stream = FakeStream::new(0x2000);
        transponder.set_incoming(stream.clone(), None);

        stream.push(&h265_packet(0, 9000, true, 0));
        transponder.mute(true);
        stream.push(&h265_packet(1, 12000, true, 0));
        stream.push(&h265_packet(2, 15000, true, 0));
        transponder.mute(false);
        stream.push(&h265_packet(3, 18000, true, 0));

        // Muted packets keep their slots; the receiver sees the gap.
        assert_eq!(log.seqs(), vec![0, 3]);
    }

    #[test]
    fn test_pli_requests_are_throttled() {
        let (transponder, _log) = transponder();
        let stream = FakeStream::new(0x2000);
        let receiver = FakeReceiver::new();
        transponder.set_incoming(stream, Some(receiver.clone()));
        let initial = receiver.plis.load(Ordering::Relaxed);

        // Binding just requested a keyframe, so the window is still open.
        let t0 = now_ms();
        assert!(!transponder.request_update_at(t0));
        assert!(transponder.request_update_at(t0 + 1000));
        assert!(!transponder.request_update_at(t0 + 1400));
        assert!(transponder.request_update_at(t0 + 1500));

        assert_eq!(receiver.plis.load(Ordering::Relaxed), initial + 2);
    }

    #[test]
    fn test_unbound_pli_attempt_keeps_window_open() {
        let (transponder, _log) = transponder();
        // Nothing bound yet: the attempt fails without starting the
        // refractory window.
        assert!(!transponder.request_update_at(now_ms()));

        let stream = FakeStream::new(0x2000);
        let receiver = FakeReceiver::new();
        transponder.set_incoming(stream, Some(receiver.clone()));
        // The keyframe request issued by binding went through right away.
        assert_eq!(receiver.plis.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_parameter_sets_injected_before_next_frame() {
        let (transponder, log) = transponder();
        let stream = FakeStream::new(0x2000);
        transponder.set_incoming(stream.clone(), None);

        // "AA==" -> [0x00], "AQ==" -> [0x01]
        transponder.append_h264_parameter_sets("AA==,AQ==").unwrap();

        let packet = MediaPacket::new(
            0x2000,
            97,
            MediaCodec::H264,
            40,
            9000,
            true,
            Bytes::from_static(&[0x65, 0x88]),
        );
        stream.push(&packet);

        let packets = log.packets.lock();
        assert_eq!(packets.len(), 2);
        // STAP-A with two single-byte units.
        assert_eq!(
            packets[0].media_data(),
            &[0x18, 0x00, 0x01, 0x00, 0x00, 0x01, 0x01]
        );
        assert_eq!(packets[0].ext_seq_num, 0);
        assert!(!packets[0].mark);
        assert_eq!(packets[1].ext_seq_num, 1);
        assert_eq!(packets[1].media_data(), &[0x65, 0x88]);

        // Only once per change.
        drop(packets);
        let next = MediaPacket::new(
            0x2000,
            97,
            MediaCodec::H264,
            41,
            12000,
            true,
            Bytes::from_static(&[0x41, 0x9a]),
        );
        stream.push(&next);
        assert_eq!(log.seqs(), vec![0, 1, 2]);
    }

    /// Selector that rewrites the second payload byte of every packet.
    struct PatchingSelector;

    impl VideoLayerSelector for PatchingSelector {
        fn select_spatial_layer(&mut self, _id: u8) {}
        fn select_temporal_layer(&mut self, _id: u8) {}

        fn spatial_layer_id(&self) -> u8 {
            LayerInfo::MAX_LAYER_ID
        }

        fn temporal_layer_id(&self) -> u8 {
            LayerInfo::MAX_LAYER_ID
        }

        fn select(&mut self, packet: &MediaPacket) -> Option<mediaswitch_rtp_core::LayerSelection> {
            let mut selection = mediaswitch_rtp_core::LayerSelection::forward(packet.mark);
            selection.patches.push(mediaswitch_rtp_core::PayloadPatch {
                offset: 1,
                bytes: vec![0x7f],
            });
            Some(selection)
        }
    }

    #[test]
    fn test_selector_patches_rewrite_the_forwarded_copy() {
        let (transponder, log) = transponder();
        let stream = FakeStream::new(0x2000);
        transponder.set_incoming(stream.clone(), None);
        transponder.set_layer_selector(Box::new(PatchingSelector));

        let packet = h265_packet(0, 9000, true, 0);
        stream.push(&packet);

        let packets = log.packets.lock();
        assert_eq!(packets[0].media_data(), &[0x02, 0x7f]);
        // The original packet is untouched.
        assert_eq!(packet.media_data(), &[0x02, 0x01]);
    }

    #[test]
    fn test_bad_sprop_is_rejected() {
        let (transponder, _log) = transponder();
        let result = transponder.append_h264_parameter_sets("not!!base64");
        assert!(matches!(result, Err(Error::InvalidParameterSets { .. })));
    }

    #[test]
    fn test_close_detaches_listener() {
        let (transponder, log) = transponder();
        let stream = FakeStream::new(0x2000);
        transponder.set_incoming(stream.clone(), None);
        stream.push(&h265_packet(0, 9000, true, 0));
        transponder.close();
        transponder.close();
        stream.push(&h265_packet(1, 12000, true, 0));
        assert_eq!(log.seqs(), vec![0]);
    }
}
