//! Media frame listener bridge
//!
//! Sits between an upstream frame producer (a depacketizer, or a local
//! encoder worker) and downstream consumers that want either frames or an
//! ordinary incoming RTP packet stream. Frames are fanned out
//! synchronously; the packet view is re-derived from each frame's
//! packetization records: the bridge never synthesizes new wire headers,
//! it replays the regions captured during depacketization under a fresh
//! ssrc/sequence/timestamp identity.
//!
//! With smoothing enabled the derived packets are spread across the
//! frame's nominal duration and released by the periodic [`update`] tick,
//! so a consumer expecting realistic network pacing does not see them
//! bursted.
//!
//! [`update`]: MediaFrameListenerBridge::update

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use mediaswitch_rtp_core::time::{now_ms, rtp_ticks_to_ms};
use mediaswitch_rtp_core::{
    Accumulator, ListenerSet, MediaFrame, MediaFrameListener, MediaPacket, MediaStreamListener,
    RtpIncomingMediaStream, RtpReceiver, RtpSsrc, NO_TIMESTAMP,
};

/// Configuration for a frame listener bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Spread derived packets across the frame duration instead of
    /// releasing them immediately.
    pub smooth: bool,
    /// Payload type stamped on derived packets.
    pub payload_type: u8,
    /// Frame duration assumed when no timestamp delta is available yet.
    pub default_frame_duration_ms: u64,
    /// Window for the bitrate/frame-rate/packet-rate accumulators.
    pub rate_window_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            smooth: false,
            payload_type: 96,
            default_frame_duration_ms: 33,
            rate_window_ms: 1000,
        }
    }
}

/// Traffic and pacing statistics of a bridge.
#[derive(Debug, Clone, Default)]
pub struct BridgeStats {
    /// Frames accepted.
    pub num_frames: u64,
    /// Packets derived from accepted frames.
    pub num_packets: u64,
    /// Total frame bytes accepted.
    pub total_bytes: u64,
    /// Instantaneous bitrate in bits per second.
    pub bitrate_bps: f64,
    /// Instantaneous frame rate per second.
    pub frame_rate: f64,
    /// Instantaneous packet rate per second.
    pub packet_rate: f64,
    /// Shortest time a smoothed packet waited before dispatch.
    pub min_waited_ms: u64,
    /// Longest time a smoothed packet waited before dispatch.
    pub max_waited_ms: u64,
    /// Exponential average of smoothed packet wait times.
    pub avg_waited_ms: f64,
}

struct PendingPacket {
    packet: MediaPacket,
    due: u64,
    enqueued: u64,
}

struct BridgeState {
    pending: VecDeque<PendingPacket>,
    ext_seq_num: u32,
    reset: bool,
    first_timestamp: u64,
    base_timestamp: u64,
    last_timestamp: u64,
    last_time: u64,
    num_frames: u64,
    num_packets: u64,
    num_dispatched: u64,
    total_bytes: u64,
    acc_bitrate: Accumulator,
    acc_frames: Accumulator,
    acc_packets: Accumulator,
    min_waited_ms: u64,
    max_waited_ms: u64,
    avg_waited_ms: f64,
}

/// Bridge fanning out frames and a derived packet stream.
pub struct MediaFrameListenerBridge {
    ssrc: RtpSsrc,
    config: BridgeConfig,
    frame_listeners: ListenerSet<dyn MediaFrameListener>,
    rtp_listeners: ListenerSet<dyn MediaStreamListener>,
    muted: AtomicBool,
    stopped: AtomicBool,
    state: Mutex<BridgeState>,
}

impl MediaFrameListenerBridge {
    /// Create a bridge exposing its derived packet stream under `ssrc`.
    pub fn new(ssrc: RtpSsrc, config: BridgeConfig) -> Self {
        let rate_window = config.rate_window_ms;
        Self {
            ssrc,
            config,
            frame_listeners: ListenerSet::new(),
            rtp_listeners: ListenerSet::new(),
            muted: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            state: Mutex::new(BridgeState {
                pending: VecDeque::new(),
                ext_seq_num: 0,
                reset: false,
                first_timestamp: NO_TIMESTAMP,
                base_timestamp: 0,
                last_timestamp: 0,
                last_time: 0,
                num_frames: 0,
                num_packets: 0,
                num_dispatched: 0,
                total_bytes: 0,
                acc_bitrate: Accumulator::new(rate_window),
                acc_frames: Accumulator::new(rate_window),
                acc_packets: Accumulator::new(rate_window),
                min_waited_ms: 0,
                max_waited_ms: 0,
                avg_waited_ms: 0.0,
            }),
        }
    }

    /// Register a frame-level consumer.
    pub fn add_media_listener(&self, listener: Arc<dyn MediaFrameListener>) {
        self.frame_listeners.add(listener);
    }

    /// Unregister a frame-level consumer.
    pub fn remove_media_listener(&self, listener: &Arc<dyn MediaFrameListener>) {
        self.frame_listeners.remove(listener);
    }

    /// Accept a completed frame at the current wall-clock time.
    pub fn on_media_frame(&self, frame: &MediaFrame) {
        self.on_media_frame_at(now_ms(), frame);
    }

    /// Accept a completed frame at an explicit time (milliseconds).
    pub fn on_media_frame_at(&self, now: u64, frame: &MediaFrame) {
        if self.stopped.load(Ordering::Relaxed) {
            return;
        }
        let muted = self.muted.load(Ordering::Relaxed);
        let mut immediate: Vec<MediaPacket> = Vec::new();

        {
            let mut state = self.state.lock();

            // Source discontinuity: re-latch the base so the derived
            // timestamps continue monotonically.
            if state.reset {
                if state.first_timestamp != NO_TIMESTAMP {
                    state.base_timestamp = state.last_timestamp.wrapping_add(1);
                }
                state.first_timestamp = NO_TIMESTAMP;
                state.reset = false;
            }
            if state.first_timestamp == NO_TIMESTAMP {
                state.first_timestamp = frame.timestamp();
            }
            let out_ts = frame
                .timestamp()
                .wrapping_sub(state.first_timestamp)
                .wrapping_add(state.base_timestamp);

            let had_previous = state.num_frames > 0;
            state.num_frames += 1;
            state.total_bytes += frame.length() as u64;
            state.acc_bitrate.update(now, frame.length() as u64 * 8);
            state.acc_frames.update(now, 1);

            let duration_ms = if had_previous && out_ts > state.last_timestamp {
                rtp_ticks_to_ms(out_ts - state.last_timestamp, frame.clock_rate()).clamp(1, 1000)
            } else {
                self.config.default_frame_duration_ms
            };

            let records = frame.packetization();
            let count = records.len();
            for (index, record) in records.iter().enumerate() {
                let mut payload = Vec::with_capacity(record.prefix.len() + record.len);
                payload.extend_from_slice(&record.prefix);
                payload.extend_from_slice(&frame.data()[record.pos..record.pos + record.len]);

                let mut packet = MediaPacket::new(
                    self.ssrc,
                    self.config.payload_type,
                    frame.codec(),
                    state.ext_seq_num,
                    out_ts,
                    index + 1 == count,
                    Bytes::from(payload),
                );
                packet.clock_rate = frame.clock_rate();
                packet.time = now;
                packet.sender_time = frame.sender_time();

                state.ext_seq_num = state.ext_seq_num.wrapping_add(1);
                state.num_packets += 1;

                if muted {
                    continue;
                }
                if self.config.smooth {
                    let due = now + (index as u64 * duration_ms) / count.max(1) as u64;
                    state.pending.push_back(PendingPacket {
                        packet,
                        due,
                        enqueued: now,
                    });
                } else {
                    immediate.push(packet);
                }
            }
            state.acc_packets.update(now, count as u64);
            state.last_timestamp = out_ts;
            state.last_time = frame.time();
        }

        if muted {
            return;
        }

        for listener in self.frame_listeners.snapshot() {
            listener.on_media_frame(self.ssrc, frame);
        }
        if !immediate.is_empty() {
            let listeners = self.rtp_listeners.snapshot();
            for packet in &immediate {
                for listener in &listeners {
                    listener.on_rtp(self.ssrc, packet);
                }
            }
        }
    }

    /// Flush packets whose dispatch time has elapsed.
    pub fn update(&self) {
        self.update_at(now_ms());
    }

    /// Flush due packets at an explicit time (milliseconds).
    pub fn update_at(&self, now: u64) {
        if self.stopped.load(Ordering::Relaxed) {
            return;
        }
        let mut due: Vec<MediaPacket> = Vec::new();
        {
            let mut state = self.state.lock();
            while state.pending.front().map_or(false, |p| p.due <= now) {
                let Some(pending) = state.pending.pop_front() else {
                    break;
                };
                let waited = now.saturating_sub(pending.enqueued);
                if state.num_dispatched == 0 {
                    state.min_waited_ms = waited;
                    state.max_waited_ms = waited;
                    state.avg_waited_ms = waited as f64;
                } else {
                    state.min_waited_ms = state.min_waited_ms.min(waited);
                    state.max_waited_ms = state.max_waited_ms.max(waited);
                    state.avg_waited_ms = (state.avg_waited_ms * 7.0 + waited as f64) / 8.0;
                }
                state.num_dispatched += 1;
                due.push(pending.packet);
            }
        }

        if due.is_empty() || self.muted.load(Ordering::Relaxed) {
            return;
        }
        let listeners = self.rtp_listeners.snapshot();
        for packet in &due {
            for listener in &listeners {
                listener.on_rtp(self.ssrc, packet);
            }
        }
    }

    /// Suppress (or resume) dispatch without disturbing accounting.
    ///
    /// Frames received while muted still advance sequence/timestamp
    /// bookkeeping so unmuting does not reintroduce a discontinuity.
    pub fn mute(&self, muting: bool) {
        if self.muted.swap(muting, Ordering::Relaxed) != muting {
            debug!("bridge ssrc:{} muted:{}", self.ssrc, muting);
        }
    }

    /// Re-latch the timestamp base on the next frame after a source
    /// discontinuity.
    pub fn reset(&self) {
        self.state.lock().reset = true;
    }

    /// Terminate dispatch and notify packet listeners that the stream
    /// ended. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::Relaxed) {
            return;
        }
        self.state.lock().pending.clear();
        for listener in self.rtp_listeners.snapshot() {
            listener.on_ended(self.ssrc);
        }
        self.rtp_listeners.clear();
        self.frame_listeners.clear();
        debug!("bridge ssrc:{} stopped", self.ssrc);
    }

    /// Spawn a tokio task driving [`update`](Self::update) every `period`.
    ///
    /// The task ends on its first tick after [`stop`](Self::stop).
    pub fn spawn_dispatch_timer(
        self: &Arc<Self>,
        period: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if bridge.stopped.load(Ordering::Relaxed) {
                    break;
                }
                bridge.update();
            }
        })
    }

    /// Current traffic and pacing statistics.
    pub fn stats(&self) -> BridgeStats {
        let state = self.state.lock();
        BridgeStats {
            num_frames: state.num_frames,
            num_packets: state.num_packets,
            total_bytes: state.total_bytes,
            bitrate_bps: state.acc_bitrate.instant_avg(),
            frame_rate: state.acc_frames.instant_avg(),
            packet_rate: state.acc_packets.instant_avg(),
            min_waited_ms: state.min_waited_ms,
            max_waited_ms: state.max_waited_ms,
            avg_waited_ms: state.avg_waited_ms,
        }
    }
}

impl MediaFrameListener for MediaFrameListenerBridge {
    fn on_media_frame(&self, _ssrc: RtpSsrc, frame: &MediaFrame) {
        MediaFrameListenerBridge::on_media_frame(self, frame);
    }
}

impl RtpIncomingMediaStream for MediaFrameListenerBridge {
    fn media_ssrc(&self) -> RtpSsrc {
        self.ssrc
    }

    fn add_listener(&self, listener: Arc<dyn MediaStreamListener>) {
        self.rtp_listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn MediaStreamListener>) {
        self.rtp_listeners.remove(listener);
    }
}

impl RtpReceiver for MediaFrameListenerBridge {
    fn send_pli(&self, _ssrc: RtpSsrc) -> bool {
        // Local frame producers have no remote sender to ask.
        true
    }

    fn reset(&self, _ssrc: RtpSsrc) -> bool {
        MediaFrameListenerBridge::reset(self);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaswitch_rtp_core::{MediaCodec, MediaType};
    use std::sync::atomic::AtomicUsize;

    struct Collector {
        packets: Mutex<Vec<MediaPacket>>,
        frames: Mutex<Vec<u64>>,
        ended: AtomicUsize,
    }

    impl Collector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                packets: Mutex::new(Vec::new()),
                frames: Mutex::new(Vec::new()),
                ended: AtomicUsize::new(0),
            })
        }
    }

    impl MediaStreamListener for Collector {
        fn on_rtp(&self, _ssrc: RtpSsrc, packet: &MediaPacket) {
            self.packets.lock().push(packet.clone());
        }

        fn on_ended(&self, _ssrc: RtpSsrc) {
            self.ended.fetch_add(1, Ordering::Relaxed);
        }
    }

    impl MediaFrameListener for Collector {
        fn on_media_frame(&self, _ssrc: RtpSsrc, frame: &MediaFrame) {
            self.frames.lock().push(frame.timestamp());
        }
    }

    /// A frame with `units` length-prefixed elementary units.
    fn frame_with_units(timestamp: u64, units: &[&[u8]]) -> MediaFrame {
        let mut frame = MediaFrame::new(MediaType::Video, MediaCodec::H265, 90000);
        frame.set_timestamp(timestamp);
        for unit in units {
            frame.append_media(&(unit.len() as u32).to_be_bytes());
            let pos = frame.append_media(unit);
            frame.add_rtp_packet(pos, unit.len(), &[]);
        }
        frame
    }

    #[test]
    fn test_immediate_dispatch_without_smoothing() {
        let bridge = Arc::new(MediaFrameListenerBridge::new(0x1000, BridgeConfig::default()));
        let collector = Collector::new();
        bridge.add_listener(collector.clone());
        bridge.add_media_listener(collector.clone());

        let frame = frame_with_units(90000, &[&[0x26, 0x01, 0xaa], &[0x02, 0x01, 0xbb]]);
        bridge.on_media_frame_at(0, &frame);

        // All derived packets were delivered before the call returned.
        let packets = collector.packets.lock();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].ext_seq_num, 0);
        assert_eq!(packets[1].ext_seq_num, 1);
        assert_eq!(packets[0].ssrc, 0x1000);
        assert!(!packets[0].mark);
        assert!(packets[1].mark);
        assert_eq!(packets[0].media_data(), &[0x26, 0x01, 0xaa]);
        assert_eq!(collector.frames.lock().len(), 1);
    }

    #[test]
    fn test_smoothing_spreads_packets() {
        let config = BridgeConfig {
            smooth: true,
            ..Default::default()
        };
        let bridge = Arc::new(MediaFrameListenerBridge::new(0x1000, config));
        let collector = Collector::new();
        bridge.add_listener(collector.clone());

        let frame = frame_with_units(90000, &[&[0xaa], &[0xbb]]);
        bridge.on_media_frame_at(0, &frame);
        // Nothing released until the timer tick.
        assert!(collector.packets.lock().is_empty());

        // First packet is due at t=0, second at half the 33ms default.
        bridge.update_at(0);
        assert_eq!(collector.packets.lock().len(), 1);
        bridge.update_at(10);
        assert_eq!(collector.packets.lock().len(), 1);
        bridge.update_at(16);
        assert_eq!(collector.packets.lock().len(), 2);

        let stats = bridge.stats();
        assert_eq!(stats.min_waited_ms, 0);
        assert_eq!(stats.max_waited_ms, 16);
    }

    #[test]
    fn test_mute_keeps_accounting_without_dispatch() {
        let bridge = Arc::new(MediaFrameListenerBridge::new(0x1000, BridgeConfig::default()));
        let collector = Collector::new();
        bridge.add_listener(collector.clone());
        bridge.add_media_listener(collector.clone());

        bridge.mute(true);
        bridge.on_media_frame_at(0, &frame_with_units(90000, &[&[0xaa], &[0xbb]]));
        assert!(collector.packets.lock().is_empty());
        assert!(collector.frames.lock().is_empty());
        assert_eq!(bridge.stats().num_packets, 2);

        // Unmuting resumes dispatch; the sequence numbering accounts for
        // the muted packets so there is no discontinuity.
        bridge.mute(false);
        bridge.on_media_frame_at(33, &frame_with_units(93000, &[&[0xcc]]));
        let packets = collector.packets.lock();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].ext_seq_num, 2);
    }

    #[test]
    fn test_reset_rebases_timestamps() {
        let bridge = Arc::new(MediaFrameListenerBridge::new(0x1000, BridgeConfig::default()));
        let collector = Collector::new();
        bridge.add_listener(collector.clone());

        bridge.on_media_frame_at(0, &frame_with_units(90000, &[&[0xaa]]));
        bridge.on_media_frame_at(33, &frame_with_units(93000, &[&[0xbb]]));
        MediaFrameListenerBridge::reset(&bridge);
        // A wildly different source timestamp lands right after the last
        // output, not at a jump.
        bridge.on_media_frame_at(66, &frame_with_units(700_000, &[&[0xcc]]));

        let packets = collector.packets.lock();
        assert_eq!(packets[0].ext_timestamp, 0);
        assert_eq!(packets[1].ext_timestamp, 3000);
        assert_eq!(packets[2].ext_timestamp, 3001);
    }

    #[test]
    fn test_stop_is_idempotent_and_ends_stream() {
        let bridge = Arc::new(MediaFrameListenerBridge::new(0x1000, BridgeConfig::default()));
        let collector = Collector::new();
        bridge.add_listener(collector.clone());

        bridge.stop();
        bridge.stop();
        assert_eq!(collector.ended.load(Ordering::Relaxed), 1);

        bridge.on_media_frame_at(0, &frame_with_units(90000, &[&[0xaa]]));
        assert!(collector.packets.lock().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_timer_stops_with_bridge() {
        let config = BridgeConfig {
            smooth: true,
            ..Default::default()
        };
        let bridge = Arc::new(MediaFrameListenerBridge::new(0x1000, config));
        let handle = bridge.spawn_dispatch_timer(Duration::from_millis(1));
        bridge.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("timer task should end after stop")
            .unwrap();
    }
}
