//! Simulcast layer combiner
//!
//! Accepts reassembled frames from several simulcast encodings of the same
//! source and exposes them downstream as one continuous stream. Layer
//! quality is judged by intra-frame size: the encoding producing the
//! biggest keyframes is carrying the most detail, independent of how the
//! sender ordered or announced its layers. Switches only happen on intra
//! frames, and output timestamps are rewritten so a decoder downstream
//! never observes the jump between the encodings' independent clocks.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, info};

use mediaswitch_rtp_core::time::now_ms;
use mediaswitch_rtp_core::{
    ListenerSet, MediaFrame, MediaFrameListener, RtpSsrc, NO_TIMESTAMP,
};

use crate::error::{Error, Result};

/// Bound on the pre-selection buffer for sources that never key.
const MAX_PENDING_FRAMES: usize = 128;

/// Configuration for a simulcast combiner.
#[derive(Debug, Clone)]
pub struct SimulcastConfig {
    /// Number of simulcast encodings expected from the sender.
    pub num_layers: usize,
    /// How long to wait for keyframes from all encodings before selecting
    /// among the ones seen so far.
    pub max_wait_ms: u64,
    /// Timestamp gap inserted at a layer switch, in RTP clock ticks.
    pub frame_interval: u64,
}

impl Default for SimulcastConfig {
    fn default() -> Self {
        Self {
            num_layers: 1,
            max_wait_ms: 300,
            frame_interval: 3000,
        }
    }
}

struct SimulcastState {
    num_layers: usize,
    selected: Option<RtpSsrc>,
    /// Last intra-frame size seen per encoding.
    iframes: HashMap<RtpSsrc, usize>,
    /// Frames buffered before the initial selection.
    pending: Vec<(RtpSsrc, MediaFrame)>,
    first_arrival: Option<u64>,
    /// Re-latch the timestamp mapping on the next forwarded frame.
    rebase: bool,
    first_timestamp: u64,
    last_timestamp: u64,
    offset_timestamp: u64,
    num_forwarded: u64,
    num_switches: u64,
}

/// Combines simulcast encodings into one forwarded frame stream.
pub struct SimulcastMediaFrameListener {
    ssrc: RtpSsrc,
    config: SimulcastConfig,
    listeners: ListenerSet<dyn MediaFrameListener>,
    state: Mutex<SimulcastState>,
}

impl SimulcastMediaFrameListener {
    /// Create a combiner forwarding under `ssrc`.
    pub fn new(ssrc: RtpSsrc, config: SimulcastConfig) -> Result<Self> {
        if config.num_layers == 0 {
            return Err(Error::InvalidConfig {
                details: "simulcast requires at least one layer".into(),
            });
        }
        Ok(Self {
            ssrc,
            config: config.clone(),
            listeners: ListenerSet::new(),
            state: Mutex::new(SimulcastState {
                num_layers: config.num_layers,
                selected: None,
                iframes: HashMap::new(),
                pending: Vec::new(),
                first_arrival: None,
                rebase: true,
                first_timestamp: NO_TIMESTAMP,
                last_timestamp: 0,
                offset_timestamp: 0,
                num_forwarded: 0,
                num_switches: 0,
            }),
        })
    }

    /// Register a consumer of the combined stream.
    pub fn add_media_listener(&self, listener: std::sync::Arc<dyn MediaFrameListener>) {
        self.listeners.add(listener);
    }

    /// Unregister a consumer.
    pub fn remove_media_listener(&self, listener: &std::sync::Arc<dyn MediaFrameListener>) {
        self.listeners.remove(listener);
    }

    /// Currently selected encoding, if the initial selection happened.
    pub fn selected_layer(&self) -> Option<RtpSsrc> {
        self.state.lock().selected
    }

    /// Number of layer switches performed so far.
    pub fn num_switches(&self) -> u64 {
        self.state.lock().num_switches
    }

    /// Adjust the expected number of encodings.
    ///
    /// Shrinking discards the smallest-keyframe encodings; if the selected
    /// one is among them, the biggest remaining encoding takes over at its
    /// next frame.
    pub fn set_num_layers(&self, num_layers: usize) -> Result<()> {
        if num_layers == 0 {
            return Err(Error::InvalidConfig {
                details: "simulcast requires at least one layer".into(),
            });
        }
        let mut state = self.state.lock();
        state.num_layers = num_layers;
        while state.iframes.len() > num_layers {
            let smallest = state
                .iframes
                .iter()
                .min_by_key(|(_, size)| **size)
                .map(|(ssrc, _)| *ssrc);
            if let Some(ssrc) = smallest {
                state.iframes.remove(&ssrc);
                if state.selected == Some(ssrc) {
                    state.selected = Self::biggest_layer(&state.iframes);
                    state.rebase = true;
                    state.num_switches += 1;
                    info!(
                        "simulcast ssrc:{} layer {} removed, now forwarding {:?}",
                        self.ssrc, ssrc, state.selected
                    );
                }
            }
        }
        Ok(())
    }

    /// Accept a frame from one encoding at the current wall-clock time.
    pub fn on_media_frame(&self, ssrc: RtpSsrc, frame: &MediaFrame) {
        self.on_media_frame_at(now_ms(), ssrc, frame);
    }

    /// Accept a frame at an explicit time (milliseconds).
    pub fn on_media_frame_at(&self, now: u64, ssrc: RtpSsrc, frame: &MediaFrame) {
        let mut forward: Vec<MediaFrame> = Vec::new();
        {
            let mut state = self.state.lock();
            if state.first_arrival.is_none() {
                state.first_arrival = Some(now);
            }
            if frame.is_intra() {
                state.iframes.insert(ssrc, frame.length());
            }

            match state.selected {
                None => {
                    if state.pending.len() >= MAX_PENDING_FRAMES {
                        state.pending.remove(0);
                    }
                    state.pending.push((ssrc, frame.clone()));
                    let waited = now.saturating_sub(state.first_arrival.unwrap_or(now));
                    let all_seen = state.iframes.len() >= state.num_layers;
                    if (all_seen || waited >= self.config.max_wait_ms)
                        && !state.iframes.is_empty()
                    {
                        let selected = Self::biggest_layer(&state.iframes);
                        state.selected = selected;
                        info!(
                            "simulcast ssrc:{} initial layer {:?} after {}ms, {} encodings seen",
                            self.ssrc,
                            selected,
                            waited,
                            state.iframes.len()
                        );
                        // Replay buffered frames of the chosen encoding,
                        // starting at its last buffered keyframe.
                        let pending = std::mem::take(&mut state.pending);
                        let last_intra = pending
                            .iter()
                            .rposition(|(s, f)| Some(*s) == selected && f.is_intra());
                        if let Some(start) = last_intra {
                            for (s, buffered) in pending.into_iter().skip(start) {
                                if Some(s) == selected {
                                    forward.push(Self::rebase(&mut state, buffered, self.config.frame_interval));
                                }
                            }
                        }
                    }
                }
                Some(current) => {
                    // Steady state: switch only when a bigger keyframe
                    // arrives on another encoding.
                    if ssrc != current {
                        if frame.is_intra() {
                            let current_size = state.iframes.get(&current).copied().unwrap_or(0);
                            if frame.length() > current_size {
                                state.selected = Some(ssrc);
                                state.rebase = true;
                                state.num_switches += 1;
                                debug!(
                                    "simulcast ssrc:{} switching layer {} -> {} ({} > {} bytes)",
                                    self.ssrc,
                                    current,
                                    ssrc,
                                    frame.length(),
                                    current_size
                                );
                                forward.push(Self::rebase(
                                    &mut state,
                                    frame.clone(),
                                    self.config.frame_interval,
                                ));
                            }
                        }
                    } else {
                        forward.push(Self::rebase(
                            &mut state,
                            frame.clone(),
                            self.config.frame_interval,
                        ));
                    }
                }
            }
        }

        if forward.is_empty() {
            return;
        }
        let listeners = self.listeners.snapshot();
        for frame in &forward {
            for listener in &listeners {
                listener.on_media_frame(self.ssrc, frame);
            }
        }
    }

    /// Discard selection and buffered state; the next frames go through
    /// initial selection again.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.selected = None;
        state.iframes.clear();
        state.pending.clear();
        state.first_arrival = None;
        state.rebase = true;
    }

    /// Stop forwarding and drop all registered listeners.
    pub fn stop(&self) {
        self.listeners.clear();
        let mut state = self.state.lock();
        state.pending.clear();
    }

    fn biggest_layer(iframes: &HashMap<RtpSsrc, usize>) -> Option<RtpSsrc> {
        iframes
            .iter()
            .max_by_key(|(ssrc, size)| (**size, **ssrc))
            .map(|(ssrc, _)| *ssrc)
    }

    /// Rewrite a frame's timestamp into the combined output clock and
    /// stamp it with the forwarding ssrc.
    fn rebase(state: &mut SimulcastState, mut frame: MediaFrame, frame_interval: u64) -> MediaFrame {
        if state.rebase {
            state.offset_timestamp = if state.num_forwarded > 0 {
                state.last_timestamp.wrapping_add(frame_interval)
            } else {
                0
            };
            state.first_timestamp = frame.timestamp();
            state.rebase = false;
        }
        let out_ts = frame
            .timestamp()
            .wrapping_sub(state.first_timestamp)
            .wrapping_add(state.offset_timestamp);
        state.last_timestamp = out_ts;
        state.num_forwarded += 1;
        frame.set_timestamp(out_ts);
        frame
    }
}

impl MediaFrameListener for SimulcastMediaFrameListener {
    fn on_media_frame(&self, ssrc: RtpSsrc, frame: &MediaFrame) {
        SimulcastMediaFrameListener::on_media_frame(self, ssrc, frame);
    }
}
