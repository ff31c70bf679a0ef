//! Scalable layer selectors
//!
//! Selectors inspect codec payload headers and decide, per packet, whether
//! the packet belongs to a layer the transponder is allowed to forward.
//! H.265 carries its temporal id in the NAL unit header shared by single,
//! aggregation and fragmentation packets, so one header read covers all
//! packetization modes. Codecs without a selector get a passthrough.

use tracing::debug;

use mediaswitch_rtp_core::{LayerInfo, LayerSelection, MediaCodec, MediaPacket, VideoLayerSelector};

/// Selector that forwards every packet unchanged.
pub struct NoneLayerSelector;

impl NoneLayerSelector {
    pub fn new() -> Self {
        Self
    }
}

impl VideoLayerSelector for NoneLayerSelector {
    fn select_spatial_layer(&mut self, _id: u8) {}

    fn select_temporal_layer(&mut self, _id: u8) {}

    fn spatial_layer_id(&self) -> u8 {
        LayerInfo::MAX_LAYER_ID
    }

    fn temporal_layer_id(&self) -> u8 {
        LayerInfo::MAX_LAYER_ID
    }

    fn select(&mut self, packet: &MediaPacket) -> Option<LayerSelection> {
        Some(LayerSelection::forward(packet.mark))
    }
}

/// Temporal layer selector for H.265 payloads.
///
/// The two-byte NAL unit header ends with `nuh_temporal_id_plus1`; RFC
/// 7798 requires the payload header of aggregation and fragmentation
/// packets to carry the same field, so the selector never has to look
/// past the first two payload bytes. H.265 temporal sub-layers are
/// frame-aligned, which means dropping a packet never splits a frame and
/// the marker bit can be forwarded as-is.
pub struct H265LayerSelector {
    spatial_layer_id: u8,
    temporal_layer_id: u8,
    /// Pending ceiling applied at the next temporal-layer-zero frame.
    next_temporal_layer_id: u8,
}

impl H265LayerSelector {
    pub fn new() -> Self {
        Self {
            spatial_layer_id: LayerInfo::MAX_LAYER_ID,
            temporal_layer_id: LayerInfo::MAX_LAYER_ID,
            next_temporal_layer_id: LayerInfo::MAX_LAYER_ID,
        }
    }

    /// Temporal id encoded in a two-byte NAL unit header.
    fn temporal_id(header: &[u8]) -> u8 {
        (header[1] & 0x07).saturating_sub(1)
    }
}

impl VideoLayerSelector for H265LayerSelector {
    fn select_spatial_layer(&mut self, id: u8) {
        // Single spatial layer per stream; simulcast handles resolution.
        self.spatial_layer_id = id;
    }

    fn select_temporal_layer(&mut self, id: u8) {
        if id >= self.temporal_layer_id {
            // Upgrades take effect immediately, packets of the newly
            // allowed sub-layers are independently decodable.
            self.temporal_layer_id = id;
            self.next_temporal_layer_id = id;
        } else {
            // Downgrades wait for a base-layer frame so the receiver is
            // never left with a dangling reference.
            self.next_temporal_layer_id = id;
        }
    }

    fn spatial_layer_id(&self) -> u8 {
        self.spatial_layer_id
    }

    fn temporal_layer_id(&self) -> u8 {
        self.temporal_layer_id
    }

    fn select(&mut self, packet: &MediaPacket) -> Option<LayerSelection> {
        let payload = packet.media_data();
        if payload.len() < 2 {
            return None;
        }
        let tid = Self::temporal_id(payload);

        if tid == 0 && self.next_temporal_layer_id != self.temporal_layer_id {
            debug!(
                "h265 selector switching temporal layer {} -> {}",
                self.temporal_layer_id, self.next_temporal_layer_id
            );
            self.temporal_layer_id = self.next_temporal_layer_id;
        }

        if tid > self.temporal_layer_id {
            return Some(LayerSelection::drop());
        }
        Some(LayerSelection::forward(packet.mark))
    }
}

/// Create the layer selector for a codec.
///
/// Codecs without scalable-layer support get a passthrough selector so
/// the transponder code path stays uniform.
pub fn for_codec(codec: MediaCodec) -> Box<dyn VideoLayerSelector> {
    match codec {
        MediaCodec::H265 => Box::new(H265LayerSelector::new()),
        _ => Box::new(NoneLayerSelector::new()),
    }
}
