//! Scalable layer descriptors and selector decisions

/// Identifies a scalable sub-stream within one encoded bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerInfo {
    /// Spatial (resolution) layer id.
    pub spatial_layer_id: u8,
    /// Temporal (frame-rate) layer id.
    pub temporal_layer_id: u8,
}

impl LayerInfo {
    /// Sentinel layer id meaning "no restriction".
    pub const MAX_LAYER_ID: u8 = 0xff;

    /// A descriptor that restricts nothing.
    pub fn no_restriction() -> Self {
        Self {
            spatial_layer_id: Self::MAX_LAYER_ID,
            temporal_layer_id: Self::MAX_LAYER_ID,
        }
    }

    /// True when either dimension carries a real ceiling.
    pub fn is_restricted(&self) -> bool {
        self.spatial_layer_id != Self::MAX_LAYER_ID
            || self.temporal_layer_id != Self::MAX_LAYER_ID
    }
}

impl Default for LayerInfo {
    fn default() -> Self {
        Self::no_restriction()
    }
}

/// An in-payload rewrite instruction returned by a layer selector.
///
/// Applied by the transponder to the forwarded copy of the packet so the
/// rewritten stream stays self-consistent for a receiver that only sees
/// the forwarded subset (picture ids, temporal-layer-zero indices).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadPatch {
    /// Byte offset inside the packet payload.
    pub offset: usize,
    /// Replacement bytes.
    pub bytes: Vec<u8>,
}

/// Decision returned by a layer selector for one packet.
#[derive(Debug, Clone)]
pub struct LayerSelection {
    /// Forward the packet (false means drop it).
    pub forward: bool,
    /// Marker bit the forwarded packet should carry.
    pub mark: bool,
    /// In-payload rewrites to apply before sending.
    pub patches: Vec<PayloadPatch>,
}

impl LayerSelection {
    /// Forward the packet unchanged.
    pub fn forward(mark: bool) -> Self {
        Self {
            forward: true,
            mark,
            patches: Vec::new(),
        }
    }

    /// Drop the packet.
    pub fn drop() -> Self {
        Self {
            forward: false,
            mark: false,
            patches: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restriction() {
        assert!(!LayerInfo::no_restriction().is_restricted());
        let layer = LayerInfo {
            spatial_layer_id: 1,
            temporal_layer_id: LayerInfo::MAX_LAYER_ID,
        };
        assert!(layer.is_restricted());
    }
}
