//! Time helpers shared by the forwarding pipeline
//!
//! All pipeline state machines take explicit `now` arguments in
//! milliseconds so they stay deterministic under test; these helpers sit
//! at the boundary where real wall-clock time enters.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Convert a span of RTP timestamp ticks to milliseconds.
pub fn rtp_ticks_to_ms(ticks: u64, clock_rate: u32) -> u64 {
    if clock_rate == 0 {
        return 0;
    }
    ticks * 1000 / clock_rate as u64
}

/// Convert milliseconds to RTP timestamp ticks.
pub fn ms_to_rtp_ticks(ms: u64, clock_rate: u32) -> u64 {
    ms * clock_rate as u64 / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_conversion() {
        // One 30fps frame interval at the 90kHz video clock.
        assert_eq!(rtp_ticks_to_ms(3000, 90000), 33);
        assert_eq!(ms_to_rtp_ticks(1000, 90000), 90000);
        assert_eq!(rtp_ticks_to_ms(1234, 0), 0);
    }
}
