// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Scanner timing and sizing defaults
pub mod scanner {
    use super::Duration;

    /// Default decode attempts per second
    pub const DEFAULT_FPS: u32 = 10;

    /// Upper bound applied to any requested frame rate.
    ///
    /// Decoding is CPU bound; low-end phones overheat or drop the
    /// stream well before reaching the camera's native rate.
    pub const MAX_FPS: u32 = 15;

    /// Lowest accepted frame rate
    pub const MIN_FPS: u32 = 1;

    /// Default side length of the square scan region, in pixels
    pub const DEFAULT_SCAN_BOX: u32 = 250;

    /// Scan regions smaller than this cannot hold a readable code
    pub const MIN_SCAN_BOX: u32 = 50;

    /// Side length of the compact (fixed box) layout, in pixels
    pub const COMPACT_VIEW_SIZE: u32 = 300;

    /// Container id the engine binds to when none is configured
    pub const DEFAULT_CONTAINER_ID: &str = "qr-reader";

    /// Pause between tearing down an engine and starting the next one
    pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

    /// Log one out of this many decode-noise events
    pub const DECODE_NOISE_SAMPLE_EVERY: u64 = 100;
}

/// Camera acquisition defaults
pub mod camera {
    /// Preferred capture resolution for the first (strictest) constraint
    pub const PREFERRED_WIDTH: u32 = 1280;
    pub const PREFERRED_HEIGHT: u32 = 720;

    /// Preferred capture frame rate requested from the device
    pub const PREFERRED_FRAME_RATE: u32 = 30;
}

/// Image decoding limits for the QR detector
pub mod detector {
    /// Frames larger than this (in either dimension) are downscaled first
    pub const MAX_DIMENSION: u32 = 640;
}

/// Clamp a requested frame rate into the supported range
pub fn clamp_fps(requested: u32) -> u32 {
    requested.clamp(scanner::MIN_FPS, scanner::MAX_FPS)
}

/// Interval between decode attempts for a frame rate
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(clamp_fps(fps)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_fps_caps_high_rates() {
        assert_eq!(clamp_fps(60), scanner::MAX_FPS);
        assert_eq!(clamp_fps(0), scanner::MIN_FPS);
        assert_eq!(clamp_fps(10), 10);
    }

    #[test]
    fn frame_interval_follows_fps() {
        assert_eq!(frame_interval(10), Duration::from_millis(100));
        assert_eq!(frame_interval(1000), frame_interval(scanner::MAX_FPS));
    }
}
