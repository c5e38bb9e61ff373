// SPDX-License-Identifier: GPL-3.0-only

//! Core types for decode results and engine state

use crate::errors::DecodeFailure;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let fw = frame_width.max(1) as f32;
        let fh = frame_height.max(1) as f32;
        Self {
            x: x as f32 / fw,
            y: y as f32 / fh,
            width: width as f32 / fw,
            height: height as f32 / fh,
        }
    }
}

/// Symbology of a decoded code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeFormat {
    QrCode,
}

impl std::fmt::Display for CodeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeFormat::QrCode => write!(f, "QR_CODE"),
        }
    }
}

/// A code found in a frame by the detector
#[derive(Debug, Clone, PartialEq)]
pub struct QrDetection {
    /// Where the code was found
    pub region: FrameRegion,
    /// Decoded content
    pub content: String,
}

impl QrDetection {
    pub fn new(region: FrameRegion, content: String) -> Self {
        Self { region, content }
    }
}

/// Full result handed to the success callback
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeResult {
    pub text: String,
    pub format: CodeFormat,
    pub region: Option<FrameRegion>,
    pub decoded_at: DateTime<Utc>,
}

impl DecodeResult {
    /// Result carrying only a payload, e.g. from an engine without geometry
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: CodeFormat::QrCode,
            region: None,
            decoded_at: Utc::now(),
        }
    }
}

impl From<QrDetection> for DecodeResult {
    fn from(detection: QrDetection) -> Self {
        Self {
            text: detection.content,
            format: CodeFormat::QrCode,
            region: Some(detection.region),
            decoded_at: Utc::now(),
        }
    }
}

/// Per-frame outcome reported by a running engine
#[derive(Debug, Clone)]
pub enum DecodeEvent {
    Decoded(DecodeResult),
    /// Nothing decodable in the sampled frame
    Failed(DecodeFailure),
}

pub type DecodeEventSender = mpsc::UnboundedSender<DecodeEvent>;
pub type DecodeEventReceiver = mpsc::UnboundedReceiver<DecodeEvent>;

/// Engine scanning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineState {
    #[default]
    NotStarted,
    Scanning,
    /// Camera kept open, decoding suspended
    Paused,
}

impl EngineState {
    /// Whether the engine holds a camera and must be stopped
    pub fn is_running(&self) -> bool {
        matches!(self, EngineState::Scanning | EngineState::Paused)
    }
}

/// Centered square scan region as drawn over the preview
///
/// The preview shows the frame's centered square scaled to `preview`
/// pixels, so `side` maps to `side / preview` of the frame's shorter edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBox {
    pub side: u32,
    pub preview: u32,
}

impl ScanBox {
    pub fn new(side: u32, preview: u32) -> Self {
        let preview = preview.max(1);
        Self {
            side: side.min(preview),
            preview,
        }
    }

    /// Side of the region in native pixels of a `width` x `height` frame
    pub fn native_side(&self, width: u32, height: u32) -> u32 {
        let short = u64::from(width.min(height));
        // side <= preview, so this never exceeds the shorter edge
        (short * u64::from(self.side) / u64::from(self.preview)) as u32
    }
}

/// Decode parameters passed to an engine on start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Decode attempts per second, already capped
    pub fps: u32,
    /// Region to decode, `None` for the full frame
    pub scan_box: Option<ScanBox>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_box_scales_with_shorter_edge() {
        let scan_box = ScanBox::new(250, 300);
        assert_eq!(scan_box.native_side(1280, 720), 600);
        assert_eq!(scan_box.native_side(300, 300), 250);
    }

    #[test]
    fn scan_box_never_exceeds_preview() {
        let scan_box = ScanBox::new(500, 300);
        assert_eq!(scan_box.side, 300);
        assert_eq!(scan_box.native_side(640, 480), 480);
    }
}
