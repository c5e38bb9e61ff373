// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection
//!
//! Frames are converted to luma, cropped to the scan box and downscaled before
//! being handed to `rqrr`.

use super::types::{FrameRegion, QrDetection, ScanBox};
use crate::backends::camera::types::CameraFrame;
use crate::constants::detector::MAX_DIMENSION;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// QR code detector
///
/// Optimized for real-time processing with frame downscaling.
#[derive(Debug, Clone, Copy)]
pub struct QrDetector {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
    /// Centered square that is searched
    scan_box: Option<ScanBox>,
}

impl Default for QrDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDetector {
    pub fn new() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            scan_box: None,
        }
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    pub fn with_scan_box(mut self, scan_box: Option<ScanBox>) -> Self {
        self.scan_box = scan_box;
        self
    }

    /// Detect QR codes in a camera frame
    ///
    /// The CPU-heavy work runs on the blocking pool.
    pub async fn detect(&self, frame: Arc<CameraFrame>) -> Vec<QrDetection> {
        let detector = *self;

        tokio::task::spawn_blocking(move || detector.detect_sync(&frame))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "QR detection task panicked");
                Vec::new()
            })
    }

    /// Synchronous detection
    pub fn detect_sync(&self, frame: &CameraFrame) -> Vec<QrDetection> {
        let start = std::time::Instant::now();
        let window = scan_window(frame.width, frame.height, self.scan_box);

        // Nearest-neighbour sampling step so the longer side fits max_dimension
        let step = window.width.max(window.height).div_ceil(self.max_dimension).max(1);
        let proc_width = (window.width / step).max(1);
        let proc_height = (window.height / step).max(1);

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            proc_width as usize,
            proc_height as usize,
            |x, y| frame.luma(window.x + x as u32 * step, window.y + y as u32 * step),
        );

        let grids = prepared.detect_grids();
        trace!(
            grids = grids.len(),
            proc_width,
            proc_height,
            step,
            elapsed_ms = start.elapsed().as_millis(),
            "QR grid detection complete"
        );

        let mut detections = Vec::with_capacity(grids.len());
        for grid in grids {
            let content = match grid.decode() {
                Ok((_meta, content)) => content,
                Err(e) => {
                    debug!(error = ?e, "Failed to decode QR grid");
                    continue;
                }
            };

            // Grid corners are in processing coordinates
            let xs = grid.bounds.iter().map(|p| p.x.max(0) as u32);
            let ys = grid.bounds.iter().map(|p| p.y.max(0) as u32);
            let (min_x, max_x) = min_max(xs);
            let (min_y, max_y) = min_max(ys);

            let region = FrameRegion::from_pixels(
                window.x + min_x * step,
                window.y + min_y * step,
                (max_x - min_x) * step,
                (max_y - min_y) * step,
                frame.width,
                frame.height,
            );

            debug!(content = %content, x = region.x, y = region.y, "Detected QR code");
            detections.push(QrDetection::new(region, content));
        }

        detections
    }
}

/// Pixel window searched for codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScanWindow {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Centered square covered by `scan_box`, in frame pixels
fn scan_window(frame_width: u32, frame_height: u32, scan_box: Option<ScanBox>) -> ScanWindow {
    match scan_box {
        Some(scan_box) => {
            let side = scan_box.native_side(frame_width, frame_height).max(1);
            ScanWindow {
                x: (frame_width - side.min(frame_width)) / 2,
                y: (frame_height - side.min(frame_height)) / 2,
                width: side.min(frame_width),
                height: side.min(frame_height),
            }
        }
        None => ScanWindow {
            x: 0,
            y: 0,
            width: frame_width,
            height: frame_height,
        },
    }
}

fn min_max(values: impl Iterator<Item = u32>) -> (u32, u32) {
    values.fold((u32::MAX, 0), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
