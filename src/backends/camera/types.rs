// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use super::MediaTrack;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Which way a camera points relative to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera (selfie)
    User,
    /// Rear camera
    #[default]
    Environment,
}

impl FacingMode {
    /// The camera on the other side of the device
    pub fn opposite(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FacingMode {
    type Err = String;

    /// Accepts the browser names plus the common "front"/"back" aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "front" | "selfie" => Ok(FacingMode::User),
            "environment" | "rear" | "back" => Ok(FacingMode::Environment),
            other => Err(format!("Unknown facing mode: {}", other)),
        }
    }
}

/// A video input device as reported by device enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Stable device identifier
    pub id: String,
    /// Human readable label (may be empty before permission is granted)
    pub label: String,
    /// Facing, when the platform reports it
    pub facing: Option<FacingMode>,
}

impl std::fmt::Display for CameraDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.facing {
            Some(facing) => write!(f, "{} ({}, {})", self.label, self.id, facing),
            None => write!(f, "{} ({})", self.label, self.id),
        }
    }
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    Rgba,
    /// Gray8 - 8-bit luma (single channel)
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel data, `stride * height` bytes
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a tightly packed 8-bit grayscale frame
    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data),
            format: PixelFormat::Gray8,
            stride: width,
            captured_at: Instant::now(),
        }
    }

    /// Uniform grayscale frame, useful as "nothing in view"
    pub fn blank(width: u32, height: u32, value: u8) -> Self {
        Self::gray(width, height, vec![value; (width * height) as usize])
    }

    /// Luma value at a pixel, 0 for out of range coordinates
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        let offset = y as usize * self.stride as usize + x as usize * self.format.bytes_per_pixel();
        match self.format {
            PixelFormat::Gray8 => self.data.get(offset).copied().unwrap_or(0),
            PixelFormat::Rgba => {
                let Some(px) = self.data.get(offset..offset + 3) else {
                    return 0;
                };
                // ITU-R BT.601 weights in fixed point
                ((u32::from(px[0]) * 299 + u32::from(px[1]) * 587 + u32::from(px[2]) * 114)
                    / 1000) as u8
            }
        }
    }
}

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Track liveness, mirroring `MediaStreamTrack.readyState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackState {
    Live,
    Ended,
}

/// An open capture session: a set of tracks sharing one id
///
/// Cloning is cheap and yields a handle to the same session.
#[derive(Clone)]
pub struct CameraStream {
    id: Uuid,
    tracks: Arc<[Arc<dyn MediaTrack>]>,
}

impl CameraStream {
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracks: Arc::from(tracks),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    /// True when at least one video track is delivering frames
    pub fn has_live_video(&self) -> bool {
        self.video_tracks().any(|t| t.state() == TrackState::Live)
    }

    /// Stop every track, releasing the device
    pub fn stop_all(&self) {
        for track in self.tracks.iter() {
            track.stop();
        }
    }

    /// Most recent frame of the first live video track
    pub fn latest_frame(&self) -> Option<Arc<CameraFrame>> {
        self.video_tracks()
            .filter(|t| t.state() == TrackState::Live)
            .find_map(|t| t.latest_frame())
    }
}

impl std::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .field("live_video", &self.has_live_video())
            .finish()
    }
}

impl PartialEq for CameraStream {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_mode_parses_aliases() {
        assert_eq!("back".parse::<FacingMode>(), Ok(FacingMode::Environment));
        assert_eq!("User".parse::<FacingMode>(), Ok(FacingMode::User));
        assert!("sideways".parse::<FacingMode>().is_err());
    }

    #[test]
    fn luma_of_rgba_frame() {
        let data: Vec<u8> = vec![
            255, 255, 255, 255, // white
            0, 0, 0, 255, // black
        ];
        let frame = CameraFrame {
            width: 2,
            height: 1,
            data: Arc::from(data),
            format: PixelFormat::Rgba,
            stride: 8,
            captured_at: Instant::now(),
        };
        assert_eq!(frame.luma(0, 0), 255);
        assert_eq!(frame.luma(1, 0), 0);
        assert_eq!(frame.luma(5, 0), 0);
    }
}
