// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera devices backed by still images
//!
//! `VirtualCamera` implements [`MediaDevices`] without any hardware. Each
//! device cycles through a fixed list of frames. Permission and busy state can
//! be toggled to reproduce the failures a real camera API reports, and the
//! number of opened streams and live tracks can be inspected afterwards.

mod file_source;

pub use file_source::{is_image_extension, load_image_as_frame};

use crate::backends::camera::types::{
    CameraDevice, CameraFrame, CameraStream, FacingMode, TrackKind, TrackState,
};
use crate::backends::camera::{ConstraintOption, FacingConstraint, MediaDevices, MediaTrack};
use crate::errors::{CameraError, CameraResult};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Whether the (simulated) user granted camera access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    #[default]
    Granted,
    Denied,
}

/// A device and the frames it produces
struct VirtualDevice {
    device: CameraDevice,
    frames: Arc<[Arc<CameraFrame>]>,
}

/// Image-backed implementation of the camera API
#[derive(Default)]
pub struct VirtualCamera {
    devices: Vec<VirtualDevice>,
    permission: Mutex<Permission>,
    busy: AtomicBool,
    opened: AtomicUsize,
    tracks: Mutex<Vec<Arc<VirtualTrack>>>,
}

impl VirtualCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device cycling through `frames`
    pub fn with_device(
        mut self,
        label: impl Into<String>,
        facing: Option<FacingMode>,
        frames: Vec<CameraFrame>,
    ) -> Self {
        let id = format!("virtual-{}", self.devices.len());
        let frames: Vec<Arc<CameraFrame>> = frames.into_iter().map(Arc::new).collect();
        self.devices.push(VirtualDevice {
            device: CameraDevice {
                id,
                label: label.into(),
                facing,
            },
            frames: Arc::from(frames),
        });
        self
    }

    /// Add a device whose frames are loaded from image files
    pub fn with_image_device(
        self,
        label: impl Into<String>,
        facing: Option<FacingMode>,
        paths: &[impl AsRef<Path>],
    ) -> CameraResult<Self> {
        let frames = paths
            .iter()
            .map(|p| load_image_as_frame(p.as_ref()))
            .collect::<CameraResult<Vec<_>>>()?;
        Ok(self.with_device(label, facing, frames))
    }

    pub fn set_permission(&self, permission: Permission) {
        *self.permission.lock().unwrap_or_else(PoisonError::into_inner) = permission;
    }

    /// Simulate another application holding the device
    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    /// Number of streams opened so far
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Tracks that were opened and not yet stopped
    pub fn live_track_count(&self) -> usize {
        self.tracks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| t.state() == TrackState::Live)
            .count()
    }

    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn select(&self, constraints: &ConstraintOption) -> CameraResult<&VirtualDevice> {
        if self.devices.is_empty() {
            return Err(CameraError::DeviceNotFound("Requested device not found".into()));
        }

        if let Some(id) = &constraints.device_id {
            return self
                .devices
                .iter()
                .find(|d| &d.device.id == id)
                .ok_or_else(|| CameraError::Overconstrained(format!("deviceId {}", id)));
        }

        let matching = |facing: FacingMode| {
            self.devices
                .iter()
                .find(|d| d.device.facing == Some(facing))
        };

        match constraints.facing {
            Some(FacingConstraint::Exact(facing)) => matching(facing)
                .ok_or_else(|| CameraError::Overconstrained(format!("facingMode {}", facing))),
            Some(FacingConstraint::Ideal(facing)) => {
                Ok(matching(facing).unwrap_or(&self.devices[0]))
            }
            None => Ok(&self.devices[0]),
        }
    }

    fn open_sync(&self, constraints: &ConstraintOption) -> CameraResult<CameraStream> {
        let device = self.select(constraints)?;

        if self.permission() == Permission::Denied {
            return Err(CameraError::PermissionDenied("Permission denied".into()));
        }
        if self.busy.load(Ordering::SeqCst) {
            return Err(CameraError::DeviceBusy("Could not start video source".into()));
        }

        let serial = self.opened.fetch_add(1, Ordering::SeqCst);
        let track = Arc::new(VirtualTrack {
            id: format!("{}-track-{}", device.device.id, serial),
            live: AtomicBool::new(true),
            frames: Arc::clone(&device.frames),
            cursor: AtomicUsize::new(0),
        });
        self.tracks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&track));

        info!(device = %device.device, constraint = %constraints, "Virtual camera opened");
        let track: Arc<dyn MediaTrack> = track;
        Ok(CameraStream::new(vec![track]))
    }
}

impl MediaDevices for VirtualCamera {
    fn enumerate_video_inputs(&self) -> BoxFuture<'_, CameraResult<Vec<CameraDevice>>> {
        let hide_labels = self.permission() == Permission::Denied;
        let devices = self
            .devices
            .iter()
            .map(|d| {
                let mut device = d.device.clone();
                // Labels are only exposed once access has been granted
                if hide_labels {
                    device.label.clear();
                }
                device
            })
            .collect();
        futures::future::ready(Ok(devices)).boxed()
    }

    fn open<'a>(
        &'a self,
        constraints: &'a ConstraintOption,
    ) -> BoxFuture<'a, CameraResult<CameraStream>> {
        async move {
            // Opening a device is never instantaneous
            tokio::task::yield_now().await;
            self.open_sync(constraints)
        }
        .boxed()
    }
}

/// Video track cycling through a device's frames
pub struct VirtualTrack {
    id: String,
    live: AtomicBool,
    frames: Arc<[Arc<CameraFrame>]>,
    cursor: AtomicUsize,
}

impl MediaTrack for VirtualTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn state(&self) -> TrackState {
        if self.live.load(Ordering::SeqCst) {
            TrackState::Live
        } else {
            TrackState::Ended
        }
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            debug!(track = %self.id, "Virtual track stopped");
        }
    }

    fn latest_frame(&self) -> Option<Arc<CameraFrame>> {
        if self.frames.is_empty() || self.state() == TrackState::Ended {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        Some(Arc::clone(&self.frames[index]))
    }
}
