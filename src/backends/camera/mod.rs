// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The environment's camera API is modelled after the browser's
//! `navigator.mediaDevices`: devices can be enumerated and a stream can be
//! opened for a set of constraints. Streams consist of tracks that report
//! their liveness and can be stopped individually.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   ScannerWidget     │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraStreamManager │  ← Shared stream, usage counting
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ MediaDevices Trait  │  ← Common interface
//! └──────────┬──────────┘
//!            │
//!            ▼
//!   ┌────────────────┐
//!   │ VirtualCamera  │  ← Image-backed implementation
//!   └────────────────┘
//! ```

pub mod constraints;
pub mod manager;
pub mod types;

pub use constraints::{ConstraintOption, FacingConstraint, fallback_chain};
pub use manager::{CameraStreamManager, StreamLease};
pub use types::*;

use crate::errors::{AcquisitionError, CameraError, CameraResult};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

/// Access to the environment's camera devices
pub trait MediaDevices: Send + Sync {
    /// List video input devices
    fn enumerate_video_inputs(&self) -> BoxFuture<'_, CameraResult<Vec<CameraDevice>>>;

    /// Open a capture stream satisfying the constraints
    ///
    /// This is where permission prompts happen. The returned stream may still
    /// lack a live video track if the device was claimed but is not delivering.
    fn open<'a>(
        &'a self,
        constraints: &'a ConstraintOption,
    ) -> BoxFuture<'a, CameraResult<CameraStream>>;
}

/// A single track of an open stream
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> TrackKind;

    fn state(&self) -> TrackState;

    /// Stop the track. Stopping an ended track does nothing.
    fn stop(&self);

    /// Most recent frame, `None` for audio tracks or before the first frame
    fn latest_frame(&self) -> Option<Arc<CameraFrame>>;
}

/// Open the first constraint option that yields a live video track
///
/// Failures are swallowed and the next option is tried. A stream without a
/// live video track counts as a failure and its tracks are stopped so no
/// device handle leaks.
pub async fn open_first_live(
    devices: &dyn MediaDevices,
    options: &[ConstraintOption],
) -> Result<CameraStream, AcquisitionError> {
    let mut last = CameraError::DeviceNotFound("No camera constraint options configured".into());
    let mut attempts = 0;

    for option in options {
        attempts += 1;
        match devices.open(option).await {
            Ok(stream) if stream.has_live_video() => {
                debug!(constraint = %option, stream = %stream.id(), "Opened live camera stream");
                return Ok(stream);
            }
            Ok(stream) => {
                debug!(constraint = %option, "Stream has no live video track, stopping it");
                stream.stop_all();
                last = CameraError::NotLive;
            }
            Err(e) => {
                debug!(constraint = %option, error = %e, "Camera constraint failed");
                last = e;
            }
        }
    }

    Err(AcquisitionError { attempts, last })
}
