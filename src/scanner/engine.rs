// SPDX-License-Identifier: GPL-3.0-only

//! Decode engine abstraction
//!
//! An engine is bound to one container and drives a camera: it is started
//! against a constraint option, reports per-frame results on a channel and
//! must be stopped and cleared before it is dropped.

use super::types::{DecodeEventSender, EngineSettings, EngineState};
use crate::backends::camera::ConstraintOption;
use crate::errors::CameraResult;
use futures::future::BoxFuture;
use std::sync::Arc;

pub trait DecodeEngine: Send + Sync {
    /// Container this engine renders into
    fn container_id(&self) -> &str;

    fn state(&self) -> EngineState;

    /// Open the camera for `camera` and begin decoding
    ///
    /// Fails with [`CameraError::InvalidState`](crate::errors::CameraError::InvalidState)
    /// when already started.
    fn start<'a>(
        &'a self,
        camera: &'a ConstraintOption,
        settings: &'a EngineSettings,
        events: DecodeEventSender,
    ) -> BoxFuture<'a, CameraResult<()>>;

    /// Stop decoding and release the camera. Fails when not started.
    fn stop(&self) -> BoxFuture<'_, CameraResult<()>>;

    /// Release container bindings. Fails while scanning.
    fn clear(&self) -> CameraResult<()>;

    fn pause(&self) -> CameraResult<()>;

    fn resume(&self) -> CameraResult<()>;
}

/// Creates engines bound to a container id
pub trait EngineFactory: Send + Sync {
    fn create(&self, container_id: &str) -> Arc<dyn DecodeEngine>;
}
