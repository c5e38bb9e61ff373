// SPDX-License-Identifier: GPL-3.0-only

//! Shared camera stream manager
//!
//! The manager provides:
//! - One capture stream shared by every consumer
//! - Usage counting, with the device released when the last consumer leaves
//! - A single in-flight acquisition that concurrent callers join

use super::types::CameraStream;
use super::{ConstraintOption, MediaDevices, fallback_chain, open_first_live};
use crate::backends::camera::types::FacingMode;
use crate::errors::AcquisitionError;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, info, warn};

type AcquireFuture = Shared<BoxFuture<'static, Result<CameraStream, AcquisitionError>>>;

/// Process-wide manager, see [`CameraStreamManager::install_global`]
static GLOBAL_MANAGER: OnceLock<CameraStreamManager> = OnceLock::new();

/// Internal manager state
struct ManagerState {
    /// The shared stream, if one has been acquired
    stream: Option<CameraStream>,
    /// Number of unreleased acquisitions
    usage: usize,
    /// Acquisition currently running, tagged with its ticket
    in_flight: Option<(u64, AcquireFuture)>,
    next_ticket: u64,
}

/// Camera stream manager
///
/// Thread-safe and cheap to clone; clones share the same stream.
#[derive(Clone)]
pub struct CameraStreamManager {
    devices: Arc<dyn MediaDevices>,
    options: Arc<[ConstraintOption]>,
    state: Arc<Mutex<ManagerState>>,
}

impl CameraStreamManager {
    /// Create a manager using the default fallback chain for the rear camera
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self::with_options(devices, fallback_chain(FacingMode::Environment))
    }

    /// Create a manager with an explicit, ordered list of constraint options
    pub fn with_options(devices: Arc<dyn MediaDevices>, options: Vec<ConstraintOption>) -> Self {
        info!(options = options.len(), "Creating camera stream manager");
        Self {
            devices,
            options: Arc::from(options),
            state: Arc::new(Mutex::new(ManagerState {
                stream: None,
                usage: 0,
                in_flight: None,
                next_ticket: 0,
            })),
        }
    }

    /// Install the process-wide manager
    ///
    /// Returns the rejected manager if one was already installed.
    pub fn install_global(manager: CameraStreamManager) -> Result<(), CameraStreamManager> {
        GLOBAL_MANAGER.set(manager)
    }

    /// The process-wide manager, if installed
    pub fn global() -> Option<&'static CameraStreamManager> {
        GLOBAL_MANAGER.get()
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the shared stream, opening it if necessary
    ///
    /// Every successful call must be paired with exactly one [`release`](Self::release).
    /// Concurrent callers while an acquisition is running wait for that
    /// acquisition instead of opening the device a second time.
    pub async fn acquire(&self) -> Result<CameraStream, AcquisitionError> {
        let (ticket, pending) = {
            let mut state = self.lock();

            if let Some(stream) = state.stream.as_ref() {
                if stream.has_live_video() {
                    let stream = stream.clone();
                    state.usage += 1;
                    debug!(usage = state.usage, stream = %stream.id(), "Reusing shared camera stream");
                    return Ok(stream);
                }
                warn!(stream = %stream.id(), "Shared camera stream ended, reacquiring");
                stream.stop_all();
                state.stream = None;
            }

            match state.in_flight.as_ref() {
                Some((ticket, pending)) => {
                    debug!(ticket, "Joining in-flight camera acquisition");
                    (*ticket, pending.clone())
                }
                None => {
                    let ticket = state.next_ticket;
                    state.next_ticket += 1;

                    let devices = Arc::clone(&self.devices);
                    let options = Arc::clone(&self.options);
                    let pending = async move { open_first_live(devices.as_ref(), &options).await }
                        .boxed()
                        .shared();

                    info!(ticket, "Starting camera acquisition");
                    state.in_flight = Some((ticket, pending.clone()));
                    (ticket, pending)
                }
            }
        };

        let result = pending.await;

        let mut state = self.lock();
        if matches!(state.in_flight, Some((current, _)) if current == ticket) {
            state.in_flight = None;
            if let Ok(stream) = &result {
                state.stream = Some(stream.clone());
            }
        }

        match result {
            Ok(stream) => {
                state.usage += 1;
                info!(usage = state.usage, stream = %stream.id(), "Camera stream acquired");
                Ok(stream)
            }
            Err(e) => {
                warn!(error = %e, "Camera acquisition failed");
                Err(e)
            }
        }
    }

    /// Acquire the stream wrapped in a guard that releases it on drop
    pub async fn acquire_lease(&self) -> Result<StreamLease, AcquisitionError> {
        let stream = self.acquire().await?;
        Ok(StreamLease {
            manager: self.clone(),
            stream,
        })
    }

    /// Give back one acquisition
    ///
    /// The device is stopped when the count reaches zero. Releasing with a
    /// count of zero does nothing.
    pub fn release(&self) {
        let mut state = self.lock();
        if state.usage == 0 {
            debug!("Release without outstanding acquisitions ignored");
            return;
        }

        state.usage -= 1;
        debug!(usage = state.usage, "Camera stream released");

        if state.usage == 0
            && let Some(stream) = state.stream.take()
        {
            info!(stream = %stream.id(), "Last consumer released, stopping camera stream");
            stream.stop_all();
        }
    }

    /// Number of unreleased acquisitions
    pub fn usage_count(&self) -> usize {
        self.lock().usage
    }

    /// Whether a live stream is currently held
    pub fn is_active(&self) -> bool {
        self.lock()
            .stream
            .as_ref()
            .is_some_and(CameraStream::has_live_video)
    }

    /// Ordered constraint options this manager tries
    pub fn options(&self) -> &[ConstraintOption] {
        &self.options
    }
}

impl std::fmt::Debug for CameraStreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CameraStreamManager")
            .field("usage", &state.usage)
            .field("stream", &state.stream)
            .field("acquiring", &state.in_flight.is_some())
            .finish()
    }
}

/// One counted use of the shared stream, released on drop
pub struct StreamLease {
    manager: CameraStreamManager,
    stream: CameraStream,
}

impl StreamLease {
    pub fn stream(&self) -> &CameraStream {
        &self.stream
    }
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        self.manager.release();
    }
}

impl std::fmt::Debug for StreamLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamLease")
            .field("stream", &self.stream.id())
            .finish()
    }
}
