// SPDX-License-Identifier: GPL-3.0-only

//! Camera-backed QR decode engine
//!
//! The engine either opens its own stream through [`MediaDevices`] or leases
//! the shared stream from a [`CameraStreamManager`]. While scanning, the live
//! video track is sampled at the configured frame rate and each sample is run
//! through the [`QrDetector`].

use super::engine::{DecodeEngine, EngineFactory};
use super::qr_detector::QrDetector;
use super::types::{DecodeEvent, DecodeEventSender, DecodeResult, EngineSettings, EngineState};
use crate::backends::camera::types::{CameraFrame, CameraStream};
use crate::backends::camera::{CameraStreamManager, ConstraintOption, MediaDevices, StreamLease};
use crate::constants::frame_interval;
use crate::errors::{CameraError, CameraResult, DecodeFailure};
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Where the engine gets its camera from
#[derive(Clone)]
pub enum CameraSource {
    /// Open a dedicated stream per start, honouring the requested constraint
    Direct(Arc<dyn MediaDevices>),
    /// Lease the manager's shared stream; the manager applies its own constraints
    Shared(CameraStreamManager),
}

impl std::fmt::Debug for CameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraSource::Direct(_) => write!(f, "Direct"),
            CameraSource::Shared(manager) => write!(f, "Shared({:?})", manager),
        }
    }
}

/// Stream held while scanning
enum HeldStream {
    Owned(CameraStream),
    Leased(StreamLease),
}

impl HeldStream {
    fn stream(&self) -> &CameraStream {
        match self {
            HeldStream::Owned(stream) => stream,
            HeldStream::Leased(lease) => lease.stream(),
        }
    }

    /// Stop an owned stream, or give the lease back to the manager
    fn release(self) {
        match self {
            HeldStream::Owned(stream) => stream.stop_all(),
            HeldStream::Leased(lease) => drop(lease),
        }
    }
}

#[derive(Default)]
struct EngineInner {
    state: EngineState,
    /// A start call is between opening the camera and spawning the loop
    starting: bool,
    held: Option<HeldStream>,
    frame_loop: Option<JoinHandle<()>>,
}

/// Clears `starting` if a start is abandoned before it finishes
struct StartingFlag<'a> {
    inner: &'a Mutex<EngineInner>,
    armed: bool,
}

impl StartingFlag<'_> {
    /// Called with the lock held once the start has settled `starting` itself
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartingFlag<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.starting = false;
        }
    }
}

/// QR decode engine bound to a container
pub struct QrDecodeEngine {
    container_id: String,
    source: CameraSource,
    inner: Mutex<EngineInner>,
    paused: Arc<AtomicBool>,
}

impl QrDecodeEngine {
    pub fn new(container_id: impl Into<String>, source: CameraSource) -> Self {
        Self {
            container_id: container_id.into(),
            source,
            inner: Mutex::new(EngineInner::default()),
            paused: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn open(&self, camera: &ConstraintOption) -> CameraResult<HeldStream> {
        match &self.source {
            CameraSource::Direct(devices) => {
                let stream = devices.open(camera).await?;
                if stream.has_live_video() {
                    Ok(HeldStream::Owned(stream))
                } else {
                    stream.stop_all();
                    Err(CameraError::NotLive)
                }
            }
            CameraSource::Shared(manager) => manager
                .acquire_lease()
                .await
                .map(HeldStream::Leased)
                .map_err(|e| e.last),
        }
    }
}

impl DecodeEngine for QrDecodeEngine {
    fn container_id(&self) -> &str {
        &self.container_id
    }

    fn state(&self) -> EngineState {
        self.lock().state
    }

    fn start<'a>(
        &'a self,
        camera: &'a ConstraintOption,
        settings: &'a EngineSettings,
        events: DecodeEventSender,
    ) -> BoxFuture<'a, CameraResult<()>> {
        async move {
            {
                let mut inner = self.lock();
                if inner.state.is_running() || inner.starting {
                    return Err(CameraError::InvalidState(
                        "Cannot start, scanner is already scanning".into(),
                    ));
                }
                inner.starting = true;
            }
            let mut starting = StartingFlag {
                inner: &self.inner,
                armed: true,
            };

            debug!(container = %self.container_id, constraint = %camera, "Opening camera");
            let opened = self.open(camera).await;

            let mut inner = self.lock();
            inner.starting = false;
            starting.disarm();
            let held = opened?;

            self.paused.store(false, Ordering::SeqCst);
            let detector = QrDetector::new().with_scan_box(settings.scan_box);
            let frames = sample_frames(held.stream().clone(), frame_interval(settings.fps));
            let paused = Arc::clone(&self.paused);

            inner.frame_loop = Some(tokio::spawn(run_frame_loop(
                frames, detector, paused, events,
            )));
            inner.held = Some(held);
            inner.state = EngineState::Scanning;

            info!(
                container = %self.container_id,
                constraint = %camera,
                fps = settings.fps,
                "Scanning started"
            );
            Ok(())
        }
        .boxed()
    }

    fn stop(&self) -> BoxFuture<'_, CameraResult<()>> {
        async move {
            let (held, frame_loop) = {
                let mut inner = self.lock();
                if !inner.state.is_running() {
                    return Err(CameraError::InvalidState(
                        "Cannot stop, scanner is not running".into(),
                    ));
                }
                inner.state = EngineState::NotStarted;
                (inner.held.take(), inner.frame_loop.take())
            };

            if let Some(frame_loop) = frame_loop {
                frame_loop.abort();
                // Cancellation is the expected outcome
                let _ = frame_loop.await;
            }
            if let Some(held) = held {
                held.release();
            }

            info!(container = %self.container_id, "Scanning stopped");
            Ok(())
        }
        .boxed()
    }

    fn clear(&self) -> CameraResult<()> {
        if self.lock().state.is_running() {
            return Err(CameraError::InvalidState(
                "Cannot clear while scan is ongoing, stop it first".into(),
            ));
        }
        debug!(container = %self.container_id, "Engine cleared");
        Ok(())
    }

    fn pause(&self) -> CameraResult<()> {
        let mut inner = self.lock();
        if inner.state != EngineState::Scanning {
            return Err(CameraError::InvalidState(
                "Cannot pause, scanner is not scanning".into(),
            ));
        }
        inner.state = EngineState::Paused;
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&self) -> CameraResult<()> {
        let mut inner = self.lock();
        if inner.state != EngineState::Paused {
            return Err(CameraError::InvalidState(
                "Cannot resume, scanner is not paused".into(),
            ));
        }
        inner.state = EngineState::Scanning;
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for QrDecodeEngine {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(frame_loop) = inner.frame_loop.take() {
            frame_loop.abort();
        }
        if let Some(held) = inner.held.take() {
            warn!(container = %self.container_id, "Engine dropped while scanning, releasing camera");
            held.release();
        }
    }
}

/// Sample the latest frame of the stream once per interval
///
/// Ends when the stream no longer has a live video track.
fn sample_frames(
    stream: CameraStream,
    interval: Duration,
) -> impl Stream<Item = Option<Arc<CameraFrame>>> + Send + 'static {
    async_stream::stream! {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !stream.has_live_video() {
                warn!(stream = %stream.id(), "Camera stream ended");
                break;
            }
            yield stream.latest_frame();
        }
    }
}

async fn run_frame_loop(
    frames: impl Stream<Item = Option<Arc<CameraFrame>>> + Send + 'static,
    detector: QrDetector,
    paused: Arc<AtomicBool>,
    events: DecodeEventSender,
) {
    futures::pin_mut!(frames);

    while let Some(frame) = frames.next().await {
        if paused.load(Ordering::SeqCst) {
            continue;
        }

        let event = match frame {
            None => DecodeEvent::Failed(DecodeFailure::new("No frame available")),
            Some(frame) => match detector.detect(frame).await.into_iter().next() {
                Some(detection) => DecodeEvent::Decoded(DecodeResult::from(detection)),
                None => DecodeEvent::Failed(DecodeFailure::new("No QR code found")),
            },
        };

        if events.send(event).is_err() {
            debug!("Decode event receiver gone, ending frame loop");
            break;
        }
    }
}

/// Factory for [`QrDecodeEngine`]s sharing one camera source
#[derive(Debug, Clone)]
pub struct QrEngineFactory {
    source: CameraSource,
}

impl QrEngineFactory {
    pub fn new(source: CameraSource) -> Self {
        Self { source }
    }

    pub fn direct(devices: Arc<dyn MediaDevices>) -> Self {
        Self::new(CameraSource::Direct(devices))
    }

    pub fn shared(manager: CameraStreamManager) -> Self {
        Self::new(CameraSource::Shared(manager))
    }
}

impl EngineFactory for QrEngineFactory {
    fn create(&self, container_id: &str) -> Arc<dyn DecodeEngine> {
        Arc::new(QrDecodeEngine::new(container_id, self.source.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::FacingMode;
    use crate::backends::virtual_camera::VirtualCamera;
    use crate::scanner::ScanBox;
    use tokio::sync::mpsc;

    fn settings() -> EngineSettings {
        EngineSettings {
            fps: 15,
            scan_box: Some(ScanBox::new(100, 300)),
        }
    }

    fn camera() -> Arc<VirtualCamera> {
        Arc::new(VirtualCamera::new().with_device(
            "Back",
            Some(FacingMode::Environment),
            vec![CameraFrame::blank(160, 120, 128)],
        ))
    }

    #[tokio::test]
    async fn start_and_stop_direct_engine() {
        let devices = camera();
        let engine = QrDecodeEngine::new("reader", CameraSource::Direct(devices.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        engine
            .start(&ConstraintOption::exact(FacingMode::Environment), &settings(), tx)
            .await
            .unwrap();
        assert_eq!(engine.state(), EngineState::Scanning);
        assert_eq!(devices.live_track_count(), 1);

        // A blank frame only ever produces decode noise
        match rx.recv().await {
            Some(DecodeEvent::Failed(failure)) => assert_eq!(failure.message, "No QR code found"),
            other => panic!("unexpected event: {:?}", other),
        }

        engine.stop().await.unwrap();
        assert_eq!(engine.state(), EngineState::NotStarted);
        assert_eq!(devices.live_track_count(), 0);

        // Buffered noise drains, then the channel closes
        while let Some(event) = rx.recv().await {
            assert!(matches!(event, DecodeEvent::Failed(_)));
        }
    }

    #[tokio::test]
    async fn invalid_transitions_are_rejected() {
        let engine = QrDecodeEngine::new("reader", CameraSource::Direct(camera()));
        assert!(matches!(
            engine.stop().await,
            Err(CameraError::InvalidState(_))
        ));
        assert!(engine.pause().is_err());
        assert!(engine.clear().is_ok());

        let (tx, _rx) = mpsc::unbounded_channel();
        let option = ConstraintOption::unconstrained();
        engine.start(&option, &settings(), tx.clone()).await.unwrap();
        assert!(matches!(
            engine.start(&option, &settings(), tx).await,
            Err(CameraError::InvalidState(_))
        ));
        assert!(engine.clear().is_err());

        engine.pause().unwrap();
        assert_eq!(engine.state(), EngineState::Paused);
        engine.resume().unwrap();
        engine.stop().await.unwrap();
        assert!(engine.clear().is_ok());
    }

    #[tokio::test]
    async fn failed_open_leaves_engine_startable() {
        let devices = camera();
        let engine = QrDecodeEngine::new("reader", CameraSource::Direct(devices.clone()));
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = engine
            .start(&ConstraintOption::exact(FacingMode::User), &settings(), tx.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, CameraError::Overconstrained(_)));
        assert_eq!(engine.state(), EngineState::NotStarted);

        engine
            .start(&ConstraintOption::ideal(FacingMode::User), &settings(), tx)
            .await
            .unwrap();
        engine.stop().await.unwrap();
    }

    #[tokio::test]
    async fn shared_engines_lease_one_stream() {
        let devices = camera();
        let manager = CameraStreamManager::new(devices.clone());
        let factory = QrEngineFactory::shared(manager.clone());
        let first = factory.create("a");
        let second = factory.create("b");
        let (tx, _rx) = mpsc::unbounded_channel();
        let option = ConstraintOption::unconstrained();

        first.start(&option, &settings(), tx.clone()).await.unwrap();
        second.start(&option, &settings(), tx).await.unwrap();
        assert_eq!(devices.open_count(), 1);
        assert_eq!(manager.usage_count(), 2);

        first.stop().await.unwrap();
        assert!(manager.is_active());
        second.stop().await.unwrap();
        assert_eq!(manager.usage_count(), 0);
        assert_eq!(devices.live_track_count(), 0);
    }
}
