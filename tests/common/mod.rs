// SPDX-License-Identifier: GPL-3.0-only

//! Fakes shared by the integration tests

#![allow(dead_code)]

use camscan::backends::camera::types::{
    CameraDevice, CameraFrame, CameraStream, FacingMode, TrackKind, TrackState,
};
use camscan::backends::camera::{ConstraintOption, MediaDevices, MediaTrack};
use camscan::errors::{CameraError, CameraResult};
use camscan::scanner::{
    DecodeEngine, DecodeEvent, DecodeEventSender, DecodeResult, EngineFactory, EngineSettings,
    EngineState, ScannerCallbacks,
};
use camscan::ScannerConfig;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Scanner configuration without the settle delay
pub fn test_config() -> ScannerConfig {
    ScannerConfig {
        settle_delay_ms: 0,
        ..ScannerConfig::default()
    }
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Let spawned tasks run for a few scheduler turns
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// White grayscale frame with `text` encoded as a QR code at its center
pub fn qr_frame(text: &str, width: u32, height: u32, module: u32) -> CameraFrame {
    let code = qrcode::QrCode::new(text.as_bytes()).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let side = modules * module;
    let (left, top) = ((width - side) / 2, (height - side) / 2);

    let mut data = vec![255u8; (width * height) as usize];
    for y in 0..side {
        for x in 0..side {
            let index = ((y / module) * modules + x / module) as usize;
            if colors[index] == qrcode::Color::Dark {
                data[((top + y) * width + left + x) as usize] = 0;
            }
        }
    }
    CameraFrame::gray(width, height, data)
}

// ---------------------------------------------------------------------------
// Camera fakes
// ---------------------------------------------------------------------------

/// What the next `open` call produces
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    Live,
    /// A stream whose only video track has already ended
    Dead,
    Fail(CameraError),
}

pub struct FakeTrack {
    id: String,
    live: AtomicBool,
    frame: Arc<CameraFrame>,
}

impl FakeTrack {
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Simulate the device disappearing
    pub fn end(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn state(&self) -> TrackState {
        if self.is_live() {
            TrackState::Live
        } else {
            TrackState::Ended
        }
    }

    fn stop(&self) {
        self.end();
    }

    fn latest_frame(&self) -> Option<Arc<CameraFrame>> {
        self.is_live().then(|| Arc::clone(&self.frame))
    }
}

/// Scriptable camera API
///
/// `open` pops the next outcome from the script; an empty script opens a
/// live stream. With a gate installed every `open` waits for one permit.
#[derive(Default)]
pub struct FakeDevices {
    script: Mutex<VecDeque<OpenOutcome>>,
    gate: Option<Arc<Semaphore>>,
    opens: AtomicUsize,
    tracks: Mutex<Vec<Arc<FakeTrack>>>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(outcomes: impl IntoIterator<Item = OpenOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Make every `open` wait for a permit on the returned semaphore
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Number of `open` calls made, counted on entry
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.lock().unwrap().len()
    }

    pub fn live_track_count(&self) -> usize {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_live())
            .count()
    }

    /// End every track, as if the camera was unplugged
    pub fn end_all(&self) {
        for track in self.tracks.lock().unwrap().iter() {
            track.end();
        }
    }

    fn make_stream(&self, live: bool) -> CameraStream {
        let mut tracks = self.tracks.lock().unwrap();
        let track = Arc::new(FakeTrack {
            id: format!("fake-{}", tracks.len()),
            live: AtomicBool::new(live),
            frame: Arc::new(CameraFrame::blank(64, 48, 255)),
        });
        tracks.push(Arc::clone(&track));
        let track: Arc<dyn MediaTrack> = track;
        CameraStream::new(vec![track])
    }
}

impl MediaDevices for FakeDevices {
    fn enumerate_video_inputs(&self) -> BoxFuture<'_, CameraResult<Vec<CameraDevice>>> {
        futures::future::ready(Ok(vec![CameraDevice {
            id: "fake-0".into(),
            label: "Fake camera".into(),
            facing: Some(FacingMode::Environment),
        }]))
        .boxed()
    }

    fn open<'a>(
        &'a self,
        _constraints: &'a ConstraintOption,
    ) -> BoxFuture<'a, CameraResult<CameraStream>> {
        async move {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate closed").forget();
            } else {
                tokio::task::yield_now().await;
            }

            let outcome = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(OpenOutcome::Live);
            match outcome {
                OpenOutcome::Live => Ok(self.make_stream(true)),
                OpenOutcome::Dead => Ok(self.make_stream(false)),
                OpenOutcome::Fail(e) => Err(e),
            }
        }
        .boxed()
    }
}

// ---------------------------------------------------------------------------
// Engine fakes
// ---------------------------------------------------------------------------

/// What the next `start` call does
#[derive(Debug, Clone)]
pub enum StartOutcome {
    Ok,
    Fail(CameraError),
    /// Claims the camera, then fails
    Partial(CameraError),
}

/// Script shared by every engine a [`ScriptedFactory`] creates
#[derive(Default)]
struct EngineScript {
    starts: Mutex<VecDeque<StartOutcome>>,
    gate: Option<Arc<Semaphore>>,
}

pub struct ScriptedEngine {
    container_id: String,
    script: Arc<EngineScript>,
    state: Mutex<EngineState>,
    events: Mutex<Option<DecodeEventSender>>,
    started_with: Mutex<Vec<ConstraintOption>>,
    stops: AtomicUsize,
    clears: AtomicUsize,
}

impl ScriptedEngine {
    /// Deliver an event as if it came from a camera frame
    pub fn emit(&self, event: DecodeEvent) -> bool {
        match self.events.lock().unwrap().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn emit_decoded(&self, text: &str) -> bool {
        self.emit(DecodeEvent::Decoded(DecodeResult::text(text)))
    }

    /// Drop the event sender without stopping, as a dying camera would
    pub fn disconnect(&self) {
        self.events.lock().unwrap().take();
    }

    pub fn started_with(&self) -> Vec<ConstraintOption> {
        self.started_with.lock().unwrap().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl DecodeEngine for ScriptedEngine {
    fn container_id(&self) -> &str {
        &self.container_id
    }

    fn state(&self) -> EngineState {
        *self.state.lock().unwrap()
    }

    fn start<'a>(
        &'a self,
        camera: &'a ConstraintOption,
        _settings: &'a EngineSettings,
        events: DecodeEventSender,
    ) -> BoxFuture<'a, CameraResult<()>> {
        async move {
            if self.state().is_running() {
                return Err(CameraError::InvalidState("already scanning".into()));
            }
            self.started_with.lock().unwrap().push(camera.clone());

            if let Some(gate) = &self.script.gate {
                gate.acquire().await.expect("gate closed").forget();
            } else {
                tokio::task::yield_now().await;
            }

            let outcome = self
                .script
                .starts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(StartOutcome::Ok);
            match outcome {
                StartOutcome::Ok => {
                    *self.events.lock().unwrap() = Some(events);
                    *self.state.lock().unwrap() = EngineState::Scanning;
                    Ok(())
                }
                StartOutcome::Fail(e) => Err(e),
                StartOutcome::Partial(e) => {
                    *self.state.lock().unwrap() = EngineState::Scanning;
                    Err(e)
                }
            }
        }
        .boxed()
    }

    fn stop(&self) -> BoxFuture<'_, CameraResult<()>> {
        async move {
            let mut state = self.state.lock().unwrap();
            if !state.is_running() {
                return Err(CameraError::InvalidState("not running".into()));
            }
            *state = EngineState::NotStarted;
            self.events.lock().unwrap().take();
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        .boxed()
    }

    fn clear(&self) -> CameraResult<()> {
        if self.state().is_running() {
            return Err(CameraError::InvalidState("scanning".into()));
        }
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) -> CameraResult<()> {
        *self.state.lock().unwrap() = EngineState::Paused;
        Ok(())
    }

    fn resume(&self) -> CameraResult<()> {
        *self.state.lock().unwrap() = EngineState::Scanning;
        Ok(())
    }
}

/// Factory handing out [`ScriptedEngine`]s and remembering them
#[derive(Default)]
pub struct ScriptedFactory {
    script: Arc<EngineScript>,
    created: Mutex<Vec<Arc<ScriptedEngine>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(outcomes: impl IntoIterator<Item = StartOutcome>) -> Self {
        Self {
            script: Arc::new(EngineScript {
                starts: Mutex::new(outcomes.into_iter().collect()),
                gate: None,
            }),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Make every `start` wait for a permit on the returned semaphore
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let factory = Self {
            script: Arc::new(EngineScript {
                starts: Mutex::new(VecDeque::new()),
                gate: Some(Arc::clone(&gate)),
            }),
            created: Mutex::new(Vec::new()),
        };
        (factory, gate)
    }

    pub fn created(&self) -> Vec<Arc<ScriptedEngine>> {
        self.created.lock().unwrap().clone()
    }

    pub fn last(&self) -> Arc<ScriptedEngine> {
        self.created
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no engine created")
    }

    /// Engines currently holding a camera
    pub fn running_count(&self) -> usize {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.state().is_running())
            .count()
    }
}

impl EngineFactory for ScriptedFactory {
    fn create(&self, container_id: &str) -> Arc<dyn DecodeEngine> {
        let engine = Arc::new(ScriptedEngine {
            container_id: container_id.to_string(),
            script: Arc::clone(&self.script),
            state: Mutex::new(EngineState::NotStarted),
            events: Mutex::new(None),
            started_with: Mutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        });
        self.created.lock().unwrap().push(Arc::clone(&engine));
        engine
    }
}

// ---------------------------------------------------------------------------
// Callback recording
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Recorder {
    successes: Arc<Mutex<Vec<(String, DecodeResult)>>>,
    errors: Arc<Mutex<Vec<String>>>,
    inits: Arc<Mutex<Vec<bool>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callbacks(&self) -> ScannerCallbacks {
        let successes = Arc::clone(&self.successes);
        let errors = Arc::clone(&self.errors);
        let inits = Arc::clone(&self.inits);
        ScannerCallbacks::new()
            .on_success(move |text, result| {
                successes
                    .lock()
                    .unwrap()
                    .push((text.to_string(), result.clone()))
            })
            .on_error(move |message| errors.lock().unwrap().push(message.to_string()))
            .on_init(move |ok| inits.lock().unwrap().push(ok))
    }

    pub fn texts(&self) -> Vec<String> {
        self.successes
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    pub fn successes(&self) -> Vec<(String, DecodeResult)> {
        self.successes.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn inits(&self) -> Vec<bool> {
        self.inits.lock().unwrap().clone()
    }

    pub fn is_silent(&self) -> bool {
        self.successes.lock().unwrap().is_empty()
            && self.errors().is_empty()
            && self.inits().is_empty()
    }
}
