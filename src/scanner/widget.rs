// SPDX-License-Identifier: GPL-3.0-only

//! QR scanner widget
//!
//! The widget owns at most one decode engine. Activation runs an attempt:
//!
//! ```text
//! activate ─► teardown previous engine ─► settle ─► create engine
//!          ─► start against each constraint option (with retries)
//!          ─► Running (pump decode events) | Failed (report once)
//! ```
//!
//! Every attempt carries an [`AttemptId`]. Deactivation, unmount and restart
//! invalidate outstanding attempts; a stale attempt notices at its next
//! suspension point, shuts down the engine it created and returns
//! [`ActivationOutcome::Superseded`] without touching widget state or calling
//! back.

use super::engine::{DecodeEngine, EngineFactory};
use super::session::{AttemptCounter, AttemptId, NoiseSampler, ScannerStatus};
use super::types::{DecodeEvent, DecodeEventReceiver, DecodeResult};
use super::view::ScannerView;
use crate::config::ScannerConfig;
use crate::errors::CameraError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type SuccessCallback = Arc<dyn Fn(&str, &DecodeResult) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type InitCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Caller-supplied lifecycle callbacks
#[derive(Clone, Default)]
pub struct ScannerCallbacks {
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
    on_init: Option<InitCallback>,
}

impl ScannerCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the decoded text and the full result for every decode
    pub fn on_success(mut self, f: impl Fn(&str, &DecodeResult) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Called with a user-facing message when the scanner fails
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called once per activation with the initialization outcome
    pub fn on_init(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_init = Some(Arc::new(f));
        self
    }

    fn success(&self, text: &str, result: &DecodeResult) {
        if let Some(f) = &self.on_success {
            f(text, result);
        }
    }

    fn error(&self, message: &str) {
        if let Some(f) = &self.on_error {
            f(message);
        }
    }

    fn init(&self, ok: bool) {
        if let Some(f) = &self.on_init {
            f(ok);
        }
    }
}

impl std::fmt::Debug for ScannerCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerCallbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_init", &self.on_init.is_some())
            .finish()
    }
}

/// Result of an activation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The engine is decoding
    Started,
    /// Every constraint option failed; carries the user-facing message
    Failed(String),
    /// An attempt is already initializing or running
    AlreadyActive,
    /// No container is mounted
    NotMounted,
    /// A newer activation, deactivation or unmount overtook this attempt
    Superseded,
}

#[derive(Default)]
struct WidgetState {
    mounted: bool,
    active: bool,
    status: ScannerStatus,
    engine: Option<Arc<dyn DecodeEngine>>,
    pump: Option<JoinHandle<()>>,
}

struct Inner {
    config: ScannerConfig,
    factory: Arc<dyn EngineFactory>,
    callbacks: ScannerCallbacks,
    attempts: AttemptCounter,
    state: Mutex<WidgetState>,
    /// Serializes teardowns so stop always precedes clear
    teardown_gate: tokio::sync::Mutex<()>,
}

/// QR scanner bound to one container
///
/// Cloning yields another handle to the same widget.
#[derive(Clone)]
pub struct ScannerWidget {
    inner: Arc<Inner>,
}

impl ScannerWidget {
    pub fn new(
        config: ScannerConfig,
        factory: Arc<dyn EngineFactory>,
        callbacks: ScannerCallbacks,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                factory,
                callbacks,
                attempts: AttemptCounter::new(),
                state: Mutex::new(WidgetState::default()),
                teardown_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The container became available
    ///
    /// Starts scanning right away when the widget was already activated.
    pub async fn mount(&self) -> Option<ActivationOutcome> {
        let active = {
            let mut state = self.inner.lock();
            state.mounted = true;
            state.active
        };
        debug!(container = %self.inner.config.container_id, "Scanner mounted");

        if active {
            Some(Inner::start_attempt(&self.inner).await)
        } else {
            None
        }
    }

    /// The container is going away; stops everything
    pub async fn unmount(&self) {
        {
            let mut state = self.inner.lock();
            state.mounted = false;
            state.status = ScannerStatus::Idle;
            self.inner.attempts.invalidate();
        }
        debug!(container = %self.inner.config.container_id, "Scanner unmounted");
        self.inner.teardown().await;
    }

    pub async fn activate(&self) -> ActivationOutcome {
        self.inner.lock().active = true;
        Inner::start_attempt(&self.inner).await
    }

    pub async fn deactivate(&self) {
        {
            let mut state = self.inner.lock();
            state.active = false;
            state.status = ScannerStatus::Idle;
            self.inner.attempts.invalidate();
        }
        info!(container = %self.inner.config.container_id, "Scanner deactivated");
        self.inner.teardown().await;
    }

    /// Follow an externally controlled activation flag
    pub async fn set_active(&self, active: bool) -> Option<ActivationOutcome> {
        if active {
            Some(self.activate().await)
        } else {
            self.deactivate().await;
            None
        }
    }

    /// Abandon any current attempt or session and start over
    pub async fn restart(&self) -> ActivationOutcome {
        {
            let mut state = self.inner.lock();
            state.active = true;
            state.status = ScannerStatus::Idle;
            self.inner.attempts.invalidate();
        }
        info!(container = %self.inner.config.container_id, "Scanner restarting");
        Inner::start_attempt(&self.inner).await
    }

    /// Abandon any attempt, then stop and clear the engine
    ///
    /// Safe to call repeatedly. The activation flag is left as is.
    pub async fn teardown(&self) {
        {
            let mut state = self.inner.lock();
            state.status = ScannerStatus::Idle;
            self.inner.attempts.invalidate();
        }
        self.inner.teardown().await;
    }

    pub fn status(&self) -> ScannerStatus {
        self.inner.lock().status.clone()
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.lock().mounted
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().status.error().map(str::to_string)
    }

    /// Engine currently owned by the widget
    pub fn engine(&self) -> Option<Arc<dyn DecodeEngine>> {
        self.inner.lock().engine.clone()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.inner.config
    }

    pub fn view(&self) -> ScannerView {
        let config = &self.inner.config;
        ScannerView::new(
            &config.container_id,
            config.layout,
            config.scan_region().map(|region| region.side),
            &self.inner.lock().status,
        )
    }
}

impl std::fmt::Debug for ScannerWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ScannerWidget")
            .field("container_id", &self.inner.config.container_id)
            .field("mounted", &state.mounted)
            .field("active", &state.active)
            .field("status", &state.status)
            .field("has_engine", &state.engine.is_some())
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, WidgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, attempt: AttemptId) -> bool {
        self.attempts.is_current(attempt)
    }

    async fn start_attempt(inner: &Arc<Inner>) -> ActivationOutcome {
        let container = inner.config.container_id.as_str();

        let attempt = {
            let mut state = inner.lock();
            if !state.mounted {
                debug!(container, "Activation ignored, container not mounted");
                return ActivationOutcome::NotMounted;
            }
            if state.status.is_initializing() || state.status.is_running() {
                debug!(container, status = ?state.status, "Activation ignored, scanner already active");
                return ActivationOutcome::AlreadyActive;
            }
            let attempt = inner.attempts.begin();
            state.status = ScannerStatus::Initializing;
            attempt
        };
        info!(container, %attempt, "Scanner initializing");

        inner.teardown().await;
        if !inner.is_current(attempt) {
            return ActivationOutcome::Superseded;
        }

        let settle = inner.config.settle_delay();
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
            if !inner.is_current(attempt) {
                return ActivationOutcome::Superseded;
            }
        }

        let engine = inner.factory.create(container);
        {
            let mut state = inner.lock();
            if !inner.is_current(attempt) {
                return ActivationOutcome::Superseded;
            }
            state.engine = Some(Arc::clone(&engine));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let settings = inner.config.engine_settings();
        let retry = inner.config.retry;
        let mut last_error = None;
        let mut started = false;

        'options: for option in inner.config.fallback_options() {
            for try_no in 1..=retry.attempts() {
                if try_no > 1 && !retry.delay().is_zero() {
                    tokio::time::sleep(retry.delay()).await;
                }
                if !inner.is_current(attempt) {
                    inner.abandon(&engine).await;
                    return ActivationOutcome::Superseded;
                }

                match engine.start(&option, &settings, tx.clone()).await {
                    Ok(()) => {
                        info!(container, %attempt, constraint = %option, "Camera started");
                        started = true;
                        break 'options;
                    }
                    Err(e) => {
                        debug!(container, %attempt, constraint = %option, try_no, error = %e, "Camera start failed");
                        // A half-started engine must not keep the device open
                        if engine.state().is_running()
                            && let Err(e) = engine.stop().await
                        {
                            debug!(error = %e, "Stopping partially started engine failed");
                        }
                        last_error = Some(e);
                    }
                }
            }
        }
        drop(tx);

        if !inner.is_current(attempt) {
            inner.abandon(&engine).await;
            return ActivationOutcome::Superseded;
        }

        if started {
            inner.lock().status = ScannerStatus::Running;
            inner.callbacks.init(true);

            let pump = tokio::spawn(pump_events(
                Arc::downgrade(inner),
                attempt,
                rx,
                inner.config.noise_sample_every,
            ));
            let mut state = inner.lock();
            if inner.is_current(attempt) {
                state.pump = Some(pump);
            } else {
                pump.abort();
            }
            return ActivationOutcome::Started;
        }

        let error = last_error.unwrap_or_else(|| {
            CameraError::DeviceNotFound("No camera constraint options configured".into())
        });
        let message = error.user_message();
        warn!(container, %attempt, error = %error, "Scanner failed to start");

        inner.lock().status = ScannerStatus::Failed(message.clone());
        inner.teardown().await;
        if !inner.is_current(attempt) {
            return ActivationOutcome::Superseded;
        }

        inner.callbacks.init(false);
        inner.callbacks.error(&message);
        ActivationOutcome::Failed(message)
    }

    /// Stop the pump, shut the engine down, then forget it
    async fn teardown(&self) {
        let _gate = self.teardown_gate.lock().await;

        let (pump, engine) = {
            let mut state = self.lock();
            (state.pump.take(), state.engine.clone())
        };

        if let Some(pump) = pump {
            pump.abort();
        }

        if let Some(engine) = engine {
            shutdown_engine(engine.as_ref()).await;
            let mut state = self.lock();
            if state
                .engine
                .as_ref()
                .is_some_and(|held| Arc::ptr_eq(held, &engine))
            {
                state.engine = None;
            }
            debug!(container = %self.config.container_id, "Scanner engine torn down");
        }
    }

    /// Shut down an engine created by a stale attempt
    async fn abandon(&self, engine: &Arc<dyn DecodeEngine>) {
        debug!(container = %self.config.container_id, "Attempt superseded, shutting down its engine");
        shutdown_engine(engine.as_ref()).await;
        let mut state = self.lock();
        if state
            .engine
            .as_ref()
            .is_some_and(|held| Arc::ptr_eq(held, engine))
        {
            state.engine = None;
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(pump) = state.pump.take() {
            pump.abort();
        }
        if let Some(engine) = state.engine.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { shutdown_engine(engine.as_ref()).await });
                }
                Err(_) => {
                    warn!(container = %self.config.container_id, "Scanner dropped outside a runtime, engine not stopped");
                }
            }
        }
    }
}

/// Stop if scanning or paused, then clear; failures mean already released
async fn shutdown_engine(engine: &dyn DecodeEngine) {
    if engine.state().is_running()
        && let Err(e) = engine.stop().await
    {
        debug!(container = engine.container_id(), error = %e, "Engine stop failed, treating as stopped");
    }
    if let Err(e) = engine.clear() {
        debug!(container = engine.container_id(), error = %e, "Engine clear failed");
    }
}

/// Forward decode events of one attempt to the caller
async fn pump_events(
    inner: Weak<Inner>,
    attempt: AttemptId,
    mut events: DecodeEventReceiver,
    noise_sample_every: u64,
) {
    let mut noise = NoiseSampler::new(noise_sample_every);

    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if !inner.is_current(attempt) {
            return;
        }

        match event {
            DecodeEvent::Decoded(result) => {
                debug!(%attempt, text = %result.text, format = %result.format, "Code decoded");
                inner.callbacks.success(&result.text, &result);
            }
            DecodeEvent::Failed(failure) => {
                if let Some(seen) = noise.record() {
                    debug!(%attempt, seen, error = %failure, "Decode noise");
                }
            }
        }
    }

    // The engine dropped its sender without being stopped: the camera ended
    let Some(inner) = inner.upgrade() else {
        return;
    };
    if !inner.is_current(attempt) {
        return;
    }

    let message = CameraError::NotLive.user_message();
    let failed = {
        let mut state = inner.lock();
        if state.status.is_running() {
            state.status = ScannerStatus::Failed(message.clone());
            // Detach ourselves so the teardown below does not abort this task
            drop(state.pump.take());
            true
        } else {
            false
        }
    };

    if failed {
        warn!(container = %inner.config.container_id, %attempt, "Camera stream ended while scanning");
        inner.callbacks.error(&message);
        inner.teardown().await;
    }
}
