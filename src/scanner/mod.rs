// SPDX-License-Identifier: GPL-3.0-only

//! QR scanning
//!
//! - [`engine`]: the decode engine abstraction
//! - [`qr_engine`]: camera-backed engine running `rqrr`
//! - [`widget`]: the scanner widget driving an engine through its lifecycle

pub mod engine;
pub mod qr_detector;
pub mod qr_engine;
pub mod session;
pub mod types;
pub mod view;
pub mod widget;

pub use engine::{DecodeEngine, EngineFactory};
pub use qr_detector::QrDetector;
pub use qr_engine::{CameraSource, QrDecodeEngine, QrEngineFactory};
pub use session::{AttemptCounter, AttemptId, NoiseSampler, ScannerStatus};
pub use types::{
    CodeFormat, DecodeEvent, DecodeEventReceiver, DecodeEventSender, DecodeResult, EngineSettings,
    EngineState, FrameRegion, QrDetection, ScanBox,
};
pub use view::{LayoutMode, ScannerView};
pub use widget::{ActivationOutcome, ScannerCallbacks, ScannerWidget};
