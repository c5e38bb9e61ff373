// SPDX-License-Identifier: GPL-3.0-only

//! camscan - shared camera stream management and a QR scanner widget
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera API traits, the shared stream manager and image-backed cameras
//! - [`scanner`]: Decode engine, QR detection and the scanner widget
//! - [`config`]: Scanner configuration
//! - [`date_range`]: Date range picker selection state
//! - [`errors`]: Error types and user-facing messages
//!
//! # Example
//!
//! ```ignore
//! let devices = Arc::new(VirtualCamera::new().with_device("Back", Some(FacingMode::Environment), frames));
//! let widget = ScannerWidget::new(
//!     ScannerConfig::default(),
//!     Arc::new(QrEngineFactory::direct(devices)),
//!     ScannerCallbacks::new().on_success(|text, _| println!("{text}")),
//! );
//! widget.mount().await;
//! widget.activate().await;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod date_range;
pub mod errors;
pub mod i18n;
pub mod scanner;

// Re-export commonly used types
pub use backends::camera::{
    CameraStream, CameraStreamManager, ConstraintOption, FacingMode, MediaDevices, StreamLease,
};
pub use backends::virtual_camera::VirtualCamera;
pub use config::{RetryPolicy, ScannerConfig};
pub use date_range::DateRangePicker;
pub use errors::{AcquisitionError, AppError, AppResult, CameraError, ErrorCategory};
pub use scanner::{
    ActivationOutcome, DecodeResult, QrEngineFactory, ScannerCallbacks, ScannerStatus,
    ScannerWidget,
};
