// SPDX-License-Identifier: GPL-3.0-only

//! Error types for camera acquisition and scanning
//!
//! Camera failures are classified into a small set of categories. The
//! category decides whether a failure is retried, swallowed or shown to the
//! user, and which translated message the user sees.

use crate::fl;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type for camera operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Coarse classification of camera and decode failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The user or platform refused camera access
    PermissionDenied,
    /// No device matched the request
    DeviceNotFound,
    /// The device exists but could not be read (in use, hardware fault)
    DeviceBusy,
    /// Camera capture is unavailable in this environment
    Unsupported,
    /// A frame was read but contained no decodable code
    TransientDecodeNoise,
    /// Anything else
    Unknown,
}

/// Camera-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Camera permission refused
    PermissionDenied(String),
    /// No camera devices found
    DeviceNotFound(String),
    /// No device satisfies the requested constraints
    Overconstrained(String),
    /// Camera is busy or unreadable
    DeviceBusy(String),
    /// Capture API not available
    Unsupported(String),
    /// A stream was opened but delivered no live video track
    NotLive,
    /// Operation not valid in the current engine state
    InvalidState(String),
    /// Unclassified error, message kept verbatim
    Other(String),
}

impl CameraError {
    /// Map a browser `DOMException` name (as thrown by `getUserMedia`) to an error
    pub fn from_dom_name(name: &str, message: &str) -> Self {
        let message = message.to_string();
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                CameraError::PermissionDenied(message)
            }
            "NotFoundError" | "DevicesNotFoundError" => CameraError::DeviceNotFound(message),
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => {
                CameraError::Overconstrained(message)
            }
            "NotReadableError" | "TrackStartError" | "AbortError" => {
                CameraError::DeviceBusy(message)
            }
            "NotSupportedError" | "TypeError" => CameraError::Unsupported(message),
            _ => CameraError::Other(message),
        }
    }

    /// Category used for retry and messaging decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            CameraError::PermissionDenied(_) => ErrorCategory::PermissionDenied,
            CameraError::DeviceNotFound(_) | CameraError::Overconstrained(_) => {
                ErrorCategory::DeviceNotFound
            }
            CameraError::DeviceBusy(_) | CameraError::NotLive => ErrorCategory::DeviceBusy,
            CameraError::Unsupported(_) => ErrorCategory::Unsupported,
            CameraError::InvalidState(_) | CameraError::Other(_) => ErrorCategory::Unknown,
        }
    }

    /// Actionable, translated text for display to the user
    ///
    /// Unrecognized errors pass their raw message through.
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::PermissionDenied => fl!("error-permission-denied"),
            ErrorCategory::DeviceNotFound => fl!("error-device-not-found"),
            ErrorCategory::DeviceBusy => fl!("error-device-busy"),
            ErrorCategory::Unsupported => fl!("error-unsupported"),
            ErrorCategory::TransientDecodeNoise | ErrorCategory::Unknown => self.raw_message(),
        }
    }

    /// The underlying message without the category prefix
    pub fn raw_message(&self) -> String {
        match self {
            CameraError::PermissionDenied(msg)
            | CameraError::DeviceNotFound(msg)
            | CameraError::Overconstrained(msg)
            | CameraError::DeviceBusy(msg)
            | CameraError::Unsupported(msg)
            | CameraError::InvalidState(msg)
            | CameraError::Other(msg) => msg.clone(),
            CameraError::NotLive => "stream has no live video track".to_string(),
        }
    }
}

/// Every constraint option was tried and none produced a live stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionError {
    /// Number of options attempted
    pub attempts: usize,
    /// Error from the final attempt
    pub last: CameraError,
}

impl AcquisitionError {
    pub fn category(&self) -> ErrorCategory {
        self.last.category()
    }

    pub fn user_message(&self) -> String {
        self.last.user_message()
    }
}

/// A frame was sampled but nothing could be decoded from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub message: String,
}

impl DecodeFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::TransientDecodeNoise
    }
}

/// Main error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// All acquisition fallbacks failed
    Acquisition(AcquisitionError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Acquisition(e) => write!(f, "{}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            CameraError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            CameraError::Overconstrained(msg) => write!(f, "Constraints not satisfied: {}", msg),
            CameraError::DeviceBusy(msg) => write!(f, "Device busy: {}", msg),
            CameraError::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            CameraError::NotLive => write!(f, "Stream has no live video track"),
            CameraError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            CameraError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No camera constraint produced a live stream after {} attempt(s): {}",
            self.attempts, self.last
        )
    }
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decode failed: {}", self.message)
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for AcquisitionError {}
impl std::error::Error for DecodeFailure {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<AcquisitionError> for AppError {
    fn from(err: AcquisitionError) -> Self {
        AppError::Acquisition(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<image::ImageError> for CameraError {
    fn from(err: image::ImageError) -> Self {
        CameraError::Other(format!("Failed to load image: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dom_names_map_to_categories() {
        let cases = [
            ("NotAllowedError", ErrorCategory::PermissionDenied),
            ("SecurityError", ErrorCategory::PermissionDenied),
            ("NotFoundError", ErrorCategory::DeviceNotFound),
            ("OverconstrainedError", ErrorCategory::DeviceNotFound),
            ("NotReadableError", ErrorCategory::DeviceBusy),
            ("NotSupportedError", ErrorCategory::Unsupported),
            ("WeirdError", ErrorCategory::Unknown),
        ];
        for (name, expected) in cases {
            assert_eq!(
                CameraError::from_dom_name(name, "boom").category(),
                expected,
                "{name}"
            );
        }
    }

    #[test]
    fn unknown_errors_pass_raw_message_through() {
        let err = CameraError::Other("Something odd happened".into());
        assert_eq!(err.user_message(), "Something odd happened");
    }

    #[test]
    fn known_categories_hide_raw_message() {
        let err = CameraError::PermissionDenied("NotAllowedError: Permission dismissed".into());
        let message = err.user_message();
        assert!(!message.is_empty());
        assert!(!message.contains("NotAllowedError"));
    }

    #[test]
    fn decode_failures_are_noise() {
        assert_eq!(
            DecodeFailure::new("No QR code found").category(),
            ErrorCategory::TransientDecodeNoise
        );
    }
}
