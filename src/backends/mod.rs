// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera capture
//!
//! # Modules
//!
//! - [`camera`]: Camera API traits, shared stream manager and constraint options
//! - [`virtual_camera`]: Image-backed camera devices

pub mod camera;
pub mod virtual_camera;
