// SPDX-License-Identifier: GPL-3.0-only

//! Still images as camera frames

use crate::backends::camera::types::CameraFrame;
use crate::errors::{CameraError, CameraResult};
use std::path::Path;
use tracing::debug;

/// Image extensions accepted as frame sources
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

pub fn is_image_extension(extension: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&extension.to_lowercase().as_str())
}

/// Load an image file as a grayscale camera frame
pub fn load_image_as_frame(path: &Path) -> CameraResult<CameraFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    if !is_image_extension(extension) {
        return Err(CameraError::Unsupported(format!(
            "Unsupported file format: {}",
            path.display()
        )));
    }

    let luma = image::open(path)?.to_luma8();
    let (width, height) = luma.dimensions();
    debug!(path = %path.display(), width, height, "Loaded image frame");

    Ok(CameraFrame::gray(width, height, luma.into_raw()))
}
