// SPDX-License-Identifier: GPL-3.0-only

//! Render model for the scanner widget

use super::session::ScannerStatus;
use crate::constants::scanner::COMPACT_VIEW_SIZE;
use crate::fl;
use serde::{Deserialize, Serialize};

/// How the preview region is sized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Fixed square box
    #[default]
    Compact,
    /// Fill the parent container
    Fill,
}

/// What the host should draw for a scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerView {
    pub container_id: String,
    pub layout: LayoutMode,
    /// Side of the preview box in pixels, `None` when filling the parent
    pub frame_size: Option<u32>,
    /// Side of the highlighted scan region, in compact preview pixels
    pub scan_box: Option<u32>,
    pub show_spinner: bool,
    pub spinner_text: Option<String>,
    pub error_overlay: Option<String>,
}

impl ScannerView {
    pub fn new(
        container_id: &str,
        layout: LayoutMode,
        scan_box: Option<u32>,
        status: &ScannerStatus,
    ) -> Self {
        let show_spinner = status.is_initializing();
        Self {
            container_id: container_id.to_string(),
            layout,
            frame_size: match layout {
                LayoutMode::Compact => Some(COMPACT_VIEW_SIZE),
                LayoutMode::Fill => None,
            },
            scan_box,
            show_spinner,
            spinner_text: show_spinner.then(|| fl!("scanner-initializing")),
            error_overlay: status.error().map(str::to_string),
        }
    }
}
