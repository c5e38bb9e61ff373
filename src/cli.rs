// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing image-backed cameras
//! - Scanning them for QR codes with the scanner widget
//! - Printing the effective configuration

use camscan::backends::camera::{CameraStreamManager, FacingMode, MediaDevices};
use camscan::{
    ActivationOutcome, QrEngineFactory, ScannerCallbacks, ScannerConfig, ScannerWidget,
    VirtualCamera,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Build a virtual camera with one device per non-empty image list
fn build_camera(
    rear: &[PathBuf],
    front: &[PathBuf],
) -> Result<VirtualCamera, Box<dyn std::error::Error>> {
    let mut camera = VirtualCamera::new();
    if !rear.is_empty() {
        camera = camera.with_image_device("Rear camera", Some(FacingMode::Environment), rear)?;
    }
    if !front.is_empty() {
        camera = camera.with_image_device("Front camera", Some(FacingMode::User), front)?;
    }
    Ok(camera)
}

/// List all available cameras
pub fn list_devices(rear: &[PathBuf], front: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let camera = build_camera(rear, front)?;
    let rt = tokio::runtime::Runtime::new()?;
    let devices = rt.block_on(camera.enumerate_video_inputs())?;

    if devices.is_empty() {
        println!("No cameras found. Pass image files with --rear or --front.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, device) in devices.iter().enumerate() {
        let facing = device
            .facing
            .map(|f| f.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("  [{}] {} ({}, {})", index, device.label, device.id, facing);
    }

    Ok(())
}

/// Remembers the last decoded payload
#[derive(Default)]
struct RepeatFilter {
    last: Mutex<Option<String>>,
}

impl RepeatFilter {
    /// Whether `text` equals the previous payload; records it otherwise
    fn is_repeat(&self, text: &str) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_deref() == Some(text) {
            return true;
        }
        *last = Some(text.to_string());
        false
    }
}

/// Run a scanner against the given images
pub fn scan(
    config: ScannerConfig,
    rear: &[PathBuf],
    front: &[PathBuf],
    timeout: u64,
    shared: bool,
    keep_going: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let devices: Arc<dyn MediaDevices> = Arc::new(build_camera(rear, front)?);

    let factory = if shared {
        let manager = CameraStreamManager::with_options(
            Arc::clone(&devices),
            config.fallback_options(),
        );
        QrEngineFactory::shared(manager)
    } else {
        QrEngineFactory::direct(devices)
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let repeats = RepeatFilter::default();
    let callbacks = ScannerCallbacks::new()
        .on_success(move |text, result| {
            // A still image decodes on every sampled frame
            if repeats.is_repeat(text) {
                return;
            }
            println!("[{}] {}", result.format, text);
            let _ = tx.send(text.to_string());
        })
        .on_error(|message| eprintln!("Error: {}", message));

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let widget = ScannerWidget::new(config, Arc::new(factory), callbacks);
        widget.mount().await;

        match widget.activate().await {
            ActivationOutcome::Started => println!("Scanning... (Ctrl+C to stop)"),
            ActivationOutcome::Failed(message) => return Err(message.into()),
            other => return Err(format!("Scanner did not start: {:?}", other).into()),
        }

        let deadline = tokio::time::sleep(Duration::from_secs(timeout));
        tokio::pin!(deadline);
        let mut poll = tokio::time::interval(Duration::from_millis(100));
        let mut found = 0usize;

        loop {
            tokio::select! {
                code = rx.recv() => {
                    if code.is_none() {
                        break;
                    }
                    found += 1;
                    if !keep_going {
                        break;
                    }
                }
                _ = &mut deadline => {
                    println!("Timed out after {}s", timeout);
                    break;
                }
                _ = poll.tick() => {
                    if stop_flag.load(Ordering::SeqCst) {
                        println!();
                        println!("Stopping early...");
                        break;
                    }
                    if let Some(message) = widget.last_error() {
                        widget.unmount().await;
                        return Err(message.into());
                    }
                }
            }
        }

        widget.unmount().await;
        println!("Decoded {} code(s)", found);
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Print the effective configuration as JSON
pub fn print_config(config: &ScannerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = ScannerConfig::default_path() {
        eprintln!("Default location: {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    println!();
    println!("Constraint order:");
    for (index, option) in config.fallback_options().iter().enumerate() {
        println!("  {}. {}", index + 1, option);
    }
    Ok(())
}
