// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic camera backend
//!
//! Streams a still image (a file, an in-memory image, or a generated test
//! card) as if it were a live camera. Frames carry a configurable rotation
//! so sideways sensors can be reproduced without hardware.

use super::frame_loop::{FrameLoop, LoopAction};
use super::types::*;
use super::{CameraBackend, CameraSession};
use crate::constants::timing;
use image::{Rgba, RgbaImage};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Where synthetic frames come from
#[derive(Debug, Clone)]
pub enum SyntheticSource {
    /// Color bars generated at the requested size
    TestCard,
    /// Image file decoded once when the session opens
    File(PathBuf),
    /// Image supplied by the caller
    Image(Arc<RgbaImage>),
}

impl SyntheticSource {
    fn label(&self) -> String {
        match self {
            SyntheticSource::TestCard => "test card".to_string(),
            SyntheticSource::File(path) => path.display().to_string(),
            SyntheticSource::Image(image) => format!("{}x{} image", image.width(), image.height()),
        }
    }

    fn load(&self, format: &CameraFormat) -> BackendResult<RgbaImage> {
        match self {
            SyntheticSource::TestCard => Ok(test_card(format.width, format.height)),
            SyntheticSource::File(path) => image::open(path)
                .map(|image| image.to_rgba8())
                .map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", path.display(), e))),
            SyntheticSource::Image(image) => Ok((**image).clone()),
        }
    }
}

/// Backend presenting a single synthetic camera
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    source: SyntheticSource,
    rotation: SensorRotation,
    frame_interval: Duration,
}

impl SyntheticBackend {
    pub fn new(source: SyntheticSource) -> Self {
        Self {
            source,
            rotation: SensorRotation::None,
            frame_interval: timing::SYNTHETIC_FRAME_INTERVAL,
        }
    }

    /// Report `rotation` as the sensor mounting on every frame
    pub fn with_rotation(mut self, rotation: SensorRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    fn device(&self) -> CameraDevice {
        CameraDevice {
            name: format!("Synthetic ({})", self.source.label()),
            path: "synthetic".to_string(),
            rotation: self.rotation,
        }
    }
}

impl CameraBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "Synthetic"
    }

    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>> {
        Ok(vec![self.device()])
    }

    fn resolve_device(&self, _path: Option<&str>) -> BackendResult<CameraDevice> {
        Ok(self.device())
    }

    fn open(
        &self,
        device: &CameraDevice,
        format: &CameraFormat,
        preview: Arc<PreviewSink>,
    ) -> BackendResult<Arc<dyn CameraSession>> {
        let image = self.source.load(format)?;
        info!(
            source = %self.source.label(),
            width = image.width(),
            height = image.height(),
            rotation = %device.rotation,
            "Opening synthetic session"
        );

        let template = CameraFrame::from_image(&image, device.rotation);
        let latest = Arc::new(LatestFrame::default());
        let stopped = Arc::new(AtomicBool::new(false));

        let loop_latest = Arc::clone(&latest);
        let loop_stopped = Arc::clone(&stopped);
        let interval = self.frame_interval;

        let frame_loop = FrameLoop::start("synthetic-camera", move || {
            if loop_stopped.load(Ordering::SeqCst) {
                return LoopAction::Stop;
            }
            let mut frame = template.clone();
            frame.captured_at = std::time::Instant::now();
            preview.publish(&frame);
            loop_latest.push(frame);
            std::thread::sleep(interval);
            LoopAction::Continue
        })?;

        Ok(Arc::new(SyntheticSession {
            device: device.clone(),
            latest,
            stopped,
            frame_loop: Mutex::new(Some(frame_loop)),
        }))
    }
}

struct SyntheticSession {
    device: CameraDevice,
    latest: Arc<LatestFrame>,
    stopped: Arc<AtomicBool>,
    frame_loop: Mutex<Option<FrameLoop>>,
}

impl CameraSession for SyntheticSession {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn capture_frame(&self, timeout: Duration) -> BackendResult<CameraFrame> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(BackendError::Stopped);
        }
        self.latest.wait_next(timeout)
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Stopping synthetic session");
        self.latest.close();
        // The loop exits after its current sleep; joined when the session drops
        if let Some(frame_loop) = self
            .frame_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            frame_loop.request_stop();
        }
    }
}

/// SMPTE-style color bars with a gray ramp along the bottom
pub fn test_card(width: u32, height: u32) -> RgbaImage {
    const BARS: [[u8; 3]; 7] = [
        [192, 192, 192],
        [192, 192, 0],
        [0, 192, 192],
        [0, 192, 0],
        [192, 0, 192],
        [192, 0, 0],
        [0, 0, 192],
    ];
    let width = width.max(1);
    let height = height.max(1);
    let ramp_start = height * 3 / 4;

    RgbaImage::from_fn(width, height, |x, y| {
        if y >= ramp_start {
            let level = (x * 255 / (width - 1).max(1)) as u8;
            Rgba([level, level, level, 255])
        } else {
            let [r, g, b] = BARS[(x * BARS.len() as u32 / width) as usize];
            Rgba([r, g, b, 255])
        }
    })
}
