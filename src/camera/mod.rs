// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture
//!
//! ```text
//! ┌──────────────────────┐
//! │   CameraController   │  ← lifecycle, capture one-shots, executor thread
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │  CameraBackend trait │  ← enumeration, opening sessions
//! └──────────┬───────────┘
//!            │
//!       ┌────┴──────┐
//!       ▼           ▼
//!  ┌─────────┐ ┌──────────┐
//!  │GStreamer│ │Synthetic │
//!  └─────────┘ └──────────┘
//! ```

pub mod controller;
mod executor;
pub mod frame_loop;
pub mod gstreamer;
pub mod synthetic;
pub mod types;

pub use controller::{CameraController, CameraSettings, CameraState};
pub use gstreamer::GStreamerBackend;
pub use synthetic::{SyntheticBackend, SyntheticSource};
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

/// A camera backend: enumerates devices and opens capture sessions
pub trait CameraBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Enumerate available cameras
    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>>;

    /// Open a streaming session on `device`
    ///
    /// Frames go to `preview` (when a surface is attached) and are retained
    /// for still capture. Blocking; call off the async runtime.
    fn open(
        &self,
        device: &CameraDevice,
        format: &CameraFormat,
        preview: Arc<PreviewSink>,
    ) -> BackendResult<Arc<dyn CameraSession>>;

    /// Pick the device for `path`, or the first camera when `path` is `None`
    ///
    /// A path that enumeration does not report is opened as-is.
    fn resolve_device(&self, path: Option<&str>) -> BackendResult<CameraDevice> {
        let cameras = self.enumerate_cameras()?;
        match path {
            Some(path) => Ok(cameras
                .into_iter()
                .find(|camera| camera.path == path)
                .unwrap_or_else(|| CameraDevice {
                    name: path.to_string(),
                    path: path.to_string(),
                    rotation: SensorRotation::None,
                })),
            None => cameras
                .into_iter()
                .next()
                .ok_or_else(|| BackendError::DeviceNotFound("no cameras".to_string())),
        }
    }
}

/// An open camera session streaming frames
pub trait CameraSession: Send + Sync {
    /// Device this session was opened on
    fn device(&self) -> &CameraDevice;

    /// Block until a frame produced after this call is available
    fn capture_frame(&self, timeout: Duration) -> BackendResult<CameraFrame>;

    /// Stop streaming and release the device. Idempotent.
    fn stop(&self);
}
