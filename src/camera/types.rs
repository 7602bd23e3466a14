// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for camera backends

use image::RgbaImage;
use image::imageops;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to build or start the capture pipeline
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// No frame arrived before the capture deadline
    Timeout(Duration),
    /// The session was stopped while waiting for a frame
    Stopped,
    /// Frame data does not match its declared layout
    InvalidFrame(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::Timeout(after) => write!(f, "No frame within {} ms", after.as_millis()),
            BackendError::Stopped => write!(f, "Camera session stopped"),
            BackendError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// The clockwise rotation that turns a raw frame upright. Sensors mounted
/// sideways report 90 or 270.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorRotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    /// Values that are not a multiple of 90 map to `None`.
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Parse rotation from a string value (degrees)
    pub fn from_degrees(degrees: &str) -> Self {
        degrees
            .trim()
            .parse::<i32>()
            .map(Self::from_degrees_int)
            .unwrap_or_default()
    }

    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Rotate `image` clockwise by this amount
    pub fn apply(&self, image: RgbaImage) -> RgbaImage {
        match self {
            SensorRotation::None => image,
            SensorRotation::Rotate90 => imageops::rotate90(&image),
            SensorRotation::Rotate180 => imageops::rotate180(&image),
            SensorRotation::Rotate270 => imageops::rotate270(&image),
        }
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDevice {
    /// Human readable name
    pub name: String,
    /// `/dev/videoN`, PipeWire node serial, `test`, or a synthetic source id
    pub path: String,
    /// Mounting rotation reported by the device
    pub rotation: SensorRotation,
}

/// Requested capture size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A single RGBA frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row (may include padding)
    pub stride: u32,
    pub data: Arc<[u8]>,
    /// Rotation needed to display this frame upright
    pub rotation: SensorRotation,
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Copy the frame into a tightly packed image, dropping row padding
    pub fn to_rgba_image(&self) -> BackendResult<RgbaImage> {
        let row_bytes = self.width as usize * 4;
        let stride = self.stride as usize;
        let needed = stride * self.height.saturating_sub(1) as usize + row_bytes;

        if stride < row_bytes || self.data.len() < needed {
            return Err(BackendError::InvalidFrame(format!(
                "{}x{} stride {} with {} bytes",
                self.width,
                self.height,
                self.stride,
                self.data.len()
            )));
        }

        let pixels = if stride == row_bytes {
            self.data[..row_bytes * self.height as usize].to_vec()
        } else {
            let mut packed = Vec::with_capacity(row_bytes * self.height as usize);
            for row in self.data.chunks(stride).take(self.height as usize) {
                packed.extend_from_slice(&row[..row_bytes]);
            }
            packed
        };

        RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| BackendError::InvalidFrame("buffer size mismatch".to_string()))
    }

    /// Image rotated upright according to the frame's rotation metadata
    pub fn to_upright_image(&self) -> BackendResult<RgbaImage> {
        let image = self.to_rgba_image()?;
        Ok(self.rotation.apply(image))
    }

    /// Wrap a packed image as a frame
    pub fn from_image(image: &RgbaImage, rotation: SensorRotation) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            stride: image.width() * 4,
            data: Arc::from(image.as_raw().as_slice()),
            rotation,
            captured_at: Instant::now(),
        }
    }
}

/// Sender half of the preview surface channel
pub type FrameSender = futures::channel::mpsc::Sender<CameraFrame>;
/// Receiver half of the preview surface channel
pub type FrameReceiver = futures::channel::mpsc::Receiver<CameraFrame>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Preview surface shared between the controller and the streaming thread
///
/// Frames are offered with `try_send`; a full or closed channel drops them.
#[derive(Default)]
pub struct PreviewSink {
    sender: Mutex<Option<FrameSender>>,
}

impl PreviewSink {
    pub fn attach(&self, sender: FrameSender) {
        *lock(&self.sender) = Some(sender);
    }

    pub fn detach(&self) {
        lock(&self.sender).take();
    }

    /// Offer a frame to the preview surface
    pub fn publish(&self, frame: &CameraFrame) {
        let mut guard = lock(&self.sender);
        if let Some(sender) = guard.as_mut()
            && let Err(e) = sender.try_send(frame.clone())
        {
            if e.is_disconnected() {
                debug!("Preview surface closed, detaching");
                guard.take();
            }
        }
    }
}

#[derive(Default)]
struct LatestState {
    sequence: u64,
    frame: Option<CameraFrame>,
    closed: bool,
}

/// Most recent frame of a session, with a wait for the next one
#[derive(Default)]
pub struct LatestFrame {
    state: Mutex<LatestState>,
    arrived: Condvar,
}

impl LatestFrame {
    /// Store a new frame and wake waiting captures
    pub fn push(&self, frame: CameraFrame) {
        let mut state = lock(&self.state);
        state.sequence += 1;
        state.frame = Some(frame);
        self.arrived.notify_all();
    }

    /// Wake every waiter with `Stopped`; later pushes are ignored by waiters
    pub fn close(&self) {
        lock(&self.state).closed = true;
        self.arrived.notify_all();
    }

    /// Wait for the first frame produced after this call
    pub fn wait_next(&self, timeout: Duration) -> BackendResult<CameraFrame> {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.state);
        let start = state.sequence;

        loop {
            if state.closed {
                return Err(BackendError::Stopped);
            }
            if state.sequence > start
                && let Some(frame) = &state.frame
            {
                return Ok(frame.clone());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BackendError::Timeout(timeout));
            }
            state = self
                .arrived
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn frame_with_stride(width: u32, height: u32, stride: u32) -> CameraFrame {
        let mut data = vec![0u8; (stride * height) as usize];
        for y in 0..height {
            for x in 0..width {
                let i = (y * stride + x * 4) as usize;
                data[i] = x as u8;
                data[i + 1] = y as u8;
                data[i + 3] = 255;
            }
        }
        CameraFrame {
            width,
            height,
            stride,
            data: Arc::from(data),
            rotation: SensorRotation::None,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_rotation_parsing() {
        assert_eq!(SensorRotation::from_degrees("90"), SensorRotation::Rotate90);
        assert_eq!(SensorRotation::from_degrees("-90"), SensorRotation::Rotate270);
        assert_eq!(SensorRotation::from_degrees("450"), SensorRotation::Rotate90);
        assert_eq!(SensorRotation::from_degrees("45"), SensorRotation::None);
        assert_eq!(SensorRotation::from_degrees("abc"), SensorRotation::None);
    }

    #[test]
    fn test_padded_stride_is_packed() {
        let frame = frame_with_stride(3, 2, 16);
        let image = frame.to_rgba_image().unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1), &Rgba([2, 1, 0, 255]));
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let mut frame = frame_with_stride(4, 4, 16);
        frame.data = Arc::from(vec![0u8; 10]);
        assert!(matches!(
            frame.to_rgba_image(),
            Err(BackendError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_upright_rotates_clockwise() {
        let mut frame = frame_with_stride(4, 2, 16);
        frame.rotation = SensorRotation::Rotate90;
        let image = frame.to_upright_image().unwrap();
        assert_eq!(image.dimensions(), (2, 4));
        // Bottom-left source pixel moves to the top-left
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 1, 0, 255]));
    }

    #[test]
    fn test_wait_next_ignores_older_frames() {
        let latest = Arc::new(LatestFrame::default());
        latest.push(frame_with_stride(1, 1, 4));

        assert!(matches!(
            latest.wait_next(Duration::from_millis(20)),
            Err(BackendError::Timeout(_))
        ));

        let producer = Arc::clone(&latest);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push(frame_with_stride(2, 2, 8));
        });
        let frame = latest.wait_next(Duration::from_secs(2)).unwrap();
        assert_eq!(frame.width, 2);
        handle.join().unwrap();
    }

    #[test]
    fn test_close_wakes_waiters() {
        let latest = LatestFrame::default();
        latest.close();
        assert!(matches!(
            latest.wait_next(Duration::from_secs(1)),
            Err(BackendError::Stopped)
        ));
    }

    #[test]
    fn test_preview_sink_drops_when_full() {
        let sink = PreviewSink::default();
        let (tx, mut rx) = futures::channel::mpsc::channel(0);
        sink.attach(tx);
        for _ in 0..4 {
            sink.publish(&frame_with_stride(1, 1, 4));
        }
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        // Capacity 0 still leaves one slot per sender
        assert_eq!(received, 1);
        drop(rx);
        sink.publish(&frame_with_stride(1, 1, 4));
        assert!(lock(&sink.sender).is_none());
    }
}
