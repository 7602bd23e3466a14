// SPDX-License-Identifier: GPL-3.0-only

//! Camera controller
//!
//! Binds one camera session at a time and hands out still captures.
//!
//! ```text
//! Unbound ──begin──▶ Previewing ──capture──▶ Capturing
//!    ▲                  ▲  │                     │
//!    └──bind failed─────┘  └────◀── result ──────┘
//!
//! any state ──release──▶ Released
//! ```

use super::executor::CameraExecutor;
use super::types::*;
use super::{CameraBackend, CameraSession};
use crate::config::Config;
use crate::errors::CameraError;
use image::RgbaImage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Unbound,
    Previewing,
    Capturing,
    Released,
}

impl std::fmt::Display for CameraState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CameraState::Unbound => "unbound",
            CameraState::Previewing => "previewing",
            CameraState::Capturing => "capturing",
            CameraState::Released => "released",
        };
        write!(f, "{}", name)
    }
}

/// What to open and how long to wait for stills
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Device path; `None` picks the first enumerated camera
    pub device_path: Option<String>,
    pub format: CameraFormat,
    /// Replaces the rotation the device reports
    pub rotation_override: Option<SensorRotation>,
    pub capture_timeout: Duration,
}

impl CameraSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            device_path: config.camera_path.clone(),
            format: CameraFormat {
                width: config.capture_width,
                height: config.capture_height,
            },
            rotation_override: config.rotation_degrees.map(SensorRotation::from_degrees_int),
            capture_timeout: config.capture_timeout(),
        }
    }
}

struct ControllerInner {
    state: CameraState,
    session: Option<Arc<dyn CameraSession>>,
    next_capture: u64,
    active_capture: Option<u64>,
}

pub struct CameraController {
    backend: Arc<dyn CameraBackend>,
    settings: CameraSettings,
    inner: Mutex<ControllerInner>,
    preview: Arc<PreviewSink>,
    executor: CameraExecutor,
}

/// Returns the controller to `Previewing` when a capture ends, even if the
/// capture future is dropped early
struct CaptureGuard<'a> {
    controller: &'a CameraController,
    id: u64,
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.controller.lock();
        if inner.active_capture == Some(self.id) {
            inner.active_capture = None;
            if inner.state == CameraState::Capturing {
                inner.state = CameraState::Previewing;
            }
        }
    }
}

fn open_session(
    backend: &dyn CameraBackend,
    settings: &CameraSettings,
    preview: Arc<PreviewSink>,
) -> Result<Arc<dyn CameraSession>, CameraError> {
    let mut device = backend
        .resolve_device(settings.device_path.as_deref())
        .map_err(|e| match e {
            BackendError::DeviceNotFound(_) if settings.device_path.is_none() => {
                CameraError::NoCameraFound
            }
            other => CameraError::BindFailed(other.to_string()),
        })?;

    if let Some(rotation) = settings.rotation_override {
        device.rotation = rotation;
    }

    backend
        .open(&device, &settings.format, preview)
        .map_err(|e| CameraError::BindFailed(e.to_string()))
}

impl CameraController {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        settings: CameraSettings,
    ) -> Result<Self, CameraError> {
        let executor = CameraExecutor::start("camera-executor")?;
        debug!(backend = backend.name(), "Camera controller created");

        Ok(Self {
            backend,
            settings,
            inner: Mutex::new(ControllerInner {
                state: CameraState::Unbound,
                session: None,
                next_capture: 0,
                active_capture: None,
            }),
            preview: Arc::new(PreviewSink::default()),
            executor,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CameraState {
        self.lock().state
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Device of the bound session
    pub fn current_device(&self) -> Option<CameraDevice> {
        self.lock()
            .session
            .as_ref()
            .map(|session| session.device().clone())
    }

    /// Enumerate the backend's cameras
    pub async fn list_cameras(&self) -> Result<Vec<CameraDevice>, CameraError> {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || backend.enumerate_cameras())
            .await
            .map_err(|e| CameraError::BindFailed(e.to_string()))?
            .map_err(|e| CameraError::BindFailed(e.to_string()))
    }

    /// Acquire a camera session and start previewing
    ///
    /// An existing binding is torn down first. On failure the controller is
    /// left `Unbound`; nothing is retried.
    pub async fn begin(&self) -> Result<CameraDevice, CameraError> {
        let previous = {
            let mut inner = self.lock();
            if inner.state == CameraState::Released {
                return Err(CameraError::Released);
            }
            inner.state = CameraState::Unbound;
            inner.active_capture = None;
            inner.session.take()
        };

        if previous.is_some() {
            debug!("Unbinding previous camera session");
        }

        let backend = Arc::clone(&self.backend);
        let settings = self.settings.clone();
        let preview = Arc::clone(&self.preview);

        let opened = tokio::task::spawn_blocking(move || {
            if let Some(session) = previous {
                session.stop();
            }
            open_session(backend.as_ref(), &settings, preview)
        })
        .await
        .map_err(|e| CameraError::BindFailed(e.to_string()))
        .and_then(|result| result);

        let session = match opened {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Use case binding failed");
                let mut inner = self.lock();
                if inner.state != CameraState::Released {
                    inner.state = CameraState::Unbound;
                }
                return Err(e);
            }
        };

        let device = session.device().clone();
        let stale = {
            let mut inner = self.lock();
            if inner.state == CameraState::Released {
                Err(Arc::clone(&session))
            } else {
                inner.state = CameraState::Previewing;
                Ok(inner.session.replace(session))
            }
        };

        match stale {
            Err(orphan) => {
                warn!("Controller released while binding, closing new session");
                orphan.stop();
                Err(CameraError::Released)
            }
            Ok(replaced) => {
                if let Some(replaced) = replaced {
                    replaced.stop();
                }
                info!(device = %device.name, rotation = %device.rotation, "Camera bound");
                Ok(device)
            }
        }
    }

    /// Connect the preview surface; frames are dropped while it is full
    pub fn attach_preview(&self, sender: FrameSender) {
        self.preview.attach(sender);
    }

    /// Capture one still image, rotated upright
    ///
    /// Runs on the camera executor thread. Only one capture may be in flight.
    pub async fn capture(&self) -> Result<RgbaImage, CameraError> {
        let (session, id) = {
            let mut inner = self.lock();
            match inner.state {
                CameraState::Previewing => {}
                CameraState::Capturing => return Err(CameraError::CaptureInProgress),
                CameraState::Unbound => return Err(CameraError::NotBound),
                CameraState::Released => return Err(CameraError::Released),
            }
            let session = inner.session.clone().ok_or(CameraError::NotBound)?;
            inner.next_capture += 1;
            let id = inner.next_capture;
            inner.active_capture = Some(id);
            inner.state = CameraState::Capturing;
            (session, id)
        };
        let _guard = CaptureGuard {
            controller: self,
            id,
        };

        let timeout = self.settings.capture_timeout;
        let (sender, receiver) = futures::channel::oneshot::channel();

        self.executor.execute(move || {
            let result = session
                .capture_frame(timeout)
                .map_err(|e| CameraError::CaptureFailed(e.to_string()))
                .and_then(|frame| {
                    debug!(
                        width = frame.width,
                        height = frame.height,
                        rotation = %frame.rotation,
                        "Frame captured, rotating upright"
                    );
                    frame
                        .to_upright_image()
                        .map_err(|e| CameraError::CaptureFailed(e.to_string()))
                });
            let _ = sender.send(result);
        })?;

        let result = receiver
            .await
            .unwrap_or_else(|_| Err(CameraError::CaptureFailed("capture job dropped".into())));

        match &result {
            Ok(image) => info!(width = image.width(), height = image.height(), "Photo captured"),
            Err(e) => error!(error = %e, "Photo capture failed"),
        }
        result
    }

    /// Unbind everything and stop the executor. Idempotent.
    ///
    /// Blocks while the backend stops its pipeline.
    pub fn release(&self) {
        let session = {
            let mut inner = self.lock();
            if inner.state == CameraState::Released {
                return;
            }
            inner.state = CameraState::Released;
            inner.active_capture = None;
            inner.session.take()
        };

        info!("Releasing camera");
        self.preview.detach();
        self.executor.shutdown();
        if let Some(session) = session {
            session.stop();
        }
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{SyntheticBackend, SyntheticSource};
    use image::Rgba;

    fn settings() -> CameraSettings {
        CameraSettings {
            device_path: None,
            format: CameraFormat {
                width: 24,
                height: 12,
            },
            rotation_override: None,
            capture_timeout: Duration::from_secs(2),
        }
    }

    fn controller(backend: SyntheticBackend) -> CameraController {
        let backend = backend.with_frame_interval(Duration::from_millis(5));
        CameraController::new(Arc::new(backend), settings()).unwrap()
    }

    #[tokio::test]
    async fn test_capture_requires_binding() {
        let camera = controller(SyntheticBackend::new(SyntheticSource::TestCard));
        assert!(matches!(
            camera.capture().await,
            Err(CameraError::NotBound)
        ));
    }

    #[tokio::test]
    async fn test_begin_capture_cycle() {
        let camera = controller(SyntheticBackend::new(SyntheticSource::TestCard));
        camera.begin().await.unwrap();
        assert_eq!(camera.state(), CameraState::Previewing);

        let image = camera.capture().await.unwrap();
        assert_eq!(image.dimensions(), (24, 12));
        assert_eq!(camera.state(), CameraState::Previewing);

        // Rebinding replaces the session
        camera.begin().await.unwrap();
        assert_eq!(camera.state(), CameraState::Previewing);
        assert!(camera.capture().await.is_ok());
    }

    #[tokio::test]
    async fn test_rotation_metadata_is_applied() {
        let source = Arc::new(RgbaImage::from_fn(4, 2, |x, y| {
            Rgba([x as u8 * 60, y as u8 * 200, 0, 255])
        }));
        let camera = controller(
            SyntheticBackend::new(SyntheticSource::Image(source))
                .with_rotation(SensorRotation::Rotate90),
        );
        camera.begin().await.unwrap();

        let image = camera.capture().await.unwrap();
        assert_eq!(image.dimensions(), (2, 4));
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 200, 0, 255]));
        assert_eq!(image.get_pixel(1, 3), &Rgba([180, 0, 0, 255]));
    }

    #[tokio::test]
    async fn test_second_capture_is_rejected_while_in_flight() {
        let camera = controller(SyntheticBackend::new(SyntheticSource::TestCard));
        camera.begin().await.unwrap();

        let (first, second) = tokio::join!(camera.capture(), camera.capture());
        assert!(first.is_ok());
        assert!(matches!(second, Err(CameraError::CaptureInProgress)));
        assert_eq!(camera.state(), CameraState::Previewing);
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_final() {
        let camera = controller(SyntheticBackend::new(SyntheticSource::TestCard));
        camera.begin().await.unwrap();

        camera.release();
        camera.release();
        assert_eq!(camera.state(), CameraState::Released);
        assert!(camera.current_device().is_none());
        assert!(matches!(camera.capture().await, Err(CameraError::Released)));
        assert!(matches!(camera.begin().await, Err(CameraError::Released)));
    }

    #[tokio::test]
    async fn test_bind_failure_leaves_unbound() {
        let camera = controller(SyntheticBackend::new(SyntheticSource::File(
            "/nonexistent/source.png".into(),
        )));
        assert!(matches!(
            camera.begin().await,
            Err(CameraError::BindFailed(_))
        ));
        assert_eq!(camera.state(), CameraState::Unbound);
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            camera_path: Some("/dev/video2".to_string()),
            rotation_degrees: Some(-90),
            ..Config::default()
        };
        let settings = CameraSettings::from_config(&config);
        assert_eq!(settings.device_path.as_deref(), Some("/dev/video2"));
        assert_eq!(settings.rotation_override, Some(SensorRotation::Rotate270));
        assert_eq!(settings.capture_timeout, config.capture_timeout());
    }
}
