// SPDX-License-Identifier: GPL-3.0-only

//! Camera presenter
//!
//! Owns the captured original and the displayed image, and sequences the
//! camera controller, filter applier and image persister. State goes out
//! through a `watch` channel; the UI thread reads snapshots from it.
//!
//! Every render carries a generation number. A render publishes only while
//! it is still the newest one and its original is still current, so fast
//! filter switches and resets cannot be overwritten by stale results.

mod state;

pub use state::{Notice, Phase, ViewState};

use crate::camera::{CameraController, CameraState, FrameSender};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::filters::{FilterApplier, FilterCatalog, FilterType, RenderBackend, RenderMode};
use crate::storage::{ImagePersister, SavedImage};
use image::RgbaImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Presenter tuning taken from the config
#[derive(Debug, Clone)]
pub struct PresenterOptions {
    pub render_mode: RenderMode,
    pub reset_delay: Duration,
    pub default_filter: FilterType,
}

impl PresenterOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            render_mode: config.render_mode,
            reset_delay: config.reset_delay(),
            default_filter: config.default_filter,
        }
    }
}

struct PresenterInner {
    camera: Arc<CameraController>,
    applier: FilterApplier,
    catalog: FilterCatalog,
    persister: ImagePersister,
    options: PresenterOptions,
    render_generation: AtomicU64,
    state: watch::Sender<ViewState>,
}

/// Cheap to clone; clones share one presenter
#[derive(Clone)]
pub struct CameraPresenter {
    inner: Arc<PresenterInner>,
}

impl CameraPresenter {
    pub fn new(
        camera: Arc<CameraController>,
        persister: ImagePersister,
        options: PresenterOptions,
    ) -> Self {
        let initial = ViewState {
            selected_filter: options.default_filter,
            ..ViewState::default()
        };
        let (state, _) = watch::channel(initial);

        Self {
            inner: Arc::new(PresenterInner {
                camera,
                applier: FilterApplier::new(),
                catalog: FilterCatalog::new(),
                persister,
                options,
                render_generation: AtomicU64::new(0),
                state,
            }),
        }
    }

    /// Receive every published state
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.inner.state.subscribe()
    }

    /// Current state
    pub fn snapshot(&self) -> ViewState {
        self.inner.state.borrow().clone()
    }

    pub fn available_filters(&self) -> &'static [FilterType] {
        self.inner.catalog.available_filters()
    }

    /// Bind the rendering context and start the camera
    pub async fn setup(&self) -> AppResult<RenderBackend> {
        let backend = match self.inner.applier.setup(self.inner.options.render_mode).await {
            Ok(backend) => backend,
            Err(e) => {
                error!(error = %e, "Filter applier setup failed");
                self.notify(Notice::FilterFailed(e.to_string()));
                return Err(e.into());
            }
        };
        self.inner.state.send_modify(|s| s.render_backend = Some(backend.clone()));

        self.start_camera().await?;
        Ok(backend)
    }

    /// Connect the live preview surface
    pub fn attach_preview(&self, sender: FrameSender) {
        self.inner.camera.attach_preview(sender);
    }

    /// Select `filter` and re-render the displayed image from the original
    ///
    /// The selection and its generation are taken when this is called, not
    /// when the returned future is first polled, so spawned renders keep the
    /// order of the calls.
    pub fn apply_filter(
        &self,
        filter: FilterType,
    ) -> impl Future<Output = AppResult<()>> + Send + 'static {
        // Selection, original and generation must be read together
        let mut claim = (None, 0);
        self.inner.state.send_modify(|s| {
            s.selected_filter = filter;
            claim = (s.original.clone(), self.next_generation());
        });
        let presenter = self.clone();

        async move {
            match claim {
                (Some(original), generation) => {
                    presenter.render(original, filter, generation).await
                }
                (None, _) => {
                    debug!(filter = %filter, "Filter selected without a photo");
                    Ok(())
                }
            }
        }
    }

    /// Capture a still, keep it as the original and show it filtered
    pub async fn take_photo(&self) -> AppResult<()> {
        self.inner.state.send_if_modified(|s| {
            if s.phase == Phase::Previewing {
                s.phase = Phase::Capturing;
                true
            } else {
                false
            }
        });

        let image = match self.inner.camera.capture().await {
            Ok(image) => Arc::new(image),
            Err(e) => {
                let camera_phase = self.camera_phase();
                self.inner.state.send_modify(|s| {
                    s.phase = if s.original.is_some() {
                        Phase::Reviewing
                    } else {
                        camera_phase
                    };
                });
                self.notify(Notice::CaptureFailed(e.to_string()));
                return Err(e.into());
            }
        };

        let (filter, generation) = self.adopt_photo(Arc::clone(&image));
        self.render(image, filter, generation).await
    }

    /// Save the displayed image; `None` when there is nothing to save
    pub async fn save(&self) -> AppResult<Option<SavedImage>> {
        let displayed = self.inner.state.borrow().displayed.clone();
        let Some(displayed) = displayed else {
            debug!("Nothing to save");
            return Ok(None);
        };

        match self.inner.persister.save_image(displayed).await {
            Ok(saved) => {
                self.notify(Notice::Saved(saved.path.clone()));
                Ok(Some(saved))
            }
            Err(e) => {
                self.notify(Notice::SaveFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Drop the photo and restart the camera after the reset delay
    pub async fn reset(&self) -> AppResult<()> {
        self.inner.state.send_modify(|s| {
            self.next_generation();
            s.original = None;
            s.displayed = None;
            s.phase = Phase::Idle;
        });

        tokio::time::sleep(self.inner.options.reset_delay).await;
        self.start_camera().await
    }

    /// Release the camera
    pub async fn release(&self) {
        self.next_generation();
        let camera = Arc::clone(&self.inner.camera);
        if let Err(e) = tokio::task::spawn_blocking(move || camera.release()).await {
            warn!(error = %e, "Camera release task failed");
        }
        self.inner.state.send_modify(|s| s.phase = Phase::Idle);
    }

    /// Report that camera access was refused; the camera stays off
    pub fn permission_denied(&self) {
        warn!("Camera permission denied");
        self.inner.state.send_modify(|s| s.phase = Phase::Idle);
        self.notify(Notice::PermissionDenied);
    }

    async fn start_camera(&self) -> AppResult<()> {
        match self.inner.camera.begin().await {
            Ok(device) => {
                self.inner.state.send_modify(|s| {
                    s.phase = Phase::Previewing;
                    s.camera_name = Some(device.name.clone());
                });
                Ok(())
            }
            Err(e) => {
                self.inner.state.send_modify(|s| s.phase = Phase::Idle);
                self.notify(Notice::CameraUnavailable(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Store a new original and claim its render in one state update
    fn adopt_photo(&self, image: Arc<RgbaImage>) -> (FilterType, u64) {
        let mut claim = (FilterType::None, 0);
        self.inner.state.send_modify(|s| {
            s.original = Some(image);
            s.displayed = None;
            s.phase = Phase::Reviewing;
            claim = (s.selected_filter, self.next_generation());
        });
        claim
    }

    async fn render(
        &self,
        original: Arc<RgbaImage>,
        filter: FilterType,
        generation: u64,
    ) -> AppResult<()> {
        let rendered = if filter == FilterType::None {
            Ok(Arc::clone(&original))
        } else {
            self.inner
                .applier
                .apply(&original, filter)
                .await
                .map(Arc::new)
        };

        let rendered = match rendered {
            Ok(rendered) => rendered,
            Err(e) => {
                error!(filter = %filter, error = %e, "Filter render failed");
                self.notify(Notice::FilterFailed(e.to_string()));
                return Err(AppError::from(e));
            }
        };

        let latest = &self.inner.render_generation;
        let published = self.inner.state.send_if_modified(|s| {
            let current = s
                .original
                .as_ref()
                .is_some_and(|o| Arc::ptr_eq(o, &original));
            if current && latest.load(Ordering::SeqCst) == generation {
                s.displayed = Some(rendered);
                true
            } else {
                false
            }
        });

        if published {
            info!(filter = %filter, "Displayed image updated");
        } else {
            debug!(filter = %filter, generation, "Discarding stale render");
        }
        Ok(())
    }

    /// Claim a render generation; callers that pair it with an original or
    /// a selection do so inside the same state update
    fn next_generation(&self) -> u64 {
        self.inner.render_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn camera_phase(&self) -> Phase {
        match self.inner.camera.state() {
            CameraState::Previewing => Phase::Previewing,
            CameraState::Capturing => Phase::Capturing,
            CameraState::Unbound | CameraState::Released => Phase::Idle,
        }
    }

    fn notify(&self, notice: Notice) {
        if notice.is_error() {
            warn!(notice = %notice, "Notice");
        } else {
            info!(notice = %notice, "Notice");
        }
        self.inner.state.send_modify(|s| {
            s.notice = Some(notice);
            s.notice_id += 1;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraFormat, CameraSettings, SyntheticBackend, SyntheticSource};

    fn presenter(dir: &std::path::Path) -> CameraPresenter {
        let backend = SyntheticBackend::new(SyntheticSource::TestCard)
            .with_frame_interval(Duration::from_millis(5));
        let settings = CameraSettings {
            device_path: None,
            format: CameraFormat {
                width: 40,
                height: 30,
            },
            rotation_override: None,
            capture_timeout: Duration::from_secs(2),
        };
        let camera = Arc::new(CameraController::new(Arc::new(backend), settings).unwrap());
        let persister = ImagePersister::new(dir.join("album"), "Pictures/FilterCamera", 95);
        let options = PresenterOptions {
            render_mode: RenderMode::Cpu,
            reset_delay: Duration::from_millis(10),
            default_filter: FilterType::None,
        };
        CameraPresenter::new(camera, persister, options)
    }

    #[tokio::test]
    async fn test_filter_before_capture_only_records_selection() {
        let dir = tempfile::tempdir().unwrap();
        let presenter = presenter(dir.path());
        presenter.setup().await.unwrap();

        presenter.apply_filter(FilterType::Sepia).await.unwrap();
        let state = presenter.snapshot();
        assert_eq!(state.selected_filter, FilterType::Sepia);
        assert!(state.displayed.is_none());
        assert_eq!(state.phase, Phase::Previewing);
    }

    #[tokio::test]
    async fn test_stale_generation_is_not_published() {
        let dir = tempfile::tempdir().unwrap();
        let presenter = presenter(dir.path());
        presenter.setup().await.unwrap();
        presenter.take_photo().await.unwrap();

        let original = presenter.snapshot().original.unwrap();
        let stale = presenter.next_generation();
        presenter.next_generation();
        presenter
            .render(Arc::clone(&original), FilterType::Invert, stale)
            .await
            .unwrap();

        let displayed = presenter.snapshot().displayed.unwrap();
        assert!(Arc::ptr_eq(&displayed, &original));
    }

    fn green(width: u32, height: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([0, 255, 0, 255]),
        ))
    }

    fn assert_magenta(image: &RgbaImage) {
        assert!(image.pixels().all(|p| p.0 == [255, 0, 255, 255]));
    }

    #[tokio::test]
    async fn test_filter_switch_while_photo_lands() {
        let dir = tempfile::tempdir().unwrap();
        let presenter = presenter(dir.path());
        presenter.setup().await.unwrap();
        presenter.take_photo().await.unwrap();

        // Switch claimed against the old photo, then the new photo lands
        let switch = presenter.apply_filter(FilterType::Invert);
        let photo = green(8, 6);
        let (filter, generation) = presenter.adopt_photo(Arc::clone(&photo));
        assert_eq!(filter, FilterType::Invert);

        presenter.render(photo, filter, generation).await.unwrap();
        switch.await.unwrap();

        let displayed = presenter.snapshot().displayed.unwrap();
        assert_eq!(displayed.dimensions(), (8, 6));
        assert_magenta(&displayed);
    }

    #[tokio::test]
    async fn test_photo_lands_while_filter_switches() {
        let dir = tempfile::tempdir().unwrap();
        let presenter = presenter(dir.path());
        presenter.setup().await.unwrap();

        // New photo claimed first, then a switch renders it before it finishes
        let photo = green(8, 6);
        let (filter, generation) = presenter.adopt_photo(Arc::clone(&photo));
        assert_eq!(filter, FilterType::None);
        presenter.apply_filter(FilterType::Invert).await.unwrap();
        presenter.render(photo, filter, generation).await.unwrap();

        let state = presenter.snapshot();
        assert_eq!(state.selected_filter, FilterType::Invert);
        assert_magenta(&state.displayed.unwrap());
    }

    #[tokio::test]
    async fn test_capture_failure_becomes_notice() {
        let dir = tempfile::tempdir().unwrap();
        let presenter = presenter(dir.path());
        presenter.setup().await.unwrap();
        presenter.release().await;

        assert!(presenter.take_photo().await.is_err());
        let state = presenter.snapshot();
        assert!(matches!(state.notice, Some(Notice::CaptureFailed(_))));
        assert_eq!(state.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_permission_denied_notice() {
        let dir = tempfile::tempdir().unwrap();
        let presenter = presenter(dir.path());
        let mut receiver = presenter.subscribe();

        presenter.permission_denied();
        assert!(receiver.has_changed().unwrap());
        let state = receiver.borrow_and_update().clone();
        assert_eq!(state.notice, Some(Notice::PermissionDenied));
        assert_eq!(state.notice_id, 1);
    }
}
