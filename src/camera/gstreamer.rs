// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer camera backend
//!
//! Sessions run `source ! videoconvert ! videoscale ! appsink` with RGBA caps
//! at the requested size. The appsink callback forwards each frame to the
//! preview surface and keeps the latest one for still capture.

use super::types::*;
use super::{CameraBackend, CameraSession};
use crate::constants::{pipeline, timing};
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSinkCallbacks};
use gstreamer_video::{VideoCapsBuilder, VideoFormat, VideoInfo};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Camera backend over GStreamer's device monitor and capture elements
#[derive(Debug, Default)]
pub struct GStreamerBackend;

impl GStreamerBackend {
    pub fn new() -> Self {
        Self
    }

    fn init() -> BackendResult<()> {
        gstreamer::init().map_err(|e| BackendError::NotAvailable(e.to_string()))
    }
}

/// Device path advertised by a device provider
fn device_path(props: &gstreamer::StructureRef) -> Option<String> {
    for key in ["api.v4l2.path", "device.path"] {
        if let Ok(path) = props.get::<String>(key) {
            return Some(path);
        }
    }
    props
        .value("object.serial")
        .ok()
        .and_then(|value| value.serialize().ok())
        .map(|serial| serial.to_string())
}

/// Source element for a device path
fn make_source(path: &str) -> BackendResult<gstreamer::Element> {
    let built = if path == pipeline::TEST_SOURCE_PATH {
        gstreamer::ElementFactory::make("videotestsrc")
            .property("is-live", true)
            .property_from_str("pattern", "smpte")
            .build()
    } else if path.starts_with("/dev/") {
        gstreamer::ElementFactory::make("v4l2src")
            .property("device", path)
            .build()
    } else if path.is_empty() {
        gstreamer::ElementFactory::make("pipewiresrc").build()
    } else {
        gstreamer::ElementFactory::make("pipewiresrc")
            .property("target-object", path)
            .build()
    };

    built.map_err(|e| {
        BackendError::InitializationFailed(format!("No source element for '{}': {}", path, e))
    })
}

fn make_element(factory: &str) -> BackendResult<gstreamer::Element> {
    gstreamer::ElementFactory::make(factory)
        .build()
        .map_err(|e| BackendError::InitializationFailed(format!("{}: {}", factory, e)))
}

/// First error message posted on the pipeline bus, if any
fn bus_error(pipeline: &gstreamer::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    let message = bus.pop_filtered(&[gstreamer::MessageType::Error])?;
    match message.view() {
        gstreamer::MessageView::Error(err) => Some(err.error().to_string()),
        _ => None,
    }
}

impl CameraBackend for GStreamerBackend {
    fn name(&self) -> &'static str {
        "GStreamer"
    }

    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>> {
        Self::init()?;

        let monitor = gstreamer::DeviceMonitor::new();
        monitor.add_filter(Some("Video/Source"), None);
        monitor
            .start()
            .map_err(|e| BackendError::NotAvailable(format!("Device monitor: {}", e)))?;
        let devices = monitor.devices();
        monitor.stop();

        let mut cameras: Vec<CameraDevice> = Vec::new();
        for device in devices {
            let name = device.display_name().to_string();
            let props = device.properties();

            let Some(path) = props.as_ref().and_then(|p| device_path(p)) else {
                debug!(name = %name, "Skipping device without a path");
                continue;
            };
            if cameras.iter().any(|camera| camera.path == path) {
                continue;
            }

            let rotation = props
                .as_ref()
                .and_then(|p| p.get::<String>("api.libcamera.rotation").ok())
                .map(|degrees| SensorRotation::from_degrees(&degrees))
                .unwrap_or_default();

            debug!(name = %name, path = %path, rotation = %rotation, "Found camera");
            cameras.push(CameraDevice {
                name,
                path,
                rotation,
            });
        }

        info!(count = cameras.len(), "Enumerated GStreamer cameras");
        Ok(cameras)
    }

    fn open(
        &self,
        device: &CameraDevice,
        format: &CameraFormat,
        preview: Arc<PreviewSink>,
    ) -> BackendResult<Arc<dyn CameraSession>> {
        Self::init()?;
        info!(device = %device.name, path = %device.path, format = %format, "Opening GStreamer session");

        let source = make_source(&device.path)?;
        let convert = make_element("videoconvert")?;
        let scale = make_element("videoscale")?;

        let caps = VideoCapsBuilder::new()
            .format(VideoFormat::Rgba)
            .width(format.width as i32)
            .height(format.height as i32)
            .build();

        let appsink = AppSink::builder()
            .caps(&caps)
            .max_buffers(pipeline::MAX_BUFFERS)
            .drop(true)
            .sync(false)
            .build();

        let gst_pipeline = gstreamer::Pipeline::new();
        gst_pipeline
            .add_many([&source, &convert, &scale, appsink.upcast_ref()])
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;
        gstreamer::Element::link_many([&source, &convert, &scale, appsink.upcast_ref()])
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        let latest = Arc::new(LatestFrame::default());
        let frame_latest = Arc::clone(&latest);
        let rotation = device.rotation;
        let frame_counter = AtomicU64::new(0);

        appsink.set_callbacks(
            AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let frame_num = frame_counter.fetch_add(1, Ordering::Relaxed);
                    let sample = sink.pull_sample().map_err(|_| gstreamer::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                    let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;

                    let info = VideoInfo::from_caps(caps).map_err(|e| {
                        error!(frame = frame_num, error = ?e, "Failed to get video info");
                        gstreamer::FlowError::Error
                    })?;
                    let map = buffer.map_readable().map_err(|e| {
                        error!(frame = frame_num, error = ?e, "Failed to map buffer");
                        gstreamer::FlowError::Error
                    })?;

                    let frame = CameraFrame {
                        width: info.width(),
                        height: info.height(),
                        stride: info.stride()[0] as u32,
                        data: Arc::from(map.as_slice()),
                        rotation,
                        captured_at: Instant::now(),
                    };

                    if frame_num == 0 {
                        debug!(width = frame.width, height = frame.height, stride = frame.stride, "First frame");
                    }

                    preview.publish(&frame);
                    frame_latest.push(frame);
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .build(),
        );

        let session = GStreamerSession {
            device: device.clone(),
            pipeline: gst_pipeline,
            appsink,
            latest,
            stopped: AtomicBool::new(false),
        };

        if let Err(e) = session.pipeline.set_state(gstreamer::State::Playing) {
            let reason = bus_error(&session.pipeline).unwrap_or_else(|| e.to_string());
            session.stop();
            return Err(BackendError::InitializationFailed(reason));
        }

        let (result, state, _) = session
            .pipeline
            .state(gstreamer::ClockTime::from_mseconds(
                timing::BIND_TIMEOUT.as_millis() as u64,
            ));
        if result.is_err() {
            let reason = bus_error(&session.pipeline)
                .unwrap_or_else(|| format!("pipeline stuck in {:?}", state));
            session.stop();
            return Err(BackendError::InitializationFailed(reason));
        }
        if state != gstreamer::State::Playing {
            warn!(state = ?state, "Pipeline is not in PLAYING state yet");
        }

        info!(device = %device.name, "GStreamer session started");
        Ok(Arc::new(session))
    }
}

struct GStreamerSession {
    device: CameraDevice,
    pipeline: gstreamer::Pipeline,
    appsink: AppSink,
    latest: Arc<LatestFrame>,
    stopped: AtomicBool,
}

impl CameraSession for GStreamerSession {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn capture_frame(&self, timeout: Duration) -> BackendResult<CameraFrame> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(BackendError::Stopped);
        }
        if let Some(reason) = bus_error(&self.pipeline) {
            return Err(BackendError::Other(reason));
        }
        self.latest.wait_next(timeout)
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(device = %self.device.name, "Stopping GStreamer session");

        self.appsink.set_callbacks(AppSinkCallbacks::builder().build());
        self.latest.close();

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop pipeline");
        }
    }
}

impl Drop for GStreamerSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_device() -> CameraDevice {
        CameraDevice {
            name: "Test pattern".to_string(),
            path: pipeline::TEST_SOURCE_PATH.to_string(),
            rotation: SensorRotation::Rotate90,
        }
    }

    #[test]
    fn test_videotestsrc_session_delivers_requested_size() {
        if gstreamer::init().is_err()
            || gstreamer::ElementFactory::make("videotestsrc").build().is_err()
        {
            println!("Skipping test (GStreamer base plugins unavailable)");
            return;
        }

        let backend = GStreamerBackend::new();
        let preview = Arc::new(PreviewSink::default());
        let format = CameraFormat {
            width: 64,
            height: 48,
        };

        let session = match backend.open(&test_device(), &format, preview) {
            Ok(session) => session,
            Err(e) => {
                println!("Skipping test ({})", e);
                return;
            }
        };

        let frame = session.capture_frame(Duration::from_secs(5)).unwrap();
        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(frame.rotation, SensorRotation::Rotate90);
        assert_eq!(frame.to_upright_image().unwrap().dimensions(), (48, 64));

        session.stop();
        assert!(matches!(
            session.capture_frame(Duration::from_millis(10)),
            Err(BackendError::Stopped)
        ));
    }
}
