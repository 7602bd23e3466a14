// SPDX-License-Identifier: GPL-3.0-only

//! Observable presenter state

use crate::filters::{FilterType, RenderBackend};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;

/// Which screen the UI should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Camera not running (startup, reset, permission denied, bind failure)
    #[default]
    Idle,
    /// Live preview
    Previewing,
    /// Shutter pressed, waiting for the still
    Capturing,
    /// Showing the captured photo with the filter strip
    Reviewing,
}

/// One-shot message for the status bar
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Saved(PathBuf),
    PermissionDenied,
    CameraUnavailable(String),
    CaptureFailed(String),
    FilterFailed(String),
    SaveFailed(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::Saved(_) => "Photo saved".to_string(),
            Notice::PermissionDenied => "Camera permission denied".to_string(),
            Notice::CameraUnavailable(e) => format!("Camera unavailable: {}", e),
            Notice::CaptureFailed(e) => format!("Capture failed: {}", e),
            Notice::FilterFailed(e) => format!("Filter failed: {}", e),
            Notice::SaveFailed(e) => format!("Save failed: {}", e),
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Notice::Saved(_))
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Snapshot published to the UI
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub phase: Phase,
    /// Unfiltered capture, kept until the next capture or reset
    pub original: Option<Arc<RgbaImage>>,
    /// The original, or the selected filter rendered over it
    pub displayed: Option<Arc<RgbaImage>>,
    pub selected_filter: FilterType,
    pub notice: Option<Notice>,
    /// Bumped with every notice so repeated notices are still noticed
    pub notice_id: u64,
    pub camera_name: Option<String>,
    pub render_backend: Option<RenderBackend>,
}

impl ViewState {
    pub fn has_photo(&self) -> bool {
        self.original.is_some()
    }
}
