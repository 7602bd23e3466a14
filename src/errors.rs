// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the filter camera

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// Filter rendering errors
    Filter(FilterError),
    /// Picture storage errors
    Storage(StorageError),
    /// Camera access was refused
    PermissionDenied,
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Camera controller errors
#[derive(Debug, Clone)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// Acquiring or binding the camera session failed
    BindFailed(String),
    /// Operation requires a bound (previewing) camera
    NotBound,
    /// A still capture is already in flight
    CaptureInProgress,
    /// Still capture failed
    CaptureFailed(String),
    /// The controller has been released
    Released,
}

/// Filter applier errors
#[derive(Debug, Clone)]
pub enum FilterError {
    /// `apply` was called before `setup`
    NotInitialized,
    /// No GPU adapter or device could be created
    GpuUnavailable(String),
    /// Rendering on the GPU failed
    RenderFailed(String),
    /// Input image has unusable dimensions
    InvalidImage(String),
}

/// Picture storage errors
#[derive(Debug, Clone)]
pub enum StorageError {
    /// The media record could not be created
    InsertFailed(String),
    /// The output stream for a record could not be opened
    OpenFailed(String),
    /// JPEG encoding or writing failed
    EncodeFailed(String),
    /// Background task failure
    TaskFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Filter(e) => write!(f, "Filter error: {}", e),
            AppError::Storage(e) => write!(f, "Storage error: {}", e),
            AppError::PermissionDenied => write!(f, "Camera permission denied"),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No camera devices found"),
            CameraError::BindFailed(msg) => write!(f, "Use case binding failed: {}", msg),
            CameraError::NotBound => write!(f, "Camera is not bound"),
            CameraError::CaptureInProgress => write!(f, "A capture is already in progress"),
            CameraError::CaptureFailed(msg) => write!(f, "Photo capture failed: {}", msg),
            CameraError::Released => write!(f, "Camera has been released"),
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::NotInitialized => write!(f, "Filter applier used before setup"),
            FilterError::GpuUnavailable(msg) => write!(f, "GPU unavailable: {}", msg),
            FilterError::RenderFailed(msg) => write!(f, "Render failed: {}", msg),
            FilterError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InsertFailed(msg) => write!(f, "Failed to create media record: {}", msg),
            StorageError::OpenFailed(msg) => write!(f, "Failed to open output stream: {}", msg),
            StorageError::EncodeFailed(msg) => write!(f, "Failed to save bitmap: {}", msg),
            StorageError::TaskFailed(msg) => write!(f, "Save task error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for FilterError {}
impl std::error::Error for StorageError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        AppError::Filter(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::EncodeFailed(err.to_string())
    }
}

impl From<image::ImageError> for StorageError {
    fn from(err: image::ImageError) -> Self {
        StorageError::EncodeFailed(err.to_string())
    }
}
