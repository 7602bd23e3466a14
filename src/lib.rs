// SPDX-License-Identifier: GPL-3.0-only

//! Filter Camera - a terminal camera with photo filters
//!
//! Shows a live camera preview, captures stills, renders one of a fixed set of
//! filters over the capture and saves the result into the picture directory.
//!
//! # Architecture
//!
//! - [`camera`]: camera backends (GStreamer, synthetic) and the controller
//! - [`filters`]: filter catalog, wgpu compute renderer and CPU renderer
//! - [`gpu`]: wgpu device creation and readback helpers
//! - [`storage`]: JPEG persistence into the picture album
//! - [`permission`]: camera access through the desktop portal
//! - [`presenter`]: observable state and operation sequencing
//! - [`ui`]: ratatui screens
//! - [`config`]: user configuration handling

pub mod camera;
pub mod config;
pub mod constants;
pub mod errors;
pub mod filters;
pub mod gpu;
pub mod permission;
pub mod presenter;
pub mod storage;
pub mod ui;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use filters::FilterType;
pub use presenter::{CameraPresenter, Notice, Phase, ViewState};
