// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application identifier used for config, cache and log paths
pub const APP_NAME: &str = "filter-camera";

/// Storage constants
pub mod storage {
    /// JPEG quality used for saved pictures (0-100)
    pub const JPEG_QUALITY: u8 = 95;

    /// MIME type recorded for saved pictures
    pub const MIME_TYPE: &str = "image/jpeg";

    /// File extension matching `MIME_TYPE`
    pub const EXTENSION: &str = "jpg";

    /// Relative path of the album inside the user's home
    pub const RELATIVE_PATH: &str = "Pictures/FilterCamera";

    /// Display-name format: capture time with millisecond resolution
    pub const DISPLAY_NAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%3f";

    /// How many suffixed names are tried when a display name is taken
    pub const MAX_NAME_COLLISIONS: u32 = 16;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Delay between clearing state and restarting the camera on reset
    pub const RESET_DELAY: Duration = Duration::from_millis(100);

    /// How long a still capture waits for a fresh frame
    pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(3);

    /// How long binding waits for the first preview frame
    pub const BIND_TIMEOUT: Duration = Duration::from_secs(5);

    /// UI event poll interval (~60 Hz)
    pub const UI_POLL_INTERVAL: Duration = Duration::from_millis(16);

    /// How long a notice stays in the status bar
    pub const NOTICE_DURATION: Duration = Duration::from_secs(2);

    /// Frame interval of the synthetic still-image source
    pub const SYNTHETIC_FRAME_INTERVAL: Duration = Duration::from_millis(66);
}

/// Camera pipeline constants
pub mod pipeline {
    /// Default capture resolution
    pub const DEFAULT_WIDTH: u32 = 1280;
    pub const DEFAULT_HEIGHT: u32 = 720;

    /// Appsink buffering (drop oldest when full)
    pub const MAX_BUFFERS: u32 = 2;

    /// Depth of the preview surface channel
    pub const PREVIEW_CHANNEL_DEPTH: usize = 4;

    /// Device path selecting GStreamer's `videotestsrc`
    pub const TEST_SOURCE_PATH: &str = "test";
}

/// GPU compute constants
pub mod gpu {
    /// Threads per workgroup dimension in the filter shader
    pub const WORKGROUP_SIZE: u32 = 16;
}
