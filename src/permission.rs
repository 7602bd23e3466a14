// SPDX-License-Identifier: GPL-3.0-only

//! Camera permission gate
//!
//! Asks the XDG desktop portal for camera access over the session bus. When
//! no portal answers (plain desktop session) access follows whether the video
//! device node can be opened for reading.

use crate::constants::pipeline;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

const PORTAL_DESTINATION: &str = "org.freedesktop.portal.Desktop";
const PORTAL_PATH: &str = "/org/freedesktop/portal/desktop";
const CAMERA_INTERFACE: &str = "org.freedesktop.portal.Camera";
const REQUEST_INTERFACE: &str = "org.freedesktop.portal.Request";

/// How access was granted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRoute {
    /// The desktop portal approved the request
    Portal,
    /// A video device node is readable
    DeviceNode(PathBuf),
    /// The source is not a camera device (test pattern, still image)
    NonDevice,
    /// No device nodes exist, so there is nothing to withhold
    NoDevices,
}

/// Answer to a camera access request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraAccess {
    Granted(AccessRoute),
    Denied(String),
}

impl CameraAccess {
    pub fn is_granted(&self) -> bool {
        matches!(self, CameraAccess::Granted(_))
    }
}

enum PortalAnswer {
    Granted,
    Denied(u32),
    /// Portal reports no camera; defer to the device check
    NoCamera,
}

/// Request camera access before the camera is started
///
/// `device_path` is the configured camera (`None` for the first one);
/// `synthetic` is set when frames come from a still image instead of a camera.
pub async fn request_camera_access(device_path: Option<&str>, synthetic: bool) -> CameraAccess {
    if synthetic || device_path == Some(pipeline::TEST_SOURCE_PATH) {
        debug!("Non-device source, no permission needed");
        return CameraAccess::Granted(AccessRoute::NonDevice);
    }

    match portal_access().await {
        Ok(PortalAnswer::Granted) => {
            info!("Camera access granted by portal");
            return CameraAccess::Granted(AccessRoute::Portal);
        }
        Ok(PortalAnswer::Denied(code)) => {
            warn!(response = code, "Camera access denied by portal");
            return CameraAccess::Denied(format!("portal response {}", code));
        }
        Ok(PortalAnswer::NoCamera) => {
            debug!("Portal reports no camera, checking device nodes");
        }
        Err(e) => {
            debug!(error = %e, "Camera portal unavailable, checking device nodes");
        }
    }

    match device_path {
        Some(path) if path.starts_with("/dev/") => check_device_node(Path::new(path)),
        // PipeWire node ids go through PipeWire's own access control
        Some(_) => CameraAccess::Granted(AccessRoute::NonDevice),
        None => check_video_nodes(Path::new("/dev")),
    }
}

async fn portal_access() -> Result<PortalAnswer, String> {
    let connection = zbus::Connection::session()
        .await
        .map_err(|e| format!("Failed to connect to session D-Bus: {}", e))?;

    let camera = zbus::Proxy::new(&connection, PORTAL_DESTINATION, PORTAL_PATH, CAMERA_INTERFACE)
        .await
        .map_err(|e| format!("Failed to create camera portal proxy: {}", e))?;

    let present: bool = camera
        .get_property("IsCameraPresent")
        .await
        .map_err(|e| format!("IsCameraPresent: {}", e))?;
    if !present {
        return Ok(PortalAnswer::NoCamera);
    }

    // Subscribe to the request's Response before calling, so the answer
    // cannot arrive unobserved
    let token = format!("filter_camera_{}", uuid::Uuid::new_v4().simple());
    let sender = connection
        .unique_name()
        .ok_or("Session bus connection has no unique name")?
        .as_str()
        .trim_start_matches(':')
        .replace('.', "_");
    let request_path = format!("{}/request/{}/{}", PORTAL_PATH, sender, token);

    let request = zbus::Proxy::new(
        &connection,
        PORTAL_DESTINATION,
        request_path.as_str(),
        REQUEST_INTERFACE,
    )
    .await
    .map_err(|e| format!("Failed to create request proxy: {}", e))?;
    let mut responses = request
        .receive_signal("Response")
        .await
        .map_err(|e| format!("Failed to subscribe to portal response: {}", e))?;

    let mut options: HashMap<&str, Value> = HashMap::new();
    options.insert("handle_token", Value::new(token.as_str()));

    let handle: OwnedObjectPath = camera
        .call("AccessCamera", &(options,))
        .await
        .map_err(|e| format!("AccessCamera: {}", e))?;
    debug!(handle = %handle, "Waiting for camera portal response");

    let message = responses
        .next()
        .await
        .ok_or("Portal closed without responding")?;
    let (response, _results): (u32, HashMap<String, OwnedValue>) = message
        .body()
        .deserialize()
        .map_err(|e| format!("Malformed portal response: {}", e))?;

    Ok(match response {
        0 => PortalAnswer::Granted,
        code => PortalAnswer::Denied(code),
    })
}

/// Access to one device node
fn check_device_node(path: &Path) -> CameraAccess {
    match std::fs::File::open(path) {
        Ok(_) => CameraAccess::Granted(AccessRoute::DeviceNode(path.to_path_buf())),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Camera device not readable");
            CameraAccess::Denied(format!("{}: {}", path.display(), e))
        }
    }
}

/// Access to any `video*` node under `dev_dir`
fn check_video_nodes(dev_dir: &Path) -> CameraAccess {
    let mut nodes: Vec<PathBuf> = std::fs::read_dir(dev_dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| {
                    path.file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| name.starts_with("video"))
                })
                .collect()
        })
        .unwrap_or_default();
    nodes.sort();

    if nodes.is_empty() {
        return CameraAccess::Granted(AccessRoute::NoDevices);
    }

    let mut last_denial = String::new();
    for node in &nodes {
        match check_device_node(node) {
            CameraAccess::Denied(reason) => last_denial = reason,
            granted => return granted,
        }
    }
    CameraAccess::Denied(last_denial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_source_needs_no_permission() {
        assert_eq!(
            request_camera_access(None, true).await,
            CameraAccess::Granted(AccessRoute::NonDevice)
        );
        assert!(
            request_camera_access(Some(pipeline::TEST_SOURCE_PATH), false)
                .await
                .is_granted()
        );
    }

    #[test]
    fn test_readable_node_is_granted() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("video0");
        std::fs::write(&node, b"").unwrap();

        assert_eq!(
            check_video_nodes(dir.path()),
            CameraAccess::Granted(AccessRoute::DeviceNode(node))
        );
    }

    #[test]
    fn test_missing_node_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let access = check_device_node(&dir.path().join("video7"));
        assert!(matches!(access, CameraAccess::Denied(_)));
    }

    #[test]
    fn test_no_nodes_is_not_a_denial() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("null"), b"").unwrap();
        assert_eq!(
            check_video_nodes(dir.path()),
            CameraAccess::Granted(AccessRoute::NoDevices)
        );
    }
}
