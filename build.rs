// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=FILTER_CAMERA_VERSION");

    // Packagers without a git checkout set the version explicitly
    let version = std::env::var("FILTER_CAMERA_VERSION")
        .ok()
        .or_else(git_describe)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `0.1.0-3-gabc1234` style description of HEAD, without the `v` tag prefix
fn git_describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty", "--match", "v*"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if described.is_empty() {
        return None;
    }

    // A bare commit hash means no release tag yet
    if !described.starts_with('v') {
        return Some(format!("{}-{}", env!("CARGO_PKG_VERSION"), described));
    }
    Some(described.trim_start_matches('v').to_string())
}
