// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CAMERA_SCANNER_VERSION");

    // Packaged builds set the version explicitly
    let version = if let Ok(v) = std::env::var("CAMERA_SCANNER_VERSION") {
        v
    } else {
        let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".into());
        match get_commit_hash() {
            Some(hash) => format!("{}-{}", pkg_version, hash),
            None => pkg_version,
        }
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn get_commit_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
