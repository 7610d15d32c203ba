// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for capture devices
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                Scanner Layer                 │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │    V4L2     │    │  Virtual camera  │   │
//! │  │ (Linux only)│    │  (image files)   │   │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Capability traits, shared types and the V4L2 backend
//! - [`virtual_camera`]: Still images served as a camera

pub mod camera;
pub mod virtual_camera;
