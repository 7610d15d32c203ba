// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 focus control interface
//!
//! Provides functions to query and set the V4L2 camera-class controls that
//! drive lens focus: continuous autofocus, one-shot autofocus, autofocus
//! range and absolute lens position.
//!
//! Inspired by [cameractrls](https://github.com/soyersoyer/cameractrls).

use std::fs::File;
use std::os::unix::io::AsRawFd;
use super::types::{BackendError, BackendResult};
use tracing::{debug, warn};

// ===== V4L2 Control Class Bases =====
const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a0000;

const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;

// ===== V4L2 Control IDs (Camera Class) =====

/// Focus control (manual focus position, larger values are closer)
pub const V4L2_CID_FOCUS_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 10;
/// Continuous auto focus enable
pub const V4L2_CID_FOCUS_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 12;
/// Start a single auto focus sweep (button)
pub const V4L2_CID_AUTO_FOCUS_START: u32 = V4L2_CID_CAMERA_CLASS_BASE + 28;
/// Abort a running auto focus sweep (button)
pub const V4L2_CID_AUTO_FOCUS_STOP: u32 = V4L2_CID_CAMERA_CLASS_BASE + 29;
/// Auto focus distance range (menu)
pub const V4L2_CID_AUTO_FOCUS_RANGE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 31;
/// Camera mounting location (read-only menu)
pub const V4L2_CID_CAMERA_ORIENTATION: u32 = V4L2_CID_CAMERA_CLASS_BASE + 34;

// ===== V4L2 Camera Orientation Menu Values =====

pub const V4L2_CAMERA_ORIENTATION_FRONT: i32 = 0;
pub const V4L2_CAMERA_ORIENTATION_BACK: i32 = 1;
pub const V4L2_CAMERA_ORIENTATION_EXTERNAL: i32 = 2;

// ===== V4L2 Auto Focus Range Menu Values =====

/// Full focus range
pub const V4L2_AUTO_FOCUS_RANGE_AUTO: i32 = 0;
/// Normal distances, macro excluded
pub const V4L2_AUTO_FOCUS_RANGE_NORMAL: i32 = 1;
/// Close-up distances
pub const V4L2_AUTO_FOCUS_RANGE_MACRO: i32 = 2;
/// Infinity only
pub const V4L2_AUTO_FOCUS_RANGE_INFINITY: i32 = 3;

// ===== V4L2 Control Types =====
const V4L2_CTRL_TYPE_INTEGER: u32 = 1;
const V4L2_CTRL_TYPE_BOOLEAN: u32 = 2;
const V4L2_CTRL_TYPE_MENU: u32 = 3;
const V4L2_CTRL_TYPE_BUTTON: u32 = 4;
const V4L2_CTRL_TYPE_INTEGER_MENU: u32 = 9;

// ===== V4L2 Control Flags =====
const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;
const V4L2_CTRL_FLAG_INACTIVE: u32 = 0x0010;

// ===== V4L2 ioctl Numbers =====
// Calculated as: (dir << 30) | (size << 16) | ('V' << 8) | nr
// where dir: 2=READ, 1=WRITE, 3=READ|WRITE

/// Get control value (v4l2_control: 8 bytes)
const VIDIOC_G_CTRL: libc::c_ulong = 0xC008561B;
/// Set control value (v4l2_control: 8 bytes)
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008561C;
/// Query control info (v4l2_queryctrl: 68 bytes)
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC0445624;
/// Query menu item (v4l2_querymenu: 44 bytes)
const VIDIOC_QUERYMENU: libc::c_ulong = 0xC02C5625;

// ===== V4L2 ioctl Structures =====

/// V4L2 control get/set structure
#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

/// V4L2 query control structure
#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

/// V4L2 query menu structure
#[repr(C)]
#[repr(packed)]
struct V4l2Querymenu {
    id: u32,
    index: u32,
    name: [u8; 32],
    reserved: u32,
}

// ===== Public Types =====

/// Information about a V4L2 control
#[derive(Debug, Clone)]
pub struct ControlInfo {
    pub id: u32,
    pub name: String,
    pub ctrl_type: ControlType,
    pub minimum: i32,
    pub maximum: i32,
    pub step: i32,
    pub default_value: i32,
    pub flags: u32,
}

/// V4L2 control type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    Integer,
    Boolean,
    Menu,
    Button,
    IntegerMenu,
    Unknown(u32),
}

impl From<u32> for ControlType {
    fn from(value: u32) -> Self {
        match value {
            V4L2_CTRL_TYPE_INTEGER => ControlType::Integer,
            V4L2_CTRL_TYPE_BOOLEAN => ControlType::Boolean,
            V4L2_CTRL_TYPE_MENU => ControlType::Menu,
            V4L2_CTRL_TYPE_BUTTON => ControlType::Button,
            V4L2_CTRL_TYPE_INTEGER_MENU => ControlType::IntegerMenu,
            other => ControlType::Unknown(other),
        }
    }
}

impl ControlInfo {
    /// Check if control is disabled
    pub fn is_disabled(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_DISABLED != 0
    }

    /// Check if control is inactive (value cannot be changed)
    pub fn is_inactive(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_INACTIVE != 0
    }
}

/// Menu item for menu-type controls
#[derive(Debug, Clone)]
pub struct MenuItem {
    pub index: i32,
    pub name: String,
}

// ===== Helper Functions =====

/// Extract a null-terminated string from a fixed-size byte array
fn extract_name(bytes: &[u8; 32]) -> String {
    let name_len = bytes.iter().position(|&c| c == 0).unwrap_or(32);
    String::from_utf8_lossy(&bytes[..name_len]).to_string()
}

// ===== Public Functions =====

/// Query if a control exists and get its information
pub fn query_control(device_path: &str, control_id: u32) -> Option<ControlInfo> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut qctrl = V4l2Queryctrl {
        id: control_id,
        ctrl_type: 0,
        name: [0; 32],
        minimum: 0,
        maximum: 0,
        step: 0,
        default_value: 0,
        flags: 0,
        reserved: [0; 2],
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCTRL, &mut qctrl as *mut V4l2Queryctrl) };

    if result < 0 {
        return None;
    }

    Some(ControlInfo {
        id: qctrl.id,
        name: extract_name(&qctrl.name),
        ctrl_type: qctrl.ctrl_type.into(),
        minimum: qctrl.minimum,
        maximum: qctrl.maximum,
        step: qctrl.step,
        default_value: qctrl.default_value,
        flags: qctrl.flags,
    })
}

/// Get current value of a control
pub fn get_control(device_path: &str, control_id: u32) -> Option<i32> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value: 0,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_G_CTRL, &mut ctrl as *mut V4l2Control) };

    if result < 0 {
        debug!(device_path, control_id, "Failed to get V4L2 control");
        return None;
    }

    Some(ctrl.value)
}

/// Set value of a control
pub fn set_control(device_path: &str, control_id: u32, value: i32) -> BackendResult<()> {
    let file = File::open(device_path)?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_S_CTRL, &mut ctrl as *mut V4l2Control) };

    if result < 0 {
        let errno = std::io::Error::last_os_error();
        warn!(
            device_path,
            control_id,
            value,
            ?errno,
            "Failed to set V4L2 control"
        );
        return Err(BackendError::from(errno));
    }

    // Check if the driver accepted our value
    if ctrl.value != value {
        debug!(
            device_path,
            control_id,
            requested = value,
            actual = ctrl.value,
            "V4L2 control value was clamped"
        );
    }

    Ok(())
}

/// Query all menu items for a menu-type control
pub fn query_menu_items(
    device_path: &str,
    control_id: u32,
    min_index: i32,
    max_index: i32,
) -> Vec<MenuItem> {
    let file = match File::open(device_path) {
        Ok(f) => f,
        Err(_) => return Vec::new(),
    };
    let fd = file.as_raw_fd();

    let mut items = Vec::new();

    for index in min_index.max(0)..=max_index {
        let mut qmenu = V4l2Querymenu {
            id: control_id,
            index: index as u32,
            name: [0; 32],
            reserved: 0,
        };

        let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYMENU, &mut qmenu as *mut V4l2Querymenu) };

        if result >= 0 {
            items.push(MenuItem {
                index,
                name: extract_name(&qmenu.name),
            });
        }
    }

    items
}

/// Check if a control is available on the device
pub fn has_control(device_path: &str, control_id: u32) -> bool {
    query_control(device_path, control_id)
        .map(|info| !info.is_disabled())
        .unwrap_or(false)
}


/// Focus-related controls a device exposes
#[derive(Debug, Clone, Default)]
pub struct FocusCapabilities {
    /// `V4L2_CID_FOCUS_AUTO` is available
    pub continuous: bool,
    /// `V4L2_CID_AUTO_FOCUS_START` is available
    pub one_shot: bool,
    /// Supported `V4L2_CID_AUTO_FOCUS_RANGE` menu values
    pub ranges: Vec<i32>,
    /// `V4L2_CID_FOCUS_ABSOLUTE` range, when manual focus is available
    pub absolute: Option<ControlInfo>,
}

impl FocusCapabilities {
    /// Whether the device can focus at all
    pub fn any(&self) -> bool {
        self.continuous || self.one_shot || self.absolute.is_some()
    }
}

/// Probe the focus controls of a device
pub fn probe_focus(device_path: &str) -> FocusCapabilities {
    let ranges = match query_control(device_path, V4L2_CID_AUTO_FOCUS_RANGE) {
        Some(info) if !info.is_disabled() && info.ctrl_type == ControlType::Menu => {
            query_menu_items(device_path, info.id, info.minimum, info.maximum)
                .into_iter()
                .map(|item| item.index)
                .collect()
        }
        _ => Vec::new(),
    };

    let caps = FocusCapabilities {
        continuous: has_control(device_path, V4L2_CID_FOCUS_AUTO),
        one_shot: has_control(device_path, V4L2_CID_AUTO_FOCUS_START),
        ranges,
        absolute: query_control(device_path, V4L2_CID_FOCUS_ABSOLUTE)
            .filter(|info| !info.is_disabled()),
    };

    debug!(
        device_path,
        continuous = caps.continuous,
        one_shot = caps.one_shot,
        ranges = ?caps.ranges,
        absolute = caps.absolute.is_some(),
        "Probed V4L2 focus controls"
    );

    caps
}
