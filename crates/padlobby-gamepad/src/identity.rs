use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::types::{ConnectionType, DeviceDescriptor, DeviceIdentity};

/// Default location of the kernel input class in sysfs.
pub const SYS_CLASS_INPUT: &str = "/sys/class/input";

/// Computes the legacy joystick GUID for a device.
///
/// Bus, vendor, product and version are each written as a little-endian
/// `u16` followed by a zero `u16`, and the 16 resulting bytes are
/// hex-encoded in lowercase.
pub fn legacy_guid(bus: u16, vendor: u16, product: u16, version: u16) -> String {
    let mut guid = String::with_capacity(32);
    for field in [bus, vendor, product, version] {
        for byte in field.to_le_bytes().into_iter().chain([0, 0]) {
            let _ = write!(guid, "{byte:02x}");
        }
    }
    guid
}

/// Computes an identifier that survives reconnects.
///
/// Prefers the trimmed hardware-unique string; otherwise falls back to
/// `vendor:product:name` with ids as 4-digit lowercase hex.
pub fn unique_id(uniq: Option<&str>, vendor: u16, product: u16, name: &str) -> String {
    match uniq.map(str::trim) {
        Some(uniq) if !uniq.is_empty() => uniq.to_string(),
        _ => format!("{vendor:04x}:{product:04x}:{name}"),
    }
}

/// Resolves the joystick slot index for an event node.
///
/// Looks for a `jsN` entry under `sysfs_root` whose parent device resolves to
/// the same path as the event node's parent and returns `N`. Falls back to the
/// event node number, then to 0.
pub fn resolve_port(sysfs_root: &Path, event_path: &str) -> u32 {
    let event_name = Path::new(event_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(event_path);

    if let Some(port) = joystick_index(sysfs_root, event_name) {
        return port;
    }
    trailing_number(event_name).unwrap_or(0)
}

fn joystick_index(sysfs_root: &Path, event_name: &str) -> Option<u32> {
    let event_parent = fs::canonicalize(sysfs_root.join(event_name).join("device")).ok()?;
    let entries = fs::read_dir(sysfs_root).ok()?;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(index) = name.strip_prefix("js") else {
            continue;
        };
        let Ok(index) = index.parse::<u32>() else {
            continue;
        };
        let Ok(parent) = fs::canonicalize(entry.path().join("device")) else {
            continue;
        };
        if parent == event_parent {
            return Some(index);
        }
    }
    None
}

fn trailing_number(name: &str) -> Option<u32> {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    name[name.len() - digits..].parse().ok()
}

/// Builds the full identity of a gamepad node.
pub fn identify(path: &str, descriptor: &DeviceDescriptor, port: u32) -> DeviceIdentity {
    DeviceIdentity {
        path: path.to_string(),
        name: descriptor.name.clone(),
        unique_id: unique_id(
            descriptor.uniq.as_deref(),
            descriptor.vendor_id,
            descriptor.product_id,
            &descriptor.name,
        ),
        guid: legacy_guid(
            descriptor.bus_type,
            descriptor.vendor_id,
            descriptor.product_id,
            descriptor.version,
        ),
        port,
        bus_type: descriptor.bus_type,
        vendor_id: descriptor.vendor_id,
        product_id: descriptor.product_id,
        version: descriptor.version,
        connection: ConnectionType::from_bus(descriptor.bus_type),
    }
}
