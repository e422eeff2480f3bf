use ahash::{AHashMap, AHashSet};

/// Path of an input event node, e.g. `/dev/input/event23`.
pub type DevicePath = String;

/// Digital button code in the kernel input-code namespace.
pub type ButtonCode = u16;

/// Absolute axis code in the kernel input-code namespace.
pub type AxisCode = u16;

/// Kernel input codes used by the classifier.
pub mod codes {
    use super::{AxisCode, ButtonCode};

    pub const BTN_JOYSTICK: ButtonCode = 0x120;
    pub const BTN_SOUTH: ButtonCode = 0x130;
    pub const BTN_EAST: ButtonCode = 0x131;
    pub const BTN_C: ButtonCode = 0x132;
    pub const BTN_NORTH: ButtonCode = 0x133;
    pub const BTN_WEST: ButtonCode = 0x134;
    pub const BTN_Z: ButtonCode = 0x135;
    pub const BTN_TL: ButtonCode = 0x136;
    pub const BTN_TR: ButtonCode = 0x137;
    pub const BTN_TL2: ButtonCode = 0x138;
    pub const BTN_TR2: ButtonCode = 0x139;
    pub const BTN_SELECT: ButtonCode = 0x13a;
    pub const BTN_START: ButtonCode = 0x13b;
    pub const BTN_MODE: ButtonCode = 0x13c;
    pub const BTN_THUMBL: ButtonCode = 0x13d;
    pub const BTN_THUMBR: ButtonCode = 0x13e;

    pub const ABS_X: AxisCode = 0x00;
    pub const ABS_Y: AxisCode = 0x01;
    pub const ABS_Z: AxisCode = 0x02;
    pub const ABS_RX: AxisCode = 0x03;
    pub const ABS_RY: AxisCode = 0x04;
    pub const ABS_RZ: AxisCode = 0x05;
    pub const ABS_GAS: AxisCode = 0x09;
    pub const ABS_BRAKE: AxisCode = 0x0a;

    /// Bus type reported by Bluetooth HID devices.
    pub const BUS_BLUETOOTH: u16 = 0x05;
}

/// How the controller is attached to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    Usb,
    Bluetooth,
}

impl ConnectionType {
    pub fn from_bus(bus: u16) -> Self {
        if bus == codes::BUS_BLUETOOTH {
            ConnectionType::Bluetooth
        } else {
            ConnectionType::Usb
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionType::Usb => "usb",
            ConnectionType::Bluetooth => "bluetooth",
        }
    }
}

/// Static attributes of an opened input node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,
    pub bus_type: u16,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
    /// Hardware-unique string (Bluetooth MAC, USB serial), if any.
    pub uniq: Option<String>,
}

/// Declared range of an absolute axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

/// Snapshot of the event codes an input node can emit.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub buttons: AHashSet<ButtonCode>,
    pub axes: AHashMap<AxisCode, AxisRange>,
}

impl Capabilities {
    pub fn has_button(&self, code: ButtonCode) -> bool {
        self.buttons.contains(&code)
    }

    pub fn axis(&self, code: AxisCode) -> Option<AxisRange> {
        self.axes.get(&code).copied()
    }
}

/// Stable identity of a connected gamepad. Computed once per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub path: DevicePath,
    pub name: String,
    pub unique_id: String,
    pub guid: String,
    pub port: u32,
    pub bus_type: u16,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
    pub connection: ConnectionType,
}

/// A raw input event read from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    /// Digital key; value is 1 on press, 0 on release, 2 on autorepeat.
    Key { code: ButtonCode, value: i32 },
    /// Absolute axis update.
    Axis { code: AxisCode, value: i32 },
}
