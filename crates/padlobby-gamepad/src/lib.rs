//! Gamepad discovery for Linux input nodes: identity, classification and
//! ready-combo detection.

pub mod classify;
pub mod combo;
mod command;
mod error;
mod events;
pub mod identity;
mod manager;
mod runtime;
mod settings;
pub mod source;
pub mod types;

pub use crate::error::{Error, Result};
pub use crate::events::{DeviceEvent, EventReceiver};
pub use crate::manager::DeviceManager;
pub use crate::runtime::{
    matches_type, DefaultStartButton, Discovery, ResolveError, StartButtonResolver,
};
pub use crate::settings::{
    default_combos, ClassifierSettings, ComboChord, ComboKey, RuntimeSettings,
};
pub use crate::types::{
    codes, AxisCode, ButtonCode, ConnectionType, DeviceDescriptor, DeviceIdentity, DevicePath,
};
