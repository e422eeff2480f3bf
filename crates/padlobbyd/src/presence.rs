//! Connected and ready controller collections.
//!
//! A device path lives in at most one of the two collections. Ready records
//! carry a slot index handed out in promotion order; removing a ready record
//! leaves a gap instead of renumbering the others.

use std::sync::Arc;

use ahash::AHashMap;
use padlobby_gamepad::{ConnectionType, DeviceIdentity, DevicePath};
use padlobby_workspace::{Profile, ProfileStore, DEFAULT_IMAGE, DEFAULT_SOUND};
use smallvec::SmallVec;
use thiserror::Error;

use crate::print_warning;

const NINTENDO_VENDOR_ID: u16 = 0x057e;
const JOYCON_L_PRODUCT_ID: u16 = 0x2006;
const JOYCON_R_PRODUCT_ID: u16 = 0x2007;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresenceError {
    #[error("device {0} is already tracked")]
    AlreadyTracked(DevicePath),
    #[error("device {0} is not connected")]
    NotConnected(DevicePath),
    #[error("device {0} is already ready")]
    AlreadyReady(DevicePath),
    #[error("unknown device {0}")]
    UnknownDevice(String),
}

pub type Result<T> = std::result::Result<T, PresenceError>;

/// A detected controller with its profile applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedRecord {
    /// Id the controller is tracked under. Equal to the identity's unique id
    /// unless another tracked device already uses it.
    pub unique_id: String,
    /// Id the profile is stored under.
    pub profile_id: String,
    pub identity: DeviceIdentity,
    pub name: String,
    pub image: String,
    pub sound: String,
    pub guid: String,
    pub battery: Option<u8>,
}

impl ConnectedRecord {
    pub fn path(&self) -> &str {
        &self.identity.path
    }

    pub fn connection(&self) -> ConnectionType {
        self.identity.connection
    }

    fn apply_profile(&mut self, profile: &Profile) {
        self.name = profile.display_name().to_string();
        self.image.clone_from(&profile.image);
        self.sound.clone_from(&profile.sound);
        self.guid = profile
            .guid_override
            .clone()
            .unwrap_or_else(|| self.identity.guid.clone());
    }
}

/// Display data for one half of a combined controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub unique_id: String,
    pub name: String,
    pub image: String,
    pub sound: String,
}

pub type Components = SmallVec<[Component; 2]>;

/// A promoted controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyRecord {
    pub record: ConnectedRecord,
    pub slot_index: usize,
    /// Left and right halves when the controller is a combined pair.
    pub components: Components,
}

impl ReadyRecord {
    pub fn unique_id(&self) -> &str {
        &self.record.unique_id
    }
}

/// Copy of both collections at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub connected: Vec<ConnectedRecord>,
    pub ready: Vec<ReadyRecord>,
}

/// Owner of the connected and ready collections.
pub struct Presence {
    store: Arc<dyn ProfileStore>,
    /// In connection order.
    connected: Vec<ConnectedRecord>,
    /// In slot order.
    ready: Vec<ReadyRecord>,
    paths: AHashMap<String, DevicePath>,
}

impl Presence {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            connected: Vec::new(),
            ready: Vec::new(),
            paths: AHashMap::new(),
        }
    }

    fn is_tracked(&self, path: &str) -> bool {
        self.connected.iter().any(|r| r.path() == path)
            || self.ready.iter().any(|r| r.record.path() == path)
    }

    fn free_unique_id(&self, base: &str) -> String {
        if !self.paths.contains_key(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}#{n}"))
            .find(|id| !self.paths.contains_key(id))
            .unwrap_or_else(|| base.to_string())
    }

    /// Tracks a freshly identified controller.
    pub fn add_connected(&mut self, identity: &DeviceIdentity) -> Result<ConnectedRecord> {
        if self.is_tracked(&identity.path) {
            return Err(PresenceError::AlreadyTracked(identity.path.clone()));
        }

        let profile_id = identity.unique_id.clone();
        let profile = self
            .store
            .resolve_profile(&profile_id, &identity.name, identity.vendor_id, identity.product_id)
            .unwrap_or_else(|e| {
                print_warning!("profile lookup for {profile_id} failed, using defaults: {e}");
                Profile::fallback(&profile_id, &identity.name, identity.vendor_id, identity.product_id)
            });

        let unique_id = self.free_unique_id(&profile_id);
        let mut record = ConnectedRecord {
            unique_id: unique_id.clone(),
            profile_id,
            identity: identity.clone(),
            name: String::new(),
            image: String::new(),
            sound: String::new(),
            guid: String::new(),
            battery: None,
        };
        record.apply_profile(&profile);

        self.paths.insert(unique_id, identity.path.clone());
        self.connected.push(record.clone());
        Ok(record)
    }

    /// Forgets a device. Returns whether it was ready.
    pub fn remove_connected(&mut self, path: &str) -> Result<bool> {
        let (unique_id, was_ready) =
            if let Some(i) = self.ready.iter().position(|r| r.record.path() == path) {
                (self.ready.remove(i).record.unique_id, true)
            } else if let Some(i) = self.connected.iter().position(|r| r.path() == path) {
                (self.connected.remove(i).unique_id, false)
            } else {
                return Err(PresenceError::UnknownDevice(path.to_string()));
            };
        self.paths.remove(&unique_id);
        Ok(was_ready)
    }

    /// Promotes a connected controller into the next free slot.
    pub fn move_to_ready(&mut self, path: &str) -> Result<ReadyRecord> {
        if self.ready.iter().any(|r| r.record.path() == path) {
            return Err(PresenceError::AlreadyReady(path.to_string()));
        }
        let Some(i) = self.connected.iter().position(|r| r.path() == path) else {
            return Err(PresenceError::NotConnected(path.to_string()));
        };

        let record = self.connected.remove(i);
        let slot_index = self
            .ready
            .iter()
            .map(|r| r.slot_index + 1)
            .max()
            .unwrap_or(0);
        let components = if is_combined_joycon(&record.identity.name, record.identity.product_id) {
            self.joycon_components(&record.unique_id)
        } else {
            Components::new()
        };

        let ready = ReadyRecord {
            record,
            slot_index,
            components,
        };
        self.ready.push(ready.clone());
        Ok(ready)
    }

    fn joycon_components(&self, unique_id: &str) -> Components {
        [
            ("L", JOYCON_L_PRODUCT_ID, "Joy-Con (L)"),
            ("R", JOYCON_R_PRODUCT_ID, "Joy-Con (R)"),
        ]
        .into_iter()
        .map(|(side, product_id, fallback_name)| {
            let unique_id = format!("{unique_id}_{side}");
            if let Some(live) = self.live_record(NINTENDO_VENDOR_ID, product_id) {
                return Component {
                    unique_id,
                    name: live.name.clone(),
                    image: live.image.clone(),
                    sound: live.sound.clone(),
                };
            }
            match self
                .store
                .lookup_type_default(fallback_name, NINTENDO_VENDOR_ID, product_id)
            {
                Ok(Some(type_default)) => Component {
                    unique_id,
                    name: type_default.name,
                    image: type_default.image,
                    sound: type_default.sound,
                },
                Ok(None) => Component {
                    unique_id,
                    name: fallback_name.to_string(),
                    image: DEFAULT_IMAGE.to_string(),
                    sound: DEFAULT_SOUND.to_string(),
                },
                Err(e) => {
                    print_warning!("type default lookup for {fallback_name} failed: {e}");
                    Component {
                        unique_id,
                        name: fallback_name.to_string(),
                        image: DEFAULT_IMAGE.to_string(),
                        sound: DEFAULT_SOUND.to_string(),
                    }
                }
            }
        })
        .collect()
    }

    fn live_record(&self, vendor_id: u16, product_id: u16) -> Option<&ConnectedRecord> {
        let same = |r: &&ConnectedRecord| {
            r.identity.vendor_id == vendor_id && r.identity.product_id == product_id
        };
        self.connected
            .iter()
            .find(same)
            .or_else(|| self.ready.iter().map(|r| &r.record).find(same))
    }

    /// Moves every ready controller back to connected, in slot order.
    pub fn clear_ready(&mut self) -> Vec<ConnectedRecord> {
        let moved: Vec<ConnectedRecord> = self.ready.drain(..).map(|r| r.record).collect();
        self.connected.extend(moved.iter().cloned());
        moved
    }

    /// Stores a battery reading. Returns false when the id is not tracked.
    pub fn update_battery(&mut self, unique_id: &str, percent: u8) -> bool {
        match self.record_mut(unique_id) {
            Some(record) => {
                record.battery = Some(percent);
                true
            }
            None => false,
        }
    }

    /// Applies an edited profile to every record stored under
    /// `profile_id`. Returns the ids of the updated records.
    pub fn refresh_profile(&mut self, profile_id: &str, profile: &Profile) -> Vec<String> {
        let mut updated = Vec::new();
        let records = self
            .connected
            .iter_mut()
            .chain(self.ready.iter_mut().map(|r| &mut r.record));
        for record in records.filter(|r| r.profile_id == profile_id) {
            record.apply_profile(profile);
            updated.push(record.unique_id.clone());
        }
        updated
    }

    fn record_mut(&mut self, unique_id: &str) -> Option<&mut ConnectedRecord> {
        let path = self.paths.get(unique_id)?;
        if let Some(record) = self.connected.iter_mut().find(|r| r.path() == path) {
            return Some(record);
        }
        self.ready
            .iter_mut()
            .map(|r| &mut r.record)
            .find(|r| r.path() == path)
    }

    /// The record tracked under `unique_id`, whichever collection holds it.
    pub fn record(&self, unique_id: &str) -> Option<ConnectedRecord> {
        let path = self.paths.get(unique_id)?;
        self.connected
            .iter()
            .find(|r| r.path() == path)
            .or_else(|| self.ready.iter().map(|r| &r.record).find(|r| r.path() == path))
            .cloned()
    }

    pub fn connected(&self) -> Vec<ConnectedRecord> {
        self.connected.clone()
    }

    pub fn ready(&self) -> Vec<ReadyRecord> {
        self.ready.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            connected: self.connected(),
            ready: self.ready(),
        }
    }

    pub fn unique_id_for_path(&self, path: &str) -> Option<String> {
        self.connected
            .iter()
            .find(|r| r.path() == path)
            .or_else(|| self.ready.iter().map(|r| &r.record).find(|r| r.path() == path))
            .map(|r| r.unique_id.clone())
    }

    pub fn path_for_unique_id(&self, unique_id: &str) -> Option<DevicePath> {
        self.paths.get(unique_id).cloned()
    }
}

/// A single device made of both Joy-Con halves. Standalone halves are told
/// apart by product id or by an explicit side suffix in the name.
pub fn is_combined_joycon(name: &str, product_id: u16) -> bool {
    let name = name.to_lowercase();
    name.contains("joy-con")
        && product_id != JOYCON_L_PRODUCT_ID
        && product_id != JOYCON_R_PRODUCT_ID
        && !name.ends_with("(l)")
        && !name.ends_with("(r)")
}
