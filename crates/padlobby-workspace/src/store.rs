use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::AHashMap;
use log::debug;
use padlobby_gamepad::{ButtonCode, ResolveError, StartButtonResolver};
use thiserror::Error;

use crate::profile::{is_valid_guid, name_contains, Profile, ProfileUpdate, TypeDefault};
use crate::seed::seed_type_defaults;
use crate::WorkspaceConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile store lock poisoned")]
    Poisoned,
    #[error("invalid guid override: {0}")]
    InvalidGuid(String),
}

/// Source of per-device display data and per-type defaults.
pub trait ProfileStore: Send + Sync {
    /// Returns the profile for `unique_id`, creating it from the matching type
    /// default on first sight.
    fn resolve_profile(
        &self,
        unique_id: &str,
        default_name: &str,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Profile, StoreError>;

    /// Finds the type default by vendor/product, then by name pattern.
    fn lookup_type_default(
        &self,
        name: &str,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Option<TypeDefault>, StoreError>;

    /// Start button for a device: the latest matching override, then the type
    /// default. `None` means the generic start button.
    fn start_button_for(
        &self,
        name: &str,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Option<ButtonCode>, StoreError>;

    /// Stores a start button override for a controller type. A zero vendor
    /// and product id selects devices by name substring instead.
    fn set_start_button(
        &self,
        vendor_id: u16,
        product_id: u16,
        name: &str,
        code: ButtonCode,
    ) -> Result<(), StoreError>;

    /// Edits a stored profile. Returns `None` when the id is unknown.
    fn update_profile(
        &self,
        unique_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, StoreError>;

    fn profile(&self, unique_id: &str) -> Result<Option<Profile>, StoreError>;
}

/// Exposes a profile store's start button overrides to the discovery runtime.
pub struct StartButtonLookup(pub Arc<dyn ProfileStore>);

impl StartButtonResolver for StartButtonLookup {
    fn start_button(
        &self,
        name: &str,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Option<ButtonCode>, ResolveError> {
        Ok(self.0.start_button_for(name, vendor_id, product_id)?)
    }
}

#[derive(Debug, Clone, Copy)]
struct StartOverride {
    vendor_id: u16,
    product_id: u16,
    code: ButtonCode,
}

impl StartOverride {
    fn has_ids(self) -> bool {
        self.vendor_id != 0 || self.product_id != 0
    }

    /// Overrides with the same key replace each other.
    fn same_key(self, name: &str, other: StartOverride, other_name: &str) -> bool {
        (self.vendor_id, self.product_id) == (other.vendor_id, other.product_id)
            && (self.has_ids() || name.eq_ignore_ascii_case(other_name))
    }
}

#[derive(Debug)]
struct State {
    type_defaults: Vec<TypeDefault>,
    // Replayed on reload so file edits do not drop them.
    start_overrides: Vec<(StartOverride, String)>,
    profiles: AHashMap<String, Profile>,
    edits: AHashMap<String, ProfileUpdate>,
}

impl State {
    fn effective(&self, base: &Profile) -> Profile {
        let mut profile = base.clone();
        if let Some(edit) = self.edits.get(&base.unique_id) {
            profile.apply(edit);
        }
        profile
    }

    fn lookup(&self, name: &str, vendor_id: u16, product_id: u16) -> Option<&TypeDefault> {
        self.type_defaults
            .iter()
            .find(|t| t.ids == Some((vendor_id, product_id)))
            .or_else(|| {
                self.type_defaults
                    .iter()
                    .find(|t| t.ids.is_none() && t.matches_name(name))
            })
    }

    fn start_button_for(&self, name: &str, vendor_id: u16, product_id: u16) -> Option<ButtonCode> {
        self.start_overrides
            .iter()
            .rev()
            .find(|(o, _)| o.has_ids() && (o.vendor_id, o.product_id) == (vendor_id, product_id))
            .or_else(|| {
                self.start_overrides
                    .iter()
                    .rev()
                    .find(|(o, pattern)| !o.has_ids() && name_contains(name, pattern))
            })
            .map(|(o, _)| o.code)
            .or_else(|| self.lookup(name, vendor_id, product_id).and_then(|t| t.start_button))
    }

    /// Writes the override into the type defaults it covers. A name-only
    /// override covers every name-only entry whose name contains it.
    fn apply_start_override(&mut self, o: StartOverride, name: &str) {
        let mut covered = false;
        for t in &mut self.type_defaults {
            let same_type = if o.has_ids() {
                t.ids == Some((o.vendor_id, o.product_id))
            } else {
                t.ids.is_none() && name_contains(&t.name, name)
            };
            if same_type {
                t.start_button = Some(o.code);
                covered = true;
            }
        }
        if !covered {
            self.type_defaults.push(TypeDefault {
                name: name.to_string(),
                image: crate::DEFAULT_IMAGE.to_string(),
                sound: crate::DEFAULT_SOUND.to_string(),
                ids: o.has_ids().then_some((o.vendor_id, o.product_id)),
                guid_override: None,
                start_button: Some(o.code),
            });
        }
    }

    fn record_start_override(&mut self, o: StartOverride, name: &str) {
        self.start_overrides
            .retain(|(other, other_name)| !o.same_key(name, *other, other_name));
        self.start_overrides.push((o, name.to_string()));
    }
}

/// In-memory profile store seeded with the built-in type defaults.
#[derive(Debug)]
pub struct MemoryProfileStore {
    state: RwLock<State>,
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                type_defaults: seed_type_defaults(),
                start_overrides: Vec::new(),
                profiles: AHashMap::new(),
                edits: AHashMap::new(),
            }),
        }
    }

    pub fn with_config(config: &WorkspaceConfig) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.write() {
            state.type_defaults.extend(config.type_defaults.iter().cloned());
            state.edits.clone_from(&config.profiles);
        }
        store
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }

    /// Replaces file-provided type defaults and edits. Returns the profiles
    /// whose effective values changed.
    pub fn apply_config(&self, config: &WorkspaceConfig) -> Result<Vec<Profile>, StoreError> {
        let mut state = self.write()?;
        let before: AHashMap<String, Profile> = state
            .profiles
            .values()
            .map(|p| (p.unique_id.clone(), state.effective(p)))
            .collect();

        let mut type_defaults = seed_type_defaults();
        type_defaults.extend(config.type_defaults.iter().cloned());
        state.type_defaults = type_defaults;
        for (o, name) in state.start_overrides.clone() {
            state.apply_start_override(o, &name);
        }
        state.edits.clone_from(&config.profiles);

        let mut changed: Vec<Profile> = state
            .profiles
            .values()
            .map(|p| state.effective(p))
            .filter(|p| before.get(&p.unique_id) != Some(p))
            .collect();
        changed.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        debug!("Profile store reloaded, {} profiles changed", changed.len());
        Ok(changed)
    }

    /// Every stored profile, ordered by unique id.
    pub fn profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let state = self.read()?;
        let mut profiles: Vec<Profile> = state.profiles.values().map(|p| state.effective(p)).collect();
        profiles.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        Ok(profiles)
    }
}

impl ProfileStore for MemoryProfileStore {
    fn resolve_profile(
        &self,
        unique_id: &str,
        default_name: &str,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Profile, StoreError> {
        let mut state = self.write()?;
        if let Some(existing) = state.profiles.get_mut(unique_id) {
            existing.vendor_id = vendor_id;
            existing.product_id = product_id;
        } else {
            let profile = Profile::seeded(
                unique_id,
                default_name,
                vendor_id,
                product_id,
                state.lookup(default_name, vendor_id, product_id),
            );
            debug!("Created profile {unique_id} for {default_name}");
            state.profiles.insert(unique_id.to_string(), profile);
        }
        let base = &state.profiles[unique_id];
        Ok(state.effective(base))
    }

    fn lookup_type_default(
        &self,
        name: &str,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Option<TypeDefault>, StoreError> {
        Ok(self.read()?.lookup(name, vendor_id, product_id).cloned())
    }

    fn start_button_for(
        &self,
        name: &str,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Option<ButtonCode>, StoreError> {
        Ok(self.read()?.start_button_for(name, vendor_id, product_id))
    }

    fn set_start_button(
        &self,
        vendor_id: u16,
        product_id: u16,
        name: &str,
        code: ButtonCode,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let o = StartOverride {
            vendor_id,
            product_id,
            code,
        };
        state.apply_start_override(o, name);
        state.record_start_override(o, name);
        Ok(())
    }

    fn update_profile(
        &self,
        unique_id: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>, StoreError> {
        if let Some(guid) = update.guid_override.as_deref().filter(|g| !g.is_empty()) {
            if !is_valid_guid(guid) {
                return Err(StoreError::InvalidGuid(guid.to_string()));
            }
        }
        let mut state = self.write()?;
        let Some(base) = state.profiles.get_mut(unique_id) else {
            return Ok(None);
        };
        base.apply(update);
        let base = base.clone();
        Ok(Some(state.effective(&base)))
    }

    fn profile(&self, unique_id: &str) -> Result<Option<Profile>, StoreError> {
        let state = self.read()?;
        Ok(state.profiles.get(unique_id).map(|p| state.effective(p)))
    }
}
