use padlobby_gamepad::ButtonCode;

/// Image used when neither the profile nor a type default names one.
pub const DEFAULT_IMAGE: &str = "default.png";
/// Sound used when neither the profile nor a type default names one.
pub const DEFAULT_SOUND: &str = "default.mp3";

/// Display defaults shared by every controller of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefault {
    /// Display name; for entries without ids also the case-insensitive
    /// substring matched against device names.
    pub name: String,
    pub image: String,
    pub sound: String,
    /// Vendor and product id. `None` for name-only entries.
    pub ids: Option<(u16, u16)>,
    /// GUID to report instead of the computed one.
    pub guid_override: Option<String>,
    /// Start button code when it is not the generic one.
    pub start_button: Option<ButtonCode>,
}

impl TypeDefault {
    /// True when this entry describes the device.
    pub fn matches(&self, name: &str, vendor_id: u16, product_id: u16) -> bool {
        match self.ids {
            Some(ids) => ids == (vendor_id, product_id),
            None => self.matches_name(name),
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        name_contains(name, &self.name)
    }
}

/// Case-insensitive substring test used for name-only device types. An empty
/// pattern matches nothing.
pub(crate) fn name_contains(name: &str, pattern: &str) -> bool {
    !pattern.is_empty() && name.to_lowercase().contains(&pattern.to_lowercase())
}

/// Per-device display settings, keyed by unique id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub unique_id: String,
    /// Name reported by the device.
    pub default_name: String,
    /// Name chosen by the user.
    pub custom_name: Option<String>,
    pub image: String,
    pub sound: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub guid_override: Option<String>,
}

impl Profile {
    /// Builds a fresh profile seeded from the matching type default.
    pub fn seeded(
        unique_id: &str,
        default_name: &str,
        vendor_id: u16,
        product_id: u16,
        type_default: Option<&TypeDefault>,
    ) -> Self {
        Self {
            unique_id: unique_id.to_string(),
            default_name: default_name.to_string(),
            custom_name: None,
            image: type_default.map_or(DEFAULT_IMAGE, |t| t.image.as_str()).to_string(),
            sound: type_default.map_or(DEFAULT_SOUND, |t| t.sound.as_str()).to_string(),
            vendor_id,
            product_id,
            guid_override: type_default.and_then(|t| t.guid_override.clone()),
        }
    }

    /// Built-in defaults used when the store cannot be reached.
    pub fn fallback(unique_id: &str, default_name: &str, vendor_id: u16, product_id: u16) -> Self {
        Self::seeded(unique_id, default_name, vendor_id, product_id, None)
    }

    /// The custom name when set, otherwise the device name.
    pub fn display_name(&self) -> &str {
        self.custom_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.default_name)
    }

    /// Applies an edit in place.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(name) = &update.custom_name {
            self.custom_name = Some(name.clone()).filter(|n| !n.is_empty());
        }
        if let Some(image) = &update.image {
            self.image.clone_from(image);
        }
        if let Some(sound) = &update.sound {
            self.sound.clone_from(sound);
        }
        if let Some(guid) = &update.guid_override {
            self.guid_override = Some(guid.clone()).filter(|g| !g.is_empty());
        }
    }
}

/// A partial edit of a profile. Unset fields are left untouched; an empty
/// name or GUID clears the override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub custom_name: Option<String>,
    pub image: Option<String>,
    pub sound: Option<String>,
    pub guid_override: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// True for a 32-character hex GUID.
pub fn is_valid_guid(guid: &str) -> bool {
    guid.len() == 32 && guid.chars().all(|c| c.is_ascii_hexdigit())
}
