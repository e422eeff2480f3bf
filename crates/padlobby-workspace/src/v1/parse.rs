use std::time::Duration;

use ahash::AHashMap;
use padlobby_gamepad::{codes, ButtonCode, ComboChord, ComboKey};

use super::chord::{split_chord, ChordErrorKind};
use super::schema::{ButtonV1, ChordV1, ConfigV1, ProfileV1, TimingV1, TypeDefaultV1};
use super::Error;
use crate::config::{Timing, WorkspaceConfig};
use crate::profile::{is_valid_guid, ProfileUpdate, TypeDefault, DEFAULT_IMAGE, DEFAULT_SOUND};

impl ConfigV1 {
    pub fn parse(&self) -> Result<WorkspaceConfig, Error> {
        let defaults = WorkspaceConfig::default();

        let combos = match &self.combos {
            Some(chords) => chords.iter().map(parse_chord).collect::<Result<_, _>>()?,
            None => defaults.combos,
        };

        let type_defaults = self
            .type_defaults
            .iter()
            .map(parse_type_default)
            .collect::<Result<_, _>>()?;

        let mut profiles = AHashMap::new();
        for (unique_id, raw) in &self.profiles {
            profiles.insert(unique_id.clone(), parse_profile_edit(unique_id, raw)?);
        }

        Ok(WorkspaceConfig {
            timing: parse_timing(&self.timing)?,
            combos,
            triggers: self.triggers.unwrap_or(defaults.triggers),
            type_defaults,
            profiles,
        })
    }
}

fn parse_timing(raw: &TimingV1) -> Result<Timing, Error> {
    let defaults = Timing::default();
    let ms = |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_millis);
    let timing = Timing {
        settle: ms(raw.settle_ms, defaults.settle),
        cooldown: ms(raw.cooldown_ms, defaults.cooldown),
        recency: ms(raw.recency_ms, defaults.recency),
        poll_interval: ms(raw.poll_interval_ms, defaults.poll_interval),
        wait: ms(raw.wait_ms, defaults.wait),
    };
    if timing.poll_interval.is_zero() {
        return Err(Error::ZeroDuration("poll_interval_ms"));
    }
    Ok(timing)
}

fn parse_chord(raw: &ChordV1) -> Result<ComboChord, Error> {
    match raw {
        ChordV1::Expr(expr) => split_chord(expr)
            .map_err(|kind| Error::InvalidChord(expr.clone(), kind))?
            .into_iter()
            .map(parse_combo_key)
            .collect(),
        ChordV1::Buttons(buttons) if buttons.is_empty() => {
            Err(Error::InvalidChord("[]".into(), ChordErrorKind::Empty))
        }
        ChordV1::Buttons(buttons) => buttons
            .iter()
            .map(|button| match button {
                ButtonV1::Code(code) => Ok(ComboKey::Button(*code)),
                ButtonV1::Name(name) => parse_combo_key(name),
            })
            .collect(),
    }
}

fn parse_combo_key(name: &str) -> Result<ComboKey, Error> {
    if name.eq_ignore_ascii_case("start") {
        return Ok(ComboKey::Start);
    }
    parse_button_name(name).map(ComboKey::Button)
}

/// Parse a button name or a numeric code (decimal or `0x` hex).
pub fn parse_button_name(name: &str) -> Result<ButtonCode, Error> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "south" | "a" => codes::BTN_SOUTH,
        "east" | "b" => codes::BTN_EAST,
        "north" | "x" => codes::BTN_NORTH,
        "west" | "y" => codes::BTN_WEST,
        "c" => codes::BTN_C,
        "z" => codes::BTN_Z,
        "tl" | "l" => codes::BTN_TL,
        "tr" | "r" => codes::BTN_TR,
        "tl2" | "zl" => codes::BTN_TL2,
        "tr2" | "zr" => codes::BTN_TR2,
        "select" | "back" | "minus" => codes::BTN_SELECT,
        "start" | "plus" => codes::BTN_START,
        "mode" | "home" | "guide" => codes::BTN_MODE,
        "thumbl" => codes::BTN_THUMBL,
        "thumbr" => codes::BTN_THUMBR,
        other => {
            let parsed = match other.strip_prefix("0x") {
                Some(hex) => u16::from_str_radix(hex, 16),
                None => other.parse(),
            };
            return parsed.map_err(|_| Error::InvalidButton(name.to_string()));
        }
    })
}

fn parse_type_default(raw: &TypeDefaultV1) -> Result<TypeDefault, Error> {
    let ids = match (raw.vendor_id, raw.product_id) {
        (Some(vendor), Some(product)) => Some((vendor, product)),
        (None, None) => None,
        _ => return Err(Error::PartialIds(raw.name.clone())),
    };
    let start_button = match &raw.start_button {
        Some(ButtonV1::Code(code)) => Some(*code),
        Some(ButtonV1::Name(name)) => Some(parse_button_name(name)?),
        None => None,
    };
    Ok(TypeDefault {
        name: raw.name.clone(),
        image: raw.image.clone().unwrap_or_else(|| DEFAULT_IMAGE.into()),
        sound: raw.sound.clone().unwrap_or_else(|| DEFAULT_SOUND.into()),
        ids,
        guid_override: parse_guid(raw.guid_override.as_deref())?,
        start_button,
    })
}

fn parse_profile_edit(unique_id: &str, raw: &ProfileV1) -> Result<ProfileUpdate, Error> {
    if let Some(guid) = raw.guid_override.as_deref().filter(|g| !g.is_empty()) {
        if !is_valid_guid(guid) {
            return Err(Error::InvalidGuid(format!("{unique_id}: {guid}")));
        }
    }
    Ok(ProfileUpdate {
        custom_name: raw.custom_name.clone(),
        image: raw.image.clone(),
        sound: raw.sound.clone(),
        guid_override: raw.guid_override.clone(),
    })
}

fn parse_guid(guid: Option<&str>) -> Result<Option<String>, Error> {
    match guid {
        Some(guid) if !is_valid_guid(guid) => Err(Error::InvalidGuid(guid.to_string())),
        Some(guid) => Ok(Some(guid.to_ascii_lowercase())),
        None => Ok(None),
    }
}
