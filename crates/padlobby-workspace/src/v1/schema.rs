use ahash::AHashMap;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigV1 {
    pub version: u8,
    #[serde(default)]
    pub timing: TimingV1,
    #[serde(default)]
    pub combos: Option<Vec<ChordV1>>,
    #[serde(default)]
    pub triggers: Option<bool>,
    #[serde(default)]
    pub type_defaults: Vec<TypeDefaultV1>,
    #[serde(default)]
    pub profiles: AHashMap<String, ProfileV1>, // unique id -> edits
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TimingV1 {
    #[serde(default)]
    pub settle_ms: Option<u64>,
    #[serde(default)]
    pub cooldown_ms: Option<u64>,
    #[serde(default)]
    pub recency_ms: Option<u64>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    #[serde(default)]
    pub wait_ms: Option<u64>,
}

/// Either `"tl + tr"` or `[tl, tr]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ChordV1 {
    Expr(String),
    Buttons(Vec<ButtonV1>),
}

/// A button name or a raw numeric code.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ButtonV1 {
    Code(u16),
    Name(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TypeDefaultV1 {
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub sound: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<u16>,
    #[serde(default)]
    pub product_id: Option<u16>,
    #[serde(default)]
    pub guid_override: Option<String>,
    #[serde(default)]
    pub start_button: Option<ButtonV1>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProfileV1 {
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub sound: Option<String>,
    #[serde(default)]
    pub guid_override: Option<String>,
}
