use std::time::Duration;

use smallvec::{smallvec, SmallVec};

use crate::types::{codes, ButtonCode};

/// One member of a ready chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComboKey {
    /// The device's resolved start button.
    Start,
    /// A fixed button code.
    Button(ButtonCode),
}

impl ComboKey {
    #[inline]
    pub fn resolve(self, start_button: ButtonCode) -> ButtonCode {
        match self {
            ComboKey::Start => start_button,
            ComboKey::Button(code) => code,
        }
    }
}

/// Buttons that must all be recently pressed for a chord to match.
pub type ComboChord = SmallVec<[ComboKey; 4]>;

/// Tuning of the input event classifier.
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    /// Combo detection is suppressed for this long after connect.
    pub settle: Duration,
    /// Minimum time between two fires on the same device.
    pub cooldown: Duration,
    /// How long a released button still counts towards a chord.
    pub recency: Duration,
    /// Ready chords in priority order.
    pub combos: Vec<ComboChord>,
    /// Whether holding both calibrated triggers counts as a ready combo.
    pub trigger_combo: bool,
    /// Start button used when no per-type override exists.
    pub default_start_button: ButtonCode,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1000),
            cooldown: Duration::from_millis(2000),
            recency: Duration::from_millis(1500),
            combos: default_combos(),
            trigger_combo: true,
            default_start_button: codes::BTN_START,
        }
    }
}

/// Start alone, then both shoulder buttons (the way paired halves are joined).
pub fn default_combos() -> Vec<ComboChord> {
    vec![
        smallvec![ComboKey::Start],
        smallvec![
            ComboKey::Button(codes::BTN_TL),
            ComboKey::Button(codes::BTN_TR)
        ],
    ]
}

/// Settings of the discovery runtime thread.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub classifier: ClassifierSettings,
    /// Sleep between discovery iterations.
    pub poll_interval: Duration,
    /// Upper bound on waiting for readable handles.
    pub wait_timeout: Duration,
    /// Back-off after a failed iteration.
    pub retry_delay: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            classifier: ClassifierSettings::default(),
            poll_interval: Duration::from_millis(20),
            wait_timeout: Duration::from_millis(50),
            retry_delay: Duration::from_secs(1),
        }
    }
}
