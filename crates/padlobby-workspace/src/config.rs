use std::time::Duration;

use ahash::AHashMap;
use padlobby_gamepad::{default_combos, ClassifierSettings, ComboChord, RuntimeSettings};

use crate::profile::{ProfileUpdate, TypeDefault};

/// Classifier windows and loop pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub settle: Duration,
    pub cooldown: Duration,
    pub recency: Duration,
    pub poll_interval: Duration,
    pub wait: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        let runtime = RuntimeSettings::default();
        Self {
            settle: runtime.classifier.settle,
            cooldown: runtime.classifier.cooldown,
            recency: runtime.classifier.recency,
            poll_interval: runtime.poll_interval,
            wait: runtime.wait_timeout,
        }
    }
}

/// Parsed contents of the workspace file.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceConfig {
    pub timing: Timing,
    /// Ready chords in priority order.
    pub combos: Vec<ComboChord>,
    /// Whether the dual-trigger hold counts as a ready combo.
    pub triggers: bool,
    /// Entries appended after the built-in type defaults.
    pub type_defaults: Vec<TypeDefault>,
    /// Profile edits keyed by unique id.
    pub profiles: AHashMap<String, ProfileUpdate>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            combos: default_combos(),
            triggers: true,
            type_defaults: Vec::new(),
            profiles: AHashMap::new(),
        }
    }
}

impl WorkspaceConfig {
    /// Discovery settings derived from the timing and combo sections.
    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            classifier: ClassifierSettings {
                settle: self.timing.settle,
                cooldown: self.timing.cooldown,
                recency: self.timing.recency,
                combos: self.combos.clone(),
                trigger_combo: self.triggers,
                ..ClassifierSettings::default()
            },
            poll_interval: self.timing.poll_interval,
            wait_timeout: self.timing.wait,
            ..RuntimeSettings::default()
        }
    }
}
