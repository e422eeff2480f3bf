use std::time::Instant;

use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;

use crate::classify::TriggerCalibration;
use crate::settings::ClassifierSettings;
use crate::types::{AxisCode, ButtonCode, RawEvent};

/// Lifecycle phase of a connected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Right after connect; combos are ignored while the initial state syncs.
    Settling,
    /// Normal operation.
    Armed,
}

/// Signals produced while processing a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSignal {
    Activity,
    StartPressed,
}

/// What satisfied a ready combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboMatch {
    /// Index of the chord in the configured list.
    Chord(usize),
    /// Every calibrated trigger held past half travel.
    Triggers,
}

pub type Signals = SmallVec<[InputSignal; 2]>;

/// Per-device input state. Created on connect and dropped on removal.
#[derive(Debug)]
pub struct DeviceState {
    phase: Phase,
    settle_until: Instant,
    cooldown_until: Option<Instant>,
    held: AHashSet<ButtonCode>,
    // Kept after release so chords tolerate skew between paired halves.
    pressed_at: AHashMap<ButtonCode, Instant>,
    axes: AHashMap<AxisCode, i32>,
    triggered: AHashSet<AxisCode>,
    calibration: TriggerCalibration,
    start_button: ButtonCode,
}

impl DeviceState {
    pub fn new(
        calibration: TriggerCalibration,
        start_button: ButtonCode,
        connected_at: Instant,
        settings: &ClassifierSettings,
    ) -> Self {
        Self {
            phase: Phase::Settling,
            settle_until: connected_at + settings.settle,
            cooldown_until: None,
            held: AHashSet::new(),
            pressed_at: AHashMap::new(),
            axes: AHashMap::new(),
            triggered: AHashSet::new(),
            calibration,
            start_button,
        }
    }

    /// Returns the phase at `now`, leaving `Settling` once the window ends.
    pub fn phase(&mut self, now: Instant) -> Phase {
        if self.phase == Phase::Settling && now >= self.settle_until {
            self.phase = Phase::Armed;
        }
        self.phase
    }

    pub fn start_button(&self) -> ButtonCode {
        self.start_button
    }

    pub fn set_start_button(&mut self, code: ButtonCode) {
        self.start_button = code;
    }

    pub fn calibration(&self) -> &TriggerCalibration {
        &self.calibration
    }

    pub fn has_held_buttons(&self) -> bool {
        !self.held.is_empty()
    }

    pub fn is_held(&self, code: ButtonCode) -> bool {
        self.held.contains(&code)
    }

    pub fn axis_value(&self, code: AxisCode) -> i32 {
        self.axes.get(&code).copied().unwrap_or(0)
    }

    /// Applies a raw event and returns the signals it produced.
    pub fn handle_event(&mut self, event: RawEvent, now: Instant) -> Signals {
        let mut signals = Signals::new();
        match event {
            RawEvent::Key { code, value: 1 } => {
                self.held.insert(code);
                self.pressed_at.insert(code, now);
                signals.push(InputSignal::Activity);
                if code == self.start_button {
                    signals.push(InputSignal::StartPressed);
                }
            }
            RawEvent::Key { code, value: 0 } => {
                self.held.remove(&code);
            }
            RawEvent::Key { .. } => {}
            RawEvent::Axis { code, value } => {
                let Some(max) = self.calibration.max_for(code) else {
                    return signals;
                };
                self.axes.insert(code, value);
                let value = i64::from(value);
                let max = i64::from(max);
                if value * 4 >= max * 3 {
                    if self.triggered.insert(code) {
                        signals.push(InputSignal::Activity);
                    }
                } else if value * 4 < max {
                    self.triggered.remove(&code);
                }
            }
        }
        signals
    }

    /// Evaluates ready combos and records a fire when one matches.
    pub fn check_combo(
        &mut self,
        now: Instant,
        settings: &ClassifierSettings,
    ) -> Option<ComboMatch> {
        if self.phase(now) == Phase::Settling {
            return None;
        }
        if self.cooldown_until.is_some_and(|until| now < until) {
            return None;
        }

        let matched = settings
            .combos
            .iter()
            .position(|chord| {
                !chord.is_empty()
                    && chord.iter().all(|key| {
                        self.recently_pressed(
                            key.resolve(self.start_button),
                            now,
                            settings,
                        )
                    })
            })
            .map(ComboMatch::Chord)
            .or_else(|| {
                (settings.trigger_combo && self.triggers_held())
                    .then_some(ComboMatch::Triggers)
            })?;

        self.cooldown_until = Some(now + settings.cooldown);
        Some(matched)
    }

    fn recently_pressed(
        &self,
        code: ButtonCode,
        now: Instant,
        settings: &ClassifierSettings,
    ) -> bool {
        if self.held.contains(&code) {
            return true;
        }
        // Released presses from the settle window are sync noise.
        self.pressed_at.get(&code).is_some_and(|&at| {
            at >= self.settle_until && now.saturating_duration_since(at) <= settings.recency
        })
    }

    fn triggers_held(&self) -> bool {
        !self.calibration.is_empty()
            && self.calibration.axes().iter().all(|axis| {
                i64::from(self.axis_value(axis.code)) * 2 >= i64::from(axis.max)
            })
    }
}
