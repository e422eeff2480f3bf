use std::ops::RangeInclusive;

use smallvec::SmallVec;

use crate::types::{codes, AxisCode, Capabilities};

/// Window of button codes that only joysticks and gamepads emit: from
/// `BTN_JOYSTICK` through the thumbstick clicks, 32 codes in total.
pub const GAMEPAD_BUTTON_RANGE: RangeInclusive<u16> =
    codes::BTN_JOYSTICK..=codes::BTN_JOYSTICK + 31;

/// A candidate analog trigger pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerPairSpec {
    pub name: &'static str,
    pub axes: [AxisCode; 2],
}

/// Candidate trigger pairs in priority order.
pub const TRIGGER_PAIRS: [TriggerPairSpec; 2] = [
    TriggerPairSpec {
        name: "gas/brake",
        axes: [codes::ABS_GAS, codes::ABS_BRAKE],
    },
    TriggerPairSpec {
        name: "z/rz",
        axes: [codes::ABS_Z, codes::ABS_RZ],
    },
];

/// A calibrated analog trigger axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerAxis {
    pub code: AxisCode,
    pub max: i32,
}

/// Trigger axes usable for the dual-trigger combo. Empty when the device has
/// no qualifying pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerCalibration {
    axes: SmallVec<[TriggerAxis; 2]>,
}

impl TriggerCalibration {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn axes(&self) -> &[TriggerAxis] {
        &self.axes
    }

    pub fn max_for(&self, code: AxisCode) -> Option<i32> {
        self.axes.iter().find(|a| a.code == code).map(|a| a.max)
    }
}

/// True when the node advertises at least one joystick/gamepad button.
///
/// Keyboards, mice and motion-sensor nodes share the event namespace with
/// gamepads but never report codes from this window.
pub fn is_gamepad(caps: &Capabilities) -> bool {
    caps.buttons
        .iter()
        .any(|code| GAMEPAD_BUTTON_RANGE.contains(code))
}

/// Picks the first candidate pair whose axes both declare `min == 0` and
/// `max > 0`.
///
/// Only one pair is ever selected: devices may advertise both layouts while
/// updating only one of them.
pub fn detect_trigger_pair(caps: &Capabilities) -> TriggerCalibration {
    for spec in &TRIGGER_PAIRS {
        let ranges: Option<SmallVec<[TriggerAxis; 2]>> = spec
            .axes
            .iter()
            .map(|&code| {
                caps.axis(code)
                    .filter(|range| range.min == 0 && range.max > 0)
                    .map(|range| TriggerAxis {
                        code,
                        max: range.max,
                    })
            })
            .collect();
        if let Some(axes) = ranges {
            return TriggerCalibration { axes };
        }
    }
    TriggerCalibration::empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AxisRange;

    fn caps(buttons: &[u16], axes: &[(u16, i32, i32)]) -> Capabilities {
        let mut caps = Capabilities::default();
        caps.buttons.extend(buttons.iter().copied());
        for &(code, min, max) in axes {
            caps.axes.insert(code, AxisRange { min, max });
        }
        caps
    }

    #[test]
    fn gamepad_range_spans_32_codes() {
        assert_eq!(GAMEPAD_BUTTON_RANGE.clone().count(), 32);
        assert!(GAMEPAD_BUTTON_RANGE.contains(&codes::BTN_THUMBR));
    }

    #[test]
    fn keyboard_and_mouse_are_not_gamepads() {
        // KEY_A, KEY_SPACE, BTN_LEFT, BTN_RIGHT
        assert!(!is_gamepad(&caps(&[0x1e, 0x39, 0x110, 0x111], &[])));
    }

    #[test]
    fn motion_sensor_node_is_not_a_gamepad() {
        let sensor = caps(
            &[],
            &[(codes::ABS_X, -32768, 32767), (codes::ABS_RX, -32768, 32767)],
        );
        assert!(!is_gamepad(&sensor));
    }

    #[test]
    fn any_gamepad_button_qualifies_regardless_of_other_codes() {
        assert!(is_gamepad(&caps(&[codes::BTN_SOUTH], &[])));
        assert!(is_gamepad(&caps(&[0x1e, 0x110, codes::BTN_JOYSTICK], &[])));
        assert!(is_gamepad(&caps(&[0x1e, codes::BTN_THUMBR], &[])));
    }

    #[test]
    fn prefers_gas_brake_when_both_pairs_qualify() {
        let both = caps(
            &[codes::BTN_SOUTH],
            &[
                (codes::ABS_GAS, 0, 1023),
                (codes::ABS_BRAKE, 0, 1023),
                (codes::ABS_Z, 0, 255),
                (codes::ABS_RZ, 0, 255),
            ],
        );
        let calibration = detect_trigger_pair(&both);
        assert_eq!(
            calibration.axes(),
            &[
                TriggerAxis { code: codes::ABS_GAS, max: 1023 },
                TriggerAxis { code: codes::ABS_BRAKE, max: 1023 },
            ]
        );
    }

    #[test]
    fn falls_back_to_z_rz() {
        let pad = caps(
            &[codes::BTN_SOUTH],
            &[(codes::ABS_Z, 0, 255), (codes::ABS_RZ, 0, 255)],
        );
        let calibration = detect_trigger_pair(&pad);
        assert_eq!(calibration.max_for(codes::ABS_Z), Some(255));
        assert_eq!(calibration.max_for(codes::ABS_RZ), Some(255));
    }

    #[test]
    fn rejects_axes_with_negative_minimum() {
        let sensor = caps(
            &[codes::BTN_SOUTH],
            &[(codes::ABS_Z, -4096, 4096), (codes::ABS_RZ, -4096, 4096)],
        );
        assert!(detect_trigger_pair(&sensor).is_empty());
    }

    #[test]
    fn half_qualifying_pair_is_rejected() {
        let pad = caps(
            &[codes::BTN_SOUTH],
            &[(codes::ABS_GAS, 0, 255), (codes::ABS_Z, 0, 255)],
        );
        assert!(detect_trigger_pair(&pad).is_empty());
    }
}
