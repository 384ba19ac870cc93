//! Control intent supplied by a player or an AI before the pipeline runs.

use core::ops::{BitOr, BitOrAssign};

use crate::prelude::*;

/// Where a latch comes from. Analog sources can sneak by pushing the stick gently.
#[derive(Clone, Copy, Reflect, Default, Debug, PartialEq, Eq)]
pub enum ControlSource {
    Keyboard,
    Joystick,
    #[default]
    Ai,
}

#[derive(Clone, Copy, Reflect, Default, Debug, PartialEq, Eq, Hash)]
pub struct LatchButtons(u8);

impl LatchButtons {
    pub const NONE: Self = Self(0);
    pub const JUMP: Self = Self(1 << 0);
    pub const SNEAK: Self = Self(1 << 1);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for LatchButtons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LatchButtons {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// The control intent for the current tick.
///
/// Walking characters read `input.xy` as a world-space direction. Flying characters read
/// `x` as roll, `y` as throttle and `z` as pitch.
#[derive(Component, Clone, Copy, Reflect, Default, Debug)]
#[reflect(Component)]
pub struct Latch {
    pub input: Vec3,
    pub buttons: LatchButtons,
    pub source: ControlSource,
}

impl Latch {
    pub fn new(input: Vec3, source: ControlSource) -> Self {
        Self {
            input,
            buttons: LatchButtons::NONE,
            source,
        }
    }

    pub fn with_buttons(mut self, buttons: LatchButtons) -> Self {
        self.buttons |= buttons;
        self
    }

    pub fn pressed(&self, button: LatchButtons) -> bool {
        self.buttons.contains(button)
    }

    pub fn is_analog(&self) -> bool {
        self.source != ControlSource::Keyboard
    }
}

/// Applies the dead zone, then bends small inputs quadratically and scales large ones back
/// to unit length. The result never exceeds a magnitude of one.
pub fn shape_latch(raw: Vec2, dead_zone: f32) -> Vec2 {
    let magnitude = raw.length();
    if !magnitude.is_finite() || magnitude <= dead_zone.max(0.0) {
        return Vec2::ZERO;
    }
    let scale = if magnitude > 1.0 {
        1.0 / magnitude
    } else {
        magnitude
    };
    raw * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_zone_swallows_small_input() {
        assert_eq!(shape_latch(Vec2::new(0.03, 0.02), 0.05), Vec2::ZERO);
        assert_eq!(shape_latch(Vec2::ZERO, 0.0), Vec2::ZERO);
        assert_eq!(shape_latch(Vec2::new(f32::NAN, 0.0), 0.05), Vec2::ZERO);
    }

    #[test]
    fn small_input_is_smoothed() {
        let shaped = shape_latch(Vec2::new(0.5, 0.0), 0.05);
        assert!((shaped.x - 0.25).abs() < 1e-6);
    }

    #[test]
    fn large_input_is_scaled_back_to_unit() {
        let shaped = shape_latch(Vec2::new(3.0, 4.0), 0.05);
        assert!((shaped.length() - 1.0).abs() < 1e-6);
        assert!((shaped.x - 0.6).abs() < 1e-6);
    }

    #[test]
    fn buttons_combine() {
        let latch = Latch::default().with_buttons(LatchButtons::JUMP | LatchButtons::SNEAK);
        assert!(latch.pressed(LatchButtons::JUMP));
        assert!(latch.pressed(LatchButtons::SNEAK));
        assert!(!Latch::default().pressed(LatchButtons::JUMP));
        assert!(!latch.pressed(LatchButtons::NONE));
    }
}
