use tracing::warn;

use crate::prelude::*;

/// Tick-scoped scratch space filled by the planning and friction steps.
///
/// Cleared at the start of every tick. Steps only ever add to it; the integrator reads it.
#[derive(Component, Clone, Copy, Reflect, Default, Debug, PartialEq)]
#[reflect(Component)]
pub struct Accumulator {
    /// Acceleration, added to the velocity once per tick.
    pub velocity: Vec3,
    /// Displacement caused by a platform moving under the character.
    pub platform_offset: Vec3,
    /// Displacement caused by collision corrections.
    pub collision_offset: Vec3,
}

impl Accumulator {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn position_offset(&self) -> Vec3 {
        self.platform_offset + self.collision_offset
    }

    /// Folds a correction of an integrated state back in, so that integrating again yields the
    /// corrected state.
    pub fn absorb(&mut self, position_delta: Vec3, velocity_delta: Vec3, dt: f32) {
        self.collision_offset += position_delta;
        if dt > 0.0 {
            self.velocity += velocity_delta / dt;
        }
    }
}

/// Position and velocity after one tick, integrated from the tick-start state.
pub fn integrate(position: Vec3, velocity: Vec3, acc: &Accumulator, dt: f32) -> (Vec3, Vec3) {
    (
        position + velocity * dt + acc.position_offset(),
        velocity + acc.velocity * dt,
    )
}

/// Adds `delta` to the accumulated acceleration, scaling its part along `normal` by
/// `perp_factor` and the rest by `para_factor`.
pub fn apply_normal_acceleration(
    acc: &mut Accumulator,
    delta: Vec3,
    normal: Vec3,
    para_factor: f32,
    perp_factor: f32,
) {
    let normal = normal.normalize_or(Vec3::Z);
    let perp = normal * delta.dot(normal);
    let para = delta - perp;
    acc.velocity += para * para_factor + perp * perp_factor;
}

/// Zeroes non-finite components and clamps the speed.
pub fn validate_velocity(velocity: &mut Vec3, max_velocity: f32) {
    for i in 0..3 {
        if !velocity[i].is_finite() {
            warn!("velocity[{i}] is not finite: {}, setting to 0", velocity[i]);
            velocity[i] = 0.0;
        }
    }
    *velocity = velocity.clamp_length_max(max_velocity.max(0.0));
}
