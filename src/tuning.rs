use crate::prelude::*;

/// Global physics constants shared by every character.
///
/// All rates are expressed per tick. Override the resource to retune a module.
#[derive(Resource, Clone, Reflect, Debug)]
#[reflect(Resource)]
pub struct LocomotionTuning {
    /// Vertical acceleration applied to everything that is not hovering.
    pub gravity: f32,
    /// Velocity retention per tick while submerged.
    pub water_friction: f32,
    /// Ground velocity retention on tiles flagged slippery.
    pub slippy_friction: f32,
    /// Ground velocity retention on ordinary tiles.
    pub noslip_friction: f32,
    /// Ground velocity retention while standing on a platform.
    pub platform_stick: f32,
    /// Extra downhill factor on slippery slopes.
    pub hillslide: f32,
    /// Velocity retention on ice. Sets the reduced coefficient of a slipping character.
    pub ice_friction: f32,
    /// Vertical speed below which a bounce turns into resting contact.
    pub stop_bouncing: f32,
    /// Height band over which a character blends from "on the floor" to "in the air".
    pub platform_tolerance: f32,
    /// Side length of one terrain tile in world units.
    pub grid_size: f32,
    /// Converts [`Time`] seconds to pipeline ticks.
    pub ticks_per_second: f32,
    /// Ticks between two jumps; also the jump traction window.
    pub jump_delay: f32,
    /// Fraction of the jump power available when jumping out of water.
    pub water_jump_factor: f32,
    /// Upward speed given to a rider that jumps off its mount.
    pub dismount_speed: f32,
    /// Leveling rate for hovering objects.
    pub fly_dampen: f32,
    /// Share of the missing acceleration a jumping character can still steer with.
    pub jump_traction: f32,
    /// Speed at which the static friction bound is evaluated.
    pub friction_reference_speed: f32,
    /// Multiplier on the log-friction heuristic.
    pub friction_magnification: f32,
    /// Lower bound of the log-friction coefficient so no floor is perfectly frictionless.
    pub traction_minimum: f32,
    /// Low-pass factor for the animation leg velocity.
    pub leg_velocity_blend: f32,
    /// Share of the already-accumulated acceleration the planner compensates for.
    pub accumulated_damping: f32,
    /// Largest wall push-out in a single tick, as a fraction of a tile.
    pub wall_push_fraction: f32,
    /// Characters force a safe position check when `(id + tick) & mask == 0`.
    pub safe_refresh_mask: u32,
    /// Upper bound on any committed speed.
    pub max_velocity: f32,
    /// Latch magnitudes at or below this are ignored.
    pub latch_dead_zone: f32,
    /// Analog latches below this magnitude make a character sneak.
    pub sneak_threshold: f32,
    /// How fast a grounded character leans into the slope under it.
    pub ground_tilt_blend: f32,
}

impl Default for LocomotionTuning {
    fn default() -> Self {
        Self {
            gravity: -1.0,
            water_friction: 0.80,
            slippy_friction: 1.0,
            noslip_friction: 0.91,
            platform_stick: 0.50,
            hillslide: 1.0,
            ice_friction: 0.9738,
            stop_bouncing: 0.1,
            platform_tolerance: 50.0,
            grid_size: 128.0,
            ticks_per_second: 50.0,
            jump_delay: 20.0,
            water_jump_factor: 0.5,
            dismount_speed: 16.0,
            fly_dampen: 0.001,
            jump_traction: 0.1,
            friction_reference_speed: 10.0,
            friction_magnification: 4.0,
            traction_minimum: 0.01,
            leg_velocity_blend: 0.1,
            accumulated_damping: 1.0,
            wall_push_fraction: 0.25,
            safe_refresh_mask: 7,
            max_velocity: 200.0,
            latch_dead_zone: 0.05,
            sneak_threshold: 1.0 / 3.0,
            ground_tilt_blend: 0.5,
        }
    }
}

impl LocomotionTuning {
    /// Tick length in pipeline units for a frame of `seconds`.
    pub fn ticks(&self, seconds: f32) -> f32 {
        seconds * self.ticks_per_second
    }

    /// The world's "up" direction, opposite to gravity.
    pub fn up(&self) -> Vec3 {
        if self.gravity > 0.0 {
            Vec3::NEG_Z
        } else {
            Vec3::Z
        }
    }
}

/// Water covering the whole module, if any.
#[derive(Resource, Clone, Copy, Reflect, Debug, Default)]
#[reflect(Resource)]
pub struct WorldWater {
    pub is_water: bool,
    /// Height of the water surface on tiles flagged as water.
    pub surface_level: f32,
}

impl WorldWater {
    pub fn at(surface_level: f32) -> Self {
        Self {
            is_water: true,
            surface_level,
        }
    }
}

/// Counts pipeline ticks. Drives the per-character safe position cadence.
#[derive(Resource, Clone, Copy, Reflect, Debug, Default, Deref)]
#[reflect(Resource)]
pub struct LocomotionClock(pub u32);
