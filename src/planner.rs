//! Turns the latch into a desired velocity and acceleration.
//!
//! Walking characters get their acceleration through floor friction, so the planner only
//! records what they want. Flyers and swimmers push directly.

use core::f32::consts::{FRAC_PI_3, PI, TAU};

use crate::{
    accumulator::Accumulator,
    environment::Environment,
    latch::{LatchButtons, shape_latch},
    locomotion::Ctx,
    prelude::*,
};

/// Steepest bank or pitch a flyer can reach.
const MAX_FLIGHT_TILT: f32 = FRAC_PI_3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpOutcome {
    Stayed,
    Jumped,
    /// The rider left its mount. The caller is responsible for detaching it.
    Dismounted,
}

pub(crate) fn plan_walk(
    loc: &mut Locomotion,
    env: &mut Environment,
    acc: &Accumulator,
    ctx: &Ctx,
) {
    env.desired_velocity = loc.velocity;
    env.desired_acceleration = Vec3::ZERO;
    loc.is_sneaking = false;

    if !ctx.cfg.alive || ctx.cfg.is_item {
        return;
    }
    let direction = shape_latch(ctx.latch.input.xy(), ctx.tuning.latch_dead_zone);
    if direction == Vec2::ZERO {
        return;
    }

    loc.is_sneaking = ctx.latch.pressed(LatchButtons::SNEAK)
        || (ctx.latch.is_analog() && direction.length() < ctx.tuning.sneak_threshold);
    let max_acceleration = if loc.is_sneaking {
        ctx.cfg.max_acceleration * ctx.cfg.sneak_scale
    } else {
        ctx.cfg.max_acceleration
    };

    let desired_velocity = direction.extend(0.0) * ctx.cfg.max_speed + env.ground_velocity;
    let mut desired_acceleration =
        desired_velocity - loc.velocity - acc.velocity * ctx.tuning.accumulated_damping;

    if !ctx.cfg.flying {
        // stay on the surface without losing any push
        let magnitude = desired_acceleration.length();
        let tangent = desired_acceleration - env.normal * desired_acceleration.dot(env.normal);
        desired_acceleration = tangent.normalize_or_zero() * magnitude;
    }

    // friction eats part of the velocity before the push shows up in the position
    let limit = if env.fluid_friction_horizontal > 0.0 {
        max_acceleration / env.fluid_friction_horizontal
    } else {
        max_acceleration
    };

    env.desired_velocity = desired_velocity;
    env.desired_acceleration = desired_acceleration.clamp_length_max(limit);
}

/// Aerodynamic flight: roll banks into turns, pitch and throttle drive the forward axis.
///
/// While `jump_airborne` the flyer levels out. Flyers never jump from the ground, so that flag is
/// only ever set by leaving a mount.
pub(crate) fn plan_flight(loc: &mut Locomotion, env: &mut Environment, ctx: &Ctx) {
    env.desired_velocity = loc.velocity;
    env.desired_acceleration = Vec3::ZERO;
    if !ctx.cfg.alive {
        return;
    }

    let input = ctx.latch.input.clamp(Vec3::NEG_ONE, Vec3::ONE);
    let (roll, throttle, pitch) = (input.x, input.y, input.z);
    let cfg = ctx.cfg;

    let orientation = &mut loc.orientation;
    orientation.tilt_x = (orientation.tilt_x + roll * cfg.roll_rate * ctx.dt)
        .clamp(-MAX_FLIGHT_TILT, MAX_FLIGHT_TILT);
    orientation.tilt_y = (orientation.tilt_y + pitch * cfg.pitch_rate * ctx.dt)
        .clamp(-MAX_FLIGHT_TILT, MAX_FLIGHT_TILT);
    if loc.jump_airborne && ctx.tuning.jump_delay > 0.0 {
        // fresh off a jump the flyer levels out, handing control back as the jump ages
        let level = (loc.jump_timer / ctx.tuning.jump_delay).clamp(0.0, 1.0);
        orientation.tilt_x *= 1.0 - level;
        orientation.tilt_y *= 1.0 - level;
    }
    // banking turns
    let bank = orientation.tilt_x.sin() * cfg.turn_rate * ctx.dt;
    orientation.yaw = wrap_angle(orientation.yaw - bank);

    let (forward, right, up) = (orientation.forward(), orientation.right(), orientation.up());
    let v_right = loc.velocity.dot(right);
    let v_up = loc.velocity.dot(up);

    let lift = -v_up.signum() * (cfg.lift * v_up * v_up).min(cfg.max_lift);
    let thrust = throttle * cfg.max_acceleration * env.fluid_friction_horizontal;
    let yaw_damping = -v_right * cfg.yaw_damping;

    let acceleration = up * lift + forward * thrust + right * yaw_damping;
    env.desired_acceleration = acceleration;
    env.desired_velocity = loc.velocity + acceleration * ctx.dt;
}

/// Flyers and swimmers push directly. Everyone else pushes off the floor.
pub(crate) fn apply_voluntary(env: &Environment, acc: &mut Accumulator, ctx: &Ctx) {
    if ctx.cfg.flying || (env.is_watery && !env.grounded) {
        acc.velocity += env.desired_acceleration;
    }
}

/// Starts a jump, a water stroke or a dismount. Flyers only ever dismount.
pub(crate) fn handle_jump(
    loc: &mut Locomotion,
    env: &Environment,
    ctx: &Ctx,
    mounted: bool,
) -> JumpOutcome {
    if !ctx.latch.pressed(LatchButtons::JUMP) || loc.jump_timer > 0.0 || !ctx.cfg.alive {
        return JumpOutcome::Stayed;
    }

    if mounted {
        loc.velocity.z = loc.velocity.z.max(0.0) + ctx.tuning.dismount_speed;
        loc.jump_timer = ctx.tuning.jump_delay;
        loc.jump_airborne = true;
        loc.jump_ready = false;
        return JumpOutcome::Dismounted;
    }

    let has_charge = ctx.cfg.has_infinite_jumps() || loc.jump_charges_remaining > 0;
    if ctx.cfg.flying || !has_charge || !(loc.jump_ready || env.is_watery) {
        return JumpOutcome::Stayed;
    }

    let power = if env.is_watery {
        ctx.cfg.jump_power * ctx.tuning.water_jump_factor
    } else {
        ctx.cfg.jump_power
    };
    loc.velocity.z = loc.velocity.z.max(0.0) + power;
    loc.jump_timer = ctx.tuning.jump_delay;
    loc.jump_airborne = true;
    loc.jump_ready = false;
    // swimming strokes are free
    if !ctx.cfg.has_infinite_jumps() && !env.is_watery {
        loc.jump_charges_remaining = loc.jump_charges_remaining.saturating_sub(1);
    }
    JumpOutcome::Jumped
}

/// Turns the facing toward the direction of travel, limited by the turn rate.
pub(crate) fn turn_toward_travel(loc: &mut Locomotion, env: &Environment, ctx: &Ctx) {
    if ctx.cfg.flying || !ctx.cfg.alive {
        return;
    }
    let travel = (env.desired_velocity - env.ground_velocity).xy();
    if travel.length_squared() < 0.01 {
        return;
    }
    let target = travel.y.atan2(travel.x);
    let step = ctx.cfg.turn_rate * ctx.dt;
    let diff = wrap_angle(target - loc.orientation.yaw).clamp(-step, step);
    loc.orientation.yaw = wrap_angle(loc.orientation.yaw + diff);
}

/// Leans a grounded character into the slope under it, and back upright in the air.
pub(crate) fn conform_to_ground(loc: &mut Locomotion, env: &Environment, ctx: &Ctx) {
    if !ctx.cfg.stick_to_ground || ctx.cfg.flying {
        return;
    }
    let (target_x, target_y) = if env.grounded {
        ground_tilt(env.normal, loc.orientation.yaw)
    } else {
        (0.0, 0.0)
    };
    let blend = ctx.tuning.ground_tilt_blend.clamp(0.0, 1.0);
    loc.orientation.tilt_x += (target_x - loc.orientation.tilt_x) * blend;
    loc.orientation.tilt_y += (target_y - loc.orientation.tilt_y) * blend;
}

/// Tilts that make [`Orientation::up`] match `normal` for the given facing.
pub fn ground_tilt(normal: Vec3, yaw: f32) -> (f32, f32) {
    let normal = normal.normalize_or(Vec3::Z);
    let forward = Vec3::new(yaw.cos(), yaw.sin(), 0.0);
    let left = Vec3::new(-yaw.sin(), yaw.cos(), 0.0);
    let tilt_x = -normal.dot(left).clamp(-1.0, 1.0).asin();
    let tilt_y = normal.dot(forward).atan2(normal.z);
    (tilt_x, tilt_y)
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}
