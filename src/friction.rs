//! Drag, gravity, jump traction and floor friction.
//!
//! Every step adds to the [`Accumulator`] and reads the tick-start velocity.

use crate::{
    accumulator::{Accumulator, apply_normal_acceleration},
    environment::Environment,
    locomotion::Ctx,
    mass::{MassProfile, reaction_share},
    prelude::*,
};

/// A platform's share of a rider's floor acceleration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlatformReaction {
    pub platform: Entity,
    pub acceleration: Vec3,
}

pub(crate) fn apply_fluid_friction(
    loc: &Locomotion,
    env: &Environment,
    acc: &mut Accumulator,
    ctx: &Ctx,
) {
    // floating scenery is anchored in place
    if ctx.cfg.is_hovering() && (ctx.cfg.infinite_weight || ctx.cfg.bump_dampen == 0.0) {
        return;
    }
    let v = loc.velocity;
    acc.velocity += Vec3::new(
        -v.x * (1.0 - env.fluid_friction_horizontal),
        -v.y * (1.0 - env.fluid_friction_horizontal),
        -v.z * (1.0 - env.fluid_friction_vertical),
    );
}

/// Hovering characters spring toward their hover height, everyone else falls.
pub(crate) fn apply_gravity(loc: &Locomotion, env: &Environment, acc: &mut Accumulator, ctx: &Ctx) {
    if ctx.cfg.is_hovering() {
        let target = env.fly_level + ctx.cfg.fly_height;
        acc.velocity.z += (target - loc.position.z) * ctx.tuning.fly_dampen;
    } else {
        acc.velocity.z += ctx.tuning.gravity;
    }
}

/// Weak steering while a jump is young, fading to nothing as it ages.
pub(crate) fn apply_jump_traction(
    loc: &Locomotion,
    env: &Environment,
    acc: &mut Accumulator,
    ctx: &Ctx,
) {
    if loc.jump_timer <= 0.0 || ctx.tuning.jump_delay <= 0.0 {
        return;
    }
    let progress = (loc.jump_timer / ctx.tuning.jump_delay).clamp(0.0, 1.0);
    let factor = ctx.tuning.jump_traction * progress * (1.0 - env.walk_lerp);
    let missing = env.desired_acceleration - acc.velocity;
    apply_normal_acceleration(acc, missing, env.normal, factor, factor);
}

/// Keeps a grounded rider on the platform top as the platform moves vertically.
pub(crate) fn apply_platform_ride(
    loc: &Locomotion,
    env: &Environment,
    acc: &mut Accumulator,
    ctx: &Ctx,
) {
    let Some(platform) = ctx.platform else {
        return;
    };
    if !env.grounded || loc.jump_timer > 0.0 {
        return;
    }
    let lift = platform.velocity.z * ctx.dt + (env.walk_level - loc.position.z);
    acc.platform_offset.z += lift * ctx.tuning.platform_stick;
}

/// `-ln(retention)`, never below the traction minimum.
pub fn friction_coefficient(retention: f32, minimum: f32) -> f32 {
    (-retention.max(f32::MIN_POSITIVE).ln()).max(minimum)
}

/// Largest acceleration the floor can provide before the character slips.
pub fn friction_bound(coefficient: f32, normal_reaction: f32, tuning: &LocomotionTuning) -> f32 {
    let gravity = tuning.gravity.abs();
    let load = if gravity > 0.0 {
        normal_reaction / gravity
    } else {
        normal_reaction
    };
    tuning.friction_reference_speed * coefficient * tuning.friction_magnification * load
}

/// Floor reaction and static or slipping friction for a grounded character.
///
/// Returns the reaction owed to the platform under the character, if any.
pub(crate) fn apply_floor_friction(
    loc: &mut Locomotion,
    env: &Environment,
    acc: &mut Accumulator,
    ctx: &Ctx,
) -> Option<PlatformReaction> {
    loc.is_slipping = false;
    if !env.grounded || loc.jump_timer > 0.0 || !env.ground_friction.is_finite() {
        return None;
    }

    let profile = MassProfile::from(ctx.cfg);
    let scenery = profile.mass().is_infinite();
    if scenery && ctx.platform.is_none() {
        return None;
    }

    let up = env.normal;
    let contact = 1.0 - env.walk_lerp;

    // the floor pushes back against anything pressing into it
    let pressing = acc.velocity.dot(up);
    let normal_reaction = if pressing < 0.0 {
        let reaction = acc.velocity;
        apply_normal_acceleration(acc, reaction, up, 0.0, -contact);
        -pressing * contact
    } else {
        0.0
    };

    let tangent = |v: Vec3| v - up * v.dot(up);
    let relative = loc.velocity - env.ground_velocity;
    let drag = tangent(-relative * contact * (1.0 - env.ground_friction) * env.traction);
    // the floor also holds against anything already pulling along it, like gravity on a slope
    let wanted = tangent(env.desired_acceleration) + drag - tangent(acc.velocity);

    let coefficient = friction_coefficient(env.ground_friction, ctx.tuning.traction_minimum);
    let static_bound = friction_bound(coefficient, normal_reaction, ctx.tuning);
    let blend = ctx.tuning.leg_velocity_blend;

    let applied = if scenery || wanted.length() <= static_bound {
        loc.leg_velocity += (relative - loc.leg_velocity) * blend;
        wanted
    } else {
        loc.is_slipping = true;
        let slipping = friction_coefficient(ctx.tuning.ice_friction, ctx.tuning.traction_minimum)
            .min(coefficient);
        let dynamic_bound = friction_bound(slipping, normal_reaction, ctx.tuning);
        loc.leg_velocity += (env.desired_velocity - loc.leg_velocity) * blend;
        wanted.clamp_length_max(dynamic_bound)
    };
    acc.velocity += applied;

    let platform = ctx.platform?;
    if platform.mass.hovering {
        return None;
    }
    let share = reaction_share(&profile, &platform.mass);
    (share > 0.0).then(|| PlatformReaction {
        platform: platform.entity,
        acceleration: -applied * share,
    })
}
