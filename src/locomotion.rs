use bevy_ecs::{entity::EntityHashMap, intern::Interned, schedule::ScheduleLabel};
use tracing::debug;

use crate::{
    accumulator::{Accumulator, integrate, validate_velocity},
    breadcrumb::BreadcrumbTrail,
    collision::{
        SafePosition, WallContact, WallHistory, WallProbe, resolve_grid, resolve_mesh,
        update_safe,
    },
    environment::{Environment, PlatformSample, sample_environment, update_jump_readiness},
    friction::{
        apply_floor_friction, apply_fluid_friction, apply_gravity, apply_jump_traction,
        apply_platform_ride,
    },
    latch::Latch,
    mass::MassProfile,
    mount::{AttachedTo, follow_hosts},
    planner::{
        JumpOutcome, apply_voluntary, conform_to_ground, handle_jump, plan_flight, plan_walk,
        turn_toward_travel,
    },
    prelude::*,
    water::Submersion,
};

pub(super) fn plugin(schedule: Interned<dyn ScheduleLabel>) -> impl Fn(&mut App) {
    move |app: &mut App| {
        app.add_systems(
            schedule,
            (
                clear_accumulators.in_set(TreadSystems::Sample),
                move_characters.in_set(TreadSystems::MoveCharacters),
                finalize_characters.in_set(TreadSystems::Finalize),
                sync_transforms
                    .in_set(TreadSystems::FollowHosts)
                    .after(follow_hosts),
            ),
        );
    }
}

/// Everything a single character's steps read but never write.
#[derive(Clone, Copy)]
pub(crate) struct Ctx<'a> {
    pub(crate) cfg: &'a Character,
    pub(crate) tuning: &'a LocomotionTuning,
    pub(crate) latch: Latch,
    /// Tick length in ticks, normally 1.
    pub(crate) dt: f32,
    pub(crate) platform: Option<PlatformSample>,
}

pub(crate) fn clear_accumulators(
    mut accumulators: Query<&mut Accumulator, Without<Packed>>,
    mut reactions: ResMut<PlatformReactions>,
    mut clock: ResMut<LocomotionClock>,
) {
    clock.0 = clock.0.wrapping_add(1);
    reactions.clear();
    for mut acc in &mut accumulators {
        acc.clear();
    }
}

pub(crate) fn move_characters(
    mut commands: Commands,
    mut kccs: Query<
        (
            Entity,
            &Character,
            &mut Locomotion,
            &mut Accumulator,
            &mut Environment,
            &Latch,
            &Submersion,
        ),
        Without<Packed>,
    >,
    terrain: Res<TerrainMap>,
    water: Res<WorldWater>,
    tuning: Res<LocomotionTuning>,
    mut reactions: ResMut<PlatformReactions>,
    time: Res<Time>,
) {
    let dt = tuning.ticks(time.delta_secs());
    let terrain = terrain.get();

    // platforms as they were at the start of the tick
    let snapshots = kccs
        .iter()
        .map(|(entity, cfg, loc, ..)| {
            let sample = PlatformSample {
                entity,
                position: loc.position,
                top: loc.position.z + cfg.height,
                up: loc.orientation.up(),
                velocity: loc.velocity,
                mass: MassProfile::from(cfg),
            };
            (entity, sample)
        })
        .collect::<EntityHashMap<_>>();

    for (entity, cfg, mut loc, mut acc, mut env, latch, submersion) in &mut kccs {
        let mounted = loc.host.is_some();
        let platform = loc.on_platform.and_then(|platform| {
            let sample = snapshots.get(&platform).copied();
            if sample.is_none() {
                debug!("{entity} stands on {platform}, which is gone");
            }
            sample
        });

        let ctx = Ctx {
            cfg,
            tuning: &tuning,
            latch: *latch,
            dt,
            platform,
        };

        loc.previous_orientation = loc.orientation;
        loc.jump_timer = (loc.jump_timer - dt).max(0.0);

        *env = sample_environment(
            terrain,
            cfg,
            &loc,
            platform.as_ref(),
            submersion.is_submerged(),
            &water,
            &tuning,
        );
        update_jump_readiness(cfg, &mut loc, &env, mounted);

        if mounted {
            // riders only get to leave, the follow pass moves them
            if handle_jump(&mut loc, &env, &ctx, true) == JumpOutcome::Dismounted {
                loc.host = None;
                commands.entity(entity).remove::<AttachedTo>();
            }
            continue;
        }

        // drag goes in first so the walk plan can account for it
        apply_fluid_friction(&loc, &env, &mut acc, &ctx);

        if cfg.flying {
            plan_flight(&mut loc, &mut env, &ctx);
        } else {
            plan_walk(&mut loc, &mut env, &acc, &ctx);
            handle_jump(&mut loc, &env, &ctx, false);
            turn_toward_travel(&mut loc, &env, &ctx);
            conform_to_ground(&mut loc, &env, &ctx);
        }

        apply_voluntary(&env, &mut acc, &ctx);
        apply_gravity(&loc, &env, &mut acc, &ctx);
        apply_jump_traction(&loc, &env, &mut acc, &ctx);
        apply_platform_ride(&loc, &env, &mut acc, &ctx);
        if let Some(reaction) = apply_floor_friction(&mut loc, &env, &mut acc, &ctx) {
            reactions.push(reaction);
        }
    }
}

pub(crate) fn finalize_characters(
    mut kccs: Query<
        (
            Entity,
            &Character,
            &mut Locomotion,
            &mut Accumulator,
            &Environment,
            &mut SafePosition,
            &mut BreadcrumbTrail,
        ),
        Without<Packed>,
    >,
    terrain: Res<TerrainMap>,
    tuning: Res<LocomotionTuning>,
    clock: Res<LocomotionClock>,
    time: Res<Time>,
) {
    let dt = tuning.ticks(time.delta_secs());
    let terrain = terrain.get();

    for (entity, cfg, mut loc, mut acc, env, mut safe, mut trail) in &mut kccs {
        if loc.host.is_some() {
            continue;
        }
        let (mut position, mut velocity) = integrate(loc.position, loc.velocity, &acc, dt);

        let (test_position, test_velocity) = (position, velocity);
        if resolve_mesh(
            &mut position,
            &mut velocity,
            env.walk_level,
            cfg.dampen,
            tuning.stop_bouncing,
        ) {
            loc.jump_airborne = false;
            acc.absorb(position - test_position, velocity - test_velocity, dt);
            (position, velocity) = integrate(loc.position, loc.velocity, &acc, dt);
        }

        let probe = WallProbe {
            terrain,
            radius: cfg.bump_radius,
            stopped_by: cfg.stopped_by,
            restitution: cfg.dampen,
            max_push: tuning.wall_push_fraction * tuning.grid_size,
        };
        let history = WallHistory {
            previous: loc.position,
            safe: &safe,
            trail: &trail,
            spawn: loc.spawn_position,
        };
        let (test_position, test_velocity) = (position, velocity);
        let bumped =
            resolve_grid(&probe, &history, &mut position, &mut velocity) != WallContact::Free;
        if bumped {
            acc.absorb(position - test_position, velocity - test_velocity, dt);
            (position, velocity) = integrate(loc.position, loc.velocity, &acc, dt);
        }

        validate_velocity(&mut velocity, tuning.max_velocity);
        if !cfg.is_hovering() {
            // nothing falls out of the world
            position.z = position.z.max(0.0);
        }

        loc.previous_position = loc.position;
        loc.previous_velocity = loc.velocity;
        loc.position = position;
        loc.velocity = velocity;
        loc.is_grounded = env.grounded;

        let cadence =
            (entity.to_bits() as u32).wrapping_add(clock.0) & tuning.safe_refresh_mask == 0;
        update_safe(
            terrain,
            position,
            cfg.stopped_by,
            &mut safe,
            &mut trail,
            clock.0,
            bumped || cadence,
            tuning.grid_size,
        );
    }
}

fn sync_transforms(
    mut kccs: Query<(&Locomotion, &mut Transform), (With<Character>, Without<Packed>)>,
) {
    for (loc, mut transform) in &mut kccs {
        transform.translation = loc.position;
        transform.rotation = loc.orientation.rotation();
    }
}
