//! Riders, held items and the platforms characters stand on.

use bevy_ecs::{intern::Interned, schedule::ScheduleLabel};
use tracing::debug;

use crate::{environment::GROUNDED_LERP, prelude::*, water::update_submersion};

pub(super) fn plugin(schedule: Interned<dyn ScheduleLabel>) -> impl Fn(&mut App) {
    move |app: &mut App| {
        app.add_systems(
            schedule,
            (
                detect_platforms
                    .in_set(TreadSystems::Sample)
                    .after(update_submersion),
                follow_hosts.in_set(TreadSystems::FollowHosts),
            ),
        );
    }
}

/// Carries this character along with a host: a mount for riders, a holder for items.
///
/// Removed automatically when the host is despawned.
#[derive(Component, Clone, Copy, Debug)]
#[relationship(relationship_target = Riders)]
pub struct AttachedTo(pub Entity);

#[derive(Component, Clone, Debug)]
#[relationship_target(relationship = AttachedTo)]
pub struct Riders(Vec<Entity>);

impl Riders {
    pub fn get(&self) -> &[Entity] {
        &self.0
    }
}

/// A character others can stand on.
#[derive(Component, Clone, Copy, Reflect, Default, Debug)]
#[reflect(Component)]
#[require(Character)]
pub struct Platform;

/// Resolves every character's host, then finds the platform under every free character.
///
/// A host must be a processed character that is not itself attached. Anything else leaves the
/// rider unattached for the tick. Only one platform level is resolved: a character on a platform
/// that itself rides a platform sees just the first one.
pub(crate) fn detect_platforms(
    mut kccs: Query<
        (Entity, &mut Locomotion, Option<&AttachedTo>),
        (With<Character>, Without<Packed>),
    >,
    platforms: Query<(Entity, &Character), (With<Platform>, Without<Packed>)>,
    hosts: Query<(), (With<Character>, Without<Packed>, Without<AttachedTo>)>,
    tuning: Res<LocomotionTuning>,
) {
    let tops = platforms
        .iter()
        .filter_map(|(entity, cfg)| {
            let (_, loc, _) = kccs.get(entity).ok()?;
            Some((entity, loc.position, loc.position.z + cfg.height, cfg.bump_radius))
        })
        .collect::<Vec<_>>();

    let below = tuning.platform_tolerance * GROUNDED_LERP;
    for (entity, mut loc, attached_to) in &mut kccs {
        loc.host = attached_to.map(|host| host.0).filter(|&host| {
            let valid = host != entity && hosts.contains(host);
            if !valid {
                debug!("{entity} is attached to {host}, which cannot carry it; moving it freely");
            }
            valid
        });
        if loc.host.is_some() {
            loc.on_platform = None;
            continue;
        }
        let feet = loc.position;
        loc.on_platform = tops
            .iter()
            .filter(|(platform, position, top, radius)| {
                *platform != entity
                    && (feet.x - position.x).abs() <= *radius
                    && (feet.y - position.y).abs() <= *radius
                    && feet.z >= top - below
                    && feet.z <= top + tuning.platform_tolerance
            })
            .max_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(platform, ..)| *platform);
    }
}

/// Moves every mounted character onto its host's committed position.
pub(crate) fn follow_hosts(
    mut riders: Query<(Entity, &mut Locomotion), (With<AttachedTo>, Without<Packed>)>,
    hosts: Query<(&Locomotion, &Character), Without<AttachedTo>>,
) {
    for (rider, mut loc) in riders.iter_mut() {
        let Some(host_entity) = loc.host else {
            continue;
        };
        let Ok((host, host_cfg)) = hosts.get(host_entity) else {
            debug!("{rider} lost its host {host_entity} during the tick");
            continue;
        };
        loc.previous_position = loc.position;
        loc.previous_velocity = loc.velocity;
        loc.position = host.position + Vec3::Z * host_cfg.height;
        loc.velocity = host.velocity;
        loc.orientation.yaw = host.orientation.yaw;
        loc.on_platform = None;
        loc.is_grounded = false;
    }
}
