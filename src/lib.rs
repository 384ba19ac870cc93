#![doc = include_str!("../readme.md")]

/// Everything you need to get started with `bevy_tread`
pub mod prelude {
    pub(crate) use {
        bevy_app::prelude::*,
        bevy_derive::{Deref, DerefMut},
        bevy_ecs::prelude::*,
        bevy_math::prelude::*,
        bevy_reflect::prelude::*,
        bevy_time::prelude::*,
        bevy_transform::prelude::*,
        bevy_utils::prelude::*,
    };

    pub use crate::{
        Character, Locomotion, Orientation, Packed, TreadPlugin, TreadSystems,
        accumulator::Accumulator,
        breadcrumb::{Breadcrumb, BreadcrumbTrail},
        collision::SafePosition,
        dynamics::PlatformReactions,
        environment::Environment,
        latch::{ControlSource, Latch, LatchButtons},
        mount::{AttachedTo, Platform, Riders},
        terrain::{FlatTerrain, Terrain, TerrainMap, TileFlags, TileGrid, TileId},
        tuning::{LocomotionClock, LocomotionTuning, WorldWater},
        water::{Submersion, WaterLevel},
    };
}

use crate::prelude::*;
use bevy_ecs::{
    intern::Interned, lifecycle::HookContext, schedule::ScheduleLabel, world::DeferredWorld,
};

pub mod accumulator;
pub mod breadcrumb;
pub mod collision;
pub mod dynamics;
pub mod environment;
pub mod friction;
pub mod latch;
mod locomotion;
pub mod mass;
pub mod mount;
pub mod planner;
pub mod terrain;
pub mod tuning;
pub mod water;

/// Runs the locomotion pipeline for every [`Character`].
///
/// The map is read from the [`TerrainMap`] resource, which defaults to an endless flat floor.
pub struct TreadPlugin {
    schedule: Interned<dyn ScheduleLabel>,
}

impl TreadPlugin {
    /// Create a new plugin in the given schedule. The default is [`FixedPostUpdate`].
    pub fn new(schedule: impl ScheduleLabel) -> Self {
        Self {
            schedule: schedule.intern(),
        }
    }
}

impl Default for TreadPlugin {
    fn default() -> Self {
        Self {
            schedule: FixedPostUpdate.intern(),
        }
    }
}

impl Plugin for TreadPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LocomotionTuning>()
            .init_resource::<WorldWater>()
            .init_resource::<LocomotionClock>()
            .init_resource::<TerrainMap>()
            .init_resource::<PlatformReactions>()
            .configure_sets(
                self.schedule,
                (
                    TreadSystems::Sample,
                    TreadSystems::MoveCharacters,
                    TreadSystems::Finalize,
                    TreadSystems::FollowHosts,
                )
                    .chain(),
            )
            .add_plugins((
                water::plugin(self.schedule),
                mount::plugin(self.schedule),
                dynamics::plugin(self.schedule),
                locomotion::plugin(self.schedule),
            ));
    }
}

/// System sets used by all systems of `bevy_tread`, in execution order.
#[derive(SystemSet, Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum TreadSystems {
    /// Accumulator reset, submersion and platform detection.
    Sample,
    /// Planning, friction and platform reactions.
    MoveCharacters,
    /// Integration, collision resolution and commit.
    Finalize,
    /// Riders snap to their hosts, then transforms are written.
    FollowHosts,
}

/// Marks a character that is stored in an inventory. Packed characters are not simulated.
#[derive(Component, Clone, Copy, Reflect, Default, Debug)]
#[reflect(Component)]
pub struct Packed;

/// Per-character locomotion configuration.
#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
#[require(
    Locomotion,
    Accumulator,
    Environment,
    SafePosition,
    BreadcrumbTrail,
    Latch,
    Submersion,
    Transform
)]
#[component(on_add = Character::on_add)]
pub struct Character {
    /// Top walking speed, in units per tick.
    pub max_speed: f32,
    pub max_acceleration: f32,
    /// Share of `max_acceleration` available while sneaking.
    pub sneak_scale: f32,
    /// Velocity retention per tick in air.
    pub air_friction: f32,
    pub weight: f32,
    /// Scenery that can never be pushed.
    pub infinite_weight: bool,
    /// How much of a collision this character absorbs. Zero makes it immovable.
    pub bump_dampen: f32,
    /// Restitution against floors and walls.
    pub dampen: f32,
    /// Half-size of the square footprint tested against walls.
    pub bump_radius: f32,
    pub height: f32,
    pub jump_power: f32,
    /// Jumps available before landing again. [`Character::INFINITE_JUMPS`] never runs out.
    pub jump_charges: u8,
    /// Hover height above the fly level. Positive values make this a hovering platform.
    pub fly_height: f32,
    /// Uses the aerodynamic flight model instead of walking.
    pub flying: bool,
    pub alive: bool,
    pub is_item: bool,
    /// Tile flags this character cannot enter.
    pub stopped_by: TileFlags,
    /// Walks on top of walkable water.
    pub water_walk: bool,
    /// Leans into the slope it stands on.
    pub stick_to_ground: bool,
    /// Facing change per tick, in radians.
    pub turn_rate: f32,
    /// Lift per squared unit of vertical speed.
    pub lift: f32,
    pub max_lift: f32,
    pub yaw_damping: f32,
    /// Pitch change per tick at full latch, in radians.
    pub pitch_rate: f32,
    /// Roll change per tick at full latch, in radians.
    pub roll_rate: f32,
}

impl Default for Character {
    fn default() -> Self {
        Self {
            max_speed: 7.0,
            max_acceleration: 2.0,
            sneak_scale: 1.0 / 3.0,
            air_friction: 0.91,
            weight: 100.0,
            infinite_weight: false,
            bump_dampen: 0.5,
            dampen: 0.1,
            bump_radius: 20.0,
            height: 60.0,
            jump_power: 12.0,
            jump_charges: 1,
            fly_height: 0.0,
            flying: false,
            alive: true,
            is_item: false,
            stopped_by: TileFlags::BLOCKING,
            water_walk: false,
            stick_to_ground: false,
            turn_rate: 0.25,
            lift: 0.02,
            max_lift: 2.0,
            yaw_damping: 0.1,
            pitch_rate: 0.05,
            roll_rate: 0.05,
        }
    }
}

impl Character {
    pub const INFINITE_JUMPS: u8 = 255;

    /// An immovable prop: infinite weight, no bounce, never steers.
    pub fn scenery() -> Self {
        Self {
            infinite_weight: true,
            bump_dampen: 0.0,
            dampen: 0.0,
            is_item: true,
            ..default()
        }
    }

    /// A platform that floats `fly_height` above the floor or water surface.
    pub fn hovering(fly_height: f32) -> Self {
        Self {
            fly_height,
            ..default()
        }
    }

    pub fn with_dampen(mut self, dampen: f32) -> Self {
        self.dampen = dampen;
        self
    }

    pub fn with_air_friction(mut self, air_friction: f32) -> Self {
        self.air_friction = air_friction;
        self
    }

    pub fn with_stopped_by(mut self, stopped_by: TileFlags) -> Self {
        self.stopped_by = stopped_by;
        self
    }

    pub fn is_hovering(&self) -> bool {
        self.fly_height > 0.0
    }

    pub fn has_infinite_jumps(&self) -> bool {
        self.jump_charges == Self::INFINITE_JUMPS
    }

    pub fn on_add(mut world: DeferredWorld, ctx: HookContext) {
        let Some(translation) = world
            .get::<Transform>(ctx.entity)
            .map(|transform| transform.translation)
        else {
            return;
        };
        let Some(mut locomotion) = world.get_mut::<Locomotion>(ctx.entity) else {
            return;
        };
        if locomotion.position == Vec3::ZERO {
            locomotion.position = translation;
        }
        locomotion.previous_position = locomotion.position;
        locomotion.previous_velocity = locomotion.velocity;
        locomotion.spawn_position = locomotion.position;
    }
}

/// Facing plus the two ground tilts. Angles in radians, yaw 0 faces +X.
#[derive(Clone, Copy, Reflect, Default, Debug, PartialEq)]
pub struct Orientation {
    pub yaw: f32,
    /// Roll around the facing direction.
    pub tilt_x: f32,
    /// Pitch around the right axis.
    pub tilt_y: f32,
}

impl Orientation {
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::ZYX, self.yaw, self.tilt_y, self.tilt_x)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::X
    }

    pub fn right(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Y
    }

    pub fn up(&self) -> Vec3 {
        self.rotation() * Vec3::Z
    }
}

/// Kinematic state owned by a character. Only the pipeline writes it during a tick.
#[derive(Component, Clone, Reflect, Debug)]
#[reflect(Component)]
pub struct Locomotion {
    pub position: Vec3,
    pub velocity: Vec3,
    pub previous_position: Vec3,
    pub previous_velocity: Vec3,
    pub previous_orientation: Orientation,
    pub orientation: Orientation,
    /// Ticks left before another jump. Also drives jump traction.
    pub jump_timer: f32,
    pub jump_charges_remaining: u8,
    pub jump_ready: bool,
    /// Set when a jump leaves the ground, cleared on the next floor contact.
    pub jump_airborne: bool,
    pub is_grounded: bool,
    pub is_slipping: bool,
    pub is_sneaking: bool,
    /// Low-passed ground-relative speed for animation rates.
    pub leg_velocity: Vec3,
    pub on_platform: Option<Entity>,
    /// The host this character follows this tick. Resolved from [`AttachedTo`] while sampling;
    /// `None` when the relationship points at something that cannot carry it.
    pub host: Option<Entity>,
    pub spawn_position: Vec3,
}

impl Default for Locomotion {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            previous_position: Vec3::ZERO,
            previous_velocity: Vec3::ZERO,
            previous_orientation: Orientation::default(),
            orientation: Orientation::default(),
            jump_timer: 0.0,
            jump_charges_remaining: 1,
            jump_ready: false,
            jump_airborne: false,
            is_grounded: false,
            is_slipping: false,
            is_sneaking: false,
            leg_velocity: Vec3::ZERO,
            on_platform: None,
            host: None,
            spawn_position: Vec3::ZERO,
        }
    }
}

impl Locomotion {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            previous_position: position,
            spawn_position: position,
            ..default()
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self.previous_velocity = velocity;
        self
    }
}
