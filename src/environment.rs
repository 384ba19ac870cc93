//! Per-tick snapshot of the terrain, water and platform around a character.

use crate::{
    mass::MassProfile,
    prelude::*,
    terrain::{TWIST_FLAT, Terrain, twist_normal},
};

/// A character counts as grounded while its walk lerp stays below this.
pub const GROUNDED_LERP: f32 = 0.25;

/// What a character is standing in and on. Rebuilt from scratch every tick.
#[derive(Component, Clone, Copy, Reflect, Debug, PartialEq)]
#[reflect(Component)]
pub struct Environment {
    pub tile: Option<TileId>,
    pub floor_level: f32,
    /// Floor height with walkable water raising it.
    pub water_level: f32,
    /// Where a grounded character rests: the platform top or the water-adjusted floor.
    pub walk_level: f32,
    pub fly_level: f32,
    pub grid_lerp: f32,
    pub walk_lerp: f32,
    pub fly_lerp: f32,
    pub normal: Vec3,
    pub twist: u8,
    pub is_watery: bool,
    pub is_slippy: bool,
    pub fluid_friction_horizontal: f32,
    pub fluid_friction_vertical: f32,
    pub ground_friction: f32,
    pub ground_velocity: Vec3,
    pub traction: f32,
    pub grounded: bool,
    pub desired_velocity: Vec3,
    pub desired_acceleration: Vec3,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            tile: None,
            floor_level: 0.0,
            water_level: 0.0,
            walk_level: 0.0,
            fly_level: 0.0,
            grid_lerp: 1.0,
            walk_lerp: 1.0,
            fly_lerp: 1.0,
            normal: Vec3::Z,
            twist: TWIST_FLAT,
            is_watery: false,
            is_slippy: false,
            fluid_friction_horizontal: 1.0,
            fluid_friction_vertical: 1.0,
            ground_friction: 1.0,
            ground_velocity: Vec3::ZERO,
            traction: 1.0,
            grounded: false,
            desired_velocity: Vec3::ZERO,
            desired_acceleration: Vec3::ZERO,
        }
    }
}

/// The platform a character stands on, copied out before anything moves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlatformSample {
    pub entity: Entity,
    pub position: Vec3,
    /// Height of the standing surface.
    pub top: f32,
    pub up: Vec3,
    pub velocity: Vec3,
    pub mass: MassProfile,
}

/// `clip((z - level) / tolerance, 0, 1)`
pub fn level_lerp(z: f32, level: f32, tolerance: f32) -> f32 {
    if tolerance <= 0.0 {
        return if z > level { 1.0 } else { 0.0 };
    }
    ((z - level) / tolerance).clamp(0.0, 1.0)
}

pub fn sample_environment(
    terrain: &dyn Terrain,
    cfg: &Character,
    loc: &Locomotion,
    platform: Option<&PlatformSample>,
    submerged: bool,
    water: &WorldWater,
    tuning: &LocomotionTuning,
) -> Environment {
    // one level only: the tile is looked up under the platform, never under its own platform
    let probe = platform.map_or(loc.position, |p| p.position).xy();
    let tile = terrain.tile_id(probe);
    let z = loc.position.z;

    let floor_level = terrain.floor_height(loc.position.xy(), false);
    let water_level = terrain.floor_height(loc.position.xy(), true);
    let tile_is_water = tile.is_some_and(|t| terrain.tile_has_flag(t, TileFlags::WATER));
    let walk_level = match platform {
        Some(platform) => platform.top,
        None if cfg.water_walk && water.is_water && tile_is_water => {
            water_level.max(water.surface_level)
        }
        None => water_level,
    };

    let fly_level = if water.is_water && tile_is_water {
        walk_level.max(water.surface_level)
    } else {
        walk_level
    }
    .max(0.0);

    let tolerance = tuning.platform_tolerance;
    let grid_lerp = level_lerp(z, floor_level, tolerance);
    let walk_lerp = level_lerp(z, walk_level, tolerance);
    let fly_lerp = level_lerp(z, fly_level, tolerance);
    let grounded = !cfg.flying && walk_lerp < GROUNDED_LERP;

    let (normal, twist) = match (platform, tile) {
        (Some(platform), _) => (platform.up.normalize_or(Vec3::Z), TWIST_FLAT),
        (None, Some(tile)) => {
            let slope = terrain.tile_normal(tile);
            (twist_normal(slope.twist), slope.twist)
        }
        (None, None) => (Vec3::Z, TWIST_FLAT),
    };

    let is_watery = water.is_water && submerged;
    let is_slippy = platform.is_none()
        && !is_watery
        && tile.is_some_and(|t| terrain.tile_has_flag(t, TileFlags::SLIPPY));

    let (fluid_friction_horizontal, fluid_friction_vertical) = if is_watery {
        (tuning.water_friction, tuning.water_friction)
    } else {
        (cfg.air_friction, cfg.air_friction)
    };

    let (ground_friction, ground_velocity) = match platform {
        Some(platform) => (tuning.platform_stick, platform.velocity),
        None if is_slippy => (tuning.slippy_friction, Vec3::ZERO),
        None => (tuning.noslip_friction, Vec3::ZERO),
    };

    let mut traction = normal.z.abs() * (1.0 - walk_lerp) + 0.25 * walk_lerp;
    if is_slippy {
        let slide = tuning.hillslide * (1.0 - walk_lerp) + walk_lerp;
        if slide > 0.0 {
            traction /= slide;
        }
    }

    Environment {
        tile,
        floor_level,
        water_level,
        walk_level,
        fly_level,
        grid_lerp,
        walk_lerp,
        fly_lerp,
        normal,
        twist,
        is_watery,
        is_slippy,
        fluid_friction_horizontal,
        fluid_friction_vertical,
        ground_friction,
        ground_velocity,
        traction,
        grounded,
        desired_velocity: Vec3::ZERO,
        desired_acceleration: Vec3::ZERO,
    }
}

/// Refreshes `jump_ready` and restores jump charges for the new environment.
pub fn update_jump_readiness(
    cfg: &Character,
    loc: &mut Locomotion,
    env: &Environment,
    mounted: bool,
) {
    let mid_jump = loc.jump_timer > 0.0;
    if cfg.flying {
        loc.jump_ready = false;
    } else if mounted {
        loc.jump_ready = true;
        if !mid_jump {
            loc.jump_charges_remaining = cfg.jump_charges;
        }
    } else {
        loc.jump_ready = env.grounded;
        let sliding_down = env.is_slippy && env.twist != TWIST_FLAT;
        if env.grounded && !mid_jump && !sliding_down {
            loc.jump_charges_remaining = cfg.jump_charges;
        }
    }
}
