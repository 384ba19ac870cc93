use bevy_ecs::{intern::Interned, schedule::ScheduleLabel};

use crate::{locomotion::clear_accumulators, prelude::*};

/// How deep a character stands in the world's water.
#[derive(Component, Default, Copy, Reflect, Clone, Debug)]
#[reflect(Component)]
pub struct Submersion {
    pub level: WaterLevel,
    /// Distance from the feet up to the surface.
    pub depth: f32,
}

impl Submersion {
    pub fn is_submerged(&self) -> bool {
        self.level >= WaterLevel::Touching
    }
}

#[derive(Default, Copy, Reflect, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WaterLevel {
    #[default]
    None,
    Touching,
    Center,
}

pub(super) fn plugin(schedule: Interned<dyn ScheduleLabel>) -> impl Fn(&mut App) {
    move |app: &mut App| {
        app.add_systems(
            schedule,
            update_submersion
                .in_set(TreadSystems::Sample)
                .after(clear_accumulators),
        );
    }
}

pub(crate) fn update_submersion(
    mut objects: Query<(&Character, &Locomotion, &mut Submersion), Without<Packed>>,
    terrain: Res<TerrainMap>,
    water: Res<WorldWater>,
) {
    let terrain = terrain.get();
    for (cfg, loc, mut submersion) in &mut objects {
        *submersion = Submersion::default();
        if !water.is_water {
            continue;
        }
        let Some(tile) = terrain.tile_id(loc.position.xy()) else {
            continue;
        };
        if !terrain.tile_has_flag(tile, TileFlags::WATER) {
            continue;
        }

        let feet = loc.position.z;
        let waist = feet + cfg.height * 0.5;
        submersion.level = if waist < water.surface_level {
            WaterLevel::Center
        } else if feet < water.surface_level {
            WaterLevel::Touching
        } else {
            WaterLevel::None
        };
        submersion.depth = (water.surface_level - feet).max(0.0);
    }
}
