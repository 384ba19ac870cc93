use std::collections::VecDeque;

use crate::{prelude::*, terrain::Terrain};

pub const MAX_BREADCRUMBS: usize = 32;

/// A tile the character once stood on without touching a wall.
#[derive(Clone, Copy, Reflect, Debug, PartialEq)]
pub struct Breadcrumb {
    /// Center of the tile, at the height the character had.
    pub position: Vec3,
    pub tile: Option<TileId>,
    pub tick: u32,
    pub id: u32,
}

/// Recent wall-free tiles, oldest first.
#[derive(Component, Clone, Reflect, Default, Debug)]
#[reflect(Component)]
pub struct BreadcrumbTrail {
    crumbs: VecDeque<Breadcrumb>,
    next_id: u32,
}

impl BreadcrumbTrail {
    pub fn len(&self) -> usize {
        self.crumbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crumbs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breadcrumb> {
        self.crumbs.iter()
    }

    pub fn newest(&self) -> Option<&Breadcrumb> {
        self.crumbs.back()
    }

    /// Drops every crumb and restarts the id sequence.
    pub fn clear(&mut self) {
        self.crumbs.clear();
        self.next_id = 0;
    }

    /// Records `position` snapped to the center of its tile.
    ///
    /// A crumb already on that tile is replaced by the new one, which becomes the newest.
    /// When the trail is full the oldest crumb is dropped.
    pub fn record(&mut self, position: Vec3, tile: Option<TileId>, tick: u32, grid_size: f32) {
        let center = ((position.xy() / grid_size).floor() + 0.5) * grid_size;
        let position = center.extend(position.z);

        self.crumbs.retain(|crumb| crumb.position.xy() != center);
        if self.crumbs.len() >= MAX_BREADCRUMBS {
            self.crumbs.pop_front();
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.crumbs.push_back(Breadcrumb {
            position,
            tile,
            tick,
            id,
        });
    }

    /// Removes crumbs that are now inside a wall, for example after a door closed.
    pub fn prune(&mut self, terrain: &dyn Terrain, stopped_by: TileFlags) {
        if stopped_by.is_empty() {
            return;
        }
        self.crumbs.retain(|crumb| {
            !terrain
                .wall_pressure(crumb.position.xy(), 0.0, stopped_by)
                .is_blocked()
        });
    }

    /// The newest crumb that is still outside every wall.
    pub fn last_valid(&self, terrain: &dyn Terrain, stopped_by: TileFlags) -> Option<Breadcrumb> {
        self.crumbs
            .iter()
            .rev()
            .find(|crumb| {
                !terrain
                    .wall_pressure(crumb.position.xy(), 0.0, stopped_by)
                    .is_blocked()
            })
            .copied()
    }
}
