//! Floor and wall resolution for a proposed end-of-tick state.

use tracing::{debug, warn};

use crate::{
    breadcrumb::BreadcrumbTrail,
    prelude::*,
    terrain::{Terrain, WallPressure},
};

/// The last position at which the character was confirmed to be outside every wall.
#[derive(Component, Clone, Copy, Reflect, Default, Debug, PartialEq)]
#[reflect(Component)]
pub struct SafePosition {
    pub position: Vec3,
    pub valid: bool,
    pub tile: Option<TileId>,
    /// Tick of the last refresh.
    pub tick: u32,
}

impl SafePosition {
    /// The stored position, if it is still outside every wall.
    pub fn trusted(&self, terrain: &dyn Terrain, stopped_by: TileFlags) -> Option<Vec3> {
        (self.valid && !in_wall(terrain, self.position.xy(), stopped_by)).then_some(self.position)
    }
}

/// Whether the point `xy` lies inside a tile with any of `stopped_by`.
pub fn in_wall(terrain: &dyn Terrain, xy: Vec2, stopped_by: TileFlags) -> bool {
    !stopped_by.is_empty() && terrain.wall_pressure(xy, 0.0, stopped_by).is_blocked()
}

/// Bounces or sticks a state that sank below `walk_level`. Returns whether it changed anything.
pub fn resolve_mesh(
    position: &mut Vec3,
    velocity: &mut Vec3,
    walk_level: f32,
    restitution: f32,
    stop_bouncing: f32,
) -> bool {
    if position.z >= walk_level {
        return false;
    }
    if velocity.z >= 0.0 {
        // already leaving the floor
        position.z = walk_level;
        return true;
    }

    let reflected = -velocity.z * restitution;
    if reflected.abs() < stop_bouncing {
        velocity.z = 0.0;
        position.z = walk_level;
    } else {
        velocity.z = reflected;
        position.z = walk_level + (walk_level - position.z);
    }
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WallContact {
    Free,
    /// Pushed out along a normal.
    Pushed,
    /// No way out was found, so the character was moved to a known good spot.
    Snapped,
}

/// How a character touches the tile layer.
#[derive(Clone, Copy)]
pub struct WallProbe<'a> {
    pub terrain: &'a dyn Terrain,
    pub radius: f32,
    pub stopped_by: TileFlags,
    pub restitution: f32,
    /// Longest push-out in a single tick.
    pub max_push: f32,
}

/// Where the character has been, for recovering a way out of a wall.
#[derive(Clone, Copy)]
pub struct WallHistory<'a> {
    /// Tick-start position.
    pub previous: Vec3,
    pub safe: &'a SafePosition,
    pub trail: &'a BreadcrumbTrail,
    pub spawn: Vec3,
}

impl WallProbe<'_> {
    fn pressure(&self, xy: Vec2) -> WallPressure {
        self.terrain.wall_pressure(xy, self.radius, self.stopped_by)
    }

    fn is_free(&self, xy: Vec2) -> bool {
        !in_wall(self.terrain, xy, self.stopped_by)
    }

    /// Direction out of the wall, from the most to the least reliable source.
    fn escape_normal(
        &self,
        xy: Vec2,
        hit: &WallPressure,
        velocity: Vec3,
        history: &WallHistory,
    ) -> Option<Vec2> {
        if hit.normal != Vec2::ZERO {
            return Some(hit.normal.normalize_or_zero());
        }
        let toward = |target: Vec2| (target - xy).try_normalize();
        history
            .safe
            .trusted(self.terrain, self.stopped_by)
            .and_then(|safe| toward(safe.xy()))
            .or_else(|| {
                history
                    .trail
                    .last_valid(self.terrain, self.stopped_by)
                    .and_then(|crumb| toward(crumb.position.xy()))
            })
            .or_else(|| (-velocity.xy()).try_normalize())
    }

    /// A known good spot for when nothing better is available.
    fn fallback(&self, history: &WallHistory) -> Vec3 {
        history
            .safe
            .trusted(self.terrain, self.stopped_by)
            .unwrap_or(history.spawn)
    }
}

/// Pushes a proposed state out of the tiles the character cannot enter.
pub fn resolve_grid(
    probe: &WallProbe,
    history: &WallHistory,
    position: &mut Vec3,
    velocity: &mut Vec3,
) -> WallContact {
    if probe.stopped_by.is_empty() {
        return WallContact::Free;
    }
    let xy = position.xy();
    let hit = probe.pressure(xy);
    if !hit.is_blocked() {
        return WallContact::Free;
    }

    let Some(normal) = probe.escape_normal(xy, &hit, *velocity, history) else {
        let fallback = probe.fallback(history);
        warn!(
            "no way out of the wall at {xy}, snapping to {}",
            fallback.xy()
        );
        *position = fallback.xy().extend(position.z);
        *velocity = Vec3::new(0.0, 0.0, velocity.z);
        return WallContact::Snapped;
    };

    // only the part of the last move that went into the wall is undone
    let displacement = xy - history.previous.xy();
    let intrusion = (-displacement.dot(normal)).max(0.0);
    let push = intrusion
        .max(hit.pressure * probe.radius)
        .max(1.0)
        .min(probe.max_push.max(0.0));
    let candidate = xy + normal * push;
    if probe.pressure(candidate).pressure < hit.pressure {
        position.x = candidate.x;
        position.y = candidate.y;
    }

    let into = velocity.xy().dot(normal);
    if into < 0.0 {
        let reflected = velocity.xy() - normal * into * (1.0 + probe.restitution);
        velocity.x = reflected.x;
        velocity.y = reflected.y;
    }

    if !probe.is_free(position.xy()) {
        let previous = history.previous.xy();
        let refuge = if probe.is_free(previous) {
            previous
        } else {
            probe.fallback(history).xy()
        };
        debug!("push-out left {} inside a wall, falling back to {refuge}", position.xy());
        position.x = refuge.x;
        position.y = refuge.y;
    }

    WallContact::Pushed
}

/// Refreshes the safe position, returning whether a new one was stored.
///
/// Without `force`, a refresh only happens after moving to another tile, or more than a tile
/// away while off the map, or when no safe position exists yet.
pub fn update_safe(
    terrain: &dyn Terrain,
    position: Vec3,
    stopped_by: TileFlags,
    safe: &mut SafePosition,
    trail: &mut BreadcrumbTrail,
    tick: u32,
    force: bool,
    grid_size: f32,
) -> bool {
    let tile = terrain.tile_id(position.xy());
    let needs_update = force
        || !safe.valid
        || match tile {
            Some(_) => tile != safe.tile,
            None => (position.xy() - safe.position.xy())
                .abs()
                .cmpgt(Vec2::splat(grid_size))
                .any(),
        };
    if !needs_update || in_wall(terrain, position.xy(), stopped_by) {
        return false;
    }

    *safe = SafePosition {
        position,
        valid: true,
        tile,
        tick,
    };
    trail.prune(terrain, stopped_by);
    trail.record(position, tile, tick, grid_size);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TileGrid;

    #[test]
    fn bounce_above_threshold() {
        let mut position = Vec3::new(0.0, 0.0, -0.5);
        let mut velocity = Vec3::new(0.0, 0.0, -5.0);
        assert!(resolve_mesh(&mut position, &mut velocity, 0.0, 0.5, 1.0));
        assert_eq!(velocity.z, 2.5);
        assert_eq!(position.z, 0.5);
    }

    #[test]
    fn stick_below_threshold() {
        let mut position = Vec3::new(0.0, 0.0, -0.5);
        let mut velocity = Vec3::new(0.0, 0.0, -5.0);
        assert!(resolve_mesh(&mut position, &mut velocity, 0.0, 0.05, 1.0));
        assert_eq!(velocity.z, 0.0);
        assert_eq!(position.z, 0.0);
    }

    #[test]
    fn above_floor_is_untouched() {
        let mut position = Vec3::new(0.0, 0.0, 9.5);
        let mut velocity = Vec3::new(0.0, 0.0, -5.0);
        assert!(!resolve_mesh(&mut position, &mut velocity, 0.0, 0.5, 1.0));
        assert_eq!(velocity.z, -5.0);
    }

    fn grid() -> TileGrid {
        TileGrid::new(8, 8, 128.0)
            .with_border(TileFlags::IMPASS)
            .with_flags(4, 3, TileFlags::WALL)
    }

    fn probe(grid: &TileGrid) -> WallProbe<'_> {
        WallProbe {
            terrain: grid,
            radius: 0.0,
            stopped_by: TileFlags::BLOCKING,
            restitution: 0.5,
            max_push: 32.0,
        }
    }

    #[test]
    fn push_out_along_pressure_normal() {
        let grid = grid();
        let (safe, trail) = (SafePosition::default(), BreadcrumbTrail::default());
        let history = WallHistory {
            previous: Vec3::new(500.0, 448.0, 0.0),
            safe: &safe,
            trail: &trail,
            spawn: Vec3::new(300.0, 300.0, 0.0),
        };
        let mut position = Vec3::new(520.0, 448.0, 0.0);
        let mut velocity = Vec3::new(20.0, 3.0, 0.0);
        let contact = resolve_grid(&probe(&grid), &history, &mut position, &mut velocity);

        assert_eq!(contact, WallContact::Pushed);
        assert!(!in_wall(&grid, position.xy(), TileFlags::BLOCKING));
        assert!((velocity.x + 10.0).abs() < 1e-5, "normal speed reflected with restitution");
        assert_eq!(velocity.y, 3.0);
    }

    #[test]
    fn dead_center_uses_safe_position() {
        let grid = grid();
        let wall = grid.tile_center(4, 3);
        let safe = SafePosition {
            position: grid.tile_center(2, 3).extend(0.0),
            valid: true,
            ..default()
        };
        let trail = BreadcrumbTrail::default();
        let history = WallHistory {
            previous: wall.extend(0.0),
            safe: &safe,
            trail: &trail,
            spawn: Vec3::ZERO,
        };
        let mut position = wall.extend(0.0);
        let mut velocity = Vec3::ZERO;
        let contact = resolve_grid(&probe(&grid), &history, &mut position, &mut velocity);
        assert_eq!(contact, WallContact::Pushed);
        // still inside after one capped push, so the safe position takes over
        assert_eq!(position.xy(), safe.position.xy());
    }

    #[test]
    fn no_normal_snaps_to_spawn() {
        let grid = grid();
        let wall = grid.tile_center(4, 3);
        let (safe, trail) = (SafePosition::default(), BreadcrumbTrail::default());
        let spawn = grid.tile_center(1, 1).extend(0.0);
        let history = WallHistory {
            previous: wall.extend(0.0),
            safe: &safe,
            trail: &trail,
            spawn,
        };
        let mut position = wall.extend(7.0);
        let mut velocity = Vec3::new(0.0, 0.0, -1.0);
        let contact = resolve_grid(&probe(&grid), &history, &mut position, &mut velocity);
        assert_eq!(contact, WallContact::Snapped);
        assert_eq!(position, spawn.xy().extend(7.0));
        assert_eq!(velocity, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn breadcrumb_beats_velocity() {
        let grid = grid();
        let wall = grid.tile_center(4, 3);
        let safe = SafePosition::default();
        let mut trail = BreadcrumbTrail::default();
        trail.record(grid.tile_center(4, 4).extend(0.0), None, 0, 128.0);
        let history = WallHistory {
            previous: wall.extend(0.0),
            safe: &safe,
            trail: &trail,
            spawn: Vec3::ZERO,
        };
        let p = probe(&grid);
        let hit = p.pressure(wall);
        let normal = p.escape_normal(wall, &hit, Vec3::new(5.0, 0.0, 0.0), &history);
        assert_eq!(normal, Some(Vec2::Y));
    }

    #[test]
    fn safe_position_beats_breadcrumb() {
        let grid = grid();
        let wall = grid.tile_center(4, 3);
        let safe = SafePosition {
            position: grid.tile_center(2, 3).extend(0.0),
            valid: true,
            ..default()
        };
        let mut trail = BreadcrumbTrail::default();
        trail.record(grid.tile_center(4, 4).extend(0.0), None, 0, 128.0);
        let history = WallHistory {
            previous: wall.extend(0.0),
            safe: &safe,
            trail: &trail,
            spawn: Vec3::ZERO,
        };
        let p = probe(&grid);
        let hit = p.pressure(wall);
        let normal = p.escape_normal(wall, &hit, Vec3::new(0.0, 5.0, 0.0), &history);
        assert_eq!(normal, Some(Vec2::NEG_X));
    }

    #[test]
    fn velocity_is_the_last_resort() {
        let grid = grid();
        let wall = grid.tile_center(4, 3);
        let (safe, trail) = (SafePosition::default(), BreadcrumbTrail::default());
        let history = WallHistory {
            previous: wall.extend(0.0),
            safe: &safe,
            trail: &trail,
            spawn: Vec3::ZERO,
        };
        let p = probe(&grid);
        let hit = p.pressure(wall);
        let normal = p.escape_normal(wall, &hit, Vec3::new(5.0, 0.0, 0.0), &history);
        assert_eq!(normal, Some(Vec2::NEG_X));
    }

    #[test]
    fn push_that_raises_pressure_is_rolled_back() {
        // a corridor narrower than the footprint: any push grinds into one of the walls
        let mut corridor = TileGrid::new(3, 5, 32.0);
        for iy in 0..5 {
            corridor = corridor
                .with_flags(0, iy, TileFlags::WALL)
                .with_flags(2, iy, TileFlags::WALL);
        }
        let probe = WallProbe {
            radius: 20.0,
            max_push: 100.0,
            ..probe(&corridor)
        };
        let start = Vec3::new(46.0, 80.0, 0.0);
        let (safe, trail) = (SafePosition::default(), BreadcrumbTrail::default());
        let history = WallHistory {
            previous: start,
            safe: &safe,
            trail: &trail,
            spawn: Vec3::ZERO,
        };
        let before = probe.pressure(start.xy());
        assert!(before.is_blocked());
        assert_ne!(before.normal, Vec2::ZERO);

        let mut position = start;
        let mut velocity = Vec3::ZERO;
        let contact = resolve_grid(&probe, &history, &mut position, &mut velocity);
        assert_eq!(contact, WallContact::Pushed);
        assert_eq!(position, start);
    }

    fn refresh(
        grid: &TileGrid,
        position: Vec3,
        safe: &mut SafePosition,
        trail: &mut BreadcrumbTrail,
        tick: u32,
        force: bool,
    ) -> bool {
        update_safe(grid, position, TileFlags::BLOCKING, safe, trail, tick, force, 128.0)
    }

    #[test]
    fn safe_refresh_rules() {
        let grid = grid();
        let mut safe = SafePosition::default();
        let mut trail = BreadcrumbTrail::default();
        let first = grid.tile_center(2, 2).extend(0.0);

        assert!(refresh(&grid, first, &mut safe, &mut trail, 1, false));
        assert_eq!(safe.position, first);
        assert_eq!(trail.len(), 1);

        // same tile, not forced
        let nudge = first + Vec3::X * 10.0;
        assert!(!refresh(&grid, nudge, &mut safe, &mut trail, 2, false));
        assert!(refresh(&grid, nudge, &mut safe, &mut trail, 2, true));
        assert_eq!(safe.tick, 2);

        // never inside a wall, even when forced
        let wall = grid.tile_center(4, 3).extend(0.0);
        assert!(!refresh(&grid, wall, &mut safe, &mut trail, 3, true));
        assert_eq!(safe.position, nudge);
    }
}
