//! The terrain query surface the pipeline consumes, plus two implementations:
//! [`FlatTerrain`] (the fallback when no map is loaded) and [`TileGrid`], a
//! small reference tile map.

use core::ops::{BitOr, BitOrAssign};
use std::sync::{Arc, LazyLock};

use crate::prelude::*;

/// Index of a tile in a terrain.
#[derive(Clone, Copy, Reflect, Debug, PartialEq, Eq, Hash)]
pub struct TileId(pub u32);

/// Per-tile effect bits.
#[derive(Clone, Copy, Reflect, Debug, Default, PartialEq, Eq, Hash)]
pub struct TileFlags(u8);

impl TileFlags {
    pub const NONE: Self = Self(0);
    /// Water is rendered above this tile and it can hold a water surface.
    pub const WATER: Self = Self(1 << 3);
    /// Passable by ghosts and particles only.
    pub const WALL: Self = Self(1 << 4);
    pub const IMPASS: Self = Self(1 << 5);
    pub const DAMAGE: Self = Self(1 << 6);
    /// Ice and other low-friction floors.
    pub const SLIPPY: Self = Self(1 << 7);
    pub const BLOCKING: Self = Self(Self::WALL.0 | Self::IMPASS.0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for TileFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TileFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Twist id of a level tile.
pub const TWIST_FLAT: u8 = 0x77;
const TWIST_STEP: f32 = 0.125;

/// Slope of a tile, as height gained per unit of horizontal travel.
#[derive(Clone, Copy, Reflect, Debug, PartialEq)]
pub struct TileSlope {
    pub slope: Vec2,
    /// Quantized slope id, see [`encode_twist`].
    pub twist: u8,
}

impl Default for TileSlope {
    fn default() -> Self {
        Self {
            slope: Vec2::ZERO,
            twist: TWIST_FLAT,
        }
    }
}

impl TileSlope {
    pub fn from_slope(slope: Vec2) -> Self {
        let twist = encode_twist(slope);
        Self {
            slope: twist_slope(twist),
            twist,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.twist == TWIST_FLAT
    }
}

/// Quantizes a slope into 16 steps per axis, flat at 7.
pub fn encode_twist(slope: Vec2) -> u8 {
    let quantize = |s: f32| ((s / TWIST_STEP).round() + 7.0).clamp(0.0, 15.0) as u8;
    (quantize(slope.x) << 4) | quantize(slope.y)
}

pub fn twist_slope(twist: u8) -> Vec2 {
    let decode = |i: u8| (i as f32 - 7.0) * TWIST_STEP;
    Vec2::new(decode(twist >> 4), decode(twist & 0x0F))
}

static TWIST_NORMALS: LazyLock<[Vec3; 256]> = LazyLock::new(|| {
    core::array::from_fn(|twist| {
        let slope = twist_slope(twist as u8);
        Vec3::new(-slope.x, -slope.y, 1.0).normalize()
    })
});

/// Surface normal for a twist id, from the precomputed table.
pub fn twist_normal(twist: u8) -> Vec3 {
    TWIST_NORMALS[twist as usize]
}

/// How deep a footprint sits inside blocking tiles and which way is out.
#[derive(Clone, Copy, Reflect, Debug, Default, PartialEq)]
pub struct WallPressure {
    /// Sum of the overlapped blocked area ratios. Zero means free.
    pub pressure: f32,
    /// Unit-ish push direction away from the blocked tiles, or zero when the
    /// contributions cancel out.
    pub normal: Vec2,
}

impl WallPressure {
    pub fn is_blocked(&self) -> bool {
        self.pressure > 0.0
    }
}

/// Read-only terrain queries used by the locomotion pipeline.
pub trait Terrain: Send + Sync + 'static {
    /// Height of the floor at `xy`. With `include_water`, walkable water raises the result.
    fn floor_height(&self, xy: Vec2, include_water: bool) -> f32;

    /// The tile under `xy`, or `None` off the map.
    fn tile_id(&self, xy: Vec2) -> Option<TileId>;

    fn tile_has_flag(&self, tile: TileId, flag: TileFlags) -> bool;

    fn tile_normal(&self, tile: TileId) -> TileSlope;

    /// Pressure of the square footprint of half-size `radius` around `xy`
    /// against tiles with any of `blocking`.
    fn wall_pressure(&self, xy: Vec2, radius: f32, blocking: TileFlags) -> WallPressure;
}

/// The terrain every character samples.
#[derive(Resource, Clone, Deref)]
pub struct TerrainMap(Arc<dyn Terrain>);

impl TerrainMap {
    pub fn new(terrain: impl Terrain) -> Self {
        Self(Arc::new(terrain))
    }

    pub fn get(&self) -> &dyn Terrain {
        self.0.as_ref()
    }
}

impl Default for TerrainMap {
    fn default() -> Self {
        Self::new(FlatTerrain::default())
    }
}

/// An endless, featureless floor. Used until a module provides a real map.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatTerrain {
    pub height: f32,
}

impl Terrain for FlatTerrain {
    fn floor_height(&self, _xy: Vec2, _include_water: bool) -> f32 {
        self.height
    }

    fn tile_id(&self, _xy: Vec2) -> Option<TileId> {
        None
    }

    fn tile_has_flag(&self, _tile: TileId, _flag: TileFlags) -> bool {
        false
    }

    fn tile_normal(&self, _tile: TileId) -> TileSlope {
        TileSlope::default()
    }

    fn wall_pressure(&self, _xy: Vec2, _radius: f32, _blocking: TileFlags) -> WallPressure {
        WallPressure::default()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Tile {
    pub height: f32,
    pub flags: TileFlags,
    pub slope: TileSlope,
}

/// A rectangular map of square tiles. Everything outside the map is solid.
#[derive(Clone, Debug)]
pub struct TileGrid {
    tiles_x: u32,
    tiles_y: u32,
    grid_size: f32,
    tiles: Vec<Tile>,
    /// Surface of walkable water, applied to tiles flagged [`TileFlags::WATER`].
    walkable_water: Option<f32>,
}

impl TileGrid {
    pub fn new(tiles_x: u32, tiles_y: u32, grid_size: f32) -> Self {
        Self {
            tiles_x,
            tiles_y,
            grid_size,
            tiles: vec![Tile::default(); (tiles_x * tiles_y) as usize],
            walkable_water: None,
        }
    }

    pub fn grid_size(&self) -> f32 {
        self.grid_size
    }

    pub fn with_walkable_water(mut self, surface: f32) -> Self {
        self.walkable_water = Some(surface);
        self
    }

    pub fn with_flags(mut self, ix: i32, iy: i32, flags: TileFlags) -> Self {
        if let Some(tile) = self.tile_mut(ix, iy) {
            tile.flags |= flags;
        }
        self
    }

    pub fn with_height(mut self, ix: i32, iy: i32, height: f32) -> Self {
        if let Some(tile) = self.tile_mut(ix, iy) {
            tile.height = height;
        }
        self
    }

    pub fn with_slope(mut self, ix: i32, iy: i32, slope: Vec2) -> Self {
        if let Some(tile) = self.tile_mut(ix, iy) {
            tile.slope = TileSlope::from_slope(slope);
        }
        self
    }

    /// Flags every tile on the outer ring of the map.
    pub fn with_border(mut self, flags: TileFlags) -> Self {
        let (w, h) = (self.tiles_x as i32, self.tiles_y as i32);
        for ix in 0..w {
            for iy in 0..h {
                if ix == 0 || iy == 0 || ix == w - 1 || iy == h - 1 {
                    self = self.with_flags(ix, iy, flags);
                }
            }
        }
        self
    }

    /// Center of the tile at grid coordinates `(ix, iy)`.
    pub fn tile_center(&self, ix: i32, iy: i32) -> Vec2 {
        Vec2::new(ix as f32 + 0.5, iy as f32 + 0.5) * self.grid_size
    }

    fn index(&self, ix: i32, iy: i32) -> Option<usize> {
        if ix < 0 || iy < 0 || ix >= self.tiles_x as i32 || iy >= self.tiles_y as i32 {
            return None;
        }
        Some(iy as usize * self.tiles_x as usize + ix as usize)
    }

    fn tile_mut(&mut self, ix: i32, iy: i32) -> Option<&mut Tile> {
        let index = self.index(ix, iy)?;
        self.tiles.get_mut(index)
    }

    fn cell(&self, xy: Vec2) -> (i32, i32) {
        let cell = (xy / self.grid_size).floor();
        (cell.x as i32, cell.y as i32)
    }

    fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.0 as usize)
    }
}

impl Terrain for TileGrid {
    fn floor_height(&self, xy: Vec2, include_water: bool) -> f32 {
        let (ix, iy) = self.cell(xy);
        let Some(tile) = self.index(ix, iy).and_then(|i| self.tiles.get(i)) else {
            return 0.0;
        };
        let offset = xy - self.tile_center(ix, iy);
        let floor = tile.height + tile.slope.slope.dot(offset);
        match self.walkable_water {
            Some(surface) if include_water && tile.flags.intersects(TileFlags::WATER) => {
                floor.max(surface)
            }
            _ => floor,
        }
    }

    fn tile_id(&self, xy: Vec2) -> Option<TileId> {
        let (ix, iy) = self.cell(xy);
        self.index(ix, iy).map(|i| TileId(i as u32))
    }

    fn tile_has_flag(&self, tile: TileId, flag: TileFlags) -> bool {
        self.tile(tile).is_some_and(|t| t.flags.intersects(flag))
    }

    fn tile_normal(&self, tile: TileId) -> TileSlope {
        self.tile(tile).map(|t| t.slope).unwrap_or_default()
    }

    fn wall_pressure(&self, xy: Vec2, radius: f32, blocking: TileFlags) -> WallPressure {
        if blocking.is_empty() {
            return WallPressure::default();
        }

        let radius = radius.abs();
        let tile_area = self.grid_size * self.grid_size;
        let obj_area = (2.0 * radius) * (2.0 * radius);
        let (ix_min, iy_min) = self.cell(xy - Vec2::splat(radius));
        let (ix_max, iy_max) = self.cell(xy + Vec2::splat(radius));

        let mut pressure = 0.0;
        let mut normal = Vec2::ZERO;
        for iy in iy_min..=iy_max {
            for ix in ix_min..=ix_max {
                let blocked = match self.index(ix, iy) {
                    Some(i) => self.tiles[i].flags.intersects(blocking),
                    None => true,
                };
                if !blocked {
                    continue;
                }

                let center = self.tile_center(ix, iy);
                if radius == 0.0 {
                    pressure += 1.0;
                } else {
                    let half = Vec2::splat(self.grid_size * 0.5);
                    let lo = (xy - Vec2::splat(radius)).max(center - half);
                    let hi = (xy + Vec2::splat(radius)).min(center + half);
                    if lo.x <= hi.x && lo.y <= hi.y {
                        let min_area = tile_area.min(obj_area);
                        pressure += (hi.x - lo.x) * (hi.y - lo.y) / min_area;
                    }
                }
                normal += xy - center;
            }
        }

        if pressure == 0.0 {
            return WallPressure::default();
        }

        // avoid the square root for the common axis-aligned cases
        let normal = if normal.x == 0.0 && normal.y == 0.0 {
            Vec2::ZERO
        } else if normal.x == 0.0 {
            Vec2::new(0.0, normal.y.signum())
        } else if normal.y == 0.0 {
            Vec2::new(normal.x.signum(), 0.0)
        } else {
            normal.normalize()
        };

        WallPressure { pressure, normal }
    }
}
