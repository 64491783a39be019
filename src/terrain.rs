//! Terrain system - tile grid with per-tile geological features.
//!
//! The world is a fixed grid of square tiles. Each tile carries one feature
//! code that decides passability and hazard effects. Features never change
//! during a tick; the grid is only edited through the world API.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::geometry::PixelRect;

/// Geological feature of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TerrainFeature {
    /// Passable, no effect.
    #[default]
    Air,
    /// Impassable solid ground.
    SolidGround,
    /// Passable liquid, slow periodic damage.
    Water,
    /// Passable liquid, heavy periodic damage; lethal to creatures.
    Magma,
    /// Impassable, otherwise inert.
    Ice,
    /// Passable gas, light periodic damage (heals creatures).
    Gas,
}

impl TerrainFeature {
    /// Decode a raw feature code. Unknown codes default to `Air`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => TerrainFeature::SolidGround,
            2 => TerrainFeature::Water,
            3 => TerrainFeature::Magma,
            4 => TerrainFeature::Ice,
            5 => TerrainFeature::Gas,
            _ => TerrainFeature::Air,
        }
    }

    /// Raw feature code for serialization.
    pub fn code(self) -> i32 {
        match self {
            TerrainFeature::Air => 0,
            TerrainFeature::SolidGround => 1,
            TerrainFeature::Water => 2,
            TerrainFeature::Magma => 3,
            TerrainFeature::Ice => 4,
            TerrainFeature::Gas => 5,
        }
    }

    /// Whether actors can occupy tiles of this feature.
    pub fn is_impassable(self) -> bool {
        matches!(self, TerrainFeature::SolidGround | TerrainFeature::Ice)
    }
}

/// The world's tile grid.
///
/// Tile (0, 0) sits at the bottom-left pixel origin; tile indices grow
/// rightward and upward.
#[derive(Resource, Debug, Clone)]
pub struct TileGrid {
    tile_size: i32,
    tiles_x: i32,
    tiles_y: i32,
    features: Vec<TerrainFeature>,
}

impl TileGrid {
    /// Build a grid from raw feature codes in row-major order (bottom row
    /// first). Negative dimensions are normalized to their absolute value;
    /// missing codes pad with `Air`, surplus codes are ignored.
    pub fn new(tile_size: i32, tiles_x: i32, tiles_y: i32, codes: &[i32]) -> Self {
        let tile_size = tile_size.abs().max(1);
        let tiles_x = tiles_x.abs().max(1);
        let tiles_y = tiles_y.abs().max(1);
        let count = (tiles_x * tiles_y) as usize;
        let mut features = vec![TerrainFeature::Air; count];
        for (slot, code) in features.iter_mut().zip(codes.iter()) {
            *slot = TerrainFeature::from_code(*code);
        }
        Self {
            tile_size,
            tiles_x,
            tiles_y,
            features,
        }
    }

    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    pub fn tiles_x(&self) -> i32 {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> i32 {
        self.tiles_y
    }

    /// World width in pixels.
    pub fn width_px(&self) -> i32 {
        self.tiles_x * self.tile_size
    }

    /// World height in pixels.
    pub fn height_px(&self) -> i32 {
        self.tiles_y * self.tile_size
    }

    /// Whether a pixel coordinate lies inside the world.
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= 0 && py >= 0 && px < self.width_px() && py < self.height_px()
    }

    /// Tile indices covering a pixel coordinate.
    pub fn tile_at(&self, px: i32, py: i32) -> (i32, i32) {
        (px.div_euclid(self.tile_size), py.div_euclid(self.tile_size))
    }

    /// Bottom-left pixel of a tile.
    pub fn tile_origin(&self, tx: i32, ty: i32) -> (i32, i32) {
        (tx * self.tile_size, ty * self.tile_size)
    }

    /// Feature of the tile at the given tile indices. Out of range is `Air`.
    pub fn feature_at_tile(&self, tx: i32, ty: i32) -> TerrainFeature {
        if tx < 0 || ty < 0 || tx >= self.tiles_x || ty >= self.tiles_y {
            return TerrainFeature::Air;
        }
        self.features[(ty * self.tiles_x + tx) as usize]
    }

    /// Feature of the tile covering a pixel coordinate.
    pub fn feature_at(&self, px: i32, py: i32) -> TerrainFeature {
        let (tx, ty) = self.tile_at(px, py);
        self.feature_at_tile(tx, ty)
    }

    /// Set the feature of the tile covering a pixel coordinate. Invalid codes
    /// store `Air`; coordinates outside the world are ignored.
    pub fn set_feature_at(&mut self, px: i32, py: i32, code: i32) {
        if !self.contains(px, py) {
            return;
        }
        let (tx, ty) = self.tile_at(px, py);
        self.features[(ty * self.tiles_x + tx) as usize] = TerrainFeature::from_code(code);
    }

    /// Whether any tile under the rectangle carries the given feature.
    pub fn rect_overlaps_feature(&self, rect: &PixelRect, feature: TerrainFeature) -> bool {
        self.sample_rect(rect, |f| f == feature)
    }

    /// Whether any tile under the rectangle is impassable.
    pub fn rect_overlaps_impassable(&self, rect: &PixelRect) -> bool {
        self.sample_rect(rect, |f| f.is_impassable())
    }

    fn sample_rect(&self, rect: &PixelRect, pred: impl Fn(TerrainFeature) -> bool) -> bool {
        if rect.w <= 0 || rect.h <= 0 {
            return false;
        }
        let (tx0, ty0) = self.tile_at(rect.x, rect.y);
        let (tx1, ty1) = self.tile_at(rect.right(), rect.top());
        for ty in ty0..=ty1 {
            for tx in tx0..=tx1 {
                if pred(self.feature_at_tile(tx, ty)) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> TileGrid {
        // 4x3 tiles of 10 px; bottom row solid, one magma tile at (2, 1).
        let mut codes = vec![0; 12];
        for tx in 0..4 {
            codes[tx] = 1;
        }
        codes[4 + 2] = 3;
        TileGrid::new(10, 4, 3, &codes)
    }

    #[test]
    fn decodes_unknown_codes_as_air() {
        assert_eq!(TerrainFeature::from_code(42), TerrainFeature::Air);
        assert_eq!(TerrainFeature::from_code(-1), TerrainFeature::Air);
        assert_eq!(TerrainFeature::from_code(4), TerrainFeature::Ice);
    }

    #[test]
    fn normalizes_negative_dimensions() {
        let g = TileGrid::new(-10, -4, -3, &[]);
        assert_eq!(g.tile_size(), 10);
        assert_eq!(g.tiles_x(), 4);
        assert_eq!(g.tiles_y(), 3);
        assert_eq!(g.feature_at(5, 5), TerrainFeature::Air);
    }

    #[test]
    fn pixel_lookup_hits_the_right_tile() {
        let g = grid();
        assert_eq!(g.feature_at(0, 0), TerrainFeature::SolidGround);
        assert_eq!(g.feature_at(39, 9), TerrainFeature::SolidGround);
        assert_eq!(g.feature_at(25, 15), TerrainFeature::Magma);
        assert_eq!(g.feature_at(25, 25), TerrainFeature::Air);
        assert_eq!(g.feature_at(-5, 0), TerrainFeature::Air);
    }

    #[test]
    fn set_feature_rejects_out_of_world() {
        let mut g = grid();
        g.set_feature_at(100, 100, 3);
        g.set_feature_at(15, 25, 2);
        assert_eq!(g.feature_at(15, 25), TerrainFeature::Water);
    }

    #[test]
    fn rect_sampling_covers_partial_tiles() {
        let g = grid();
        // A box straddling the solid bottom row by one pixel.
        let grazing = PixelRect::new(5, 9, 8, 8);
        assert!(g.rect_overlaps_impassable(&grazing));
        let clear = PixelRect::new(5, 10, 8, 8);
        assert!(!g.rect_overlaps_impassable(&clear));
        let in_magma = PixelRect::new(22, 12, 4, 4);
        assert!(g.rect_overlaps_feature(&in_magma, TerrainFeature::Magma));
        assert!(!g.rect_overlaps_feature(&in_magma, TerrainFeature::Water));
    }
}
