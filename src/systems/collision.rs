//! Pixel-space collision primitives.
//!
//! Terrain collision is axis-separable: before a candidate position is
//! applied, the 1-px-inset edge strip on the side of travel is sampled
//! against impassable tiles. Entity overlap uses full edge-inclusive
//! bounding boxes.

use bevy_ecs::prelude::*;

use crate::components::{bounding_box, ActorKind, LifeState, Orientation, Position, SpriteSheet};
use crate::geometry::PixelRect;
use crate::systems::Roster;
use crate::terrain::TileGrid;

/// Leading 1-px column for horizontal travel, inset one pixel at top and
/// bottom so grazing a floor or ceiling does not read as a wall.
pub fn leading_column(body: &PixelRect, dir: i32) -> PixelRect {
    let x = if dir >= 0 { body.right() } else { body.x };
    PixelRect::new(x, body.y + 1, 1, body.h - 2)
}

/// Leading 1-px row for vertical travel, inset one pixel left and right.
pub fn leading_row(body: &PixelRect, dir: i32) -> PixelRect {
    let y = if dir >= 0 { body.top() } else { body.y };
    PixelRect::new(body.x + 1, y, body.w - 2, 1)
}

/// Inner body box used for placement checks against impassable terrain: one
/// pixel inset left and right, top row excluded so an actor may stand flush
/// under a ceiling.
pub fn inner_body(body: &PixelRect) -> PixelRect {
    PixelRect::new(body.x + 1, body.y, body.w - 2, body.h - 1)
}

pub fn terrain_blocks_horizontal(grid: &TileGrid, body: &PixelRect, dir: i32) -> bool {
    grid.rect_overlaps_impassable(&leading_column(body, dir))
}

pub fn terrain_blocks_vertical(grid: &TileGrid, body: &PixelRect, dir: i32) -> bool {
    grid.rect_overlaps_impassable(&leading_row(body, dir))
}

/// Bounding box of a live (non-terminated) actor in its current pose.
pub fn entity_box(world: &World, entity: Entity) -> Option<PixelRect> {
    let life = world.get::<LifeState>(entity)?;
    if life.terminated {
        return None;
    }
    let kind = world.get::<ActorKind>(entity)?;
    let pos = world.get::<Position>(entity)?;
    let orient = world.get::<Orientation>(entity)?;
    let sheet = world.get::<SpriteSheet>(entity)?;
    Some(bounding_box(kind, *orient, *pos, sheet))
}

/// Live creatures other than `except` whose box overlaps `rect`, in roster
/// order.
pub fn creatures_overlapping(world: &World, rect: &PixelRect, except: Option<Entity>) -> Vec<Entity> {
    scan_overlapping(world, rect, except, |k| k.is_creature())
}

/// Live plants whose box overlaps `rect`, in roster order.
pub fn plants_overlapping(world: &World, rect: &PixelRect) -> Vec<Entity> {
    scan_overlapping(world, rect, None, |k| k.is_plant())
}

/// The player, if alive and overlapping `rect`.
pub fn player_overlapping(world: &World, rect: &PixelRect) -> Option<Entity> {
    let player = world.resource::<Roster>().player?;
    let body = entity_box(world, player)?;
    if body.overlaps(rect) {
        Some(player)
    } else {
        None
    }
}

fn scan_overlapping(
    world: &World,
    rect: &PixelRect,
    except: Option<Entity>,
    keep: impl Fn(&ActorKind) -> bool,
) -> Vec<Entity> {
    let roster = world.resource::<Roster>();
    let mut hits = Vec::new();
    for &e in &roster.entries {
        if Some(e) == except {
            continue;
        }
        let Some(kind) = world.get::<ActorKind>(e) else {
            continue;
        };
        if !keep(kind) {
            continue;
        }
        if let Some(body) = entity_box(world, e) {
            if body.overlaps(rect) {
                hits.push(e);
            }
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_sit_on_the_side_of_travel() {
        let body = PixelRect::new(100, 50, 40, 60);
        let right = leading_column(&body, 1);
        assert_eq!(right, PixelRect::new(139, 51, 1, 58));
        let left = leading_column(&body, -1);
        assert_eq!(left, PixelRect::new(100, 51, 1, 58));
        let up = leading_row(&body, 1);
        assert_eq!(up, PixelRect::new(101, 109, 38, 1));
        let down = leading_row(&body, -1);
        assert_eq!(down, PixelRect::new(101, 50, 38, 1));
    }

    #[test]
    fn inner_body_excludes_side_columns_and_top_row() {
        let body = PixelRect::new(10, 10, 20, 30);
        assert_eq!(inner_body(&body), PixelRect::new(11, 10, 18, 29));
    }

    #[test]
    fn grazing_the_floor_does_not_block_horizontal_travel() {
        // Solid bottom row of 10 px tiles; body standing exactly on top.
        let mut codes = vec![0; 100];
        for tx in 0..10 {
            codes[tx] = 1;
        }
        let grid = TileGrid::new(10, 10, 10, &codes);
        let body = PixelRect::new(20, 10, 8, 12);
        assert!(!terrain_blocks_horizontal(&grid, &body, 1));
        assert!(!terrain_blocks_vertical(&grid, &body, -1));
        // One pixel lower the leading row enters the solid tiles.
        let falling = PixelRect::new(20, 9, 8, 12);
        assert!(terrain_blocks_vertical(&grid, &falling, -1));
    }
}
