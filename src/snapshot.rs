//! Serializable state snapshots.
//!
//! The `Snapshot` struct provides a serializable view of the simulation state
//! that a rendering client can consume without touching the ECS.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{
    sprite_index, ActorKind, Health, LifeState, Orientation, Position, SpriteSheet, Velocity,
};
use crate::systems::GameFlags;
use crate::terrain::TileGrid;

/// Snapshot of a single actor's state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub orientation: i32,
    pub health: i32,
    pub sprite_index: usize,
    pub alive: bool,
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    /// All non-terminated actors.
    pub actors: Vec<ActorSnapshot>,
    pub game_over: bool,
    pub victory: bool,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let flags = *world.resource::<GameFlags>();
        let mut actors = Vec::new();

        let mut query = world.query::<(
            &ActorKind,
            &Position,
            &Velocity,
            &Orientation,
            &Health,
            &LifeState,
            &SpriteSheet,
        )>();
        for (kind, pos, vel, orient, health, life, sheet) in query.iter(world) {
            if life.terminated {
                continue;
            }
            let kind_str = match kind {
                ActorKind::Player(_) => "player",
                ActorKind::Creature(_) => "creature",
                ActorKind::Plant(_) => "plant",
            };
            actors.push(ActorSnapshot {
                kind: kind_str.to_string(),
                x: pos.x,
                y: pos.y,
                vx: vel.vx,
                vy: vel.vy,
                orientation: orient.0,
                health: health.0,
                sprite_index: sprite_index(kind, *orient, sheet),
                alive: life.is_alive(),
            });
        }

        Self {
            tick,
            time,
            actors,
            game_over: flags.game_over,
            victory: flags.victory,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One-shot terrain export: dimensions plus raw feature codes in row-major
/// order, bottom row first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainSnapshot {
    pub tile_size: i32,
    pub tiles_x: i32,
    pub tiles_y: i32,
    pub features: Vec<i32>,
}

impl TerrainSnapshot {
    pub fn from_grid(grid: &TileGrid) -> Self {
        let mut features = Vec::with_capacity((grid.tiles_x() * grid.tiles_y()) as usize);
        for ty in 0..grid.tiles_y() {
            for tx in 0..grid.tiles_x() {
                features.push(grid.feature_at_tile(tx, ty).code());
            }
        }
        Self {
            tile_size: grid.tile_size(),
            tiles_x: grid.tiles_x(),
            tiles_y: grid.tiles_y(),
            features,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ActorBundle;

    #[test]
    fn snapshot_skips_terminated_actors() {
        let mut world = World::new();
        world.insert_resource(GameFlags::default());
        world.spawn(ActorBundle::player(1.0, 1.0, vec![(50, 100); 10]).unwrap());
        let gone = world
            .spawn(ActorBundle::creature(7, None, 3.0, 1.0, vec![(10, 10); 2]).unwrap())
            .id();
        world.get_mut::<LifeState>(gone).unwrap().terminated = true;

        let snap = Snapshot::from_world(&mut world, 3, 0.6);
        assert_eq!(snap.actors.len(), 1);
        assert_eq!(snap.actors[0].kind, "player");
        assert_eq!(snap.tick, 3);
        assert!(snap.to_json().unwrap().contains("\"player\""));
    }

    #[test]
    fn terrain_snapshot_round_trips_codes() {
        let grid = TileGrid::new(10, 3, 2, &[1, 0, 2, 5, 3, 4]);
        let snap = TerrainSnapshot::from_grid(&grid);
        assert_eq!(snap.features, vec![1, 0, 2, 5, 3, 4]);
        assert_eq!(snap.tiles_x, 3);
    }
}
