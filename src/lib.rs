//! Mossvale - Simulation Core
//!
//! A deterministic, sub-stepped ECS simulation for a 2D platformer.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod components;
pub mod error;
pub mod flock;
pub mod geometry;
pub mod snapshot;
pub mod systems;
pub mod terrain;

pub use api::SimWorld;
pub use components::*;
pub use error::{SimError, SimResult};
pub use flock::{FlockId, FlockRegistry, MAX_FLOCKS};
pub use geometry::{meters_to_pixel, pixel_to_meters, Axis, PixelRect, PIXELS_PER_METER};
pub use snapshot::{ActorSnapshot, Snapshot, TerrainSnapshot};
pub use systems::*;
pub use terrain::{TerrainFeature, TileGrid};
