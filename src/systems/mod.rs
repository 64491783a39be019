//! Simulation systems for Mossvale.
//!
//! The tick is driven sequentially rather than through a `Schedule`: the
//! player advances first, then every other actor in insertion order. That
//! ordering is part of the observable contract, so each system is an explicit
//! function over `&mut World` called from the facade.
//!
//! - `collision` - pixel-space edge strips and overlap scans
//! - `player` - player commands and sub-stepped advance
//! - `creature` - patrol movement and flock contact
//! - `plant` - oscillation, lifespan and decay
//! - `hazard` - terrain contact damage cadences
//! - `interaction` - cross-entity health rules and flock transfer

pub mod collision;
pub mod creature;
pub mod hazard;
pub mod interaction;
pub mod plant;
pub mod player;

pub use collision::*;
pub use creature::*;
pub use hazard::*;
pub use interaction::*;
pub use plant::*;
pub use player::*;

use bevy_ecs::prelude::*;

use crate::components::{Acceleration, Position, Velocity};

/// A single sub-step never exceeds this.
pub const MAX_SUBSTEP: f32 = 0.2;

/// Tolerance for periodic timer thresholds, above f32 accumulation noise.
pub(crate) const TIMER_SLACK: f32 = 1e-4;

/// All actors in insertion order, plus the player handle. Terminated actors
/// stay listed until removed so that in-flight iteration stays stable.
#[derive(Resource, Debug, Clone, Default)]
pub struct Roster {
    pub entries: Vec<Entity>,
    pub player: Option<Entity>,
}

/// Global game lifecycle flags.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct GameFlags {
    pub started: bool,
    pub game_over: bool,
    pub victory: bool,
}

/// Tile the player must reach to win.
#[derive(Resource, Debug, Clone, Copy)]
pub struct TargetTile {
    pub tx: i32,
    pub ty: i32,
}

/// Visible window, clamped to world bounds while following the player.
#[derive(Resource, Debug, Clone, Copy)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    /// Minimum pixel distance kept between the player and each window edge.
    pub const MARGIN: i32 = 200;
}

/// Sub-step increment: small enough that the fastest-moving actor crosses at
/// most 0.01 m per step. Falls back to the remaining budget when the actor is
/// at rest.
pub fn substep_increment(v: Velocity, a: Acceleration, remaining: f32) -> f32 {
    let dt = 0.01 / (v.magnitude() + a.magnitude() * remaining);
    if dt.is_finite() {
        dt.min(remaining).min(MAX_SUBSTEP)
    } else {
        remaining.min(MAX_SUBSTEP)
    }
}

/// One explicit Euler step: `p' = p + v dt + a dt^2 / 2`, `v' = v + a dt`.
pub fn integrate(p: Position, v: Velocity, a: Acceleration, dt: f32) -> (Position, Velocity) {
    let np = Position::new(
        p.x + v.vx * dt + 0.5 * a.ax * dt * dt,
        p.y + v.vy * dt + 0.5 * a.ay * dt * dt,
    );
    let nv = Velocity::new(v.vx + a.ax * dt, v.vy + a.ay * dt);
    (np, nv)
}
