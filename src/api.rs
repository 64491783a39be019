//! Public API for the simulation.
//!
//! `SimWorld` owns the ECS world and drives the tick. The in-tick ordering is
//! part of the contract: the player advances first (after the target-tile
//! check), then every other actor in insertion order, then the viewport
//! follows the player. Each actor runs its own sub-step loop, so a single
//! `advance_time` call conserves the requested time budget exactly.

use bevy_ecs::prelude::*;

use crate::components::{
    bounding_box, sprite_index, ActorBundle, ActorKind, Acceleration, Health, LifeState,
    Orientation, PlantSpecies, Position, SpriteSheet, Velocity,
};
use crate::error::{SimError, SimResult};
use crate::flock::{FlockId, FlockRegistry};
use crate::geometry::PixelRect;
use crate::snapshot::{Snapshot, TerrainSnapshot};
use crate::systems::{self, collision, GameFlags, Roster, TargetTile, Viewport};
use crate::terrain::TileGrid;

/// Cap on non-player actors per world.
pub const MAX_ACTORS: usize = 100;
/// Largest accepted time step per `advance_time` call.
pub const MAX_TIME_STEP: f32 = 0.2;

/// The main simulation world container.
pub struct SimWorld {
    world: World,
    tick: u64,
    time: f32,
}

impl SimWorld {
    /// Create a world of `tiles_x` x `tiles_y` tiles of `tile_size` px,
    /// seeded with raw feature codes (row-major, bottom row first; unknown
    /// codes read as air). `window` is the visible window size in pixels and
    /// must fit inside the world.
    pub fn new(
        tile_size: i32,
        tiles_x: i32,
        tiles_y: i32,
        target_tile: (i32, i32),
        window: (i32, i32),
        codes: &[i32],
    ) -> SimResult<Self> {
        let grid = TileGrid::new(tile_size, tiles_x, tiles_y, codes);
        let (ww, wh) = window;
        if ww <= 0 || wh <= 0 || ww > grid.width_px() || wh > grid.height_px() {
            return Err(SimError::WindowTooLarge(ww, wh));
        }

        let mut world = World::new();
        world.insert_resource(grid);
        world.insert_resource(FlockRegistry::default());
        world.insert_resource(Roster::default());
        world.insert_resource(GameFlags::default());
        world.insert_resource(TargetTile {
            tx: target_tile.0,
            ty: target_tile.1,
        });
        world.insert_resource(Viewport {
            x: 0,
            y: 0,
            width: ww,
            height: wh,
        });

        Ok(Self {
            world,
            tick: 0,
            time: 0.0,
        })
    }

    // ========================================================================
    // ADMISSION
    // ========================================================================

    /// Create a new empty flock (at most 10 per world).
    pub fn create_flock(&mut self) -> SimResult<FlockId> {
        self.world.resource_mut::<FlockRegistry>().create()
    }

    /// Enroll a flock-less creature in an existing flock.
    pub fn enroll_in_flock(&mut self, creature: Entity, flock: FlockId) -> SimResult<()> {
        let state = self.creature_state(creature)?;
        if state.flock.is_some() {
            return Err(SimError::CommandRejected("creature already has a flock"));
        }
        if !self.world.resource::<FlockRegistry>().exists(flock) {
            return Err(SimError::UnknownFlock(flock));
        }
        self.world
            .resource_mut::<FlockRegistry>()
            .enroll(flock, creature)?;
        self.set_creature_flock(creature, Some(flock));
        Ok(())
    }

    /// Withdraw a creature from its flock.
    pub fn withdraw_from_flock(&mut self, creature: Entity) -> SimResult<()> {
        let state = self.creature_state(creature)?;
        let Some(flock) = state.flock else {
            return Err(SimError::CommandRejected("creature has no flock"));
        };
        self.world
            .resource_mut::<FlockRegistry>()
            .withdraw(flock, creature);
        self.set_creature_flock(creature, None);
        Ok(())
    }

    /// Move a creature into another flock, applying the same +-1 health
    /// exchange as a collision-driven transfer.
    pub fn transfer_creature(&mut self, creature: Entity, to: FlockId) -> SimResult<()> {
        let state = self.creature_state(creature)?;
        let Some(from) = state.flock else {
            return Err(SimError::CommandRejected("creature has no flock"));
        };
        if !self.world.resource::<FlockRegistry>().exists(to) {
            return Err(SimError::UnknownFlock(to));
        }
        if from == to {
            return Ok(());
        }
        systems::interaction::transfer_flock(&mut self.world, creature, from, to);
        Ok(())
    }

    fn creature_state(&self, creature: Entity) -> SimResult<crate::components::CreatureState> {
        let kind = self
            .world
            .get::<ActorKind>(creature)
            .ok_or(SimError::ActorNotFound)?;
        kind.creature()
            .copied()
            .ok_or(SimError::CommandRejected("not a creature"))
    }

    fn set_creature_flock(&mut self, creature: Entity, flock: Option<FlockId>) {
        if let Some(mut kind) = self.world.get_mut::<ActorKind>(creature) {
            if let Some(c) = kind.creature_mut() {
                c.flock = flock;
            }
        }
    }

    /// Admit a player character. Position is in metres.
    pub fn add_player(&mut self, x: f32, y: f32, frames: Vec<(i32, i32)>) -> SimResult<Entity> {
        self.admit(ActorBundle::player(x, y, frames)?)
    }

    /// Admit a creature, optionally enrolled in a flock at admission.
    pub fn add_creature(
        &mut self,
        id: u64,
        flock: Option<FlockId>,
        x: f32,
        y: f32,
        frames: Vec<(i32, i32)>,
    ) -> SimResult<Entity> {
        self.admit(ActorBundle::creature(id, flock, x, y, frames)?)
    }

    /// Admit an oscillating plant. Plants neither block nor are blocked by
    /// other actors.
    pub fn add_plant(
        &mut self,
        species: PlantSpecies,
        x: f32,
        y: f32,
        frames: Vec<(i32, i32)>,
    ) -> SimResult<Entity> {
        self.admit(ActorBundle::plant(species, x, y, frames)?)
    }

    fn admit(&mut self, bundle: ActorBundle) -> SimResult<Entity> {
        if self.world.resource::<GameFlags>().started {
            return Err(SimError::WorldRunning);
        }
        let is_player = bundle.kind.is_player();
        let is_plant = bundle.kind.is_plant();
        let (existing, player_handle) = {
            let roster = self.world.resource::<Roster>();
            (roster.entries.clone(), roster.player)
        };
        if is_player && player_handle.is_some() {
            return Err(SimError::DuplicatePlayer);
        }
        let non_player = existing
            .iter()
            .filter(|e| Some(**e) != player_handle)
            .count();
        if !is_player && non_player >= MAX_ACTORS {
            return Err(SimError::WorldFull(non_player));
        }

        if !bundle.position.is_finite() {
            return Err(SimError::OutOfWorld(bundle.position.x, bundle.position.y));
        }
        let (px, py) = bundle.position.pixel();
        if !self.world.resource::<TileGrid>().contains(px, py) {
            return Err(SimError::OutOfWorld(bundle.position.x, bundle.position.y));
        }

        let body = bounding_box(
            &bundle.kind,
            bundle.orientation,
            bundle.position,
            &bundle.sprites,
        );
        if !is_plant {
            for &e in &existing {
                let Some(kind) = self.world.get::<ActorKind>(e) else {
                    continue;
                };
                if kind.is_plant() {
                    continue;
                }
                if let Some(other) = collision::entity_box(&self.world, e) {
                    if other.overlaps(&body) {
                        return Err(SimError::PlacementBlocked);
                    }
                }
            }
            if self
                .world
                .resource::<TileGrid>()
                .rect_overlaps_impassable(&collision::inner_body(&body))
            {
                return Err(SimError::InsideTerrain);
            }
        }

        let flock = if let ActorKind::Creature(state) = &bundle.kind {
            for &e in &existing {
                let dup = self
                    .world
                    .get::<ActorKind>(e)
                    .and_then(|k| k.creature())
                    .map(|c| c.id == state.id)
                    .unwrap_or(false);
                if dup {
                    return Err(SimError::DuplicateCreatureId(state.id));
                }
            }
            if let Some(f) = state.flock {
                if !self.world.resource::<FlockRegistry>().exists(f) {
                    return Err(SimError::UnknownFlock(f));
                }
            }
            state.flock
        } else {
            None
        };

        let entity = self.world.spawn(bundle).id();
        if let Some(f) = flock {
            self.world
                .resource_mut::<FlockRegistry>()
                .enroll(f, entity)?;
        }
        let mut roster = self.world.resource_mut::<Roster>();
        roster.entries.push(entity);
        if is_player {
            roster.player = Some(entity);
        }
        Ok(entity)
    }

    /// Terminate and drop an actor. Removing the player ends the game.
    pub fn remove_actor(&mut self, entity: Entity) -> SimResult<()> {
        let in_roster = self
            .world
            .resource::<Roster>()
            .entries
            .contains(&entity);
        if !in_roster {
            return Err(SimError::ActorNotFound);
        }
        systems::interaction::terminate(&mut self.world, entity);
        let was_player = {
            let mut roster = self.world.resource_mut::<Roster>();
            roster.entries.retain(|e| *e != entity);
            if roster.player == Some(entity) {
                roster.player = None;
                true
            } else {
                false
            }
        };
        if was_player {
            self.world.resource_mut::<GameFlags>().game_over = true;
        }
        Ok(())
    }

    // ========================================================================
    // GAME LIFECYCLE
    // ========================================================================

    /// Start the game. Requires a player.
    pub fn start_game(&mut self) -> SimResult<()> {
        if self.world.resource::<Roster>().player.is_none() {
            return Err(SimError::NoPlayer);
        }
        self.world.resource_mut::<GameFlags>().started = true;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.world.resource::<GameFlags>().started
    }

    pub fn is_game_over(&self) -> bool {
        self.world.resource::<GameFlags>().game_over
    }

    pub fn is_victory(&self) -> bool {
        self.world.resource::<GameFlags>().victory
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    fn player(&self) -> SimResult<Entity> {
        self.world
            .resource::<Roster>()
            .player
            .ok_or(SimError::NoPlayer)
    }

    pub fn start_move(&mut self, dir: i32) -> SimResult<()> {
        let p = self.player()?;
        systems::player::start_move(&mut self.world, p, dir)
    }

    pub fn end_move(&mut self) -> SimResult<()> {
        let p = self.player()?;
        systems::player::end_move(&mut self.world, p)
    }

    pub fn start_jump(&mut self) -> SimResult<()> {
        let p = self.player()?;
        systems::player::start_jump(&mut self.world, p)
    }

    pub fn end_jump(&mut self) -> SimResult<()> {
        let p = self.player()?;
        systems::player::end_jump(&mut self.world, p)
    }

    pub fn start_duck(&mut self) -> SimResult<()> {
        let p = self.player()?;
        systems::player::start_duck(&mut self.world, p)
    }

    pub fn end_duck(&mut self) -> SimResult<()> {
        let p = self.player()?;
        systems::player::end_duck(&mut self.world, p)
    }

    /// Start a creature patrolling rightward.
    pub fn start_patrol(&mut self, creature: Entity) -> SimResult<()> {
        systems::creature::start_patrol(&mut self.world, creature)
    }

    // ========================================================================
    // TIME
    // ========================================================================

    /// Advance the whole world by `dt` seconds. `dt` must be finite, within
    /// `[0, 0.2]`; zero is a no-op.
    pub fn advance_time(&mut self, dt: f32) -> SimResult<()> {
        if !dt.is_finite() || dt < 0.0 || dt > MAX_TIME_STEP {
            return Err(SimError::InvalidTimeStep(dt));
        }
        if dt == 0.0 {
            return Ok(());
        }

        let player = self.world.resource::<Roster>().player;
        if let Some(p) = player {
            if self.player_on_target() {
                let mut flags = self.world.resource_mut::<GameFlags>();
                flags.game_over = true;
                flags.victory = true;
            } else {
                systems::player::advance_player(&mut self.world, p, dt);
            }
        }

        let entries = self.world.resource::<Roster>().entries.clone();
        for e in entries {
            if Some(e) == player {
                continue;
            }
            let Some(kind) = self.world.get::<ActorKind>(e).copied() else {
                continue;
            };
            match kind {
                ActorKind::Creature(_) => systems::creature::advance_creature(&mut self.world, e, dt),
                ActorKind::Plant(_) => systems::plant::advance_plant(&mut self.world, e, dt),
                ActorKind::Player(_) => {}
            }
        }

        self.follow_player();
        self.tick += 1;
        self.time += dt;
        Ok(())
    }

    /// Advance a single actor, bypassing world-level `dt` validation. The
    /// actor's own sub-stepping still bounds each increment.
    pub fn advance_entity(&mut self, entity: Entity, dt: f32) -> SimResult<()> {
        let kind = *self
            .world
            .get::<ActorKind>(entity)
            .ok_or(SimError::ActorNotFound)?;
        match kind {
            ActorKind::Player(_) => systems::player::advance_player(&mut self.world, entity, dt),
            ActorKind::Creature(_) => {
                systems::creature::advance_creature(&mut self.world, entity, dt)
            }
            ActorKind::Plant(_) => systems::plant::advance_plant(&mut self.world, entity, dt),
        }
        Ok(())
    }

    fn player_on_target(&self) -> bool {
        let Some(player) = self.world.resource::<Roster>().player else {
            return false;
        };
        let Some(body) = collision::entity_box(&self.world, player) else {
            return false;
        };
        let grid = self.world.resource::<TileGrid>();
        let target = self.world.resource::<TargetTile>();
        let (ox, oy) = grid.tile_origin(target.tx, target.ty);
        let tile = PixelRect::new(ox, oy, grid.tile_size(), grid.tile_size());
        body.overlaps(&tile)
    }

    fn follow_player(&mut self) {
        let pixel = self
            .world
            .resource::<Roster>()
            .player
            .and_then(|p| self.world.get::<Position>(p).map(Position::pixel));
        let grid_size = {
            let grid = self.world.resource::<TileGrid>();
            (grid.width_px(), grid.height_px())
        };
        let mut view = *self.world.resource::<Viewport>();
        match pixel {
            Some((px, py)) => {
                view.x = follow_axis(view.x, px, view.width, grid_size.0);
                view.y = follow_axis(view.y, py, view.height, grid_size.1);
            }
            None => {
                view.x = 0;
                view.y = 0;
            }
        }
        *self.world.resource_mut::<Viewport>() = view;
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    fn component<T: Component + Copy>(&self, entity: Entity) -> SimResult<T> {
        self.world
            .get::<T>(entity)
            .copied()
            .ok_or(SimError::ActorNotFound)
    }

    pub fn position(&self, entity: Entity) -> SimResult<(f32, f32)> {
        let p: Position = self.component(entity)?;
        Ok((p.x, p.y))
    }

    pub fn velocity(&self, entity: Entity) -> SimResult<(f32, f32)> {
        let v: Velocity = self.component(entity)?;
        Ok((v.vx, v.vy))
    }

    pub fn acceleration(&self, entity: Entity) -> SimResult<(f32, f32)> {
        let a: Acceleration = self.component(entity)?;
        Ok((a.ax, a.ay))
    }

    pub fn orientation(&self, entity: Entity) -> SimResult<i32> {
        let o: Orientation = self.component(entity)?;
        Ok(o.0)
    }

    pub fn health(&self, entity: Entity) -> SimResult<i32> {
        let h: Health = self.component(entity)?;
        Ok(h.0)
    }

    /// Teleport an actor. The target must be finite and inside the world;
    /// non-plant actors are also refused a pose inside impassable terrain.
    pub fn set_position(&mut self, entity: Entity, x: f32, y: f32) -> SimResult<()> {
        let kind = *self
            .world
            .get::<ActorKind>(entity)
            .ok_or(SimError::ActorNotFound)?;
        let target = Position::new(x, y);
        if !target.is_finite() {
            return Err(SimError::OutOfWorld(x, y));
        }
        let (px, py) = target.pixel();
        if !self.world.resource::<TileGrid>().contains(px, py) {
            return Err(SimError::OutOfWorld(x, y));
        }
        if !kind.is_plant() {
            let orient: Orientation = self.component(entity)?;
            let sheet = self
                .world
                .get::<SpriteSheet>(entity)
                .ok_or(SimError::ActorNotFound)?;
            let body = bounding_box(&kind, orient, target, sheet);
            if self
                .world
                .resource::<TileGrid>()
                .rect_overlaps_impassable(&collision::inner_body(&body))
            {
                return Err(SimError::InsideTerrain);
            }
        }
        if let Some(mut p) = self.world.get_mut::<Position>(entity) {
            *p = target;
        }
        Ok(())
    }

    /// Assign health through the variant's range rule: out-of-range values
    /// land on zero.
    pub fn set_health(&mut self, entity: Entity, hp: i32) -> SimResult<()> {
        let kind = *self
            .world
            .get::<ActorKind>(entity)
            .ok_or(SimError::ActorNotFound)?;
        let next = crate::components::admitted_health(&kind, hp);
        if let Some(mut h) = self.world.get_mut::<Health>(entity) {
            *h = next;
        }
        Ok(())
    }

    pub fn is_alive(&self, entity: Entity) -> SimResult<bool> {
        let l: LifeState = self.component(entity)?;
        Ok(l.is_alive())
    }

    pub fn is_terminated(&self, entity: Entity) -> SimResult<bool> {
        let l: LifeState = self.component(entity)?;
        Ok(l.terminated)
    }

    pub fn is_moving(&self, entity: Entity) -> SimResult<bool> {
        self.player_flag(entity, |s| s.moving)
    }

    pub fn is_jumping(&self, entity: Entity) -> SimResult<bool> {
        self.player_flag(entity, |s| s.jumping)
    }

    pub fn is_ducking(&self, entity: Entity) -> SimResult<bool> {
        self.player_flag(entity, |s| s.ducking)
    }

    fn player_flag(
        &self,
        entity: Entity,
        read: impl Fn(&crate::components::PlayerState) -> bool,
    ) -> SimResult<bool> {
        self.world
            .get::<ActorKind>(entity)
            .and_then(|k| k.player())
            .map(read)
            .ok_or(SimError::ActorNotFound)
    }

    /// Current animation frame index of an actor.
    pub fn sprite_index_of(&self, entity: Entity) -> SimResult<usize> {
        let kind = self
            .world
            .get::<ActorKind>(entity)
            .ok_or(SimError::ActorNotFound)?;
        let orient: Orientation = self.component(entity)?;
        let sheet = self
            .world
            .get::<SpriteSheet>(entity)
            .ok_or(SimError::ActorNotFound)?;
        Ok(sprite_index(kind, orient, sheet))
    }

    /// Flock a creature belongs to, if any.
    pub fn flock_of(&self, entity: Entity) -> SimResult<Option<FlockId>> {
        self.world
            .get::<ActorKind>(entity)
            .and_then(|k| k.creature())
            .map(|c| c.flock)
            .ok_or(SimError::ActorNotFound)
    }

    /// Raw feature code of the tile covering a pixel coordinate.
    pub fn feature_at(&self, px: i32, py: i32) -> i32 {
        self.world.resource::<TileGrid>().feature_at(px, py).code()
    }

    /// Set the feature of the tile covering a pixel coordinate.
    pub fn set_feature(&mut self, px: i32, py: i32, code: i32) {
        self.world
            .resource_mut::<TileGrid>()
            .set_feature_at(px, py, code);
    }

    /// Visible window as (x, y, width, height) in pixels.
    pub fn viewport(&self) -> (i32, i32, i32, i32) {
        let v = self.world.resource::<Viewport>();
        (v.x, v.y, v.width, v.height)
    }

    /// Number of non-terminated actors, player included.
    pub fn actor_count(&self) -> usize {
        self.world
            .resource::<Roster>()
            .entries
            .iter()
            .filter(|e| {
                self.world
                    .get::<LifeState>(**e)
                    .map(|l| !l.terminated)
                    .unwrap_or(false)
            })
            .count()
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.tick, self.time)
    }

    pub fn terrain_snapshot(&self) -> TerrainSnapshot {
        TerrainSnapshot::from_grid(self.world.resource::<TileGrid>())
    }
}

/// Slide a window coordinate so `target` keeps the margin from both edges,
/// clamped to the world. Windows narrower than twice the margin center on
/// the target instead.
fn follow_axis(current: i32, target: i32, window: i32, world: i32) -> i32 {
    let mut v = current;
    if window >= 2 * Viewport::MARGIN {
        if target - v < Viewport::MARGIN {
            v = target - Viewport::MARGIN;
        }
        if (v + window) - target < Viewport::MARGIN {
            v = target + Viewport::MARGIN - window;
        }
    } else {
        v = target - window / 2;
    }
    v.clamp(0, (world - window).max(0))
}
