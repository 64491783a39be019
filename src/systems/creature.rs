//! Flocking creature: patrol movement, reactive reversal and flock contact.

use bevy_ecs::prelude::*;

use crate::components::{
    ActorKind, Acceleration, CreatureState, Health, Kinematics, LifeState, Orientation, Position,
    Velocity,
};
use crate::error::{SimError, SimResult};
use crate::geometry::{meters_to_pixel, PixelRect};
use crate::systems::{collision, hazard, integrate, interaction, substep_increment};
use crate::terrain::TileGrid;

struct CreatureCtx {
    state: CreatureState,
    pos: Position,
    vel: Velocity,
    acc: Acceleration,
    orient: Orientation,
    hp: i32,
    life: LifeState,
    frame: (i32, i32),
}

fn read_creature(world: &World, entity: Entity) -> SimResult<CreatureCtx> {
    let kind = world.get::<ActorKind>(entity).ok_or(SimError::ActorNotFound)?;
    let state = *kind.creature().ok_or(SimError::ActorNotFound)?;
    let sheet = world
        .get::<crate::components::SpriteSheet>(entity)
        .ok_or(SimError::ActorNotFound)?;
    let orient = *world
        .get::<Orientation>(entity)
        .ok_or(SimError::ActorNotFound)?;
    Ok(CreatureCtx {
        state,
        pos: *world.get::<Position>(entity).ok_or(SimError::ActorNotFound)?,
        vel: *world.get::<Velocity>(entity).ok_or(SimError::ActorNotFound)?,
        acc: *world
            .get::<Acceleration>(entity)
            .ok_or(SimError::ActorNotFound)?,
        orient,
        hp: world.get::<Health>(entity).ok_or(SimError::ActorNotFound)?.0,
        life: *world.get::<LifeState>(entity).ok_or(SimError::ActorNotFound)?,
        frame: sheet.frame(if orient.0 < 0 { 1 } else { 0 }),
    })
}

fn write_creature(world: &mut World, entity: Entity, ctx: &CreatureCtx) {
    if let Some(mut kind) = world.get_mut::<ActorKind>(entity) {
        *kind = ActorKind::Creature(ctx.state);
    }
    if let Some(mut c) = world.get_mut::<Position>(entity) {
        *c = ctx.pos;
    }
    if let Some(mut c) = world.get_mut::<Velocity>(entity) {
        *c = ctx.vel;
    }
    if let Some(mut c) = world.get_mut::<Acceleration>(entity) {
        *c = ctx.acc;
    }
    if let Some(mut c) = world.get_mut::<Orientation>(entity) {
        *c = ctx.orient;
    }
    if let Some(mut c) = world.get_mut::<Health>(entity) {
        *c = Health(ctx.hp);
    }
    if let Some(mut c) = world.get_mut::<LifeState>(entity) {
        *c = ctx.life;
    }
}

/// Start patrolling rightward from rest.
pub fn start_patrol(world: &mut World, entity: Entity) -> SimResult<()> {
    let mut ctx = read_creature(world, entity)?;
    if !ctx.life.is_alive() {
        return Err(SimError::CommandRejected("creature is dead"));
    }
    ctx.orient = Orientation(1);
    ctx.vel = Velocity::default();
    ctx.acc = Acceleration::new(CreatureState::ACCEL, 0.0);
    ctx.state.patrol_clock = 0.0;
    write_creature(world, entity, &ctx);
    Ok(())
}

/// Flip the patrol direction from rest.
fn reverse(ctx: &mut CreatureCtx) {
    ctx.orient = ctx.orient.flipped();
    ctx.vel = Velocity::default();
    ctx.acc = Acceleration::new(ctx.orient.sign() * CreatureState::ACCEL, 0.0);
    ctx.state.patrol_clock = 0.0;
}

fn position_valid(grid: &TileGrid, pos: Position) -> bool {
    if !pos.is_finite() || pos.x < 0.0 || pos.y < 0.0 {
        return false;
    }
    let (px, py) = pos.pixel();
    grid.contains(px, py)
}

/// Advance a creature by `dt`: patrol timer, horizontal movement against
/// terrain and other creatures, then hazard contact.
pub fn advance_creature(world: &mut World, entity: Entity, dt: f32) {
    let Ok(mut ctx) = read_creature(world, entity) else {
        return;
    };
    if ctx.life.terminated {
        return;
    }

    let mut remaining = dt;
    while remaining > 0.0 {
        if ctx.life.dead || ctx.hp == 0 {
            write_creature(world, entity, &ctx);
            interaction::terminate(world, entity);
            return;
        }

        let step = substep_increment(ctx.vel, ctx.acc, remaining);

        // Timed reversal while patrolling.
        if ctx.orient.0 != 0 {
            ctx.state.patrol_clock += step;
            if ctx.state.patrol_clock > CreatureState::DIRECTION_HOLD {
                reverse(&mut ctx);
            }
        }

        let (mut npos, raw_vel) = integrate(ctx.pos, ctx.vel, ctx.acc, step);
        npos.y = ctx.pos.y;
        let mut nvel = ctx
            .state
            .correct_velocity(raw_vel, ctx.orient)
            .unwrap_or(ctx.vel);

        let hdir = match npos.x.partial_cmp(&ctx.pos.x) {
            Some(std::cmp::Ordering::Greater) => 1,
            Some(std::cmp::Ordering::Less) => -1,
            _ => 0,
        };
        if hdir != 0 {
            let (w, h) = ctx.frame;
            let cand = PixelRect::new(meters_to_pixel(npos.x), meters_to_pixel(ctx.pos.y), w, h);
            let terrain_hit = {
                let grid = world.resource::<TileGrid>();
                collision::terrain_blocks_horizontal(grid, &cand, hdir)
            };
            let blockers = collision::creatures_overlapping(world, &cand, Some(entity));
            if terrain_hit || !blockers.is_empty() {
                npos.x = ctx.pos.x;
                reverse(&mut ctx);
                nvel = ctx.vel;
                if let Some(&other) = blockers.first() {
                    write_creature(world, entity, &ctx);
                    interaction::creature_creature_contact(world, entity, other);
                    match read_creature(world, entity) {
                        Ok(fresh) => ctx = fresh,
                        Err(_) => return,
                    }
                    nvel = ctx.vel;
                }
            }
        }

        if !position_valid(world.resource::<TileGrid>(), npos) {
            write_creature(world, entity, &ctx);
            interaction::terminate(world, entity);
            return;
        }
        ctx.pos = npos;
        ctx.vel = nvel;
        write_creature(world, entity, &ctx);

        // Walking into the player counts as contact too, gated on the
        // player's invulnerability window.
        if let Some(body) = collision::entity_box(world, entity) {
            if let Some(player) = collision::player_overlapping(world, &body) {
                let vulnerable = world
                    .get::<ActorKind>(player)
                    .and_then(|k| k.player())
                    .map(|s| s.freeze <= 0.0)
                    .unwrap_or(false);
                let alive = world
                    .get::<LifeState>(player)
                    .map(|l| l.is_alive())
                    .unwrap_or(false);
                if vulnerable && alive {
                    interaction::player_creature_contact(world, player, entity);
                }
            }
        }
        hazard::creature_hazards(world, entity, step);

        match read_creature(world, entity) {
            Ok(fresh) => ctx = fresh,
            Err(_) => return,
        }
        if ctx.life.terminated {
            return;
        }

        remaining -= step;
    }
    write_creature(world, entity, &ctx);
}
