//! Oscillating plants: drift, lifespan, decay.

use bevy_ecs::prelude::*;

use crate::components::{
    ActorKind, Acceleration, Health, LifeState, Orientation, PlantState, Position, Velocity,
};
use crate::error::SimError;
use crate::error::SimResult;
use crate::geometry::Axis;
use crate::systems::{collision, integrate, interaction, TIMER_SLACK};
use crate::terrain::TileGrid;

struct PlantCtx {
    state: PlantState,
    pos: Position,
    vel: Velocity,
    orient: Orientation,
    hp: i32,
    life: LifeState,
}

fn read_plant(world: &World, entity: Entity) -> SimResult<PlantCtx> {
    let kind = world.get::<ActorKind>(entity).ok_or(SimError::ActorNotFound)?;
    let state = *kind.plant().ok_or(SimError::ActorNotFound)?;
    Ok(PlantCtx {
        state,
        pos: *world.get::<Position>(entity).ok_or(SimError::ActorNotFound)?,
        vel: *world.get::<Velocity>(entity).ok_or(SimError::ActorNotFound)?,
        orient: *world
            .get::<Orientation>(entity)
            .ok_or(SimError::ActorNotFound)?,
        hp: world.get::<Health>(entity).ok_or(SimError::ActorNotFound)?.0,
        life: *world.get::<LifeState>(entity).ok_or(SimError::ActorNotFound)?,
    })
}

fn write_plant(world: &mut World, entity: Entity, ctx: &PlantCtx) {
    if let Some(mut kind) = world.get_mut::<ActorKind>(entity) {
        *kind = ActorKind::Plant(ctx.state);
    }
    if let Some(mut c) = world.get_mut::<Position>(entity) {
        *c = ctx.pos;
    }
    if let Some(mut c) = world.get_mut::<Velocity>(entity) {
        *c = ctx.vel;
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

fn position_valid(grid: &TileGrid, pos: Position) -> bool {
    if !pos.is_finite() || pos.x < 0.0 || pos.y < 0.0 {
        return false;
    }
    let (px, py) = pos.pixel();
    grid.contains(px, py)
}

/// Advance a plant by `dt`.
///
/// Plants sub-step at the fixed rate implied by their constant speed. A
/// plant past its lifespan (or dead) decays for `DECAY_TIME` and then
/// terminates.
pub fn advance_plant(world: &mut World, entity: Entity, dt: f32) {
    let Ok(mut ctx) = read_plant(world, entity) else {
        return;
    };
    if ctx.life.terminated {
        return;
    }

    let step_len = 0.01 / PlantState::SPEED;
    let mut remaining = dt;

    while remaining > 0.0 {
        let step = step_len.min(remaining);

        // Age advances with the sub-steps, so a single long call carries the
        // plant up to its lifespan but leaves the decay window to run out
        // across subsequent calls.
        ctx.state.age += step;
        if ctx.state.age >= ctx.state.species.lifespan() || ctx.life.dead {
            ctx.life.dead = true;
            ctx.hp = 0;
            ctx.state.decay_clock += step;
            if ctx.state.decay_clock >= PlantState::DECAY_TIME - TIMER_SLACK {
                write_plant(world, entity, &ctx);
                interaction::terminate(world, entity);
                return;
            }
        }

        ctx.state.shift_clock += step;
        if ctx.state.shift_clock > PlantState::SHIFT_PERIOD {
            ctx.orient = ctx.orient.flipped();
            ctx.vel = match ctx.state.species.axis() {
                Axis::Horizontal => Velocity::new(ctx.orient.sign() * PlantState::SPEED, 0.0),
                Axis::Vertical => Velocity::new(0.0, ctx.orient.sign() * PlantState::SPEED),
            };
            ctx.state.shift_clock -= PlantState::SHIFT_PERIOD;
        }

        let (npos, _) = integrate(ctx.pos, ctx.vel, Acceleration::default(), step);
        if !position_valid(world.resource::<TileGrid>(), npos) {
            write_plant(world, entity, &ctx);
            interaction::terminate(world, entity);
            return;
        }
        ctx.pos = npos;
        write_plant(world, entity, &ctx);

        // Feeding is evaluated from the plant side too, so a motionless
        // player still gets fed and the hoverbud bite clock stays honest.
        if let Some(body) = collision::entity_box(world, entity) {
            match collision::player_overlapping(world, &body) {
                Some(player) => {
                    interaction::player_plant_contact(world, player, entity, step);
                }
                None => {
                    if ctx.state.species.axis() == Axis::Vertical {
                        ctx.state.bite_clock = 0.0;
                        write_plant(world, entity, &ctx);
                    }
                }
            }
        }

        match read_plant(world, entity) {
            Ok(fresh) => ctx = fresh,
            Err(_) => return,
        }
        if ctx.life.terminated {
            return;
        }

        remaining -= step;
    }
    write_plant(world, entity, &ctx);
}
