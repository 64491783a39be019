//! Player character: command state machine and sub-stepped advance.

use bevy_ecs::prelude::*;

use crate::components::{
    sprite_index, ActorKind, Acceleration, Health, Kinematics, LifeState, Orientation, PlayerState,
    Position, SpriteSheet, Velocity,
};
use crate::error::{SimError, SimResult};
use crate::geometry::{meters_to_pixel, PixelRect};
use crate::systems::{
    collision, hazard, integrate, interaction, substep_increment, GameFlags, TIMER_SLACK,
};
use crate::terrain::TileGrid;

/// Copied-out player component state for one sub-step of computation.
/// Written back before any cross-entity interaction runs.
struct PlayerCtx {
    state: PlayerState,
    pos: Position,
    vel: Velocity,
    acc: Acceleration,
    orient: Orientation,
    hp: i32,
    life: LifeState,
}

fn read_player(world: &World, player: Entity) -> SimResult<PlayerCtx> {
    let kind = world.get::<ActorKind>(player).ok_or(SimError::ActorNotFound)?;
    let state = *kind.player().ok_or(SimError::ActorNotFound)?;
    Ok(PlayerCtx {
        state,
        pos: *world.get::<Position>(player).ok_or(SimError::ActorNotFound)?,
        vel: *world.get::<Velocity>(player).ok_or(SimError::ActorNotFound)?,
        acc: *world
            .get::<Acceleration>(player)
            .ok_or(SimError::ActorNotFound)?,
        orient: *world
            .get::<Orientation>(player)
            .ok_or(SimError::ActorNotFound)?,
        hp: world.get::<Health>(player).ok_or(SimError::ActorNotFound)?.0,
        life: *world.get::<LifeState>(player).ok_or(SimError::ActorNotFound)?,
    })
}

fn write_player(world: &mut World, player: Entity, ctx: &PlayerCtx) {
    if let Some(mut kind) = world.get_mut::<ActorKind>(player) {
        *kind = ActorKind::Player(ctx.state);
    }
    if let Some(mut c) = world.get_mut::<Position>(player) {
        *c = ctx.pos;
    }
    if let Some(mut c) = world.get_mut::<Velocity>(player) {
        *c = ctx.vel;
    }
    if let Some(mut c) = world.get_mut::<Acceleration>(player) {
        *c = ctx.acc;
    }
    if let Some(mut c) = world.get_mut::<Orientation>(player) {
        *c = ctx.orient;
    }
    if let Some(mut c) = world.get_mut::<Health>(player) {
        *c = Health(ctx.hp);
    }
    if let Some(mut c) = world.get_mut::<LifeState>(player) {
        *c = ctx.life;
    }
}

fn require_alive(ctx: &PlayerCtx) -> SimResult<()> {
    if ctx.life.is_alive() {
        Ok(())
    } else {
        Err(SimError::CommandRejected("player is dead"))
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Start running toward `dir` (+1 right, -1 left).
pub fn start_move(world: &mut World, player: Entity, dir: i32) -> SimResult<()> {
    if dir != 1 && dir != -1 {
        return Err(SimError::CommandRejected("direction must be +-1"));
    }
    let mut ctx = read_player(world, player)?;
    require_alive(&ctx)?;
    if ctx.state.moving {
        return Err(SimError::CommandRejected("already moving"));
    }
    ctx.state.moving = true;
    ctx.orient = Orientation(dir);
    ctx.vel.vx = dir as f32 * PlayerState::MIN_RUN_SPEED;
    ctx.acc.ax = if ctx.state.ducking {
        0.0
    } else {
        dir as f32 * PlayerState::RUN_ACCEL
    };
    write_player(world, player, &ctx);
    Ok(())
}

/// Stop running.
pub fn end_move(world: &mut World, player: Entity) -> SimResult<()> {
    let mut ctx = read_player(world, player)?;
    require_alive(&ctx)?;
    if !ctx.state.moving {
        return Err(SimError::CommandRejected("not moving"));
    }
    ctx.state.moving = false;
    ctx.vel.vx = 0.0;
    ctx.acc.ax = 0.0;
    ctx.state.run_clock = 0.0;
    ctx.state.run_frame = 0;
    write_player(world, player, &ctx);
    Ok(())
}

/// Jump. Rejected while already jumping.
pub fn start_jump(world: &mut World, player: Entity) -> SimResult<()> {
    let mut ctx = read_player(world, player)?;
    require_alive(&ctx)?;
    if ctx.state.jumping {
        return Err(SimError::CommandRejected("already jumping"));
    }
    ctx.state.jumping = true;
    ctx.vel.vy = PlayerState::JUMP_SPEED;
    ctx.acc.ay = PlayerState::GRAVITY;
    write_player(world, player, &ctx);
    Ok(())
}

/// Cut the jump short: upward velocity is dropped, falling continues.
pub fn end_jump(world: &mut World, player: Entity) -> SimResult<()> {
    let mut ctx = read_player(world, player)?;
    require_alive(&ctx)?;
    if !ctx.state.jumping {
        return Err(SimError::CommandRejected("not jumping"));
    }
    ctx.state.jumping = false;
    if ctx.vel.vy > 0.0 {
        ctx.vel.vy = 0.0;
    }
    write_player(world, player, &ctx);
    Ok(())
}

/// Duck: caps run speed and stops horizontal acceleration.
pub fn start_duck(world: &mut World, player: Entity) -> SimResult<()> {
    let mut ctx = read_player(world, player)?;
    require_alive(&ctx)?;
    ctx.state.ducking = true;
    ctx.state.duck_end_pending = false;
    if ctx.vel.vx.abs() > PlayerState::MAX_DUCK_SPEED {
        ctx.vel.vx = ctx.orient.sign() * PlayerState::MAX_DUCK_SPEED;
    }
    ctx.acc.ax = 0.0;
    write_player(world, player, &ctx);
    Ok(())
}

/// Stand back up. If the standing pose would sit inside impassable terrain
/// the request stays pending and is retried every sub-step.
pub fn end_duck(world: &mut World, player: Entity) -> SimResult<()> {
    let mut ctx = read_player(world, player)?;
    require_alive(&ctx)?;
    if !ctx.state.ducking {
        return Err(SimError::CommandRejected("not ducking"));
    }
    try_stand_up(world, player, &mut ctx);
    write_player(world, player, &ctx);
    Ok(())
}

/// Attempt the pending stand-up; keeps `duck_end_pending` set while blocked.
fn try_stand_up(world: &World, player: Entity, ctx: &mut PlayerCtx) {
    let Some(sheet) = world.get::<SpriteSheet>(player) else {
        return;
    };
    let standing = PlayerState {
        ducking: false,
        ..ctx.state
    };
    let kind = ActorKind::Player(standing);
    let (w, h) = sheet.frame(sprite_index(&kind, ctx.orient, sheet));
    let (px, py) = ctx.pos.pixel();
    let body = PixelRect::new(px, py, w, h);
    let blocked = world
        .resource::<TileGrid>()
        .rect_overlaps_impassable(&collision::inner_body(&body));
    if blocked {
        ctx.state.duck_end_pending = true;
        return;
    }
    ctx.state.ducking = false;
    ctx.state.duck_end_pending = false;
    if ctx.state.moving {
        ctx.acc.ax = ctx.orient.sign() * PlayerState::RUN_ACCEL;
        if ctx.vel.vx.abs() < PlayerState::MIN_RUN_SPEED {
            ctx.vel.vx = ctx.orient.sign() * PlayerState::MIN_RUN_SPEED;
        }
    }
}

// ============================================================================
// ADVANCE
// ============================================================================

fn position_valid(grid: &TileGrid, pos: Position) -> bool {
    if !pos.is_finite() || pos.x < 0.0 || pos.y < 0.0 {
        return false;
    }
    let (px, py) = pos.pixel();
    grid.contains(px, py)
}

/// Advance the player by `dt`, sub-stepping through movement, collision,
/// interaction, hazards and death management.
pub fn advance_player(world: &mut World, player: Entity, dt: f32) {
    let Ok(mut ctx) = read_player(world, player) else {
        return;
    };
    if ctx.life.terminated {
        return;
    }
    let Some(sheet) = world.get::<SpriteSheet>(player).cloned() else {
        return;
    };

    // Gravity holds for the whole advance unless a landing zeroes it.
    if !ctx.life.dead {
        ctx.acc.ay = PlayerState::GRAVITY;
    }

    let mut remaining = dt;
    while remaining > 0.0 {
        if ctx.life.dead {
            // A dead player only counts down to game over.
            ctx.state.death_clock += remaining;
            if ctx.state.death_clock >= PlayerState::DEATH_LINGER - TIMER_SLACK {
                write_player(world, player, &ctx);
                world.resource_mut::<GameFlags>().game_over = true;
                interaction::terminate(world, player);
                return;
            }
            break;
        }

        let step = substep_increment(ctx.vel, ctx.acc, remaining);

        if ctx.state.duck_end_pending {
            try_stand_up(world, player, &mut ctx);
        }

        let kind = ActorKind::Player(ctx.state);
        let (w, h) = sheet.frame(sprite_index(&kind, ctx.orient, &sheet));

        let (mut npos, raw_vel) = integrate(ctx.pos, ctx.vel, ctx.acc, step);
        let mut nvel = ctx
            .state
            .correct_velocity(raw_vel, ctx.orient)
            .unwrap_or(ctx.vel);

        // Horizontal axis: terrain and creature bodies block travel.
        let hdir = match npos.x.partial_cmp(&ctx.pos.x) {
            Some(std::cmp::Ordering::Greater) => 1,
            Some(std::cmp::Ordering::Less) => -1,
            _ => 0,
        };
        if hdir != 0 {
            let cand = PixelRect::new(meters_to_pixel(npos.x), meters_to_pixel(ctx.pos.y), w, h);
            let strip = collision::leading_column(&cand, hdir);
            let blocked = world.resource::<TileGrid>().rect_overlaps_impassable(&strip)
                || !collision::creatures_overlapping(world, &strip, Some(player)).is_empty();
            if blocked {
                npos.x = ctx.pos.x;
                nvel.vx = 0.0;
                ctx.acc.ax = 0.0;
                ctx.state.moving = false;
            }
        }

        // Vertical axis, against the horizontally resolved position.
        let vdir = match npos.y.partial_cmp(&ctx.pos.y) {
            Some(std::cmp::Ordering::Greater) => 1,
            Some(std::cmp::Ordering::Less) => -1,
            _ => 0,
        };
        if vdir != 0 {
            let cand = PixelRect::new(meters_to_pixel(npos.x), meters_to_pixel(npos.y), w, h);
            let strip = collision::leading_row(&cand, vdir);
            let blocked = world.resource::<TileGrid>().rect_overlaps_impassable(&strip)
                || !collision::creatures_overlapping(world, &strip, Some(player)).is_empty();
            if blocked {
                npos.y = ctx.pos.y;
                nvel.vy = 0.0;
                ctx.acc.ay = 0.0;
                ctx.state.jumping = false;
            }
        }

        if !position_valid(world.resource::<TileGrid>(), npos) {
            write_player(world, player, &ctx);
            world.resource_mut::<GameFlags>().game_over = true;
            interaction::terminate(world, player);
            return;
        }
        ctx.pos = npos;
        ctx.vel = nvel;

        // Interactions read the written-back state.
        write_player(world, player, &ctx);
        if let Some(body) = collision::entity_box(world, player) {
            for plant in collision::plants_overlapping(world, &body) {
                interaction::player_plant_contact(world, player, plant, step);
            }
            // Re-read the freeze flag per creature: the first contact starts
            // the invulnerability window, shielding the rest of the pile.
            for creature in collision::creatures_overlapping(world, &body, Some(player)) {
                let vulnerable = world
                    .get::<ActorKind>(player)
                    .and_then(|k| k.player())
                    .map(|s| s.freeze <= 0.0)
                    .unwrap_or(false);
                if !vulnerable {
                    break;
                }
                interaction::player_creature_contact(world, player, creature);
            }
        }
        hazard::player_hazards(world, player, step);

        let Ok(fresh) = read_player(world, player) else {
            return;
        };
        ctx = fresh;
        if ctx.life.terminated {
            return;
        }

        if ctx.hp == 0 && !ctx.life.dead {
            ctx.life.dead = true;
            ctx.state.moving = false;
            ctx.state.jumping = false;
            ctx.vel = Velocity::default();
            ctx.acc = Acceleration::default();
        }

        ctx.state.freeze = (ctx.state.freeze - step).max(0.0);
        if ctx.state.moving {
            ctx.state.run_clock += step;
            while ctx.state.run_clock >= PlayerState::RUN_FRAME_TIME {
                ctx.state.run_clock -= PlayerState::RUN_FRAME_TIME;
                ctx.state.run_frame = ctx.state.run_frame.wrapping_add(1);
            }
        } else {
            ctx.state.run_clock = 0.0;
            ctx.state.run_frame = 0;
        }

        remaining -= step;
    }
    write_player(world, player, &ctx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ActorBundle;
    use crate::flock::FlockRegistry;
    use crate::systems::Roster;

    fn floor_world() -> World {
        let mut world = World::new();
        let mut codes = vec![0; 100];
        for tx in 0..10 {
            codes[tx] = 1;
        }
        world.insert_resource(TileGrid::new(100, 10, 10, &codes));
        world.insert_resource(FlockRegistry::default());
        world.insert_resource(Roster::default());
        world.insert_resource(GameFlags::default());
        world
    }

    #[test]
    fn first_creature_contact_shields_the_rest_of_the_pile() {
        let mut world = floor_world();
        let player = world
            .spawn(ActorBundle::player(1.0, 1.0, vec![(50, 80); 10]).unwrap())
            .id();
        {
            let mut roster = world.resource_mut::<Roster>();
            roster.player = Some(player);
            roster.entries.push(player);
        }
        let mut creatures = Vec::new();
        for (id, x) in [(1u64, 1.2f32), (2, 1.3)] {
            let e = world
                .spawn(ActorBundle::creature(id, None, x, 1.0, vec![(40, 40); 2]).unwrap())
                .id();
            world.resource_mut::<Roster>().entries.push(e);
            creatures.push(e);
        }

        advance_player(&mut world, player, 0.001);

        // The first hit starts the invulnerability window, so exactly one
        // creature of the overlapping pile takes contact damage.
        let healths: Vec<i32> = creatures
            .iter()
            .map(|c| world.get::<Health>(*c).unwrap().0)
            .collect();
        assert_eq!(healths, vec![70, 100]);
        let freeze = world
            .get::<ActorKind>(player)
            .unwrap()
            .player()
            .unwrap()
            .freeze;
        assert!(freeze > 0.0);
    }
}
