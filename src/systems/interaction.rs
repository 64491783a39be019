//! Cross-entity interaction rules: health adjustment, termination, plant
//! eating, creature contact and flock transfer.

use bevy_ecs::prelude::*;

use crate::components::{
    admitted_health, ActorKind, Acceleration, Health, LifeState, PlantState, PlayerState, Velocity,
};
use crate::flock::{FlockId, FlockRegistry};
use crate::systems::collision;

/// Health lost by the player when touching a creature while moving.
pub const PLAYER_CONTACT_DAMAGE: i32 = 20;
/// Health lost by a creature on player contact.
pub const CREATURE_CONTACT_DAMAGE: i32 = 30;
/// Health gained by the player from eating a live plant.
pub const PLANT_MEAL: i32 = 50;
/// Health lost by the player from touching a dead plant.
pub const DEAD_PLANT_DAMAGE: i32 = 20;
/// Health delta shared with every other flock member on creature damage.
pub const FLOCK_SHARE: i32 = -1;

/// Apply a health delta through the variant's range rule. Out-of-range
/// results default to zero; dead or terminated actors are untouched.
pub fn adjust_health(world: &mut World, entity: Entity, delta: i32) {
    let Some(kind) = world.get::<ActorKind>(entity).copied() else {
        return;
    };
    let Some(life) = world.get::<LifeState>(entity).copied() else {
        return;
    };
    if life.dead || life.terminated {
        return;
    }
    let Some(hp) = world.get::<Health>(entity).copied() else {
        return;
    };
    let next = admitted_health(&kind, hp.0 + delta);
    if let Some(mut h) = world.get_mut::<Health>(entity) {
        *h = next;
    }
}

/// Permanently remove an actor from play: zero health, clear motion, leave
/// its flock. The entity stays queryable until the facade drops it.
pub fn terminate(world: &mut World, entity: Entity) {
    let flock = world
        .get::<ActorKind>(entity)
        .and_then(|k| k.creature())
        .and_then(|c| c.flock);
    if let Some(f) = flock {
        world.resource_mut::<FlockRegistry>().withdraw(f, entity);
    }
    if let Some(mut life) = world.get_mut::<LifeState>(entity) {
        life.dead = true;
        life.terminated = true;
    }
    if let Some(mut h) = world.get_mut::<Health>(entity) {
        *h = Health(0);
    }
    if let Some(mut v) = world.get_mut::<Velocity>(entity) {
        *v = Velocity::default();
    }
    if let Some(mut a) = world.get_mut::<Acceleration>(entity) {
        *a = Acceleration::default();
    }
}

/// Share a health delta with every other member of the creature's flock.
pub fn share_flock_delta(world: &mut World, creature: Entity, delta: i32) {
    let Some(flock) = world
        .get::<ActorKind>(creature)
        .and_then(|k| k.creature())
        .and_then(|c| c.flock)
    else {
        return;
    };
    let mates: Vec<Entity> = world
        .resource::<FlockRegistry>()
        .members(flock)
        .iter()
        .copied()
        .filter(|m| *m != creature)
        .collect();
    for mate in mates {
        adjust_health(world, mate, delta);
    }
}

/// Move a creature between flocks, walking the documented +-1 exchange:
/// leaving costs the mover one point per old mate (each old mate gains one),
/// joining earns one point per new mate (each new mate loses one).
pub fn transfer_flock(world: &mut World, mover: Entity, from: FlockId, to: FlockId) {
    let old_mates: Vec<Entity> = world
        .resource::<FlockRegistry>()
        .members(from)
        .iter()
        .copied()
        .filter(|m| *m != mover)
        .collect();
    for mate in old_mates {
        adjust_health(world, mate, 1);
        adjust_health(world, mover, -1);
    }

    {
        let mut reg = world.resource_mut::<FlockRegistry>();
        reg.withdraw(from, mover);
        reg.enroll(to, mover).ok();
    }
    if let Some(mut kind) = world.get_mut::<ActorKind>(mover) {
        if let Some(c) = kind.creature_mut() {
            c.flock = Some(to);
        }
    }

    let new_mates: Vec<Entity> = world
        .resource::<FlockRegistry>()
        .members(to)
        .iter()
        .copied()
        .filter(|m| *m != mover)
        .collect();
    for mate in new_mates {
        adjust_health(world, mate, -1);
        adjust_health(world, mover, 1);
    }
}

/// Creature-creature overlap: the member of the smaller flock transfers into
/// the larger one. Equal sizes and flock-less creatures do not transfer.
/// Direction reversal of the initiator is handled by the caller.
pub fn creature_creature_contact(world: &mut World, initiator: Entity, other: Entity) {
    let flock_of = |world: &World, e: Entity| {
        world
            .get::<ActorKind>(e)
            .and_then(|k| k.creature())
            .and_then(|c| c.flock)
    };
    let (Some(fa), Some(fb)) = (flock_of(world, initiator), flock_of(world, other)) else {
        return;
    };
    if fa == fb {
        return;
    }
    let (ca, cb) = {
        let reg = world.resource::<FlockRegistry>();
        (reg.member_count(fa), reg.member_count(fb))
    };
    if ca < cb {
        transfer_flock(world, initiator, fa, fb);
    } else if cb < ca {
        transfer_flock(world, other, fb, fa);
    }
}

/// Player-creature overlap. The caller has already checked that the player
/// is alive and not briefly invulnerable.
pub fn player_creature_contact(world: &mut World, player: Entity, creature: Entity) {
    let Some(player_box) = collision::entity_box(world, player) else {
        return;
    };
    let Some(creature_box) = collision::entity_box(world, creature) else {
        return;
    };
    let Some(player_moving) = world
        .get::<ActorKind>(player)
        .and_then(|k| k.player())
        .map(|s| s.moving)
    else {
        return;
    };

    // Side-on contact (intersecting vertical extents) knocks the creature
    // out of its patrol; a clean stomp from directly above or below leaves
    // it moving.
    let vertically_aligned =
        player_box.y <= creature_box.top() && player_box.top() >= creature_box.y;

    adjust_health(world, creature, -CREATURE_CONTACT_DAMAGE);
    share_flock_delta(world, creature, FLOCK_SHARE);
    if vertically_aligned {
        if let Some(mut v) = world.get_mut::<Velocity>(creature) {
            *v = Velocity::default();
        }
        if let Some(mut a) = world.get_mut::<Acceleration>(creature) {
            *a = Acceleration::default();
        }
    }

    if player_moving {
        adjust_health(world, player, -PLAYER_CONTACT_DAMAGE);
    }
    if let Some(mut kind) = world.get_mut::<ActorKind>(player) {
        if let Some(s) = kind.player_mut() {
            s.freeze = PlayerState::FREEZE_TIME;
        }
    }
}

/// Player-plant overlap for one sub-step of length `dt`.
///
/// A live plant feeds the player unless the player is at full health; the
/// hoverbud species additionally spaces its bites by a sustained-contact
/// delay. A dead (decaying) plant poisons the player and terminates.
pub fn player_plant_contact(world: &mut World, player: Entity, plant: Entity, dt: f32) {
    let Some(life) = world.get::<LifeState>(plant).copied() else {
        return;
    };
    if life.terminated {
        return;
    }

    if life.dead {
        adjust_health(world, player, -DEAD_PLANT_DAMAGE);
        terminate(world, plant);
        return;
    }

    let Some(player_hp) = world.get::<Health>(player).copied() else {
        return;
    };
    if player_hp.0 == PlayerState::MAX_HEALTH {
        return;
    }

    let Some(state) = world
        .get::<ActorKind>(plant)
        .and_then(|k| k.plant())
        .copied()
    else {
        return;
    };

    let bite = if state.species.axis() == crate::geometry::Axis::Vertical {
        // Sustained-contact clock: the first bite is immediate, later bites
        // need BITE_DELAY of accumulated contact.
        let mut clock = state.bite_clock + dt;
        let bite = clock >= 0.0;
        if bite {
            clock -= PlantState::BITE_DELAY;
        }
        if let Some(mut kind) = world.get_mut::<ActorKind>(plant) {
            if let Some(p) = kind.plant_mut() {
                p.bite_clock = clock;
            }
        }
        bite
    } else {
        true
    };

    if bite {
        adjust_health(world, player, PLANT_MEAL);
        adjust_health(world, plant, -1);
        let eaten = world.get::<Health>(plant).map(|h| h.0 == 0).unwrap_or(false);
        if eaten {
            terminate(world, plant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ActorBundle, PlantSpecies};
    use crate::systems::Roster;

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(FlockRegistry::default());
        world.insert_resource(Roster::default());
        world
    }

    fn spawn_creature(world: &mut World, id: u64, flock: Option<FlockId>, x: f32) -> Entity {
        let bundle = ActorBundle::creature(id, flock, x, 0.0, vec![(10, 10); 2]).unwrap();
        let e = world.spawn(bundle).id();
        if let Some(f) = flock {
            world.resource_mut::<FlockRegistry>().enroll(f, e).unwrap();
        }
        world.resource_mut::<Roster>().entries.push(e);
        e
    }

    #[test]
    fn adjust_health_defaults_out_of_range_to_zero() {
        let mut world = test_world();
        let e = spawn_creature(&mut world, 1, None, 0.0);
        adjust_health(&mut world, e, -150);
        assert_eq!(world.get::<Health>(e).unwrap().0, 0);
    }

    #[test]
    fn terminate_clears_motion_and_flock() {
        let mut world = test_world();
        let f = world.resource_mut::<FlockRegistry>().create().unwrap();
        let e = spawn_creature(&mut world, 1, Some(f), 0.0);
        terminate(&mut world, e);
        assert!(world.get::<LifeState>(e).unwrap().terminated);
        assert_eq!(world.get::<Health>(e).unwrap().0, 0);
        assert_eq!(world.resource::<FlockRegistry>().member_count(f), 0);
    }

    #[test]
    fn transfer_walks_the_documented_exchange() {
        // Flocks of size 3 and 5: the mover leaves the size-3 flock. Every
        // old mate gains exactly one point, every new mate loses exactly
        // one, and the mover nets -2 + 5 = +3.
        let mut world = test_world();
        let small = world.resource_mut::<FlockRegistry>().create().unwrap();
        let large = world.resource_mut::<FlockRegistry>().create().unwrap();
        let mut small_members = Vec::new();
        let mut large_members = Vec::new();
        for i in 0..3 {
            small_members.push(spawn_creature(&mut world, i, Some(small), i as f32));
        }
        for i in 3..8 {
            large_members.push(spawn_creature(&mut world, i, Some(large), i as f32));
        }

        let mover = small_members[0];
        creature_creature_contact(&mut world, mover, large_members[0]);

        assert_eq!(
            world
                .get::<ActorKind>(mover)
                .unwrap()
                .creature()
                .unwrap()
                .flock,
            Some(large)
        );
        assert_eq!(world.resource::<FlockRegistry>().member_count(small), 2);
        assert_eq!(world.resource::<FlockRegistry>().member_count(large), 6);

        assert_eq!(world.get::<Health>(mover).unwrap().0, 103);
        for m in &small_members[1..] {
            assert_eq!(world.get::<Health>(*m).unwrap().0, 101);
        }
        for m in &large_members {
            assert_eq!(world.get::<Health>(*m).unwrap().0, 99);
        }
    }

    #[test]
    fn equal_flocks_do_not_transfer() {
        let mut world = test_world();
        let a = world.resource_mut::<FlockRegistry>().create().unwrap();
        let b = world.resource_mut::<FlockRegistry>().create().unwrap();
        let e1 = spawn_creature(&mut world, 1, Some(a), 0.0);
        let e2 = spawn_creature(&mut world, 2, Some(b), 1.0);
        creature_creature_contact(&mut world, e1, e2);
        assert_eq!(
            world.get::<ActorKind>(e1).unwrap().creature().unwrap().flock,
            Some(a)
        );
        assert_eq!(world.get::<Health>(e1).unwrap().0, 100);
        assert_eq!(world.get::<Health>(e2).unwrap().0, 100);
    }

    #[test]
    fn side_contact_stops_the_creature_but_a_stomp_does_not() {
        let mut world = test_world();
        let player = world
            .spawn(ActorBundle::player(1.0, 1.0, vec![(50, 100); 10]).unwrap())
            .id();
        world.resource_mut::<Roster>().player = Some(player);
        world.resource_mut::<Roster>().entries.push(player);

        // Side-on: the vertical extents intersect, so the hit knocks the
        // creature out of its patrol.
        let side = spawn_creature(&mut world, 1, None, 1.5);
        world.get_mut::<crate::components::Position>(side).unwrap().y = 1.0;
        *world.get_mut::<Velocity>(side).unwrap() = Velocity::new(1.0, 0.0);
        *world.get_mut::<Acceleration>(side).unwrap() = Acceleration::new(0.7, 0.0);
        player_creature_contact(&mut world, player, side);
        assert_eq!(world.get::<Velocity>(side).unwrap().vx, 0.0);
        assert_eq!(world.get::<Acceleration>(side).unwrap().ax, 0.0);
        assert_eq!(world.get::<Health>(side).unwrap().0, 70);

        // Stomped from directly above: the player's bottom row sits on the
        // pixel row just past the creature's top, so it keeps moving.
        let below = spawn_creature(&mut world, 2, None, 1.0);
        world.get_mut::<crate::components::Position>(below).unwrap().y = 0.9;
        *world.get_mut::<Velocity>(below).unwrap() = Velocity::new(1.0, 0.0);
        player_creature_contact(&mut world, player, below);
        assert_eq!(world.get::<Velocity>(below).unwrap().vx, 1.0);
        assert_eq!(world.get::<Health>(below).unwrap().0, 70);
    }

    #[test]
    fn eating_at_full_health_is_a_no_op() {
        let mut world = test_world();
        let player = world
            .spawn(ActorBundle::player(1.0, 1.0, vec![(50, 100); 10]).unwrap())
            .id();
        world.resource_mut::<Roster>().player = Some(player);
        world.resource_mut::<Roster>().entries.push(player);
        if let Some(mut h) = world.get_mut::<Health>(player) {
            *h = Health(PlayerState::MAX_HEALTH);
        }
        let plant = world
            .spawn(ActorBundle::plant(PlantSpecies::Creeper, 1.0, 1.0, vec![(8, 8); 2]).unwrap())
            .id();
        world.resource_mut::<Roster>().entries.push(plant);

        player_plant_contact(&mut world, player, plant, 0.02);
        assert_eq!(world.get::<Health>(player).unwrap().0, 500);
        assert_eq!(world.get::<Health>(plant).unwrap().0, 1);
        assert!(!world.get::<LifeState>(plant).unwrap().terminated);
    }

    #[test]
    fn eating_a_creeper_terminates_it() {
        let mut world = test_world();
        let player = world
            .spawn(ActorBundle::player(1.0, 1.0, vec![(50, 100); 10]).unwrap())
            .id();
        world.resource_mut::<Roster>().player = Some(player);
        world.resource_mut::<Roster>().entries.push(player);
        let plant = world
            .spawn(ActorBundle::plant(PlantSpecies::Creeper, 1.0, 1.0, vec![(8, 8); 2]).unwrap())
            .id();
        world.resource_mut::<Roster>().entries.push(plant);

        player_plant_contact(&mut world, player, plant, 0.02);
        assert_eq!(world.get::<Health>(player).unwrap().0, 150);
        assert!(world.get::<LifeState>(plant).unwrap().terminated);
    }

    #[test]
    fn overfeeding_defaults_player_health_to_zero() {
        // 470 + 50 lands outside the player's range and therefore zeroes.
        let mut world = test_world();
        let player = world
            .spawn(ActorBundle::player(1.0, 1.0, vec![(50, 100); 10]).unwrap())
            .id();
        world.resource_mut::<Roster>().player = Some(player);
        world.resource_mut::<Roster>().entries.push(player);
        if let Some(mut h) = world.get_mut::<Health>(player) {
            *h = Health(470);
        }
        let plant = world
            .spawn(ActorBundle::plant(PlantSpecies::Creeper, 1.0, 1.0, vec![(8, 8); 2]).unwrap())
            .id();
        world.resource_mut::<Roster>().entries.push(plant);

        player_plant_contact(&mut world, player, plant, 0.02);
        assert_eq!(world.get::<Health>(player).unwrap().0, 0);
    }

    #[test]
    fn hoverbud_bites_are_spaced_by_the_delay() {
        let mut world = test_world();
        let player = world
            .spawn(ActorBundle::player(1.0, 1.0, vec![(50, 100); 10]).unwrap())
            .id();
        world.resource_mut::<Roster>().player = Some(player);
        world.resource_mut::<Roster>().entries.push(player);
        let plant = world
            .spawn(ActorBundle::plant(PlantSpecies::Hoverbud, 1.0, 1.0, vec![(8, 8); 2]).unwrap())
            .id();
        world.resource_mut::<Roster>().entries.push(plant);

        // First contact bites immediately.
        player_plant_contact(&mut world, player, plant, 0.02);
        assert_eq!(world.get::<Health>(player).unwrap().0, 150);
        assert_eq!(world.get::<Health>(plant).unwrap().0, 2);

        // Sustained contact below the delay does not bite again.
        for _ in 0..10 {
            player_plant_contact(&mut world, player, plant, 0.02);
        }
        assert_eq!(world.get::<Health>(plant).unwrap().0, 2);

        // Enough accumulated contact releases the next bite.
        for _ in 0..25 {
            player_plant_contact(&mut world, player, plant, 0.02);
        }
        assert_eq!(world.get::<Health>(plant).unwrap().0, 1);
    }

    #[test]
    fn dead_plant_contact_poisons_and_terminates() {
        let mut world = test_world();
        let player = world
            .spawn(ActorBundle::player(1.0, 1.0, vec![(50, 100); 10]).unwrap())
            .id();
        world.resource_mut::<Roster>().player = Some(player);
        world.resource_mut::<Roster>().entries.push(player);
        let plant = world
            .spawn(ActorBundle::plant(PlantSpecies::Creeper, 1.0, 1.0, vec![(8, 8); 2]).unwrap())
            .id();
        world.resource_mut::<Roster>().entries.push(plant);
        world.get_mut::<LifeState>(plant).unwrap().dead = true;

        player_plant_contact(&mut world, player, plant, 0.02);
        assert_eq!(world.get::<Health>(player).unwrap().0, 80);
        assert!(world.get::<LifeState>(plant).unwrap().terminated);
    }
}
