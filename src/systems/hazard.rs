//! Hazardous terrain contact.
//!
//! Each actor carries its own contact clock; the clock resets whenever the
//! dominant hazard under the body changes. Magma dominates gas, gas
//! dominates water.

use bevy_ecs::prelude::*;

use crate::components::{ActorKind, Health, HazardClock, LifeState};
use crate::systems::{collision, interaction, TIMER_SLACK};
use crate::terrain::{TerrainFeature, TileGrid};

pub const PLAYER_MAGMA_DAMAGE: i32 = 50;
pub const PLAYER_GAS_DAMAGE: i32 = 4;
pub const PLAYER_WATER_DAMAGE: i32 = 2;
/// All three player cadences share the same period.
pub const PLAYER_HAZARD_PERIOD: f32 = 0.2;

pub const CREATURE_GAS_HEAL: i32 = 2;
pub const CREATURE_GAS_PERIOD: f32 = 0.3;
pub const CREATURE_WATER_DAMAGE: i32 = 4;
pub const CREATURE_WATER_PERIOD: f32 = 0.4;

/// Most dangerous hazard under the body, if any.
fn dominant_hazard(grid: &TileGrid, body: &crate::geometry::PixelRect) -> Option<TerrainFeature> {
    for feature in [
        TerrainFeature::Magma,
        TerrainFeature::Gas,
        TerrainFeature::Water,
    ] {
        if grid.rect_overlaps_feature(body, feature) {
            return Some(feature);
        }
    }
    None
}

/// Apply one sub-step of hazard contact to the player.
///
/// Magma and gas damage immediately on contact and then once per period;
/// water grants one free period before its cadence starts.
pub fn player_hazards(world: &mut World, player: Entity, dt: f32) {
    let Some(body) = collision::entity_box(world, player) else {
        return;
    };
    let hazard = dominant_hazard(world.resource::<TileGrid>(), &body);

    let Some(mut clock) = world
        .get::<ActorKind>(player)
        .and_then(|k| k.player())
        .map(|s| s.hazard)
    else {
        return;
    };

    let mut damage = 0i32;
    if hazard != clock.current {
        clock = HazardClock {
            current: hazard,
            clock: 0.0,
        };
        match hazard {
            Some(TerrainFeature::Magma) => damage += PLAYER_MAGMA_DAMAGE,
            Some(TerrainFeature::Gas) => damage += PLAYER_GAS_DAMAGE,
            _ => {}
        }
    }
    if let Some(feature) = clock.current {
        let delta = match feature {
            TerrainFeature::Magma => PLAYER_MAGMA_DAMAGE,
            TerrainFeature::Gas => PLAYER_GAS_DAMAGE,
            _ => PLAYER_WATER_DAMAGE,
        };
        clock.clock += dt;
        while clock.clock >= PLAYER_HAZARD_PERIOD - TIMER_SLACK {
            damage += delta;
            clock.clock -= PLAYER_HAZARD_PERIOD;
        }
    }

    if let Some(mut kind) = world.get_mut::<ActorKind>(player) {
        if let Some(s) = kind.player_mut() {
            s.hazard = clock;
        }
    }
    if damage > 0 {
        interaction::adjust_health(world, player, -damage);
    }
}

/// Apply one sub-step of hazard contact to a creature.
///
/// Magma is instantly lethal. Gas heals on a 0.3 s cadence; water damages
/// once per *full* 0.4 s of submersion (a stay of exactly one period does
/// not trigger a second application). Every periodic delta is shared with
/// the rest of the flock at -1 per mate.
pub fn creature_hazards(world: &mut World, creature: Entity, dt: f32) {
    let Some(body) = collision::entity_box(world, creature) else {
        return;
    };
    let hazard = dominant_hazard(world.resource::<TileGrid>(), &body);

    let Some(mut clock) = world
        .get::<ActorKind>(creature)
        .and_then(|k| k.creature())
        .map(|s| s.hazard)
    else {
        return;
    };

    if hazard != clock.current {
        clock = HazardClock {
            current: hazard,
            clock: 0.0,
        };
    }

    let mut deltas = 0i32;
    let mut applications = 0u32;
    match clock.current {
        Some(TerrainFeature::Magma) => {
            if let Some(mut h) = world.get_mut::<Health>(creature) {
                *h = Health(0);
            }
            if let Some(mut life) = world.get_mut::<LifeState>(creature) {
                life.dead = true;
            }
        }
        Some(TerrainFeature::Gas) => {
            clock.clock += dt;
            while clock.clock >= CREATURE_GAS_PERIOD - TIMER_SLACK {
                deltas += CREATURE_GAS_HEAL;
                applications += 1;
                clock.clock -= CREATURE_GAS_PERIOD;
            }
        }
        Some(TerrainFeature::Water) => {
            clock.clock += dt;
            while clock.clock > CREATURE_WATER_PERIOD + TIMER_SLACK {
                deltas -= CREATURE_WATER_DAMAGE;
                applications += 1;
                clock.clock -= CREATURE_WATER_PERIOD;
            }
        }
        _ => {}
    }

    if let Some(mut kind) = world.get_mut::<ActorKind>(creature) {
        if let Some(s) = kind.creature_mut() {
            s.hazard = clock;
        }
    }
    if deltas != 0 {
        interaction::adjust_health(world, creature, deltas);
    }
    for _ in 0..applications {
        interaction::share_flock_delta(world, creature, interaction::FLOCK_SHARE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ActorBundle;
    use crate::flock::FlockRegistry;
    use crate::systems::Roster;

    fn world_with_feature(feature_code: i32) -> World {
        let mut world = World::new();
        // 10x10 tiles of 100 px; the column of tiles at tx=2 carries the
        // feature from ty=1 upward, bottom row solid.
        let mut codes = vec![0; 100];
        for tx in 0..10 {
            codes[tx] = 1;
        }
        for ty in 1..10 {
            codes[ty * 10 + 2] = feature_code;
        }
        world.insert_resource(TileGrid::new(100, 10, 10, &codes));
        world.insert_resource(FlockRegistry::default());
        world.insert_resource(Roster::default());
        world
    }

    fn spawn_creature(world: &mut World, x: f32) -> Entity {
        let bundle = ActorBundle::creature(1, None, x, 1.0, vec![(40, 40); 2]).unwrap();
        let e = world.spawn(bundle).id();
        world.resource_mut::<Roster>().entries.push(e);
        e
    }

    #[test]
    fn creature_in_water_for_three_periods_takes_two_applications() {
        // 1.2 s of submersion is two *full* 0.4 s periods past the first,
        // so exactly -8, not -12.
        let mut world = world_with_feature(2);
        let e = spawn_creature(&mut world, 2.2);
        for _ in 0..6 {
            creature_hazards(&mut world, e, 0.2);
        }
        assert_eq!(world.get::<Health>(e).unwrap().0, 92);
    }

    #[test]
    fn creature_heals_in_gas() {
        let mut world = world_with_feature(5);
        let e = spawn_creature(&mut world, 2.2);
        for _ in 0..7 {
            creature_hazards(&mut world, e, 0.1);
        }
        // 0.7 s of contact crosses the 0.3 s cadence twice.
        assert_eq!(world.get::<Health>(e).unwrap().0, 104);
    }

    #[test]
    fn magma_is_instantly_lethal_to_creatures() {
        let mut world = world_with_feature(3);
        let e = spawn_creature(&mut world, 2.2);
        creature_hazards(&mut world, e, 0.01);
        assert_eq!(world.get::<Health>(e).unwrap().0, 0);
        assert!(world.get::<LifeState>(e).unwrap().dead);
    }

    #[test]
    fn leaving_the_hazard_resets_the_clock() {
        let mut world = world_with_feature(2);
        let e = spawn_creature(&mut world, 2.2);
        for _ in 0..3 {
            creature_hazards(&mut world, e, 0.1);
        }
        // Step out of the water, then back in; the 0.3 s already
        // accumulated must not carry over.
        world.get_mut::<crate::components::Position>(e).unwrap().x = 5.0;
        creature_hazards(&mut world, e, 0.1);
        world.get_mut::<crate::components::Position>(e).unwrap().x = 2.2;
        for _ in 0..4 {
            creature_hazards(&mut world, e, 0.1);
        }
        assert_eq!(world.get::<Health>(e).unwrap().0, 100);
    }

    fn spawn_player(world: &mut World, x: f32) -> Entity {
        let bundle = ActorBundle::player(x, 1.0, vec![(50, 80); 10]).unwrap();
        let e = world.spawn(bundle).id();
        let mut roster = world.resource_mut::<Roster>();
        roster.player = Some(e);
        roster.entries.push(e);
        e
    }

    #[test]
    fn player_magma_damages_on_contact_then_per_period() {
        let mut world = world_with_feature(3);
        let e = spawn_player(&mut world, 2.2);
        player_hazards(&mut world, e, 0.01);
        assert_eq!(world.get::<Health>(e).unwrap().0, 50);
        for _ in 0..20 {
            player_hazards(&mut world, e, 0.01);
        }
        // 0.2 s later the second application lands and kills.
        assert_eq!(world.get::<Health>(e).unwrap().0, 0);
    }

    #[test]
    fn player_water_grants_one_free_period() {
        let mut world = world_with_feature(2);
        let e = spawn_player(&mut world, 2.2);
        player_hazards(&mut world, e, 0.1);
        assert_eq!(world.get::<Health>(e).unwrap().0, 100);
        player_hazards(&mut world, e, 0.1);
        assert_eq!(world.get::<Health>(e).unwrap().0, 98);
        for _ in 0..2 {
            player_hazards(&mut world, e, 0.1);
        }
        assert_eq!(world.get::<Health>(e).unwrap().0, 96);
    }
}
