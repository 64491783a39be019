//! ECS components for the Mossvale simulation.
//!
//! Components are pure data containers attached to entities. All movement and
//! interaction logic lives in the systems modules; the only behavior here is
//! the per-variant kinematic envelope expressed through the [`Kinematics`]
//! trait.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::flock::FlockId;
use crate::geometry::{meters_to_pixel, Axis, PixelRect};
use crate::terrain::TerrainFeature;

// ============================================================================
// SHARED COMPONENTS
// ============================================================================

/// 2D position in metres (x = rightward, y = upward).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Pixel coordinate of this position (floor of metres * 100).
    pub fn pixel(&self) -> (i32, i32) {
        (meters_to_pixel(self.x), meters_to_pixel(self.y))
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// 2D velocity in metres per second.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    pub fn magnitude(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

/// 2D acceleration in metres per second squared.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub ax: f32,
    pub ay: f32,
}

impl Acceleration {
    pub fn new(ax: f32, ay: f32) -> Self {
        Self { ax, ay }
    }

    pub fn magnitude(&self) -> f32 {
        (self.ax * self.ax + self.ay * self.ay).sqrt()
    }
}

/// Facing/travel direction: -1 (left/down), 0 (idle), +1 (right/up).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation(pub i32);

impl Orientation {
    pub fn sign(self) -> f32 {
        self.0 as f32
    }

    pub fn flipped(self) -> Self {
        Self(-self.0)
    }
}

/// Current hit points. Range rules are per-variant; see [`Kinematics`].
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health(pub i32);

/// Dead/terminated lifecycle flags. Termination is permanent.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LifeState {
    pub dead: bool,
    pub terminated: bool,
}

impl LifeState {
    pub fn is_alive(&self) -> bool {
        !self.dead && !self.terminated
    }
}

/// Pixel dimensions (w, h) of each animation frame.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct SpriteSheet {
    frames: Vec<(i32, i32)>,
}

impl SpriteSheet {
    pub fn new(frames: Vec<(i32, i32)>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame dimensions at `index`, clamped to the last frame.
    pub fn frame(&self, index: usize) -> (i32, i32) {
        let index = index.min(self.frames.len().saturating_sub(1));
        self.frames[index]
    }
}

/// Per-entity hazard contact tracking: which feature the body currently sits
/// in, and how long it has been in contact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HazardClock {
    pub current: Option<TerrainFeature>,
    pub clock: f32,
}

// ============================================================================
// ACTOR VARIANTS
// ============================================================================

/// Player state machine flags and timers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PlayerState {
    pub moving: bool,
    pub jumping: bool,
    pub ducking: bool,
    /// `end_duck` was requested but the standing pose is blocked by terrain;
    /// retried every sub-step.
    pub duck_end_pending: bool,
    /// Remaining invulnerability after creature contact.
    pub freeze: f32,
    /// Time elapsed since health reached zero.
    pub death_clock: f32,
    pub run_clock: f32,
    pub run_frame: u32,
    pub hazard: HazardClock,
}

impl PlayerState {
    pub const SPAWN_HEALTH: i32 = 100;
    pub const MAX_HEALTH: i32 = 500;
    pub const MIN_RUN_SPEED: f32 = 1.0;
    pub const MAX_RUN_SPEED: f32 = 3.0;
    pub const MAX_DUCK_SPEED: f32 = 1.0;
    pub const RUN_ACCEL: f32 = 0.9;
    pub const JUMP_SPEED: f32 = 8.0;
    pub const MAX_VERTICAL_SPEED: f32 = 8.0;
    pub const GRAVITY: f32 = -10.0;
    /// Invulnerability window after touching a creature.
    pub const FREEZE_TIME: f32 = 0.6;
    /// Time between death and game over.
    pub const DEATH_LINGER: f32 = 0.6;
    /// Run animation frame period.
    pub const RUN_FRAME_TIME: f32 = 0.075;
}

/// Flocking creature state: identity, flock membership, patrol timer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreatureState {
    pub id: u64,
    pub flock: Option<FlockId>,
    /// Time spent patrolling in the current direction.
    pub patrol_clock: f32,
    pub hazard: HazardClock,
}

impl CreatureState {
    pub const SPAWN_HEALTH: i32 = 100;
    pub const MAX_SPEED: f32 = 2.5;
    pub const ACCEL: f32 = 0.7;
    /// Patrol direction reverses after this long without a collision.
    pub const DIRECTION_HOLD: f32 = 2.5;

    pub fn new(id: u64, flock: Option<FlockId>) -> Self {
        Self {
            id,
            flock,
            patrol_clock: 0.0,
            hazard: HazardClock::default(),
        }
    }
}

/// Oscillating plant species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlantSpecies {
    /// Drifts left/right along the ground.
    Creeper,
    /// Hovers up/down in place.
    Hoverbud,
}

impl PlantSpecies {
    pub fn axis(self) -> Axis {
        match self {
            PlantSpecies::Creeper => Axis::Horizontal,
            PlantSpecies::Hoverbud => Axis::Vertical,
        }
    }

    /// Seconds the plant survives without being eaten.
    pub fn lifespan(self) -> f32 {
        match self {
            PlantSpecies::Creeper => 10.0,
            PlantSpecies::Hoverbud => 12.0,
        }
    }

    pub fn max_health(self) -> i32 {
        match self {
            PlantSpecies::Creeper => 1,
            PlantSpecies::Hoverbud => 3,
        }
    }
}

/// Plant lifecycle and oscillation timers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlantState {
    pub species: PlantSpecies,
    pub age: f32,
    /// Time since the last direction flip.
    pub shift_clock: f32,
    /// Time spent decaying after death or lifespan expiry.
    pub decay_clock: f32,
    /// Sustained player contact, used by the hoverbud bite delay.
    pub bite_clock: f32,
}

impl PlantState {
    pub const SPEED: f32 = 0.5;
    /// Direction flips after this much travel time.
    pub const SHIFT_PERIOD: f32 = 0.5;
    /// Dead plants linger this long before termination.
    pub const DECAY_TIME: f32 = 0.6;
    /// Minimum time between hoverbud bites.
    pub const BITE_DELAY: f32 = 0.6;

    pub fn new(species: PlantSpecies) -> Self {
        Self {
            species,
            age: 0.0,
            shift_clock: 0.0,
            decay_clock: 0.0,
            bite_clock: 0.0,
        }
    }
}

/// Tagged actor variant. The enum replaces a deep inheritance hierarchy:
/// shared state lives in the sibling components, variant state lives here,
/// and variant behavior is dispatched through [`Kinematics`].
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ActorKind {
    Player(PlayerState),
    Creature(CreatureState),
    Plant(PlantState),
}

impl ActorKind {
    pub fn is_player(&self) -> bool {
        matches!(self, ActorKind::Player(_))
    }

    pub fn is_creature(&self) -> bool {
        matches!(self, ActorKind::Creature(_))
    }

    pub fn is_plant(&self) -> bool {
        matches!(self, ActorKind::Plant(_))
    }

    pub fn player(&self) -> Option<&PlayerState> {
        match self {
            ActorKind::Player(s) => Some(s),
            _ => None,
        }
    }

    pub fn player_mut(&mut self) -> Option<&mut PlayerState> {
        match self {
            ActorKind::Player(s) => Some(s),
            _ => None,
        }
    }

    pub fn creature(&self) -> Option<&CreatureState> {
        match self {
            ActorKind::Creature(s) => Some(s),
            _ => None,
        }
    }

    pub fn creature_mut(&mut self) -> Option<&mut CreatureState> {
        match self {
            ActorKind::Creature(s) => Some(s),
            _ => None,
        }
    }

    pub fn plant(&self) -> Option<&PlantState> {
        match self {
            ActorKind::Plant(s) => Some(s),
            _ => None,
        }
    }

    pub fn plant_mut(&mut self) -> Option<&mut PlantState> {
        match self {
            ActorKind::Plant(s) => Some(s),
            _ => None,
        }
    }
}

// ============================================================================
// KINEMATIC ENVELOPES
// ============================================================================

/// Per-variant kinematic envelope: which velocities and health values an
/// actor may hold, and how out-of-envelope velocities are handled.
pub trait Kinematics {
    fn is_valid_velocity(&self, v: Velocity) -> bool;

    /// Pull a candidate velocity into the envelope. `None` refuses the
    /// assignment entirely (the previous velocity stays in place).
    fn correct_velocity(&self, v: Velocity, orientation: Orientation) -> Option<Velocity>;

    fn is_valid_health(&self, hp: i32) -> bool;
}

impl Kinematics for PlayerState {
    fn is_valid_velocity(&self, v: Velocity) -> bool {
        let cap = if self.ducking {
            Self::MAX_DUCK_SPEED
        } else {
            Self::MAX_RUN_SPEED
        };
        let vx_ok = v.vx == 0.0 || (v.vx.abs() >= Self::MIN_RUN_SPEED && v.vx.abs() <= cap);
        vx_ok && v.vy.abs() <= Self::MAX_VERTICAL_SPEED
    }

    fn correct_velocity(&self, v: Velocity, orientation: Orientation) -> Option<Velocity> {
        let s = orientation.sign();
        let mut vx = v.vx;
        let mut vy = v.vy;
        if vx != 0.0 && vx.abs() < Self::MIN_RUN_SPEED {
            vx = s * Self::MIN_RUN_SPEED;
        }
        let cap = if self.ducking {
            Self::MAX_DUCK_SPEED
        } else {
            Self::MAX_RUN_SPEED
        };
        if vx.abs() > cap {
            vx = s * cap;
        }
        vy = vy.clamp(-Self::MAX_VERTICAL_SPEED, Self::MAX_VERTICAL_SPEED);
        Some(Velocity::new(vx, vy))
    }

    fn is_valid_health(&self, hp: i32) -> bool {
        (0..=Self::MAX_HEALTH).contains(&hp)
    }
}

impl Kinematics for CreatureState {
    fn is_valid_velocity(&self, v: Velocity) -> bool {
        v.vx.abs() <= Self::MAX_SPEED && v.vy == 0.0
    }

    fn correct_velocity(&self, v: Velocity, orientation: Orientation) -> Option<Velocity> {
        // Speed always points along the patrol direction; over-speed
        // assignments are refused so the creature tops out at MAX_SPEED.
        let vx = orientation.sign() * v.vx.abs();
        let candidate = Velocity::new(vx, 0.0);
        if self.is_valid_velocity(candidate) {
            Some(candidate)
        } else {
            None
        }
    }

    fn is_valid_health(&self, hp: i32) -> bool {
        hp >= 0
    }
}

impl Kinematics for PlantState {
    fn is_valid_velocity(&self, v: Velocity) -> bool {
        match self.species.axis() {
            Axis::Horizontal => v.vx.abs() == Self::SPEED && v.vy == 0.0,
            Axis::Vertical => v.vy.abs() == Self::SPEED && v.vx == 0.0,
        }
    }

    fn correct_velocity(&self, v: Velocity, _orientation: Orientation) -> Option<Velocity> {
        if self.is_valid_velocity(v) {
            Some(v)
        } else {
            None
        }
    }

    fn is_valid_health(&self, hp: i32) -> bool {
        (0..=self.species.max_health()).contains(&hp)
    }
}

impl Kinematics for ActorKind {
    fn is_valid_velocity(&self, v: Velocity) -> bool {
        match self {
            ActorKind::Player(s) => s.is_valid_velocity(v),
            ActorKind::Creature(s) => s.is_valid_velocity(v),
            ActorKind::Plant(s) => s.is_valid_velocity(v),
        }
    }

    fn correct_velocity(&self, v: Velocity, orientation: Orientation) -> Option<Velocity> {
        match self {
            ActorKind::Player(s) => s.correct_velocity(v, orientation),
            ActorKind::Creature(s) => s.correct_velocity(v, orientation),
            ActorKind::Plant(s) => s.correct_velocity(v, orientation),
        }
    }

    fn is_valid_health(&self, hp: i32) -> bool {
        match self {
            ActorKind::Player(s) => s.is_valid_health(hp),
            ActorKind::Creature(s) => s.is_valid_health(hp),
            ActorKind::Plant(s) => s.is_valid_health(hp),
        }
    }
}

/// Health value an assignment actually lands on: out-of-range values default
/// to zero rather than erroring.
pub fn admitted_health(kind: &ActorKind, hp: i32) -> Health {
    if kind.is_valid_health(hp) {
        Health(hp)
    } else {
        Health(0)
    }
}

// ============================================================================
// SPRITES
// ============================================================================

/// Current animation frame index, derived purely from actor state.
pub fn sprite_index(kind: &ActorKind, orientation: Orientation, sheet: &SpriteSheet) -> usize {
    match kind {
        ActorKind::Player(s) => player_sprite_index(s, orientation, sheet.len()),
        ActorKind::Creature(_) => {
            if orientation.0 < 0 {
                1
            } else {
                0
            }
        }
        ActorKind::Plant(_) => {
            if orientation.0 < 0 {
                1
            } else {
                0
            }
        }
    }
}

fn player_sprite_index(s: &PlayerState, orientation: Orientation, frames: usize) -> usize {
    // Layout: 0 idle, 1 duck, 2/3 facing right/left, 4/5 jumping right/left,
    // 6/7 ducking right/left, 8.. run cycle split right then left.
    let run_frames = (frames.saturating_sub(8)) / 2;
    if s.ducking {
        match orientation.0 {
            o if o > 0 => 6,
            o if o < 0 => 7,
            _ => 1,
        }
    } else if s.jumping {
        match orientation.0 {
            o if o > 0 => 4,
            o if o < 0 => 5,
            _ => 0,
        }
    } else if s.moving && run_frames > 0 {
        let cycle = (s.run_frame as usize) % run_frames;
        if orientation.0 >= 0 {
            8 + cycle
        } else {
            8 + run_frames + cycle
        }
    } else {
        match orientation.0 {
            o if o > 0 => 2,
            o if o < 0 => 3,
            _ => 0,
        }
    }
}

/// Pixel bounding box of an actor in its current pose.
pub fn bounding_box(
    kind: &ActorKind,
    orientation: Orientation,
    position: Position,
    sheet: &SpriteSheet,
) -> PixelRect {
    let (w, h) = sheet.frame(sprite_index(kind, orientation, sheet));
    let (px, py) = position.pixel();
    PixelRect::new(px, py, w, h)
}

// ============================================================================
// BUNDLES
// ============================================================================

/// Everything an actor entity carries.
#[derive(Bundle)]
pub struct ActorBundle {
    pub kind: ActorKind,
    pub position: Position,
    pub velocity: Velocity,
    pub acceleration: Acceleration,
    pub orientation: Orientation,
    pub health: Health,
    pub life: LifeState,
    pub sprites: SpriteSheet,
}

impl ActorBundle {
    /// A player character at rest. The sheet needs at least 10 frames and an
    /// even frame count (run cycles are mirrored).
    pub fn player(x: f32, y: f32, frames: Vec<(i32, i32)>) -> SimResult<Self> {
        if frames.len() < 10 || frames.len() % 2 != 0 {
            return Err(SimError::InvalidSpriteSheet(
                "player needs an even number of at least 10 frames",
            ));
        }
        Ok(Self {
            kind: ActorKind::Player(PlayerState::default()),
            position: Position::new(x, y),
            velocity: Velocity::default(),
            acceleration: Acceleration::default(),
            orientation: Orientation(0),
            health: Health(PlayerState::SPAWN_HEALTH),
            life: LifeState::default(),
            sprites: SpriteSheet::new(frames),
        })
    }

    /// A creature at rest, not yet patrolling. Two frames: right, left.
    pub fn creature(
        id: u64,
        flock: Option<FlockId>,
        x: f32,
        y: f32,
        frames: Vec<(i32, i32)>,
    ) -> SimResult<Self> {
        if frames.len() != 2 {
            return Err(SimError::InvalidSpriteSheet("creature needs exactly 2 frames"));
        }
        Ok(Self {
            kind: ActorKind::Creature(CreatureState::new(id, flock)),
            position: Position::new(x, y),
            velocity: Velocity::default(),
            acceleration: Acceleration::default(),
            orientation: Orientation(0),
            health: Health(CreatureState::SPAWN_HEALTH),
            life: LifeState::default(),
            sprites: SpriteSheet::new(frames),
        })
    }

    /// An oscillating plant. Two frames, one per travel direction.
    pub fn plant(species: PlantSpecies, x: f32, y: f32, frames: Vec<(i32, i32)>) -> SimResult<Self> {
        if frames.len() != 2 {
            return Err(SimError::InvalidSpriteSheet("plant needs exactly 2 frames"));
        }
        let state = PlantState::new(species);
        let (velocity, orientation) = match species.axis() {
            Axis::Horizontal => (Velocity::new(-PlantState::SPEED, 0.0), Orientation(-1)),
            Axis::Vertical => (Velocity::new(0.0, PlantState::SPEED), Orientation(1)),
        };
        Ok(Self {
            kind: ActorKind::Plant(state),
            position: Position::new(x, y),
            velocity,
            acceleration: Acceleration::default(),
            orientation,
            health: Health(species.max_health()),
            life: LifeState::default(),
            sprites: SpriteSheet::new(frames),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_velocity_correction_snaps_to_envelope() {
        let s = PlayerState::default();
        let v = s
            .correct_velocity(Velocity::new(0.4, 0.0), Orientation(1))
            .unwrap();
        assert_eq!(v.vx, PlayerState::MIN_RUN_SPEED);
        let v = s
            .correct_velocity(Velocity::new(-4.0, 0.0), Orientation(-1))
            .unwrap();
        assert_eq!(v.vx, -PlayerState::MAX_RUN_SPEED);
        let v = s
            .correct_velocity(Velocity::new(0.0, 9.5), Orientation(0))
            .unwrap();
        assert_eq!(v.vy, PlayerState::MAX_VERTICAL_SPEED);
    }

    #[test]
    fn ducking_caps_horizontal_speed() {
        let s = PlayerState {
            ducking: true,
            ..Default::default()
        };
        let v = s
            .correct_velocity(Velocity::new(2.8, 0.0), Orientation(1))
            .unwrap();
        assert_eq!(v.vx, PlayerState::MAX_DUCK_SPEED);
    }

    #[test]
    fn creature_refuses_over_speed() {
        let s = CreatureState::new(1, None);
        assert!(s
            .correct_velocity(Velocity::new(2.6, 0.0), Orientation(1))
            .is_none());
        let v = s
            .correct_velocity(Velocity::new(-2.0, 0.0), Orientation(1))
            .unwrap();
        assert_eq!(v.vx, 2.0);
    }

    #[test]
    fn out_of_range_health_defaults_to_zero() {
        let kind = ActorKind::Player(PlayerState::default());
        assert_eq!(admitted_health(&kind, 520), Health(0));
        assert_eq!(admitted_health(&kind, 500), Health(500));
        assert_eq!(admitted_health(&kind, -3), Health(0));
        let creature = ActorKind::Creature(CreatureState::new(1, None));
        assert_eq!(admitted_health(&creature, -1), Health(0));
        assert_eq!(admitted_health(&creature, 9999), Health(9999));
    }

    #[test]
    fn sprite_sheets_are_validated_per_variant() {
        assert!(ActorBundle::player(0.0, 0.0, vec![(10, 20); 9]).is_err());
        assert!(ActorBundle::player(0.0, 0.0, vec![(10, 20); 11]).is_err());
        assert!(ActorBundle::player(0.0, 0.0, vec![(10, 20); 10]).is_ok());
        assert!(ActorBundle::creature(1, None, 0.0, 0.0, vec![(10, 10); 3]).is_err());
        assert!(ActorBundle::plant(PlantSpecies::Creeper, 0.0, 0.0, vec![(8, 8); 2]).is_ok());
    }

    #[test]
    fn player_run_cycle_splits_by_orientation() {
        let mut s = PlayerState {
            moving: true,
            ..Default::default()
        };
        s.run_frame = 1;
        // 12 frames: 2 run frames per side.
        assert_eq!(player_sprite_index(&s, Orientation(1), 12), 9);
        assert_eq!(player_sprite_index(&s, Orientation(-1), 12), 11);
        s.moving = false;
        assert_eq!(player_sprite_index(&s, Orientation(-1), 12), 3);
        s.ducking = true;
        assert_eq!(player_sprite_index(&s, Orientation(0), 12), 1);
    }
}
