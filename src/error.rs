//! Error taxonomy for world construction, admission and commands.

use crate::flock::FlockId;

/// Alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

/// Errors that can occur when building or manipulating a simulation world.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Time step was NaN, infinite, negative or above the 0.2 s ceiling.
    #[error("invalid time step: {0}")]
    InvalidTimeStep(f32),

    /// Actors cannot be admitted once the game has started.
    #[error("world is already running")]
    WorldRunning,

    /// The non-player actor cap (100) has been reached.
    #[error("world is full ({0} actors)")]
    WorldFull(usize),

    /// Only one player character may exist per world.
    #[error("a player is already present")]
    DuplicatePlayer,

    /// Creature identifiers are unique per world.
    #[error("duplicate creature id: {0}")]
    DuplicateCreatureId(u64),

    /// The requested entity is not part of this world.
    #[error("actor not found")]
    ActorNotFound,

    /// Position lies outside the world or is not a number.
    #[error("position ({0}, {1}) is outside the world")]
    OutOfWorld(f32, f32),

    /// The actor's bounding box overlaps an existing solid actor.
    #[error("placement overlaps an existing actor")]
    PlacementBlocked,

    /// The actor's bounding box overlaps impassable terrain.
    #[error("placement overlaps impassable terrain")]
    InsideTerrain,

    /// Sprite sheet does not satisfy the variant's frame-count rule.
    #[error("invalid sprite sheet: {0}")]
    InvalidSpriteSheet(&'static str),

    /// At most 10 flocks may exist per world.
    #[error("flock limit reached")]
    FlockLimit,

    /// The referenced flock does not exist in this world.
    #[error("unknown flock: {0:?}")]
    UnknownFlock(FlockId),

    /// A state-machine command was issued in a state that forbids it.
    #[error("command rejected: {0}")]
    CommandRejected(&'static str),

    /// The world has no player character.
    #[error("no player in the world")]
    NoPlayer,

    /// The visible window must fit inside the world.
    #[error("window {0}x{1} does not fit the world")]
    WindowTooLarge(i32, i32),
}
