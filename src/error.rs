use std::fmt;

use crate::object::ObjectId;
use crate::scene::SceneId;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Everything the engine can fail with.
///
/// Precondition violations surface at construction time; the caller is
/// expected to propagate them to the top level rather than recover.
#[derive(Debug)]
pub enum EngineError {
    /// A sprite was built from zero animation sequences
    EmptyAnimationSet,
    /// An animation sequence was built from zero frames
    EmptyAnimationFrames,
    InvalidTileMap { reason: String },
    /// Tile size shift outside 1..=7
    InvalidTileSize(u32),
    OwnershipCycle { child: ObjectId, owner: ObjectId },
    StaleObject(ObjectId),
    UnknownScene(SceneId),
    NotInitialized,
    AlreadyInitialized,
    UnsubscribeUnsupported,
    /// Malformed config file
    Config(toml::de::Error),
    Io(std::io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::EmptyAnimationSet => {
                write!(f, "a sprite needs at least one animation sequence")
            }
            EngineError::EmptyAnimationFrames => {
                write!(f, "an animation sequence needs at least one frame")
            }
            EngineError::InvalidTileMap { reason } => write!(f, "invalid tile map: {}", reason),
            EngineError::InvalidTileSize(shift) => {
                write!(f, "tile size shift {} is out of range (1..=7)", shift)
            }
            EngineError::OwnershipCycle { child, owner } => write!(
                f,
                "{:?} cannot own {:?}: ownership would form a cycle",
                owner, child
            ),
            EngineError::StaleObject(id) => write!(f, "object {:?} no longer exists", id),
            EngineError::UnknownScene(id) => write!(f, "scene {:?} is not registered", id),
            EngineError::NotInitialized => write!(f, "the game manager has not been initialized"),
            EngineError::AlreadyInitialized => write!(f, "the game manager is already running"),
            EngineError::UnsubscribeUnsupported => {
                write!(f, "unsubscribing from the message bus is not supported")
            }
            EngineError::Config(e) => write!(f, "config: {}", e),
            EngineError::Io(e) => write!(f, "io: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Config(e) => Some(e),
            EngineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::Config(e)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}
