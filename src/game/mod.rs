//! Game Logic Module
//!
//! All match simulation code. Deterministic for a given seed and input log.
//!
//! ## Module Structure
//!
//! - `settings`: Per-match tunables and room overrides
//! - `state`: Match, player and zone state
//! - `input`: Action validation and the replay log
//! - `movement`: Position integration
//! - `collision`: Encounters, pair cooldowns, overlap push-apart
//! - `zone`: Battle zone membership and the commit race
//! - `duel`: Duel judge and settlement
//! - `trade`: Negotiation between players
//! - `ai`: Built-in AI seats
//! - `tick`: Authoritative simulation loop
//! - `events`: Outcomes for the session layer

pub mod settings;
pub mod state;
pub mod input;
pub mod movement;
pub mod collision;
pub mod zone;
pub mod duel;
pub mod trade;
pub mod ai;
pub mod tick;
pub mod events;

// Re-export key types
pub use input::{InputError, InputLog, PlayerAction};
pub use settings::{MatchSettings, SettingsOverride};
pub use state::{Command, Hand, MatchPhase, MatchState, PlayerId};
pub use tick::TickResult;
pub use events::GameEvent;
