//! Core deterministic primitives.
//!
//! Vector math, the seeded RNG and the state hasher. Nothing in here knows
//! about players or zones.

pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use vec2::Vec2;
pub use rng::DeterministicRng;
pub use hash::compute_state_hash;
