//! # Duel Arena Server
//!
//! Authoritative real-time server for arena duels: players roam a square
//! field, pair up in battle zones, stake gold on rock/scissors/paper and
//! race to the goal gate once their tokens are spent.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     DUEL ARENA SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── vec2.rs     - 2D vector                                 │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── hash.rs     - State hashing for replay checks           │
//! │                                                              │
//! │  game/           - Match simulation (deterministic)          │
//! │  ├── settings.rs - Tunables and room overrides               │
//! │  ├── state.rs    - Match, player and zone state              │
//! │  ├── input.rs    - Action validation and replay log          │
//! │  ├── movement.rs - Position integration                      │
//! │  ├── collision.rs- Encounters and push-apart                 │
//! │  ├── zone.rs     - Battle zone state machine                 │
//! │  ├── duel.rs     - Duel judge and settlement                 │
//! │  ├── trade.rs    - Negotiation                               │
//! │  ├── ai.rs       - AI seats                                  │
//! │  └── tick.rs     - Authoritative simulation loop             │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  ├── snapshot.rs - Per-recipient state views                 │
//! │  └── session.rs  - Rooms and lobby                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! Given the same settings, seed and input log, `game::tick::replay_match`
//! reproduces a match tick for tick:
//! - No HashMap (BTreeMap for sorted iteration)
//! - No system time inside `game/`
//! - All randomness from seeded Xorshift128+, forked per AI seat

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use core::rng::DeterministicRng;
pub use game::input::{InputLog, PlayerAction};
pub use game::settings::MatchSettings;
pub use game::state::{MatchState, Player, PlayerId};
pub use network::server::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default simulation tick rate (Hz)
pub const TICK_RATE: u32 = 20;
