//! Network Layer
//!
//! WebSocket server, room lobby and wire protocol.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod snapshot;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, ErrorCode, StateSnapshot};
pub use session::{Member, Room, RoomError, RoomId, RoomManager};
pub use server::{GameServer, ServerConfig, GameServerError};
