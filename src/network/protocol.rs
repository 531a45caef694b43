//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object tagged by `"type"` (snake_case) with
//! camelCase payload fields.

use serde::{Serialize, Deserialize};

use crate::game::events::DuelSide;
use crate::game::input::PlayerAction;
use crate::game::settings::{GoalGate, MatchSettings, SettingsOverride};
use crate::game::state::{Command, EliminationReason, Hand, Inventory, ZonePhase};
use crate::game::trade::TradeBundle;
use crate::game::zone::CancelReason;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Choose a display name.
    SetName {
        /// Requested name (truncated server-side)
        #[serde(default)]
        name: String,
    },

    /// Create a room and join it as host.
    CreateRoom {
        /// Room name
        #[serde(rename = "roomName", default)]
        room_name: String,
        /// Settings overrides
        #[serde(default)]
        settings: SettingsOverride,
    },

    /// Join a waiting room.
    JoinRoom {
        /// Room to join
        #[serde(rename = "roomId")]
        room_id: String,
    },

    /// Leave the current room.
    LeaveRoom,

    /// Request the room list.
    ListRooms,

    /// Start the match (host only).
    StartGame,

    /// Add an AI seat (host only).
    AddAi,

    /// Remove the most recently added AI seat (host only).
    RemoveAi,

    /// Movement intent.
    Input {
        /// X component
        #[serde(default)]
        dx: f64,
        /// Y component
        #[serde(default)]
        dy: f64,
    },

    /// Field command.
    SelectCommand {
        /// Command to show
        command: Command,
    },

    /// Commit a duel choice.
    ZoneFight {
        /// Token to play
        hand: Hand,
        /// Gold to stake
        #[serde(default)]
        bet: i64,
    },

    /// Withdraw from a pending duel.
    ZoneLeave,

    /// Propose a trade.
    TradeOffer {
        /// What the proposer gives
        #[serde(default)]
        offer: TradeBundle,
        /// What the proposer wants
        #[serde(default)]
        request: TradeBundle,
    },

    /// Answer the open trade.
    TradeRespond {
        /// Accept or decline
        accept: bool,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back
        #[serde(default)]
        timestamp: u64,
    },
}

impl ClientMessage {
    /// The in-match action this message carries, if it is one.
    pub fn as_action(&self) -> Option<PlayerAction> {
        match *self {
            ClientMessage::Input { dx, dy } => Some(PlayerAction::Move { dx, dy }),
            ClientMessage::SelectCommand { command } => Some(PlayerAction::SelectCommand(command)),
            ClientMessage::ZoneFight { hand, bet } => Some(PlayerAction::DuelChoice { hand, bet }),
            ClientMessage::ZoneLeave => Some(PlayerAction::LeaveZone),
            ClientMessage::TradeOffer { offer, request } => Some(PlayerAction::TradeOffer { offer, request }),
            ClientMessage::TradeRespond { accept } => Some(PlayerAction::TradeRespond { accept }),
            _ => None,
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection accepted.
    Connected {
        /// Id assigned to this connection
        #[serde(rename = "playerId")]
        player_id: String,
    },

    /// Name accepted.
    NameSet {
        /// Effective name
        name: String,
    },

    /// Room created; sender is host.
    RoomCreated {
        /// Room details
        room: RoomDetail,
    },

    /// Sender joined a room.
    RoomJoined {
        /// Room details
        room: RoomDetail,
    },

    /// Room list.
    RoomList {
        /// All rooms
        rooms: Vec<RoomSummary>,
    },

    /// Someone joined the sender's room.
    PlayerJoined {
        /// Who joined
        player: MemberInfo,
        /// Room after the join
        room: RoomDetail,
    },

    /// Someone left the sender's room.
    PlayerLeft {
        /// Who left
        #[serde(rename = "playerId")]
        player_id: String,
        /// Room after the leave
        room: RoomDetail,
    },

    /// Match started.
    GameStarted {
        /// Fixed match settings
        settings: StartedSettings,
        /// Roster with spawn positions
        players: Vec<StartedPlayer>,
    },

    /// Per-tick state snapshot for one recipient.
    State(StateSnapshot),

    /// Private token counts.
    YourCards {
        /// Counts per hand
        cards: Inventory,
    },

    /// Private gold balance.
    YourGold {
        /// Gold held
        gold: u32,
    },

    /// Sender was paired in a zone.
    ZoneMatch {
        /// Zone id
        #[serde(rename = "zoneId")]
        zone_id: String,
        /// Opponent summary
        opponent: OpponentSummary,
    },

    /// Public duel outcome.
    ZoneFightResult {
        /// First duelist
        player1: DuelistInfo,
        /// Second duelist
        player2: DuelistInfo,
        /// Winner id, absent on a draw
        winner: Option<String>,
        /// Which side won
        result: DuelSide,
        /// Gold transferred at most
        bet: u32,
    },

    /// Sender's pending duel was called off.
    ZoneCancelled {
        /// Why
        reason: CancelReason,
    },

    /// A player passed the goal gate.
    PlayerCleared {
        /// Player id
        #[serde(rename = "playerId")]
        player_id: String,
        /// Player name
        #[serde(rename = "playerName")]
        player_name: String,
    },

    /// A player left play.
    PlayerEliminated {
        /// Player id
        #[serde(rename = "playerId")]
        player_id: String,
        /// Player name
        #[serde(rename = "playerName")]
        player_name: String,
        /// Why
        reason: EliminationReason,
    },

    /// Trade opened, or a proposal arrived.
    TradeRequest(TradeRequestInfo),

    /// Trade finished.
    TradeResult {
        /// Whether resources moved
        success: bool,
        /// Human-readable outcome
        message: String,
    },

    /// Match over.
    GameOver {
        /// Final standings, best first
        results: Vec<ResultRow>,
    },

    /// Request rejected.
    Error(ServerError),

    /// Pong response.
    Pong {
        /// Echoed client timestamp
        timestamp: u64,
        /// Server wall clock (ms since epoch)
        #[serde(rename = "serverTime")]
        server_time: i64,
    },

    /// Server is shutting down.
    Shutdown {
        /// Why
        reason: String,
    },
}

/// Room as shown in the room list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Room id
    pub id: String,
    /// Room name
    pub name: String,
    /// Members
    pub player_count: usize,
    /// Capacity
    pub max_players: usize,
    /// `waiting` or `playing`
    pub state: RoomPhase,
    /// Effective settings
    pub settings: SettingsSummary,
}

/// Room with its members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetail {
    /// List fields
    #[serde(flatten)]
    pub summary: RoomSummary,
    /// Host id
    pub host_id: String,
    /// Members in join order
    pub players: Vec<MemberInfo>,
}

/// Lobby state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    /// Accepting members
    Waiting,
    /// Match running
    Playing,
}

/// Subset of settings shown in room listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSummary {
    /// Tokens per hand
    pub cards_per_type: u32,
    /// Starting stars
    pub initial_stars: u32,
    /// Stars needed to clear
    pub victory_stars: u32,
    /// Match length (s)
    pub time_limit: f64,
    /// Starting gold
    pub initial_gold: u32,
    /// Gold needed to clear
    pub victory_gold: u32,
    /// Zone count
    pub battle_zone_count: usize,
}

impl From<&MatchSettings> for SettingsSummary {
    fn from(s: &MatchSettings) -> Self {
        Self {
            cards_per_type: s.tokens_per_type,
            initial_stars: s.initial_stars,
            victory_stars: s.victory_stars,
            time_limit: s.time_limit_secs,
            initial_gold: s.initial_gold,
            victory_gold: s.victory_gold,
            battle_zone_count: s.zone_count,
        }
    }
}

/// A room member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    /// Player id
    pub id: String,
    /// Display name
    pub name: String,
    /// AI seat
    #[serde(rename = "isAI")]
    pub is_ai: bool,
}

/// Settings sent with `game_started`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSettings {
    /// Field width
    pub field_width: f64,
    /// Field height
    pub field_height: f64,
    /// Player radius
    pub player_radius: f64,
    /// Match length (s)
    pub time_limit: f64,
    /// Stars needed to clear
    pub victory_stars: u32,
    /// Gold needed to clear
    pub victory_gold: u32,
    /// Tokens per hand
    pub cards_per_type: u32,
    /// Starting gold
    pub initial_gold: u32,
    /// Goal gate
    pub goal_gate: GoalGate,
    /// Zone layout
    pub battle_zones: Vec<ZoneView>,
}

/// Roster entry sent with `game_started`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedPlayer {
    /// Player id
    pub id: String,
    /// Display name
    pub name: String,
    /// Spawn X
    pub x: f64,
    /// Spawn Y
    pub y: f64,
    /// Starting stars
    pub stars: u32,
}

/// Command as seen by a recipient. Other players' token choice shows as
/// [`ShownCommand::Hand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShownCommand {
    /// Nothing selected
    None,
    /// Rock (own view only)
    Rock,
    /// Scissors (own view only)
    Scissors,
    /// Paper (own view only)
    Paper,
    /// Open to trading
    Negotiate,
    /// Some token, not revealed
    Hand,
}

impl From<Command> for ShownCommand {
    fn from(c: Command) -> Self {
        match c {
            Command::None => ShownCommand::None,
            Command::Rock => ShownCommand::Rock,
            Command::Scissors => ShownCommand::Scissors,
            Command::Paper => ShownCommand::Paper,
            Command::Negotiate => ShownCommand::Negotiate,
        }
    }
}

/// One player in a state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// Player id
    pub id: String,
    /// Display name
    pub name: String,
    /// X (rounded to 0.1)
    pub x: f64,
    /// Y (rounded to 0.1)
    pub y: f64,
    /// Field command (masked for others)
    pub command: ShownCommand,
    /// Stars
    pub stars: u32,
    /// Gold
    pub gold: u32,
    /// Tokens held
    pub cards_left: u32,
    /// Not eliminated
    pub alive: bool,
    /// Passed the gate
    pub cleared: bool,
    /// In a matched pair
    pub battling: bool,
    /// In post-duel recovery
    pub recovering: bool,
    /// Zone occupied
    pub in_zone_id: Option<String>,
}

/// One zone in a state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneView {
    /// Zone id
    pub id: String,
    /// Center X
    pub x: f64,
    /// Center Y
    pub y: f64,
    /// Radius
    pub radius: f64,
    /// Phase
    pub state: ZonePhase,
    /// Occupant ids
    pub player_ids: Vec<String>,
}

/// Per-recipient state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Tick counter
    pub tick: u32,
    /// Whole seconds left
    pub time_left: u32,
    /// Tokens held by living players
    pub card_totals: Inventory,
    /// Goal gate
    pub goal_gate: GoalGate,
    /// All players
    pub players: Vec<PlayerView>,
    /// All zones
    pub zones: Vec<ZoneView>,
    /// Recipient's tokens
    pub your_cards: Inventory,
    /// Recipient's gold
    pub your_gold: u32,
}

/// Opponent summary sent with `zone_match`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentSummary {
    /// Player id
    pub id: String,
    /// Display name
    pub name: String,
    /// Stars
    pub stars: u32,
    /// Gold
    pub gold: u32,
    /// Tokens held
    pub cards_left: u32,
}

/// One side of a duel result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuelistInfo {
    /// Player id
    pub id: String,
    /// Display name
    pub name: String,
    /// Token played
    pub hand: Hand,
}

/// Trade notice: partner details on open, bundles on a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequestInfo {
    /// Partner id
    pub partner_id: String,
    /// Partner name
    pub partner_name: String,
    /// Partner stars (on open)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_stars: Option<u32>,
    /// Partner gold (on open)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_gold: Option<u32>,
    /// Partner tokens (on open)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_cards_left: Option<u32>,
    /// Offered bundle (on proposal)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer: Option<TradeBundle>,
    /// Requested bundle (on proposal)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<TradeBundle>,
}

/// One final standings row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    /// Player id
    pub id: String,
    /// Display name
    pub name: String,
    /// Stars
    pub stars: u32,
    /// Gold
    pub gold: u32,
    /// Passed the gate
    pub cleared: bool,
    /// Not eliminated
    pub alive: bool,
    /// Tokens held
    pub cards_left: u32,
    /// AI seat
    #[serde(rename = "isAI")]
    pub is_ai: bool,
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Message could not be parsed.
    InvalidMessage,
    /// In-match action rejected.
    InvalidInput,
    /// Room does not exist.
    RoomNotFound,
    /// Room is full.
    RoomFull,
    /// Room is already playing.
    GameInProgress,
    /// Not in a room.
    NotInRoom,
    /// Only the host may do this.
    NotHost,
    /// Not enough players to start.
    NotEnoughPlayers,
    /// No AI seat to remove.
    NoAiPlayers,
    /// Server overloaded.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

impl ServerMessage {
    /// Build an error message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError { code, message: message.into() })
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
