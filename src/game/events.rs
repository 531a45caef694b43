//! Game Events
//!
//! Outcomes produced by the simulation. The session layer turns each event
//! into wire messages for the right recipients.

use serde::{Serialize, Deserialize};
use crate::game::state::{EliminationReason, Hand, PlayerId, Standing, ZoneId};
use crate::game::trade::TradeBundle;
use crate::game::zone::CancelReason;

/// Priority for delivery order within a tick.
///
/// Lower value = delivered first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Duel outcomes first
    DuelResolution = 0,
    /// Then zone match / cancel notices
    ZoneLifecycle = 1,
    /// Then private inventory pushes
    Inventory = 2,
    /// Then eliminations
    PlayerElimination = 3,
    /// Then goal clears
    GoalCleared = 4,
    /// Then trade traffic
    Trade = 5,
    /// Lowest priority
    Other = 255,
}

/// Which side won a duel, from the pair's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuelSide {
    /// First player won
    Player1,
    /// Second player won
    Player2,
    /// Nobody won
    Draw,
}

/// Game event data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GameEventData {
    /// A pair formed; one event per participant.
    ZoneMatched {
        zone_id: ZoneId,
        player_id: PlayerId,
        opponent_id: PlayerId,
    },

    /// A pending duel ended without resolution; one event per participant told.
    ZoneCancelled {
        zone_id: ZoneId,
        player_id: PlayerId,
        reason: CancelReason,
    },

    /// A duel was settled.
    DuelResolved {
        zone_id: ZoneId,
        player1: PlayerId,
        hand1: Hand,
        player2: PlayerId,
        hand2: Hand,
        winner: Option<PlayerId>,
        side: DuelSide,
        stake: u32,
    },

    /// A player's tokens or gold changed (private push).
    InventoryChanged {
        player_id: PlayerId,
    },

    /// Player reached the goal gate.
    PlayerCleared {
        player_id: PlayerId,
    },

    /// Player was eliminated.
    PlayerEliminated {
        player_id: PlayerId,
        reason: EliminationReason,
    },

    /// A negotiate encounter opened a trade; one event per participant.
    TradeStarted {
        player_id: PlayerId,
        partner_id: PlayerId,
    },

    /// A trade proposal forwarded to `player_id`.
    TradeOffered {
        player_id: PlayerId,
        from_id: PlayerId,
        offer: TradeBundle,
        request: TradeBundle,
    },

    /// A trade finished, one event per participant told.
    TradeClosed {
        player_id: PlayerId,
        success: bool,
        message: String,
    },

    /// Match ended.
    MatchEnded {
        standings: Vec<Standing>,
        duration_ticks: u32,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Delivery priority
    pub priority: EventPriority,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, priority: EventPriority, data: GameEventData) -> Self {
        Self { tick, priority, data }
    }

    /// Pair formed, addressed to `player_id`.
    pub fn zone_matched(tick: u32, zone_id: ZoneId, player_id: PlayerId, opponent_id: PlayerId) -> Self {
        Self::new(
            tick,
            EventPriority::ZoneLifecycle,
            GameEventData::ZoneMatched { zone_id, player_id, opponent_id },
        )
    }

    /// Pending duel cancelled, addressed to `player_id`.
    pub fn zone_cancelled(tick: u32, zone_id: ZoneId, player_id: PlayerId, reason: CancelReason) -> Self {
        Self::new(
            tick,
            EventPriority::ZoneLifecycle,
            GameEventData::ZoneCancelled { zone_id, player_id, reason },
        )
    }

    /// Private inventory push.
    pub fn inventory_changed(tick: u32, player_id: PlayerId) -> Self {
        Self::new(tick, EventPriority::Inventory, GameEventData::InventoryChanged { player_id })
    }

    /// Player cleared the gate.
    pub fn player_cleared(tick: u32, player_id: PlayerId) -> Self {
        Self::new(tick, EventPriority::GoalCleared, GameEventData::PlayerCleared { player_id })
    }

    /// Player eliminated.
    pub fn player_eliminated(tick: u32, player_id: PlayerId, reason: EliminationReason) -> Self {
        Self::new(
            tick,
            EventPriority::PlayerElimination,
            GameEventData::PlayerEliminated { player_id, reason },
        )
    }

    /// Trade opened, addressed to `player_id`.
    pub fn trade_started(tick: u32, player_id: PlayerId, partner_id: PlayerId) -> Self {
        Self::new(tick, EventPriority::Trade, GameEventData::TradeStarted { player_id, partner_id })
    }

    /// Trade finished, addressed to `player_id`.
    pub fn trade_closed(tick: u32, player_id: PlayerId, success: bool, message: impl Into<String>) -> Self {
        Self::new(
            tick,
            EventPriority::Trade,
            GameEventData::TradeClosed { player_id, success, message: message.into() },
        )
    }

    /// Match ended.
    pub fn match_ended(tick: u32, standings: Vec<Standing>) -> Self {
        Self::new(
            tick,
            EventPriority::Other,
            GameEventData::MatchEnded { standings, duration_ticks: tick },
        )
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick && self.priority == other.priority
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Stable sorts keep emission order inside one (tick, priority) bucket
        self.tick
            .cmp(&other.tick)
            .then(self.priority.cmp(&other.priority))
    }
}
