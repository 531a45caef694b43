//! Game State Definitions
//!
//! All state types for match simulation.
//! Uses BTreeMap for deterministic iteration order. Players and zones refer
//! to each other only by id through [`MatchState`].

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::core::vec2::Vec2;
use crate::core::rng::DeterministicRng;
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::game::ai::AiBrain;
use crate::game::collision::CollisionCooldowns;
use crate::game::events::GameEvent;
use crate::game::settings::{MatchSettings, RelocationPolicy};
use crate::game::trade::TradeBook;
use crate::game::zone::{self, CancelReason};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id for a new connection or AI seat.
    pub fn generate() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uuid_string())
    }
}

// =============================================================================
// HANDS & COMMANDS
// =============================================================================

/// One of the three cyclic duel tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Hand {
    /// Beats scissors
    Rock = 0,
    /// Beats paper
    Scissors = 1,
    /// Beats rock
    Paper = 2,
}

impl Hand {
    /// All hands in a fixed order.
    pub const ALL: [Hand; 3] = [Hand::Rock, Hand::Scissors, Hand::Paper];

    /// True if `self` defeats `other`.
    #[inline]
    pub fn beats(self, other: Hand) -> bool {
        matches!(
            (self, other),
            (Hand::Rock, Hand::Scissors) | (Hand::Scissors, Hand::Paper) | (Hand::Paper, Hand::Rock)
        )
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Hand::Rock => "rock",
            Hand::Scissors => "scissors",
            Hand::Paper => "paper",
        }
    }
}

/// The command a player shows on the field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Nothing selected
    #[default]
    None,
    /// Holding up rock
    Rock,
    /// Holding up scissors
    Scissors,
    /// Holding up paper
    Paper,
    /// Open to trading
    Negotiate,
}

impl Command {
    /// The token this command shows, if any.
    pub fn hand(self) -> Option<Hand> {
        match self {
            Command::Rock => Some(Hand::Rock),
            Command::Scissors => Some(Hand::Scissors),
            Command::Paper => Some(Hand::Paper),
            Command::None | Command::Negotiate => None,
        }
    }

    fn code(self) -> u8 {
        match self {
            Command::None => 0,
            Command::Rock => 1,
            Command::Scissors => 2,
            Command::Paper => 3,
            Command::Negotiate => 4,
        }
    }
}

/// Token counts held by a player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    /// Rock tokens
    pub rock: u32,
    /// Scissors tokens
    pub scissors: u32,
    /// Paper tokens
    pub paper: u32,
}

impl Inventory {
    /// Same count of every hand.
    pub fn uniform(count: u32) -> Self {
        Self { rock: count, scissors: count, paper: count }
    }

    /// Count for one hand.
    #[inline]
    pub fn count(&self, hand: Hand) -> u32 {
        match hand {
            Hand::Rock => self.rock,
            Hand::Scissors => self.scissors,
            Hand::Paper => self.paper,
        }
    }

    fn count_mut(&mut self, hand: Hand) -> &mut u32 {
        match hand {
            Hand::Rock => &mut self.rock,
            Hand::Scissors => &mut self.scissors,
            Hand::Paper => &mut self.paper,
        }
    }

    /// Total tokens held.
    #[inline]
    pub fn total(&self) -> u32 {
        self.rock + self.scissors + self.paper
    }

    /// True when no tokens are held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// True when at least one token of `hand` is held.
    #[inline]
    pub fn holds(&self, hand: Hand) -> bool {
        self.count(hand) > 0
    }

    /// Remove one token. Returns false (and changes nothing) if none held.
    pub fn take(&mut self, hand: Hand) -> bool {
        let slot = self.count_mut(hand);
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    /// Add `n` tokens of `hand`.
    pub fn add(&mut self, hand: Hand, n: u32) {
        let slot = self.count_mut(hand);
        *slot = slot.saturating_add(n);
    }

    /// Remove `n` tokens of `hand`, saturating at zero.
    pub fn remove(&mut self, hand: Hand, n: u32) {
        let slot = self.count_mut(hand);
        *slot = slot.saturating_sub(n);
    }

    /// True if every count here is at least the matching count in `other`.
    pub fn covers(&self, other: &Inventory) -> bool {
        Hand::ALL.iter().all(|h| self.count(*h) >= other.count(*h))
    }

    /// The most-held hand (first in [`Hand::ALL`] order on ties).
    pub fn most_held(&self) -> Option<Hand> {
        let mut best: Option<Hand> = None;
        for hand in Hand::ALL {
            let n = self.count(hand);
            if n > 0 && best.map_or(true, |b| n > self.count(b)) {
                best = Some(hand);
            }
        }
        best
    }
}

impl std::ops::AddAssign for Inventory {
    fn add_assign(&mut self, rhs: Self) {
        self.rock += rhs.rock;
        self.scissors += rhs.scissors;
        self.paper += rhs.paper;
    }
}

/// A committed duel choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelChoice {
    /// Token played
    pub hand: Hand,
    /// Gold staked
    pub stake: u32,
}

// =============================================================================
// PLAYER
// =============================================================================

/// Why a player left play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationReason {
    /// Lost the last star in a duel
    NoStars,
    /// Connection dropped or left the room mid-match
    Disconnected,
    /// Sole remaining active player who cannot reach the goal
    NoOpponents,
}

impl EliminationReason {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            EliminationReason::NoStars => "no_stars",
            EliminationReason::Disconnected => "disconnected",
            EliminationReason::NoOpponents => "no_opponents",
        }
    }
}

/// State of a single player in the match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Unique player ID
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Driven by the built-in AI
    pub is_ai: bool,

    /// Current position on the field
    pub position: Vec2,
    /// Reset position assigned at match start
    pub spawn_point: Vec2,
    /// Movement intent (magnitude <= 1)
    pub intent: Vec2,
    /// Field command
    pub command: Command,

    /// Still in play (false once eliminated)
    pub alive: bool,
    /// Passed through the goal gate
    pub cleared: bool,

    /// Token counts
    pub inventory: Inventory,
    /// Stars
    pub stars: u32,
    /// Gold
    pub gold: u32,

    /// Zone currently occupied
    pub in_zone: Option<ZoneId>,
    /// Opponent while in a matched pair
    pub zone_matched_with: Option<PlayerId>,
    /// Pending duel submission
    pub duel_choice: Option<DuelChoice>,
    /// Tick at which post-duel recovery ends
    pub recovery_until: Option<u32>,

    /// Tick when eliminated
    pub eliminated_tick: Option<u32>,
    /// Why eliminated
    pub elimination_reason: Option<EliminationReason>,
    /// Tick when cleared
    pub cleared_tick: Option<u32>,
}

impl Player {
    /// Create a player with empty resources. [`MatchState::start`] deals them.
    pub fn new(id: PlayerId, name: impl Into<String>, is_ai: bool) -> Self {
        Self {
            id,
            name: name.into(),
            is_ai,
            position: Vec2::ZERO,
            spawn_point: Vec2::ZERO,
            intent: Vec2::ZERO,
            command: Command::None,
            alive: true,
            cleared: false,
            inventory: Inventory::default(),
            stars: 0,
            gold: 0,
            in_zone: None,
            zone_matched_with: None,
            duel_choice: None,
            recovery_until: None,
            eliminated_tick: None,
            elimination_reason: None,
            cleared_tick: None,
        }
    }

    /// Alive and not cleared.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.alive && !self.cleared
    }

    /// In a matched pair.
    #[inline]
    pub fn is_matched(&self) -> bool {
        self.zone_matched_with.is_some()
    }

    /// In the post-duel recovery window at `tick`.
    #[inline]
    pub fn is_recovering(&self, tick: u32) -> bool {
        self.recovery_until.is_some_and(|until| tick < until)
    }

    /// Eligible for movement, collision and goal checks at `tick`.
    #[inline]
    pub fn is_free(&self, tick: u32) -> bool {
        self.is_active() && !self.is_matched() && !self.is_recovering(tick)
    }

    /// Meets the goal thresholds (position not considered).
    pub fn can_goal(&self, settings: &MatchSettings) -> bool {
        self.inventory.is_empty()
            && self.stars >= settings.victory_stars
            && self.gold >= settings.victory_gold
    }

    /// Hash this player's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_uuid(&self.id.0);
        hasher.update_vec2(self.position);
        hasher.update_vec2(self.intent);
        hasher.update_u8(self.command.code());
        hasher.update_bool(self.alive);
        hasher.update_bool(self.cleared);
        hasher.update_u32(self.inventory.rock);
        hasher.update_u32(self.inventory.scissors);
        hasher.update_u32(self.inventory.paper);
        hasher.update_u32(self.stars);
        hasher.update_u32(self.gold);
        hasher.update_u32(self.in_zone.map_or(u32::MAX, |z| z.0 as u32));
        hasher.update_opt_uuid(self.zone_matched_with.as_ref().map(|p| &p.0));
        match self.duel_choice {
            Some(choice) => {
                hasher.update_u8(choice.hand as u8 + 1);
                hasher.update_u32(choice.stake);
            }
            None => hasher.update_u8(0),
        }
        hasher.update_u32(self.recovery_until.unwrap_or(0));
    }
}

// =============================================================================
// ZONES
// =============================================================================

/// Battle zone identifier (index into [`MatchState::zones`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneId(pub u16);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone-{}", self.0)
    }
}

/// Derived zone state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZonePhase {
    /// No occupants
    #[default]
    Empty,
    /// One occupant, or two without a pair
    Waiting,
    /// Two occupants with an active pair
    Matched,
}

/// The two players committed to a duel in a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPair {
    /// First player (entered first)
    pub a: PlayerId,
    /// Second player
    pub b: PlayerId,
    /// Ticks left to commit
    pub countdown_ticks: u32,
    /// Both choices are in and the duel is being settled
    pub resolved: bool,
}

impl MatchedPair {
    /// True if `id` is one of the pair.
    #[inline]
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.a == *id || self.b == *id
    }
}

/// State of a battle zone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneState {
    /// Zone ID
    pub id: ZoneId,
    /// Center
    pub center: Vec2,
    /// Radius
    pub radius: f64,
    /// Occupants in entry order
    pub occupants: Vec<PlayerId>,
    /// Active pair
    pub pair: Option<MatchedPair>,
    /// Derived phase
    pub phase: ZonePhase,
}

impl ZoneState {
    /// Maximum simultaneous occupants.
    pub const CAPACITY: usize = 2;

    /// Create an empty zone.
    pub fn new(id: ZoneId, center: Vec2, radius: f64) -> Self {
        Self {
            id,
            center,
            radius,
            occupants: Vec::new(),
            pair: None,
            phase: ZonePhase::Empty,
        }
    }

    /// Recompute the derived phase from occupants and pair.
    pub fn recompute_phase(&mut self) {
        self.phase = match (self.occupants.len(), self.pair.is_some()) {
            (0, _) => ZonePhase::Empty,
            (2, true) => ZonePhase::Matched,
            _ => ZonePhase::Waiting,
        };
    }

    /// True when `id` is an occupant.
    #[inline]
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.occupants.contains(id)
    }

    /// Remove an occupant. Returns whether it was present.
    pub fn remove_occupant(&mut self, id: &PlayerId) -> bool {
        let before = self.occupants.len();
        self.occupants.retain(|o| o != id);
        before != self.occupants.len()
    }
}

// =============================================================================
// MATCH PHASE & STANDINGS
// =============================================================================

/// Current phase of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub enum MatchPhase {
    /// Roster being assembled
    #[default]
    Waiting,
    /// Active gameplay
    Playing,
    /// Match ended
    Ended,
}

/// Final result row for one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// Player
    pub player_id: PlayerId,
    /// Display name
    pub name: String,
    /// Stars at end
    pub stars: u32,
    /// Gold at end
    pub gold: u32,
    /// Passed the gate
    pub cleared: bool,
    /// Not eliminated
    pub alive: bool,
    /// Tokens still held
    pub cards_left: u32,
    /// AI seat
    pub is_ai: bool,
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchState {
    /// Match identifier (room id)
    pub match_id: String,

    /// Current tick
    pub tick: u32,

    /// Current match phase
    pub phase: MatchPhase,

    /// Settings for this match
    pub settings: MatchSettings,

    /// RNG seed (for verification)
    pub rng_seed: u64,

    /// Deterministic RNG state (relocation fallback, AI seeding)
    pub rng: DeterministicRng,

    /// All players (BTreeMap for deterministic iteration)
    pub players: BTreeMap<PlayerId, Player>,

    /// Battle zones, indexed by [`ZoneId`]
    pub zones: Vec<ZoneState>,

    /// Pair cooldowns for field encounters
    pub cooldowns: CollisionCooldowns,

    /// Open trade negotiations
    pub trades: TradeBook,

    /// Brains of AI-controlled players
    pub ai_brains: BTreeMap<PlayerId, AiBrain>,

    /// Ticks left on the match clock
    pub ticks_remaining: u32,

    /// Final standings (filled when the match ends)
    pub standings: Vec<Standing>,

    /// Events generated since the last drain
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a new match state.
    pub fn new(match_id: impl Into<String>, settings: MatchSettings, rng_seed: u64) -> Self {
        let ticks_remaining = settings.time_limit_ticks();
        Self {
            match_id: match_id.into(),
            tick: 0,
            phase: MatchPhase::Waiting,
            settings,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            players: BTreeMap::new(),
            zones: Vec::new(),
            cooldowns: CollisionCooldowns::default(),
            trades: TradeBook::default(),
            ai_brains: BTreeMap::new(),
            ticks_remaining,
            standings: Vec::new(),
            pending_events: Vec::new(),
        }
    }

    /// Add a player to the roster. Ignored once the match has started.
    pub fn add_player(&mut self, id: PlayerId, name: impl Into<String>, is_ai: bool) {
        if self.phase != MatchPhase::Waiting {
            return;
        }
        self.players.insert(id, Player::new(id, name, is_ai));
    }

    /// Deal resources, place players and zones, and begin play.
    pub fn start(&mut self) {
        let settings = self.settings.clone();
        let n = self.players.len().max(1);
        let center = settings.center();
        let spawn_radius = settings.field_width.min(settings.field_height) * 0.35;

        for (i, player) in self.players.values_mut().enumerate() {
            let angle = std::f64::consts::TAU * i as f64 / n as f64;
            let spawn = (center + Vec2::from_angle(angle) * spawn_radius)
                .clamp_axes(settings.min_bound(), settings.max_bound());
            player.position = spawn;
            player.spawn_point = spawn;
            player.intent = Vec2::ZERO;
            player.command = Command::None;
            player.inventory = Inventory::uniform(settings.tokens_per_type);
            player.stars = settings.initial_stars;
            player.gold = settings.initial_gold;
        }

        let ai_ids: Vec<PlayerId> = self.players.values()
            .filter(|p| p.is_ai)
            .map(|p| p.id)
            .collect();
        for id in ai_ids {
            let brain = AiBrain::new(self.rng.fork());
            self.ai_brains.insert(id, brain);
        }

        self.zones = zone::layout_zones(&settings);
        self.ticks_remaining = settings.time_limit_ticks();
        self.phase = MatchPhase::Playing;

        info!(
            match_id = %self.match_id,
            players = self.players.len(),
            zones = self.zones.len(),
            "Match started"
        );
    }

    /// Get a player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Get a zone by ID.
    pub fn zone(&self, id: ZoneId) -> Option<&ZoneState> {
        self.zones.get(id.0 as usize)
    }

    /// Get a zone mutably by ID.
    pub fn zone_mut(&mut self, id: ZoneId) -> Option<&mut ZoneState> {
        self.zones.get_mut(id.0 as usize)
    }

    /// Players neither eliminated nor cleared.
    pub fn active_count(&self) -> usize {
        self.players.values().filter(|p| p.is_active()).count()
    }

    /// Whole seconds left on the clock (rounded up).
    pub fn time_left_secs(&self) -> u32 {
        let rate = self.settings.tick_rate.max(1);
        self.ticks_remaining.div_ceil(rate)
    }

    /// Tokens held across all living players.
    pub fn card_totals(&self) -> Inventory {
        let mut totals = Inventory::default();
        for player in self.players.values().filter(|p| p.alive) {
            totals += player.inventory;
        }
        totals
    }

    /// Move a player to its reset position and start recovery.
    ///
    /// `zone_center` is the zone the player is leaving, used by
    /// [`RelocationPolicy::EjectFromZone`].
    pub fn relocate_with_recovery(&mut self, id: &PlayerId, zone: Option<(Vec2, f64)>) {
        let settings = &self.settings;
        let (min, max) = (settings.min_bound(), settings.max_bound());
        let radius = settings.player_radius;
        let policy = settings.relocation;
        let until = self.tick + settings.recovery_ticks;

        let Some(position) = self.players.get(id).map(|p| p.position) else {
            return;
        };

        let target = match (policy, zone) {
            (RelocationPolicy::EjectFromZone, Some((center, zone_radius))) => {
                let offset = position - center;
                let dir = if offset.length() < 0.1 {
                    self.rng.random_direction()
                } else {
                    offset.normalize()
                };
                center + dir * (zone_radius + radius * 6.0)
            }
            _ => match self.players.get(id) {
                Some(p) => p.spawn_point,
                None => return,
            },
        };

        if let Some(player) = self.players.get_mut(id) {
            player.position = target.clamp_axes(min, max);
            player.intent = Vec2::ZERO;
            player.recovery_until = Some(until);
        }
    }

    /// Eliminate a player. No-op if already eliminated.
    ///
    /// Cancels any pending duel (the opponent is told `opponent_eliminated`),
    /// vacates the zone and closes open trades.
    pub fn eliminate_player(&mut self, id: &PlayerId, reason: EliminationReason) {
        let tick = self.tick;
        let name = match self.players.get_mut(id) {
            Some(player) if player.alive => {
                player.alive = false;
                player.intent = Vec2::ZERO;
                player.eliminated_tick = Some(tick);
                player.elimination_reason = Some(reason);
                player.name.clone()
            }
            _ => return,
        };

        zone::withdraw_player(self, id, None, CancelReason::OpponentEliminated);

        for partner in self.trades.cancel_for_player(id) {
            self.push_event(GameEvent::trade_closed(tick, partner, false, "partner left the game"));
        }

        self.push_event(GameEvent::player_eliminated(tick, *id, reason));
        info!(
            match_id = %self.match_id,
            player = %id.short(),
            name = %name,
            reason = reason.as_str(),
            "Player eliminated"
        );
    }

    /// Final standings: cleared, then alive, then eliminated; ties by stars,
    /// then gold (both descending), then id.
    pub fn compute_standings(&self) -> Vec<Standing> {
        let mut rows: Vec<Standing> = self.players.values()
            .map(|p| Standing {
                player_id: p.id,
                name: p.name.clone(),
                stars: p.stars,
                gold: p.gold,
                cleared: p.cleared,
                alive: p.alive,
                cards_left: p.inventory.total(),
                is_ai: p.is_ai,
            })
            .collect();

        rows.sort_by(|a, b| {
            b.cleared.cmp(&a.cleared)
                .then(b.alive.cmp(&a.alive))
                .then(b.stars.cmp(&a.stars))
                .then(b.gold.cmp(&a.gold))
                .then(a.player_id.cmp(&b.player_id))
        });
        rows
    }

    /// Check if match has ended.
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, MatchPhase::Ended)
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng_seed, |hasher| {
            for player in self.players.values() {
                player.hash_into(hasher);
            }

            for zone in &self.zones {
                hasher.update_u32(zone.id.0 as u32);
                hasher.update_u32(zone.occupants.len() as u32);
                for occupant in &zone.occupants {
                    hasher.update_uuid(&occupant.0);
                }
                match &zone.pair {
                    Some(pair) => {
                        hasher.update_bool(true);
                        hasher.update_uuid(&pair.a.0);
                        hasher.update_uuid(&pair.b.0);
                        hasher.update_u32(pair.countdown_ticks);
                        hasher.update_bool(pair.resolved);
                    }
                    None => hasher.update_bool(false),
                }
            }

            hasher.update_u32(self.ticks_remaining);
            hasher.update_u32(self.cooldowns.len() as u32);
            hasher.update_u32(self.trades.len() as u32);
        })
    }

    /// Take pending events in delivery order (tick, then priority).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        let mut events = std::mem::take(&mut self.pending_events);
        events.sort();
        events
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::GameEventData;

    fn started(n: u8) -> MatchState {
        let mut state = MatchState::new("room", MatchSettings::default(), 12345);
        for i in 0..n {
            state.add_player(PlayerId::new([i + 1; 16]), format!("p{}", i), false);
        }
        state.start();
        state
    }

    #[test]
    fn test_player_id_ordering() {
        let id1 = PlayerId::new([0; 16]);
        let id2 = PlayerId::new([1; 16]);
        let id3 = PlayerId::new([0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

        assert!(id1 < id2);
        assert!(id1 < id3);
        assert!(id3 < id2);
    }

    #[test]
    fn test_player_id_uuid_roundtrip_and_short() {
        let id = PlayerId::generate();
        assert_eq!(PlayerId::from_uuid_str(&id.to_uuid_string()), Some(id));
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_hand_cycle() {
        assert!(Hand::Rock.beats(Hand::Scissors));
        assert!(Hand::Scissors.beats(Hand::Paper));
        assert!(Hand::Paper.beats(Hand::Rock));
        for hand in Hand::ALL {
            assert!(!hand.beats(hand));
        }
    }

    #[test]
    fn test_inventory_take_and_most_held() {
        let mut inv = Inventory { rock: 1, scissors: 3, paper: 3 };
        assert_eq!(inv.most_held(), Some(Hand::Scissors));
        assert!(inv.take(Hand::Rock));
        assert!(!inv.take(Hand::Rock));
        assert_eq!(inv.total(), 6);
        assert_eq!(Inventory::default().most_held(), None);
    }

    #[test]
    fn test_start_deals_and_places_on_spawn_circle() {
        let state = started(4);
        let settings = MatchSettings::default();
        let center = settings.center();

        for player in state.players.values() {
            assert_eq!(player.inventory, Inventory::uniform(4));
            assert_eq!(player.stars, 3);
            assert_eq!(player.gold, 100);
            let d = player.position.distance(center);
            assert!((d - 280.0).abs() < 1e-9, "spawn radius was {}", d);
            assert_eq!(player.position, player.spawn_point);
        }
        assert_eq!(state.zones.len(), 4);
        assert_eq!(state.phase, MatchPhase::Playing);
        assert_eq!(state.time_left_secs(), 300);
    }

    #[test]
    fn test_eliminate_is_idempotent() {
        let mut state = started(3);
        let id = PlayerId::new([1; 16]);

        state.eliminate_player(&id, EliminationReason::Disconnected);
        state.eliminate_player(&id, EliminationReason::NoStars);

        let player = &state.players[&id];
        assert!(!player.alive);
        assert_eq!(player.elimination_reason, Some(EliminationReason::Disconnected));

        let eliminations = state.take_events().into_iter()
            .filter(|e| matches!(e.data, GameEventData::PlayerEliminated { .. }))
            .count();
        assert_eq!(eliminations, 1);
    }

    #[test]
    fn test_standings_order() {
        let mut state = started(4);
        let ids: Vec<PlayerId> = state.players.keys().copied().collect();

        state.players.get_mut(&ids[0]).unwrap().stars = 1;
        state.players.get_mut(&ids[1]).unwrap().cleared = true;
        state.players.get_mut(&ids[2]).unwrap().alive = false;
        state.players.get_mut(&ids[3]).unwrap().gold = 150;

        let order: Vec<PlayerId> = state.compute_standings().iter().map(|s| s.player_id).collect();
        assert_eq!(order, vec![ids[1], ids[3], ids[0], ids[2]]);
    }

    #[test]
    fn test_match_state_determinism() {
        let a = started(4);
        let b = started(4);
        assert_eq!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn test_card_totals_skip_eliminated() {
        let mut state = started(2);
        state.eliminate_player(&PlayerId::new([1; 16]), EliminationReason::Disconnected);
        assert_eq!(state.card_totals(), Inventory::uniform(4));
    }
}
