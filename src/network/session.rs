//! Room Management
//!
//! Rooms are the lobby unit: a host, up to [`MAX_ROOM_PLAYERS`] members
//! (humans and AI seats) and at most one running match. A [`Room`] owns the
//! authoritative [`MatchState`] while playing and routes match events to
//! its members. [`RoomManager`] is the registry of rooms and of which room
//! each connected player sits in.

use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::core::hash::StateHash;
use crate::core::rng::derive_match_seed;
use crate::game::ai::AI_NAMES;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::{self, InputError, InputLog, PlayerAction};
use crate::game::settings::{MatchSettings, SettingsOverride};
use crate::game::state::{MatchState, PlayerId};
use crate::game::tick::{tick, TickResult};
use crate::network::protocol::{
    DuelistInfo, ErrorCode, MemberInfo, OpponentSummary, RoomDetail, RoomPhase,
    RoomSummary, ServerMessage, SettingsSummary, TradeRequestInfo,
};
use crate::network::snapshot;

/// Room identifier (8 hex chars).
pub type RoomId = String;

/// Default member cap per room.
pub const MAX_ROOM_PLAYERS: usize = 20;

/// Longest accepted player name.
pub const MAX_NAME_CHARS: usize = 20;

/// Longest accepted room name.
pub const MAX_ROOM_NAME_CHARS: usize = 30;

/// Members needed to start a match.
const MIN_PLAYERS_TO_START: usize = 2;

/// Trim `raw` and cut it to `max` chars, falling back to `default` when empty.
pub fn clean_name(raw: &str, max: usize, default: &str) -> String {
    let trimmed: String = raw.trim().chars().take(max).collect();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed
    }
}

/// Room lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No such room.
    #[error("Room not found")]
    NotFound,

    /// Room is at capacity.
    #[error("Room is full")]
    Full,

    /// Room is already playing.
    #[error("Game already in progress")]
    GameInProgress,

    /// Player is not in a room.
    #[error("Not in a room")]
    NotInRoom,

    /// Player already sits in this room.
    #[error("Already in this room")]
    AlreadyInRoom,

    /// Only the host may do this.
    #[error("Only the host can do that")]
    NotHost,

    /// Too few members to start.
    #[error("At least {0} players are needed")]
    NotEnoughPlayers(usize),

    /// No AI seat to remove.
    #[error("No AI players in the room")]
    NoAiPlayers,

    /// Action sent while no match is running.
    #[error("No game is running")]
    NotPlaying,

    /// Action rejected by the match.
    #[error(transparent)]
    Input(#[from] InputError),
}

impl RoomError {
    /// Wire error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            RoomError::NotFound => ErrorCode::RoomNotFound,
            RoomError::Full => ErrorCode::RoomFull,
            RoomError::GameInProgress => ErrorCode::GameInProgress,
            RoomError::NotInRoom => ErrorCode::NotInRoom,
            RoomError::NotHost => ErrorCode::NotHost,
            RoomError::NotEnoughPlayers(_) => ErrorCode::NotEnoughPlayers,
            RoomError::NoAiPlayers => ErrorCode::NoAiPlayers,
            RoomError::AlreadyInRoom | RoomError::NotPlaying | RoomError::Input(_) => {
                ErrorCode::InvalidInput
            }
        }
    }

    /// As a wire `error` message.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::error(self.code(), self.to_string())
    }
}

// =============================================================================
// MEMBERS
// =============================================================================

/// A seat in a room.
#[derive(Debug, Clone)]
pub struct Member {
    /// Player identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Driven by the built-in AI.
    pub is_ai: bool,
    /// Outbound channel (humans only).
    sender: Option<mpsc::Sender<ServerMessage>>,
}

impl Member {
    /// A connected human.
    pub fn human(id: PlayerId, name: impl Into<String>, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self { id, name: name.into(), is_ai: false, sender: Some(sender) }
    }

    /// An AI seat.
    pub fn ai(id: PlayerId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), is_ai: true, sender: None }
    }

    fn info(&self) -> MemberInfo {
        MemberInfo { id: self.id.to_string(), name: self.name.clone(), is_ai: self.is_ai }
    }

    /// Queue a message without waiting. A full channel drops the message.
    fn send(&self, message: ServerMessage) {
        let Some(sender) = &self.sender else { return };
        match sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(player = %self.id.short(), "Outbound queue full, message dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(player = %self.id.short(), "Outbound queue closed");
            }
        }
    }
}

fn send_to(members: &[Member], id: &PlayerId, message: ServerMessage) {
    if let Some(member) = members.iter().find(|m| m.id == *id) {
        member.send(message);
    }
}

fn broadcast(members: &[Member], message: &ServerMessage) {
    for member in members.iter().filter(|m| !m.is_ai) {
        member.send(message.clone());
    }
}

// =============================================================================
// ROOM
// =============================================================================

/// Inputs needed to re-run a finished match.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    /// State right after the match started.
    pub initial: MatchState,
    /// Every accepted action, stamped with its arrival tick.
    pub log: InputLog,
    /// Ticks the match ran.
    pub ticks: u32,
    /// Hash of the final state.
    pub final_hash: StateHash,
}

struct ActiveMatch {
    state: MatchState,
    initial: MatchState,
    log: InputLog,
}

/// A lobby room.
pub struct Room {
    /// Room identifier.
    pub id: RoomId,
    /// Display name.
    pub name: String,
    /// Current host.
    pub host: PlayerId,
    /// Lobby state.
    pub state: RoomPhase,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
    settings: MatchSettings,
    max_players: usize,
    members: Vec<Member>,
    game: Option<ActiveMatch>,
    matches_started: u64,
    last_record: Option<MatchRecord>,
}

impl Room {
    /// Create a room with `host` as its first member.
    pub fn new(
        id: RoomId,
        name: impl Into<String>,
        host: Member,
        settings: MatchSettings,
        max_players: usize,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            host: host.id,
            state: RoomPhase::Waiting,
            created_at: Utc::now(),
            settings,
            max_players,
            members: vec![host],
            game: None,
            matches_started: 0,
            last_record: None,
        }
    }

    /// Effective match settings.
    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    /// Total members, AI seats included.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Human members.
    pub fn human_count(&self) -> usize {
        self.members.iter().filter(|m| !m.is_ai).count()
    }

    /// True when `id` is a member.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.members.iter().any(|m| m.id == *id)
    }

    /// The running match, if any.
    pub fn match_state(&self) -> Option<&MatchState> {
        self.game.as_ref().map(|g| &g.state)
    }

    /// Replay inputs of the most recent finished match.
    pub fn last_record(&self) -> Option<&MatchRecord> {
        self.last_record.as_ref()
    }

    /// List entry.
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            player_count: self.members.len(),
            max_players: self.max_players,
            state: self.state,
            settings: SettingsSummary::from(&self.settings),
        }
    }

    /// Full room view.
    pub fn detail(&self) -> RoomDetail {
        RoomDetail {
            summary: self.summary(),
            host_id: self.host.to_string(),
            players: self.members.iter().map(Member::info).collect(),
        }
    }

    /// Send to one member.
    pub fn send_to(&self, id: &PlayerId, message: ServerMessage) {
        send_to(&self.members, id, message);
    }

    /// Send to every human member.
    pub fn broadcast(&self, message: ServerMessage) {
        broadcast(&self.members, &message);
    }

    /// Send to every human member except `skip`.
    pub fn broadcast_except(&self, skip: &PlayerId, message: ServerMessage) {
        for member in self.members.iter().filter(|m| !m.is_ai && m.id != *skip) {
            member.send(message.clone());
        }
    }

    /// Check whether a new member could join now.
    pub fn check_joinable(&self) -> Result<(), RoomError> {
        if self.state != RoomPhase::Waiting {
            return Err(RoomError::GameInProgress);
        }
        if self.members.len() >= self.max_players {
            return Err(RoomError::Full);
        }
        Ok(())
    }

    /// Seat a new member.
    pub fn add_member(&mut self, member: Member) -> Result<(), RoomError> {
        self.check_joinable()?;
        if self.contains(&member.id) {
            return Err(RoomError::AlreadyInRoom);
        }
        self.members.push(member);
        Ok(())
    }

    /// Remove a member. During a match the player is eliminated as
    /// disconnected; the host seat passes to the next human.
    pub fn remove_member(&mut self, id: &PlayerId) -> Option<Member> {
        let index = self.members.iter().position(|m| m.id == *id)?;
        let member = self.members.remove(index);

        if let Some(game) = self.game.as_mut() {
            let action = PlayerAction::Disconnect;
            if input::apply_action(&mut game.state, *id, &action).is_ok() {
                game.log.record(game.state.tick, *id, action);
            }
        }

        if self.host == *id {
            if let Some(next) = self.members.iter().find(|m| !m.is_ai).or(self.members.first()) {
                self.host = next.id;
                debug!(room = %self.id, host = %next.id.short(), "Host passed");
            }
        }
        Some(member)
    }

    fn require_host(&self, requester: &PlayerId) -> Result<(), RoomError> {
        if self.host != *requester {
            return Err(RoomError::NotHost);
        }
        Ok(())
    }

    /// Add an AI seat.
    pub fn add_ai(&mut self, requester: &PlayerId) -> Result<MemberInfo, RoomError> {
        self.require_host(requester)?;
        self.check_joinable()?;

        let n = self.members.iter().filter(|m| m.is_ai).count();
        let base = AI_NAMES[n % AI_NAMES.len()];
        let name = match n / AI_NAMES.len() {
            0 => base.to_string(),
            round => format!("{} {}", base, round + 1),
        };

        let member = Member::ai(PlayerId::generate(), name);
        let info = member.info();
        self.members.push(member);
        Ok(info)
    }

    /// Remove the most recently added AI seat.
    pub fn remove_ai(&mut self, requester: &PlayerId) -> Result<PlayerId, RoomError> {
        self.require_host(requester)?;
        if self.state != RoomPhase::Waiting {
            return Err(RoomError::GameInProgress);
        }
        let index = self.members.iter().rposition(|m| m.is_ai).ok_or(RoomError::NoAiPlayers)?;
        Ok(self.members.remove(index).id)
    }

    /// Start a match with the current members.
    pub fn start(&mut self, requester: &PlayerId) -> Result<(), RoomError> {
        self.require_host(requester)?;
        if self.state != RoomPhase::Waiting {
            return Err(RoomError::GameInProgress);
        }
        if self.members.len() < MIN_PLAYERS_TO_START {
            return Err(RoomError::NotEnoughPlayers(MIN_PLAYERS_TO_START));
        }

        let nonce = self.matches_started;
        self.matches_started += 1;

        let mut ids: Vec<[u8; 16]> = self.members.iter().map(|m| *m.id.as_bytes()).collect();
        ids.sort();
        let seed = derive_match_seed(&self.id, nonce, &ids);

        let mut state = MatchState::new(format!("{}-{}", self.id, nonce), self.settings.clone(), seed);
        for member in &self.members {
            state.add_player(member.id, member.name.clone(), member.is_ai);
        }
        state.start();

        broadcast(&self.members, &snapshot::game_started(&state));
        for member in self.members.iter().filter(|m| !m.is_ai) {
            if let Some(p) = state.get_player(&member.id) {
                member.send(ServerMessage::YourCards { cards: p.inventory });
                member.send(ServerMessage::YourGold { gold: p.gold });
            }
        }

        info!(room = %self.id, players = self.members.len(), seed, "Game started");

        self.game = Some(ActiveMatch { initial: state.clone(), state, log: InputLog::new() });
        self.state = RoomPhase::Playing;
        Ok(())
    }

    /// Apply one in-match action from a member.
    pub fn apply_action(&mut self, id: &PlayerId, action: PlayerAction) -> Result<(), RoomError> {
        let game = self.game.as_mut().ok_or(RoomError::NotPlaying)?;
        input::apply_action(&mut game.state, *id, &action)?;
        game.log.record(game.state.tick, *id, action);
        Ok(())
    }

    /// Advance the match one tick and push the results to members.
    ///
    /// Returns `None` when no match is running. When the match ends the room
    /// goes back to waiting.
    pub fn run_tick(&mut self) -> Option<TickResult> {
        let game = self.game.as_mut()?;
        let result = tick(&mut game.state);

        for event in &result.events {
            route_event(&self.members, &game.state, event);
        }
        if !result.match_ended {
            for member in self.members.iter().filter(|m| !m.is_ai) {
                member.send(ServerMessage::State(snapshot::state_for(&game.state, &member.id)));
            }
        } else {
            self.finish();
        }
        Some(result)
    }

    fn finish(&mut self) {
        let Some(game) = self.game.take() else { return };
        let record = MatchRecord {
            ticks: game.state.tick,
            final_hash: game.state.compute_hash(),
            initial: game.initial,
            log: game.log,
        };
        info!(
            room = %self.id,
            ticks = record.ticks,
            inputs = record.log.len(),
            "Game over, room back to waiting"
        );
        self.last_record = Some(record);
        self.state = RoomPhase::Waiting;
    }

    /// Drop any running match without results.
    pub fn close(&mut self) {
        if self.game.take().is_some() {
            info!(room = %self.id, "Game abandoned");
        }
        self.state = RoomPhase::Waiting;
    }
}

/// Translate one match event into member messages.
fn route_event(members: &[Member], state: &MatchState, event: &GameEvent) {
    let name_of = |id: &PlayerId| {
        state.get_player(id).map(|p| p.name.clone()).unwrap_or_default()
    };

    match &event.data {
        GameEventData::ZoneMatched { zone_id, player_id, opponent_id } => {
            if let Some(opponent) = state.get_player(opponent_id) {
                send_to(members, player_id, ServerMessage::ZoneMatch {
                    zone_id: zone_id.to_string(),
                    opponent: OpponentSummary {
                        id: opponent.id.to_string(),
                        name: opponent.name.clone(),
                        stars: opponent.stars,
                        gold: opponent.gold,
                        cards_left: opponent.inventory.total(),
                    },
                });
            }
        }
        GameEventData::ZoneCancelled { player_id, reason, .. } => {
            send_to(members, player_id, ServerMessage::ZoneCancelled { reason: *reason });
        }
        GameEventData::DuelResolved { player1, hand1, player2, hand2, winner, side, stake, .. } => {
            broadcast(members, &ServerMessage::ZoneFightResult {
                player1: DuelistInfo { id: player1.to_string(), name: name_of(player1), hand: *hand1 },
                player2: DuelistInfo { id: player2.to_string(), name: name_of(player2), hand: *hand2 },
                winner: winner.map(|w| w.to_string()),
                result: *side,
                bet: *stake,
            });
        }
        GameEventData::InventoryChanged { player_id } => {
            if let Some(p) = state.get_player(player_id) {
                send_to(members, player_id, ServerMessage::YourCards { cards: p.inventory });
                send_to(members, player_id, ServerMessage::YourGold { gold: p.gold });
            }
        }
        GameEventData::PlayerCleared { player_id } => {
            broadcast(members, &ServerMessage::PlayerCleared {
                player_id: player_id.to_string(),
                player_name: name_of(player_id),
            });
        }
        GameEventData::PlayerEliminated { player_id, reason } => {
            broadcast(members, &ServerMessage::PlayerEliminated {
                player_id: player_id.to_string(),
                player_name: name_of(player_id),
                reason: *reason,
            });
        }
        GameEventData::TradeStarted { player_id, partner_id } => {
            if let Some(partner) = state.get_player(partner_id) {
                send_to(members, player_id, ServerMessage::TradeRequest(TradeRequestInfo {
                    partner_id: partner.id.to_string(),
                    partner_name: partner.name.clone(),
                    partner_stars: Some(partner.stars),
                    partner_gold: Some(partner.gold),
                    partner_cards_left: Some(partner.inventory.total()),
                    offer: None,
                    request: None,
                }));
            }
        }
        GameEventData::TradeOffered { player_id, from_id, offer, request } => {
            send_to(members, player_id, ServerMessage::TradeRequest(TradeRequestInfo {
                partner_id: from_id.to_string(),
                partner_name: name_of(from_id),
                partner_stars: None,
                partner_gold: None,
                partner_cards_left: None,
                offer: Some(*offer),
                request: Some(*request),
            }));
        }
        GameEventData::TradeClosed { player_id, success, message } => {
            send_to(members, player_id, ServerMessage::TradeResult {
                success: *success,
                message: message.clone(),
            });
        }
        GameEventData::MatchEnded { standings, .. } => {
            broadcast(members, &snapshot::game_over(standings));
        }
    }
}

// =============================================================================
// ROOM MANAGER
// =============================================================================

/// Registry of rooms and player seats.
pub struct RoomManager {
    /// Rooms by id.
    rooms: RwLock<BTreeMap<RoomId, Arc<RwLock<Room>>>>,
    /// Player to room mapping (humans only).
    player_rooms: RwLock<BTreeMap<PlayerId, RoomId>>,
    /// Settings every room starts from.
    base_settings: MatchSettings,
    /// Member cap for new rooms.
    max_room_players: usize,
}

impl RoomManager {
    /// Create a manager.
    pub fn new(base_settings: MatchSettings, max_room_players: usize) -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
            player_rooms: RwLock::new(BTreeMap::new()),
            base_settings,
            max_room_players,
        }
    }

    /// Get a room by id.
    pub async fn get_room(&self, id: &str) -> Option<Arc<RwLock<Room>>> {
        self.rooms.read().await.get(id).cloned()
    }

    /// Room a player sits in.
    pub async fn get_player_room(&self, player_id: &PlayerId) -> Option<Arc<RwLock<Room>>> {
        let room_id = self.player_rooms.read().await.get(player_id).cloned()?;
        self.get_room(&room_id).await
    }

    /// Number of rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// All rooms, for the room list.
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let rooms: Vec<_> = self.rooms.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(rooms.len());
        for room in rooms {
            out.push(room.read().await.summary());
        }
        out
    }

    /// Create a room with `host` in it. Any previous room is left first.
    pub async fn create_room(
        &self,
        host: Member,
        room_name: &str,
        overrides: &SettingsOverride,
    ) -> Arc<RwLock<Room>> {
        self.leave_room(&host.id).await;

        let name = clean_name(room_name, MAX_ROOM_NAME_CHARS, &format!("{}'s room", host.name));
        let settings = self.base_settings.clone().with_overrides(overrides);
        let host_id = host.id;

        let mut rooms = self.rooms.write().await;
        let id = loop {
            let candidate: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let room = Room::new(id.clone(), name, host, settings, self.max_room_players);
        room.send_to(&host_id, ServerMessage::RoomCreated { room: room.detail() });
        info!(room = %id, host = %host_id.short(), "Room created");

        let room = Arc::new(RwLock::new(room));
        rooms.insert(id.clone(), room.clone());
        drop(rooms);

        self.player_rooms.write().await.insert(host_id, id);
        room
    }

    /// Join a waiting room, leaving any previous room first.
    pub async fn join_room(&self, member: Member, room_id: &str) -> Result<(), RoomError> {
        let room = self.get_room(room_id).await.ok_or(RoomError::NotFound)?;
        room.read().await.check_joinable()?;

        let current = self.player_rooms.read().await.get(&member.id).cloned();
        match current {
            Some(current) if current == room_id => return Err(RoomError::AlreadyInRoom),
            Some(_) => {
                self.leave_room(&member.id).await;
            }
            None => {}
        }

        let player_id = member.id;
        let info = member.info();
        {
            let mut guard = room.write().await;
            guard.add_member(member)?;
            let detail = guard.detail();
            guard.broadcast_except(&player_id, ServerMessage::PlayerJoined {
                player: info,
                room: detail.clone(),
            });
            guard.send_to(&player_id, ServerMessage::RoomJoined { room: detail });
        }

        self.player_rooms.write().await.insert(player_id, room_id.to_string());
        debug!(room = %room_id, player = %player_id.short(), "Player joined room");
        Ok(())
    }

    /// Leave the current room. Rooms without humans are removed.
    pub async fn leave_room(&self, player_id: &PlayerId) -> Option<RoomId> {
        let room_id = self.player_rooms.write().await.remove(player_id)?;

        let mut rooms = self.rooms.write().await;
        let room = rooms.get(&room_id).cloned()?;
        let mut guard = room.write().await;

        if guard.remove_member(player_id).is_some() {
            guard.broadcast(ServerMessage::PlayerLeft {
                player_id: player_id.to_string(),
                room: guard.detail(),
            });
        }

        if guard.human_count() == 0 {
            guard.close();
            rooms.remove(&room_id);
            info!(room = %room_id, "Room removed");
        }
        Some(room_id)
    }

    /// Start the match in the caller's room.
    pub async fn start_game(&self, player_id: &PlayerId) -> Result<Arc<RwLock<Room>>, RoomError> {
        let room = self.get_player_room(player_id).await.ok_or(RoomError::NotInRoom)?;
        room.write().await.start(player_id)?;
        Ok(room)
    }

    /// Add an AI seat to the caller's room.
    pub async fn add_ai(&self, player_id: &PlayerId) -> Result<(), RoomError> {
        let room = self.get_player_room(player_id).await.ok_or(RoomError::NotInRoom)?;
        let mut guard = room.write().await;
        let info = guard.add_ai(player_id)?;
        let detail = guard.detail();
        guard.broadcast(ServerMessage::PlayerJoined { player: info, room: detail });
        Ok(())
    }

    /// Remove the last AI seat from the caller's room.
    pub async fn remove_ai(&self, player_id: &PlayerId) -> Result<(), RoomError> {
        let room = self.get_player_room(player_id).await.ok_or(RoomError::NotInRoom)?;
        let mut guard = room.write().await;
        let removed = guard.remove_ai(player_id)?;
        let detail = guard.detail();
        guard.broadcast(ServerMessage::PlayerLeft { player_id: removed.to_string(), room: detail });
        Ok(())
    }

    /// Forward an in-match action.
    pub async fn submit_action(&self, player_id: &PlayerId, action: PlayerAction) -> Result<(), RoomError> {
        let room = self.get_player_room(player_id).await.ok_or(RoomError::NotInRoom)?;
        let mut guard = room.write().await;
        guard.apply_action(player_id, action)
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(MatchSettings::default(), MAX_ROOM_PLAYERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Command, EliminationReason, Hand};
    use crate::game::tick::replay_match;

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn human(byte: u8, name: &str) -> (Member, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(1024);
        (Member::human(PlayerId::new([byte; 16]), name, tx), rx)
    }

    async fn room_with_two(manager: &RoomManager) -> (
        Arc<RwLock<Room>>,
        (PlayerId, mpsc::Receiver<ServerMessage>),
        (PlayerId, mpsc::Receiver<ServerMessage>),
    ) {
        let (host, host_rx) = human(1, "Host");
        let (guest, guest_rx) = human(2, "Guest");
        let (host_id, guest_id) = (host.id, guest.id);
        let room = manager.create_room(host, "arena", &SettingsOverride::default()).await;
        let room_id = room.read().await.id.clone();
        manager.join_room(guest, &room_id).await.unwrap();
        (room, (host_id, host_rx), (guest_id, guest_rx))
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("  ", MAX_NAME_CHARS, "Guest"), "Guest");
        assert_eq!(clean_name("abcdefghijklmnopqrstuvwxyz", MAX_NAME_CHARS, "Guest").chars().count(), 20);
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let manager = RoomManager::default();
        let (host, mut rx) = human(1, "Host");
        let room = manager.create_room(host, "", &SettingsOverride::default()).await;

        let guard = room.read().await;
        assert_eq!(guard.id.len(), 8);
        assert!(guard.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(guard.name, "Host's room");
        drop(guard);

        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::RoomCreated { .. }]));
        let rooms = manager.list_rooms().await;
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].player_count, 1);
        assert_eq!(rooms[0].max_players, MAX_ROOM_PLAYERS);
    }

    #[tokio::test]
    async fn test_join_notifies_and_leave_passes_host() {
        let manager = RoomManager::default();
        let (room, (host_id, mut host_rx), (guest_id, mut guest_rx)) = room_with_two(&manager).await;

        let host_msgs = drain(&mut host_rx);
        assert!(host_msgs.iter().any(|m| matches!(m, ServerMessage::PlayerJoined { .. })));
        assert!(matches!(drain(&mut guest_rx).as_slice(), [ServerMessage::RoomJoined { .. }]));

        manager.leave_room(&host_id).await;
        assert_eq!(room.read().await.host, guest_id);
        assert!(drain(&mut guest_rx).iter().any(|m| matches!(m, ServerMessage::PlayerLeft { .. })));

        manager.leave_room(&guest_id).await;
        assert_eq!(manager.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_join_errors() {
        let manager = RoomManager::new(MatchSettings::default(), 2);
        let (room, (host_id, _), (guest_id, _)) = room_with_two(&manager).await;
        let room_id = room.read().await.id.clone();

        let (third, _rx) = human(3, "Third");
        assert!(matches!(manager.join_room(third, &room_id).await, Err(RoomError::Full)));

        let (fourth, _rx) = human(4, "Fourth");
        assert!(matches!(manager.join_room(fourth, "nope").await, Err(RoomError::NotFound)));

        let err = manager.start_game(&guest_id).await.err().unwrap();
        assert_eq!(err.code(), ErrorCode::NotHost);

        manager.start_game(&host_id).await.unwrap();
        assert!(matches!(
            manager.start_game(&host_id).await,
            Err(RoomError::GameInProgress)
        ));
    }

    #[tokio::test]
    async fn test_start_needs_two_members() {
        let manager = RoomManager::default();
        let (host, _rx) = human(1, "Solo");
        let host_id = host.id;
        manager.create_room(host, "solo", &SettingsOverride::default()).await;
        assert!(matches!(
            manager.start_game(&host_id).await,
            Err(RoomError::NotEnoughPlayers(2))
        ));
    }

    #[tokio::test]
    async fn test_ai_seats() {
        let manager = RoomManager::default();
        let (host, mut rx) = human(1, "Host");
        let host_id = host.id;
        let room = manager.create_room(host, "bots", &SettingsOverride::default()).await;

        assert!(matches!(manager.remove_ai(&host_id).await, Err(RoomError::NoAiPlayers)));
        manager.add_ai(&host_id).await.unwrap();
        manager.add_ai(&host_id).await.unwrap();

        {
            let guard = room.read().await;
            assert_eq!(guard.member_count(), 3);
            assert_eq!(guard.human_count(), 1);
            let names: Vec<_> = guard.detail().players.into_iter().map(|p| p.name).collect();
            assert_eq!(names[1], AI_NAMES[0]);
            assert_eq!(names[2], AI_NAMES[1]);
        }

        manager.remove_ai(&host_id).await.unwrap();
        let guard = room.read().await;
        assert_eq!(guard.member_count(), 2);
        assert_eq!(guard.detail().players[1].name, AI_NAMES[0]);
        drop(guard);

        let msgs = drain(&mut rx);
        assert_eq!(msgs.iter().filter(|m| matches!(m, ServerMessage::PlayerJoined { .. })).count(), 2);
        assert_eq!(msgs.iter().filter(|m| matches!(m, ServerMessage::PlayerLeft { .. })).count(), 1);
    }

    #[tokio::test]
    async fn test_start_sends_roster_and_private_state() {
        let manager = RoomManager::default();
        let (room, (host_id, mut host_rx), _) = room_with_two(&manager).await;
        drain(&mut host_rx);

        manager.start_game(&host_id).await.unwrap();
        assert_eq!(room.read().await.state, RoomPhase::Playing);

        let msgs = drain(&mut host_rx);
        assert!(matches!(msgs[0], ServerMessage::GameStarted { .. }));
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::YourCards { cards } if cards.total() == 12)));
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::YourGold { gold: 100 })));
    }

    #[tokio::test]
    async fn test_actions_need_running_match() {
        let manager = RoomManager::default();
        let (_room, (host_id, _), (guest_id, _)) = room_with_two(&manager).await;

        let err = manager.submit_action(&guest_id, PlayerAction::Move { dx: 1.0, dy: 0.0 }).await;
        assert!(matches!(err, Err(RoomError::NotPlaying)));

        manager.start_game(&host_id).await.unwrap();
        manager.submit_action(&guest_id, PlayerAction::Move { dx: 1.0, dy: 0.0 }).await.unwrap();

        let err = manager
            .submit_action(&guest_id, PlayerAction::DuelChoice { hand: Hand::Rock, bet: 10 })
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::InvalidInput);

        let outsider = PlayerId::new([9; 16]);
        assert!(matches!(
            manager.submit_action(&outsider, PlayerAction::SelectCommand(Command::Rock)).await,
            Err(RoomError::NotInRoom)
        ));
    }

    #[tokio::test]
    async fn test_state_snapshot_every_tick() {
        let manager = RoomManager::default();
        let (room, (host_id, mut host_rx), _) = room_with_two(&manager).await;
        manager.start_game(&host_id).await.unwrap();
        drain(&mut host_rx);

        room.write().await.run_tick().unwrap();
        let msgs = drain(&mut host_rx);
        assert!(matches!(msgs.last(), Some(ServerMessage::State(s)) if s.tick == 1));
    }

    #[tokio::test]
    async fn test_leave_mid_game_eliminates_and_ends() {
        let manager = RoomManager::default();
        let (room, (host_id, mut host_rx), (guest_id, mut guest_rx)) = room_with_two(&manager).await;
        manager.start_game(&host_id).await.unwrap();
        drain(&mut host_rx);
        drain(&mut guest_rx);

        manager.leave_room(&guest_id).await;
        {
            let guard = room.read().await;
            let state = guard.match_state().unwrap();
            let p = state.get_player(&guest_id).unwrap();
            assert!(!p.alive);
            assert_eq!(p.elimination_reason, Some(EliminationReason::Disconnected));
        }

        let result = room.write().await.run_tick().unwrap();
        assert!(result.match_ended);

        let msgs = drain(&mut host_rx);
        assert!(msgs.iter().any(|m| matches!(
            m,
            ServerMessage::PlayerEliminated { reason: EliminationReason::Disconnected, .. }
        )));
        assert!(msgs.iter().any(|m| matches!(m, ServerMessage::GameOver { .. })));
        // Leaver hears nothing about their own elimination
        assert!(drain(&mut guest_rx).is_empty());

        let guard = room.read().await;
        assert_eq!(guard.state, RoomPhase::Waiting);
        assert!(guard.match_state().is_none());
    }

    #[tokio::test]
    async fn test_finished_match_replays_to_same_hash() {
        let manager = RoomManager::default();
        let (host, mut rx) = human(1, "Host");
        let host_id = host.id;
        let overrides = SettingsOverride { time_limit: Some(30.0), ..Default::default() };
        let room = manager.create_room(host, "replay", &overrides).await;
        manager.add_ai(&host_id).await.unwrap();
        manager.add_ai(&host_id).await.unwrap();
        manager.start_game(&host_id).await.unwrap();

        let mut guard = room.write().await;
        guard.apply_action(&host_id, PlayerAction::Move { dx: 0.0, dy: -1.0 }).unwrap();
        let mut ended = false;
        for i in 0..700 {
            if i == 50 {
                guard.apply_action(&host_id, PlayerAction::Move { dx: 1.0, dy: 0.5 }).unwrap();
            }
            match guard.run_tick() {
                Some(result) if result.match_ended => {
                    ended = true;
                    break;
                }
                Some(_) => {}
                None => break,
            }
        }
        assert!(ended);

        let record = guard.last_record().unwrap().clone();
        assert_eq!(record.log.len(), 2);
        let (replayed, _) = replay_match(record.initial, &record.log, record.ticks);
        assert_eq!(replayed.compute_hash(), record.final_hash);

        assert!(drain(&mut rx).iter().any(|m| matches!(m, ServerMessage::GameOver { .. })));
    }
}
