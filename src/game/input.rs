//! Input Validation and Recording
//!
//! Every inbound player action passes through [`apply_action`], which
//! validates it against the current state and writes the latest value into
//! the player's fields (last write wins). Accepted actions can be recorded
//! in an [`InputLog`] for replay.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::vec2::Vec2;
use crate::game::state::{
    Command, DuelChoice, EliminationReason, Hand, MatchPhase, MatchState, PlayerId,
};
use crate::game::trade::{self, TradeBundle, TradeError};
use crate::game::zone::{self, CancelReason};

/// Reasons an action is rejected. Rejected actions never mutate state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    /// No such player in this match
    #[error("unknown player")]
    UnknownPlayer,
    /// Match is not running
    #[error("match is not running")]
    MatchNotRunning,
    /// Player was eliminated or already cleared
    #[error("player is no longer active")]
    NotActive,
    /// Movement vector was not finite
    #[error("invalid movement vector")]
    InvalidIntent,
    /// Token command or duel hand not held
    #[error("no {} token left", .0.as_str())]
    HandNotHeld(Hand),
    /// Duel submission outside a pending duel
    #[error("not in a pending duel")]
    NotInDuel,
    /// Stake negative or above current gold
    #[error("bet {stake} outside 0..={gold}")]
    StakeOutOfRange {
        /// Requested stake
        stake: i64,
        /// Gold held
        gold: u32,
    },
    /// Trade failure
    #[error(transparent)]
    Trade(#[from] TradeError),
}

/// One inbound player action.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlayerAction {
    /// Movement intent
    Move {
        /// X component
        dx: f64,
        /// Y component
        dy: f64,
    },
    /// Field command
    SelectCommand(Command),
    /// Duel submission
    DuelChoice {
        /// Token played
        hand: Hand,
        /// Requested stake
        bet: i64,
    },
    /// Withdraw from the current zone
    LeaveZone,
    /// Trade proposal
    TradeOffer {
        /// Given
        offer: TradeBundle,
        /// Wanted
        request: TradeBundle,
    },
    /// Trade answer
    TradeRespond {
        /// Accept or decline
        accept: bool,
    },
    /// Connection lost
    Disconnect,
}

/// Normalize a raw movement vector: non-finite is rejected, longer than one
/// is scaled to unit length, shorter is kept.
pub fn normalize_intent(dx: f64, dy: f64) -> Result<Vec2, InputError> {
    let raw = Vec2::new(dx, dy);
    if !raw.is_finite() {
        return Err(InputError::InvalidIntent);
    }
    Ok(raw.clamp_length_to_unit())
}

/// Validate and apply one action for `player`.
pub fn apply_action(
    state: &mut MatchState,
    player_id: PlayerId,
    action: &PlayerAction,
) -> Result<(), InputError> {
    if state.phase != MatchPhase::Playing {
        return Err(InputError::MatchNotRunning);
    }
    let player = state.players.get(&player_id).ok_or(InputError::UnknownPlayer)?;

    if let PlayerAction::Disconnect = action {
        state.eliminate_player(&player_id, EliminationReason::Disconnected);
        return Ok(());
    }
    if !player.is_active() {
        return Err(InputError::NotActive);
    }

    match *action {
        PlayerAction::Move { dx, dy } => {
            let intent = normalize_intent(dx, dy)?;
            if let Some(p) = state.players.get_mut(&player_id) {
                p.intent = intent;
            }
        }
        PlayerAction::SelectCommand(command) => {
            if let Some(hand) = command.hand() {
                if !player.inventory.holds(hand) {
                    return Err(InputError::HandNotHeld(hand));
                }
            }
            if let Some(p) = state.players.get_mut(&player_id) {
                p.command = command;
            }
        }
        PlayerAction::DuelChoice { hand, bet } => {
            let zone_id = match (player.in_zone, player.zone_matched_with) {
                (Some(zone_id), Some(_)) => zone_id,
                _ => return Err(InputError::NotInDuel),
            };
            let open = state.zone(zone_id)
                .and_then(|z| z.pair)
                .is_some_and(|pair| pair.contains(&player_id) && !pair.resolved);
            if !open {
                return Err(InputError::NotInDuel);
            }
            if !player.inventory.holds(hand) {
                return Err(InputError::HandNotHeld(hand));
            }
            if bet < 0 || bet > player.gold as i64 {
                return Err(InputError::StakeOutOfRange { stake: bet, gold: player.gold });
            }
            let stake = bet as u32;
            if let Some(p) = state.players.get_mut(&player_id) {
                p.duel_choice = Some(DuelChoice { hand, stake });
            }
        }
        PlayerAction::LeaveZone => {
            zone::withdraw_player(
                state,
                &player_id,
                Some(CancelReason::SelfLeft),
                CancelReason::OpponentLeft,
            );
        }
        PlayerAction::TradeOffer { offer, request } => {
            trade::propose(state, player_id, offer, request)?;
        }
        PlayerAction::TradeRespond { accept } => {
            trade::respond(state, player_id, accept)?;
        }
        PlayerAction::Disconnect => {}
    }
    Ok(())
}

// =============================================================================
// INPUT LOG (replay)
// =============================================================================

/// An accepted action stamped with the tick counter at arrival.
///
/// Actions stamped `t` arrived after tick `t` ran and are applied before
/// tick `t + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Tick counter at arrival
    pub tick: u32,
    /// Acting player
    pub player_id: PlayerId,
    /// The action
    pub action: PlayerAction,
}

/// Ordered log of accepted actions for one match.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputLog {
    records: Vec<InputRecord>,
}

impl InputLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action.
    pub fn record(&mut self, tick: u32, player_id: PlayerId, action: PlayerAction) {
        self.records.push(InputRecord { tick, player_id, action });
    }

    /// Actions stamped with `tick`, in arrival order.
    pub fn at_tick(&self, tick: u32) -> impl Iterator<Item = &InputRecord> {
        self.records.iter().filter(move |r| r.tick == tick)
    }

    /// All records.
    pub fn records(&self) -> &[InputRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize to bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from bincode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::settings::MatchSettings;
    use crate::game::state::ZoneId;

    fn pid(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    fn running() -> MatchState {
        let mut state = MatchState::new("input-test", MatchSettings::default(), 9);
        state.add_player(pid(1), "one", false);
        state.add_player(pid(2), "two", false);
        state.start();
        state
    }

    fn matched() -> MatchState {
        let mut state = running();
        let center = state.zones[0].center;
        for id in [pid(1), pid(2)] {
            state.players.get_mut(&id).unwrap().position = center;
        }
        zone::update_zones(&mut state);
        zone::begin_match(&mut state, ZoneId(0), pid(1), pid(2));
        state.take_events();
        state
    }

    #[test]
    fn test_intent_normalization() {
        assert_eq!(normalize_intent(3.0, 4.0).unwrap(), Vec2::new(0.6, 0.8));
        assert_eq!(normalize_intent(0.5, 0.0).unwrap(), Vec2::new(0.5, 0.0));
        assert_eq!(normalize_intent(f64::NAN, 0.0), Err(InputError::InvalidIntent));
    }

    #[test]
    fn test_move_last_write_wins() {
        let mut state = running();
        apply_action(&mut state, pid(1), &PlayerAction::Move { dx: 1.0, dy: 0.0 }).unwrap();
        apply_action(&mut state, pid(1), &PlayerAction::Move { dx: 0.0, dy: -1.0 }).unwrap();
        assert_eq!(state.players[&pid(1)].intent, Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_select_command_requires_token() {
        let mut state = running();
        state.players.get_mut(&pid(1)).unwrap().inventory.paper = 0;

        let err = apply_action(&mut state, pid(1), &PlayerAction::SelectCommand(Command::Paper));
        assert_eq!(err, Err(InputError::HandNotHeld(Hand::Paper)));
        assert_eq!(state.players[&pid(1)].command, Command::None);

        apply_action(&mut state, pid(1), &PlayerAction::SelectCommand(Command::Negotiate)).unwrap();
        assert_eq!(state.players[&pid(1)].command, Command::Negotiate);
    }

    #[test]
    fn test_duel_choice_outside_duel_rejected() {
        let mut state = running();
        let err = apply_action(&mut state, pid(1), &PlayerAction::DuelChoice { hand: Hand::Rock, bet: 10 });
        assert_eq!(err, Err(InputError::NotInDuel));
    }

    #[test]
    fn test_duel_choice_validation() {
        let mut state = matched();

        let over = apply_action(&mut state, pid(1), &PlayerAction::DuelChoice { hand: Hand::Rock, bet: 101 });
        assert_eq!(over, Err(InputError::StakeOutOfRange { stake: 101, gold: 100 }));

        let negative = apply_action(&mut state, pid(1), &PlayerAction::DuelChoice { hand: Hand::Rock, bet: -1 });
        assert!(matches!(negative, Err(InputError::StakeOutOfRange { .. })));

        state.players.get_mut(&pid(1)).unwrap().inventory.rock = 0;
        let missing = apply_action(&mut state, pid(1), &PlayerAction::DuelChoice { hand: Hand::Rock, bet: 0 });
        assert_eq!(missing, Err(InputError::HandNotHeld(Hand::Rock)));
        assert!(state.players[&pid(1)].duel_choice.is_none());

        apply_action(&mut state, pid(1), &PlayerAction::DuelChoice { hand: Hand::Paper, bet: 100 }).unwrap();
        assert_eq!(
            state.players[&pid(1)].duel_choice,
            Some(DuelChoice { hand: Hand::Paper, stake: 100 })
        );
    }

    #[test]
    fn test_leave_zone_tells_both_sides() {
        let mut state = matched();
        apply_action(&mut state, pid(1), &PlayerAction::LeaveZone).unwrap();

        let reasons: Vec<(PlayerId, CancelReason)> = state.take_events().into_iter()
            .filter_map(|e| match e.data {
                crate::game::events::GameEventData::ZoneCancelled { player_id, reason, .. } => {
                    Some((player_id, reason))
                }
                _ => None,
            })
            .collect();
        assert_eq!(reasons, vec![
            (pid(1), CancelReason::SelfLeft),
            (pid(2), CancelReason::OpponentLeft),
        ]);
        assert!(state.zones[0].pair.is_none());
    }

    #[test]
    fn test_eliminated_player_rejected() {
        let mut state = running();
        apply_action(&mut state, pid(1), &PlayerAction::Disconnect).unwrap();
        let err = apply_action(&mut state, pid(1), &PlayerAction::Move { dx: 1.0, dy: 0.0 });
        assert_eq!(err, Err(InputError::NotActive));
    }

    #[test]
    fn test_input_log_bincode() {
        let mut log = InputLog::new();
        log.record(3, pid(1), PlayerAction::Move { dx: 1.0, dy: 0.0 });
        log.record(3, pid(2), PlayerAction::SelectCommand(Command::Rock));
        log.record(7, pid(1), PlayerAction::LeaveZone);

        let bytes = log.to_bytes().unwrap();
        let decoded = InputLog::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, log);
        assert_eq!(decoded.at_tick(3).count(), 2);
        assert_eq!(decoded.at_tick(5).count(), 0);
    }
}
