//! Trade Negotiation
//!
//! Two players showing `negotiate` who bump into each other open a trade.
//! Either side may propose a bundle swap; the other side accepts or
//! declines. One open trade per player.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::game::collision::PairKey;
use crate::game::events::{EventPriority, GameEvent, GameEventData};
use crate::game::state::{EliminationReason, Hand, Inventory, MatchState, Player, PlayerId};

/// Resources on one side of a trade.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeBundle {
    /// Tokens
    pub cards: Inventory,
    /// Stars
    pub stars: u32,
    /// Gold
    pub gold: u32,
}

impl TradeBundle {
    fn affordable_by(&self, player: &Player) -> bool {
        player.inventory.covers(&self.cards)
            && player.stars >= self.stars
            && player.gold >= self.gold
    }
}

/// Latest proposal in a trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Who proposed
    pub from: PlayerId,
    /// What the proposer gives
    pub offer: TradeBundle,
    /// What the proposer wants back
    pub request: TradeBundle,
}

/// An open trade between two players.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TradeSession {
    /// Participants
    pub key: PairKey,
    /// First participant
    pub a: PlayerId,
    /// Second participant
    pub b: PlayerId,
    /// Most recent proposal
    pub proposal: Option<Proposal>,
}

impl TradeSession {
    fn partner_of(&self, id: &PlayerId) -> PlayerId {
        if self.a == *id { self.b } else { self.a }
    }
}

/// Trade failures reported to the acting player.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TradeError {
    /// Player has no open trade
    #[error("no open trade")]
    NoSession,
    /// Accept before any proposal
    #[error("nothing has been offered yet")]
    NoProposal,
    /// Player tried to accept their own proposal
    #[error("cannot accept your own offer")]
    OwnProposal,
    /// Player is paired in a battle zone
    #[error("cannot trade during a duel")]
    InDuel,
}

/// All open trades of a match.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TradeBook {
    sessions: BTreeMap<PairKey, TradeSession>,
}

impl TradeBook {
    /// The open trade `id` takes part in.
    pub fn session_of(&self, id: &PlayerId) -> Option<&TradeSession> {
        self.sessions.values().find(|s| s.key.involves(id))
    }

    fn session_key_of(&self, id: &PlayerId) -> Option<PairKey> {
        self.session_of(id).map(|s| s.key)
    }

    /// Close every trade `id` takes part in; returns the partners.
    pub fn cancel_for_player(&mut self, id: &PlayerId) -> Vec<PlayerId> {
        let mut partners = Vec::new();
        self.sessions.retain(|key, session| {
            if key.involves(id) {
                partners.push(session.partner_of(id));
                false
            } else {
                true
            }
        });
        partners
    }

    /// Number of open trades.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no trade is open.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Open a trade between `a` and `b` unless either is already trading.
pub fn start_trade(state: &mut MatchState, a: PlayerId, b: PlayerId) {
    if state.trades.session_of(&a).is_some() || state.trades.session_of(&b).is_some() {
        return;
    }
    let key = PairKey::new(a, b);
    state.trades.sessions.insert(key, TradeSession { key, a, b, proposal: None });

    let tick = state.tick;
    state.push_event(GameEvent::trade_started(tick, a, b));
    state.push_event(GameEvent::trade_started(tick, b, a));
    debug!(a = %a.short(), b = %b.short(), "Trade opened");
}

/// Record a proposal from `from` and forward it to the partner.
pub fn propose(
    state: &mut MatchState,
    from: PlayerId,
    offer: TradeBundle,
    request: TradeBundle,
) -> Result<(), TradeError> {
    ensure_not_dueling(state, &from)?;
    let key = state.trades.session_key_of(&from).ok_or(TradeError::NoSession)?;
    let session = state.trades.sessions.get_mut(&key).ok_or(TradeError::NoSession)?;
    session.proposal = Some(Proposal { from, offer, request });
    let partner = session.partner_of(&from);

    state.push_event(GameEvent::new(
        state.tick,
        EventPriority::Trade,
        GameEventData::TradeOffered { player_id: partner, from_id: from, offer, request },
    ));
    Ok(())
}

fn ensure_not_dueling(state: &MatchState, id: &PlayerId) -> Result<(), TradeError> {
    if state.players.get(id).is_some_and(|p| p.is_matched()) {
        return Err(TradeError::InDuel);
    }
    Ok(())
}

fn give(state: &mut MatchState, from: PlayerId, to: PlayerId, bundle: &TradeBundle) {
    if let Some(giver) = state.players.get_mut(&from) {
        for hand in Hand::ALL {
            giver.inventory.remove(hand, bundle.cards.count(hand));
        }
        giver.stars = giver.stars.saturating_sub(bundle.stars);
        giver.gold = giver.gold.saturating_sub(bundle.gold);
    }
    if let Some(taker) = state.players.get_mut(&to) {
        for hand in Hand::ALL {
            taker.inventory.add(hand, bundle.cards.count(hand));
        }
        taker.stars = taker.stars.saturating_add(bundle.stars);
        taker.gold = taker.gold.saturating_add(bundle.gold);
    }
}

/// Answer the open trade. Declining closes it; accepting applies the latest
/// proposal if both sides can still afford it.
pub fn respond(state: &mut MatchState, from: PlayerId, accept: bool) -> Result<(), TradeError> {
    ensure_not_dueling(state, &from)?;
    let tick = state.tick;
    let key = state.trades.session_key_of(&from).ok_or(TradeError::NoSession)?;
    let session = state.trades.sessions.get(&key).cloned().ok_or(TradeError::NoSession)?;
    let participants = [session.a, session.b];

    if !accept {
        state.trades.sessions.remove(&key);
        for id in participants {
            state.push_event(GameEvent::trade_closed(tick, id, false, "trade cancelled"));
        }
        return Ok(());
    }

    let proposal = session.proposal.ok_or(TradeError::NoProposal)?;
    if proposal.from == from {
        return Err(TradeError::OwnProposal);
    }
    state.trades.sessions.remove(&key);

    let affordable = match (state.players.get(&proposal.from), state.players.get(&from)) {
        (Some(proposer), Some(accepter)) => {
            proposer.is_active()
                && accepter.is_active()
                && proposal.offer.affordable_by(proposer)
                && proposal.request.affordable_by(accepter)
        }
        _ => false,
    };
    if !affordable {
        for id in participants {
            state.push_event(GameEvent::trade_closed(tick, id, false, "insufficient resources"));
        }
        return Ok(());
    }

    give(state, proposal.from, from, &proposal.offer);
    give(state, from, proposal.from, &proposal.request);

    for id in participants {
        state.push_event(GameEvent::trade_closed(tick, id, true, "trade completed"));
        state.push_event(GameEvent::inventory_changed(tick, id));
    }
    debug!(proposer = %proposal.from.short(), accepter = %from.short(), "Trade completed");

    for id in participants {
        if state.players.get(&id).is_some_and(|p| p.alive && p.stars == 0) {
            state.eliminate_player(&id, EliminationReason::NoStars);
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::settings::MatchSettings;

    fn pid(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    fn trading() -> MatchState {
        let mut state = MatchState::new("trade-test", MatchSettings::default(), 5);
        for i in 1..=3 {
            state.add_player(pid(i), format!("p{}", i), false);
        }
        state.start();
        start_trade(&mut state, pid(1), pid(2));
        state.take_events();
        state
    }

    fn rocks(n: u32) -> TradeBundle {
        TradeBundle {
            cards: Inventory { rock: n, ..Default::default() },
            ..Default::default()
        }
    }

    fn gold(n: u32) -> TradeBundle {
        TradeBundle { gold: n, ..Default::default() }
    }

    #[test]
    fn test_one_trade_per_player() {
        let mut state = trading();
        start_trade(&mut state, pid(2), pid(3));
        assert_eq!(state.trades.len(), 1);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_accepted_trade_transfers() {
        let mut state = trading();
        propose(&mut state, pid(1), rocks(2), gold(30)).unwrap();
        respond(&mut state, pid(2), true).unwrap();

        let a = &state.players[&pid(1)];
        let b = &state.players[&pid(2)];
        assert_eq!((a.inventory.rock, a.gold), (2, 130));
        assert_eq!((b.inventory.rock, b.gold), (6, 70));
        assert!(state.trades.is_empty());
    }

    #[test]
    fn test_own_proposal_cannot_be_accepted() {
        let mut state = trading();
        propose(&mut state, pid(1), rocks(1), gold(1)).unwrap();
        assert_eq!(respond(&mut state, pid(1), true), Err(TradeError::OwnProposal));
        assert_eq!(state.trades.len(), 1);
    }

    #[test]
    fn test_unaffordable_trade_fails_cleanly() {
        let mut state = trading();
        propose(&mut state, pid(1), gold(500), rocks(1)).unwrap();
        state.take_events();
        respond(&mut state, pid(2), true).unwrap();

        assert_eq!(state.players[&pid(1)].gold, 100);
        let failures = state.take_events().into_iter()
            .filter(|e| matches!(e.data, GameEventData::TradeClosed { success: false, .. }))
            .count();
        assert_eq!(failures, 2);
    }

    #[test]
    fn test_decline_and_missing_session() {
        let mut state = trading();
        respond(&mut state, pid(2), false).unwrap();
        assert!(state.trades.is_empty());
        assert_eq!(respond(&mut state, pid(2), true), Err(TradeError::NoSession));
        assert_eq!(propose(&mut state, pid(3), gold(1), gold(1)), Err(TradeError::NoSession));
    }

    #[test]
    fn test_cancel_for_player_returns_partner() {
        let mut state = trading();
        assert_eq!(state.trades.cancel_for_player(&pid(2)), vec![pid(1)]);
        assert!(state.trades.is_empty());
    }

    #[test]
    fn test_no_trading_while_paired() {
        let mut state = trading();
        propose(&mut state, pid(2), gold(10), rocks(1)).unwrap();
        state.players.get_mut(&pid(1)).unwrap().zone_matched_with = Some(pid(3));

        assert_eq!(respond(&mut state, pid(1), true), Err(TradeError::InDuel));
        assert_eq!(propose(&mut state, pid(1), rocks(1), gold(1)), Err(TradeError::InDuel));
        assert_eq!(state.players[&pid(1)].inventory.rock, 4);
        assert_eq!(state.trades.len(), 1);
    }

    #[test]
    fn test_trading_away_last_star_eliminates() {
        let mut state = trading();
        let all_stars = TradeBundle { stars: 3, ..Default::default() };
        propose(&mut state, pid(1), all_stars, gold(50)).unwrap();
        respond(&mut state, pid(2), true).unwrap();

        let seller = &state.players[&pid(1)];
        assert_eq!(seller.stars, 0);
        assert!(!seller.alive);
        assert_eq!(seller.elimination_reason, Some(EliminationReason::NoStars));
        assert!(state.players[&pid(2)].is_active());
        assert!(state.take_events().iter().any(|e| matches!(
            e.data,
            GameEventData::PlayerEliminated { player_id, .. } if player_id == pid(1)
        )));
    }
}
