//! Duel Judge
//!
//! [`judge`] is a pure function of two committed choices. [`settle_duel`]
//! applies a verdict to a zone's pair.

use tracing::{info, warn};

use crate::game::events::{DuelSide, EventPriority, GameEvent, GameEventData};
use crate::game::state::{DuelChoice, EliminationReason, MatchState, PlayerId, ZoneId};
use crate::game::zone;

/// Verdict for one duel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    /// Winning side
    pub side: DuelSide,
    /// Gold at stake (the lower of the two stakes)
    pub stake: u32,
}

/// Decide a duel between `first` and `second`.
pub fn judge(first: DuelChoice, second: DuelChoice) -> Verdict {
    let side = if first.hand == second.hand {
        DuelSide::Draw
    } else if first.hand.beats(second.hand) {
        DuelSide::Player1
    } else {
        DuelSide::Player2
    };
    Verdict {
        side,
        stake: first.stake.min(second.stake),
    }
}

/// Move one star and up to `stake` gold from `loser` to `winner`.
///
/// Transfers never exceed what the loser holds, so totals are conserved.
fn transfer(state: &mut MatchState, winner: PlayerId, loser: PlayerId, stake: u32) {
    let Some(l) = state.players.get_mut(&loser) else {
        return;
    };
    let stars = l.stars.min(1);
    let gold = l.gold.min(stake);
    l.stars -= stars;
    l.gold -= gold;

    if let Some(w) = state.players.get_mut(&winner) {
        w.stars = w.stars.saturating_add(stars);
        w.gold = w.gold.saturating_add(gold);
    }
}

/// Drop choices whose token is gone and let the pair commit again.
fn reopen_commit(state: &mut MatchState, zone_id: ZoneId, choices: [(PlayerId, DuelChoice); 2]) {
    for (id, played) in choices {
        if let Some(player) = state.players.get_mut(&id) {
            if !player.inventory.holds(played.hand) {
                player.duel_choice = None;
            }
        }
    }
    if let Some(pair) = state.zone_mut(zone_id).and_then(|z| z.pair.as_mut()) {
        pair.resolved = false;
    }
}

/// Settle the committed duel in `zone_id`.
///
/// Consumes both tokens, transfers stars and gold, clears the pair,
/// relocates both players, emits the public result plus private inventory
/// pushes, and eliminates anyone left without stars. A choice naming a
/// token its owner no longer holds is discarded instead, and the pair goes
/// back to committing.
pub fn settle_duel(state: &mut MatchState, zone_id: ZoneId) {
    let tick = state.tick;
    let Some(pair) = state.zone(zone_id).and_then(|z| z.pair) else {
        return;
    };
    let choice = |id: &PlayerId| state.players.get(id).and_then(|p| p.duel_choice);
    let (Some(first), Some(second)) = (choice(&pair.a), choice(&pair.b)) else {
        return;
    };

    let holds = |id: &PlayerId, played: DuelChoice| {
        state.players.get(id).is_some_and(|p| p.inventory.holds(played.hand))
    };
    if !holds(&pair.a, first) || !holds(&pair.b, second) {
        warn!(zone = %zone_id, "Committed token no longer held, duel not settled");
        reopen_commit(state, zone_id, [(pair.a, first), (pair.b, second)]);
        return;
    }

    let verdict = judge(first, second);

    for (id, played) in [(pair.a, first), (pair.b, second)] {
        if let Some(player) = state.players.get_mut(&id) {
            player.inventory.take(played.hand);
        }
    }

    let winner = match verdict.side {
        DuelSide::Player1 => {
            transfer(state, pair.a, pair.b, verdict.stake);
            Some(pair.a)
        }
        DuelSide::Player2 => {
            transfer(state, pair.b, pair.a, verdict.stake);
            Some(pair.b)
        }
        DuelSide::Draw => None,
    };

    zone::end_pair(state, zone_id);
    let geometry = state.zone(zone_id).map(|z| (z.center, z.radius));
    state.relocate_with_recovery(&pair.a, geometry);
    state.relocate_with_recovery(&pair.b, geometry);

    state.push_event(GameEvent::new(
        tick,
        EventPriority::DuelResolution,
        GameEventData::DuelResolved {
            zone_id,
            player1: pair.a,
            hand1: first.hand,
            player2: pair.b,
            hand2: second.hand,
            winner,
            side: verdict.side,
            stake: verdict.stake,
        },
    ));
    state.push_event(GameEvent::inventory_changed(tick, pair.a));
    state.push_event(GameEvent::inventory_changed(tick, pair.b));

    info!(
        match_id = %state.match_id,
        zone = %zone_id,
        player1 = %pair.a.short(),
        hand1 = first.hand.as_str(),
        player2 = %pair.b.short(),
        hand2 = second.hand.as_str(),
        result = ?verdict.side,
        stake = verdict.stake,
        "Duel resolved"
    );

    for id in [pair.a, pair.b] {
        if state.players.get(&id).is_some_and(|p| p.alive && p.stars == 0) {
            state.eliminate_player(&id, EliminationReason::NoStars);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
