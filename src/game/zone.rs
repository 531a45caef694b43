//! Battle Zones
//!
//! Zone layout, membership tracking and the commit/timeout race.
//! [`update_zones`] only touches membership and timers and reports what
//! happened as [`ZoneEvent`]s; pair lifecycle changes are applied by the
//! handlers in `tick`.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::vec2::Vec2;
use crate::game::events::GameEvent;
use crate::game::settings::MatchSettings;
use crate::game::state::{MatchState, MatchedPair, PlayerId, ZoneId, ZoneState};

/// Why a pending duel was called off, as told to one participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The other player withdrew
    OpponentLeft,
    /// This player withdrew
    SelfLeft,
    /// Nobody committed in time
    Timeout,
    /// The other player was eliminated
    OpponentEliminated,
}

impl CancelReason {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            CancelReason::OpponentLeft => "opponent_left",
            CancelReason::SelfLeft => "self_left",
            CancelReason::Timeout => "timeout",
            CancelReason::OpponentEliminated => "opponent_eliminated",
        }
    }
}

/// Zone lifecycle event produced by [`update_zones`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneEvent {
    /// Two players now share an unpaired zone.
    Matched { zone: ZoneId, a: PlayerId, b: PlayerId },
    /// A paired player left the zone before resolution.
    Cancelled { zone: ZoneId, leaver: PlayerId },
    /// The commit window ran out.
    TimedOut { zone: ZoneId },
    /// Both players committed a choice.
    BothReady { zone: ZoneId },
}

/// Discriminant of [`ZoneEvent`], used to key the handler table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZoneEventKind {
    /// [`ZoneEvent::Matched`]
    Matched,
    /// [`ZoneEvent::Cancelled`]
    Cancelled,
    /// [`ZoneEvent::TimedOut`]
    TimedOut,
    /// [`ZoneEvent::BothReady`]
    BothReady,
}

impl ZoneEvent {
    /// Event discriminant.
    pub fn kind(&self) -> ZoneEventKind {
        match self {
            ZoneEvent::Matched { .. } => ZoneEventKind::Matched,
            ZoneEvent::Cancelled { .. } => ZoneEventKind::Cancelled,
            ZoneEvent::TimedOut { .. } => ZoneEventKind::TimedOut,
            ZoneEvent::BothReady { .. } => ZoneEventKind::BothReady,
        }
    }

    /// Zone the event belongs to.
    pub fn zone(&self) -> ZoneId {
        match self {
            ZoneEvent::Matched { zone, .. }
            | ZoneEvent::Cancelled { zone, .. }
            | ZoneEvent::TimedOut { zone }
            | ZoneEvent::BothReady { zone } => *zone,
        }
    }
}

/// Lay zones out on a centered grid (called at match start).
pub fn layout_zones(settings: &MatchSettings) -> Vec<ZoneState> {
    let n = settings.zone_count;
    if n == 0 {
        return Vec::new();
    }
    let cols = (n as f64).sqrt().ceil() as usize;
    let rows = n.div_ceil(cols);
    let cell_w = settings.field_width / (cols + 1) as f64;
    let cell_h = settings.field_height / (rows + 1) as f64;

    (0..n)
        .map(|i| {
            let col = i % cols;
            let row = i / cols;
            let center = Vec2::new(cell_w * (col + 1) as f64, cell_h * (row + 1) as f64);
            ZoneState::new(ZoneId(i as u16), center, settings.zone_radius)
        })
        .collect()
}

/// Run exit detection, entry detection and the commit race for every zone.
pub fn update_zones(state: &mut MatchState) -> Vec<ZoneEvent> {
    let mut events = Vec::new();
    for idx in 0..state.zones.len() {
        detect_exits(state, idx, &mut events);
        detect_entries(state, idx, &mut events);
        advance_commit_race(state, idx, &mut events);
        state.zones[idx].recompute_phase();
    }
    events
}

fn detect_exits(state: &mut MatchState, idx: usize, events: &mut Vec<ZoneEvent>) {
    let zone = &state.zones[idx];
    let (zone_id, center, radius) = (zone.id, zone.center, zone.radius);

    let leaving: Vec<PlayerId> = zone.occupants
        .iter()
        .filter(|id| match state.players.get(id) {
            Some(p) => !p.alive || p.cleared || p.position.distance(center) > radius,
            None => true,
        })
        .copied()
        .collect();

    for id in leaving {
        let zone = &mut state.zones[idx];
        zone.remove_occupant(&id);
        if zone.pair.is_some_and(|pair| pair.contains(&id) && !pair.resolved) {
            events.push(ZoneEvent::Cancelled { zone: zone_id, leaver: id });
        }
        if let Some(player) = state.players.get_mut(&id) {
            if player.in_zone == Some(zone_id) {
                player.in_zone = None;
            }
        }
    }
}

fn detect_entries(state: &mut MatchState, idx: usize, events: &mut Vec<ZoneEvent>) {
    let tick = state.tick;
    let zone = &state.zones[idx];
    if zone.occupants.len() >= ZoneState::CAPACITY {
        return;
    }
    let (zone_id, center, radius) = (zone.id, zone.center, zone.radius);

    let candidates: Vec<PlayerId> = state.players
        .values()
        .filter(|p| {
            p.is_active()
                && p.in_zone.is_none()
                && !p.is_matched()
                && !p.is_recovering(tick)
                && p.position.distance(center) <= radius
        })
        .map(|p| p.id)
        .collect();

    let mut admitted = false;
    for id in candidates {
        if state.zones[idx].occupants.len() >= ZoneState::CAPACITY {
            break;
        }
        state.zones[idx].occupants.push(id);
        if let Some(player) = state.players.get_mut(&id) {
            player.in_zone = Some(zone_id);
        }
        admitted = true;
    }

    let zone = &state.zones[idx];
    if admitted && zone.occupants.len() == ZoneState::CAPACITY && zone.pair.is_none() {
        events.push(ZoneEvent::Matched {
            zone: zone_id,
            a: zone.occupants[0],
            b: zone.occupants[1],
        });
    }
}

fn advance_commit_race(state: &mut MatchState, idx: usize, events: &mut Vec<ZoneEvent>) {
    let Some(pair) = state.zones[idx].pair else {
        return;
    };
    let zone_id = state.zones[idx].id;

    // A choice whose token is gone must be made again
    for id in [pair.a, pair.b] {
        if let Some(player) = state.players.get_mut(&id) {
            if player.duel_choice.is_some_and(|c| !player.inventory.holds(c.hand)) {
                player.duel_choice = None;
            }
        }
    }

    let committed = |id: &PlayerId| {
        state.players.get(id).is_some_and(|p| p.duel_choice.is_some())
    };
    let both_ready = committed(&pair.a) && committed(&pair.b);

    let Some(pair) = state.zones[idx].pair.as_mut() else {
        return;
    };
    pair.countdown_ticks = pair.countdown_ticks.saturating_sub(1);

    if !pair.resolved {
        // Commit is checked before timeout
        if both_ready {
            pair.resolved = true;
            events.push(ZoneEvent::BothReady { zone: zone_id });
        } else if pair.countdown_ticks == 0 {
            events.push(ZoneEvent::TimedOut { zone: zone_id });
        }
    } else if pair.countdown_ticks == 0 {
        events.push(ZoneEvent::TimedOut { zone: zone_id });
    }
}

/// Form a pair in `zone_id`: freeze both players and start the countdown.
/// Open trades of either player are closed.
///
/// Does nothing if the zone is already paired or either player is no
/// longer a live occupant.
pub fn begin_match(state: &mut MatchState, zone_id: ZoneId, a: PlayerId, b: PlayerId) {
    let tick = state.tick;
    let countdown_ticks = state.settings.zone_timeout_ticks();

    let Some(zone) = state.zone(zone_id) else {
        return;
    };
    if zone.pair.is_some() || !zone.contains(&a) || !zone.contains(&b) {
        return;
    }
    let live = |id: &PlayerId| state.players.get(id).is_some_and(|p| p.is_active());
    if !live(&a) || !live(&b) {
        return;
    }

    for (me, opponent) in [(a, b), (b, a)] {
        if let Some(player) = state.players.get_mut(&me) {
            player.intent = Vec2::ZERO;
            player.zone_matched_with = Some(opponent);
            player.duel_choice = None;
        }
    }

    if let Some(zone) = state.zone_mut(zone_id) {
        zone.pair = Some(MatchedPair { a, b, countdown_ticks, resolved: false });
        zone.recompute_phase();
    }

    for id in [a, b] {
        for partner in state.trades.cancel_for_player(&id) {
            for notified in [id, partner] {
                state.push_event(GameEvent::trade_closed(tick, notified, false, "trade closed: duel started"));
            }
        }
    }

    state.push_event(GameEvent::zone_matched(tick, zone_id, a, b));
    state.push_event(GameEvent::zone_matched(tick, zone_id, b, a));
    debug!(zone = %zone_id, a = %a.short(), b = %b.short(), "Zone matched");
}

/// Remove the pair from `zone_id` and clear both players' duel state.
///
/// Occupancy is untouched; relocated players drop out on the next exit pass.
pub fn end_pair(state: &mut MatchState, zone_id: ZoneId) -> Option<MatchedPair> {
    let pair = state.zone_mut(zone_id)?.pair.take()?;
    for id in [pair.a, pair.b] {
        if let Some(player) = state.players.get_mut(&id) {
            player.zone_matched_with = None;
            player.duel_choice = None;
        }
    }
    if let Some(zone) = state.zone_mut(zone_id) {
        zone.recompute_phase();
    }
    Some(pair)
}

/// Call off the pending duel in `zone_id`.
///
/// Relocates both (living) participants and tells each one whatever
/// `reason_for` returns for them. Returns false, with no effect, when the
/// zone has no pair.
pub fn cancel_pair<F>(state: &mut MatchState, zone_id: ZoneId, reason_for: F) -> bool
where
    F: Fn(&PlayerId) -> Option<CancelReason>,
{
    let tick = state.tick;
    let Some(pair) = end_pair(state, zone_id) else {
        return false;
    };
    let geometry = state.zone(zone_id).map(|z| (z.center, z.radius));

    for id in [pair.a, pair.b] {
        if state.players.get(&id).is_some_and(|p| p.alive) {
            state.relocate_with_recovery(&id, geometry);
        }
        if let Some(reason) = reason_for(&id) {
            debug!(zone = %zone_id, player = %id.short(), reason = reason.as_str(), "Zone cancelled");
            state.push_event(GameEvent::zone_cancelled(tick, zone_id, id, reason));
        }
    }
    true
}

/// Take `id` out of whatever zone it occupies, cancelling its pair first.
///
/// `self_reason` is what the withdrawing player is told (if anything),
/// `other_reason` what the opponent is told.
pub fn withdraw_player(
    state: &mut MatchState,
    id: &PlayerId,
    self_reason: Option<CancelReason>,
    other_reason: CancelReason,
) {
    let Some(zone_id) = state.players.get(id).and_then(|p| p.in_zone) else {
        return;
    };

    let paired = state.zone(zone_id)
        .and_then(|z| z.pair)
        .is_some_and(|pair| pair.contains(id));
    if paired {
        cancel_pair(state, zone_id, |pid| {
            if pid == id { self_reason } else { Some(other_reason) }
        });
    }

    if let Some(zone) = state.zone_mut(zone_id) {
        zone.remove_occupant(id);
        zone.recompute_phase();
    }
    if let Some(player) = state.players.get_mut(id) {
        player.in_zone = None;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::GameEventData;
    use crate::game::state::{DuelChoice, Hand, ZonePhase};
    use proptest::prelude::*;

    fn pid(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    fn setup(n: u8) -> MatchState {
        let mut state = MatchState::new("zone-test", MatchSettings::default(), 7);
        for i in 1..=n {
            state.add_player(pid(i), format!("p{}", i), false);
        }
        state.start();
        state
    }

    fn put_in_zone(state: &mut MatchState, id: PlayerId, zone: usize) {
        let center = state.zones[zone].center;
        state.players.get_mut(&id).unwrap().position = center;
    }

    /// Players 1 and 2 paired in zone 0.
    fn paired() -> MatchState {
        let mut state = setup(2);
        put_in_zone(&mut state, pid(1), 0);
        put_in_zone(&mut state, pid(2), 0);
        update_zones(&mut state);
        begin_match(&mut state, ZoneId(0), pid(1), pid(2));
        state.take_events();
        state
    }

    #[test]
    fn test_layout_grid() {
        let zones = layout_zones(&MatchSettings::default());
        let centers: Vec<(f64, f64)> = zones.iter().map(|z| (z.center.x, z.center.y)).collect();
        let third = 800.0 / 3.0;
        assert_eq!(centers, vec![
            (third, third),
            (third * 2.0, third),
            (third, third * 2.0),
            (third * 2.0, third * 2.0),
        ]);
        assert_eq!(zones[3].id.to_string(), "zone-3");
    }

    #[test]
    fn test_layout_odd_count() {
        let settings = MatchSettings { zone_count: 3, ..Default::default() };
        let zones = layout_zones(&settings);
        // 2 cols x 2 rows, last row half filled
        assert_eq!(zones.len(), 3);
        assert_eq!(zones[2].center.y, 800.0 / 3.0 * 2.0);
    }

    #[test]
    fn test_single_entry_waits() {
        let mut state = setup(3);
        put_in_zone(&mut state, pid(1), 0);

        let events = update_zones(&mut state);
        assert!(events.is_empty());
        assert_eq!(state.zones[0].phase, ZonePhase::Waiting);
        assert_eq!(state.players[&pid(1)].in_zone, Some(ZoneId(0)));
    }

    #[test]
    fn test_third_player_not_admitted() {
        let mut state = setup(3);
        for i in 1..=3 {
            put_in_zone(&mut state, pid(i), 0);
        }

        let events = update_zones(&mut state);
        assert_eq!(events, vec![ZoneEvent::Matched { zone: ZoneId(0), a: pid(1), b: pid(2) }]);
        assert_eq!(state.zones[0].occupants.len(), 2);
        assert_eq!(state.players[&pid(3)].in_zone, None);
    }

    #[test]
    fn test_begin_match_freezes_and_notifies() {
        let mut state = setup(2);
        put_in_zone(&mut state, pid(1), 0);
        put_in_zone(&mut state, pid(2), 0);
        update_zones(&mut state);

        begin_match(&mut state, ZoneId(0), pid(1), pid(2));
        assert_eq!(state.zones[0].phase, ZonePhase::Matched);
        assert_eq!(state.players[&pid(1)].zone_matched_with, Some(pid(2)));
        assert_eq!(state.zones[0].pair.unwrap().countdown_ticks, 300);

        let notices = state.take_events().into_iter()
            .filter(|e| matches!(e.data, GameEventData::ZoneMatched { .. }))
            .count();
        assert_eq!(notices, 2);

        // Second call is a no-op
        begin_match(&mut state, ZoneId(0), pid(1), pid(2));
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_commit_precedes_timeout() {
        let mut state = setup(2);
        put_in_zone(&mut state, pid(1), 0);
        put_in_zone(&mut state, pid(2), 0);
        update_zones(&mut state);
        begin_match(&mut state, ZoneId(0), pid(1), pid(2));

        // Both submit on the last possible tick
        state.zones[0].pair.as_mut().unwrap().countdown_ticks = 1;
        for id in [pid(1), pid(2)] {
            state.players.get_mut(&id).unwrap().duel_choice =
                Some(DuelChoice { hand: Hand::Rock, stake: 0 });
        }

        let events = update_zones(&mut state);
        assert_eq!(events, vec![ZoneEvent::BothReady { zone: ZoneId(0) }]);
        assert!(state.zones[0].pair.unwrap().resolved);
    }

    #[test]
    fn test_cancel_pair_is_idempotent() {
        let mut state = setup(2);
        put_in_zone(&mut state, pid(1), 0);
        put_in_zone(&mut state, pid(2), 0);
        update_zones(&mut state);
        begin_match(&mut state, ZoneId(0), pid(1), pid(2));
        state.take_events();

        assert!(cancel_pair(&mut state, ZoneId(0), |_| Some(CancelReason::Timeout)));
        let after_first = state.compute_hash();
        let notices = state.take_events().len();
        assert_eq!(notices, 2);

        assert!(!cancel_pair(&mut state, ZoneId(0), |_| Some(CancelReason::Timeout)));
        assert_eq!(state.compute_hash(), after_first);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_withdraw_notifies_opponent_only() {
        let mut state = setup(2);
        put_in_zone(&mut state, pid(1), 0);
        put_in_zone(&mut state, pid(2), 0);
        update_zones(&mut state);
        begin_match(&mut state, ZoneId(0), pid(1), pid(2));
        state.take_events();

        withdraw_player(&mut state, &pid(1), None, CancelReason::OpponentEliminated);

        let events = state.take_events();
        assert_eq!(events.len(), 1);
        match &events[0].data {
            GameEventData::ZoneCancelled { player_id, reason, .. } => {
                assert_eq!(*player_id, pid(2));
                assert_eq!(*reason, CancelReason::OpponentEliminated);
            }
            other => panic!("unexpected event {:?}", other),
        }
        // Leaver removed synchronously, opponent stays until next exit pass
        assert_eq!(state.zones[0].occupants, vec![pid(2)]);
        assert_eq!(state.players[&pid(1)].in_zone, None);
        assert!(state.players[&pid(2)].is_recovering(state.tick));
    }

    #[test]
    fn test_paired_occupant_walking_out_cancels() {
        let mut state = paired();
        state.players.get_mut(&pid(1)).unwrap().position = Vec2::new(20.0, 20.0);

        let events = update_zones(&mut state);
        assert_eq!(events, vec![ZoneEvent::Cancelled { zone: ZoneId(0), leaver: pid(1) }]);
        assert_eq!(state.zones[0].occupants, vec![pid(2)]);
        assert_eq!(state.players[&pid(1)].in_zone, None);
        // The pair itself is left for the handler
        assert!(state.zones[0].pair.is_some());
    }

    #[test]
    fn test_dead_paired_occupant_cancels() {
        let mut state = paired();
        state.players.get_mut(&pid(2)).unwrap().alive = false;

        let events = update_zones(&mut state);
        assert_eq!(events, vec![ZoneEvent::Cancelled { zone: ZoneId(0), leaver: pid(2) }]);
        assert_eq!(state.zones[0].occupants, vec![pid(1)]);
    }

    #[test]
    fn test_resolved_pair_times_out_for_cleanup() {
        let mut state = paired();
        {
            let pair = state.zones[0].pair.as_mut().unwrap();
            pair.resolved = true;
            pair.countdown_ticks = 1;
        }

        let events = update_zones(&mut state);
        assert_eq!(events, vec![ZoneEvent::TimedOut { zone: ZoneId(0) }]);
    }

    #[test]
    fn test_stale_choice_is_dropped() {
        let mut state = paired();
        for id in [pid(1), pid(2)] {
            state.players.get_mut(&id).unwrap().duel_choice =
                Some(DuelChoice { hand: Hand::Paper, stake: 0 });
        }
        state.players.get_mut(&pid(2)).unwrap().inventory.paper = 0;

        let events = update_zones(&mut state);
        assert!(events.is_empty());
        assert!(state.players[&pid(2)].duel_choice.is_none());
        assert!(!state.zones[0].pair.unwrap().resolved);
    }

    #[test]
    fn test_begin_match_closes_open_trades() {
        let mut state = setup(3);
        crate::game::trade::start_trade(&mut state, pid(1), pid(3));
        put_in_zone(&mut state, pid(1), 0);
        put_in_zone(&mut state, pid(2), 0);
        update_zones(&mut state);
        state.take_events();

        begin_match(&mut state, ZoneId(0), pid(1), pid(2));
        assert!(state.trades.is_empty());
        let closed: Vec<PlayerId> = state.take_events().into_iter()
            .filter_map(|e| match e.data {
                GameEventData::TradeClosed { player_id, success: false, .. } => Some(player_id),
                _ => None,
            })
            .collect();
        assert_eq!(closed, vec![pid(1), pid(3)]);
    }

    proptest! {
        #[test]
        fn prop_zone_never_exceeds_two(
            offsets in prop::collection::vec((-90.0f64..90.0, -90.0f64..90.0), 2..8),
            rounds in 1usize..4,
        ) {
            let mut state = setup(offsets.len() as u8);
            let center = state.zones[0].center;
            for (i, (dx, dy)) in offsets.iter().enumerate() {
                let id = pid(i as u8 + 1);
                state.players.get_mut(&id).unwrap().position = center + Vec2::new(*dx, *dy);
            }

            for _ in 0..rounds {
                update_zones(&mut state);
                for zone in &state.zones {
                    prop_assert!(zone.occupants.len() <= ZoneState::CAPACITY);
                    for id in &zone.occupants {
                        prop_assert_eq!(state.players[id].in_zone, Some(zone.id));
                    }
                }
            }
        }
    }
}
