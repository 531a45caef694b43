//! Authoritative Simulation Tick
//!
//! One call to [`tick`] advances a match by one fixed step. The step is
//! deterministic: same state and same applied inputs give the same result,
//! which [`replay_match`] relies on.

use tracing::info;
#[cfg(feature = "debug-tracing")]
use tracing::debug;

use crate::core::vec2::Vec2;
use crate::game::ai;
use crate::game::collision;
use crate::game::duel;
use crate::game::events::GameEvent;
use crate::game::input::{self, InputLog};
use crate::game::movement;
use crate::game::state::{EliminationReason, MatchPhase, MatchState, PlayerId};
use crate::game::zone::{self, CancelReason, ZoneEvent, ZoneEventKind};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated since the previous tick, in delivery order
    pub events: Vec<GameEvent>,
    /// Whether the match is over
    pub match_ended: bool,
}

/// Handler for one kind of zone event.
type ZoneHandler = fn(&mut MatchState, &ZoneEvent);

/// The handler table.
fn zone_handler(kind: ZoneEventKind) -> ZoneHandler {
    match kind {
        ZoneEventKind::Matched => on_zone_matched,
        ZoneEventKind::Cancelled => on_zone_cancelled,
        ZoneEventKind::TimedOut => on_zone_timed_out,
        ZoneEventKind::BothReady => on_zone_both_ready,
    }
}

fn on_zone_matched(state: &mut MatchState, event: &ZoneEvent) {
    if let ZoneEvent::Matched { zone, a, b } = *event {
        zone::begin_match(state, zone, a, b);
    }
}

fn on_zone_cancelled(state: &mut MatchState, event: &ZoneEvent) {
    if let ZoneEvent::Cancelled { zone, leaver } = *event {
        zone::cancel_pair(state, zone, |id| {
            Some(if *id == leaver { CancelReason::SelfLeft } else { CancelReason::OpponentLeft })
        });
    }
}

fn on_zone_timed_out(state: &mut MatchState, event: &ZoneEvent) {
    zone::cancel_pair(state, event.zone(), |_| Some(CancelReason::Timeout));
}

fn on_zone_both_ready(state: &mut MatchState, event: &ZoneEvent) {
    duel::settle_duel(state, event.zone());
}

/// Run one simulation tick.
///
/// Order: clock, recovery expiry, AI, movement, cooldown decay, encounters,
/// overlap push-apart, zone update and handlers, goal check, termination.
pub fn tick(state: &mut MatchState) -> TickResult {
    match state.phase {
        MatchPhase::Waiting => return TickResult::default(),
        MatchPhase::Ended => {
            return TickResult { events: state.take_events(), match_ended: true };
        }
        MatchPhase::Playing => {}
    }

    state.tick += 1;
    state.ticks_remaining = state.ticks_remaining.saturating_sub(1);

    expire_recovery(state);
    run_ai(state);
    movement::integrate(state);
    state.cooldowns.decay();
    collision::process_encounters(state);
    collision::resolve_overlaps(state);

    for event in zone::update_zones(state) {
        zone_handler(event.kind())(state, &event);
    }

    check_goal(state);
    let match_ended = check_end_conditions(state);

    #[cfg(feature = "debug-tracing")]
    debug!(tick = state.tick, hash = %hex::encode(state.compute_hash()), "Tick");

    TickResult { events: state.take_events(), match_ended }
}

fn expire_recovery(state: &mut MatchState) {
    let tick = state.tick;
    for player in state.players.values_mut() {
        if player.recovery_until.is_some() && !player.is_recovering(tick) {
            player.recovery_until = None;
        }
    }
}

/// Let every AI seat act through the regular input path.
fn run_ai(state: &mut MatchState) {
    let seats: Vec<PlayerId> = state.ai_brains.keys().copied().collect();
    for id in seats {
        let Some(mut brain) = state.ai_brains.remove(&id) else {
            continue;
        };
        let actions = ai::decide(state, id, &mut brain);
        state.ai_brains.insert(id, brain);

        for action in actions {
            // Brains can act on a view one step stale; rejects are harmless
            let _ = input::apply_action(state, id, &action);
        }
    }
}

/// Clear every free player standing in the gate who meets the thresholds.
fn check_goal(state: &mut MatchState) {
    let tick = state.tick;
    let gate = state.settings.goal_gate;
    let reach = gate.radius + state.settings.player_radius;

    let clearing: Vec<PlayerId> = state.players
        .values()
        .filter(|p| {
            p.is_free(tick)
                && p.can_goal(&state.settings)
                && p.position.distance(gate.center()) < reach
        })
        .map(|p| p.id)
        .collect();

    for id in clearing {
        zone::withdraw_player(state, &id, None, CancelReason::OpponentLeft);
        for partner in state.trades.cancel_for_player(&id) {
            state.push_event(GameEvent::trade_closed(tick, partner, false, "partner left the game"));
        }

        let Some(player) = state.players.get_mut(&id) else {
            continue;
        };
        player.cleared = true;
        player.cleared_tick = Some(tick);
        player.intent = Vec2::ZERO;
        let name = player.name.clone();

        state.push_event(GameEvent::player_cleared(tick, id));
        info!(match_id = %state.match_id, player = %id.short(), name = %name, tick, "Player cleared");
    }
}

/// End the match if the clock ran out or play can no longer continue.
fn check_end_conditions(state: &mut MatchState) -> bool {
    if state.ticks_remaining == 0 {
        end_match(state);
        return true;
    }

    let active: Vec<PlayerId> = state.players
        .values()
        .filter(|p| p.is_active())
        .map(|p| p.id)
        .collect();

    match active.as_slice() {
        [] => {
            end_match(state);
            true
        }
        [last] => {
            let can_goal = state.players.get(last).is_some_and(|p| p.can_goal(&state.settings));
            if can_goal {
                return false;
            }
            state.eliminate_player(last, EliminationReason::NoOpponents);
            end_match(state);
            true
        }
        _ => false,
    }
}

fn end_match(state: &mut MatchState) {
    state.phase = MatchPhase::Ended;
    state.standings = state.compute_standings();
    state.push_event(GameEvent::match_ended(state.tick, state.standings.clone()));

    info!(
        match_id = %state.match_id,
        tick = state.tick,
        winner = state.standings.first().map(|s| s.name.as_str()).unwrap_or("-"),
        "Match ended"
    );
}

/// Replay a match from its initial state and recorded inputs.
///
/// Records stamped `t` are applied before tick `t + 1` runs, mirroring the
/// live server. Returns the final state and every event produced.
pub fn replay_match(
    initial_state: MatchState,
    log: &InputLog,
    tick_count: u32,
) -> (MatchState, Vec<GameEvent>) {
    let mut state = initial_state;
    let mut all_events = Vec::new();

    for _ in 0..tick_count {
        let stamp = state.tick;
        for record in log.at_tick(stamp) {
            let _ = input::apply_action(&mut state, record.player_id, &record.action);
        }

        let result = tick(&mut state);
        all_events.extend(result.events);

        if result.match_ended {
            break;
        }
    }

    (state, all_events)
}
