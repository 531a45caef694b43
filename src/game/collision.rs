//! Collision Detection
//!
//! Pairwise encounter detection with per-pair cooldowns, and the separate
//! overlap pass that keeps bodies from stacking.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::state::{Command, MatchState, PlayerId};
use crate::game::trade;

/// Check if two circles overlap (strictly closer than the radius sum).
#[inline]
pub fn circles_overlap(pos_a: Vec2, radius_a: f64, pos_b: Vec2, radius_b: f64) -> bool {
    let combined = radius_a + radius_b;
    pos_a.distance_squared(pos_b) < combined * combined
}

/// Order-independent key for a pair of players.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey(PlayerId, PlayerId);

impl PairKey {
    /// Key for `a` and `b` in either order.
    pub fn new(a: PlayerId, b: PlayerId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    /// True if `id` is one side of the pair.
    pub fn involves(&self, id: &PlayerId) -> bool {
        self.0 == *id || self.1 == *id
    }
}

/// Remaining cooldown ticks per pair.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CollisionCooldowns {
    remaining: BTreeMap<PairKey, u32>,
}

impl CollisionCooldowns {
    /// Start (or restart) a cooldown.
    pub fn arm(&mut self, key: PairKey, ticks: u32) {
        if ticks > 0 {
            self.remaining.insert(key, ticks);
        }
    }

    /// True while the pair is cooling down.
    pub fn is_cooling(&self, key: &PairKey) -> bool {
        self.remaining.contains_key(key)
    }

    /// Advance one tick; expired entries are purged.
    pub fn decay(&mut self) {
        self.remaining.retain(|_, ticks| {
            *ticks = ticks.saturating_sub(1);
            *ticks > 0
        });
    }

    /// Number of pairs cooling down.
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    /// True when no pair is cooling down.
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Two free players touching on the field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Encounter {
    /// Lower id
    pub a: PlayerId,
    /// Higher id
    pub b: PlayerId,
}

/// Find all touching pairs of free players not under cooldown, in id order.
pub fn detect_encounters(state: &MatchState) -> Vec<Encounter> {
    let tick = state.tick;
    let r = state.settings.player_radius;
    let free: Vec<(PlayerId, Vec2)> = state.players
        .values()
        .filter(|p| p.is_free(tick))
        .map(|p| (p.id, p.position))
        .collect();

    let mut encounters = Vec::new();
    for i in 0..free.len() {
        for j in (i + 1)..free.len() {
            let (a, pos_a) = free[i];
            let (b, pos_b) = free[j];
            if !circles_overlap(pos_a, r, pos_b, r) {
                continue;
            }
            if state.cooldowns.is_cooling(&PairKey::new(a, b)) {
                continue;
            }
            encounters.push(Encounter { a, b });
        }
    }
    encounters
}

/// Act on encounters: two negotiators open a trade and arm the pair cooldown.
pub fn process_encounters(state: &mut MatchState) {
    let cooldown = state.settings.collision_cooldown_ticks();
    for encounter in detect_encounters(state) {
        let negotiating = |id: &PlayerId| {
            state.players.get(id).is_some_and(|p| p.command == Command::Negotiate)
        };
        if negotiating(&encounter.a) && negotiating(&encounter.b) {
            state.cooldowns.arm(PairKey::new(encounter.a, encounter.b), cooldown);
            trade::start_trade(state, encounter.a, encounter.b);
        }
    }
}

/// Push overlapping free players apart symmetrically to exactly `2r`.
///
/// Pairs with coincident centers are left alone. Results stay inside the
/// field; a player held by a wall leaves the whole push to the other one,
/// so separation still reaches `2r` unless both are cornered.
pub fn resolve_overlaps(state: &mut MatchState) {
    let tick = state.tick;
    let r = state.settings.player_radius;
    let (min, max) = (state.settings.min_bound(), state.settings.max_bound());
    let min_dist = r * 2.0;

    let ids: Vec<PlayerId> = state.players
        .values()
        .filter(|p| p.is_free(tick))
        .map(|p| p.id)
        .collect();

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let (Some(pa), Some(pb)) = (state.players.get(&ids[i]), state.players.get(&ids[j])) else {
                continue;
            };
            let delta = pb.position - pa.position;
            let dist_sq = delta.length_squared();
            if dist_sq >= min_dist * min_dist || dist_sq == 0.0 {
                continue;
            }
            let dist = dist_sq.sqrt();
            let push = delta * ((min_dist - dist) / 2.0 / dist);

            // Whatever a wall takes from one side is added to the other
            let target_a = pa.position - push;
            let a_pos = target_a.clamp_axes(min, max);
            let target_b = pb.position + push - (target_a - a_pos);
            let b_pos = target_b.clamp_axes(min, max);
            let a_pos = (a_pos - (target_b - b_pos)).clamp_axes(min, max);

            if let Some(a) = state.players.get_mut(&ids[i]) {
                a.position = a_pos;
            }
            if let Some(b) = state.players.get_mut(&ids[j]) {
                b.position = b_pos;
            }
        }
    }
}
