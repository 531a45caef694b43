//! AI Players
//!
//! Each AI seat owns an [`AiBrain`]: a randomly drawn personality, a few
//! bits of steering memory and a private RNG. [`decide`] reads the world and
//! the brain and returns the actions the seat takes this tick; the driver
//! feeds them through the same validation path as human input.

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::input::PlayerAction;
use crate::game::state::{Command, Hand, MatchState, Player, PlayerId, ZoneId};

/// Display names handed to AI seats in order.
pub const AI_NAMES: [&str; 15] = [
    "Kaiji Bot", "Tonegawa Bot", "Hyodo Bot", "Otsuki Bot", "Sahara Bot",
    "Ando Bot", "Ishida Bot", "Kitami Bot", "Maeda Bot", "Funai Bot",
    "Sakazaki Bot", "Miyoshi Bot", "Muraoka Bot", "Watanabe Bot", "Miyamoto Bot",
];

/// Distance from a field edge at which wandering bends back inward.
const EDGE_MARGIN: f64 = 100.0;

/// Personality traits, each in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiPersonality {
    /// Appetite for duels and high stakes
    pub aggression: f64,
    /// Reluctance to risk the last star
    pub caution: f64,
    /// Chance of playing the most-held hand
    pub smartness: f64,
}

impl AiPersonality {
    /// Draw a personality.
    pub fn roll(rng: &mut DeterministicRng) -> Self {
        Self {
            aggression: 0.3 + rng.next_f64() * 0.5,
            caution: 0.2 + rng.next_f64() * 0.5,
            smartness: 0.3 + rng.next_f64() * 0.6,
        }
    }
}

/// Per-seat AI memory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AiBrain {
    /// Traits
    pub personality: AiPersonality,
    /// Private RNG
    pub rng: DeterministicRng,
    /// Seconds between re-plans
    pub think_interval: f64,
    /// Seconds until the next re-plan
    pub think_timer: f64,
    /// Current wander heading (radians)
    pub wander_angle: f64,
    /// Zone being walked to
    pub target_zone: Option<ZoneId>,
    /// Already acted in the current pending duel
    pub decided: bool,
}

impl AiBrain {
    /// New brain drawing everything from `rng`, which it then keeps.
    pub fn new(mut rng: DeterministicRng) -> Self {
        let personality = AiPersonality::roll(&mut rng);
        let think_interval = rng.next_f64_range(0.5, 1.5);
        let wander_angle = rng.next_f64() * std::f64::consts::TAU;
        Self {
            personality,
            rng,
            think_interval,
            think_timer: 0.0,
            wander_angle,
            target_zone: None,
            decided: false,
        }
    }
}

/// Actions for AI seat `id` this tick.
pub fn decide(state: &MatchState, id: PlayerId, brain: &mut AiBrain) -> Vec<PlayerAction> {
    let Some(me) = state.players.get(&id) else {
        return Vec::new();
    };
    if !me.is_active() {
        return Vec::new();
    }

    if me.is_matched() {
        return decide_in_duel(me, brain);
    }
    brain.decided = false;

    let mut actions = Vec::new();
    brain.think_timer -= state.settings.dt();
    if brain.think_timer <= 0.0 {
        brain.think_timer = brain.think_interval;
        plan(state, me, brain);
        if me.command != Command::None {
            actions.push(PlayerAction::SelectCommand(Command::None));
        }
    }

    let steer = steer(state, me, brain);
    actions.push(PlayerAction::Move { dx: steer.x, dy: steer.y });
    actions
}

fn decide_in_duel(me: &Player, brain: &mut AiBrain) -> Vec<PlayerAction> {
    if brain.decided {
        return Vec::new();
    }
    brain.decided = true;

    if !should_fight(me, brain) {
        return vec![PlayerAction::LeaveZone];
    }
    match choose_hand(me, brain) {
        Some(hand) => vec![PlayerAction::DuelChoice { hand, bet: choose_bet(me, &brain.personality) as i64 }],
        None => vec![PlayerAction::LeaveZone],
    }
}

/// Whether to accept the pending duel.
pub fn should_fight(me: &Player, brain: &mut AiBrain) -> bool {
    if me.inventory.is_empty() {
        return false;
    }
    let p = brain.personality;
    if me.stars <= 1 && brain.rng.chance(p.caution) {
        return false;
    }
    if brain.rng.chance(p.aggression) {
        return true;
    }
    brain.rng.chance(0.5)
}

/// Pick a held hand: the most-held one when playing smart, otherwise a
/// draw weighted by counts.
pub fn choose_hand(me: &Player, brain: &mut AiBrain) -> Option<Hand> {
    let inventory = me.inventory;
    if inventory.is_empty() {
        return None;
    }
    if brain.rng.chance(brain.personality.smartness) {
        return inventory.most_held();
    }
    let mut pick = brain.rng.next_int(inventory.total());
    for hand in Hand::ALL {
        let n = inventory.count(hand);
        if pick < n {
            return Some(hand);
        }
        pick -= n;
    }
    inventory.most_held()
}

/// Stake: a personality-scaled share of gold, at least 10 when affordable,
/// rounded down to a multiple of 10 and capped at current gold.
pub fn choose_bet(me: &Player, personality: &AiPersonality) -> u32 {
    let gold = me.gold;
    if gold == 0 {
        return 0;
    }
    let ratio = (0.1 + personality.aggression * 0.3 - personality.caution * 0.2).max(0.05);
    let share = (gold as f64 * ratio).floor() as u32;
    let bet = share.max(gold.min(10));
    ((bet / 10) * 10).min(gold)
}

fn plan(state: &MatchState, me: &Player, brain: &mut AiBrain) {
    if me.inventory.is_empty() {
        brain.target_zone = None;
        return;
    }
    brain.target_zone = choose_target_zone(state, me, brain);
}

/// Score open zones and pick randomly among the best three.
pub fn choose_target_zone(state: &MatchState, me: &Player, brain: &mut AiBrain) -> Option<ZoneId> {
    let p = brain.personality;
    let mut candidates: Vec<(ZoneId, f64)> = Vec::new();

    for zone in &state.zones {
        if zone.pair.is_some() || zone.occupants.len() >= 2 {
            continue;
        }
        let dist = me.position.distance(zone.center);
        let score = match zone.occupants.first() {
            None => 100.0 - dist * 0.1,
            Some(waiting) if *waiting != me.id && state.players.contains_key(waiting) => {
                let mut score = 200.0 + p.aggression * 100.0 - dist * 0.1;
                if me.stars <= 1 && brain.rng.chance(p.caution) {
                    score -= 200.0;
                }
                score
            }
            Some(_) => 0.0,
        };
        if score > 0.0 {
            candidates.push((zone.id, score));
        }
    }

    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    candidates.truncate(3);
    brain.rng.choose(&candidates).map(|(id, _)| *id)
}

/// Unit steering vector (or zero when parked in the target zone).
fn steer(state: &MatchState, me: &Player, brain: &mut AiBrain) -> Vec2 {
    let settings = &state.settings;

    if me.can_goal(settings) {
        return (settings.goal_gate.center() - me.position).normalize();
    }

    if let Some(target) = brain.target_zone {
        match state.zone(target) {
            Some(zone) if zone.occupants.len() < 2 && zone.pair.is_none() => {
                let to_zone = zone.center - me.position;
                if to_zone.length() < zone.radius * 0.5 {
                    return Vec2::ZERO;
                }
                return to_zone.normalize();
            }
            _ => brain.target_zone = None,
        }
    }

    brain.wander_angle += (brain.rng.next_f64() - 0.5) * 0.5;
    let mut dir = Vec2::from_angle(brain.wander_angle);
    if me.position.x < EDGE_MARGIN {
        dir.x += 0.5;
    }
    if me.position.x > settings.field_width - EDGE_MARGIN {
        dir.x -= 0.5;
    }
    if me.position.y < EDGE_MARGIN {
        dir.y += 0.5;
    }
    if me.position.y > settings.field_height - EDGE_MARGIN {
        dir.y -= 0.5;
    }
    dir.normalize()
}

// =============================================================================
// TESTS
// =============================================================================
