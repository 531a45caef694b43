//! Match Settings
//!
//! Tunables fixed for the lifetime of one match. Rooms may override a subset
//! at creation time through [`SettingsOverride`].

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;

/// Fixed circular goal gate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoalGate {
    /// Center X
    pub x: f64,
    /// Center Y
    pub y: f64,
    /// Gate radius
    pub radius: f64,
}

impl GoalGate {
    /// Default gate: top-center of the field.
    pub fn for_field(field_width: f64) -> Self {
        Self {
            x: field_width / 2.0,
            y: 50.0,
            radius: 40.0,
        }
    }

    /// Gate center.
    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Where duel participants are sent after a duel ends or is cancelled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocationPolicy {
    /// Back to the player's own spawn point.
    #[default]
    SpawnPoint,
    /// Pushed radially out of the zone.
    EjectFromZone,
}

/// Settings for one match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchSettings {
    /// Simulation rate (ticks per second)
    pub tick_rate: u32,
    /// Field width
    pub field_width: f64,
    /// Field height
    pub field_height: f64,
    /// Player collision radius
    pub player_radius: f64,
    /// Player speed (units per second at full intent)
    pub player_speed: f64,
    /// Tokens of each hand dealt at start
    pub tokens_per_type: u32,
    /// Stars at start
    pub initial_stars: u32,
    /// Stars needed to clear
    pub victory_stars: u32,
    /// Gold at start
    pub initial_gold: u32,
    /// Gold needed to clear
    pub victory_gold: u32,
    /// Number of battle zones
    pub zone_count: usize,
    /// Battle zone radius
    pub zone_radius: f64,
    /// Seconds a matched pair has to commit
    pub zone_timeout_secs: f64,
    /// Match length in seconds
    pub time_limit_secs: f64,
    /// Seconds before the same pair can trigger another encounter
    pub collision_cooldown_secs: f64,
    /// Ticks of post-duel recovery
    pub recovery_ticks: u32,
    /// Post-duel reset position
    pub relocation: RelocationPolicy,
    /// Goal gate
    pub goal_gate: GoalGate,
}

impl Default for MatchSettings {
    fn default() -> Self {
        let field_width = 800.0;
        Self {
            tick_rate: 20,
            field_width,
            field_height: 800.0,
            player_radius: 20.0,
            player_speed: 150.0,
            tokens_per_type: 4,
            initial_stars: 3,
            victory_stars: 3,
            initial_gold: 100,
            victory_gold: 50,
            zone_count: 4,
            zone_radius: 60.0,
            zone_timeout_secs: 15.0,
            time_limit_secs: 300.0,
            collision_cooldown_secs: 1.0,
            recovery_ticks: 40,
            relocation: RelocationPolicy::default(),
            goal_gate: GoalGate::for_field(field_width),
        }
    }
}

impl MatchSettings {
    /// Seconds per tick.
    #[inline]
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate.max(1) as f64
    }

    /// Convert a duration in seconds to a whole number of ticks (rounded up).
    #[inline]
    pub fn secs_to_ticks(&self, secs: f64) -> u32 {
        (secs.max(0.0) * self.tick_rate as f64).ceil() as u32
    }

    /// Match length in ticks.
    pub fn time_limit_ticks(&self) -> u32 {
        self.secs_to_ticks(self.time_limit_secs)
    }

    /// Zone commit window in ticks.
    pub fn zone_timeout_ticks(&self) -> u32 {
        self.secs_to_ticks(self.zone_timeout_secs)
    }

    /// Pair cooldown in ticks.
    pub fn collision_cooldown_ticks(&self) -> u32 {
        self.secs_to_ticks(self.collision_cooldown_secs)
    }

    /// Lowest legal position on each axis.
    #[inline]
    pub fn min_bound(&self) -> Vec2 {
        Vec2::new(self.player_radius, self.player_radius)
    }

    /// Highest legal position on each axis.
    #[inline]
    pub fn max_bound(&self) -> Vec2 {
        Vec2::new(
            self.field_width - self.player_radius,
            self.field_height - self.player_radius,
        )
    }

    /// Field center.
    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.field_width / 2.0, self.field_height / 2.0)
    }

    /// Apply room overrides on top of these settings.
    pub fn with_overrides(mut self, overrides: &SettingsOverride) -> Self {
        if let Some(v) = overrides.tokens_per_type {
            self.tokens_per_type = v.clamp(1, 20);
        }
        if let Some(v) = overrides.initial_stars {
            self.initial_stars = v.clamp(1, 20);
        }
        if let Some(v) = overrides.victory_stars {
            self.victory_stars = v.clamp(1, 20);
        }
        if let Some(v) = overrides.initial_gold {
            self.initial_gold = v.min(100_000);
        }
        if let Some(v) = overrides.victory_gold {
            self.victory_gold = v.min(100_000);
        }
        if let Some(v) = overrides.time_limit {
            self.time_limit_secs = v.clamp(30.0, 3600.0);
        }
        if let Some(v) = overrides.battle_zone_count {
            self.zone_count = v.clamp(1, 16);
        }
        if let Some(v) = overrides.zone_timeout {
            self.zone_timeout_secs = v.clamp(1.0, 120.0);
        }
        if let Some(v) = overrides.relocation {
            self.relocation = v;
        }
        self
    }
}

/// Per-room settings overrides as sent by `create_room`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsOverride {
    /// Tokens per hand
    #[serde(alias = "cardsPerType")]
    pub tokens_per_type: Option<u32>,
    /// Initial stars
    pub initial_stars: Option<u32>,
    /// Stars needed to clear
    pub victory_stars: Option<u32>,
    /// Initial gold
    pub initial_gold: Option<u32>,
    /// Gold needed to clear
    pub victory_gold: Option<u32>,
    /// Match length in seconds
    pub time_limit: Option<f64>,
    /// Number of battle zones
    pub battle_zone_count: Option<usize>,
    /// Commit window in seconds
    pub zone_timeout: Option<f64>,
    /// Post-duel reset policy
    pub relocation: Option<RelocationPolicy>,
}

// =============================================================================
// TESTS
// =============================================================================
