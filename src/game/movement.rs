//! Movement Integration
//!
//! The only writer of positions apart from relocation and the overlap pass.

use crate::game::state::MatchState;

/// Advance every free player by `intent * speed * dt` and clamp to the field.
///
/// Intents are used as stored; normalization happens at the input boundary.
pub fn integrate(state: &mut MatchState) {
    let tick = state.tick;
    let step = state.settings.player_speed * state.settings.dt();
    let (min, max) = (state.settings.min_bound(), state.settings.max_bound());

    for player in state.players.values_mut() {
        if !player.is_free(tick) {
            continue;
        }
        player.position = (player.position + player.intent * step).clamp_axes(min, max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::settings::MatchSettings;
    use crate::game::state::PlayerId;
    use proptest::prelude::*;

    fn single(pos: Vec2, intent: Vec2) -> (MatchState, PlayerId) {
        let id = PlayerId::new([1; 16]);
        let mut state = MatchState::new("move-test", MatchSettings::default(), 1);
        state.add_player(id, "mover", false);
        state.add_player(PlayerId::new([2; 16]), "idle", false);
        state.start();
        let p = state.players.get_mut(&id).unwrap();
        p.position = pos;
        p.intent = intent;
        (state, id)
    }

    #[test]
    fn test_full_intent_moves_speed_times_dt() {
        let (mut state, id) = single(Vec2::new(400.0, 400.0), Vec2::new(1.0, 0.0));
        integrate(&mut state);
        assert_eq!(state.players[&id].position, Vec2::new(407.5, 400.0));
    }

    #[test]
    fn test_recovering_player_stays_put() {
        let (mut state, id) = single(Vec2::new(400.0, 400.0), Vec2::new(1.0, 0.0));
        state.players.get_mut(&id).unwrap().recovery_until = Some(state.tick + 40);
        integrate(&mut state);
        assert_eq!(state.players[&id].position, Vec2::new(400.0, 400.0));
    }

    #[test]
    fn test_clamped_at_edge() {
        let (mut state, id) = single(Vec2::new(21.0, 779.0), Vec2::new(-1.0, 1.0).normalize());
        integrate(&mut state);
        assert_eq!(state.players[&id].position, Vec2::new(20.0, 780.0));
    }

    proptest! {
        #[test]
        fn prop_positions_stay_in_bounds(
            x in 20.0f64..=780.0,
            y in 20.0f64..=780.0,
            dx in -1000.0f64..1000.0,
            dy in -1000.0f64..1000.0,
        ) {
            // Un-normalized intents still cannot escape the field
            let (mut state, id) = single(Vec2::new(x, y), Vec2::new(dx, dy));
            integrate(&mut state);
            let p = state.players[&id].position;
            prop_assert!((20.0..=780.0).contains(&p.x));
            prop_assert!((20.0..=780.0).contains(&p.y));
        }
    }
}
