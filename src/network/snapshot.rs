//! State Snapshots
//!
//! Builds the per-recipient views pushed to clients. Other players'
//! token commands are masked and coordinates are rounded to one decimal.

use crate::game::state::{Command, MatchState, PlayerId, Standing, ZoneState};

use super::protocol::{
    PlayerView, ResultRow, ServerMessage, ShownCommand, StartedPlayer, StartedSettings,
    StateSnapshot, ZoneView,
};

/// Command as `viewer` is allowed to see it.
pub fn shown_command(command: Command, owner: &PlayerId, viewer: &PlayerId) -> ShownCommand {
    if owner != viewer && command.hand().is_some() {
        ShownCommand::Hand
    } else {
        command.into()
    }
}

fn zone_view(zone: &ZoneState) -> ZoneView {
    ZoneView {
        id: zone.id.to_string(),
        x: zone.center.x,
        y: zone.center.y,
        radius: zone.radius,
        state: zone.phase,
        player_ids: zone.occupants.iter().map(|id| id.to_string()).collect(),
    }
}

/// State snapshot for one recipient.
pub fn state_for(state: &MatchState, viewer: &PlayerId) -> StateSnapshot {
    let tick = state.tick;
    let players = state
        .players
        .values()
        .map(|p| {
            let pos = p.position.round_tenths();
            PlayerView {
                id: p.id.to_string(),
                name: p.name.clone(),
                x: pos.x,
                y: pos.y,
                command: shown_command(p.command, &p.id, viewer),
                stars: p.stars,
                gold: p.gold,
                cards_left: p.inventory.total(),
                alive: p.alive,
                cleared: p.cleared,
                battling: p.is_matched(),
                recovering: p.is_recovering(tick),
                in_zone_id: p.in_zone.map(|z| z.to_string()),
            }
        })
        .collect();

    let (your_cards, your_gold) = state
        .get_player(viewer)
        .map(|p| (p.inventory, p.gold))
        .unwrap_or_default();

    StateSnapshot {
        tick,
        time_left: state.time_left_secs(),
        card_totals: state.card_totals(),
        goal_gate: state.settings.goal_gate,
        players,
        zones: state.zones.iter().map(zone_view).collect(),
        your_cards,
        your_gold,
    }
}

/// `game_started` message (identical for every recipient).
pub fn game_started(state: &MatchState) -> ServerMessage {
    let s = &state.settings;
    ServerMessage::GameStarted {
        settings: StartedSettings {
            field_width: s.field_width,
            field_height: s.field_height,
            player_radius: s.player_radius,
            time_limit: s.time_limit_secs,
            victory_stars: s.victory_stars,
            victory_gold: s.victory_gold,
            cards_per_type: s.tokens_per_type,
            initial_gold: s.initial_gold,
            goal_gate: s.goal_gate,
            battle_zones: state.zones.iter().map(zone_view).collect(),
        },
        players: state
            .players
            .values()
            .map(|p| {
                let pos = p.position.round_tenths();
                StartedPlayer {
                    id: p.id.to_string(),
                    name: p.name.clone(),
                    x: pos.x,
                    y: pos.y,
                    stars: p.stars,
                }
            })
            .collect(),
    }
}

/// `game_over` message from final standings.
pub fn game_over(standings: &[Standing]) -> ServerMessage {
    ServerMessage::GameOver {
        results: standings
            .iter()
            .map(|s| ResultRow {
                id: s.player_id.to_string(),
                name: s.name.clone(),
                stars: s.stars,
                gold: s.gold,
                cleared: s.cleared,
                alive: s.alive,
                cards_left: s.cards_left,
                is_ai: s.is_ai,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::settings::MatchSettings;
    use crate::game::state::Inventory;

    fn started() -> (MatchState, PlayerId, PlayerId) {
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);
        let mut state = MatchState::new("snap", MatchSettings::default(), 3);
        state.add_player(a, "Ann", false);
        state.add_player(b, "Ben", false);
        state.start();
        (state, a, b)
    }

    #[test]
    fn test_hand_commands_masked_for_others() {
        let (mut state, a, b) = started();
        state.players.get_mut(&a).unwrap().command = Command::Scissors;
        state.players.get_mut(&b).unwrap().command = Command::Negotiate;

        let own = state_for(&state, &a);
        let other = state_for(&state, &b);
        let a_str = a.to_string();
        let b_str = b.to_string();

        let find = |snap: &StateSnapshot, id: &str| {
            snap.players.iter().find(|p| p.id == id).unwrap().command
        };
        assert_eq!(find(&own, &a_str), ShownCommand::Scissors);
        assert_eq!(find(&other, &a_str), ShownCommand::Hand);
        // Negotiate and none are public
        assert_eq!(find(&own, &b_str), ShownCommand::Negotiate);
    }

    #[test]
    fn test_private_fields_and_rounding() {
        let (mut state, a, _) = started();
        {
            let p = state.players.get_mut(&a).unwrap();
            p.position = Vec2::new(123.456, 78.951);
            p.gold = 77;
        }
        let snap = state_for(&state, &a);
        let me = snap.players.iter().find(|p| p.id == a.to_string()).unwrap();
        assert_eq!(me.x, 123.5);
        assert_eq!(me.y, 79.0);
        assert_eq!(snap.your_gold, 77);
        assert_eq!(snap.your_cards, Inventory::uniform(4));
        assert_eq!(snap.time_left, 300);
        assert_eq!(snap.zones.len(), 4);
        assert_eq!(snap.card_totals, Inventory::uniform(8));
    }

    #[test]
    fn test_unknown_viewer_gets_empty_private_fields() {
        let (state, _, _) = started();
        let snap = state_for(&state, &PlayerId::new([9; 16]));
        assert_eq!(snap.your_gold, 0);
        assert_eq!(snap.your_cards.total(), 0);
        assert!(snap.players.iter().all(|p| p.command == ShownCommand::None));
    }

    #[test]
    fn test_game_started_and_over() {
        let (state, _, _) = started();
        match game_started(&state) {
            ServerMessage::GameStarted { settings, players } => {
                assert_eq!(settings.cards_per_type, 4);
                assert_eq!(settings.battle_zones.len(), 4);
                assert_eq!(players.len(), 2);
                assert!(players.iter().all(|p| p.stars == 3));
            }
            other => panic!("unexpected {:?}", other),
        }

        let standings = state.compute_standings();
        match game_over(&standings) {
            ServerMessage::GameOver { results } => {
                assert_eq!(results.len(), 2);
                assert_eq!(results[0].cards_left, 12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
