//! Tick throughput.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use duel_arena::game::settings::MatchSettings;
use duel_arena::game::state::{MatchState, PlayerId};
use duel_arena::game::tick::tick;

fn ai_match(players: u8) -> MatchState {
    let mut state = MatchState::new("bench", MatchSettings::default(), 0xA11CE);
    for i in 0..players {
        state.add_player(PlayerId::new([i + 1; 16]), format!("bot-{}", i), true);
    }
    state.start();
    state
}

fn bench_tick(c: &mut Criterion) {
    for players in [4u8, 20] {
        let mut state = ai_match(players);
        // Warm up into mid-match so zones are busy
        for _ in 0..200 {
            tick(&mut state);
        }

        c.bench_function(&format!("tick_{}_ai", players), |b| {
            b.iter_batched(
                || state.clone(),
                |mut s| black_box(tick(&mut s)),
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_full_match(c: &mut Criterion) {
    c.bench_function("full_match_8_ai", |b| {
        b.iter(|| {
            let mut state = ai_match(8);
            while !tick(&mut state).match_ended {}
            black_box(state.compute_hash())
        })
    });
}

criterion_group!(benches, bench_tick, bench_full_match);
criterion_main!(benches);
