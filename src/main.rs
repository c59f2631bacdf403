//! Arena Sim - headless demo match
//!
//! Usage: `arena-sim [settings.json] [ticks]`
//!
//! Runs the configured match (AI against AI unless the settings say
//! otherwise) as fast as possible and logs the state hash periodically.
//! Set `RUST_LOG=info` to see the output.

use std::sync::Arc;

use arena_sim::audio::AudioManager;
use arena_sim::consts::SIM_TICK_RATE;
use arena_sim::settings::{MatchPreset, MatchSettings};
use arena_sim::sim::{AssetTables, GameEvent};
use arena_sim::StepOutcome;

const DEFAULT_TICKS: u64 = 6000;

fn main() {
    env_logger::init();
    log::info!("Arena Sim (headless) starting...");

    let mut args = std::env::args().skip(1);
    let mut settings = match args.next() {
        Some(path) => match MatchSettings::load(&path) {
            Ok(settings) => settings,
            Err(err) => {
                log::error!("{err}");
                std::process::exit(1);
            }
        },
        None => MatchSettings::from_preset(MatchPreset::Demo),
    };
    // Nobody is at the keyboard
    if settings.preset != MatchPreset::Demo {
        log::warn!("headless run: replacing {} inputs with AI", settings.preset.as_str());
        settings.apply_preset(MatchPreset::Demo);
    }
    let ticks = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TICKS);

    let mut audio = AudioManager::default();
    settings.configure_audio(&mut audio);

    let mut arena = match settings.build_arena(Arc::new(AssetTables::builtin())) {
        Ok(arena) => arena,
        Err(err) => {
            log::error!("{err}");
            std::process::exit(1);
        }
    };
    log::info!("Match initialized with seed: {}", settings.seed);

    let mut sounds = 0;
    let mut hits = 0;
    for _ in 0..ticks {
        match arena.step() {
            Ok(StepOutcome::Stepped { tick, hash }) => {
                if tick % SIM_TICK_RATE as u64 == 0 {
                    let snap = arena.render_snapshot();
                    log::info!(
                        "tick {tick:>6} hash {hash:#010x} {:?} hp {}/{} score {}/{} wins {}/{}",
                        snap.phase,
                        snap.players[0].health,
                        snap.players[1].health,
                        snap.players[0].score,
                        snap.players[1].score,
                        snap.players[0].wins,
                        snap.players[1].wins,
                    );
                }
            }
            Ok(StepOutcome::Waiting) => continue,
            Err(err) => {
                log::error!("{err}");
                std::process::exit(1);
            }
        }
        let events = arena.drain_events();
        sounds += audio.play_events(&events);
        hits += events
            .iter()
            .filter(|e| matches!(e, GameEvent::Hit { .. }))
            .count();
    }

    let state = arena.state();
    log::info!(
        "finished at tick {} hash {:#010x}: {} hits, {} sounds, wins {}/{}",
        state.tick,
        arena.state_hash(),
        hits,
        sounds,
        state.players[0].wins,
        state.players[1].wins,
    );
}
