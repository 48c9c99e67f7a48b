use invaders_engine::bridge::protocol::{HEADER_DRAW_COUNT, HEADER_EVENT_COUNT, HEADER_RUNNING};
use invaders_engine::{InputEvent, ManualClock};
use invaders_web::GameRunner;
use space_invaders::rules::{events, KEY_FIRE, KEY_PAUSE};
use space_invaders::{InvaderRules, Phase, SpaceInvaders};

const FRAME: f64 = 1000.0 / 60.0;

fn runner(rules: InvaderRules) -> GameRunner<SpaceInvaders> {
    let mut runner =
        GameRunner::new(SpaceInvaders::with_rules(rules), Box::new(ManualClock::new(0.0))).unwrap();
    runner.init().unwrap();
    assert!(runner.start().unwrap());
    runner
}

#[test]
fn first_frame_publishes_board_and_hud_events() {
    let mut runner = runner(InvaderRules {
        enemy_fire_chance: 0.0,
        ..InvaderRules::default()
    });
    assert!(runner.frame(FRAME));

    let buffer = runner.buffer_snapshot();
    let layout = runner.layout();
    assert_eq!(buffer[HEADER_RUNNING], 1.0);
    assert_eq!(buffer[HEADER_DRAW_COUNT], 56.0);
    // Score, lives and level from init ride along with the first frame.
    assert_eq!(buffer[HEADER_EVENT_COUNT], 3.0);
    let kinds: Vec<f32> = (0..3)
        .map(|i| buffer[layout.event_data_offset + i * 4])
        .collect();
    assert_eq!(kinds, vec![events::SCORE, events::LIVES, events::LEVEL]);
}

#[test]
fn a_minute_of_play_keeps_the_loop_healthy() {
    let mut runner = runner(InvaderRules::default());
    runner.push_input(InputEvent::KeyDown { key_code: KEY_FIRE });

    let mut now = 0.0;
    for _ in 0..3600 {
        now += FRAME;
        if !runner.frame(now) {
            break;
        }
    }

    let stats = runner.stats();
    assert!(stats.running, "loop stopped: {:?}", stats.last_error);
    assert_eq!(stats.consecutive_errors, 0);
    assert!(stats.ticks >= 3590);
    runner.inspect(|game, ctx| {
        assert!(game.score() > 0, "holding fire for a minute should hit something");
        assert!(ctx.entities.len() <= 1 + 55 + 1 + game.rules().max_enemy_shots);
    });
}

#[test]
fn pause_is_a_game_state_not_a_loop_state() {
    let mut runner = runner(InvaderRules {
        enemy_fire_chance: 0.0,
        ..InvaderRules::default()
    });
    runner.frame(FRAME);
    runner.push_input(InputEvent::KeyDown { key_code: KEY_PAUSE });
    runner.frame(2.0 * FRAME);

    let snapshot = |runner: &GameRunner<SpaceInvaders>| {
        runner.inspect(|_, ctx| {
            let mut v: Vec<_> = ctx.entities.iter().map(|e| (e.id(), e.pos())).collect();
            v.sort_by_key(|(id, _)| *id);
            v
        })
    };
    let before = snapshot(&runner);
    let mut now = 2.0 * FRAME;
    for _ in 0..60 {
        now += FRAME;
        assert!(runner.frame(now));
    }
    assert_eq!(snapshot(&runner), before);
    assert!(runner.is_running());
    runner.inspect(|game, _| assert_eq!(game.phase(), Phase::Paused));
}
