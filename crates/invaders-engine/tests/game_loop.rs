use std::cell::{Cell, RefCell};
use std::rc::Rc;

use approx::assert_relative_eq;
use invaders_engine::{
    EngineError, FrameOutcome, FrameRequest, GameLoop, LoopConfig, ManualClock,
};
use rstest::rstest;

const INTERVAL: f64 = 1000.0 / 60.0;

fn counting_loop(config: LoopConfig) -> (GameLoop, FrameRequest, Rc<Cell<u32>>) {
    let request = FrameRequest::new();
    let mut game_loop = GameLoop::new(
        config,
        Box::new(ManualClock::new(0.0)),
        Box::new(request.clone()),
    )
    .unwrap();
    let updates = Rc::new(Cell::new(0));
    let counter = Rc::clone(&updates);
    game_loop
        .start(
            move |dt| {
                assert_eq!(dt, INTERVAL);
                counter.set(counter.get() + 1);
                Ok(())
            },
            || Ok(()),
        )
        .unwrap();
    (game_loop, request, updates)
}

#[test]
fn fifty_ms_frames_run_two_or_three_fixed_updates() {
    let config = LoopConfig {
        max_delta_ms: 100.0,
        ..LoopConfig::default()
    };
    let (mut game_loop, request, updates) = counting_loop(config);

    let mut now = 0.0;
    let mut total = 0;
    for _ in 0..30 {
        assert!(request.take(), "loop should ask for every frame");
        now += 50.0;
        let before = updates.get();
        let outcome = game_loop.frame(now);
        let ticks = updates.get() - before;
        assert!((2..=3).contains(&ticks), "ran {ticks} updates");
        assert_eq!(outcome, FrameOutcome::Completed { ticks });
        assert!(game_loop.accumulator() >= 0.0 && game_loop.accumulator() < INTERVAL);
        total += ticks;
    }
    // 1500 ms of simulated time at 60 Hz.
    assert!((89..=90).contains(&total), "total {total}");
    assert_eq!(game_loop.ticks(), total as u64);
}

#[test]
fn long_stall_is_capped() {
    let (mut game_loop, _, updates) = counting_loop(LoopConfig::default());
    game_loop.frame(5000.0);
    // Capped to 1000/30 ms, i.e. two ticks, never 300.
    assert_eq!(updates.get(), 2);
    assert_relative_eq!(game_loop.stats().frame_time, 1000.0 / 30.0);
}

#[rstest]
#[case(-40.0)]
#[case(f64::NAN)]
fn backwards_or_broken_time_adds_nothing(#[case] t: f64) {
    let (mut game_loop, _, updates) = counting_loop(LoopConfig::default());
    assert_eq!(game_loop.frame(t), FrameOutcome::Completed { ticks: 0 });
    assert_eq!(updates.get(), 0);
    assert_eq!(game_loop.stats().fps, 0.0);
}

#[test]
fn two_failures_then_success_resets_the_counter() {
    let request = FrameRequest::new();
    let mut game_loop = GameLoop::new(
        LoopConfig::default(),
        Box::new(ManualClock::new(0.0)),
        Box::new(request.clone()),
    )
    .unwrap();
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    game_loop
        .start(
            move |_| {
                counter.set(counter.get() + 1);
                if counter.get() <= 2 {
                    anyhow::bail!("boom #{}", counter.get());
                }
                Ok(())
            },
            || Ok(()),
        )
        .unwrap();

    // One tick per 20 ms frame.
    assert_eq!(game_loop.frame(20.0), FrameOutcome::Failed { consecutive: 1 });
    assert!(game_loop.is_running());
    assert!(request.take());
    assert_eq!(game_loop.frame(40.0), FrameOutcome::Failed { consecutive: 2 });
    assert!(game_loop.is_running());
    assert!(request.take());
    assert!(matches!(game_loop.frame(60.0), FrameOutcome::Completed { .. }));
    assert_eq!(game_loop.consecutive_errors(), 0);
    assert!(game_loop.is_running());
    assert!(game_loop.last_error().is_none());
}

#[test]
fn render_errors_count_towards_fatal_too() {
    let request = FrameRequest::new();
    let mut game_loop = GameLoop::new(
        LoopConfig {
            max_errors: 2,
            ..LoopConfig::default()
        },
        Box::new(ManualClock::new(0.0)),
        Box::new(request.clone()),
    )
    .unwrap();
    let fatal_calls = Rc::new(Cell::new(0));
    let seen = Rc::clone(&fatal_calls);
    game_loop.on_fatal(move |err| {
        assert!(err.to_string().contains("render failed"));
        seen.set(seen.get() + 1);
    });
    game_loop
        .start(|_| Ok(()), || Err(anyhow::anyhow!("context lost")))
        .unwrap();

    assert_eq!(game_loop.frame(5.0), FrameOutcome::Failed { consecutive: 1 });
    assert_eq!(game_loop.frame(10.0), FrameOutcome::Fatal);
    assert_eq!(fatal_calls.get(), 1);
    assert!(!request.is_pending());
    assert!(matches!(
        game_loop.last_error(),
        Some(EngineError::Fatal { failures: 2, .. })
    ));

    // A stopped loop can be started again.
    game_loop.start(|_| Ok(()), || Ok(())).unwrap();
    assert!(game_loop.last_error().is_none());
    assert!(matches!(game_loop.frame(30.0), FrameOutcome::Completed { .. }));
}

#[test]
fn updates_complete_before_render_in_each_frame() {
    let request = FrameRequest::new();
    let mut game_loop = GameLoop::new(
        LoopConfig::default(),
        Box::new(ManualClock::new(0.0)),
        Box::new(request),
    )
    .unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    let (u, r) = (Rc::clone(&log), Rc::clone(&log));
    game_loop
        .start(
            move |_| {
                u.borrow_mut().push('u');
                Ok(())
            },
            move || {
                r.borrow_mut().push('r');
                Ok(())
            },
        )
        .unwrap();
    game_loop.frame(1000.0 / 30.0);
    game_loop.frame(1000.0 / 30.0 + 5.0);
    assert_eq!(log.borrow().iter().collect::<String>(), "uurr");
}
