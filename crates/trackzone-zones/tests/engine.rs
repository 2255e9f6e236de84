use trackzone_core::{GrayImage, Point, IMAGE_COLS, IMAGE_ROWS};
use trackzone_zones::{
    ConfigError, Detection, Engine, EngineParams, FrameOutput, Label, NoRetrace, RingTimerParams,
    TrackFrame, TrackStyle, ZoneEnables, ZoneKind,
};

fn edges(len: i32, left_col: i32, right_col: i32) -> TrackFrame {
    let rows = || (0..len).map(|i| IMAGE_ROWS - 1 - i);
    TrackFrame::new(
        rows().map(|r| Point::new(r, left_col)).collect(),
        rows().map(|r| Point::new(r, right_col)).collect(),
    )
}

fn straight() -> TrackFrame {
    edges(200, 60, 260)
}

fn crosswalk() -> [Detection; 1] {
    [Detection::new(Label::Crosswalk, 150, 190, 20, 20)]
}

struct Run {
    engine: Engine,
    mask: GrayImage,
}

impl Run {
    fn new(params: EngineParams) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            engine: Engine::new(params).expect("valid calibration"),
            mask: GrayImage::new(IMAGE_COLS as usize, IMAGE_ROWS as usize),
        }
    }

    fn step(&mut self, mut frame: TrackFrame, detections: &[Detection]) -> FrameOutput {
        self.engine
            .process(&mut frame, detections, self.mask.view(), &mut NoRetrace)
    }
}

fn no_garage() -> EngineParams {
    EngineParams {
        enable: ZoneEnables {
            garage: false,
            ..ZoneEnables::default()
        },
        warmup_frames: 0,
        ..EngineParams::default()
    }
}

#[test]
fn runaway_stops_exactly_once() {
    let mut run = Run::new(no_garage());
    let outs: Vec<FrameOutput> = (0..25).map(|_| run.step(edges(10, 60, 260), &[])).collect();
    let stops: Vec<u64> = outs.iter().filter(|o| o.zone.stop).map(|o| o.index).collect();
    assert_eq!(stops, [20]);
    assert!(run.engine.stopped());
    assert!(outs[20..]
        .iter()
        .all(|o| o.command.is_some_and(|c| c.speed == 0.0)));
}

#[test]
fn straight_track_steers_straight_and_speeds_up() {
    let mut params = no_garage();
    params.control.speed_high = 2.0;
    let mut run = Run::new(params);
    let outs: Vec<FrameOutput> = (0..10).map(|_| run.step(straight(), &[])).collect();
    for o in &outs {
        assert_eq!(o.zone.active, None);
        assert_eq!(o.centerline.style, TrackStyle::Straight);
        assert!((159..=160).contains(&o.centerline.control_center));
    }
    let last = outs[9].command.expect("no warm-up");
    assert_eq!(last.speed, 2.0);
}

#[test]
fn laps_are_counted_and_open_the_garage() {
    let params = EngineParams {
        warmup_frames: 0,
        ..EngineParams::default()
    };
    let mut run = Run::new(params);

    let first = run.step(straight(), &[]);
    assert_eq!(first.zone.active, Some(ZoneKind::Garage));
    assert_eq!(first.zone.laps, 1);

    for _ in 0..70 {
        let out = run.step(straight(), &[]);
        assert!(!out.zone.lap_started);
    }
    assert_eq!(run.engine.arbiter().active(), None);

    let started: Vec<bool> = (0..6)
        .map(|_| run.step(straight(), &crosswalk()).zone.lap_started)
        .collect();
    assert_eq!(started, [false, false, false, false, false, true]);
    assert_eq!(run.engine.arbiter().laps(), 2);
    assert!(!run.engine.arbiter().garage().entry_enabled());

    for _ in 0..101 {
        run.step(straight(), &[]);
    }
    assert!(run.engine.arbiter().garage().entry_enabled());
}

#[test]
fn slow_down_request_is_latched() {
    let mut params = no_garage();
    params.slow_down_frames = 5;
    params.enable.garage = true;
    params.laps = 0;
    let mut run = Run::new(params);

    // Leave the garage, wait for the entry to open, then show the crosswalk.
    for _ in 0..110 {
        run.step(straight(), &[]);
    }
    assert!(run.engine.arbiter().garage().entry_enabled());
    let cw = [Detection::new(Label::Crosswalk, 150, 90, 20, 20)];
    let mut slow = Vec::new();
    for _ in 0..4 {
        slow.push(run.step(straight(), &cw).zone.slow_down);
    }
    assert_eq!(slow, [false, false, false, true]);

    let held: Vec<bool> = (0..5)
        .map(|_| run.step(straight(), &[]).zone.slow_down)
        .collect();
    assert_eq!(held, [true, true, true, true, false]);
}

/// Left edge bulging out to the image border, as at a ring opening.
fn ring_opening(spur: bool) -> TrackFrame {
    let col = |i: i32| match i {
        0..50 => 60,
        50..100 => (60 - (i - 49) * 2).max(0),
        _ => 40,
    };
    let mut f = TrackFrame::new(
        (0..200).map(|i| Point::new(239 - i, col(i))).collect(),
        (0..200).map(|i| Point::new(239 - i, 300)).collect(),
    );
    f.stdev_left = 200.0;
    f.stdev_right = 10.0;
    if spur {
        f.spurroad = vec![Point::new(150, 100)];
    }
    f
}

/// Drive through one ring and return the activation events.
fn ring_cycle(run: &mut Run) -> Vec<Option<ZoneKind>> {
    let frames = std::iter::once(ring_opening(true))
        .chain((0..4).map(|_| ring_opening(false)))
        .chain((0..3).map(|_| straight()));
    frames.map(|f| run.step(f, &[]).zone.activated).collect()
}

fn unshielded_ring(timer: Option<RingTimerParams>) -> EngineParams {
    let mut params = no_garage();
    params.roundabout.shield_frames = 0;
    params.ring_timer = timer;
    params
}

#[test]
fn second_ring_activates_without_a_timer() {
    let mut run = Run::new(unshielded_ring(None));
    for _ in 0..2 {
        let events = ring_cycle(&mut run);
        assert_eq!(events[0], Some(ZoneKind::Roundabout));
        assert!(events[1..].iter().all(Option::is_none));
        assert_eq!(run.engine.arbiter().active(), None);
    }
}

#[test]
fn ring_timer_blocks_a_second_ring() {
    let timer = RingTimerParams {
        hold_frames: 2,
        rearm_frames: 1000,
        blocked_frames: 2000,
    };
    let mut run = Run::new(unshielded_ring(Some(timer)));
    let first = ring_cycle(&mut run);
    assert_eq!(first[0], Some(ZoneKind::Roundabout));

    let out = run.step(ring_opening(true), &[]);
    assert_eq!(out.zone.activated, None);
    assert_eq!(out.zone.active, None);
}

#[test]
fn config_round_trips_through_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("params.json");

    let mut params = EngineParams::default();
    params.laps = 3;
    params.enable.silo = false;
    params.ring_timer = Some(RingTimerParams {
        hold_frames: 10,
        rearm_frames: 20,
        blocked_frames: 30,
    });
    params.control.run_p1 = 1.1;
    params.write_json(&path).expect("write config");

    let loaded = EngineParams::load_json(&path).expect("read config");
    assert_eq!(loaded, params);

    let engine = Engine::from_json(&path).expect("engine from config");
    assert_eq!(engine.params().laps, 3);
}

#[test]
fn config_errors_are_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.json");
    assert!(matches!(
        EngineParams::load_json(&missing),
        Err(ConfigError::Io(_))
    ));

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ \"laps\": ").expect("write");
    assert!(matches!(
        EngineParams::load_json(&broken),
        Err(ConfigError::Json(_))
    ));

    let skewed = dir.path().join("skewed.json");
    std::fs::write(
        &skewed,
        r#"{ "perspective": { "image_points": [[0,0],[1,1],[2,2]], "top_points": [[0,0],[1,1],[2,2]] } }"#,
    )
    .expect("write");
    assert!(matches!(
        Engine::from_json(&skewed),
        Err(ConfigError::Mapping(_))
    ));
}
