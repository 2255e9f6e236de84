use criterion::{black_box, criterion_group, criterion_main, Criterion};
use trackzone_core::{path_search, GrayImage, PathSearchParams, Point, IMAGE_COLS, IMAGE_ROWS};
use trackzone_zones::{centerline, Detection, Engine, EngineParams, Label, NoRetrace, TrackFrame};

fn curved_frame(shift: i32) -> TrackFrame {
    let rows = 0..200;
    let left = rows
        .clone()
        .map(|i| Point::new(IMAGE_ROWS - 1 - i, (40 + i * i / 400 + shift).min(IMAGE_COLS - 1)))
        .collect();
    let right = rows
        .map(|i| Point::new(IMAGE_ROWS - 1 - i, (280 - i / 4 + shift).min(IMAGE_COLS - 1)))
        .collect();
    TrackFrame::new(left, right)
}

/// White trapezoid road on black.
fn road_image() -> GrayImage {
    let mut img = GrayImage::new(IMAGE_COLS as usize, IMAGE_ROWS as usize);
    for row in 40..IMAGE_ROWS {
        let half = 40 + (row - 40) * 3 / 5;
        img.fill_rect(row, row + 1, IMAGE_COLS / 2 - half, IMAGE_COLS / 2 + half, 255);
    }
    img
}

fn bench_engine(c: &mut Criterion) {
    let mut engine = Engine::new(EngineParams::default()).expect("default calibration");
    let mask = road_image();
    let detections = [
        Detection::new(Label::Cone, 100, 120, 16, 16),
        Detection::new(Label::Crosswalk, 120, 60, 80, 20),
    ];
    let frames: Vec<TrackFrame> = (0..16).map(curved_frame).collect();

    c.bench_function("engine_process_320x240", |b| {
        let mut i = 0;
        b.iter(|| {
            let mut frame = frames[i % frames.len()].clone();
            i += 1;
            let out = engine.process(
                black_box(&mut frame),
                black_box(&detections),
                mask.view(),
                &mut NoRetrace,
            );
            black_box(out.centerline.control_center)
        })
    });
}

fn bench_centerline(c: &mut Criterion) {
    let frame = curved_frame(0);
    c.bench_function("centerline_two_edges", |b| {
        b.iter(|| {
            let mut f = frame.clone();
            black_box(centerline::compute(black_box(&mut f)).sigma)
        })
    });
}

fn bench_path_search(c: &mut Criterion) {
    let img = road_image();
    let params = PathSearchParams::default();
    c.bench_function("path_search_320x240", |b| {
        b.iter(|| {
            let found = path_search(black_box(&img.view()), black_box(&params));
            black_box(found.seed)
        })
    });
}

criterion_group!(frame_loop, bench_engine, bench_centerline, bench_path_search);
criterion_main!(frame_loop);
