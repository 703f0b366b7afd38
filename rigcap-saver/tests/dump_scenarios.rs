use rigcap_capture::{RawFrame, RigPosition, StreamKind, SyntheticSource, synthetic_calibration};
use rigcap_saver::{
    DumpTrigger, FrameSaver, GateError, ManualClock, PositionOutcome, SaveLayout, SaverConfig, SaverError,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

const ARRIVALS_OK: [f64; 5] = [100.0, 100.1, 100.2, 100.3, 100.4];
const ARRIVALS_SKEWED: [f64; 5] = [100.0, 100.1, 100.2, 100.3, 100.6];

fn saver_in(dir: &Path) -> FrameSaver {
    FrameSaver::with_layout(SaverConfig::default(), SaveLayout::fixed(dir))
        .unwrap()
        .with_clock(Arc::new(ManualClock::new(1700000000.0)))
}

fn raw(position: &RigPosition, kind: StreamKind, n: u64) -> RawFrame {
    SyntheticSource::new(position.clone(), kind, 8, 6, 0.0).render(n)
}

fn fill(saver: &FrameSaver, position: &RigPosition, arrivals: [f64; 5]) {
    for (kind, arrived) in StreamKind::ALL.into_iter().zip(arrivals) {
        saver.ingest_at(position, kind, &raw(position, kind, 0), arrived).unwrap();
    }
}

fn calibrate(saver: &FrameSaver, position: &RigPosition) {
    for kind in StreamKind::ALL {
        for msg in synthetic_calibration(kind, 8, 6) {
            saver.ingest_calibration(position, kind, &msg).unwrap();
        }
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[test]
fn test_complete_set_is_saved() {
    let dir = tempdir().unwrap();
    let saver = saver_in(dir.path());
    let top = RigPosition::new("top");

    fill(&saver, &top, ARRIVALS_OK);
    calibrate(&saver, &top);

    let report = saver.dump().unwrap();
    assert_eq!(report.cycle, 0);
    assert_eq!(report.saved_count(), 1);
    assert_eq!(report.files().count(), 6);
    assert_eq!(saver.cycle(), 1);

    assert_eq!(
        file_names(dir.path()),
        vec![
            "0_top_camera_info.json",
            "0_top_color.png",
            "0_top_depth.png",
            "0_top_depth_aligned.png",
            "0_top_infra1.png",
            "0_top_infra2.png",
        ]
    );
    assert_eq!(saver.freshness(&top).unwrap(), [false; StreamKind::COUNT]);
}

#[test]
fn test_skewed_set_is_skipped() {
    let dir = tempdir().unwrap();
    let saver = saver_in(dir.path());
    let top = RigPosition::new("top");

    fill(&saver, &top, ARRIVALS_SKEWED);
    let report = saver.dump().unwrap();

    let Some(PositionOutcome::Skipped(GateError::Skew { frames, .. })) = report.outcomes.get(&top) else {
        panic!("expected skew, got {:?}", report.outcomes.get(&top));
    };
    assert!((frames - 3.6).abs() < 1e-9);
    assert!(file_names(dir.path()).is_empty());
    // Flags survive a rejected dump.
    assert_eq!(saver.freshness(&top).unwrap(), [true; StreamKind::COUNT]);
    assert_eq!(saver.cycle(), 1);
}

#[test]
fn test_second_dump_without_new_frames_is_stale() {
    let dir = tempdir().unwrap();
    let saver = saver_in(dir.path());
    let top = RigPosition::new("top");

    fill(&saver, &top, ARRIVALS_OK);
    assert_eq!(saver.dump().unwrap().saved_count(), 1);

    let report = saver.dump().unwrap();
    assert_eq!(report.cycle, 1);
    assert!(matches!(
        report.outcomes.get(&top),
        Some(PositionOutcome::Skipped(GateError::Stale { .. }))
    ));
    assert!(!file_names(dir.path()).iter().any(|n| n.starts_with("1_")));

    // A full new set makes the position eligible again.
    fill(&saver, &top, ARRIVALS_OK.map(|t| t + 1.0));
    let report = saver.dump().unwrap();
    assert_eq!(report.cycle, 2);
    assert_eq!(report.saved_count(), 1);
}

#[test]
fn test_cycle_advances_when_nothing_saved() {
    let dir = tempdir().unwrap();
    let saver = saver_in(dir.path());

    for expected in 0..3 {
        let report = saver.dump().unwrap();
        assert_eq!(report.cycle, expected);
        assert_eq!(report.saved_count(), 0);
        assert_eq!(report.outcomes.len(), 3);
        assert!(
            report
                .outcomes
                .values()
                .all(|o| matches!(o, PositionOutcome::Skipped(GateError::Incomplete { .. })))
        );
    }
    assert_eq!(saver.cycle(), 3);
}

#[test]
fn test_location_trigger() {
    let dir = tempdir().unwrap();
    let saver = saver_in(dir.path());
    let top = RigPosition::new("top");
    fill(&saver, &top, ARRIVALS_OK);

    let ignored = saver.dump_on(&DumpTrigger::Location("north_node".into())).unwrap();
    assert!(ignored.is_none());
    assert_eq!(saver.cycle(), 0);
    assert_eq!(saver.freshness(&top).unwrap(), [true; StreamKind::COUNT]);
    assert!(!dir.path().exists() || file_names(dir.path()).is_empty());

    let report = saver.dump_on(&DumpTrigger::Location("none".into())).unwrap().unwrap();
    assert_eq!(report.saved_count(), 1);

    let report = saver.dump_on(&DumpTrigger::Manual).unwrap().unwrap();
    assert_eq!(report.cycle, 1);
}

#[test]
fn test_depth_png_is_lossless() {
    let dir = tempdir().unwrap();
    let saver = saver_in(dir.path());
    let mid = RigPosition::new("mid");

    fill(&saver, &mid, ARRIVALS_OK);
    let depth = [0u16, 1, 255, 256, 4095, 40000, u16::MAX, 1234];
    let data: Vec<u8> = depth.iter().flat_map(|d| d.to_le_bytes()).collect();
    let raw = RawFrame::packed(4, 2, StreamKind::DepthAligned.expected_format(), data);
    saver.ingest_at(&mid, StreamKind::DepthAligned, &raw, 100.2).unwrap();

    saver.dump().unwrap();

    let saved = image::open(dir.path().join("0_mid_depth_aligned.png")).unwrap();
    let image::DynamicImage::ImageLuma16(saved) = saved else {
        panic!("expected a 16-bit grayscale PNG");
    };
    assert_eq!(saved.dimensions(), (4, 2));
    assert_eq!(saved.into_raw(), depth.to_vec());
}

#[test]
fn test_color_png_has_true_colors() {
    let dir = tempdir().unwrap();
    let saver = saver_in(dir.path());
    let bot = RigPosition::new("bot");

    fill(&saver, &bot, ARRIVALS_OK);
    // One BGR pixel: blue=10, green=20, red=30.
    let raw = RawFrame::packed(1, 1, StreamKind::Color.expected_format(), vec![10, 20, 30]);
    saver.ingest_at(&bot, StreamKind::Color, &raw, 100.0).unwrap();
    saver.dump().unwrap();

    let saved = image::open(dir.path().join("0_bot_color.png")).unwrap().into_rgb8();
    assert_eq!(saved.get_pixel(0, 0).0, [30, 20, 10]);
}

#[test]
fn test_camera_info_document() {
    let dir = tempdir().unwrap();
    let saver = saver_in(dir.path());
    let top = RigPosition::new("top");

    fill(&saver, &top, ARRIVALS_OK);
    calibrate(&saver, &top);
    saver.dump().unwrap();

    let text = fs::read_to_string(dir.path().join("0_top_camera_info.json")).unwrap();
    assert!(text.starts_with("{\n    \""));

    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    assert_eq!(
        keys,
        vec!["color", "depth", "depth_aligned", "infra1", "infra2", "save_time"]
    );
    assert_eq!(value["save_time"], 1700000000.0);
    assert!(value["depth"].get("extrinsic").is_none());
    assert_eq!(value["infra2"]["extrinsic"]["translation"][0], -0.05);
    assert_eq!(value["color"]["intrinsic"]["K"].as_array().unwrap().len(), 9);
}

#[test]
fn test_no_calibration_means_no_json() {
    let dir = tempdir().unwrap();
    let saver = saver_in(dir.path());
    let top = RigPosition::new("top");

    fill(&saver, &top, ARRIVALS_OK);
    let report = saver.dump().unwrap();
    assert_eq!(report.files().count(), 5);
    assert!(!dir.path().join("0_top_camera_info.json").exists());
}

#[test]
fn test_positions_are_independent() {
    let dir = tempdir().unwrap();
    let saver = saver_in(dir.path());
    let top = RigPosition::new("top");
    let mid = RigPosition::new("mid");
    let bot = RigPosition::new("bot");

    fill(&saver, &top, ARRIVALS_OK);
    fill(&saver, &mid, ARRIVALS_SKEWED);
    saver
        .ingest_at(&bot, StreamKind::Color, &raw(&bot, StreamKind::Color, 0), 100.0)
        .unwrap();

    let report = saver.dump().unwrap();
    assert!(matches!(report.outcomes[&top], PositionOutcome::Saved { .. }));
    assert!(matches!(
        report.outcomes[&mid],
        PositionOutcome::Skipped(GateError::Skew { .. })
    ));
    assert!(matches!(
        report.outcomes[&bot],
        PositionOutcome::Skipped(GateError::Incomplete { .. })
    ));

    assert_eq!(saver.freshness(&mid).unwrap(), [true; StreamKind::COUNT]);
    assert_eq!(saver.freshness(&bot).unwrap(), [true, false, false, false, false]);
    assert!(file_names(dir.path()).iter().all(|n| n.starts_with("0_top_")));
}

#[test]
fn test_directory_failure_aborts_without_side_effects() {
    let root = tempdir().unwrap();
    let blocker = root.path().join("not_a_dir");
    fs::write(&blocker, b"x").unwrap();

    let saver = saver_in(&blocker.join("run"));
    let top = RigPosition::new("top");
    fill(&saver, &top, ARRIVALS_OK);

    let err = saver.dump().unwrap_err();
    assert!(matches!(err, SaverError::Directory { .. }));
    assert_eq!(saver.cycle(), 0);
    assert_eq!(saver.freshness(&top).unwrap(), [true; StreamKind::COUNT]);
}

#[test]
fn test_preview_published_after_save() {
    let dir = tempdir().unwrap();
    let (tx, rx) = crossbeam_channel::bounded(1);
    let saver = saver_in(dir.path()).with_preview_sink(tx);
    let top = RigPosition::new("top");

    saver.dump().unwrap();
    assert!(rx.try_recv().is_err());

    fill(&saver, &top, ARRIVALS_OK);
    saver.dump().unwrap();
    let mosaic = rx.try_recv().unwrap();
    // Tiles are half the 8x6 color frame, laid out 4 wide and 2 high.
    assert_eq!(mosaic.dimensions(), (16, 6));
}

#[test]
fn test_concurrent_ingest_and_dump() {
    let dir = tempdir().unwrap();
    let saver = Arc::new(saver_in(dir.path()));

    let producers: Vec<_> = ["top", "mid", "bot"]
        .into_iter()
        .map(|name| {
            let saver = Arc::clone(&saver);
            std::thread::spawn(move || {
                let position = RigPosition::new(name);
                for n in 0..20u64 {
                    for kind in StreamKind::ALL {
                        saver
                            .ingest_at(&position, kind, &raw(&position, kind, n), 100.0 + n as f64 * 0.01)
                            .unwrap();
                    }
                }
            })
        })
        .collect();

    let dumper = {
        let saver = Arc::clone(&saver);
        std::thread::spawn(move || {
            for _ in 0..5 {
                saver.dump().unwrap();
            }
        })
    };

    for handle in producers {
        handle.join().unwrap();
    }
    dumper.join().unwrap();

    assert_eq!(saver.cycle(), 5);
    for name in file_names(dir.path()) {
        let cycle: u64 = name.split('_').next().unwrap().parse().unwrap();
        assert!(cycle < 5);
    }
}

#[test]
fn test_concurrent_dumps_are_serialized() {
    const THREADS: u64 = 4;
    const DUMPS_PER_THREAD: u64 = 3;

    let dir = tempdir().unwrap();
    let saver = Arc::new(saver_in(dir.path()));
    let positions: Vec<RigPosition> = saver.positions().cloned().collect();
    for position in &positions {
        fill(&saver, position, ARRIVALS_OK);
    }

    let barrier = Arc::new(std::sync::Barrier::new(THREADS as usize));
    let dumpers: Vec<_> = (0..THREADS)
        .map(|_| {
            let saver = Arc::clone(&saver);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                (0..DUMPS_PER_THREAD)
                    .map(|_| saver.dump().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut reports: Vec<_> = dumpers
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    reports.sort_by_key(|report| report.cycle);

    let cycles: Vec<u64> = reports.iter().map(|report| report.cycle).collect();
    assert_eq!(cycles, (0..THREADS * DUMPS_PER_THREAD).collect::<Vec<_>>());
    assert_eq!(saver.cycle(), THREADS * DUMPS_PER_THREAD);

    // Each position's single fresh set is consumed by exactly one dump.
    for position in &positions {
        let saved: Vec<u64> = reports
            .iter()
            .filter(|report| matches!(report.outcomes[position], PositionOutcome::Saved { .. }))
            .map(|report| report.cycle)
            .collect();
        assert_eq!(saved.len(), 1, "{} saved in cycles {:?}", position, saved);
        let marker = format!("_{}_", position);
        let prefix = format!("{}{}", saved[0], marker);
        let files: Vec<String> = file_names(dir.path())
            .into_iter()
            .filter(|name| name.contains(&marker))
            .collect();
        assert_eq!(files.len(), StreamKind::COUNT);
        assert!(files.iter().all(|name| name.starts_with(&prefix)));
    }
}
