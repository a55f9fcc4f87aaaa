use std::path::PathBuf;

use overlay_watermark_removal::detection::analyze_region;
use overlay_watermark_removal::{
    Error, PixelBuffer, ProcessOptions, Region, RegionPreset, RemovalStage, Strategy,
    WatermarkEngine,
};

const BACKGROUND: [u8; 4] = [170, 200, 235, 255];
const INK: [u8; 4] = [20, 20, 20, 255];

/// Light chromatic background with paired dark strokes inside `region`.
fn glyph_buffer(width: u32, height: u32, region: Region) -> PixelBuffer {
    let mut buf = PixelBuffer::filled(width, height, BACKGROUND);
    let (x0, x1) = (region.x() + 6, region.right() - 6);
    let (y0, y1) = (region.y() + 5, region.bottom() - 5);
    for y in y0..y1 {
        for x in x0..x1 {
            if matches!((x - x0) % 5, 0 | 2) {
                buf.set_pixel(x, y, INK);
            }
        }
    }
    buf
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn seeded() -> WatermarkEngine {
    WatermarkEngine::new(ProcessOptions {
        seed: Some(1234),
        ..ProcessOptions::default()
    })
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "overlay-watermark-{name}-{}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn default_candidate_region_for_square_image() {
    let engine = WatermarkEngine::default();
    assert_eq!(engine.candidate_region(400, 400), Region::new(3, 3, 112, 60));
}

#[test]
fn detect_reports_nothing_on_blank_image() {
    let engine = WatermarkEngine::default();
    let result = engine.detect(&PixelBuffer::filled(400, 400, BACKGROUND));
    assert!(!result.detected);
    assert!(result.confidence < 0.25);
}

#[test]
fn detect_finds_glyphs_in_badge_region() {
    let engine = WatermarkEngine::default();
    let buf = glyph_buffer(400, 400, Region::new(3, 3, 112, 60));
    let result = engine.detect(&buf);
    assert!(result.detected);
    assert!(result.confidence > 0.5);
}

#[test]
fn end_to_end_removal_on_badge_region() {
    let region = Region::new(3, 3, 112, 60);
    let mut buf = glyph_buffer(400, 400, region);
    init_logging();
    let engine = seeded();

    let score_before = engine.score(&buf, &region);
    let text_before = analyze_region(&buf, &region).text_ratio;

    let report = engine.process(&mut buf).unwrap();
    assert_eq!(report.region, region);
    assert_eq!(report.stage, Some(RemovalStage::Enhanced));
    assert!(report.failures.is_empty());

    assert_eq!(buf.dimensions(), (400, 400));
    assert!(buf.as_bytes().iter().skip(3).step_by(4).all(|&a| a == 255));

    let score_after = engine.score(&buf, &region);
    let text_after = analyze_region(&buf, &region).text_ratio;
    assert!(score_after < score_before, "{score_before} -> {score_after}");
    assert!(text_after <= text_before * 0.5, "{text_before} -> {text_after}");
}

#[test]
fn pixels_outside_region_are_untouched() {
    let region = Region::new(3, 3, 112, 60);
    let mut buf = glyph_buffer(400, 400, region);
    let before = buf.clone();
    seeded().process(&mut buf).unwrap();

    for y in 0..400 {
        for x in 0..400 {
            if !region.contains(x, y) {
                assert_eq!(buf.pixel(x, y), before.pixel(x, y), "({x}, {y})");
            }
        }
    }
}

#[test]
fn seeded_runs_are_reproducible() {
    let region = Region::new(3, 3, 112, 60);
    let mut a = glyph_buffer(400, 400, region);
    let mut b = a.clone();
    seeded().process(&mut a).unwrap();
    seeded().process(&mut b).unwrap();
    assert_eq!(a, b);
}

#[test]
fn score_stays_in_unit_interval() {
    let engine = WatermarkEngine::default();
    let buf = glyph_buffer(120, 80, Region::new(3, 3, 100, 60));
    for region in [
        Region::new(0, 0, 0, 0),
        Region::new(-50, -50, 10, 10),
        Region::new(100, 60, 500, 500),
        Region::new(-10, -10, 1000, 1000),
        Region::new(3, 3, 100, 60),
    ] {
        let s = engine.score(&buf, &region);
        assert!((0.0..=1.0).contains(&s), "{region:?}: {s}");
    }
}

#[test]
fn bottom_right_preset_processes_the_corner() {
    let engine = WatermarkEngine::new(ProcessOptions {
        preset: RegionPreset::BottomRightCorner { fraction: 0.15 },
        seed: Some(5),
        ..ProcessOptions::default()
    });
    let region = engine.candidate_region(1000, 800);
    assert_eq!(region, Region::new(850, 680, 150, 120));

    let mut buf = glyph_buffer(1000, 800, region);
    let report = engine.process(&mut buf).unwrap();
    assert_eq!(report.region, region);
    assert!(report.stage.is_some());
}

#[test]
fn strip_strategy_copies_neighboring_column() {
    let engine = WatermarkEngine::new(ProcessOptions {
        preset: RegionPreset::BottomRightCorner { fraction: 0.15 },
        strategy: Strategy::StripFill,
        ..ProcessOptions::default()
    });
    let mut buf = PixelBuffer::filled(200, 100, [10, 120, 30, 255]);
    let region = engine.candidate_region(200, 100);
    for y in region.y()..region.bottom() {
        for x in region.x()..region.right() {
            buf.set_pixel(x, y, [255, 255, 255, 255]);
        }
    }

    let report = engine.process(&mut buf).unwrap();
    assert_eq!(report.stage, Some(RemovalStage::StripFill));
    assert_eq!(buf, PixelBuffer::filled(200, 100, [10, 120, 30, 255]));
}

#[test]
fn raw_buffer_with_wrong_length_is_rejected() {
    let err = PixelBuffer::from_raw(4, 4, vec![0; 10]).unwrap_err();
    assert!(matches!(
        err,
        Error::PixelAccessDenied {
            width: 4,
            height: 4,
            ..
        }
    ));
}

#[test]
fn process_file_round_trip() {
    let dir = temp_dir("roundtrip");
    let input = dir.join("badge.png");
    let output = dir.join("badge_cleaned.png");
    let region = Region::new(3, 3, 112, 60);
    overlay_watermark_removal::save_image(&glyph_buffer(400, 400, region), &input).unwrap();

    init_logging();
    let result = seeded().process_file(&input, &output);
    assert!(result.success, "{}", result.message);
    assert!(!result.skipped);
    assert_eq!(result.stage, Some(RemovalStage::Enhanced));

    let cleaned = PixelBuffer::from_dynamic(&image::open(&output).unwrap()).unwrap();
    assert_eq!(cleaned.dimensions(), (400, 400));
    assert!(analyze_region(&cleaned, &region).text_ratio < 0.15);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn process_file_skips_clean_image() {
    let dir = temp_dir("clean");
    let input = dir.join("clean.png");
    let output = dir.join("clean_out.png");
    overlay_watermark_removal::save_image(&PixelBuffer::filled(300, 200, BACKGROUND), &input)
        .unwrap();

    let result = WatermarkEngine::default().process_file(&input, &output);
    assert!(result.success);
    assert!(result.skipped);
    assert!(!output.exists());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn process_file_keeps_original_when_every_stage_fails() {
    let dir = temp_dir("exhausted");
    let input = dir.join("full.png");
    let output = dir.join("full_out.png");
    let original = glyph_buffer(80, 60, Region::new(0, 0, 80, 60));
    overlay_watermark_removal::save_image(&original, &input).unwrap();

    // The whole image is the candidate: no strip to the left, no samples outside.
    let engine = WatermarkEngine::new(ProcessOptions {
        force: true,
        preset: RegionPreset::BottomRightCorner { fraction: 1.0 },
        strategy: Strategy::Custom(&[RemovalStage::StripFill, RemovalStage::FlatFill]),
        seed: Some(3),
        ..ProcessOptions::default()
    });
    let result = engine.process_file(&input, &output);
    assert!(result.success, "{}", result.message);
    assert!(result.skipped);
    assert_eq!(result.stage, None);
    assert!(result.message.contains("original kept"));

    let saved = PixelBuffer::from_dynamic(&image::open(&output).unwrap()).unwrap();
    assert_eq!(saved, original);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn process_file_reports_missing_input() {
    let dir = temp_dir("missing");
    let result =
        WatermarkEngine::default().process_file(&dir.join("nope.png"), &dir.join("out.png"));
    assert!(!result.success);
    assert!(result.message.starts_with("Failed to load"));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn process_directory_handles_mixed_files() {
    let dir = temp_dir("batch");
    let input = dir.join("in");
    let output = dir.join("out");
    std::fs::create_dir_all(&input).unwrap();
    let region = Region::new(3, 3, 112, 60);
    overlay_watermark_removal::save_image(&glyph_buffer(400, 400, region), &input.join("a.png"))
        .unwrap();
    let blank = PixelBuffer::filled(50, 50, BACKGROUND);
    overlay_watermark_removal::save_image(&blank, &input.join("b.png")).unwrap();
    std::fs::write(input.join("notes.txt"), "not an image").unwrap();

    let results = seeded().process_directory(&input, &output);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
    assert!(output.join("a.png").exists());

    std::fs::remove_dir_all(&dir).ok();
}
