//! Configuration builder and validation tests.

use std::{str::FromStr, time::Duration};

use frame_extractor::{
    AudioMode, AudioOptions, ExtractError, ExtractionConfig, Extractor, FormatHint, InputSource,
    RasterFormat, SaveMode, SelectionPolicy,
};

// ── defaults ───────────────────────────────────────────────────────

#[test]
fn defaults_select_every_frame_as_png() {
    let config = ExtractionConfig::new("input.mp4");
    assert_eq!(config.input(), &InputSource::File("input.mp4".into()));
    assert_eq!(config.output_pattern().as_str(), "frame_%d.png");
    assert_eq!(config.selection(), &SelectionPolicy::all());
    assert_eq!(config.save_mode(), SaveMode::Raster(RasterFormat::Png));
    assert_eq!(config.audio_mode(), AudioMode::Disabled);
    assert!(config.validate().is_ok());
}

#[test]
fn url_input_carries_format_hint() {
    let config = ExtractionConfig::from_url("https://example.com/watch?v=1")
        .with_url_format(FormatHint::Custom("worst".to_string()));
    assert_eq!(
        config.input(),
        &InputSource::Url {
            url: "https://example.com/watch?v=1".to_string(),
            format: FormatHint::Custom("worst".to_string()),
        }
    );
}

#[test]
fn url_format_is_ignored_for_files() {
    let config = ExtractionConfig::new("clip.mkv").with_url_format(FormatHint::Custom("x".into()));
    assert_eq!(config.input(), &InputSource::File("clip.mkv".into()));
}

#[test]
fn raster_format_names() {
    assert_eq!(RasterFormat::from_str("JPEG").unwrap(), RasterFormat::Jpeg);
    assert_eq!(RasterFormat::from_str("jpg").unwrap(), RasterFormat::Jpeg);
    assert_eq!(RasterFormat::from_str("bmp").unwrap(), RasterFormat::Bmp);
    assert!(RasterFormat::from_str("gif").is_err());

    assert_eq!(SaveMode::RawPlanar.extension(), "yuv");
    assert_eq!(SaveMode::Raster(RasterFormat::Jpeg).extension(), "jpg");
    assert_eq!(
        SaveMode::Raster(RasterFormat::Jpeg).recognized_extensions(),
        &["jpg", "jpeg"]
    );
}

// ── validation ─────────────────────────────────────────────────────

#[test]
fn zero_workers_or_capacity_is_invalid() {
    let config = ExtractionConfig::new("in.mp4").with_workers(0);
    assert!(matches!(
        config.validate(),
        Err(ExtractError::ConfigurationError(_))
    ));

    let config = ExtractionConfig::new("in.mp4").with_queue_capacity(0);
    assert!(matches!(
        Extractor::new(config),
        Err(ExtractError::ConfigurationError(_))
    ));
}

#[test]
fn empty_inputs_are_invalid() {
    assert!(ExtractionConfig::new("").validate().is_err());
    assert!(ExtractionConfig::from_url("  ").validate().is_err());
    assert!(
        ExtractionConfig::new("in.mp4")
            .with_audio(AudioOptions::new().with_output(""))
            .validate()
            .is_err()
    );
}

#[test]
fn bad_pattern_is_rejected_by_the_builder() {
    let result = ExtractionConfig::new("in.mp4").with_output_pattern("frame_%s.png");
    assert!(matches!(result, Err(ExtractError::ConfigurationError(_))));
}

#[test]
fn selection_errors_surface_at_validation() {
    let config = ExtractionConfig::new("in.mp4").with_selection(SelectionPolicy::Range {
        start: Some(9),
        end: Some(3),
        step: 1,
    });
    assert!(matches!(
        config.validate(),
        Err(ExtractError::InvalidRange { .. })
    ));

    let config = ExtractionConfig::new("in.mp4").with_selection(SelectionPolicy::TimeRange {
        start: Duration::ZERO,
        end: Duration::from_secs(1),
        step: 0,
    });
    assert!(matches!(
        config.validate(),
        Err(ExtractError::InvalidInterval)
    ));

    let config = ExtractionConfig::new("in.mp4").with_selection(SelectionPolicy::Frames(vec![]));
    assert!(config.validate().is_err());
}

#[test]
fn audio_only_ignores_the_frame_selection() {
    let config = ExtractionConfig::new("in.mp4")
        .with_audio_mode(AudioMode::Only)
        .with_selection(SelectionPolicy::Range {
            start: None,
            end: None,
            step: 0,
        });
    assert!(config.validate().is_ok());
}

#[test]
fn builder_keeps_every_setting() {
    let config = ExtractionConfig::new("in.mp4")
        .with_output_pattern("out/%05d")
        .unwrap()
        .with_save_mode(SaveMode::RawPlanar)
        .with_selection(SelectionPolicy::single(12))
        .with_workers(2)
        .with_queue_capacity(8)
        .with_progress_interval(Duration::from_millis(10))
        .with_keep_download(true);

    assert_eq!(config.output_pattern().render(12), "out/00012");
    assert_eq!(config.save_mode(), SaveMode::RawPlanar);
    assert_eq!(config.selection(), &SelectionPolicy::Frames(vec![12]));
    assert!(format!("{config:?}").contains("queue_capacity: 8"));
}
