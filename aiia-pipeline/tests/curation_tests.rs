//! Curation stage tests: scanning, scoring, ordering and selection

mod helpers;

use aiia_common::events::NullSink;
use aiia_pipeline::services::curation::CurationStage;
use aiia_pipeline::services::quality_scorer::{HeuristicMetric, QualityScorer, SharpnessMetric};
use helpers::{generate_test_image, generate_test_library, FixedScoreMetric, ImageSpec};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn stage(metric: FixedScoreMetric) -> CurationStage {
    CurationStage::new(Arc::new(QualityScorer::with_metric(Box::new(metric))))
}

fn names(outcome: &aiia_pipeline::services::curation::CurationOutcome) -> Vec<String> {
    outcome
        .selected
        .iter()
        .map(|s| s.path.file_name().unwrap().to_string_lossy().to_string())
        .collect()
}

#[tokio::test]
async fn ten_images_top_thirty_percent_higher_is_better() {
    let dir = TempDir::new().unwrap();
    generate_test_library(dir.path(), 10).unwrap();

    let scores: Vec<(String, f64)> = (0..10)
        .map(|i| (format!("img_{:02}.jpg", i), (i as f64) * 7.5 + 1.0))
        .collect();
    let refs: Vec<(&str, f64)> = scores.iter().map(|(n, s)| (n.as_str(), *s)).collect();

    let outcome = stage(FixedScoreMetric::new(&refs, false))
        .curate(dir.path(), 0.3, true, &NullSink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.found, 10);
    assert_eq!(outcome.scored, 10);
    assert_eq!(names(&outcome), vec!["img_09.jpg", "img_08.jpg", "img_07.jpg"]);
}

#[tokio::test]
async fn lower_is_better_metric_sorts_ascending() {
    let dir = TempDir::new().unwrap();
    generate_test_library(dir.path(), 10).unwrap();

    let scores: Vec<(String, f64)> = (0..10)
        .map(|i| (format!("img_{:02}.jpg", i), 50.0 - i as f64))
        .collect();
    let refs: Vec<(&str, f64)> = scores.iter().map(|(n, s)| (n.as_str(), *s)).collect();

    let outcome = stage(FixedScoreMetric::new(&refs, true))
        .curate(dir.path(), 0.3, true, &NullSink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(names(&outcome), vec!["img_09.jpg", "img_08.jpg", "img_07.jpg"]);
    let scores: Vec<f64> = outcome.selected.iter().map(|s| s.quality_score).collect();
    assert!(scores.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn single_image_always_selected() {
    let dir = TempDir::new().unwrap();
    generate_test_image(&dir.path().join("only.png"), &ImageSpec::default()).unwrap();

    let outcome = stage(FixedScoreMetric::new(&[("only.png", 3.0)], false))
        .curate(dir.path(), 0.1, true, &NullSink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.selected.len(), 1);
}

#[tokio::test]
async fn unscorable_images_are_excluded_silently() {
    let dir = TempDir::new().unwrap();
    generate_test_library(dir.path(), 4).unwrap();
    // Corrupt file passes the extension filter only if its magic bytes match
    std::fs::write(dir.path().join("broken.jpg"), [0xFF, 0xD8, 0xFF, 0x00, 0x01]).unwrap();

    // The metric knows every library image but not the broken one, so the
    // heuristic fallback runs and cannot decode it
    let outcome = stage(FixedScoreMetric::new(
        &[
            ("img_00.jpg", 1.0),
            ("img_01.jpg", 2.0),
            ("img_02.jpg", 3.0),
            ("img_03.jpg", 4.0),
        ],
        false,
    ))
    .curate(dir.path(), 1.0, true, &NullSink, &CancellationToken::new())
    .await
    .unwrap();

    assert_eq!(outcome.found, 5);
    assert_eq!(outcome.scored, 4);
    assert_eq!(outcome.selected.len(), 4);
}

#[tokio::test]
async fn non_recursive_scan_ignores_subdirectories() {
    let dir = TempDir::new().unwrap();
    generate_test_library(dir.path(), 2).unwrap();
    let nested = dir.path().join("nested");
    std::fs::create_dir(&nested).unwrap();
    generate_test_image(&nested.join("deep.jpg"), &ImageSpec::default()).unwrap();

    let scorer = Arc::new(QualityScorer::with_metric(Box::new(HeuristicMetric)));
    let stage = CurationStage::new(scorer);

    let flat = stage
        .curate(dir.path(), 1.0, false, &NullSink, &CancellationToken::new())
        .await
        .unwrap();
    let deep = stage
        .curate(dir.path(), 1.0, true, &NullSink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(flat.found, 2);
    assert_eq!(deep.found, 3);
}

#[tokio::test]
async fn sharpness_metric_prefers_detailed_images() {
    let dir = TempDir::new().unwrap();
    generate_test_image(
        &dir.path().join("flat.png"),
        &ImageSpec {
            checker: 0,
            ..Default::default()
        },
    )
    .unwrap();
    generate_test_image(
        &dir.path().join("detailed.png"),
        &ImageSpec {
            checker: 2,
            ..Default::default()
        },
    )
    .unwrap();

    let stage = CurationStage::new(Arc::new(QualityScorer::with_metric(Box::new(
        SharpnessMetric::default(),
    ))));
    let outcome = stage
        .curate(dir.path(), 0.5, true, &NullSink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(names(&outcome), vec!["detailed.png"]);
}

#[tokio::test]
async fn missing_directory_is_scan_error() {
    let stage = stage(FixedScoreMetric::new(&[], false));
    let result = stage
        .curate(
            std::path::Path::new("/definitely/not/here"),
            0.5,
            true,
            &NullSink,
            &CancellationToken::new(),
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn cancelled_token_stops_scoring() {
    let dir = TempDir::new().unwrap();
    generate_test_library(dir.path(), 3).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = stage(FixedScoreMetric::new(&[("img_00.jpg", 1.0)], false))
        .curate(dir.path(), 1.0, true, &NullSink, &cancel)
        .await
        .unwrap();

    assert_eq!(outcome.found, 3);
    assert!(outcome.selected.is_empty());
}
