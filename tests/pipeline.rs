//! End-to-end tests for the retrieval and segmentation pipeline.
//!
//! Generators are swapped for in-process mocks so every fallback path can be
//! driven without a network service.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;

use targeting_harness::catalog::{build_catalog, build_catalog_for};
use targeting_harness::config::{Config, SegmentationConfig};
use targeting_harness::embedding::{EmbeddingProvider, HashingProvider};
use targeting_harness::engine::Engine;
use targeting_harness::error::{Result, TargetingError};
use targeting_harness::generation::{
    parse_segments_response, RawSegment, SegmentBrief, SegmentGenerator,
};
use targeting_harness::index::FeatureIndex;
use targeting_harness::models::CampaignRequest;
use targeting_harness::retrieval::FeatureSearch;
use targeting_harness::segmentation::Segmenter;

// ─── Mock generators ────────────────────────────────────────────────

/// Returns exactly `brief.segment_count` well-formed segments.
struct EchoGenerator;

#[async_trait]
impl SegmentGenerator for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, brief: &SegmentBrief) -> Result<Vec<RawSegment>> {
        Ok((1..=brief.segment_count)
            .map(|i| RawSegment {
                name: format!("세그먼트 {}", i),
                traits: format!("{} 관심 고객 {}", brief.product, i),
            })
            .collect())
    }
}

/// Always fails, as a timed-out or unreachable service would.
struct FailingGenerator;

#[async_trait]
impl SegmentGenerator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _brief: &SegmentBrief) -> Result<Vec<RawSegment>> {
        Err(TargetingError::GenerationService(
            "connection refused".to_string(),
        ))
    }
}

/// Returns a fixed number of segments regardless of the brief.
struct FixedCountGenerator(usize);

#[async_trait]
impl SegmentGenerator for FixedCountGenerator {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn generate(&self, _brief: &SegmentBrief) -> Result<Vec<RawSegment>> {
        Ok((1..=self.0)
            .map(|i| RawSegment {
                name: format!("G{}", i),
                traits: format!("traits {}", i),
            })
            .collect())
    }
}

/// Returns text that does not match the segment schema.
struct GarbageGenerator;

#[async_trait]
impl SegmentGenerator for GarbageGenerator {
    fn name(&self) -> &str {
        "garbage"
    }

    async fn generate(&self, _brief: &SegmentBrief) -> Result<Vec<RawSegment>> {
        parse_segments_response("Sure! Here are some segments: first, second.")
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

async fn engine_with(generator: Arc<dyn SegmentGenerator>) -> Engine {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingProvider::new(256));
    let index = FeatureIndex::build(build_catalog(), provider.as_ref())
        .await
        .unwrap();
    Engine::from_parts(
        FeatureSearch::new(Arc::new(index), provider),
        Segmenter::new(generator, SegmentationConfig::default()),
        20,
    )
}

fn request(target: &str, frequency: i64) -> CampaignRequest {
    CampaignRequest::new("TestPhone", "conversion rate", target, frequency).unwrap()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_four_sends() {
    let engine = engine_with(Arc::new(EchoGenerator)).await;
    let request = request("100만명", 4);

    let ranked = engine.rank(&request).await.unwrap();
    assert_eq!(ranked.len(), 20);

    let report = engine
        .segmenter()
        .process_segmentation_at(&request, &ranked, today())
        .await;

    assert_eq!(report.segments.len(), 4);
    assert!(!report.generation_fallback);
    assert!(!report.target_fallback);
    assert_eq!(report.padded, 0);
    assert_eq!(report.total_count, 1_000_000);

    let offsets: Vec<i64> = report
        .segments
        .iter()
        .map(|s| (s.send_date - today()).num_days())
        .collect();
    assert_eq!(offsets, vec![7, 10, 13, 16]);

    for (i, s) in report.segments.iter().enumerate() {
        assert_eq!(s.index, i + 1);
        assert_eq!(s.volume, 250_000);
        assert_eq!(s.name, format!("세그먼트 {}", i + 1));
    }
}

#[tokio::test]
async fn test_single_send_has_no_spacing() {
    let engine = engine_with(Arc::new(EchoGenerator)).await;
    let request = request("50,000", 1);
    let ranked = engine.rank(&request).await.unwrap();
    let report = engine
        .segmenter()
        .process_segmentation_at(&request, &ranked, today())
        .await;

    assert_eq!(report.segments.len(), 1);
    assert_eq!(report.segments[0].volume, 50_000);
    assert_eq!(report.segments[0].send_date, today() + Duration::days(7));
}

#[tokio::test]
async fn test_generator_failure_falls_back() {
    let engine = engine_with(Arc::new(FailingGenerator)).await;
    let request = request("100만명", 3);
    let ranked = engine.rank(&request).await.unwrap();
    let report = engine
        .segmenter()
        .process_segmentation_at(&request, &ranked, today())
        .await;

    assert!(report.generation_fallback);
    assert_eq!(report.generator, "failing");
    assert_eq!(report.segments.len(), 3);
    for (i, s) in report.segments.iter().enumerate() {
        assert_eq!(s.name, format!("핵심 타겟 그룹 {}", i + 1));
        assert_eq!(s.traits, "TestPhone에 반응도가 높은 핵심 타겟층");
        assert_eq!(s.volume, 333_333);
    }
}

#[tokio::test]
async fn test_unparseable_generator_output_falls_back() {
    let engine = engine_with(Arc::new(GarbageGenerator)).await;
    let request = request("100만명", 2);
    let report = engine
        .segmenter()
        .process_segmentation_at(&request, &[], today())
        .await;

    assert!(report.generation_fallback);
    assert_eq!(report.segments.len(), 2);
    assert_eq!(report.segments[0].name, "핵심 타겟 그룹 1");
}

#[tokio::test]
async fn test_over_production_is_truncated() {
    let engine = engine_with(Arc::new(FixedCountGenerator(7))).await;
    let request = request("100만명", 2);
    let report = engine
        .segmenter()
        .process_segmentation_at(&request, &[], today())
        .await;

    assert_eq!(report.segments.len(), 2);
    assert_eq!(report.segments[1].name, "G2");
    assert_eq!(report.padded, 0);
    assert!(!report.generation_fallback);
}

#[tokio::test]
async fn test_under_production_is_padded() {
    let engine = engine_with(Arc::new(FixedCountGenerator(1))).await;
    let request = request("100만명", 3);
    let report = engine
        .segmenter()
        .process_segmentation_at(&request, &[], today())
        .await;

    assert_eq!(report.segments.len(), 3);
    assert_eq!(report.segments[0].name, "G1");
    assert_eq!(report.segments[1].name, "핵심 타겟 그룹 2");
    assert_eq!(report.segments[2].name, "핵심 타겟 그룹 3");
    assert_eq!(report.padded, 2);
}

#[tokio::test]
async fn test_volume_never_exceeds_total() {
    let engine = engine_with(Arc::new(EchoGenerator)).await;
    for (target, frequency) in [("100만명", 3), ("7", 4), ("1.5만", 7), ("999,999", 10)] {
        let request = request(target, frequency);
        let report = engine
            .segmenter()
            .process_segmentation_at(&request, &[], today())
            .await;
        let n = frequency as u64;
        assert_eq!(report.segments.len() as u64, n);
        assert!(report.total_volume() <= report.total_count);
        assert!(report.total_count - report.total_volume() < n);
        assert!(report
            .segments
            .iter()
            .all(|s| s.volume == report.total_count / n));
    }
}

#[tokio::test]
async fn test_unparseable_target_uses_default() {
    let engine = engine_with(Arc::new(EchoGenerator)).await;
    let request = request("a lot of people", 3);
    let report = engine
        .segmenter()
        .process_segmentation_at(&request, &[], today())
        .await;

    assert!(report.target_fallback);
    assert_eq!(report.total_count, 900_000);
    assert!(report.segments.iter().all(|s| s.volume == 300_000));
}

#[tokio::test]
async fn test_retrieval_results_are_well_formed() {
    let engine = engine_with(Arc::new(EchoGenerator)).await;
    let request = request("100만명", 4);
    let index = engine.search().index().unwrap();

    for k in [1, 5, 20, 75] {
        let results = engine.search().search_and_reason(&request, k).await.unwrap();
        assert_eq!(results.len(), k);
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        for r in &results {
            assert!(r.similarity > 0.0 && r.similarity <= 1.0);
            assert!(index.features().any(|f| f.id == r.id && f.name == r.name));
        }
    }
}

#[tokio::test]
async fn test_retrieval_is_deterministic() {
    let engine = engine_with(Arc::new(EchoGenerator)).await;
    let request = request("100만명", 4);
    let a = engine.rank(&request).await.unwrap();
    let b = engine.rank(&request).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_unbuilt_index_is_reported() {
    let search = FeatureSearch::unbuilt(Arc::new(HashingProvider::new(16)));
    let err = search
        .search_and_reason(&request("100만명", 1), 5)
        .await
        .unwrap_err();
    assert!(matches!(err, TargetingError::IndexNotReady));
}

#[test]
fn test_catalog_identity_stable_across_seeds() {
    let mut seeded = Config::minimal();
    seeded.catalog.seed = Some(7);
    let mut other = Config::minimal();
    other.catalog.seed = Some(8);

    let a = build_catalog_for(&seeded);
    let b = build_catalog_for(&other);
    assert_eq!(a.len(), 75);
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.name, y.name);
        assert_eq!(x.category, y.category);
        assert_eq!(x.evidence, y.evidence);
    }
    assert_eq!(build_catalog_for(&seeded), a);
}

#[test]
fn test_invalid_requests_are_rejected() {
    assert!(matches!(
        CampaignRequest::new("TestPhone", "", "100만명", 0),
        Err(TargetingError::InvalidRequest(_))
    ));
    assert!(matches!(
        CampaignRequest::new("TestPhone", "", "100만명", -3),
        Err(TargetingError::InvalidRequest(_))
    ));
    assert!(matches!(
        CampaignRequest::new("  ", "", "100만명", 2),
        Err(TargetingError::InvalidRequest(_))
    ));
}
