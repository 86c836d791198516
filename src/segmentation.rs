//! Quota-constrained segment generation.
//!
//! Given a campaign request and its ranked features, the [`Segmenter`]:
//!
//! 1. parses the free-form target count (falling back to a fixed default),
//! 2. fixes the segment count `N` to the request's send frequency,
//! 3. asks the [`SegmentGenerator`] for `N` names and traits,
//! 4. substitutes deterministic segments for anything the generator could
//!    not provide,
//! 5. allocates `total / N` (floor) volume and a send date to each segment.
//!
//! The generator is the only fallible collaborator, and its failures never
//! leave this module: the report always holds exactly `N` segments.
//!
//! # Schedule
//!
//! ```text
//! send_date[i] = today + lead_time_days + (i mod frequency) * gap
//! gap          = day_spacing   if frequency > 1
//!              = 0             otherwise
//! ```

use chrono::{Duration, Local, NaiveDate};
use serde::Serialize;
use std::sync::Arc;

use crate::config::SegmentationConfig;
use crate::generation::{FeatureContext, RawSegment, SegmentBrief, SegmentGenerator};
use crate::models::{CampaignRequest, RankedFeatureResult, Segment};

/// Audience size used when the target count cannot be parsed.
pub const DEFAULT_TARGET_COUNT: u64 = 900_000;

/// Korean magnitude word for ten thousand.
const TEN_THOUSAND_WORD: &str = "만";
/// Population unit suffix ("people").
const POPULATION_SUFFIX: &str = "명";

/// Parsed audience size and whether the default was substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetCount {
    pub value: u64,
    pub fallback_used: bool,
}

/// Parse a target count with the standard default of 900,000.
///
/// ```rust
/// use targeting_harness::segmentation::parse_target_count;
///
/// assert_eq!(parse_target_count("100만명").value, 1_000_000);
/// assert_eq!(parse_target_count("50,000").value, 50_000);
/// assert!(parse_target_count("garbage").fallback_used);
/// ```
pub fn parse_target_count(raw: &str) -> TargetCount {
    parse_target_count_or(raw, DEFAULT_TARGET_COUNT)
}

/// Parse a target count, substituting `fallback` on any failure.
///
/// Thousands separators and the population suffix are stripped. A string
/// containing the ten-thousand magnitude word is read as a decimal number
/// of ten-thousands and truncated; anything else must be a plain
/// non-negative integer.
pub fn parse_target_count_or(raw: &str, fallback: u64) -> TargetCount {
    match try_parse_target_count(raw) {
        Some(value) => TargetCount {
            value,
            fallback_used: false,
        },
        None => {
            tracing::warn!(raw, fallback, "target count unparseable, using default");
            TargetCount {
                value: fallback,
                fallback_used: true,
            }
        }
    }
}

fn try_parse_target_count(raw: &str) -> Option<u64> {
    let cleaned = raw.replace(',', "").replace(POPULATION_SUFFIX, "");
    let cleaned = cleaned.trim();

    if cleaned.contains(TEN_THOUSAND_WORD) {
        let number: f64 = cleaned.replace(TEN_THOUSAND_WORD, "").trim().parse().ok()?;
        let scaled = number * 10_000.0;
        if !scaled.is_finite() || scaled < 0.0 {
            return None;
        }
        return Some(scaled.trunc() as u64);
    }

    cleaned.parse::<u64>().ok()
}

/// Number of segments for a request: one per send.
pub fn segment_count(frequency: u32) -> usize {
    frequency.max(1) as usize
}

/// Reduce the top `limit` features (by similarity) to name plus justification summary.
pub fn feature_context(ranked: &[RankedFeatureResult], limit: usize) -> Vec<FeatureContext> {
    let mut ordered: Vec<&RankedFeatureResult> = ranked.iter().collect();
    ordered.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    ordered
        .into_iter()
        .take(limit)
        .map(|r| FeatureContext {
            name: r.name.clone(),
            basis: r.justification.summary(),
        })
        .collect()
}

/// Deterministic stand-in for the generator's output, keyed by ordinal only.
pub fn fallback_segment(product: &str, ordinal: usize) -> RawSegment {
    RawSegment {
        name: format!("핵심 타겟 그룹 {}", ordinal),
        traits: format!("{}에 반응도가 높은 핵심 타겟층", product),
    }
}

pub fn fallback_segments(product: &str, n: usize) -> Vec<RawSegment> {
    (1..=n).map(|i| fallback_segment(product, i)).collect()
}

/// Truncate or pad `raw` to exactly `n` entries.
///
/// Extra entries are dropped. Missing ordinals, and entries with a blank
/// name or traits, are replaced by [`fallback_segment`]. Returns the fitted
/// list and how many slots were filled from the fallback.
pub fn fit_to_count(raw: Vec<RawSegment>, product: &str, n: usize) -> (Vec<RawSegment>, usize) {
    let mut substituted = 0;
    let mut fitted: Vec<RawSegment> = raw
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(i, seg)| {
            if seg.name.trim().is_empty() || seg.traits.trim().is_empty() {
                substituted += 1;
                fallback_segment(product, i + 1)
            } else {
                RawSegment {
                    name: seg.name.trim().to_string(),
                    traits: seg.traits.trim().to_string(),
                }
            }
        })
        .collect();

    while fitted.len() < n {
        substituted += 1;
        fitted.push(fallback_segment(product, fitted.len() + 1));
    }

    (fitted, substituted)
}

/// Send date for 0-based segment `i`. Saturates at [`NaiveDate::MAX`].
pub fn send_date(base: NaiveDate, i: usize, frequency: u32, day_spacing: u32) -> NaiveDate {
    let frequency = frequency.max(1);
    let gap = if frequency > 1 { day_spacing } else { 0 };
    let slot = (i % frequency as usize) as i64;
    add_days(base, slot.saturating_mul(i64::from(gap)))
}

fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|d| date.checked_add_signed(d))
        .unwrap_or(NaiveDate::MAX)
}

/// Attach floor-divided volumes and send dates to fitted segments.
pub fn allocate(
    raw: Vec<RawSegment>,
    total: u64,
    frequency: u32,
    today: NaiveDate,
    config: &SegmentationConfig,
) -> Vec<Segment> {
    if raw.is_empty() {
        return Vec::new();
    }
    let volume = total / raw.len() as u64;
    let base = add_days(today, i64::from(config.lead_time_days));

    raw.into_iter()
        .enumerate()
        .map(|(i, seg)| Segment {
            index: i + 1,
            name: seg.name,
            traits: seg.traits,
            volume,
            send_date: send_date(base, i, frequency, config.day_spacing),
        })
        .collect()
}

/// Outcome of one segmentation run.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentationReport {
    pub segments: Vec<Segment>,
    /// Parsed audience size before division.
    pub total_count: u64,
    /// The target count string was unparseable and the default was used.
    pub target_fallback: bool,
    /// The generator failed and every segment is a fallback.
    pub generation_fallback: bool,
    /// Slots filled from the fallback after a successful generator call.
    pub padded: usize,
    /// Generator that was consulted.
    pub generator: String,
}

impl SegmentationReport {
    pub fn total_volume(&self) -> u64 {
        self.segments.iter().map(|s| s.volume).sum()
    }
}

/// Segmentation service. Stateless across calls.
#[derive(Clone)]
pub struct Segmenter {
    generator: Arc<dyn SegmentGenerator>,
    config: SegmentationConfig,
}

impl Segmenter {
    pub fn new(generator: Arc<dyn SegmentGenerator>, config: SegmentationConfig) -> Self {
        Self { generator, config }
    }

    /// Segment `request` with send dates relative to the local date.
    pub async fn process_segmentation(
        &self,
        request: &CampaignRequest,
        ranked: &[RankedFeatureResult],
    ) -> SegmentationReport {
        self.process_segmentation_at(request, ranked, Local::now().date_naive())
            .await
    }

    /// Segment `request` with send dates relative to `today`.
    pub async fn process_segmentation_at(
        &self,
        request: &CampaignRequest,
        ranked: &[RankedFeatureResult],
        today: NaiveDate,
    ) -> SegmentationReport {
        let target =
            parse_target_count_or(request.target_count(), self.config.fallback_target_count);
        let n = segment_count(request.frequency());

        let brief = SegmentBrief {
            product: request.product().to_string(),
            total_count: target.value,
            frequency: request.frequency(),
            segment_count: n,
            features: feature_context(ranked, self.config.context_features),
            name_max_chars: self.config.name_max_chars,
            traits_max_chars: self.config.traits_max_chars,
            traits_max_lines: self.config.traits_max_lines,
        };

        let (raw, generation_fallback) = match self.generator.generate(&brief).await {
            Ok(raw) => (raw, false),
            Err(e) => {
                tracing::warn!(
                    generator = self.generator.name(),
                    error = %e,
                    "segment generation failed, using fallback segments"
                );
                (fallback_segments(request.product(), n), true)
            }
        };

        if raw.len() > n {
            tracing::debug!(returned = raw.len(), n, "generator over-produced, truncating");
        }
        let (fitted, substituted) = fit_to_count(raw, request.product(), n);
        let padded = if generation_fallback { 0 } else { substituted };
        if padded > 0 {
            tracing::warn!(padded, n, "generator under-produced, padded with fallback segments");
        }

        let segments = allocate(fitted, target.value, request.frequency(), today, &self.config);

        SegmentationReport {
            segments,
            total_count: target.value,
            target_fallback: target.fallback_used,
            generation_fallback,
            padded,
            generator: self.generator.name().to_string(),
        }
    }
}

/// Print a segmentation report as a schedule table.
pub fn print_segments(report: &SegmentationReport) {
    println!(
        "{:<4} {:<24} {:>12} {:<10}  TRAITS",
        "NO", "NAME", "VOLUME", "SEND DATE"
    );
    for s in &report.segments {
        println!(
            "{:<4} {:<24} {:>12} {:<10}  {}",
            s.index,
            s.name,
            s.volume,
            s.send_date.format("%Y-%m-%d"),
            s.traits.replace('\n', " ")
        );
    }
    println!();
    println!(
        "total {} of {} (generator: {}{})",
        report.total_volume(),
        report.total_count,
        report.generator,
        if report.generation_fallback {
            ", fallback segments"
        } else {
            ""
        }
    );
    if report.target_fallback {
        println!("note: target count unparseable; used {}", report.total_count);
    }
}
