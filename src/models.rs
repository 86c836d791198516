//! Core data models used throughout the targeting harness.
//!
//! These types represent the catalog entries, campaign requests, ranked
//! features, and segments that flow through the retrieval and segmentation
//! pipeline.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::MAX_SCHEDULE_DAYS;
use crate::error::TargetingError;

/// Metric used when the request carries none.
pub const DEFAULT_METRIC: &str = "인입률";

/// Most sends a single campaign may schedule. Each send is one segment.
pub const MAX_FREQUENCY: i64 = 365;

/// Direction of a behavioural signal over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increase,
    Flat,
    Decrease,
}

impl Trend {
    pub const ALL: [Trend; 3] = [Trend::Increase, Trend::Flat, Trend::Decrease];

    pub fn label(&self) -> &'static str {
        match self {
            Trend::Increase => "증가",
            Trend::Flat => "유지",
            Trend::Decrease => "감소",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Population qualifier combined with an archetype to form a feature instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceTag {
    SeoulRegion,
    MzGeneration,
    OfficeWorkers,
    HighIncome,
    Trendsetters,
}

impl AudienceTag {
    /// Catalog order. A tag's position here is its `tag_index`.
    pub const ALL: [AudienceTag; 5] = [
        AudienceTag::SeoulRegion,
        AudienceTag::MzGeneration,
        AudienceTag::OfficeWorkers,
        AudienceTag::HighIncome,
        AudienceTag::Trendsetters,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AudienceTag::SeoulRegion => "서울권",
            AudienceTag::MzGeneration => "MZ세대",
            AudienceTag::OfficeWorkers => "직장인",
            AudienceTag::HighIncome => "고소득층",
            AudienceTag::Trendsetters => "트렌드세터",
        }
    }
}

/// A count paired with its display unit, e.g. `42회` or `180분/일`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: u32,
    pub unit: String,
}

impl Quantity {
    pub fn new(value: u32, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

/// Simulated quantitative evidence attached to a feature instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signals {
    pub occurrences: Quantity,
    pub duration: Quantity,
    pub recency_days: u32,
    pub trend_weekly: Trend,
    pub trend_monthly: Trend,
}

/// One addressable targeting feature: an archetype crossed with an audience tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureInstance {
    /// `archetype_index * tag_count + tag_index`.
    pub id: usize,
    /// Display name, `"{archetype} ({tag})"`.
    pub name: String,
    pub archetype: String,
    pub tag: AudienceTag,
    pub category: String,
    /// Observable behaviour backing the feature.
    pub evidence: String,
    pub signals: Signals,
}

/// Locally assembled explanation of why a feature matched.
///
/// Every field is copied from the feature's stored metadata; nothing here
/// is inferred from the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Justification {
    pub evidence: String,
    pub occurrences: Quantity,
    pub duration: Quantity,
    pub recency_days: u32,
    pub trend_weekly: Trend,
    pub trend_monthly: Trend,
}

impl Justification {
    pub fn from_feature(feature: &FeatureInstance) -> Self {
        let s = &feature.signals;
        Self {
            evidence: feature.evidence.clone(),
            occurrences: s.occurrences.clone(),
            duration: s.duration.clone(),
            recency_days: s.recency_days,
            trend_weekly: s.trend_weekly,
            trend_monthly: s.trend_monthly,
        }
    }

    /// First clause of the rendered justification: where the behaviour occurs.
    pub fn summary(&self) -> String {
        format!("주요 행동 발생처: {}", self.evidence)
    }
}

impl fmt::Display for Justification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        writeln!(
            f,
            "정량 지표: 발생 {} / 이용시간 {} / 최근 {}일 전 발생",
            self.occurrences, self.duration, self.recency_days
        )?;
        write!(
            f,
            "추세 분석: 최근 1주일 {} / 최근 1달 {} 추세",
            self.trend_weekly, self.trend_monthly
        )
    }
}

/// A catalog entry scored against a campaign request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFeatureResult {
    pub id: usize,
    pub name: String,
    pub category: String,
    /// `1 / (1 + distance)` rounded to 4 places; in `(0, 1]`.
    pub similarity: f64,
    pub justification: Justification,
}

/// Flat key/value rendering of a [`RankedFeatureResult`] for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub id: usize,
    pub name: String,
    pub category: String,
    pub similarity: f64,
    pub justification: String,
}

impl From<&RankedFeatureResult> for FeatureRow {
    fn from(r: &RankedFeatureResult) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            category: r.category.clone(),
            similarity: r.similarity,
            justification: r.justification.to_string(),
        }
    }
}

/// A quota- and date-assigned audience slice for one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 1-based ordinal.
    pub index: usize,
    pub name: String,
    pub traits: String,
    pub volume: u64,
    pub send_date: NaiveDate,
}

/// Structured campaign request, as produced by the extraction step.
///
/// Only constructible through validation: [`CampaignRequest::new`] or
/// deserialization, which routes through the same checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CampaignRequestInput")]
pub struct CampaignRequest {
    product: String,
    metric: String,
    metric_defaulted: bool,
    target_count: String,
    frequency: u32,
    start_days: u32,
    duration_days: u32,
}

/// Wire shape accepted for a [`CampaignRequest`] before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignRequestInput {
    pub product: String,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub target_count: String,
    #[serde(default = "default_frequency")]
    pub frequency: i64,
    #[serde(default = "default_start_days")]
    pub start_days: i64,
    #[serde(default = "default_duration_days")]
    pub duration_days: i64,
}

fn default_frequency() -> i64 {
    1
}
fn default_start_days() -> i64 {
    7
}
fn default_duration_days() -> i64 {
    1
}

impl TryFrom<CampaignRequestInput> for CampaignRequest {
    type Error = TargetingError;

    fn try_from(input: CampaignRequestInput) -> Result<Self, Self::Error> {
        let mut req = CampaignRequest::new(
            &input.product,
            input.metric.as_deref().unwrap_or_default(),
            &input.target_count,
            input.frequency,
        )?;
        req = req.with_schedule(input.start_days, input.duration_days)?;
        Ok(req)
    }
}

impl CampaignRequest {
    /// Validate and build a request.
    ///
    /// An empty or `N/A` metric falls back to [`DEFAULT_METRIC`] and sets
    /// [`metric_defaulted`](Self::metric_defaulted). A frequency outside
    /// `1..=MAX_FREQUENCY` or an empty product is rejected.
    pub fn new(
        product: &str,
        metric: &str,
        target_count: &str,
        frequency: i64,
    ) -> Result<Self, TargetingError> {
        let product = product.trim();
        if product.is_empty() {
            return Err(TargetingError::InvalidRequest(
                "product must not be empty".to_string(),
            ));
        }
        if frequency < 1 {
            return Err(TargetingError::InvalidRequest(format!(
                "frequency must be >= 1, got {}",
                frequency
            )));
        }
        if frequency > MAX_FREQUENCY {
            return Err(TargetingError::InvalidRequest(format!(
                "frequency must be <= {}, got {}",
                MAX_FREQUENCY, frequency
            )));
        }
        let frequency = frequency as u32;

        let metric = metric.trim();
        let (metric, metric_defaulted) = if metric.is_empty() || metric == "N/A" {
            (DEFAULT_METRIC.to_string(), true)
        } else {
            (metric.to_string(), false)
        };

        Ok(Self {
            product: product.to_string(),
            metric,
            metric_defaulted,
            target_count: target_count.trim().to_string(),
            frequency,
            start_days: default_start_days() as u32,
            duration_days: default_duration_days() as u32,
        })
    }

    /// Set the campaign start offset (days from today) and duration in days.
    /// Both are capped at [`MAX_SCHEDULE_DAYS`].
    pub fn with_schedule(
        mut self,
        start_days: i64,
        duration_days: i64,
    ) -> Result<Self, TargetingError> {
        let start_days = u32::try_from(start_days)
            .ok()
            .filter(|d| *d <= MAX_SCHEDULE_DAYS)
            .ok_or_else(|| {
                TargetingError::InvalidRequest(format!(
                    "start_days must be in 0..={}, got {}",
                    MAX_SCHEDULE_DAYS, start_days
                ))
            })?;
        let duration_days = u32::try_from(duration_days)
            .ok()
            .filter(|d| (1..=MAX_SCHEDULE_DAYS).contains(d))
            .ok_or_else(|| {
                TargetingError::InvalidRequest(format!(
                    "duration_days must be in 1..={}, got {}",
                    MAX_SCHEDULE_DAYS, duration_days
                ))
            })?;
        self.start_days = start_days;
        self.duration_days = duration_days;
        Ok(self)
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn metric_defaulted(&self) -> bool {
        self.metric_defaulted
    }

    /// Free-form audience size, e.g. `"100만명"` or `"50,000"`.
    pub fn target_count(&self) -> &str {
        &self.target_count
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn start_days(&self) -> u32 {
        self.start_days
    }

    pub fn duration_days(&self) -> u32 {
        self.duration_days
    }

    /// Campaign run window relative to `today`.
    pub fn window(&self, today: NaiveDate) -> CampaignWindow {
        let offset = |date: NaiveDate, days: i64| {
            date.checked_add_signed(Duration::days(days)).unwrap_or(NaiveDate::MAX)
        };
        let start = offset(today, i64::from(self.start_days));
        let end = offset(start, i64::from(self.duration_days) - 1);
        CampaignWindow { start, end }
    }
}

/// Inclusive date range a campaign runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CampaignWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for CampaignWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start.format("%Y-%m-%d"))
        } else {
            write!(
                f,
                "{} ~ {}",
                self.start.format("%Y-%m-%d"),
                self.end.format("%Y-%m-%d")
            )
        }
    }
}
