//! Feature retrieval with locally synthesized justifications.
//!
//! A [`CampaignRequest`] becomes a query string, the query becomes the top-k
//! nearest catalog features, and each hit gets a similarity score and a
//! [`Justification`] assembled from the feature's own metadata.
//!
//! # Similarity
//!
//! ```text
//! similarity = round4(1 / (1 + distance))
//! ```
//!
//! Distance 0 maps to 1.0; larger distances map to smaller scores. The
//! result is floored at `0.0001` so rounding never produces 0.

use std::sync::Arc;

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::engine::Engine;
use crate::error::{Result, TargetingError};
use crate::index::FeatureIndex;
use crate::models::{
    CampaignRequest, FeatureInstance, FeatureRow, Justification, RankedFeatureResult,
};

/// Smallest reportable similarity after rounding.
const MIN_SIMILARITY: f64 = 0.0001;

/// Retrieval service bound to one index and the provider that built it.
#[derive(Clone)]
pub struct FeatureSearch {
    index: Option<Arc<FeatureIndex>>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl FeatureSearch {
    pub fn new(index: Arc<FeatureIndex>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            index: Some(index),
            provider,
        }
    }

    /// A search service with no index behind it. Every query fails with
    /// [`TargetingError::IndexNotReady`].
    pub fn unbuilt(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            index: None,
            provider,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Result<&FeatureIndex> {
        self.index.as_deref().ok_or(TargetingError::IndexNotReady)
    }

    /// Retrieve the `k` features closest to the request and justify each.
    ///
    /// Results are sorted by similarity descending; ties keep retrieval order.
    pub async fn search_and_reason(
        &self,
        request: &CampaignRequest,
        k: usize,
    ) -> Result<Vec<RankedFeatureResult>> {
        let index = self.index()?;
        let query = query_text(request);

        let hits = index.query(self.provider.as_ref(), &query, k).await?;
        tracing::debug!(query = %query, k, hits = hits.len(), "feature query");

        let mut results: Vec<RankedFeatureResult> = hits
            .into_iter()
            .map(|(feature, distance)| rank(feature, distance))
            .collect();

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        Ok(results)
    }
}

/// Query text built from the request's product and success metric.
pub fn query_text(request: &CampaignRequest) -> String {
    format!(
        "상품: {}, 마케팅 성공 지표: {}",
        request.product(),
        request.metric()
    )
}

/// Map a non-negative distance into `(0, 1]`, rounded to 4 decimal places.
pub fn similarity_from_distance(distance: f32) -> f64 {
    let d = if distance.is_nan() {
        f64::INFINITY
    } else {
        f64::from(distance.max(0.0))
    };
    let raw = 1.0 / (1.0 + d);
    ((raw * 10_000.0).round() / 10_000.0).max(MIN_SIMILARITY)
}

fn rank(feature: &FeatureInstance, distance: f32) -> RankedFeatureResult {
    RankedFeatureResult {
        id: feature.id,
        name: feature.name.clone(),
        category: feature.category.clone(),
        similarity: similarity_from_distance(distance),
        justification: Justification::from_feature(feature),
    }
}

/// Rank features for one request and print them (`tgt features`).
pub async fn run_features(
    config: &Config,
    request: &CampaignRequest,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let engine = Engine::bootstrap(config).await?;
    let k = limit.unwrap_or(engine.top_k());
    let results = engine.search().search_and_reason(request, k).await?;

    if json {
        let rows: Vec<FeatureRow> = results.iter().map(FeatureRow::from).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_features(&results);
    }
    Ok(())
}

/// Print ranked features as numbered entries with their justification.
pub fn print_features(results: &[RankedFeatureResult]) {
    if results.is_empty() {
        println!("No features.");
        return;
    }

    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} / {}",
            i + 1,
            r.similarity,
            r.name,
            r.category
        );
        for line in r.justification.to_string().lines() {
            println!("    {}", line);
        }
        println!("    id: {}", r.id);
        println!();
    }
}
