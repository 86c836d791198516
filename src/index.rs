//! In-memory similarity index over the feature catalog.
//!
//! Every feature is embedded once, in a single batch, from a synthesized
//! document text. Queries are exact brute-force scans ranked by squared L2
//! distance (smaller = closer). The index is never mutated after
//! [`FeatureIndex::build`], so it can be shared behind an `Arc` without locks.

use crate::embedding::{embed_query, squared_l2, EmbeddingProvider};
use crate::error::{Result, TargetingError};
use crate::models::FeatureInstance;

struct IndexedFeature {
    feature: FeatureInstance,
    vector: Vec<f32>,
}

pub struct FeatureIndex {
    entries: Vec<IndexedFeature>,
    model: String,
}

/// Text embedded for a feature: name, category, and a one-line narrative.
pub fn document_text(feature: &FeatureInstance) -> String {
    let narrative = format!("{} 분야의 {} 지표입니다.", feature.category, feature.archetype);
    format!(
        "피처명: {}, 카테고리: {}, 설명: {}",
        feature.name, feature.category, narrative
    )
}

impl FeatureIndex {
    /// Embed `features` and build the index.
    ///
    /// # Errors
    ///
    /// [`TargetingError::Embedding`] if the provider fails or returns a
    /// vector count different from the feature count.
    pub async fn build(
        features: Vec<FeatureInstance>,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let texts: Vec<String> = features.iter().map(document_text).collect();
        let vectors = provider
            .embed(&texts)
            .await
            .map_err(|e| TargetingError::Embedding(format!("{:#}", e)))?;

        if vectors.len() != features.len() {
            return Err(TargetingError::Embedding(format!(
                "expected {} vectors, got {}",
                features.len(),
                vectors.len()
            )));
        }

        let entries = features
            .into_iter()
            .zip(vectors)
            .map(|(feature, vector)| IndexedFeature { feature, vector })
            .collect::<Vec<_>>();

        tracing::info!(
            features = entries.len(),
            model = provider.model_name(),
            "similarity index built"
        );

        Ok(Self {
            entries,
            model: provider.model_name().to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name of the embedding model the index was built with.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn features(&self) -> impl Iterator<Item = &FeatureInstance> {
        self.entries.iter().map(|e| &e.feature)
    }

    /// Embed `text` and return the `k` nearest features.
    pub async fn query(
        &self,
        provider: &dyn EmbeddingProvider,
        text: &str,
        k: usize,
    ) -> Result<Vec<(&FeatureInstance, f32)>> {
        let query_vec = embed_query(provider, text)
            .await
            .map_err(|e| TargetingError::Embedding(format!("{:#}", e)))?;
        Ok(self.query_vector(&query_vec, k))
    }

    /// Return the `min(k, len)` nearest features to `query`, ascending by
    /// distance. Equal distances keep catalog order.
    pub fn query_vector(&self, query: &[f32], k: usize) -> Vec<(&FeatureInstance, f32)> {
        let mut scored: Vec<(&FeatureInstance, f32)> = self
            .entries
            .iter()
            .map(|e| (&e.feature, squared_l2(query, &e.vector)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_catalog;
    use crate::embedding::{DisabledProvider, HashingProvider};
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_build_indexes_whole_catalog() {
        let provider = HashingProvider::new(128);
        let index = FeatureIndex::build(build_catalog(), &provider).await.unwrap();
        assert_eq!(index.len(), 75);
        assert_eq!(index.model(), "hashing");
    }

    #[tokio::test]
    async fn test_build_fails_with_disabled_provider() {
        let err = FeatureIndex::build(build_catalog(), &DisabledProvider)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TargetingError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_query_returns_k_distinct_ascending() {
        let provider = HashingProvider::new(128);
        let index = FeatureIndex::build(build_catalog(), &provider).await.unwrap();
        for k in [1, 5, 20, 75] {
            let hits = index.query(&provider, "커피 하이엔드 취향", k).await.unwrap();
            assert_eq!(hits.len(), k);
            let ids: HashSet<usize> = hits.iter().map(|(f, _)| f.id).collect();
            assert_eq!(ids.len(), k);
            for pair in hits.windows(2) {
                assert!(pair[0].1 <= pair[1].1);
            }
            assert!(hits.iter().all(|(_, d)| *d >= 0.0));
        }
    }

    #[tokio::test]
    async fn test_query_k_larger_than_catalog() {
        let provider = HashingProvider::new(64);
        let index = FeatureIndex::build(build_catalog(), &provider).await.unwrap();
        let hits = index.query(&provider, "anything", 500).await.unwrap();
        assert_eq!(hits.len(), 75);
    }

    #[tokio::test]
    async fn test_exact_document_text_is_nearest() {
        let provider = HashingProvider::new(256);
        let catalog = build_catalog();
        let target = catalog[33].clone();
        let index = FeatureIndex::build(catalog, &provider).await.unwrap();
        let hits = index
            .query(&provider, &document_text(&target), 1)
            .await
            .unwrap();
        assert_eq!(hits[0].0.id, target.id);
        assert!(hits[0].1.abs() < 1e-6);
    }

    #[test]
    fn test_query_vector_ties_keep_catalog_order() {
        let features = build_catalog();
        let mut entries: Vec<IndexedFeature> = features
            .into_iter()
            .take(5)
            .map(|feature| IndexedFeature {
                feature,
                vector: vec![1.0, 0.0],
            })
            .collect();
        entries[1].vector = vec![f32::NAN, 0.0];
        let index = FeatureIndex {
            entries,
            model: "fixed".to_string(),
        };

        let hits = index.query_vector(&[1.0, 0.0], 5);
        assert_eq!(hits.len(), 5);
        let finite: Vec<usize> = hits
            .iter()
            .filter(|(_, d)| !d.is_nan())
            .map(|(f, _)| f.id)
            .collect();
        assert_eq!(finite, vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_document_text_shape() {
        let f = &build_catalog()[0];
        let text = document_text(f);
        assert!(text.starts_with("피처명: 얼리어답터 지수 (서울권), 카테고리: "));
        assert!(text.ends_with("얼리어답터 지수 지표입니다."));
    }
}
