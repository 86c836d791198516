//! One-shot process bootstrap: catalog → embeddings → index → services.
//!
//! The [`Engine`] owns the read-only retrieval service and the stateless
//! segmenter for the lifetime of the process. Cloning is cheap; the index
//! is shared behind an `Arc`.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::catalog::build_catalog_for;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::generation::{create_generator, SegmentGenerator};
use crate::index::FeatureIndex;
use crate::models::{CampaignRequest, RankedFeatureResult};
use crate::retrieval::FeatureSearch;
use crate::segmentation::{SegmentationReport, Segmenter};

#[derive(Clone)]
pub struct Engine {
    search: FeatureSearch,
    segmenter: Segmenter,
    top_k: usize,
}

impl Engine {
    /// Build the catalog and index from `config` and wire up both services.
    ///
    /// # Errors
    ///
    /// Fails if a provider cannot be created or the index cannot be built.
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        let provider: Arc<dyn EmbeddingProvider> = Arc::from(
            create_provider(&config.embedding).context("Failed to create embedding provider")?,
        );
        let generator: Arc<dyn SegmentGenerator> = Arc::from(
            create_generator(&config.generation)
                .context("Failed to create generation provider")?,
        );

        let catalog = build_catalog_for(config);
        let index = FeatureIndex::build(catalog, provider.as_ref())
            .await
            .context("Failed to build similarity index")?;

        Ok(Self::from_parts(
            FeatureSearch::new(Arc::new(index), provider),
            Segmenter::new(generator, config.segmentation.clone()),
            config.retrieval.top_k,
        ))
    }

    pub fn from_parts(search: FeatureSearch, segmenter: Segmenter, top_k: usize) -> Self {
        Self {
            search,
            segmenter,
            top_k,
        }
    }

    pub fn search(&self) -> &FeatureSearch {
        &self.search
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve the configured top-k features for `request`.
    pub async fn rank(
        &self,
        request: &CampaignRequest,
    ) -> crate::error::Result<Vec<RankedFeatureResult>> {
        self.search.search_and_reason(request, self.top_k).await
    }

    /// Rank, then segment, in one pass.
    pub async fn plan(
        &self,
        request: &CampaignRequest,
    ) -> crate::error::Result<(Vec<RankedFeatureResult>, SegmentationReport)> {
        let ranked = self.rank(request).await?;
        let report = self.segmenter.process_segmentation(request, &ranked).await;
        Ok((ranked, report))
    }
}
