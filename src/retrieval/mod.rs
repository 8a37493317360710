// Retrieval module
// Primary and keyword similarity queries merged into a ranked, banded context

#[cfg(test)]
mod tests;

pub mod context;

use futures::future::join_all;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::database::{Database, Match, RecordFilter, VectorIndex};
use crate::embeddings::Embedder;
pub use context::RetrievedContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Matches requested for the full question
    pub primary_top_k: usize,
    /// Matches requested for each keyword
    pub keyword_top_k: usize,
    pub max_keywords: usize,
    /// Keywords must be longer than this many characters
    pub min_keyword_length: usize,
    /// Matches kept after merging
    pub context_limit: usize,
    pub high_relevance_count: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            primary_top_k: 50,
            keyword_top_k: 20,
            max_keywords: 3,
            min_keyword_length: 3,
            context_limit: 30,
            high_relevance_count: 15,
        }
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        for top_k in [self.primary_top_k, self.keyword_top_k] {
            if !(1..=1000).contains(&top_k) {
                return Err(ConfigError::InvalidTopK(top_k));
            }
        }

        if self.max_keywords > 10 {
            return Err(ConfigError::InvalidKeywordCount(self.max_keywords));
        }

        if !(1..=200).contains(&self.context_limit) {
            return Err(ConfigError::InvalidContextLimit(self.context_limit));
        }

        if self.high_relevance_count > self.context_limit {
            return Err(ConfigError::HighRelevanceExceedsLimit(
                self.high_relevance_count,
                self.context_limit,
            ));
        }

        Ok(())
    }
}

/// Outcome of a retrieval that reached the index
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// The primary query matched nothing
    NoMatches,
    Found(RetrievedContext),
}

/// Keywords for secondary queries: lowercased words with non-word characters
/// removed, longer than `min_length`, at most `max_keywords` distinct ones
#[inline]
pub fn extract_keywords(query: &str, min_length: usize, max_keywords: usize) -> Vec<String> {
    let cleaned: String = query
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .filter(|word| word.len() > min_length)
        .unique()
        .take(max_keywords)
        .map(ToString::to_string)
        .collect()
}

/// Concatenate match lists, keep the first occurrence of each id and sort by
/// descending score; equal scores keep their original order
#[inline]
pub fn merge_matches(lists: impl IntoIterator<Item = Vec<Match>>) -> Vec<Match> {
    let mut merged: Vec<Match> = lists
        .into_iter()
        .flatten()
        .unique_by(|m| m.id.clone())
        .collect();
    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged
}

#[derive(Clone)]
pub struct Retriever {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    registry: Option<Database>,
    config: RetrievalConfig,
}

impl std::fmt::Debug for Retriever {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    #[inline]
    pub fn new(
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        registry: Option<Database>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            registry,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Document to restrict retrieval to: the requested one, else the active one
    ///
    /// An active document with no records left in the index is ignored, so a
    /// registry that fell behind the index never hides the indexed chunks.
    #[inline]
    pub async fn resolve_document(&self, requested: Option<&str>) -> Option<String> {
        if let Some(document_id) = requested.map(str::trim).filter(|id| !id.is_empty()) {
            return Some(document_id.to_string());
        }

        let registry = self.registry.as_ref()?;
        match registry.active_document().await {
            Ok(Some(document)) => {
                let filter = RecordFilter::document(document.document_id.as_str());
                match self.index.count_matching(&filter).await {
                    Ok(0) => {
                        warn!(
                            "Active document {} has no indexed records, searching the whole index",
                            document.document_id
                        );
                        None
                    }
                    Ok(_) | Err(_) => {
                        info!(
                            "No document id provided, using active document {}",
                            document.document_id
                        );
                        Some(document.document_id)
                    }
                }
            }
            Ok(None) => {
                debug!("No active document recorded");
                None
            }
            Err(e) => {
                warn!("Failed to read active document: {:#}", e);
                None
            }
        }
    }

    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        document_id: Option<&str>,
    ) -> crate::Result<Retrieval> {
        let filter = self
            .resolve_document(document_id)
            .await
            .map(RecordFilter::document);
        let filter = filter.as_ref();

        let keywords = extract_keywords(
            query,
            self.config.min_keyword_length,
            self.config.max_keywords,
        );
        debug!("Retrieving for {:?} with keywords {:?}", query, keywords);

        let query_embedding = self.embedder.embed(query).await;
        let primary = self
            .index
            .query(&query_embedding.values, filter, self.config.primary_top_k);

        let keyword_queries = keywords
            .iter()
            .map(|keyword| self.keyword_matches(keyword, filter));

        let (primary, keyword_matches) = futures::join!(primary, join_all(keyword_queries));
        let primary = primary?;

        if primary.is_empty() {
            info!("Primary query returned no matches");
            return Ok(Retrieval::NoMatches);
        }

        let primary_count = primary.len();
        let merged = merge_matches(std::iter::once(primary).chain(keyword_matches));
        debug!(
            "Merged {} primary matches into {} unique matches",
            primary_count,
            merged.len()
        );

        Ok(Retrieval::Found(RetrievedContext::from_ranked(
            merged,
            self.config.context_limit,
            self.config.high_relevance_count,
        )))
    }

    async fn keyword_matches(&self, keyword: &str, filter: Option<&RecordFilter>) -> Vec<Match> {
        let embedding = self.embedder.embed(keyword).await;
        match self
            .index
            .query(&embedding.values, filter, self.config.keyword_top_k)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Keyword query for {:?} failed: {}", keyword, e);
                Vec::new()
            }
        }
    }
}
