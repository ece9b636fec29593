//! Hybrid Retriever (spec §4.H): dense + lexical search fused with
//! Reciprocal Rank Fusion, grouped by document, with an optional
//! reranking pass.
//!
//! The RRF formula and grouping/tie-break rules are implemented
//! directly from spec.md §4.H; the teacher's `workspace::search` shows
//! the same "embed query, delegate both searches to the repository,
//! fuse" shape (its actual fusion math lives in a repository body that
//! was not part of the retrieval pack), so the control flow here
//! mirrors that call sequence while the RRF math itself is this
//! crate's own.

pub mod reranker;

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::embedder::EmbeddingProvider;
use crate::error::RetrieverError;
use crate::store::{Repository, SearchFilters};

pub use reranker::Reranker;

/// `k_rrf` per spec §4.H.
const K_RRF: f64 = 60.0;

const K_DENSE: usize = 50;
const K_LEX: usize = 50;
/// Chunks kept after fusion, before grouping by document.
const FUSION_TOP_N: usize = 100;

#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub chunk_id: Uuid,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct RankedDocument {
    pub document_id: Uuid,
    pub score: f64,
    pub chunks: Vec<RankedChunk>,
}

pub struct HybridRetriever {
    store: Arc<Repository>,
    embeddings: Arc<dyn EmbeddingProvider>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl HybridRetriever {
    pub fn new(store: Arc<Repository>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embeddings,
            reranker: None,
        }
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// `search(space_id, query, filters, k) -> RankedDocument[]`.
    pub async fn search(
        &self,
        space_id: Uuid,
        query: &str,
        filters: &SearchFilters,
        k: usize,
    ) -> Result<Vec<RankedDocument>, RetrieverError> {
        let query_embedding = self
            .embeddings
            .embed(query)
            .await
            .map_err(|e| RetrieverError::Reranker(e.to_string()))?;

        let dense_hits = self
            .store
            .search_dense(space_id, &query_embedding, filters, K_DENSE)
            .await?;
        let lexical_hits = self.store.search_lexical(space_id, query, filters, K_LEX).await?;

        let (fused, lexical_rank) = fuse_rrf(&dense_hits, &lexical_hits, FUSION_TOP_N);
        let chunk_ids: Vec<Uuid> = fused.iter().map(|(id, _)| *id).collect();
        let chunks = self.store.get_chunks(&chunk_ids).await?;
        let chunk_by_id: HashMap<Uuid, _> = chunks.into_iter().map(|c| (c.id, c)).collect();

        let mut grouped = group_by_document(&fused, &chunk_by_id, &lexical_rank);

        if let Some(ref reranker) = self.reranker {
            if let Err(e) = rerank(reranker.as_ref(), query, &chunk_by_id, &mut grouped).await {
                tracing::warn!(error = %e, "reranker failed, falling back to RRF order");
            }
        }

        grouped.truncate(k);
        Ok(grouped)
    }
}

/// Fuse two ranked lists by `score(c) = Σ 1 / (k_rrf + rank_i)`, ranks
/// being 1-based positions; a chunk missing from a list contributes 0
/// for that list rather than using an infinite rank. Also returns each
/// chunk's lexical rank (1-based, absent if it never appeared in the
/// lexical hits), which `group_by_document` needs for the document-level
/// tie-break.
fn fuse_rrf(
    dense_hits: &[(Uuid, f32)],
    lexical_hits: &[(Uuid, f32)],
    top_n: usize,
) -> (Vec<(Uuid, f64)>, HashMap<Uuid, usize>) {
    let mut scores: HashMap<Uuid, f64> = HashMap::new();
    let mut lexical_rank: HashMap<Uuid, usize> = HashMap::new();

    for (rank, (id, _)) in dense_hits.iter().enumerate() {
        *scores.entry(*id).or_insert(0.0) += 1.0 / (K_RRF + (rank + 1) as f64);
    }
    for (rank, (id, _)) in lexical_hits.iter().enumerate() {
        *scores.entry(*id).or_insert(0.0) += 1.0 / (K_RRF + (rank + 1) as f64);
        lexical_rank.insert(*id, rank + 1);
    }

    let mut ranked: Vec<(Uuid, f64)> = scores.into_iter().collect();
    // Tie-break: higher lexical rank (i.e. smaller rank number) wins,
    // then smaller document/chunk id for determinism.
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ra = lexical_rank.get(&a.0).copied().unwrap_or(usize::MAX);
                let rb = lexical_rank.get(&b.0).copied().unwrap_or(usize::MAX);
                ra.cmp(&rb)
            })
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(top_n);
    (ranked, lexical_rank)
}

/// Groups fused chunks by document, summing chunk scores into a document
/// score. Ties on document score are broken by the document's best (i.e.
/// smallest) lexical rank across its chunks, matching the per-chunk
/// tie-break `fuse_rrf` uses, before finally falling back to document id.
fn group_by_document(
    fused: &[(Uuid, f64)],
    chunk_by_id: &HashMap<Uuid, crate::store::Chunk>,
    lexical_rank: &HashMap<Uuid, usize>,
) -> Vec<RankedDocument> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut by_doc: HashMap<Uuid, RankedDocument> = HashMap::new();
    let mut best_lexical_rank: HashMap<Uuid, usize> = HashMap::new();

    for (chunk_id, score) in fused {
        let Some(chunk) = chunk_by_id.get(chunk_id) else {
            continue;
        };
        let entry = by_doc.entry(chunk.document_id).or_insert_with(|| {
            order.push(chunk.document_id);
            RankedDocument {
                document_id: chunk.document_id,
                score: 0.0,
                chunks: Vec::new(),
            }
        });
        entry.score += score;
        entry.chunks.push(RankedChunk {
            chunk_id: *chunk_id,
            score: *score,
        });

        let rank = lexical_rank.get(chunk_id).copied().unwrap_or(usize::MAX);
        best_lexical_rank
            .entry(chunk.document_id)
            .and_modify(|best| *best = (*best).min(rank))
            .or_insert(rank);
    }

    let mut docs: Vec<RankedDocument> = order.into_iter().filter_map(|id| by_doc.remove(&id)).collect();
    docs.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ra = best_lexical_rank.get(&a.document_id).copied().unwrap_or(usize::MAX);
                let rb = best_lexical_rank.get(&b.document_id).copied().unwrap_or(usize::MAX);
                ra.cmp(&rb)
            })
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    docs
}

async fn rerank(
    reranker: &dyn Reranker,
    query: &str,
    chunk_by_id: &HashMap<Uuid, crate::store::Chunk>,
    grouped: &mut Vec<RankedDocument>,
) -> Result<(), RetrieverError> {
    let mut candidates = Vec::with_capacity(grouped.len());
    for doc in grouped.iter() {
        let concatenated = doc
            .chunks
            .iter()
            .filter_map(|c| chunk_by_id.get(&c.chunk_id))
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        candidates.push((doc.document_id, concatenated));
    }

    let scores = reranker.rerank(query, &candidates).await?;
    for doc in grouped.iter_mut() {
        if let Some(score) = scores.get(&doc.document_id) {
            doc.score = *score;
        }
    }
    grouped.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn fuse_rrf_sums_reciprocal_ranks() {
        let a = uuid(1);
        let b = uuid(2);
        let dense = vec![(a, 0.9), (b, 0.5)];
        let lexical = vec![(b, 2.0), (a, 1.0)];

        let (fused, _) = fuse_rrf(&dense, &lexical, 10);
        let score_a = fused.iter().find(|(id, _)| *id == a).unwrap().1;
        let score_b = fused.iter().find(|(id, _)| *id == b).unwrap().1;

        assert!((score_a - (1.0 / 61.0 + 1.0 / 61.0)).abs() < 1e-9);
        assert!((score_b - (1.0 / 62.0 + 1.0 / 60.0)).abs() < 1e-9);
    }

    #[test]
    fn fuse_rrf_includes_chunks_present_in_only_one_list() {
        let a = uuid(1);
        let dense = vec![(a, 0.9)];
        let lexical: Vec<(Uuid, f32)> = vec![];

        let (fused, _) = fuse_rrf(&dense, &lexical, 10);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].1 - 1.0 / 61.0).abs() < 1e-9);
    }

    #[test]
    fn group_by_document_breaks_score_ties_by_lexical_rank() {
        let chunk_a = uuid(101);
        let chunk_b = uuid(102);
        let doc_a = uuid(1);
        let doc_b = uuid(2);

        let fused = vec![(chunk_a, 0.5), (chunk_b, 0.5)];
        let lexical_rank: HashMap<Uuid, usize> = [(chunk_a, 1), (chunk_b, 2)].into_iter().collect();
        let chunk_by_id: HashMap<Uuid, crate::store::Chunk> = [
            (chunk_a, crate::store::Chunk { id: chunk_a, document_id: doc_a, order_index: 0, content: String::new(), embedding: None }),
            (chunk_b, crate::store::Chunk { id: chunk_b, document_id: doc_b, order_index: 0, content: String::new(), embedding: None }),
        ]
        .into_iter()
        .collect();

        let docs = group_by_document(&fused, &chunk_by_id, &lexical_rank);
        assert_eq!(docs[0].document_id, doc_a);
        assert_eq!(docs[1].document_id, doc_b);
    }
}
