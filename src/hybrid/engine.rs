//! Hybrid search engine: ingestion plus the per-query pipeline.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::chunking::{TextChunker, word_count};
use crate::embedding::{HashingTextEmbedder, TextEmbedder};
use crate::error::{RagError, Result};
use crate::hybrid::config::{HybridSearchConfig, validate_weight};
use crate::hybrid::types::{HybridSearchRequest, HybridSearchResults, SearchMode, SearchStage};
use crate::rerank::{CrossEncoder, Reranker};
use crate::retrieval::{
    Candidate, DenseRetriever, FusionCombiner, Metadata, RankedList, SparseRetriever,
};
use crate::sparse::CorpusEntry;
use crate::util::with_timeout;
use crate::vector::{InMemoryVectorIndex, Vector, VectorIndex, VectorRecord};
use crate::web::{PageFetcher, WebSearchProvider, WebSearcher};

/// Builder for [`HybridSearchEngine`].
///
/// Unset collaborators default to a [`HashingTextEmbedder`], an
/// [`InMemoryVectorIndex`], no cross-encoder (fusion order is kept) and no
/// web search.
#[derive(Default)]
pub struct HybridSearchEngineBuilder {
    config: HybridSearchConfig,
    embedder: Option<Arc<dyn TextEmbedder>>,
    index: Option<Arc<dyn VectorIndex>>,
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
    web_provider: Option<Arc<dyn WebSearchProvider>>,
    page_fetcher: Option<Arc<dyn PageFetcher>>,
}

impl HybridSearchEngineBuilder {
    pub fn config(mut self, config: HybridSearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn cross_encoder(mut self, cross_encoder: Arc<dyn CrossEncoder>) -> Self {
        self.cross_encoder = Some(cross_encoder);
        self
    }

    pub fn web_provider(mut self, provider: Arc<dyn WebSearchProvider>) -> Self {
        self.web_provider = Some(provider);
        self
    }

    /// Fetcher for page content of credible web hits. Without one, web
    /// candidates carry their snippets.
    pub fn page_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.page_fetcher = Some(fetcher);
        self
    }

    pub fn build(self) -> Result<HybridSearchEngine> {
        let config = self.config;
        config.validate()?;

        let embedder: Arc<dyn TextEmbedder> = match self.embedder {
            Some(embedder) => embedder,
            None => Arc::new(HashingTextEmbedder::new()?),
        };
        let index: Arc<dyn VectorIndex> = match self.index {
            Some(index) => index,
            None => Arc::new(InMemoryVectorIndex::new()),
        };

        let dense = DenseRetriever::new(embedder, index).with_config(config.dense);
        let sparse = SparseRetriever::new(config.sparse.clone())?;
        let reranker = match self.cross_encoder {
            Some(encoder) => Reranker::new(encoder),
            None => Reranker::passthrough(),
        }
        .with_config(config.rerank);
        let web = self.web_provider.map(|provider| {
            let searcher = WebSearcher::new(provider).with_config(config.web.clone());
            match self.page_fetcher {
                Some(fetcher) => searcher.with_fetcher(fetcher),
                None => searcher,
            }
        });

        Ok(HybridSearchEngine {
            fusion: FusionCombiner::new(config.identity_key),
            chunker: TextChunker::new(config.chunking)?,
            dense,
            sparse,
            reranker,
            web,
            corpus: RwLock::new(BTreeMap::new()),
            ingest: tokio::sync::Mutex::new(()),
            config,
        })
    }
}

/// Dense + sparse + web retrieval with fusion and re-ranking.
///
/// Queries share only read access to the indexes and may run concurrently.
/// Ingestion calls are serialized; each one refits the sparse index over the
/// whole chunk corpus and publishes it as a new snapshot.
pub struct HybridSearchEngine {
    config: HybridSearchConfig,
    dense: DenseRetriever,
    sparse: SparseRetriever,
    fusion: FusionCombiner,
    reranker: Reranker,
    web: Option<WebSearcher>,
    chunker: TextChunker,
    /// document id -> its chunks, in chunk order
    corpus: RwLock<BTreeMap<String, Vec<CorpusEntry>>>,
    ingest: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for HybridSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearchEngine")
            .field("dense", &self.dense)
            .field("sparse_fitted", &self.sparse.is_fitted())
            .field("reranker", &self.reranker)
            .field("web", &self.web)
            .field("documents", &self.document_count())
            .finish()
    }
}

/// A chunked document waiting to be embedded.
struct PendingDocument {
    doc_id: String,
    chunks: Vec<String>,
    metadata: Metadata,
}

/// Reject non-finite vectors and mixed dimensions before any write.
fn validate_vectors(records: &[VectorRecord]) -> Result<()> {
    let mut dimension = None;
    for record in records {
        if !record.vector.is_valid() {
            return Err(RagError::embedding(format!(
                "embedding for {} contains NaN or infinite values",
                record.id
            )));
        }
        match dimension {
            Some(expected) => record.vector.validate_dimension(expected)?,
            None => dimension = Some(record.vector.dimension()),
        }
    }
    Ok(())
}

/// Outcome of the document side of a query.
struct DocumentOutcome {
    fused: Vec<Candidate>,
    failures: Vec<RagError>,
    attempted: usize,
}

impl HybridSearchEngine {
    pub fn builder() -> HybridSearchEngineBuilder {
        HybridSearchEngineBuilder::default()
    }

    pub fn config(&self) -> &HybridSearchConfig {
        &self.config
    }

    pub fn dense_retriever(&self) -> &DenseRetriever {
        &self.dense
    }

    pub fn sparse_retriever(&self) -> &SparseRetriever {
        &self.sparse
    }

    pub fn has_web(&self) -> bool {
        self.web.is_some()
    }

    /// Number of ingested documents.
    pub fn document_count(&self) -> usize {
        self.corpus.read().len()
    }

    /// Number of indexed chunks across all documents.
    pub fn chunk_count(&self) -> usize {
        self.corpus.read().values().map(Vec::len).sum()
    }

    /// Chunk, embed and index a document, then refit the sparse index.
    ///
    /// Chunks are stored as `<doc_id>_chunk_<i>` with the document metadata
    /// plus `document_id`, `chunk_index`, `chunk_size` and `word_count`.
    /// Adding an id that already exists replaces the old document. Returns
    /// the number of chunks.
    pub async fn add_document(&self, doc_id: &str, text: &str, metadata: Metadata) -> Result<usize> {
        self.add_documents([(doc_id.to_string(), text.to_string(), metadata)])
            .await
    }

    /// Index several documents and refit the sparse index once.
    ///
    /// Every document is chunked and embedded, and every vector checked,
    /// before anything is written. If the vector index then fails, the
    /// documents of this call are removed from both indexes so the dense and
    /// sparse sides never disagree. When an id repeats, its last text wins.
    /// Returns the total number of chunks.
    pub async fn add_documents<I>(&self, documents: I) -> Result<usize>
    where
        I: IntoIterator<Item = (String, String, Metadata)>,
    {
        let mut pending: Vec<PendingDocument> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (doc_id, text, metadata) in documents {
            if doc_id.trim().is_empty() {
                return Err(RagError::invalid_argument("document id must not be empty"));
            }
            let chunks = self.chunker.chunk(&text);
            if chunks.is_empty() {
                return Err(RagError::invalid_argument(format!(
                    "document {doc_id} has no text"
                )));
            }
            let document = PendingDocument {
                doc_id: doc_id.clone(),
                chunks,
                metadata,
            };
            match positions.get(&doc_id) {
                Some(&at) => pending[at] = document,
                None => {
                    positions.insert(doc_id, pending.len());
                    pending.push(document);
                }
            }
        }
        if pending.is_empty() {
            return Ok(0);
        }

        let _guard = self.ingest.lock().await;

        let mut records = Vec::new();
        let mut entries: Vec<(String, Vec<CorpusEntry>)> = Vec::with_capacity(pending.len());
        let mut obsolete = Vec::new();
        for document in pending {
            let vectors = self.embed_chunks(&document.doc_id, &document.chunks).await?;
            let new_count = document.chunks.len();
            obsolete.extend(self.chunk_ids(&document.doc_id).into_iter().skip(new_count));

            let mut doc_entries = Vec::with_capacity(new_count);
            for (i, (chunk, vector)) in document.chunks.into_iter().zip(vectors).enumerate() {
                let id = format!("{}_chunk_{i}", document.doc_id);
                let mut chunk_metadata = document.metadata.clone();
                chunk_metadata.insert("document_id".to_string(), document.doc_id.as_str().into());
                chunk_metadata.insert("chunk_index".to_string(), i.into());
                chunk_metadata.insert("chunk_size".to_string(), chunk.chars().count().into());
                chunk_metadata.insert("word_count".to_string(), word_count(&chunk).into());

                doc_entries.push(CorpusEntry::new(id.clone(), chunk.clone()).with_metadata(chunk_metadata.clone()));
                records.push(VectorRecord::new(id, vector, chunk).with_metadata(chunk_metadata));
            }
            entries.push((document.doc_id, doc_entries));
        }
        validate_vectors(&records)?;

        let written: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let total = written.len();
        if let Err(e) = self.write_vectors(records, &obsolete).await {
            let doc_ids: Vec<&str> = entries.iter().map(|(id, _)| id.as_str()).collect();
            self.roll_back(&doc_ids, written, obsolete).await;
            return Err(e);
        }

        {
            let mut corpus = self.corpus.write();
            for (doc_id, doc_entries) in entries {
                log::info!("indexed document {doc_id} as {} chunks", doc_entries.len());
                corpus.insert(doc_id, doc_entries);
            }
        }
        self.refit_sparse()?;
        Ok(total)
    }

    /// Remove a document's chunks from both indexes. Returns whether the
    /// document was known.
    pub async fn remove_document(&self, doc_id: &str) -> Result<bool> {
        let _guard = self.ingest.lock().await;

        let ids = self.chunk_ids(doc_id);
        if ids.is_empty() {
            return Ok(false);
        }
        let removed = self.delete_vectors(&ids).await?;
        self.corpus.write().remove(doc_id);
        self.refit_sparse()?;

        log::info!("removed document {doc_id} ({removed} chunks)");
        Ok(true)
    }

    /// Run a query through the pipeline selected by `request.mode`.
    ///
    /// Stage failures degrade to fewer candidates. The query fails with
    /// [`RagError::SearchFailed`] only when every retrieval path it tried
    /// failed. A query that simply finds nothing succeeds with no results.
    pub async fn search(&self, request: &HybridSearchRequest) -> Result<HybridSearchResults> {
        let start = Instant::now();
        let query = request.query.trim();
        if query.is_empty() {
            return Err(RagError::invalid_argument("query must not be empty"));
        }
        let max_results = request.max_results.unwrap_or(self.config.max_results);
        if max_results == 0 {
            return Err(RagError::invalid_argument("max_results must be at least 1"));
        }
        let dense_weight = request.dense_weight.unwrap_or(self.config.dense_weight);
        let sparse_weight = request.sparse_weight.unwrap_or(self.config.sparse_weight);
        validate_weight("dense_weight", dense_weight)?;
        validate_weight("sparse_weight", sparse_weight)?;

        let web = match request.mode {
            SearchMode::DocumentsOnly => None,
            SearchMode::WebOnly => Some(self.web.as_ref().ok_or_else(|| {
                RagError::invalid_config("web-only search requires a web search provider")
            })?),
            SearchMode::Hybrid => {
                let include_web = request.include_web.unwrap_or(self.config.include_web);
                if include_web && self.web.is_none() {
                    log::debug!("no web search provider configured; searching documents only");
                }
                self.web.as_ref().filter(|_| include_web)
            }
        };
        let search_documents = request.mode != SearchMode::WebOnly;

        let mut stages = vec![SearchStage::Init];
        log::debug!("search [{}] mode={} max_results={max_results}", query, request.mode);

        let documents = async {
            if search_documents {
                Some(
                    self.document_pipeline(query, max_results, dense_weight, sparse_weight)
                        .await,
                )
            } else {
                None
            }
        };
        let web_search = async {
            match web {
                Some(searcher) => Some(searcher.try_search(query, max_results).await),
                None => None,
            }
        };
        let (documents, web_outcome) = futures::join!(documents, web_search);

        let mut failures = Vec::new();
        let mut attempted = 0;

        let document_list = match documents {
            Some(outcome) => {
                stages.extend([SearchStage::DenseDone, SearchStage::SparseDone, SearchStage::Fused]);
                attempted += outcome.attempted;
                failures.extend(outcome.failures);
                outcome.fused
            }
            None => Vec::new(),
        };
        let web_list = match web_outcome {
            Some(Ok(candidates)) => {
                attempted += 1;
                Some(candidates)
            }
            Some(Err(e)) => {
                attempted += 1;
                log::warn!("web retrieval degraded to no results: {e}");
                failures.push(e);
                Some(Vec::new())
            }
            None => None,
        };

        if attempted > 0 && failures.len() == attempted {
            return Err(RagError::SearchFailed { causes: failures });
        }

        let document_results = document_list.len().min(max_results);
        let web_results = web_list.as_ref().map_or(0, Vec::len);
        let combined = match web_list {
            Some(web_candidates) => {
                stages.push(SearchStage::WebFused);
                let mut lists = Vec::with_capacity(2);
                if search_documents {
                    lists.push(RankedList::fused(document_list, self.config.document_weight));
                    lists.push(RankedList::sparse(web_candidates, self.config.web_weight));
                } else {
                    lists.push(RankedList::sparse(web_candidates, 1.0));
                }
                self.fusion.fuse(lists)
            }
            None => document_list,
        };

        let results = self.reranker.rerank(query, combined, max_results).await;
        stages.extend([SearchStage::Reranked, SearchStage::Done]);

        let response_time = start.elapsed().as_secs_f64();
        log::debug!(
            "search [{query}] returned {} results in {response_time:.3}s",
            results.len()
        );
        Ok(HybridSearchResults {
            query: query.to_string(),
            mode: request.mode,
            total_results: results.len(),
            results,
            document_results,
            web_results,
            response_time,
            stages,
        })
    }

    /// Hybrid search with explicit fusion weights.
    pub async fn hybrid_search(
        &self,
        query: &str,
        max_results: usize,
        dense_weight: f32,
        sparse_weight: f32,
        include_web: bool,
    ) -> Result<HybridSearchResults> {
        let request = HybridSearchRequest::new(query)
            .with_max_results(max_results)
            .with_weights(dense_weight, sparse_weight)
            .with_include_web(include_web);
        self.search(&request).await
    }

    /// Search ingested documents only.
    pub async fn search_documents_only(&self, query: &str, max_results: usize) -> Result<HybridSearchResults> {
        let request = HybridSearchRequest::new(query)
            .with_mode(SearchMode::DocumentsOnly)
            .with_max_results(max_results);
        self.search(&request).await
    }

    /// Search the web only.
    pub async fn search_web_only(&self, query: &str, max_results: usize) -> Result<HybridSearchResults> {
        let request = HybridSearchRequest::new(query)
            .with_mode(SearchMode::WebOnly)
            .with_max_results(max_results);
        self.search(&request).await
    }

    async fn document_pipeline(
        &self,
        query: &str,
        k: usize,
        dense_weight: f32,
        sparse_weight: f32,
    ) -> DocumentOutcome {
        let (dense, sparse) = futures::join!(self.dense.try_retrieve(query, k), async {
            self.sparse.try_retrieve(query, k)
        });

        let mut failures = Vec::new();
        let dense = dense.unwrap_or_else(|e| {
            log::warn!(
                "dense retrieval degraded to no results (embedder {}): {e}",
                self.dense.embedder().name()
            );
            failures.push(e);
            Vec::new()
        });
        let sparse = sparse.unwrap_or_else(|e| {
            log::warn!("sparse retrieval degraded to no results: {e}");
            failures.push(e);
            Vec::new()
        });

        log::debug!(
            "retrieved {} dense and {} sparse candidates",
            dense.len(),
            sparse.len()
        );
        DocumentOutcome {
            fused: self.fusion.combine(dense, sparse, dense_weight, sparse_weight),
            failures,
            attempted: 2,
        }
    }

    async fn embed_chunks(&self, doc_id: &str, chunks: &[String]) -> Result<Vec<Vector>> {
        let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let vectors = with_timeout(
            "document embedding",
            self.config.dense.embed_timeout,
            self.dense.embedder().embed_batch(&chunk_refs),
        )
        .await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::embedding(format!(
                "embedder returned {} vectors for {} chunks of document {doc_id}",
                vectors.len(),
                chunks.len()
            )));
        }
        Ok(vectors)
    }

    async fn write_vectors(&self, records: Vec<VectorRecord>, obsolete: &[String]) -> Result<()> {
        with_timeout(
            "vector index upsert",
            self.config.dense.query_timeout,
            self.dense.index().upsert_batch(records),
        )
        .await?;
        if !obsolete.is_empty() {
            self.delete_vectors(obsolete).await?;
        }
        Ok(())
    }

    /// Drop every chunk of `doc_ids`, old and new, from both indexes.
    async fn roll_back(&self, doc_ids: &[&str], written: Vec<String>, obsolete: Vec<String>) {
        let mut ids = written;
        ids.extend(obsolete);
        for doc_id in doc_ids {
            ids.extend(self.chunk_ids(doc_id));
        }
        ids.sort_unstable();
        ids.dedup();
        if let Err(e) = self.delete_vectors(&ids).await {
            log::error!("rolling back {} vectors after a failed write: {e}", ids.len());
        }

        {
            let mut corpus = self.corpus.write();
            for doc_id in doc_ids {
                corpus.remove(*doc_id);
            }
        }
        if let Err(e) = self.refit_sparse() {
            log::error!("refitting the sparse index after a failed write: {e}");
        }
        log::warn!("ingestion of {} documents rolled back", doc_ids.len());
    }

    fn chunk_ids(&self, doc_id: &str) -> Vec<String> {
        self.corpus
            .read()
            .get(doc_id)
            .map(|entries| entries.iter().map(|e| e.id.clone()).collect())
            .unwrap_or_default()
    }

    async fn delete_vectors(&self, ids: &[String]) -> Result<usize> {
        with_timeout(
            "vector index delete",
            self.config.dense.query_timeout,
            self.dense.index().delete(ids),
        )
        .await
    }

    fn refit_sparse(&self) -> Result<()> {
        let entries: Vec<CorpusEntry> = self.corpus.read().values().flatten().cloned().collect();
        self.sparse.fit(entries)
    }
}
