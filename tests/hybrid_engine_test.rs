use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use hybrid_rag::embedding::{HashingTextEmbedder, TextEmbedder};
use hybrid_rag::error::{RagError, Result};
use hybrid_rag::hybrid::{
    HybridSearchConfig, HybridSearchEngine, HybridSearchRequest, SearchMode, SearchStage,
};
use hybrid_rag::rerank::CrossEncoder;
use hybrid_rag::retrieval::{IdentityKey, Metadata, SourceType};
use hybrid_rag::vector::{InMemoryVectorIndex, MetadataFilter, VectorHit, VectorIndex, VectorRecord};
use hybrid_rag::vector::Vector;
use hybrid_rag::web::{PageFetcher, WebHit, WebSearchProvider};

const HANDBOOK: &str = "Vacation policy allows 15 days per year. Unused days roll over once.";
const BENEFITS: &str = "Health insurance enrollment opens in November for all staff.";
const REMOTE: &str = "Remote work is allowed two days a week with manager approval.";

/// Accepts writes but fails every query.
struct BrokenQueryIndex {
    inner: InMemoryVectorIndex,
}

#[async_trait]
impl VectorIndex for BrokenQueryIndex {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        self.inner.upsert(record).await
    }

    async fn query(
        &self,
        _vector: &Vector,
        _k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>> {
        Err(RagError::other("connection refused"))
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        self.inner.delete(ids).await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }
}

/// Fails every write of a record whose text mentions `poison`, after the
/// records before it in the batch were already stored.
struct PartialWriteIndex {
    inner: InMemoryVectorIndex,
    poison: &'static str,
}

#[async_trait]
impl VectorIndex for PartialWriteIndex {
    async fn upsert(&self, record: VectorRecord) -> Result<()> {
        if record.text.contains(self.poison) {
            return Err(RagError::other("disk full"));
        }
        self.inner.upsert(record).await
    }

    async fn query(
        &self,
        vector: &Vector,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>> {
        self.inner.query(vector, k, filter).await
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        self.inner.delete(ids).await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }
}

/// Hashing embeddings, except NaN for any text mentioning `POISON`.
struct NanEmbedder(HashingTextEmbedder);

#[async_trait]
impl TextEmbedder for NanEmbedder {
    async fn embed(&self, text: &str) -> Result<Vector> {
        if text.contains("POISON") {
            return Ok(Vector::new(vec![f32::NAN; self.0.dimension()]));
        }
        self.0.embed(text).await
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }
}

/// Fast at ingestion, stalls on query embeddings.
struct StallingQueryEmbedder(HashingTextEmbedder);

#[async_trait]
impl TextEmbedder for StallingQueryEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vector> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(RagError::embedding("unreachable"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        self.0.embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }

    fn name(&self) -> &str {
        "stalling"
    }
}

/// Scores passages by how many query words they contain.
struct OverlapEncoder;

#[async_trait]
impl CrossEncoder for OverlapEncoder {
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        Ok(passages
            .iter()
            .map(|p| {
                let text = p.to_lowercase();
                words.iter().filter(|w| text.contains(w.as_str())).count() as f32 / words.len() as f32
            })
            .collect())
    }
}

struct FailingEncoder;

#[async_trait]
impl CrossEncoder for FailingEncoder {
    async fn score(&self, _query: &str, _passages: &[&str]) -> Result<Vec<f32>> {
        Err(RagError::scoring_unavailable("model not loaded"))
    }
}

struct SlowEncoder;

#[async_trait]
impl CrossEncoder for SlowEncoder {
    async fn score(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(vec![1.0; passages.len()])
    }
}

/// Returns fixed hits and counts calls.
struct StaticProvider {
    hits: Vec<WebHit>,
    calls: AtomicUsize,
}

impl StaticProvider {
    fn new(hits: Vec<WebHit>) -> Self {
        Self {
            hits,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WebSearchProvider for StaticProvider {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

struct DownProvider;

#[async_trait]
impl WebSearchProvider for DownProvider {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<WebHit>> {
        Err(RagError::other("503 Service Unavailable"))
    }

    fn name(&self) -> &str {
        "down"
    }
}

struct SlowFetcher;

#[async_trait]
impl PageFetcher for SlowFetcher {
    async fn fetch(&self, _url: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("full page text".to_string())
    }
}

struct EchoFetcher;

#[async_trait]
impl PageFetcher for EchoFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        Ok(format!("Fetched page body for {url} about vacation policy research."))
    }
}

fn web_hits() -> Vec<WebHit> {
    vec![
        WebHit {
            title: "Vacation policy research".to_string(),
            url: "https://en.wikipedia.org/wiki/Annual_leave".to_string(),
            snippet: "A study of vacation policy data across countries.".to_string(),
            search_engine: "static".to_string(),
            position: 1,
        },
        WebHit {
            title: "Ten tips for holidays".to_string(),
            url: "https://blog.example.com/holidays".to_string(),
            snippet: "Plan your vacation early.".to_string(),
            search_engine: "static".to_string(),
            position: 2,
        },
    ]
}

fn fast_config() -> HybridSearchConfig {
    let mut config = HybridSearchConfig::default();
    config.rerank.timeout = Duration::from_millis(100);
    config.web.fetch_timeout = Duration::from_millis(100);
    config
}

async fn ingest(engine: &HybridSearchEngine) {
    let mut metadata = Metadata::new();
    metadata.insert("document_title".to_string(), "Employee Handbook".into());
    engine.add_document("handbook", HANDBOOK, metadata).await.unwrap();
    engine.add_document("benefits", BENEFITS, Metadata::new()).await.unwrap();
    engine.add_document("remote", REMOTE, Metadata::new()).await.unwrap();
}

#[tokio::test]
async fn test_documents_only_pipeline_with_reranking() {
    let engine = HybridSearchEngine::builder()
        .config(fast_config())
        .cross_encoder(Arc::new(OverlapEncoder))
        .build()
        .unwrap();
    ingest(&engine).await;

    let results = engine.search_documents_only("vacation policy", 2).await.unwrap();

    assert!(results.total_results <= 2);
    assert_eq!(results.total_results, results.results.len());
    let best = results.best().unwrap();
    assert_eq!(best.content, HANDBOOK);
    assert!(best.dense_score > 0.0 && best.sparse_score > 0.0);
    assert_eq!(best.rerank_score, Some(1.0));
    let expected = best.combined_score * 0.7 + 0.3;
    assert!((best.final_score.unwrap() - expected).abs() < 1e-5);
    assert_eq!(best.metadata_str("document_id"), Some("handbook"));
    assert_eq!(results.web_results, 0);
    assert!(results.response_time >= 0.0);
}

#[tokio::test]
async fn test_documents_only_never_calls_web() {
    let provider = Arc::new(StaticProvider::new(web_hits()));
    let engine = HybridSearchEngine::builder()
        .web_provider(provider.clone())
        .build()
        .unwrap();
    ingest(&engine).await;

    let results = engine.search_documents_only("vacation", 5).await.unwrap();
    assert!(results.results.iter().all(|c| c.source_type == SourceType::Document));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_hybrid_search_fuses_web_results() {
    let provider = Arc::new(StaticProvider::new(web_hits()));
    let engine = HybridSearchEngine::builder()
        .config(fast_config())
        .web_provider(provider.clone())
        .page_fetcher(Arc::new(EchoFetcher))
        .build()
        .unwrap();
    ingest(&engine).await;

    let results = engine
        .hybrid_search("vacation policy", 10, 0.7, 0.3, true)
        .await
        .unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert_eq!(results.web_results, 2);
    assert!(results.document_results >= 1);
    assert!(results.stages.contains(&SearchStage::WebFused));

    let web: Vec<_> = results.of_type(SourceType::Web).collect();
    assert_eq!(web.len(), 2);
    for candidate in &web {
        // web relevance enters the second fusion pass with weight 0.4
        assert!((candidate.combined_score - candidate.sparse_score * 0.4).abs() < 1e-5);
    }

    let credible = web
        .iter()
        .find(|c| c.metadata_str("url") == Some("https://en.wikipedia.org/wiki/Annual_leave"))
        .unwrap();
    assert!(credible.content.starts_with("Fetched page body"));
    assert_eq!(credible.metadata["content_fetched"], true);

    let blog = web
        .iter()
        .find(|c| c.metadata_str("url") == Some("https://blog.example.com/holidays"))
        .unwrap();
    assert_eq!(blog.content, "Plan your vacation early.");

    let handbook = results
        .of_type(SourceType::Document)
        .find(|c| c.content == HANDBOOK)
        .unwrap();
    let document_side = handbook.dense_score * 0.7 + handbook.sparse_score * 0.3;
    assert!((handbook.combined_score - document_side * 0.6).abs() < 1e-5);
}

#[tokio::test]
async fn test_web_only_mode() {
    let engine = HybridSearchEngine::builder()
        .web_provider(Arc::new(StaticProvider::new(web_hits())))
        .build()
        .unwrap();
    ingest(&engine).await;

    let results = engine.search_web_only("vacation policy", 5).await.unwrap();
    assert_eq!(results.mode, SearchMode::WebOnly);
    assert_eq!(results.document_results, 0);
    assert_eq!(results.total_results, 2);
    assert!(results.results.iter().all(|c| c.source_type == SourceType::Web));
    assert!(!results.stages.contains(&SearchStage::DenseDone));
    // better title overlap ranks first
    assert_eq!(
        results.results[0].metadata_str("title"),
        Some("Vacation policy research")
    );
}

#[tokio::test]
async fn test_page_fetch_timeout_keeps_snippet() {
    let engine = HybridSearchEngine::builder()
        .config(fast_config())
        .web_provider(Arc::new(StaticProvider::new(web_hits())))
        .page_fetcher(Arc::new(SlowFetcher))
        .build()
        .unwrap();

    let results = engine.search_web_only("vacation policy", 5).await.unwrap();
    assert_eq!(results.total_results, 2);
    let credible = results
        .results
        .iter()
        .find(|c| c.metadata_str("title") == Some("Vacation policy research"))
        .unwrap();
    assert_eq!(credible.content, "A study of vacation policy data across countries.");
    assert_eq!(credible.metadata["content_fetched"], false);
}

#[tokio::test]
async fn test_failing_reranker_keeps_fusion_order() {
    for encoder in [
        Arc::new(FailingEncoder) as Arc<dyn CrossEncoder>,
        Arc::new(SlowEncoder) as Arc<dyn CrossEncoder>,
    ] {
        let engine = HybridSearchEngine::builder()
            .config(fast_config())
            .cross_encoder(encoder)
            .build()
            .unwrap();
        ingest(&engine).await;

        let results = engine.search_documents_only("vacation policy", 2).await.unwrap();
        assert_eq!(results.total_results, 2);
        assert!(results.results.iter().all(|c| !c.is_reranked()));
        assert!(results.results[0].combined_score >= results.results[1].combined_score);
        assert_eq!(results.results[0].content, HANDBOOK);
    }
}

#[tokio::test]
async fn test_dense_failure_degrades_to_sparse() {
    let engine = HybridSearchEngine::builder()
        .vector_index(Arc::new(BrokenQueryIndex {
            inner: InMemoryVectorIndex::new(),
        }))
        .build()
        .unwrap();
    ingest(&engine).await;

    let results = engine.search_documents_only("insurance enrollment", 5).await.unwrap();
    assert_eq!(results.total_results, 1);
    assert_eq!(results.results[0].content, BENEFITS);
    assert_eq!(results.results[0].dense_score, 0.0);
    assert!((results.results[0].combined_score - results.results[0].sparse_score * 0.3).abs() < 1e-6);
}

#[tokio::test]
async fn test_all_paths_failing_is_search_failed() {
    let engine = HybridSearchEngine::builder()
        .vector_index(Arc::new(BrokenQueryIndex {
            inner: InMemoryVectorIndex::new(),
        }))
        .web_provider(Arc::new(DownProvider))
        .build()
        .unwrap();

    // no documents: the sparse index is unfit and the vector index is down
    let err = engine
        .search(&HybridSearchRequest::new("vacation"))
        .await
        .unwrap_err();
    match err {
        RagError::SearchFailed { causes } => {
            assert_eq!(causes.len(), 3);
            let message = causes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            assert!(message.contains("dense retrieval unavailable"));
            assert!(message.contains("sparse retrieval unavailable"));
            assert!(message.contains("web retrieval unavailable"));
        }
        other => panic!("Expected SearchFailed, got {other}"),
    }

    // with the web path healthy the same query succeeds with web results only
    let engine = HybridSearchEngine::builder()
        .vector_index(Arc::new(BrokenQueryIndex {
            inner: InMemoryVectorIndex::new(),
        }))
        .web_provider(Arc::new(StaticProvider::new(web_hits())))
        .build()
        .unwrap();
    let results = engine.search(&HybridSearchRequest::new("vacation")).await.unwrap();
    assert_eq!(results.web_results, 2);
    assert_eq!(results.document_results, 0);
}

#[tokio::test]
async fn test_nothing_found_is_not_an_error() {
    let engine = HybridSearchEngine::builder().build().unwrap();
    ingest(&engine).await;

    let results = engine
        .search(&HybridSearchRequest::new("zzzz qqqq").with_mode(SearchMode::DocumentsOnly))
        .await
        .unwrap();
    // sparse finds nothing; dense still ranks by hashed similarity
    assert!(results.results.iter().all(|c| c.sparse_score == 0.0));
}

#[tokio::test]
async fn test_content_hash_identity_keeps_shared_prefix_apart() {
    let boilerplate = "ACME Corp internal document. Confidential. Do not distribute outside the company. Internal use only. Section follows: ";
    let first = format!("{boilerplate}Vacation policy allows 15 days.");
    let second = format!("{boilerplate}Expense reports are due monthly.");

    for (identity_key, expected) in [
        (IdentityKey::default(), 1),
        (IdentityKey::ContentHash, 2),
    ] {
        let mut config = HybridSearchConfig::default();
        config.identity_key = identity_key;
        let engine = HybridSearchEngine::builder().config(config).build().unwrap();
        engine.add_document("first", &first, Metadata::new()).await.unwrap();
        engine.add_document("second", &second, Metadata::new()).await.unwrap();

        let results = engine.search_documents_only("confidential document", 10).await.unwrap();
        assert_eq!(results.total_results, expected);
    }
}

#[tokio::test]
async fn test_config_file_drives_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"dense_weight": 0.0, "sparse_weight": 1.0, "max_results": 1, "include_web": false}"#,
    )
    .unwrap();

    let config = HybridSearchConfig::from_file(&path).unwrap();
    let engine = HybridSearchEngine::builder().config(config).build().unwrap();
    ingest(&engine).await;

    let results = engine.search(&HybridSearchRequest::new("remote work")).await.unwrap();
    assert_eq!(results.total_results, 1);
    assert_eq!(results.results[0].content, REMOTE);
    assert!((results.results[0].combined_score - results.results[0].sparse_score).abs() < 1e-6);
}

#[tokio::test]
async fn test_concurrent_queries_during_ingestion() {
    let engine = Arc::new(HybridSearchEngine::builder().build().unwrap());
    ingest(&engine).await;

    let mut tasks = Vec::new();
    for i in 0..8 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            if i % 4 == 0 {
                engine
                    .add_document(&format!("extra{i}"), "Parking passes are issued at reception.", Metadata::new())
                    .await
                    .map(|_| ())
            } else {
                engine.search_documents_only("vacation policy", 3).await.map(|_| ())
            }
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(engine.document_count(), 5);
}

#[tokio::test]
async fn test_embedding_timeout_degrades_to_sparse() {
    let mut config = fast_config();
    config.dense.embed_timeout = Duration::from_millis(100);
    let engine = HybridSearchEngine::builder()
        .config(config)
        .embedder(Arc::new(StallingQueryEmbedder(HashingTextEmbedder::new().unwrap())))
        .build()
        .unwrap();
    ingest(&engine).await;

    let results = engine.search_documents_only("insurance enrollment", 5).await.unwrap();
    assert_eq!(results.total_results, 1);
    assert_eq!(results.results[0].content, BENEFITS);
    assert_eq!(results.results[0].dense_score, 0.0);
    assert!(results.results[0].sparse_score > 0.0);
}

#[tokio::test]
async fn test_invalid_embedding_leaves_indexes_untouched() {
    let engine = HybridSearchEngine::builder()
        .embedder(Arc::new(NanEmbedder(HashingTextEmbedder::new().unwrap())))
        .build()
        .unwrap();
    engine.add_document("handbook", HANDBOOK, Metadata::new()).await.unwrap();

    let err = engine
        .add_documents([
            ("benefits".to_string(), BENEFITS.to_string(), Metadata::new()),
            ("doc".to_string(), "POISON pill in the second document.".to_string(), Metadata::new()),
        ])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("doc_chunk_0"));

    assert_eq!(engine.document_count(), 1);
    assert_eq!(engine.chunk_count(), 1);
    assert_eq!(engine.dense_retriever().index().len().await.unwrap(), 1);
    assert!(!engine.remove_document("doc").await.unwrap());

    let results = engine.search_documents_only("insurance enrollment", 5).await.unwrap();
    assert!(results.results.iter().all(|c| c.content == HANDBOOK));
}

#[tokio::test]
async fn test_failed_vector_write_rolls_back_both_sides() {
    let engine = HybridSearchEngine::builder()
        .vector_index(Arc::new(PartialWriteIndex {
            inner: InMemoryVectorIndex::new(),
            poison: "Remote work",
        }))
        .build()
        .unwrap();
    engine.add_document("handbook", HANDBOOK, Metadata::new()).await.unwrap();
    engine.add_document("benefits", "Old benefits text about dental plans.", Metadata::new())
        .await
        .unwrap();

    // benefits is written before remote fails
    let err = engine
        .add_documents([
            ("benefits".to_string(), BENEFITS.to_string(), Metadata::new()),
            ("remote".to_string(), REMOTE.to_string(), Metadata::new()),
        ])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("disk full"));

    // a failed replacement drops the document instead of leaving half of it
    assert_eq!(engine.document_count(), 1);
    assert_eq!(engine.dense_retriever().index().len().await.unwrap(), 1);
    assert!(!engine.remove_document("benefits").await.unwrap());
    assert!(engine.sparse_retriever().retrieve("insurance", 5).is_empty());
    assert!(engine.sparse_retriever().retrieve("dental", 5).is_empty());

    let results = engine.search_documents_only("insurance enrollment", 5).await.unwrap();
    assert!(results.results.iter().all(|c| c.content == HANDBOOK));
}

#[tokio::test]
async fn test_add_documents_in_one_batch() {
    let engine = HybridSearchEngine::builder().build().unwrap();
    let chunks = engine
        .add_documents([
            ("handbook".to_string(), "Draft text.".to_string(), Metadata::new()),
            ("benefits".to_string(), BENEFITS.to_string(), Metadata::new()),
            ("handbook".to_string(), HANDBOOK.to_string(), Metadata::new()),
        ])
        .await
        .unwrap();

    assert_eq!(chunks, 2);
    assert_eq!(engine.document_count(), 2);
    assert_eq!(engine.dense_retriever().index().len().await.unwrap(), 2);
    assert!(engine.sparse_retriever().retrieve("draft", 5).is_empty());
    assert_eq!(engine.sparse_retriever().retrieve("vacation", 5).len(), 1);
    assert_eq!(engine.add_documents(Vec::<(String, String, Metadata)>::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_document_result_count_is_capped() {
    let engine = HybridSearchEngine::builder().build().unwrap();
    ingest(&engine).await;

    let results = engine.search_documents_only("vacation insurance remote", 1).await.unwrap();
    assert_eq!(results.total_results, 1);
    assert_eq!(results.document_results, 1);
}
