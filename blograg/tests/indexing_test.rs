//! Indexing and re-indexing tests

mod common;

use blograg::{AnswerSource, QueryOrchestrator};
use common::{harness, sample_post, test_config, BagOfWordsEmbedder, CountingGenerator};
use std::sync::Arc;

#[tokio::test]
async fn test_reindex_replaces_previous_chunks() {
    let h = harness(CountingGenerator::new());

    let first = "Tokio schedules tasks on a work stealing runtime.";
    let second = "Serde derives serializers for plain structs.";
    h.orch.index_document("post", first).await.unwrap();
    h.orch.index_document("post", second).await.unwrap();

    let query = h.embedder.vector("Tokio runtime tasks");
    let hits = h.orch.retriever().search("post", &query).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, second);
    assert_eq!(h.orch.retriever().chunk_count("post").await.unwrap(), 1);
}

#[tokio::test]
async fn test_reindex_invalidates_cached_answers() {
    let h = harness(CountingGenerator::new());
    h.orch.index_document("rust-101", &sample_post()).await.unwrap();

    let question = "Explain cargo workspaces";
    let first = h.orch.answer(Some("rust-101"), question, None).await;
    let cached = h.orch.answer(Some("rust-101"), question, None).await;
    assert_eq!(first.source, AnswerSource::Synthesized);
    assert_eq!(cached.source, AnswerSource::ExactCache);

    h.orch
        .index_document("rust-101", "Cargo workspaces share a single target directory.")
        .await
        .unwrap();

    let fresh = h.orch.answer(Some("rust-101"), question, None).await;
    assert_eq!(fresh.source, AnswerSource::Synthesized);
    assert!(fresh.text.contains("single target directory"));
    assert_eq!(h.generator.count(), 2);
}

#[tokio::test]
async fn test_reindex_leaves_other_documents_cached() {
    let h = harness(CountingGenerator::new());
    h.orch.index_document("a", &sample_post()).await.unwrap();
    h.orch.index_document("b", &sample_post()).await.unwrap();

    h.orch.answer(Some("a"), "Explain lifetimes", None).await;
    h.orch.answer(Some("b"), "Explain lifetimes", None).await;

    h.orch.index_document("a", &sample_post()).await.unwrap();

    let a = h.orch.answer(Some("a"), "Explain lifetimes", None).await;
    let b = h.orch.answer(Some("b"), "Explain lifetimes", None).await;
    assert_eq!(a.source, AnswerSource::Synthesized);
    assert_eq!(b.source, AnswerSource::ExactCache);
}

#[tokio::test]
async fn test_reindex_without_invalidation_keeps_answers() {
    let generator = Arc::new(CountingGenerator::new());
    let mut config = test_config();
    config.invalidate_on_reindex = false;
    let orch = QueryOrchestrator::in_memory(
        config,
        Arc::new(BagOfWordsEmbedder::new()),
        generator.clone(),
        Arc::new(blograg::MemoryChunkIndex::new()),
    )
    .unwrap();

    orch.index_document("post", &sample_post()).await.unwrap();
    orch.answer(Some("post"), "Explain lifetimes", None).await;
    orch.index_document("post", &sample_post()).await.unwrap();

    let again = orch.answer(Some("post"), "Explain lifetimes", None).await;
    assert_eq!(again.source, AnswerSource::ExactCache);
    assert_eq!(generator.count(), 1);
}

#[tokio::test]
async fn test_empty_text_clears_the_document() {
    let h = harness(CountingGenerator::new());
    h.orch.index_document("post", &sample_post()).await.unwrap();

    let count = h.orch.index_document("post", "   ").await.unwrap();
    assert_eq!(count, 0);
    assert_eq!(h.orch.retriever().chunk_count("post").await.unwrap(), 0);
}
