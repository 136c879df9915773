use std::sync::Arc;

use serde_json::json;

use conversation_store::models::Document;
use conversation_store::models::Selector;
use conversation_store::service::memory::InMemoryService;
use conversation_store::service::DocumentService;
use conversation_store::store::{dedup_id, ConversationStore, InitStatus, DESIGN_DOC_ID};

const DB: &str = "conversation";

fn fresh() -> (Arc<InMemoryService>, ConversationStore) {
    let _ = env_logger::builder().is_test(true).try_init();
    let service = Arc::new(InMemoryService::new());
    let store = ConversationStore::new(service.clone(), DB);
    (service, store)
}

async fn count_of_type(service: &InMemoryService, doc_type: &str) -> usize {
    service
        .find(DB, &Selector::Type(doc_type.to_string()))
        .await
        .unwrap()
        .len()
}

async fn design_doc_count(service: &InMemoryService) -> usize {
    service
        .find(DB, &Selector::Id(DESIGN_DOC_ID.to_string()))
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn test_init_on_fresh_environment() {
    let (service, store) = fresh();

    assert_eq!(store.init().await, InitStatus::Ready);

    let databases = service.list_databases().await.unwrap();
    assert_eq!(databases, vec![DB.to_string()]);
    assert_eq!(design_doc_count(&service).await, 1);
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let (service, store) = fresh();

    for _ in 0..3 {
        assert_eq!(store.init().await, InitStatus::Ready);
    }

    assert_eq!(service.list_databases().await.unwrap().len(), 1);
    assert_eq!(design_doc_count(&service).await, 1);
}

#[tokio::test]
async fn test_init_reports_degraded_on_service_failure() {
    let (service, store) = fresh();

    service.fail_requests(true);
    match store.init().await {
        InitStatus::Degraded(reason) => assert!(!reason.is_empty()),
        InitStatus::Ready => panic!("init reported ready against a failing service"),
    }

    // The same store recovers once the service does.
    service.fail_requests(false);
    assert_eq!(store.init().await, InitStatus::Ready);
}

#[tokio::test]
async fn test_add_inserts_then_returns_existing() {
    let (service, store) = fresh();
    store.init().await;

    let doc = Document::of_type("rubbish").with("name", json!("banana peel"));
    let first = store.add_if_not_exists(doc, "name").await.unwrap();
    let first_id = first.id().unwrap().to_string();
    assert!(!first_id.is_empty());
    assert!(!first.rev().unwrap().is_empty());

    let doc = Document::of_type("rubbish").with("name", json!("banana peel"));
    let second = store.add_if_not_exists(doc, "name").await.unwrap();
    assert_eq!(second.id(), Some(first_id.as_str()));

    assert_eq!(count_of_type(&service, "rubbish").await, 1);
}

#[tokio::test]
async fn test_add_rubbish_banana_peel_scenario() {
    let (service, store) = fresh();
    store.init().await;

    let first = store.add_rubbish("banana peel").await.unwrap();
    assert_eq!(first.get("name"), Some(&json!("banana peel")));
    let first_id = first.id().unwrap().to_string();

    let second = store.add_rubbish("banana peel").await.unwrap();
    assert_eq!(second.id(), Some(first_id.as_str()));
    assert_eq!(count_of_type(&service, "rubbish").await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_adds_converge_on_one_document() {
    let (service, store) = fresh();
    store.init().await;
    let store = Arc::new(store);

    let a = {
        let store = store.clone();
        tokio::spawn(async move { store.add_rubbish("banana peel").await })
    };
    let b = {
        let store = store.clone();
        tokio::spawn(async move { store.add_rubbish("banana peel").await })
    };

    let doc_a = a.await.unwrap().unwrap();
    let doc_b = b.await.unwrap().unwrap();

    assert_eq!(doc_a.id(), doc_b.id());
    assert_eq!(count_of_type(&service, "rubbish").await, 1);
}

#[tokio::test]
async fn test_lost_race_is_recovered_via_conflict() {
    let (service, store) = fresh();
    store.init().await;

    // A competing writer already persisted the winning document, but the
    // lookup view lags behind: the seeded copy lacks the searched field, so
    // only the insert conflict can reveal it.
    let id = dedup_id("rubbish", "name", &json!("banana peel"));
    let mut winner = Document::of_type("rubbish");
    winner.set_id(&id);
    service.insert(DB, &winner).await.unwrap();

    let doc = Document::of_type("rubbish").with("name", json!("banana peel"));
    let returned = store.add_if_not_exists(doc, "name").await.unwrap();

    assert_eq!(returned.id(), Some(id.as_str()));
    assert_eq!(count_of_type(&service, "rubbish").await, 1);
}

#[tokio::test]
async fn test_insert_stamps_derived_id_and_fresh_revision() {
    let (_service, store) = fresh();
    store.init().await;

    let doc = Document::of_type("rubbish").with("name", json!("banana peel"));
    assert_eq!(doc.id(), None);
    assert_eq!(doc.rev(), None);

    let stored = store.add_if_not_exists(doc, "name").await.unwrap();
    assert_eq!(
        stored.id(),
        Some(dedup_id("rubbish", "name", &json!("banana peel")).as_str())
    );
    assert!(!stored.rev().unwrap().is_empty());
}

#[tokio::test]
async fn test_find_doc_is_total_on_empty_store() {
    let (_service, store) = fresh();
    store.init().await;

    let found = store
        .find_doc("rubbish", "name", &json!("banana peel"))
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_find_doc_prefers_lowest_id_among_duplicates() {
    let (service, store) = fresh();
    store.init().await;

    // Duplicates as left behind by the unguarded check-then-insert protocol.
    for id in ["b-duplicate", "a-duplicate"] {
        let mut doc = Document::of_type("rubbish").with("name", json!("banana peel"));
        doc.set_id(id);
        service.insert(DB, &doc).await.unwrap();
    }

    let found = store
        .find_doc("rubbish", "name", &json!("banana peel"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id(), Some("a-duplicate"));
}

#[tokio::test]
async fn test_add_rejects_documents_missing_the_key() {
    let (_service, store) = fresh();
    store.init().await;

    // No field named by the unique property.
    let doc = Document::of_type("rubbish");
    assert!(store.add_if_not_exists(doc, "name").await.is_err());

    // No type tag.
    let doc = Document::default().with("name", json!("banana peel"));
    assert!(store.add_if_not_exists(doc, "name").await.is_err());
}

#[tokio::test]
async fn test_add_propagates_service_failures() {
    let (service, store) = fresh();
    store.init().await;

    service.fail_requests(true);
    let doc = Document::of_type("rubbish").with("name", json!("banana peel"));
    assert!(store.add_if_not_exists(doc, "name").await.is_err());
}

#[tokio::test]
async fn test_all_rubbish_lists_deduplicated_documents() {
    let (_service, store) = fresh();
    store.init().await;

    store.add_rubbish("banana peel").await.unwrap();
    store.add_rubbish("apple core").await.unwrap();
    store.add_rubbish("banana peel").await.unwrap();

    let all = store.all_rubbish().await.unwrap();
    assert_eq!(all.len(), 2);
    for doc in &all {
        assert_eq!(doc.doc_type(), Some("rubbish"));
        assert!(doc.id().is_some());
    }
}
