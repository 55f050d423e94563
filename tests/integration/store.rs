//! Store behaviour through the public facade

use divan::{CouchStore, Document, Error, MangoQuery, PageOptions, PurgePolicy, Query, ViewQuery};
use divan_gateway::MemoryCouch;
use serde_json::json;
use std::sync::Arc;

fn store() -> (Arc<MemoryCouch>, CouchStore) {
    let couch = Arc::new(MemoryCouch::new());
    (couch.clone(), CouchStore::new("app", couch))
}

#[tokio::test]
async fn test_document_lifecycle() {
    let (couch, store) = store();

    let created = store
        .write(Document::with_id("order-1").field("status", "open"))
        .await
        .unwrap();
    let mut current = store.get("order-1").await.unwrap().unwrap();
    assert_eq!(current.revision, created.revision);

    current.insert("status", "shipped");
    let updated = store.write(current).await.unwrap();
    let shipped = store
        .find(MangoQuery::new(json!({"status": "shipped"})), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipped.revision, updated.revision);

    let tombstone = store.delete(updated).await.unwrap();
    assert_eq!(store.get("order-1").await.unwrap(), None);

    let rev = tombstone.revision.unwrap();
    store.purge("order-1", &rev).await.unwrap();
    assert_eq!(store.ping().await.unwrap().doc_del_count, 0);
    assert!(couch.request_count("_purge") == 1);
}

#[tokio::test]
async fn test_every_query_shape_yields_documents() {
    let (couch, store) = store();
    for (id, city) in [("p1", "Oslo"), ("p2", "Lima"), ("p3", "Oslo")] {
        couch.seed(json!({"_id": id, "city": city}));
    }
    let options = Some(PageOptions::default().with_read_size(1).unwrap());

    let queries: Vec<(Query, usize)> = vec![
        (Query::ById("p2".to_string()), 1),
        (Query::ByIdList(vec!["p1".to_string(), "p3".to_string()]), 2),
        (MangoQuery::new(json!({"city": "Oslo"})).into(), 2),
        (ViewQuery::all_docs().start_key("p2").into(), 2),
        (ViewQuery::design("by", "city").key("Lima").into(), 1),
    ];
    for (query, expected) in queries {
        let strategy = query.strategy();
        let docs = store.filter(query, options).unwrap().try_collect().await.unwrap();
        assert_eq!(docs.len(), expected, "{}", strategy);
    }
}

#[tokio::test]
async fn test_purge_policy_disabled() {
    let (couch, store) = store();
    let rev = couch.seed(json!({"_id": "x"}));
    let store = store.with_purge_policy(PurgePolicy::Disabled);
    assert!(matches!(store.purge("x", &rev).await, Err(Error::PurgeUnsupported)));
    assert_eq!(couch.document_count(), 1);
}
