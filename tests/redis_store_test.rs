// ============================================================================
// Redis Record Store Tests
// ============================================================================
//
// Require a running Redis:
//   docker run -d -p 6379:6379 redis:7
//   cargo test --test redis_store_test -- --ignored
//
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use dedup_consumer::{
    handler_fn, DedupConfig, DedupEngine, DedupKey, Decision, Message, RecordStore,
    RedisRecordStore, StoredStatus,
};
use dedup_redis::RedisClient;
use serial_test::serial;
use uuid::Uuid;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

async fn store() -> (RedisRecordStore, RedisClient) {
    let client = RedisClient::connect(&redis_url())
        .await
        .expect("Failed to connect to Redis");
    (RedisRecordStore::new(client.clone(), "MSGDEDUP"), client)
}

fn unique_key() -> DedupKey {
    DedupKey::new(format!("test-{}", Uuid::new_v4()), "orders", "", "m1")
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_set_if_absent_is_exclusive() {
    let (store, _) = store().await;
    let key = unique_key();

    assert!(store.set_consuming_if_absent(&key, Duration::from_secs(30)).await.unwrap());
    assert!(!store.set_consuming_if_absent(&key, Duration::from_secs(30)).await.unwrap());
    assert_eq!(store.get(&key).await.unwrap(), Some(StoredStatus::Consuming));

    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_mark_consumed_replaces_expiry() {
    let (store, mut client) = store().await;
    let key = unique_key();

    store.set_consuming_if_absent(&key, Duration::from_secs(5)).await.unwrap();
    store.mark_consumed(&key, Duration::from_secs(600)).await.unwrap();
    store.mark_consumed(&key, Duration::from_secs(600)).await.unwrap();

    assert_eq!(store.get(&key).await.unwrap(), Some(StoredStatus::Consumed));
    let ttl = client.pttl(&store.redis_key(&key)).await.unwrap();
    assert!(ttl > 5_000 && ttl <= 600_000);

    store.delete(&key).await.unwrap();
    store.delete(&key).await.unwrap();
    assert_eq!(store.get(&key).await.unwrap(), None);
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_consuming_record_expires() {
    let (store, _) = store().await;
    let key = unique_key();

    store.set_consuming_if_absent(&key, Duration::from_millis(100)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(store.get(&key).await.unwrap(), None);
    assert!(store.set_consuming_if_absent(&key, Duration::from_secs(30)).await.unwrap());

    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_foreign_value_reads_as_unknown() {
    let (store, mut client) = store().await;
    let key = unique_key();

    client.set_px(&store.redis_key(&key), "", 30_000).await.unwrap();
    assert_eq!(
        store.get(&key).await.unwrap(),
        Some(StoredStatus::Unknown(String::new()))
    );

    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_engine_over_redis_suppresses_duplicate() {
    let (store, _) = store().await;
    let store = Arc::new(store);
    let application = format!("test-{}", Uuid::new_v4());
    let engine = DedupEngine::new(&DedupConfig::enabled(application.as_str()), store.clone());
    let handler = handler_fn(|_msg: &Message| async move { true });

    let message = Message::new("orders", Some("created"), "m1", b"{}".to_vec());
    let first = engine.consume(&message, &handler).await;
    let second = engine.consume(&message, &handler).await;

    assert!(first.is_success());
    assert_eq!(second.decision, Decision::AlreadyDone);

    store.delete(&engine.dedup_key(&message)).await.unwrap();
}
