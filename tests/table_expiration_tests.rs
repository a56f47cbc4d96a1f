//! Integration tests for table expiration, callbacks, loading and ranking.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::sleep;

use ttl_cache::{CacheError, CacheRegistry, CacheTable};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_cache=debug".into()),
        )
        .try_init();
}

#[tokio::test]
async fn test_add_value_delete_roundtrip() {
    init_tracing();
    let table: Arc<CacheTable<String, String>> = CacheTable::new("roundtrip");
    let deletes = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&deletes);
    table.add_about_to_delete_item_callback(move |item| {
        log.lock().unwrap().push(item.key().clone());
    });

    table.add("a".to_string(), Duration::ZERO, "x".to_string());

    let item = table.value(&"a".to_string()).unwrap();
    assert_eq!(item.data(), "x");
    assert_eq!(item.access_count(), 1);

    table.delete(&"a".to_string()).unwrap();
    assert_eq!(*deletes.lock().unwrap(), vec!["a"]);

    assert_eq!(
        table.value(&"a".to_string()).unwrap_err(),
        CacheError::KeyNotFound
    );
}

#[tokio::test]
async fn test_item_expires_after_lifespan() {
    let table: Arc<CacheTable<String, String>> = CacheTable::new("expiry");
    table.add("b".to_string(), Duration::from_millis(50), "y".to_string());

    sleep(Duration::from_millis(150)).await;

    assert!(!table.exists(&"b".to_string()));
    assert_eq!(table.count(), 0);
}

#[tokio::test]
async fn test_immortal_item_is_never_swept() {
    let table: Arc<CacheTable<String, String>> = CacheTable::new("immortal");
    table.add("keep".to_string(), Duration::ZERO, "v".to_string());
    table.add("drop".to_string(), Duration::from_millis(40), "v".to_string());

    sleep(Duration::from_millis(150)).await;

    assert!(table.exists(&"keep".to_string()));
    assert!(!table.exists(&"drop".to_string()));
}

#[tokio::test]
async fn test_sweep_rearms_for_next_soonest_item() {
    let table: Arc<CacheTable<String, String>> = CacheTable::new("rearm");
    table.add("fast".to_string(), Duration::from_millis(60), "v".to_string());
    table.add("slow".to_string(), Duration::from_millis(400), "v".to_string());

    sleep(Duration::from_millis(180)).await;
    assert!(!table.exists(&"fast".to_string()));
    assert!(table.exists(&"slow".to_string()));

    sleep(Duration::from_millis(400)).await;
    assert!(!table.exists(&"slow".to_string()));
    assert_eq!(table.count(), 0);
}

#[tokio::test]
async fn test_expiry_fires_delete_and_expire_callbacks() {
    let table: Arc<CacheTable<String, String>> = CacheTable::new("callbacks");
    let log = Arc::new(Mutex::new(Vec::new()));

    let table_log = Arc::clone(&log);
    table.add_about_to_delete_item_callback(move |item| {
        table_log
            .lock()
            .unwrap()
            .push(format!("delete:{}", item.key()));
    });

    let item = table.add("gone".to_string(), Duration::from_millis(50), "v".to_string());
    let item_log = Arc::clone(&log);
    item.add_about_to_expire_callback(move |key| {
        item_log.lock().unwrap().push(format!("expire:{key}"));
    });

    sleep(Duration::from_millis(200)).await;

    // Table-level callback first, then the item's, each exactly once.
    assert_eq!(*log.lock().unwrap(), vec!["delete:gone", "expire:gone"]);
}

#[tokio::test]
async fn test_flush_cancels_pending_sweep() {
    let table: Arc<CacheTable<String, String>> = CacheTable::new("flush");
    let expirations = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&expirations);
    table.add_about_to_delete_item_callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    for key in ["a", "b", "c"] {
        table.add(key.to_string(), Duration::from_millis(80), "v".to_string());
    }
    assert_eq!(table.count(), 3);

    table.flush();
    assert_eq!(table.count(), 0);

    // Well past the items' lifespans: the cancelled sweep must not fire
    // callbacks for flushed items.
    sleep(Duration::from_millis(250)).await;
    assert_eq!(expirations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_data_loader_fills_misses() {
    let table: Arc<CacheTable<String, String>> = CacheTable::new("loader");
    table.set_data_loader(|_, _| Some((Duration::ZERO, "z".to_string())));

    let item = table.value(&"c".to_string()).unwrap();
    assert_eq!(item.data(), "z");
    assert!(table.exists(&"c".to_string()));
}

#[tokio::test]
async fn test_most_accessed_ranks_by_frequency() {
    let table: Arc<CacheTable<String, u32>> = CacheTable::new("ranking");
    table.add("rare".to_string(), Duration::ZERO, 1);
    table.add("common".to_string(), Duration::ZERO, 2);
    table.add("top".to_string(), Duration::ZERO, 3);

    for _ in 0..4 {
        table.value(&"top".to_string()).unwrap();
    }
    table.value(&"common".to_string()).unwrap();

    let ranked = table.most_accessed(10);
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].key(), "top");
    assert_eq!(ranked[1].key(), "common");
    assert_eq!(ranked[2].key(), "rare");
}

#[tokio::test]
async fn test_registry_hands_out_one_table_per_name() {
    let registry: CacheRegistry<String, String> = CacheRegistry::new();

    let first = registry.table("sessions");
    first.add("k".to_string(), Duration::ZERO, "v".to_string());

    let second = registry.table("sessions");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.exists(&"k".to_string()));

    assert_eq!(registry.table("other").count(), 0);
}

#[tokio::test]
async fn test_expire_callback_can_readd_key() {
    let table: Arc<CacheTable<String, String>> = CacheTable::new("readd");

    let item = table.add("k".to_string(), Duration::from_millis(50), "v".to_string());
    let readd = Arc::clone(&table);
    item.add_about_to_expire_callback(move |key| {
        // Bring the key back as an immortal item; must not deadlock against
        // the sweep that is removing it.
        readd.add(key.clone(), Duration::ZERO, "revived".to_string());
    });

    sleep(Duration::from_millis(200)).await;

    // The callback ran without deadlocking; the removal then wins over the
    // re-add of the same key, since the map entry is dropped after the
    // callbacks return.
    assert!(!table.exists(&"k".to_string()));
    assert_eq!(table.count(), 0);
}
