//! Tests for the discovery service lookup path and fan-out

use super::*;
use crate::test_helpers::{MockStore, item, n, s};
use keyql_core::{
    DiscoveryConfig, DiscoveryContext, DiscoveryMode, KeyqlConfig, KeyqlError, ManualClock,
    SampleStrategy, ScalarAttributeType, SchemaCacheConfig, TableDescription,
};
use std::sync::Arc;
use std::time::Duration;

fn table(name: &str) -> (TableDescription, Vec<keyql_core::Item>) {
    let description = TableDescription::new(name).with_hash_key("id", ScalarAttributeType::N);
    let items = (0..5)
        .map(|i| item(&[("id", n(i)), ("label", s("x"))]))
        .collect();
    (description, items)
}

fn store_with(tables: &[&str]) -> MockStore {
    tables.iter().fold(MockStore::new(), |store, name| {
        let (description, items) = table(name);
        store.with_table(description, items)
    })
}

fn config(mode: DiscoveryMode, ttl: Duration, max_concurrency: usize) -> KeyqlConfig {
    KeyqlConfig {
        discovery: DiscoveryConfig::new()
            .with_mode(mode)
            .with_sample_strategy(SampleStrategy::Sequential)
            .with_max_concurrency(max_concurrency),
        schema_cache: SchemaCacheConfig::new(ttl),
        ..Default::default()
    }
}

fn service(store: Arc<MockStore>, clock: Arc<ManualClock>) -> SchemaDiscoveryService {
    SchemaDiscoveryService::with_clock(
        store,
        &config(DiscoveryMode::Sampling, Duration::from_secs(1), 4),
        clock,
    )
}

mod lookup_tests {
    use super::*;

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let store = Arc::new(store_with(&["users"]));
        let service = service(store.clone(), Arc::new(ManualClock::new(0)));

        let first = service
            .column_metadata("users", DiscoveryContext::new())
            .await
            .unwrap();
        let second = service
            .column_metadata("users", DiscoveryContext::new())
            .await
            .unwrap();

        assert_eq!(first.value, second.value);
        assert_eq!(store.scan_count(), 1);
        assert!(service.is_cached("users"));
    }

    #[tokio::test]
    async fn test_expired_entry_is_rediscovered() {
        let store = Arc::new(store_with(&["users"]));
        let clock = Arc::new(ManualClock::new(0));
        let service = service(store.clone(), clock.clone());

        service.column_metadata("users", DiscoveryContext::new()).await.unwrap();
        clock.advance(1_001);
        assert!(!service.is_cached("users"));

        service.column_metadata("users", DiscoveryContext::new()).await.unwrap();
        assert_eq!(store.scan_count(), 2, "memo must not hide an expired entry");
        assert!(service.is_cached("users"));
    }

    #[tokio::test]
    async fn test_loser_of_refresh_race_gets_stale_columns() {
        let store = Arc::new(store_with(&["users"]));
        let clock = Arc::new(ManualClock::new(0));
        let service = service(store.clone(), clock.clone());

        let fresh = service
            .column_metadata("users", DiscoveryContext::new())
            .await
            .unwrap()
            .into_inner();
        clock.advance(5_000);

        let _winner = service.cache().try_begin_refresh("users").expect("claim refresh");
        let stale = service
            .column_metadata("users", DiscoveryContext::new())
            .await
            .unwrap()
            .into_inner();

        assert_eq!(stale, fresh);
        assert_eq!(store.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_cached() {
        let store = Arc::new(store_with(&[]));
        let service = service(store, Arc::new(ManualClock::new(0)));

        let columns = service
            .column_metadata("ghost", DiscoveryContext::new())
            .await
            .unwrap();
        assert!(columns.value.is_empty());
        assert_eq!(service.cache().stats().entry_count, 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_still_uses_memo() {
        let store = Arc::new(store_with(&["users"]));
        let mut config = config(DiscoveryMode::Sampling, Duration::from_secs(1), 4);
        config.schema_cache = SchemaCacheConfig::disabled();
        let service = SchemaDiscoveryService::new(store.clone(), &config);

        service.column_metadata("users", DiscoveryContext::new()).await.unwrap();
        service.column_metadata("users", DiscoveryContext::new()).await.unwrap();

        assert!(!service.is_cached("users"));
        assert_eq!(store.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rediscovery() {
        let store = Arc::new(store_with(&["users"]));
        let service = service(store.clone(), Arc::new(ManualClock::new(0)));

        service.column_metadata("users", DiscoveryContext::new()).await.unwrap();
        service.invalidate("users");
        assert!(!service.detector().memo().contains("users"));

        service.column_metadata("users", DiscoveryContext::new()).await.unwrap();
        assert_eq!(store.scan_count(), 2);
    }

    #[tokio::test]
    async fn test_schema_and_ordered_columns() {
        let store = Arc::new(store_with(&["users"]));
        let service = service(store, Arc::new(ManualClock::new(0)));

        let schema = service
            .schema("users", DiscoveryContext::new())
            .await
            .unwrap()
            .into_inner();
        assert_eq!(schema["id"], 3);
        assert_eq!(schema["label"], 12);

        let ordered = service
            .ordered_columns("users", DiscoveryContext::new())
            .await
            .unwrap()
            .into_inner();
        let names: Vec<&str> = ordered.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, ["id", "label"]);
    }

    #[tokio::test]
    async fn test_ordered_columns_by_name_when_describe_fails() {
        let store = Arc::new(
            MockStore::new()
                .with_table(
                    TableDescription::new("users").with_hash_key("zone", ScalarAttributeType::S),
                    vec![item(&[("zone", s("eu")), ("age", n(3)), ("label", s("x"))])],
                )
                .with_describe_failure(|| KeyqlError::Store("describe down".into())),
        );
        let service = service(store, Arc::new(ManualClock::new(0)));

        let ordered = service
            .ordered_columns("users", DiscoveryContext::new())
            .await
            .unwrap()
            .into_inner();
        let names: Vec<&str> = ordered.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, ["age", "label", "zone"]);
    }

    #[tokio::test]
    async fn test_refresh_table_skips_when_refresh_in_progress() {
        let store = Arc::new(store_with(&["users"]));
        let service = service(store.clone(), Arc::new(ManualClock::new(0)));

        service.column_metadata("users", DiscoveryContext::new()).await.unwrap();
        let _winner = service.cache().try_begin_refresh("users").expect("claim refresh");

        service.refresh_table("users", DiscoveryContext::new()).await.unwrap();
        assert_eq!(store.scan_count(), 1);
    }
}

mod orchestrator_tests {
    use super::*;

    fn names(tables: &[&str]) -> Vec<String> {
        tables.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_discover_tables_populates_cache() {
        let store = Arc::new(store_with(&["a", "b", "c"]));
        let service = service(store, Arc::new(ManualClock::new(0)));

        let discovered = service
            .discover_tables(&names(&["a", "b", "c"]), &DiscoveryContext::new())
            .await
            .unwrap();

        assert_eq!(discovered.len(), 3);
        assert!(["a", "b", "c"].iter().all(|t| service.is_cached(t)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_is_bounded() {
        let tables = ["a", "b", "c", "d", "e", "f"];
        let store = Arc::new(store_with(&tables).with_scan_delay(Duration::from_millis(100)));
        let service = SchemaDiscoveryService::new(
            store.clone(),
            &config(DiscoveryMode::Sampling, Duration::from_secs(60), 2),
        );

        let discovered = service
            .discover_tables(&names(&tables), &DiscoveryContext::new())
            .await
            .unwrap();

        assert_eq!(discovered.len(), 6);
        assert_eq!(store.max_in_flight(), 2);
    }

    #[tokio::test]
    async fn test_fatal_failures_are_left_out() {
        let store = Arc::new(store_with(&["a"]).with_scan_failure(|| KeyqlError::Cancelled));
        let service = service(store, Arc::new(ManualClock::new(0)));

        let discovered = service
            .discover_tables(&names(&["a"]), &DiscoveryContext::new())
            .await
            .unwrap();
        assert!(discovered.is_empty());
    }

    #[tokio::test]
    async fn test_discover_tables_refreshes_cached_tables() {
        let store = Arc::new(store_with(&["a"]));
        let service = service(store.clone(), Arc::new(ManualClock::new(0)));

        service.column_metadata("a", DiscoveryContext::new()).await.unwrap();
        service
            .discover_tables(&names(&["a"]), &DiscoveryContext::new())
            .await
            .unwrap();
        assert_eq!(store.scan_count(), 2);
    }

    #[tokio::test]
    async fn test_preload_runs_in_background() {
        let store = Arc::new(store_with(&["users"]));
        let service = service(store, Arc::new(ManualClock::new(0)));

        service.preload("users", &DiscoveryContext::new());
        for _ in 0..100 {
            if service.is_cached("users") {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(service.is_cached("users"));
    }

    #[test]
    fn test_preload_without_runtime_is_skipped() {
        let store = Arc::new(store_with(&["users"]));
        let service = service(store.clone(), Arc::new(ManualClock::new(0)));

        service.preload("users", &DiscoveryContext::new());
        assert_eq!(store.scan_count(), 0);
    }
}
