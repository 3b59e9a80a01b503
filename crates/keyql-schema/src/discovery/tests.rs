//! Tests for mode dispatch, fallback and the discovery memo

use super::*;
use crate::metadata::DiscoverySource;
use crate::test_helpers::{MockStore, item, n, s};
use keyql_core::{
    AttributeValue, DiscoveryConfig, DiscoveryContext, DiscoveryMode, IndexKind, KeyElement,
    KeyqlError, SampleStrategy, ScalarAttributeType, TableDescription, TableStatus, TypeCategory,
};
use std::sync::Arc;

fn users_description() -> TableDescription {
    TableDescription::new("users")
        .with_hash_key("user_id", ScalarAttributeType::S)
        .with_range_key("version", ScalarAttributeType::N)
}

fn users_items() -> Vec<keyql_core::Item> {
    (0..20)
        .map(|i| {
            let mut row = item(&[
                ("user_id", s(&format!("u{i}"))),
                ("version", n(i)),
                ("email", s("someone@example.com")),
            ]);
            if i % 2 == 0 {
                row.insert("age".into(), n(30 + i));
            }
            row
        })
        .collect()
}

fn store() -> MockStore {
    MockStore::new().with_table(users_description(), users_items())
}

fn detector(store: Arc<MockStore>, mode: DiscoveryMode) -> SchemaDetector {
    SchemaDetector::new(
        store,
        DiscoveryConfig::new()
            .with_mode(mode)
            .with_sample_strategy(SampleStrategy::Sequential),
    )
}

async fn columns(detector: &SchemaDetector) -> crate::metadata::ColumnMap {
    detector
        .detect_column_metadata("users", DiscoveryContext::new())
        .await
        .unwrap()
        .into_inner()
}

mod mode_tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_uses_key_schema_only() {
        let store = Arc::new(store());
        let detector = detector(store.clone(), DiscoveryMode::Disabled);

        let columns = columns(&detector).await;
        assert_eq!(columns.len(), 2);
        assert_eq!(columns["user_id"].resolved_type, TypeCategory::String);
        assert_eq!(columns["version"].resolved_type, TypeCategory::Number);
        assert_eq!(columns["version"].source, DiscoverySource::KeySchema);
        assert_eq!(store.scan_count(), 0);
    }

    #[tokio::test]
    async fn test_undeclared_key_attribute_is_kept_as_other() {
        let mut description = users_description();
        description.attribute_definitions.remove("version");
        let store = Arc::new(MockStore::new().with_table(description, users_items()));
        let detector = detector(store, DiscoveryMode::Disabled);

        let columns = columns(&detector).await;
        assert_eq!(columns.len(), 2);
        assert_eq!(columns["user_id"].resolved_type, TypeCategory::String);
        assert_eq!(columns["version"].resolved_type, TypeCategory::Other);
        assert_eq!(columns["version"].source, DiscoverySource::KeySchema);
    }

    #[tokio::test]
    async fn test_hints_overlays_light_sample() {
        let store = Arc::new(store());
        let detector = detector(store.clone(), DiscoveryMode::Hints);

        let columns = columns(&detector).await;
        assert_eq!(columns.len(), 4);
        assert_eq!(columns["user_id"].source, DiscoverySource::Hints);
        assert_eq!(columns["user_id"].observations(), 20);
        assert!(columns["age"].nullable);
        assert_eq!(store.scan_log()[0].limit, Some(100));
    }

    #[tokio::test]
    async fn test_hints_keeps_key_placeholders_for_empty_table() {
        let store = Arc::new(MockStore::new().with_table(users_description(), vec![]));
        let detector = detector(store, DiscoveryMode::Hints);

        let columns = columns(&detector).await;
        assert_eq!(columns.len(), 2);
        assert_eq!(columns["user_id"].source, DiscoverySource::KeySchema);
    }

    #[tokio::test]
    async fn test_sampling_has_no_key_seeding() {
        let store = Arc::new(MockStore::new().with_table(users_description(), vec![]));
        let detector = detector(store.clone(), DiscoveryMode::Sampling);

        assert!(columns(&detector).await.is_empty());
        assert_eq!(store.describe_count(), 0);
    }

    #[tokio::test]
    async fn test_sampling_uses_configured_size() {
        let store = Arc::new(store());
        let detector = SchemaDetector::new(
            store.clone(),
            DiscoveryConfig::new()
                .with_mode(DiscoveryMode::Sampling)
                .with_sample_size(15)
                .with_sample_strategy(SampleStrategy::Sequential),
        );

        let columns = columns(&detector).await;
        assert_eq!(columns["email"].source, DiscoverySource::Sampling);
        assert_eq!(columns["email"].observations(), 15);
        assert_eq!(store.scan_log()[0].limit, Some(15));
    }

    #[tokio::test]
    async fn test_auto_halves_sample_without_indexes() {
        let store = Arc::new(store());
        let detector = detector(store.clone(), DiscoveryMode::Auto);

        let columns = columns(&detector).await;
        assert_eq!(columns["email"].source, DiscoverySource::Auto);
        assert_eq!(store.scan_log()[0].limit, Some(500));
    }

    #[tokio::test]
    async fn test_auto_samples_more_with_indexes() {
        let description = users_description().with_index(
            "by_email",
            IndexKind::Global,
            vec![(KeyElement::hash("email"), ScalarAttributeType::S)],
        );
        let store = Arc::new(MockStore::new().with_table(description, users_items()));
        let detector = detector(store.clone(), DiscoveryMode::Auto);

        columns(&detector).await;
        assert_eq!(store.scan_log()[0].limit, Some(750));
    }

    #[tokio::test]
    async fn test_auto_degrades_to_hints_when_not_ready() {
        let description = users_description().with_status(TableStatus::Updating);
        let store = Arc::new(MockStore::new().with_table(description, users_items()));
        let detector = detector(store.clone(), DiscoveryMode::Auto);

        let columns = columns(&detector).await;
        assert_eq!(columns["email"].source, DiscoverySource::Hints);
        assert_eq!(store.scan_log()[0].limit, Some(100));
        assert_eq!(store.describe_count(), 1);
    }

    #[tokio::test]
    async fn test_detect_schema_returns_type_codes() {
        let store = Arc::new(store());
        let detector = detector(store, DiscoveryMode::Sampling);

        let schema = detector
            .detect_schema("users", DiscoveryContext::new())
            .await
            .unwrap()
            .into_inner();
        assert_eq!(schema["user_id"], 12);
        assert_eq!(schema["version"], 3);
    }

    #[tokio::test]
    async fn test_context_is_returned_with_result() {
        let store = Arc::new(store());
        let detector = detector(store, DiscoveryMode::Disabled);
        let ctx = DiscoveryContext::new();
        let id = ctx.correlation_id;

        let traced = detector.detect_column_metadata("users", ctx).await.unwrap();
        assert_eq!(traced.context.correlation_id, id);
    }

    #[tokio::test]
    async fn test_table_key_info() {
        let store = Arc::new(store());
        let detector = detector(store, DiscoveryMode::Disabled);

        let info = detector.table_key_info("users").await.unwrap();
        assert_eq!(info.primary_keys(), ["user_id", "version"]);
        assert!(info.secondary_keys().is_empty());
    }
}

mod fallback_tests {
    use super::*;

    #[tokio::test]
    async fn test_sampling_failure_falls_back_to_hints() {
        let store = Arc::new(
            store().with_scan_failures(1, || KeyqlError::Store("throttled".into())),
        );
        let detector = detector(store.clone(), DiscoveryMode::Sampling);

        let columns = columns(&detector).await;
        assert!(columns.contains_key("user_id"));
        assert!(columns.contains_key("version"));
        assert_eq!(columns["email"].source, DiscoverySource::Hints);
        assert_eq!(store.scan_count(), 2);
    }

    #[tokio::test]
    async fn test_hints_failure_falls_back_to_key_attributes() {
        let store = Arc::new(store().with_scan_failure(|| KeyqlError::Timeout("scan".into())));
        let detector = detector(store, DiscoveryMode::Sampling);

        let columns = columns(&detector).await;
        assert_eq!(columns.len(), 2);
        assert_eq!(columns["user_id"].source, DiscoverySource::KeySchema);
    }

    #[tokio::test]
    async fn test_everything_failing_gives_empty_map() {
        let store = Arc::new(
            store()
                .with_scan_failure(|| KeyqlError::Store("down".into()))
                .with_describe_failure(|| KeyqlError::Store("down".into())),
        );
        let detector = detector(store, DiscoveryMode::Auto);

        assert!(columns(&detector).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_table_gives_empty_map() {
        let store = Arc::new(store());
        let detector = detector(store, DiscoveryMode::Auto);

        let columns = detector
            .detect_column_metadata("ghost", DiscoveryContext::new())
            .await
            .unwrap();
        assert!(columns.value.is_empty());
    }

    #[tokio::test]
    async fn test_fatal_error_in_fallback_names_the_table() {
        let store = Arc::new(store().with_scan_failure(|| KeyqlError::Cancelled));
        let detector = detector(store, DiscoveryMode::Sampling);

        let error = detector
            .detect_column_metadata("users", DiscoveryContext::new())
            .await
            .unwrap_err();
        match error {
            KeyqlError::Discovery { table, source } => {
                assert_eq!(table, "users");
                assert!(matches!(*source, KeyqlError::Cancelled));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_hints_failure_skips_second_hints_attempt() {
        let store = Arc::new(store().with_scan_failure(|| KeyqlError::Store("down".into())));
        let detector = detector(store.clone(), DiscoveryMode::Hints);

        let columns = columns(&detector).await;
        assert_eq!(columns.len(), 2);
        assert_eq!(store.scan_count(), 1);
    }
}

mod memo_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_discovery_is_memoized() {
        let store = Arc::new(store());
        let detector = detector(store.clone(), DiscoveryMode::Sampling);

        let first = columns(&detector).await;
        let second = columns(&detector).await;
        assert_eq!(first, second);
        assert_eq!(store.scan_count(), 1);
        assert!(detector.memo().contains("users"));
    }

    #[tokio::test]
    async fn test_clear_cache_forces_rediscovery() {
        let store = Arc::new(store());
        let detector = detector(store.clone(), DiscoveryMode::Sampling);

        columns(&detector).await;
        detector.clear_cache();
        assert!(detector.memo().is_empty());
        columns(&detector).await;
        assert_eq!(store.scan_count(), 2);
    }

    #[tokio::test]
    async fn test_fallback_results_are_not_memoized() {
        let store = Arc::new(
            store().with_scan_failures(1, || KeyqlError::Store("throttled".into())),
        );
        let detector = detector(store.clone(), DiscoveryMode::Sampling);

        columns(&detector).await;
        assert!(!detector.memo().contains("users"));

        let columns = columns(&detector).await;
        assert_eq!(columns["email"].source, DiscoverySource::Sampling);
        assert!(detector.memo().contains("users"));
    }

    #[tokio::test]
    async fn test_rediscover_bypasses_memo() {
        let store = Arc::new(store());
        let detector = detector(store.clone(), DiscoveryMode::Sampling);

        columns(&detector).await;
        detector
            .rediscover("users", DiscoveryContext::new())
            .await
            .unwrap();
        assert_eq!(store.scan_count(), 2);
        assert_eq!(detector.memo().len(), 1);
    }

    #[test]
    fn test_memo_remove_reports_presence() {
        let memo = DiscoveryMemo::new();
        memo.insert("t", Default::default());
        assert!(memo.remove("t"));
        assert!(!memo.remove("t"));
    }

    #[tokio::test]
    async fn test_null_only_column() {
        let store = Arc::new(MockStore::new().with_table(
            users_description(),
            vec![item(&[
                ("user_id", s("u1")),
                ("version", n(1)),
                ("deleted_at", AttributeValue::Null),
            ])],
        ));
        let detector = detector(store, DiscoveryMode::Sampling);

        let columns = columns(&detector).await;
        assert_eq!(columns["deleted_at"].resolved_type, TypeCategory::Null);
        assert!(columns["deleted_at"].nullable);
    }
}
