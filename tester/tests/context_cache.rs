//! Runtime context cache behaviour: reuse, invalidation and single-flight builds

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::CountingBuilder;
use tester::runtime::{MockContextBuilder, MockContextHandle};
use tester::{
    BootstrapError, BuildRequest, CacheError, CacheKey, ContextCache, ContextState, Profile, RuntimeContext, TestClass,
};

fn cache_with(builder: &CountingBuilder) -> Arc<ContextCache> {
    Arc::new(ContextCache::new(builder.clone().into_shared()))
}

fn key_of(class: &TestClass, profile: Option<&Profile>) -> CacheKey {
    CacheKey::derive(class, profile)
}

mod reuse_tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_returns_same_context() {
        let builder = CountingBuilder::new();
        let cache = cache_with(&builder);
        let class = TestClass::new("GreetingTest");

        let first = tokio_test::assert_ok!(cache.get_context(&class, None).await);
        let second = tokio_test::assert_ok!(cache.get_context(&class, None).await);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builder.builds(), 1);
        assert_eq!(builder.releases(), 0);
        let stats = cache.stats();
        assert_eq!((stats.requests, stats.builds, stats.reuses), (2, 1, 1));
    }

    #[tokio::test]
    async fn test_classes_without_exclusive_resources_share_a_context() {
        let builder = CountingBuilder::new();
        let cache = cache_with(&builder);
        let profile = Profile::new("it");

        let a = cache.get_context(&TestClass::new("A"), Some(&profile)).await.unwrap();
        let b = cache.get_context(&TestClass::new("B"), Some(&profile)).await.unwrap();

        assert_eq!(a.id(), b.id());
        assert_eq!(a.profile(), "it");
        assert_eq!(builder.builds(), 1);
    }

    #[tokio::test]
    async fn test_mocked_builder_is_called_once() {
        let mut builder = MockContextBuilder::new();
        builder.expect_build().times(1).returning(|request| {
            let mut handle = MockContextHandle::new();
            handle.expect_release().times(0..=1).returning(|| Ok(()));
            Ok(RuntimeContext::new(request, handle))
        });
        let cache = ContextCache::new(Arc::new(builder));
        let class = TestClass::new("A");

        for _ in 0..3 {
            cache.get_context(&class, None).await.unwrap();
        }
        assert_eq!(cache.stats().reuses, 2);
    }
}

mod invalidation_tests {
    use super::*;

    #[tokio::test]
    async fn test_profile_change_releases_previous_context() {
        let builder = CountingBuilder::new();
        let cache = cache_with(&builder);
        let class = TestClass::new("A");
        let profile = Profile::new("postgres");

        let plain = cache.get_context(&class, None).await.unwrap();
        let profiled = cache.get_context(&class, Some(&profile)).await.unwrap();

        assert_ne!(plain.id(), profiled.id());
        assert!(plain.is_released());
        assert_eq!(builder.releases(), 1);
        assert_eq!(builder.builds(), 2);
        assert_eq!(cache.state_of(&key_of(&class, None)).await, ContextState::Absent);
        assert_eq!(cache.state_of(&key_of(&class, Some(&profile))).await, ContextState::Ready);
        assert_eq!(cache.current_key().await, Some(key_of(&class, Some(&profile))));
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[tokio::test]
    async fn test_exclusivity_toggle_releases_in_both_directions() {
        let builder = CountingBuilder::new();
        let cache = cache_with(&builder);
        let shared = TestClass::new("Shared");
        let exclusive = TestClass::builder("Exclusive").exclusive_resource("kafka").build();

        cache.get_context(&shared, None).await.unwrap();
        cache.get_context(&exclusive, None).await.unwrap();
        cache.get_context(&shared, None).await.unwrap();

        assert_eq!(builder.builds(), 3);
        assert_eq!(builder.releases(), 2);
        assert_eq!(cache.stats().invalidations, 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_a_rebuild() {
        let builder = CountingBuilder::new();
        let cache = cache_with(&builder);
        let class = TestClass::new("A");
        let key = key_of(&class, None);

        let first = cache.get_context(&class, None).await.unwrap();
        assert!(cache.invalidate(&key).await);
        assert!(first.is_released());
        assert_eq!(cache.state_of(&key).await, ContextState::Absent);
        assert!(!cache.invalidate(&key).await);

        let second = cache.get_context(&class, None).await.unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(builder.builds(), 2);
        assert_eq!(builder.releases(), 1);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[tokio::test]
    async fn test_refresh_rebuilds_from_recorded_request() {
        let builder = CountingBuilder::new();
        let cache = cache_with(&builder);
        let profile = Profile::new("it");
        let class = TestClass::new("A");

        let first = cache.get_context(&class, Some(&profile)).await.unwrap();
        let refreshed = cache.refresh(first.key()).await.unwrap();

        assert_ne!(first.id(), refreshed.id());
        assert_eq!(refreshed.profile(), "it");
        assert!(first.is_released());
        assert_eq!(builder.builds(), 2);
    }

    #[tokio::test]
    async fn test_refresh_of_unknown_key_fails() {
        let cache = cache_with(&CountingBuilder::new());
        let key = key_of(&TestClass::new("Never"), None);
        assert_matches!(cache.refresh(&key).await, Err(CacheError::NotRecorded { .. }));
    }

    #[tokio::test]
    async fn test_close_releases_everything_and_rejects_requests() {
        let builder = CountingBuilder::new();
        let cache = cache_with(&builder);
        let class = TestClass::new("A");

        let context = cache.get_context(&class, None).await.unwrap();
        assert_eq!(cache.close().await, 1);
        assert!(context.is_released());
        assert_eq!(builder.releases(), 1);
        assert_matches!(cache.get_context(&class, None).await, Err(CacheError::Closed));
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_build() {
        let builder = CountingBuilder::new().with_delay(Duration::from_millis(100));
        let cache = cache_with(&builder);

        let mut tasks = Vec::new();
        for i in 0..10 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                cache.get_context(&TestClass::new(format!("T{i}")), None).await
            }));
        }

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap().id());
        }

        assert_eq!(builder.builds(), 1);
        assert!(ids.iter().all(|id| *id == ids[0]));
        let stats = cache.stats();
        assert_eq!(stats.builds, 1);
        assert_eq!(stats.coalesced + stats.reuses, 9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failure_reaches_every_waiter_once() {
        let builder = CountingBuilder::new()
            .with_delay(Duration::from_millis(100))
            .failing_first(1, "datasource unreachable");
        let cache = cache_with(&builder);
        let class = TestClass::new("A");

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let class = class.clone();
            tasks.push(tokio::spawn(async move { cache.get_context(&class, None).await }));
        }
        for task in tasks {
            let result = task.await.unwrap();
            assert_matches!(result, Err(CacheError::Bootstrap(BootstrapError::BuildFailed { ref message, .. })) if message == "datasource unreachable");
        }
        assert_eq!(builder.builds(), 1);

        // Replayed once without calling the builder
        assert_matches!(cache.get_context(&class, None).await, Err(CacheError::Bootstrap(_)));
        assert_eq!(builder.builds(), 1);

        // Then the key is clear for a retry
        let context = cache.get_context(&class, None).await.unwrap();
        assert_eq!(builder.builds(), 2);
        assert!(!context.is_released());
        assert_eq!(cache.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_builder_panic_is_a_bootstrap_error() {
        let builder = CountingBuilder::new().panicking();
        let cache = cache_with(&builder);

        let result = cache.get_context(&TestClass::new("A"), None).await;
        assert_matches!(
            result,
            Err(CacheError::Bootstrap(BootstrapError::BuildPanicked { ref test_class })) if test_class == "A"
        );
    }

    #[tokio::test]
    async fn test_state_is_building_while_in_flight() {
        let builder = CountingBuilder::new().with_delay(Duration::from_millis(200));
        let cache = cache_with(&builder);
        let class = TestClass::new("A");
        let key = key_of(&class, None);

        let waiter = {
            let cache = cache.clone();
            let class = class.clone();
            tokio::spawn(async move { cache.get_context(&class, None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.state_of(&key).await, ContextState::Building);

        waiter.await.unwrap().unwrap();
        assert_eq!(cache.state_of(&key).await, ContextState::Ready);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_strand_the_build() {
        let builder = CountingBuilder::new().with_delay(Duration::from_millis(150));
        let cache = cache_with(&builder);
        let class = TestClass::new("A");

        let impatient = tokio::time::timeout(Duration::from_millis(20), cache.get_context(&class, None)).await;
        assert!(impatient.is_err());

        let context = cache.get_context(&class, None).await.unwrap();
        assert!(!context.is_released());
        assert_eq!(builder.builds(), 1);
    }

    #[tokio::test]
    async fn test_build_overtaken_by_another_key_is_released() {
        let builder = CountingBuilder::new().with_delay(Duration::from_millis(100));
        let cache = cache_with(&builder);
        let class = TestClass::new("A");
        let first_profile = Profile::new("p");
        let second_profile = Profile::new("q");

        let overtaken = {
            let cache = cache.clone();
            let class = class.clone();
            let profile = first_profile.clone();
            tokio::spawn(async move { cache.get_context(&class, Some(&profile)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let current = cache.get_context(&class, Some(&second_profile)).await.unwrap();

        assert_matches!(overtaken.await.unwrap(), Err(CacheError::Superseded { .. }));
        assert!(!current.is_released());
        assert_eq!(cache.state_of(&key_of(&class, Some(&first_profile))).await, ContextState::Absent);
        assert_eq!(cache.state_of(&key_of(&class, Some(&second_profile))).await, ContextState::Ready);
        assert_eq!(cache.current_key().await, Some(key_of(&class, Some(&second_profile))));
        assert_eq!(builder.builds(), 2);
        assert_eq!(builder.releases(), 1);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[tokio::test]
    async fn test_slow_release_does_not_block_other_callers() {
        let builder = CountingBuilder::new().with_release_delay(Duration::from_millis(300));
        let cache = cache_with(&builder);
        let class = TestClass::new("A");
        let first_profile = Profile::new("p");
        let second_profile = Profile::new("q");

        cache.get_context(&class, Some(&first_profile)).await.unwrap();
        let switch = {
            let cache = cache.clone();
            let class = class.clone();
            let profile = second_profile.clone();
            tokio::spawn(async move { cache.get_context(&class, Some(&profile)).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        // The evicted context is still releasing, yet the cache answers
        let state = tokio::time::timeout(
            Duration::from_millis(100),
            cache.state_of(&key_of(&class, Some(&first_profile))),
        )
        .await;
        assert_eq!(tokio_test::assert_ok!(state), ContextState::Absent);
        assert_eq!(builder.releases(), 0);

        switch.await.unwrap().unwrap();
        assert_eq!(builder.releases(), 1);
        assert_eq!(cache.state_of(&key_of(&class, Some(&second_profile))).await, ContextState::Ready);
    }

    #[tokio::test]
    async fn test_build_request_derives_the_same_key() {
        let profile = Profile::builder("p").exclusive_resource("db").build();
        let class = TestClass::new("A");
        let request = BuildRequest::new(class.clone(), Some(profile.clone()));
        assert_eq!(request.key(), key_of(&class, Some(&profile)));
    }
}
