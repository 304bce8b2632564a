//! Configuration mirror against mocked and in-memory services

use async_trait::async_trait;
use folio_core::{
    default_models, ConfigMirror, ConfigRole, EventChannel, ModelCatalog, Services, Topic,
    Workspace, WorkspaceConfig, WorkspaceError,
};
use folio_store::{ActiveConfiguration, ConfigService, StoreError};
use folio_test_utils::{InMemoryBackend, Operation};
use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mock! {
    Config {}

    #[async_trait]
    impl ConfigService for Config {
        async fn active(&self) -> Result<ActiveConfiguration, StoreError>;
        async fn update(&self, role: ConfigRole, model_name: &str) -> Result<ActiveConfiguration, StoreError>;
        async fn models(&self) -> Result<Vec<String>, StoreError>;
    }
}

fn active(generator: &str, retrieval: &str) -> ActiveConfiguration {
    ActiveConfiguration {
        generator_role: generator.to_string(),
        retrieval_role: retrieval.to_string(),
    }
}

fn counter(channel: &EventChannel) -> (Arc<AtomicUsize>, folio_core::Subscription) {
    let count = Arc::new(AtomicUsize::new(0));
    let subscription = {
        let count = count.clone();
        channel.subscribe(Topic::CONFIGURATION_CHANGED, move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };
    (count, subscription)
}

#[tokio::test]
async fn unavailable_model_never_reaches_the_network() {
    let mut service = MockConfig::new();
    service.expect_update().never();
    service.expect_active().never();

    let channel = EventChannel::new();
    let (published, _subscription) = counter(&channel);
    let mirror = ConfigMirror::new(
        Arc::new(service),
        channel.clone(),
        ModelCatalog::new(default_models()),
    );

    let err = mirror
        .write(ConfigRole::Generator, "gpt-4o-mini")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        WorkspaceError::UnsupportedModel {
            model: "gpt-4o-mini".to_string()
        }
    );
    assert_eq!(published.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn write_delegates_then_publishes() {
    let mut service = MockConfig::new();
    service
        .expect_update()
        .withf(|role, model| *role == ConfigRole::Generator && model.to_string() == "gpt-4.1")
        .times(1)
        .returning(|_, _| Ok(active("gpt-4.1", "gpt-3.5-turbo")));

    let channel = EventChannel::new();
    let (published, _subscription) = counter(&channel);
    let mirror = ConfigMirror::new(
        Arc::new(service),
        channel.clone(),
        ModelCatalog::new(default_models()),
    );

    let config = mirror.write(ConfigRole::Generator, "gpt-4.1").await.unwrap();

    assert_eq!(config.generator_role, "gpt-4.1");
    assert_eq!(published.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_read_surfaces_unavailable_store() {
    let mut service = MockConfig::new();
    service
        .expect_active()
        .times(1)
        .returning(|| Err(StoreError::transport("read configuration", "connection refused")));

    let mirror = ConfigMirror::new(
        Arc::new(service),
        EventChannel::new(),
        ModelCatalog::default(),
    );

    let err = mirror.read().await.unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::BackingStoreUnavailable { ref resource, .. } if resource == "configuration"
    ));
    assert!(mirror.cached().is_none());
}

#[tokio::test]
async fn change_made_elsewhere_is_mirrored_after_sync() {
    let backend = Arc::new(InMemoryBackend::new());
    let settings = Workspace::new(WorkspaceConfig::default(), backend.clone());
    settings.navigate().await.unwrap();

    let services = Services::shared(backend.clone());
    let badge = ConfigMirror::new(
        services.config,
        settings.channel().clone(),
        ModelCatalog::new(default_models()),
    );
    let badge = Arc::new(badge);
    let _subscription = badge.subscribe(settings.channel());
    badge.read().await.unwrap();

    settings
        .mirror()
        .write(ConfigRole::Retrieval, "gpt-4o")
        .await
        .unwrap();
    assert!(badge.is_stale());
    assert_eq!(badge.cached().unwrap().retrieval_role, "gpt-3.5-turbo");

    let report = settings.sync().await.unwrap();
    assert!(report.configuration);
    assert!(badge.sync_pending().await.unwrap());
    assert_eq!(badge.cached().unwrap().retrieval_role, "gpt-4o");
    assert_eq!(backend.count(Operation::UpdateConfig), 1);
}
