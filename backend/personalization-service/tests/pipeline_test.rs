//! End-to-end flows over the in-memory collaborators: behavioral signals
//! feed interest profiles, and profiles drive content recommendations.

use personalization_service::config::SignalConfig;
use personalization_service::embedding::StubEmbedder;
use personalization_service::index::StubSearchIndex;
use personalization_service::models::{ActionKind, Modality};
use personalization_service::services::{ProfileService, RecommendService, SignalStore};
use personalization_service::store::InMemoryStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct TestRig {
    signals: Arc<SignalStore>,
    index: Arc<StubSearchIndex>,
    embedder: Arc<StubEmbedder>,
    recommend: RecommendService,
}

fn rig() -> TestRig {
    let store: Arc<InMemoryStore> = Arc::new(InMemoryStore::new());
    let index = Arc::new(StubSearchIndex::new());
    let embedder = Arc::new(StubEmbedder::new(2));
    let signals = Arc::new(SignalStore::new(
        store.clone(),
        embedder.clone(),
        SignalConfig::default(),
    ));
    let profiles = Arc::new(ProfileService::new(
        signals.clone(),
        index.clone(),
        store,
        2,
        Duration::from_secs(60),
    ));
    let recommend = RecommendService::new(profiles, signals.clone(), index.clone());
    TestRig {
        signals,
        index,
        embedder,
        recommend,
    }
}

#[tokio::test]
async fn liked_content_drives_recommendation_order() {
    let rig = rig();
    let user = Uuid::new_v4();

    rig.index
        .add_content(Modality::Post, "gardening-1", vec![1.0, 0.0])
        .await;
    rig.index
        .add_content(Modality::Post, "gardening-2", vec![0.95, 0.05])
        .await;
    rig.index
        .add_content(Modality::Post, "finance-1", vec![0.0, 1.0])
        .await;
    rig.signals
        .record(user, Modality::Post, ActionKind::Like, "gardening-1")
        .await
        .unwrap();

    let ids = rig
        .recommend
        .recommend(user, Modality::Post, 10)
        .await
        .unwrap();
    assert_eq!(ids[0], "gardening-1");
    assert_eq!(ids[1], "gardening-2");
    assert_eq!(ids[2], "finance-1");
}

#[tokio::test]
async fn viewed_content_never_resurfaces() {
    let rig = rig();
    let user = Uuid::new_v4();

    rig.index
        .add_content(Modality::Post, "liked", vec![1.0, 0.0])
        .await;
    rig.index
        .add_content(Modality::Post, "seen", vec![0.9, 0.1])
        .await;
    rig.index
        .add_content(Modality::Post, "fresh", vec![0.8, 0.2])
        .await;
    rig.signals
        .record(user, Modality::Post, ActionKind::Like, "liked")
        .await
        .unwrap();
    rig.signals
        .mark_viewed(user, Modality::Post, "seen")
        .await
        .unwrap();

    let ids = rig
        .recommend
        .recommend(user, Modality::Post, 10)
        .await
        .unwrap();
    assert!(!ids.contains(&"seen".to_string()));
    assert!(ids.contains(&"fresh".to_string()));
}

#[tokio::test]
async fn new_user_gets_empty_list_without_knn_traffic() {
    let rig = rig();

    let ids = rig
        .recommend
        .recommend(Uuid::new_v4(), Modality::Video, 10)
        .await
        .unwrap();
    assert!(ids.is_empty());
    assert_eq!(rig.index.knn_queries(), 0);
}

#[tokio::test]
async fn repeat_calls_reuse_the_cached_profile() {
    let rig = rig();
    let user = Uuid::new_v4();

    rig.index
        .add_content(Modality::Post, "a", vec![1.0, 0.0])
        .await;
    rig.signals
        .record(user, Modality::Post, ActionKind::Like, "a")
        .await
        .unwrap();

    rig.recommend.recommend(user, Modality::Post, 5).await.unwrap();
    let fetches_after_first = rig.index.vector_fetches();
    rig.recommend.recommend(user, Modality::Post, 5).await.unwrap();
    rig.recommend.recommend(user, Modality::Post, 5).await.unwrap();

    assert_eq!(rig.index.vector_fetches(), fetches_after_first);
}

#[tokio::test]
async fn keywords_alone_personalize_a_user_without_actions() {
    let rig = rig();
    let user = Uuid::new_v4();

    rig.index
        .add_content(Modality::Post, "astronomy", vec![0.0, 1.0])
        .await;
    rig.index
        .add_content(Modality::Post, "cooking", vec![1.0, 0.0])
        .await;
    rig.embedder.insert("space", vec![0.0, 1.0]).await;
    rig.signals.record_keyword(user, "space").await.unwrap();

    let ids = rig
        .recommend
        .recommend(user, Modality::Post, 10)
        .await
        .unwrap();
    assert_eq!(ids[0], "astronomy");
}
