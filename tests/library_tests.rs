//! Library flows: adding, refreshing and removing series.

mod common;

use animedl::domain::DownloadStatus;
use animedl::models::catalog::CatalogEntry;
use animedl::services::LibraryError;
use common::TestEnv;

fn entry(env: &TestEnv, title: &str) -> CatalogEntry {
    CatalogEntry {
        title: title.to_string(),
        url: format!("{}/anime/7-{}", env.site.base, title.to_lowercase()),
        cover_image: None,
        id: 7,
        slug: title.to_lowercase(),
        plot: Some("A plot.".to_string()),
        episodes_count: Some(2),
        year: Some("2023".to_string()),
        studio: Some("Madhouse".to_string()),
    }
}

#[tokio::test]
async fn test_add_series_without_worker_records_pending_episodes() {
    let env = TestEnv::new().await;
    env.source.set_episodes(vec![
        ("1", env.episode_url("801")),
        ("2", env.episode_url("802")),
    ]);

    let result = env
        .state
        .library
        .add_series(&entry(&env, "Frieren"))
        .await
        .unwrap();

    assert!(result.created);
    assert!(!result.dispatched);
    assert_eq!(result.episodes, 2);
    assert_eq!(result.queued, 0);
    assert_eq!(result.series.status, DownloadStatus::Pending);
    assert_eq!(result.series.catalog_id, Some(7));

    let episodes = env.state.store.list_episodes(result.series.id).await.unwrap();
    assert_eq!(episodes.len(), 2);
    assert!(episodes.iter().all(|e| e.status == DownloadStatus::Pending));
    assert!(env.drain_queue().await.is_empty());
}

#[tokio::test]
async fn test_add_series_twice_refreshes_and_resets_stopped_episodes() {
    let env = TestEnv::new().await;
    env.source.set_episodes(vec![
        ("1", env.episode_url("811")),
        ("2", env.episode_url("812")),
    ]);

    let first = env
        .state
        .library
        .add_series(&entry(&env, "Mushishi"))
        .await
        .unwrap();
    let episodes = env.state.store.list_episodes(first.series.id).await.unwrap();
    env.state.machine.skip(episodes[0].id).await.unwrap();
    env.state
        .store
        .mark_episode_completed(episodes[1].id, "/media/done.mp4")
        .await
        .unwrap();

    env.state.queue.open();
    let second = env
        .state
        .library
        .add_series(&entry(&env, "Mushishi"))
        .await
        .unwrap();

    assert!(!second.created);
    assert_eq!(second.series.id, first.series.id);
    assert!(second.dispatched);
    assert_eq!(second.queued, 1);
    assert_eq!(env.drain_queue().await, vec![episodes[0].id]);

    let statuses = env.state.store.episode_statuses(first.series.id).await.unwrap();
    assert_eq!(
        statuses,
        vec![DownloadStatus::Pending, DownloadStatus::Completed]
    );
}

#[tokio::test]
async fn test_add_series_writes_metadata() {
    let env = TestEnv::with_metadata(true).await;
    env.source.set_episodes(vec![("1", env.episode_url("821"))]);

    let result = env
        .state
        .library
        .add_series(&entry(&env, "Monster"))
        .await
        .unwrap();

    let dir = env.state.layout.series_dir(&result.series.directory_name);
    let nfo = tokio::fs::read_to_string(dir.join("tvshow.nfo")).await.unwrap();
    assert!(nfo.contains("<title>Monster</title>"));
    assert!(nfo.contains("<studio>Madhouse</studio>"));
    assert!(!dir.join("poster.jpg").exists());
}

#[tokio::test]
async fn test_delete_series_removes_rows_and_files() {
    let env = TestEnv::with_metadata(true).await;
    env.source.set_episodes(vec![("1", env.episode_url("831"))]);

    let added = env
        .state
        .library
        .add_series(&entry(&env, "Dororo"))
        .await
        .unwrap();
    let dir = env.state.layout.series_dir(&added.series.directory_name);
    assert!(dir.exists());

    let removed = env
        .state
        .library
        .delete_series(added.series.id)
        .await
        .unwrap();
    assert_eq!(removed.title, "Dororo");

    assert!(env.state.store.get_series(added.series.id).await.unwrap().is_none());
    assert!(
        env.state
            .store
            .list_episodes(added.series.id)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(!dir.exists());

    let err = env
        .state
        .library
        .delete_series(added.series.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LibraryError::SeriesNotFound(_)));
}

#[tokio::test]
async fn test_delete_dot_titled_series_keeps_other_series() {
    let env = TestEnv::with_metadata(true).await;
    env.source.set_episodes(vec![("1", env.episode_url("841"))]);

    let kept = env
        .state
        .library
        .add_series(&entry(&env, "Mononoke"))
        .await
        .unwrap();
    let kept_dir = env.state.layout.series_dir(&kept.series.directory_name);
    assert!(kept_dir.join("tvshow.nfo").exists());

    let dotted = env
        .state
        .library
        .add_series(&entry(&env, ".."))
        .await
        .unwrap();
    assert_eq!(dotted.series.directory_name, "Untitled");
    assert!(
        env.state
            .layout
            .series_dir("Untitled")
            .join("tvshow.nfo")
            .exists()
    );

    env.state
        .library
        .delete_series(dotted.series.id)
        .await
        .unwrap();

    assert!(env.state.layout.media_root().exists());
    assert!(kept_dir.join("tvshow.nfo").exists());
    assert!(!env.state.layout.series_dir("Untitled").exists());
}
