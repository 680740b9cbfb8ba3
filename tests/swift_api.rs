//! Authentication and Swift store behaviour against a fake HTTP service.

mod common;

use std::sync::Arc;

use common::{API_KEY, FakeSwift, REGION, TOKEN, USERNAME};
use haste::auth::{Credentials, Session, authenticate};
use haste::config::AuthMethod;
use haste::core::{Action, ObjectKey, WorkerPool};
use haste::error::HasteError;
use haste::store::{ObjectStore, SwiftStore, TransferError};
use tempfile::tempdir;

fn credentials(secret: &str) -> Credentials {
    Credentials {
        username: USERNAME.to_string(),
        secret: secret.to_string(),
        method: AuthMethod::ApiKey,
        tenant: None,
    }
}

fn store_for(fake: &FakeSwift, container: Option<&str>) -> Arc<SwiftStore> {
    let session = Session::new(TOKEN, fake.endpoint.clone(), REGION)
        .with_container(container.map(str::to_string));
    Arc::new(SwiftStore::new(reqwest::Client::new(), Arc::new(session)))
}

#[tokio::test]
async fn authenticate_resolves_region_endpoint() {
    let fake = FakeSwift::start(100).await;
    let client = reqwest::Client::new();

    let session = authenticate(&client, &fake.identity_url, &credentials(API_KEY), REGION, false)
        .await
        .unwrap();

    assert_eq!(session.token, TOKEN);
    assert_eq!(session.endpoint, fake.endpoint);
    assert_eq!(session.region, REGION);
    assert!(session.expires.is_some());
    assert!(session.container.is_none());
}

#[tokio::test]
async fn unknown_region_is_not_a_transport_failure() {
    let fake = FakeSwift::start(100).await;
    let client = reqwest::Client::new();

    let err = authenticate(&client, &fake.identity_url, &credentials(API_KEY), "SYD", false)
        .await
        .unwrap_err();
    assert!(matches!(err, HasteError::RegionNotFound { ref region, .. } if region == "SYD"));

    // Nothing listens on a port we just released
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}/v2.0/tokens", listener.local_addr().unwrap());
    drop(listener);

    let err = authenticate(&client, &dead, &credentials(API_KEY), REGION, false)
        .await
        .unwrap_err();
    assert!(matches!(err, HasteError::AuthTransport(_)));
}

#[tokio::test]
async fn rejected_credentials_report_the_status() {
    let fake = FakeSwift::start(100).await;
    let client = reqwest::Client::new();

    let err = authenticate(&client, &fake.identity_url, &credentials("wrong"), REGION, false)
        .await
        .unwrap_err();
    assert!(matches!(err, HasteError::AuthRejected { status: 401 }));
}

#[tokio::test]
async fn listing_follows_markers_until_an_empty_page() {
    let fake = FakeSwift::start(2).await;
    fake.seed(
        "photos",
        &[("a.jpg", "1"), ("b.jpg", "2"), ("c/d.jpg", "3"), ("e.jpg", "4")],
    );
    let store = store_for(&fake, Some("photos"));

    assert_eq!(store.list(None).await.unwrap(), vec!["a.jpg", "b.jpg"]);
    assert_eq!(store.list(Some("b.jpg")).await.unwrap(), vec!["c/d.jpg", "e.jpg"]);
    assert!(store.list(Some("e.jpg")).await.unwrap().is_empty());

    assert_eq!(
        fake.list_markers(),
        vec![None, Some("b.jpg".to_string()), Some("e.jpg".to_string())]
    );
}

#[tokio::test]
async fn listing_a_missing_container_fails_with_status() {
    let fake = FakeSwift::start(10).await;
    let store = store_for(&fake, Some("nope"));

    let err = store.list(None).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn account_listing_names_containers() {
    let fake = FakeSwift::start(10).await;
    fake.seed("alpha", &[]);
    fake.seed("beta", &[("x", "1")]);
    let store = store_for(&fake, None);

    assert_eq!(store.list(None).await.unwrap(), vec!["alpha", "beta"]);
}

#[tokio::test]
async fn create_container_is_idempotent() {
    let fake = FakeSwift::start(10).await;
    let store = store_for(&fake, Some("fresh"));

    assert_eq!(store.create_container().await.unwrap(), 201);
    assert_eq!(store.create_container().await.unwrap(), 202);
}

#[tokio::test]
async fn upload_and_download_stream_file_contents() {
    let fake = FakeSwift::start(10).await;
    fake.seed("docs", &[]);
    let store = store_for(&fake, Some("docs"));
    let temp = tempdir().unwrap();

    let source = temp.path().join("report 2014.txt");
    std::fs::write(&source, b"quarterly numbers").unwrap();
    let key = ObjectKey::new("reports/report 2014.txt").unwrap();

    assert_eq!(store.upload(&key, &source).await.unwrap(), 17);
    assert_eq!(
        fake.object("docs", "reports/report 2014.txt").unwrap(),
        b"quarterly numbers"
    );

    let dest = temp.path().join("restore/reports/report 2014.txt");
    assert_eq!(store.download(&key, &dest).await.unwrap(), 17);
    assert_eq!(std::fs::read(&dest).unwrap(), b"quarterly numbers");
}

#[tokio::test]
async fn failed_download_creates_no_file() {
    let fake = FakeSwift::start(10).await;
    fake.seed("docs", &[]);
    let store = store_for(&fake, Some("docs"));
    let temp = tempdir().unwrap();

    let dest = temp.path().join("missing.txt");
    let err = store
        .download(&ObjectKey::new("missing.txt").unwrap(), &dest)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(!dest.exists());
}

#[tokio::test]
async fn listed_names_address_the_listed_object() {
    let fake = FakeSwift::start(10).await;
    fake.seed(
        "box",
        &[("/lead", "slash"), ("lead", "plain"), ("x/./y", "dot"), ("x/y", "xy")],
    );
    let store = store_for(&fake, Some("box"));
    let temp = tempdir().unwrap();

    let names = store.list(None).await.unwrap();
    assert_eq!(names, vec!["/lead", "lead", "x/./y", "x/y"]);

    let lead = ObjectKey::new(names[0].clone()).unwrap();
    let dest = temp.path().join("lead");
    assert_eq!(store.download(&lead, &dest).await.unwrap(), 5);
    assert_eq!(std::fs::read_to_string(&dest).unwrap(), "slash");

    let dotted = ObjectKey::new(names[2].clone()).unwrap();
    let dest = temp.path().join("dotted");
    let err = store.download(&dotted, &dest).await.unwrap_err();
    assert!(matches!(err, TransferError::UnaddressableKey(ref k) if k == "x/./y"));
    assert!(!dest.exists());

    store.delete(&lead).await.unwrap();
    assert_eq!(fake.keys("box"), vec!["lead", "x/./y", "x/y"]);
}

#[tokio::test]
async fn deleting_twice_is_an_isolated_failure() {
    let fake = FakeSwift::start(10).await;
    fake.seed("trash", &[("old.log", "x")]);
    let store = store_for(&fake, Some("trash"));

    let pool = WorkerPool::spawn(2, store, Action::Delete).unwrap();
    pool.submit(ObjectKey::new("old.log").unwrap()).await.unwrap();
    pool.submit(ObjectKey::new("old.log").unwrap()).await.unwrap();
    let report = pool.finish().await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("404"));
    assert!(fake.keys("trash").is_empty());
}
