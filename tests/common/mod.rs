//! Fake identity service and Swift object store served by axum.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

pub const USERNAME: &str = "tester";
pub const API_KEY: &str = "secret";
pub const TOKEN: &str = "test-token";
pub const REGION: &str = "DFW";
pub const ACCOUNT: &str = "MossoCloudFS_test";

#[derive(Clone)]
pub struct FakeSwift {
    /// Identity URL to authenticate against
    pub identity_url: String,
    /// Storage endpoint advertised in the catalog
    pub endpoint: String,
    page_size: usize,
    containers: Arc<Mutex<BTreeSet<String>>>,
    objects: Arc<Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>>,
    list_markers: Arc<Mutex<Vec<Option<String>>>>,
}

impl FakeSwift {
    /// Bind on an ephemeral port and serve until the test runtime ends.
    pub async fn start(page_size: usize) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let fake = FakeSwift {
            identity_url: format!("http://{}/v2.0/tokens", addr),
            endpoint: format!("http://{}/v1/{}", addr, ACCOUNT),
            page_size,
            containers: Arc::default(),
            objects: Arc::default(),
            list_markers: Arc::default(),
        };

        let app = Router::new()
            .route("/v2.0/tokens", post(tokens))
            .route("/v1/{account}", get(list_containers))
            .route("/v1/{account}/{container}", get(list_objects).put(create_container))
            .route(
                "/v1/{account}/{container}/{*key}",
                put(put_object).get(get_object).delete(delete_object),
            )
            .with_state(fake.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        fake
    }

    pub fn seed(&self, container: &str, objects: &[(&str, &str)]) {
        self.containers.lock().unwrap().insert(container.to_string());
        let mut all = self.objects.lock().unwrap();
        let bucket = all.entry(container.to_string()).or_default();
        for (key, data) in objects {
            bucket.insert(key.to_string(), data.as_bytes().to_vec());
        }
    }

    pub fn object(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(container)
            .and_then(|bucket| bucket.get(key).cloned())
    }

    pub fn keys(&self, container: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .get(container)
            .map(|bucket| bucket.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_markers(&self) -> Vec<Option<String>> {
        self.list_markers.lock().unwrap().clone()
    }

    fn page<'a>(&self, names: impl Iterator<Item = &'a String>, marker: Option<&str>) -> Response {
        let page: Vec<&str> = names
            .filter(|name| marker.is_none_or(|m| name.as_str() > m))
            .take(self.page_size)
            .map(String::as_str)
            .collect();

        if page.is_empty() {
            StatusCode::NO_CONTENT.into_response()
        } else {
            (StatusCode::OK, format!("{}\n", page.join("\n"))).into_response()
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("x-auth-token")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == TOKEN)
}

async fn tokens(State(fake): State<FakeSwift>, Json(body): Json<Value>) -> Response {
    let creds = &body["auth"]["RAX-KSKEY:apiKeyCredentials"];
    if creds["username"] != USERNAME || creds["apiKey"] != API_KEY {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    Json(json!({
        "access": {
            "token": { "id": TOKEN, "expires": "2099-01-01T00:00:00.000-05:00" },
            "serviceCatalog": [
                {
                    "name": "cloudServersOpenStack",
                    "type": "compute",
                    "endpoints": [{ "region": REGION, "publicURL": "http://compute.invalid" }]
                },
                {
                    "name": "cloudFiles",
                    "type": "object-store",
                    "endpoints": [{
                        "region": REGION,
                        "publicURL": fake.endpoint,
                        "internalURL": fake.endpoint
                    }]
                }
            ]
        }
    }))
    .into_response()
}

#[derive(Deserialize)]
struct ListQuery {
    marker: Option<String>,
}

async fn list_containers(
    State(fake): State<FakeSwift>,
    Path(_account): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    fake.list_markers.lock().unwrap().push(query.marker.clone());

    let containers = fake.containers.lock().unwrap().clone();
    fake.page(containers.iter(), query.marker.as_deref())
}

async fn list_objects(
    State(fake): State<FakeSwift>,
    Path((_account, container)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    fake.list_markers.lock().unwrap().push(query.marker.clone());

    let names: Vec<String> = match fake.objects.lock().unwrap().get(&container) {
        Some(bucket) => bucket.keys().cloned().collect(),
        None => return StatusCode::NOT_FOUND.into_response(),
    };
    fake.page(names.iter(), query.marker.as_deref())
}

async fn create_container(
    State(fake): State<FakeSwift>,
    Path((_account, container)): Path<(String, String)>,
    headers: HeaderMap,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    fake.objects
        .lock()
        .unwrap()
        .entry(container.clone())
        .or_default();
    if fake.containers.lock().unwrap().insert(container) {
        StatusCode::CREATED
    } else {
        StatusCode::ACCEPTED
    }
}

async fn put_object(
    State(fake): State<FakeSwift>,
    Path((_account, container, key)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    match fake.objects.lock().unwrap().get_mut(&container) {
        Some(bucket) => {
            bucket.insert(key, body.to_vec());
            StatusCode::CREATED
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn get_object(
    State(fake): State<FakeSwift>,
    Path((_account, container, key)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match fake.object(&container, &key) {
        Some(data) => (StatusCode::OK, data).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_object(
    State(fake): State<FakeSwift>,
    Path((_account, container, key)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    let removed = fake
        .objects
        .lock()
        .unwrap()
        .get_mut(&container)
        .and_then(|bucket| bucket.remove(&key));
    match removed {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}
