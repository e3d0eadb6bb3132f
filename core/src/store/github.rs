use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::GithubStoreConfig,
    document_store::{DocumentStore, VersionConflict},
    menu::MenuDocument,
};

const BACKEND_NAME: &str = "github";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Menu document committed to a GitHub repository through the contents API.
///
/// Every save re-reads the file `sha` and submits the new content keyed to it.
/// GitHub rejects the write with `409` when the file moved on in between, or
/// with `422` when a file appeared after we saw none.
pub struct GithubDocumentStore {
    client: Client,
    token: String,
    branch: String,
    contents_url: Url,
}

/// Remote file content together with its version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub sha: String,
    pub bytes: Vec<u8>,
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

impl GithubDocumentStore {
    pub fn new(client: Client, config: GithubStoreConfig) -> Result<Self> {
        let token = config
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| anyhow!("github access token is not configured"))?;
        let repository = config
            .repository
            .ok_or_else(|| anyhow!("github repository is not configured"))?;
        let contents_url = contents_url(&config.api_url, &repository, &config.path)?;

        Ok(Self {
            client,
            token,
            branch: config.branch,
            contents_url,
        })
    }

    pub fn contents_url(&self) -> &Url {
        &self.contents_url
    }

    /// Fetches the current file, or `None` if it does not exist on the branch.
    pub async fn fetch(&self) -> Result<Option<RemoteFile>> {
        let response = self
            .authorized(self.client.get(self.contents_url.clone()))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .with_context(|| format!("request {}", self.contents_url))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(response, "read menu document").await?;
        let payload = response
            .json::<ContentsResponse>()
            .await
            .context("decode github contents response")?;

        let bytes = decode_content(&payload)?;
        Ok(Some(RemoteFile {
            sha: payload.sha,
            bytes,
        }))
    }

    async fn current_sha(&self) -> Result<Option<String>> {
        Ok(self.fetch().await?.map(|file| file.sha))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("accept", GITHUB_ACCEPT)
            .header("x-github-api-version", GITHUB_API_VERSION)
    }
}

#[async_trait]
impl DocumentStore for GithubDocumentStore {
    fn backend(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn load(&self) -> Result<MenuDocument> {
        let Some(file) = self.fetch().await? else {
            debug!(url = %self.contents_url, "menu document missing on branch, starting empty");
            return Ok(MenuDocument::new());
        };

        MenuDocument::from_json(&file.bytes).context("malformed menu document")
    }

    async fn save(&self, document: &MenuDocument, change_description: &str) -> Result<()> {
        let sha = self.current_sha().await?;
        let bytes = document
            .to_pretty_json()
            .context("failed to encode menu document")?;

        let body = PutContentsRequest {
            message: change_description,
            content: BASE64.encode(bytes),
            branch: &self.branch,
            sha: sha.as_deref(),
        };

        let response = self
            .authorized(self.client.put(self.contents_url.clone()))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request {}", self.contents_url))?;

        if is_stale_write(response.status(), sha.is_some()) {
            let detail = response_text(response).await;
            warn!(
                url = %self.contents_url,
                sha = sha.as_deref().unwrap_or("<new>"),
                "github rejected stale menu document write"
            );
            return Err(VersionConflict::new(BACKEND_NAME, detail).into());
        }

        ensure_success(response, "write menu document").await?;
        debug!(
            url = %self.contents_url,
            branch = %self.branch,
            change = change_description,
            "menu document committed"
        );
        Ok(())
    }
}

fn is_stale_write(status: StatusCode, had_sha: bool) -> bool {
    status == StatusCode::CONFLICT || (status == StatusCode::UNPROCESSABLE_ENTITY && !had_sha)
}

fn contents_url(api_url: &str, repository: &str, path: &str) -> Result<Url> {
    let (owner, name) = repository
        .trim()
        .split_once('/')
        .filter(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'))
        .ok_or_else(|| anyhow!("github repository must look like owner/name: {repository}"))?;

    let mut url =
        Url::parse(api_url).with_context(|| format!("invalid github api url: {api_url}"))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| anyhow!("github api url cannot be a base: {api_url}"))?;
        segments
            .pop_if_empty()
            .extend(["repos", owner, name, "contents"])
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
    }

    Ok(url)
}

fn decode_content(payload: &ContentsResponse) -> Result<Vec<u8>> {
    match payload.encoding.as_deref() {
        Some("base64") | None => {}
        Some(other) => bail!("unsupported github content encoding: {other}"),
    }

    let encoded: String = payload
        .content
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();

    BASE64
        .decode(encoded)
        .context("malformed menu document: invalid base64 content")
}

async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response_text(response).await;
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        bail!("github unauthorized to {action} ({status}): {body}");
    }

    bail!("github failed to {action} ({status}): {body}")
}

async fn response_text(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unavailable>".to_string())
}

#[cfg(test)]
mod tests {
    use std::{
        net::SocketAddr,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
    };

    use axum::{
        Json, Router,
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode as AxumStatus},
        response::{IntoResponse, Response as AxumResponse},
        routing::get,
    };
    use serde_json::{Value as JsonValue, json};
    use tokio::net::TcpListener;

    use super::*;
    use crate::{document_store::is_version_conflict, menu::NewItem};

    const TOKEN: &str = "test-token";

    #[derive(Default)]
    struct FakeRepo {
        file: Mutex<Option<(String, Vec<u8>)>>,
        revisions: AtomicUsize,
        commit_messages: Mutex<Vec<String>>,
        branches: Mutex<Vec<String>>,
        rotate_after_read: AtomicBool,
        create_after_miss: AtomicBool,
    }

    impl FakeRepo {
        fn commit(&self, bytes: Vec<u8>) -> String {
            let revision = self.revisions.fetch_add(1, Ordering::SeqCst) + 1;
            let sha = format!("sha-{revision}");
            *self.file.lock().unwrap() = Some((sha.clone(), bytes));
            sha
        }
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == format!("Bearer {TOKEN}"))
    }

    fn wrap_base64(bytes: &[u8]) -> String {
        let encoded = BASE64.encode(bytes);
        encoded
            .as_bytes()
            .chunks(60)
            .map(|chunk| std::str::from_utf8(chunk).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn get_contents(
        State(repo): State<Arc<FakeRepo>>,
        Path((_owner, _name, _path)): Path<(String, String, String)>,
        Query(query): Query<std::collections::HashMap<String, String>>,
        headers: HeaderMap,
    ) -> AxumResponse {
        if !authorized(&headers) {
            return (AxumStatus::UNAUTHORIZED, "Bad credentials").into_response();
        }
        if let Some(branch) = query.get("ref") {
            repo.branches.lock().unwrap().push(branch.clone());
        }

        let current = repo.file.lock().unwrap().clone();
        let Some((sha, bytes)) = current else {
            if repo.create_after_miss.swap(false, Ordering::SeqCst) {
                repo.commit(b"{}".to_vec());
            }
            return (AxumStatus::NOT_FOUND, Json(json!({ "message": "Not Found" })))
                .into_response();
        };

        if repo.rotate_after_read.swap(false, Ordering::SeqCst) {
            repo.commit(bytes.clone());
        }

        Json(json!({
            "sha": sha,
            "encoding": "base64",
            "content": wrap_base64(&bytes),
        }))
        .into_response()
    }

    async fn put_contents(
        State(repo): State<Arc<FakeRepo>>,
        Path((_owner, _name, _path)): Path<(String, String, String)>,
        headers: HeaderMap,
        Json(body): Json<JsonValue>,
    ) -> AxumResponse {
        if !authorized(&headers) {
            return (AxumStatus::UNAUTHORIZED, "Bad credentials").into_response();
        }

        let current_sha = repo.file.lock().unwrap().as_ref().map(|(sha, _)| sha.clone());
        let submitted = body["sha"].as_str().map(str::to_owned);
        if current_sha.is_some() && submitted.is_none() {
            return (
                AxumStatus::UNPROCESSABLE_ENTITY,
                Json(json!({ "message": "Invalid request.\n\n\"sha\" wasn't supplied." })),
            )
                .into_response();
        }
        if current_sha != submitted {
            return (
                AxumStatus::CONFLICT,
                Json(json!({ "message": "menus.json does not match" })),
            )
                .into_response();
        }

        let bytes = BASE64
            .decode(body["content"].as_str().unwrap_or_default())
            .expect("client sends valid base64");
        repo.commit_messages
            .lock()
            .unwrap()
            .push(body["message"].as_str().unwrap_or_default().to_owned());
        if let Some(branch) = body["branch"].as_str() {
            repo.branches.lock().unwrap().push(branch.to_owned());
        }

        let status = if current_sha.is_some() {
            AxumStatus::OK
        } else {
            AxumStatus::CREATED
        };
        let sha = repo.commit(bytes);
        (status, Json(json!({ "content": { "sha": sha } }))).into_response()
    }

    async fn spawn_fake_github(repo: Arc<FakeRepo>) -> SocketAddr {
        let app = Router::new()
            .route(
                "/api/repos/{owner}/{name}/contents/{*path}",
                get(get_contents).put(put_contents),
            )
            .with_state(repo);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve fake github");
        });
        addr
    }

    fn store_for(addr: SocketAddr, token: &str) -> GithubDocumentStore {
        let config = GithubStoreConfig {
            repository: Some("acme/menus".into()),
            token: Some(token.into()),
            branch: "data".into(),
            path: "menus/menus.json".into(),
            api_url: format!("http://{addr}/api/"),
        };
        GithubDocumentStore::new(Client::new(), config).expect("build store")
    }

    fn sample_document() -> MenuDocument {
        let mut doc = MenuDocument::new();
        let id = doc.create_restaurant("Joe's").unwrap();
        doc.create_category(&id, "Drinks").unwrap();
        doc.add_item(
            &id,
            "drinks",
            NewItem {
                name: "Cola".into(),
                price: 2.5,
                image: "/images/cola.png".into(),
            },
        )
        .unwrap();
        doc
    }

    #[test]
    fn builds_contents_url() {
        let url = contents_url("https://api.github.com", "acme/menus", "data/menus.json").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/menus/contents/data/menus.json"
        );

        assert!(contents_url("https://api.github.com", "acme", "menus.json").is_err());
    }

    #[test]
    fn missing_token_is_rejected() {
        let config = GithubStoreConfig {
            repository: Some("acme/menus".into()),
            ..GithubStoreConfig::default()
        };
        let err = GithubDocumentStore::new(Client::new(), config)
            .err()
            .expect("token required");
        assert!(err.to_string().contains("token"));
    }

    #[tokio::test]
    async fn missing_remote_file_loads_empty_and_first_save_creates_it() {
        let repo = Arc::new(FakeRepo::default());
        let addr = spawn_fake_github(repo.clone()).await;
        let store = store_for(addr, TOKEN);

        assert!(store.load().await.expect("load").is_empty());

        let doc = sample_document();
        store.save(&doc, "Create restaurant Joe's").await.expect("save");

        let reloaded = store.load().await.expect("reload");
        assert_eq!(reloaded, doc);
        assert_eq!(
            repo.commit_messages.lock().unwrap().as_slice(),
            ["Create restaurant Joe's"]
        );
        assert!(repo.branches.lock().unwrap().iter().all(|b| b == "data"));
    }

    #[tokio::test]
    async fn save_uses_latest_sha() {
        let repo = Arc::new(FakeRepo::default());
        repo.commit(b"{}".to_vec());
        let addr = spawn_fake_github(repo.clone()).await;
        let store = store_for(addr, TOKEN);

        let mut doc = store.load().await.expect("load");
        doc.create_restaurant("Joe's").unwrap();
        store.save(&doc, "first").await.expect("first save");
        doc.create_restaurant("Ann's").unwrap();
        store.save(&doc, "second").await.expect("second save");

        assert_eq!(store.load().await.unwrap().len(), 2);
        assert_eq!(repo.revisions.load(Ordering::SeqCst), 3);
        let file = store.fetch().await.unwrap().expect("file exists");
        assert_eq!(file.sha, "sha-3");
    }

    #[tokio::test]
    async fn concurrent_commit_surfaces_version_conflict() {
        let repo = Arc::new(FakeRepo::default());
        repo.commit(b"{}".to_vec());
        let addr = spawn_fake_github(repo.clone()).await;
        let store = store_for(addr, TOKEN);

        repo.rotate_after_read.store(true, Ordering::SeqCst);
        let err = store
            .save(&sample_document(), "racing write")
            .await
            .expect_err("stale sha rejected");

        assert!(is_version_conflict(&err));
        assert!(repo.commit_messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_created_concurrently_surfaces_version_conflict() {
        let repo = Arc::new(FakeRepo::default());
        let addr = spawn_fake_github(repo.clone()).await;
        let store = store_for(addr, TOKEN);

        repo.create_after_miss.store(true, Ordering::SeqCst);
        let err = store
            .save(&sample_document(), "first write")
            .await
            .expect_err("missing sha rejected");

        assert!(is_version_conflict(&err));
        assert!(repo.commit_messages.lock().unwrap().is_empty());
    }

    #[test]
    fn unprocessable_is_stale_only_without_sha() {
        assert!(is_stale_write(StatusCode::CONFLICT, true));
        assert!(is_stale_write(StatusCode::UNPROCESSABLE_ENTITY, false));
        assert!(!is_stale_write(StatusCode::UNPROCESSABLE_ENTITY, true));
        assert!(!is_stale_write(StatusCode::BAD_REQUEST, false));
    }

    #[tokio::test]
    async fn bad_credentials_are_reported() {
        let repo = Arc::new(FakeRepo::default());
        repo.commit(b"{}".to_vec());
        let addr = spawn_fake_github(repo).await;
        let store = store_for(addr, "wrong");

        let err = store.load().await.expect_err("unauthorized");
        assert!(err.to_string().contains("unauthorized"));
        assert!(!is_version_conflict(&err));
    }

    #[tokio::test]
    async fn malformed_remote_document_is_reported() {
        let repo = Arc::new(FakeRepo::default());
        repo.commit(b"[1, 2".to_vec());
        let addr = spawn_fake_github(repo).await;
        let store = store_for(addr, TOKEN);

        let err = store.load().await.expect_err("malformed");
        assert!(err.to_string().contains("malformed menu document"));
    }
}
