//! End-to-end HTTP tests against fake media tools.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use tubedrop_api::AppState;
use tubedrop_shared::janitor::{janitor, JanitorConfig};
use tubedrop_shared::models::FormatDescriptor;
use tubedrop_shared::{
    DownloadError, DownloadRequest, Downloader, ExtractionError, Extractor, JobStore,
    ProgressEvent, ProgressSender, VideoMetadata,
};

const CONTENT: &[u8] = b"not really an mp4 but close enough";

// ====== FAKES ======

struct FakeExtractor;

#[async_trait]
impl Extractor for FakeExtractor {
    async fn probe(&self, url: &str) -> Result<VideoMetadata, ExtractionError> {
        if url.contains("unavailable") {
            return Err(ExtractionError::Failed("Video unavailable".into()));
        }
        let mut formats: Vec<FormatDescriptor> = (0..14)
            .map(|i| FormatDescriptor {
                format_id: Some(i.to_string()),
                ext: Some("mp4".into()),
                format_note: (i % 2 == 0).then(|| format!("{}p", 144 * (i + 1))),
                filesize: Some(1000 * i as u64),
                vcodec: Some("avc1".into()),
                acodec: Some("mp4a".into()),
            })
            .collect();
        // storyboard entry carries no media at all
        formats.insert(
            1,
            FormatDescriptor {
                format_id: Some("sb0".into()),
                ext: Some("mhtml".into()),
                vcodec: Some("none".into()),
                acodec: Some("none".into()),
                ..Default::default()
            },
        );
        Ok(VideoMetadata {
            title: Some("Test Clip".into()),
            duration: Some(212.0),
            formats,
            ..Default::default()
        })
    }
}

/// Writes a small file at the requested template, optionally held at a gate
/// halfway through.
#[derive(Default)]
struct FakeDownloader {
    gate: Option<Arc<Notify>>,
    requests: Mutex<Vec<DownloadRequest>>,
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(
        &self,
        request: &DownloadRequest,
        events: ProgressSender,
    ) -> Result<PathBuf, DownloadError> {
        self.requests.lock().unwrap().push(request.clone());
        if request.url.contains("broken") {
            return Err(DownloadError::Failed("Requested format is not available".into()));
        }

        let total = Some(CONTENT.len() as u64);
        let _ = events.send(ProgressEvent::Downloading {
            downloaded_bytes: 0,
            total_bytes: total,
            speed: None,
        });
        let _ = events.send(ProgressEvent::Downloading {
            downloaded_bytes: 10,
            total_bytes: total,
            speed: Some(1024.0),
        });
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let path = PathBuf::from(
            request
                .output_template
                .replace("%(title)s", "Test Clip")
                .replace("%(ext)s", "mp4"),
        );
        tokio::fs::write(&path, CONTENT).await?;
        let _ = events.send(ProgressEvent::Downloading {
            downloaded_bytes: CONTENT.len() as u64,
            total_bytes: total,
            speed: Some(2048.0),
        });
        let _ = events.send(ProgressEvent::Finished { path: path.clone() });
        Ok(path)
    }
}

// ====== HARNESS ======

struct TestApp {
    router: Router,
    store: JobStore,
    downloader: Arc<FakeDownloader>,
    dir: tempfile::TempDir,
    static_dir: tempfile::TempDir,
    shutdown: CancellationToken,
}

impl TestApp {
    fn new(gate: Option<Arc<Notify>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let static_dir = tempfile::tempdir().unwrap();
        let store = JobStore::new();
        let downloader = Arc::new(FakeDownloader {
            gate,
            ..Default::default()
        });
        let shutdown = CancellationToken::new();
        let config = JanitorConfig {
            grace: Duration::from_millis(50),
            retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(3600),
        };
        let (cleanup, janitor) = janitor(store.clone(), config, shutdown.clone());
        tokio::spawn(janitor.run());

        let state = Arc::new(AppState::new(
            store.clone(),
            Arc::new(FakeExtractor),
            downloader.clone(),
            dir.path().to_path_buf(),
            2,
            cleanup,
        ));
        Self {
            router: tubedrop_api::router(state, Some(static_dir.path())),
            store,
            downloader,
            dir,
            static_dir,
            shutdown,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_raw(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.post_raw(uri, &body.to_string()).await
    }

    /// Poll progress until the job is terminal, returning every snapshot seen.
    async fn poll_until_done(&self, id: &str) -> Vec<Value> {
        let mut seen = Vec::new();
        for _ in 0..200 {
            let (status, job) = self.get_json(&format!("/api/progress/{}", id)).await;
            assert_eq!(status, StatusCode::OK);
            let done = matches!(job["status"].as_str(), Some("completed" | "error"));
            seen.push(job);
            if done {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never finished", id);
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

const VIDEO: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

// ====== VALIDATION ======

#[tokio::test]
async fn test_rejects_bad_requests_without_creating_jobs() {
    let app = TestApp::new(None);

    let (status, body) = app.post_json("/api/download", json!({ "url": "https://vimeo.com/1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "URL debe ser de YouTube");

    let (status, body) = app.post_json("/api/download", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Campo \"url\" requerido");

    let (status, body) = app.post_json("/api/video-info", json!({ "url": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "URL no puede estar vacía");

    let (status, body) = app.post_raw("/api/download", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "JSON válido requerido");

    let (status, _) = app.post_raw("/api/download", "[1, 2]").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.store.is_empty().await);
    assert!(app.downloader.requests.lock().unwrap().is_empty());
}

// ====== VIDEO INFO ======

#[tokio::test]
async fn test_video_info() {
    let app = TestApp::new(None);

    let (status, info) = app.post_json("/api/video-info", json!({ "url": VIDEO })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["title"], "Test Clip");
    assert_eq!(info["uploader"], "Desconocido");
    assert_eq!(info["view_count"], 0);
    assert_eq!(info["description"], "");

    let formats = info["formats"].as_array().unwrap();
    assert_eq!(formats.len(), 10);
    assert!(formats.iter().all(|f| f["format_id"] != "sb0"));
    assert_eq!(formats[0]["quality"], "144p");
    assert_eq!(formats[1]["quality"], "Unknown");

    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_video_info_extraction_failure() {
    let app = TestApp::new(None);

    let (status, body) = app
        .post_json("/api/video-info", json!({ "url": "https://youtu.be/unavailable" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Error al obtener información del video: Video unavailable");
}

// ====== DOWNLOAD LIFECYCLE ======

#[tokio::test]
async fn test_download_lifecycle() {
    let gate = Arc::new(Notify::new());
    let app = TestApp::new(Some(gate.clone()));

    let (status, body) = app
        .post_json("/api/download", json!({ "url": VIDEO, "quality": "720" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Descarga iniciada");
    let id = body["download_id"].as_str().unwrap().to_string();

    // not downloadable while the transfer is held at the gate
    tokio::time::sleep(Duration::from_millis(50)).await;
    let (status, job) = app.get_json(&format!("/api/progress/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(job["file_path"].is_null());
    let (status, body) = app.get_json(&format!("/api/download-file/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Archivo no disponible");

    gate.notify_one();
    let snapshots = app.poll_until_done(&id).await;
    let last = snapshots.last().unwrap();
    assert_eq!(last["status"], "completed");
    assert_eq!(last["progress"], 100.0);
    assert!(last["error"].is_null());
    assert!(last["file_path"].as_str().unwrap().ends_with("Test Clip.mp4"));

    let progress: Vec<f64> = std::iter::once(&job)
        .chain(snapshots.iter())
        .map(|j| j["progress"].as_f64().unwrap())
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);

    let requests = app.downloader.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].format, "best[height<=720]");
    assert!(requests[0].output_template.contains(&id));

    // first fetch streams the file under its display name
    let request = Request::get(format!("/api/download-file/{}", id))
        .body(Body::empty())
        .unwrap();
    let (status, headers, bytes) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, CONTENT);
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains("filename=\"Test Clip.mp4\""), "{}", disposition);
    assert!(!disposition.contains(&id));

    // then the file and the job go away after the grace delay
    tokio::time::sleep(Duration::from_millis(300)).await;
    let (status, _) = app.get_json(&format!("/api/download-file/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get_json(&format!("/api/progress/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(std::fs::read_dir(app.dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_audio_only_and_failure() {
    let app = TestApp::new(None);

    let (status, body) = app
        .post_json(
            "/api/download",
            json!({ "url": "https://youtu.be/broken", "quality": "1080", "audio_only": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["download_id"].as_str().unwrap().to_string();

    let snapshots = app.poll_until_done(&id).await;
    let last = snapshots.last().unwrap();
    assert_eq!(last["status"], "error");
    assert_eq!(last["error"], "Requested format is not available");
    assert!(last["file_path"].is_null());

    assert_eq!(app.downloader.requests.lock().unwrap()[0].format, "bestaudio/best");

    let (status, _) = app.get_json(&format!("/api/download-file/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, all) = app.get_json("/api/downloads").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all[&id]["status"], "error");
}

#[tokio::test]
async fn test_unknown_ids() {
    let app = TestApp::new(None);
    let unknown = uuid::Uuid::new_v4().to_string();

    let (status, body) = app.get_json(&format!("/api/progress/{}", unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "ID de descarga no encontrado");

    let (status, _) = app.get_json("/api/progress/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get_json(&format!("/api/download-file/{}", unknown)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Archivo no disponible");
}

#[tokio::test]
async fn test_static_assets_and_cors() {
    let app = TestApp::new(None);
    std::fs::write(app.static_dir.path().join("app.js"), "console.log('tubedrop');").unwrap();

    let request = Request::get("/static/app.js")
        .header(header::ORIGIN, "https://example.org")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"console.log('tubedrop');");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let request = Request::get("/static/missing.js").body(Body::empty()).unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // preflight from any origin
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/download")
        .header(header::ORIGIN, "https://example.org")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(None);
    let (status, body) = app.get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["jobs"], 0);
    assert_eq!(body["max_concurrent"], 2);
}
