//! HTTP routes
//!
//! - `info`: capability and health endpoints
//! - `sessions`: the background upload/status/download API
//! - `convert`: the synchronous one-shot conversion variant

pub mod convert;
mod form;
pub mod info;
pub mod sessions;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::Config;
    use crate::engine::MockEngine;
    use crate::session::{MemoryStore, SessionStatus, SessionStore};
    use crate::state::AppState;

    fn test_state(root: &std::path::Path, engine: MockEngine) -> AppState {
        let config = Config {
            output_root: root.to_path_buf(),
            ..Config::default()
        };
        AppState::with_parts(config, Arc::new(MemoryStore::new()), Arc::new(engine))
    }

    /// State backed by the real Marker engine; used only for request
    /// validation paths that never invoke the CLI.
    fn marker_state(root: &std::path::Path) -> AppState {
        let config = Config {
            output_root: root.to_path_buf(),
            ..Config::default()
        };
        AppState::new(config)
    }

    const BOUNDARY: &str = "XTESTBOUNDARYX";

    fn multipart_body(filename: &str, fields: &[(&str, &str)]) -> Body {
        let mut body = String::new();
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n%PDF-1.4 test\r\n"
        ));
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Body::from(body)
    }

    fn upload_request(uri: &str, filename: &str, fields: &[(&str, &str)]) -> Request<Body> {
        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(filename, fields))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn upload_and_wait(state: &AppState, filename: &str, fields: &[(&str, &str)]) -> Uuid {
        let app = crate::app(state.clone());
        let response = app
            .oneshot(upload_request("/api/upload", filename, fields))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let id: Uuid = json["session_id"].as_str().unwrap().parse().unwrap();
        state.jobs().wait(id).await;
        id
    }

    #[tokio::test]
    async fn upload_returns_before_processing_and_batch_completes() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), MockEngine::default());
        let id = upload_and_wait(&state, "doc.pdf", &[("output_format", "markdown")]).await;

        let session = state.store().get(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.processed_files, 1);
        assert_eq!(session.files.len(), 1);

        // settings snapshot is redacted and echoed back
        assert_eq!(session.settings.output_format.as_str(), "markdown");
    }

    #[tokio::test]
    async fn status_endpoint_reports_the_record() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), MockEngine::default());
        let id = upload_and_wait(&state, "doc.pdf", &[]).await;

        let app = crate::app(state.clone());
        let response = app
            .oneshot(
                Request::get(format!("/api/sessions/{id}/status"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "completed");
        assert_eq!(json["processed_files"], 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), MockEngine::default());
        let app = crate::app(state);

        for uri in [
            format!("/api/sessions/{}/status", Uuid::new_v4()),
            "/api/sessions/not-a-uuid/status".to_string(),
        ] {
            let response = app
                .clone()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn invalid_max_pages_is_rejected_before_any_work() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), MockEngine::default());
        let app = crate::app(state.clone());

        let response = app
            .oneshot(upload_request(
                "/api/upload",
                "doc.pdf",
                &[("max_pages", "lots")],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["code"], "INVALID_REQUEST");

        // nothing was scheduled or written
        assert!(state.store().list().await.is_empty());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unsupported_file_type_is_rejected_synchronously() {
        let tmp = tempfile::tempdir().unwrap();
        let state = marker_state(tmp.path());
        let app = crate::app(state.clone());

        let response = app
            .oneshot(upload_request("/api/upload", "notes.txt", &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["code"], "UNSUPPORTED_FILE_TYPE");
        assert!(state.store().list().await.is_empty());
    }

    #[tokio::test]
    async fn download_serves_artifacts_and_404s_unknown_names() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), MockEngine::default());
        let id = upload_and_wait(&state, "doc.pdf", &[]).await;

        let app = crate::app(state.clone());

        // the markdown artifact lives under metadata/, found recursively
        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/sessions/{id}/download/doc.md"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"# mock output\n");

        // unknown names are 404, never a server error
        let response = app
            .oneshot(
                Request::get(format!("/api/sessions/{id}/download/missing.xyz"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_all_returns_a_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), MockEngine::default());
        let id = upload_and_wait(&state, "doc.pdf", &[]).await;

        let app = crate::app(state);
        let response = app
            .oneshot(
                Request::get(format!("/api/sessions/{id}/download-all"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/zip"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        // zip local file header magic
        assert_eq!(&bytes[..2], b"PK");
    }

    #[tokio::test]
    async fn delete_removes_directory_and_record() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), MockEngine::default());
        let id = upload_and_wait(&state, "doc.pdf", &[]).await;

        let dir = tmp.path().join(format!("session_{id}"));
        assert!(dir.is_dir());

        let app = crate::app(state.clone());
        let response = app
            .clone()
            .oneshot(
                Request::delete(format!("/api/sessions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!dir.exists());
        assert!(state.store().get(id).await.is_none());

        // a second delete is a 404
        let response = app
            .oneshot(
                Request::delete(format!("/api/sessions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cleanup_is_idempotent_on_an_empty_root() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), MockEngine::default());
        let app = crate::app(state);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(Request::post("/api/cleanup").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = json_body(response).await;
            assert_eq!(json["success"], true);
            assert_eq!(json["removed_dirs"], 0);
        }
    }

    #[tokio::test]
    async fn health_and_formats_are_static() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), MockEngine::default());
        let app = crate::app(state);

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["engine_available"], true);

        let response = app
            .oneshot(Request::get("/api/formats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert!(json["output_formats"]["markdown"].is_string());
    }

    #[tokio::test]
    async fn sync_convert_returns_the_result_inline() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), MockEngine::default());
        let app = crate::app(state.clone());

        let response = app
            .oneshot(upload_request("/convert", "doc.pdf", &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["filename"], "doc.pdf");
        assert_eq!(json["text"], "# mock output\n");
        assert!(json["markdown_file"].is_string());

        // the sync variant uses the convert_ directory prefix
        let id: Uuid = json["session_id"].as_str().unwrap().parse().unwrap();
        assert!(tmp.path().join(format!("convert_{id}")).is_dir());
        let session = state.store().get(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn sync_convert_surfaces_engine_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            tmp.path(),
            MockEngine {
                fail_on: Some("doc"),
                ..Default::default()
            },
        );
        let app = crate::app(state.clone());

        let response = app
            .oneshot(upload_request("/convert", "doc.pdf", &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["code"], "ENGINE_ERROR");

        // the failure is also recorded on the session
        let sessions = state.store().list().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].status, SessionStatus::Failed);
    }
}
