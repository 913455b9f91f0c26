//! Batch job runner
//!
//! One background task per upload batch. Files within a batch are
//! processed sequentially in upload order; per-file failures are recorded
//! on the file and never abort the batch. The runner keeps the JoinHandle
//! for each batch so completion is an explicit, awaitable future rather
//! than an implicit runtime detail. There is no cancellation: a started
//! batch runs to completion or failure.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::Config;
use crate::convert;
use crate::engine::ConversionEngine;
use crate::retention;
use crate::session::{ConversionOptions, FileResult, SessionPaths, SessionStore};

/// One uploaded file, already persisted to the session's `documents/`
/// directory before the batch was scheduled.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Work description for one upload batch.
pub struct BatchJob {
    pub session_id: Uuid,
    pub paths: SessionPaths,
    pub files: Vec<SavedFile>,
    pub options: ConversionOptions,
}

/// Spawns and tracks batch tasks.
#[derive(Clone, Default)]
pub struct JobRunner {
    handles: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a batch. Returns immediately; the conversion work happens
    /// on a background task owned by this runner.
    pub async fn spawn_batch(
        &self,
        store: Arc<dyn SessionStore>,
        engine: Arc<dyn ConversionEngine>,
        config: Config,
        job: BatchJob,
    ) {
        let session_id = job.session_id;
        let handle = tokio::spawn(run_batch(store, engine, config, job));
        self.handles.lock().await.insert(session_id, handle);
    }

    /// Await completion of a batch, if one is tracked for this session.
    pub async fn wait(&self, session_id: Uuid) {
        let handle = self.handles.lock().await.remove(&session_id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(session_id = %session_id, error = %e, "Batch task panicked");
            }
        }
    }
}

async fn run_batch(
    store: Arc<dyn SessionStore>,
    engine: Arc<dyn ConversionEngine>,
    config: Config,
    job: BatchJob,
) {
    let session_id = job.session_id;

    match drive_batch(store.as_ref(), engine.as_ref(), &config, &job).await {
        Ok(()) => {
            tracing::info!(session_id = %session_id, "Completed processing session");
        }
        Err(e) => {
            // A failure here is a driver bug or lost record, not a
            // per-file conversion error; the whole session is failed.
            tracing::error!(session_id = %session_id, error = %e, "Background processing failed");
            if let Some(mut session) = store.get(session_id).await {
                session.mark_failed(e.to_string());
                store.set(session).await;
            }
        }
    }

    let report = retention::enforce(
        &config.output_root,
        config.keep_recent,
        store.as_ref(),
    )
    .await;
    if report.removed_dirs > 0 || report.removed_files > 0 {
        tracing::info!(
            removed_dirs = report.removed_dirs,
            removed_files = report.removed_files,
            "Retention sweep after batch"
        );
    }
}

/// Process every file of the batch, sequentially, in upload order.
async fn drive_batch(
    store: &dyn SessionStore,
    engine: &dyn ConversionEngine,
    config: &Config,
    job: &BatchJob,
) -> anyhow::Result<()> {
    for (index, file) in job.files.iter().enumerate() {
        tracing::info!(
            session_id = %job.session_id,
            file = %file.filename,
            "Processing file {}/{}",
            index + 1,
            job.files.len()
        );

        let result =
            match convert::convert_file(engine, config, &job.paths, &file.path, &job.options).await
            {
                Ok(converted) => {
                    tracing::info!(
                        session_id = %job.session_id,
                        file = %file.filename,
                        images = converted.images.len(),
                        "Successfully processed file"
                    );
                    FileResult::completed(
                        file.filename.as_str(),
                        converted.outputs,
                        converted.images.len(),
                    )
                }
                Err(e) => {
                    tracing::error!(
                        session_id = %job.session_id,
                        file = %file.filename,
                        error = %e,
                        "Failed to process file"
                    );
                    FileResult::failed(file.filename.as_str(), e.to_string())
                }
            };

        let mut session = store
            .get(job.session_id)
            .await
            .context("session record missing")?;
        session.record_file(result);
        store.set(session).await;
    }

    let mut session = store
        .get(job.session_id)
        .await
        .context("session record missing")?;
    session.mark_completed();
    store.set(session).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;
    use crate::session::{
        FileStatus, LlmProvider, MemoryStore, OutputFormat, Session, SessionKind, SessionStatus,
    };

    fn options() -> ConversionOptions {
        ConversionOptions {
            output_format: OutputFormat::Markdown,
            extract_images: true,
            max_pages: None,
            use_llm: false,
            llm_provider: LlmProvider::Ollama,
            ollama_url: String::new(),
            ollama_model: String::new(),
            gemini_api_key: String::new(),
            gemini_model: String::new(),
        }
    }

    async fn seed_batch(
        root: &std::path::Path,
        filenames: &[&str],
    ) -> (Arc<MemoryStore>, BatchJob) {
        let store = Arc::new(MemoryStore::new());
        let id = Uuid::new_v4();
        let session = Session::new(
            id,
            SessionKind::Session,
            filenames.len(),
            options().redacted_settings(),
        );
        let paths = SessionPaths::new(root, &session.dir_name());
        paths.create_all().unwrap();

        let mut files = Vec::new();
        for name in filenames {
            let path = paths.documents().join(name);
            std::fs::write(&path, b"%PDF-1.4").unwrap();
            files.push(SavedFile {
                filename: name.to_string(),
                path,
                size: 8,
            });
        }
        store.set(session).await;

        (
            store,
            BatchJob {
                session_id: id,
                paths,
                files,
                options: options(),
            },
        )
    }

    #[tokio::test]
    async fn batch_completes_with_per_file_failures_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let (store, job) = seed_batch(tmp.path(), &["a.pdf", "broken.pdf", "c.pdf"]).await;
        let id = job.session_id;

        let engine: Arc<dyn ConversionEngine> = Arc::new(MockEngine {
            fail_on: Some("broken"),
            ..Default::default()
        });
        let config = Config {
            output_root: tmp.path().to_path_buf(),
            ..Config::default()
        };

        let runner = JobRunner::new();
        runner
            .spawn_batch(store.clone(), engine, config, job)
            .await;
        runner.wait(id).await;

        let session = store.get(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.processed_files, 3);
        assert_eq!(session.files.len(), 3);
        assert!(session.completed_at.is_some());

        assert_eq!(session.files[0].filename, "a.pdf");
        assert_eq!(session.files[0].status, FileStatus::Completed);
        assert_eq!(session.files[1].filename, "broken.pdf");
        assert_eq!(session.files[1].status, FileStatus::Failed);
        assert!(session.files[1].error.as_deref().unwrap().contains("mock"));
        assert_eq!(session.files[2].status, FileStatus::Completed);
    }

    #[tokio::test]
    async fn files_are_processed_in_upload_order() {
        let tmp = tempfile::tempdir().unwrap();
        let (store, job) = seed_batch(tmp.path(), &["z.pdf", "a.pdf", "m.pdf"]).await;
        let id = job.session_id;

        let engine: Arc<dyn ConversionEngine> = Arc::new(MockEngine::default());
        let config = Config {
            output_root: tmp.path().to_path_buf(),
            ..Config::default()
        };

        let runner = JobRunner::new();
        runner
            .spawn_batch(store.clone(), engine, config, job)
            .await;
        runner.wait(id).await;

        let session = store.get(id).await.unwrap();
        let order: Vec<&str> = session.files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(order, vec!["z.pdf", "a.pdf", "m.pdf"]);
    }

    #[tokio::test]
    async fn missing_record_fails_the_session_driver() {
        let tmp = tempfile::tempdir().unwrap();
        let (store, job) = seed_batch(tmp.path(), &["a.pdf"]).await;
        let id = job.session_id;
        // simulate the record vanishing before the batch runs
        store.delete(id).await;

        let engine: Arc<dyn ConversionEngine> = Arc::new(MockEngine::default());
        let config = Config {
            output_root: tmp.path().to_path_buf(),
            ..Config::default()
        };

        let runner = JobRunner::new();
        runner
            .spawn_batch(store.clone(), engine, config, job)
            .await;
        runner.wait(id).await;

        // nothing to mark failed; the driver logged and gave up
        assert!(store.get(id).await.is_none());
    }
}
