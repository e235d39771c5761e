//! Task Runner - background execution of downloads and transcodes
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::downloader::{DownloadEngine, DownloadTick, TickStatus};
use crate::error::{MediaTaskError, Result};
use crate::progress::{ProgressStore, UpdateOutcome};
use crate::transcoder::ProcessLauncher;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use vidforge_types::StatusRecord;

/// Progress callback bound to one task identifier
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    task_id: String,
    store: Arc<ProgressStore>,
}

impl ProgressReporter {
    pub fn new(task_id: impl Into<String>, store: Arc<ProgressStore>) -> Self {
        Self {
            task_id: task_id.into(),
            store,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Replace the task's record; writes after a terminal state are dropped
    pub fn report(&self, record: StatusRecord) -> UpdateOutcome {
        self.store.update(&self.task_id, record)
    }

    pub fn processing(&self, percent: f64, eta: impl Into<String>, msg: impl Into<String>) {
        self.report(StatusRecord::processing(percent, eta, msg));
    }

    /// Translate a download engine tick into a status update
    pub fn on_tick(&self, tick: DownloadTick) {
        match tick.status {
            TickStatus::Downloading => {
                let percent = tick.percent_value();
                let eta = tick.eta_text();
                let shown = tick
                    .percent
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .unwrap_or("0%");
                let msg = format!("Downloading: {shown} (ETA: {eta})");
                self.processing(percent, eta, msg);
            }
            TickStatus::Finished => {
                self.processing(100.0, "0s", "Download finished, processing...");
            }
            TickStatus::Other(status) => {
                debug!(task_id = %self.task_id, status = %status, "Ignoring download tick");
            }
        }
    }

    pub fn complete(&self, msg: impl Into<String>) -> UpdateOutcome {
        self.report(StatusRecord::complete(msg))
    }

    pub fn fail(&self, msg: impl Into<String>) -> UpdateOutcome {
        self.report(StatusRecord::error(msg))
    }
}

/// Launches background operations and tracks them in the Progress Store.
///
/// Every submitted task ends in exactly one terminal record, including when
/// the operation returns an error or panics.
pub struct TaskRunner {
    store: Arc<ProgressStore>,
    downloader: Arc<dyn DownloadEngine>,
    launcher: Arc<dyn ProcessLauncher>,
    limiter: Option<Arc<Semaphore>>,
}

impl TaskRunner {
    pub fn new(
        store: Arc<ProgressStore>,
        downloader: Arc<dyn DownloadEngine>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            store,
            downloader,
            launcher,
            limiter: None,
        }
    }

    /// Bound the number of operations running at once; extra tasks wait in `starting`
    pub fn with_concurrency_limit(mut self, limit: Option<usize>) -> Self {
        self.limiter = limit.map(|n| Arc::new(Semaphore::new(n.max(1))));
        self
    }

    pub fn store(&self) -> &Arc<ProgressStore> {
        &self.store
    }

    /// Latest status, or the `pending` placeholder for unknown identifiers
    pub fn status(&self, task_id: &str) -> StatusRecord {
        self.store.get(task_id)
    }

    /// Download `url` into `dest_dir` in the background
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit_download(&self, url: String, dest_dir: PathBuf) -> String {
        let downloader = Arc::clone(&self.downloader);
        self.submit("download", "Initializing download...", move |reporter| async move {
            let ticks = reporter.clone();
            let hook = move |tick: DownloadTick| ticks.on_tick(tick);
            let outcome = downloader.download(&url, &dest_dir, &hook).await?;
            if let Some(path) = outcome.destination {
                debug!(task_id = %reporter.task_id(), path = %path.display(), "Download saved");
            }
            Ok::<_, MediaTaskError>("Download Complete!".to_string())
        })
    }

    /// Run a resolved argument vector in the background
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit_transcode(&self, argv: Vec<String>, output_name: String) -> String {
        let launcher = Arc::clone(&self.launcher);
        self.submit("transcode", "Starting transcode...", move |reporter| async move {
            reporter.processing(0.0, "...", "Processing...");
            launcher.run(&argv).await?;
            Ok::<_, MediaTaskError>(format!("Processed successfully! Saved to {output_name}"))
        })
    }

    /// Register a task in `starting` and run `operation` on its own Tokio task.
    ///
    /// `operation` yields the completion message; an error or panic becomes the
    /// terminal `error` record.
    pub fn submit<F, Fut>(&self, kind: &'static str, starting_msg: &str, operation: F) -> String
    where
        F: FnOnce(ProgressReporter) -> Fut + Send + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let task_id = Uuid::new_v4().to_string();
        self.store.insert(&task_id, StatusRecord::starting(starting_msg));
        info!(task_id = %task_id, kind = kind, "Task submitted");

        let reporter = ProgressReporter::new(task_id.clone(), Arc::clone(&self.store));
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        error!(task_id = %reporter.task_id(), error = %e, "Task limiter closed");
                        reporter.fail("Task runner is shutting down");
                        return;
                    }
                },
                None => None,
            };

            // Inner task so a panic surfaces as a JoinError instead of killing the record
            let worker = tokio::spawn(operation(reporter.clone()));
            match worker.await {
                Ok(Ok(msg)) => {
                    info!(task_id = %reporter.task_id(), kind = kind, "Task complete");
                    reporter.complete(msg);
                }
                Ok(Err(e)) => {
                    error!(task_id = %reporter.task_id(), kind = kind, error = %e, "Task failed");
                    reporter.fail(e.to_string());
                }
                Err(e) if e.is_panic() => {
                    error!(task_id = %reporter.task_id(), kind = kind, "Task panicked");
                    reporter.fail(format!("Unexpected failure while running {kind} task"));
                }
                Err(e) => {
                    warn!(task_id = %reporter.task_id(), kind = kind, error = %e, "Task cancelled");
                    reporter.fail(format!("{kind} task was cancelled"));
                }
            }
        });

        task_id
    }
}
