//! Receives call jobs and runs one independent task per call.

pub mod webhook;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::agent::AgentLauncher;
use crate::context::AppContext;
use crate::entrypoint::entrypoint;
use crate::room::{CallSession, SessionFactory};
use crate::{Error, Result};

/// Collaborators the worker builds each job from.
#[derive(Clone)]
pub struct WorkerOptions {
    pub session_factory: Arc<dyn SessionFactory>,
    pub launcher: Arc<dyn AgentLauncher>,
}

/// Everything one call job owns.
pub struct JobContext {
    pub job_id: String,
    pub room_name: String,
    pub session: Box<dyn CallSession>,
    pub app: Arc<AppContext>,
    /// Cancelled when the worker shuts down.
    pub cancel: CancellationToken,
}

impl JobContext {
    #[must_use]
    pub fn new(
        job_id: impl Into<String>,
        session: Box<dyn CallSession>,
        app: Arc<AppContext>,
        cancel: CancellationToken,
    ) -> Self {
        let room_name = session.room_name().to_string();
        Self {
            job_id: job_id.into(),
            room_name,
            session,
            app,
            cancel,
        }
    }
}

/// Runs call jobs until shut down. Cheap to clone.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<Inner>,
}

struct Inner {
    app: Arc<AppContext>,
    options: WorkerOptions,
    cancel: CancellationToken,
    tracker: TaskTracker,
    active: Mutex<HashSet<String>>,
    next_job: AtomicU64,
}

impl Worker {
    #[must_use]
    pub fn new(app: Arc<AppContext>, options: WorkerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                app,
                options,
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
                active: Mutex::new(HashSet::new()),
                next_job: AtomicU64::new(1),
            }),
        }
    }

    #[must_use]
    pub fn app(&self) -> &Arc<AppContext> {
        &self.inner.app
    }

    /// Token cancelled by [`Worker::shutdown`].
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Start a job for `room_name` unless one is already running there.
    ///
    /// Returns `Ok(false)` if the room already has a job or the worker is
    /// shutting down.
    ///
    /// # Errors
    /// Returns an error if a session for the room cannot be created.
    pub async fn dispatch(&self, room_name: &str) -> Result<bool> {
        if self.inner.cancel.is_cancelled() {
            tracing::debug!(room = %room_name, "Worker is shutting down; job not dispatched");
            return Ok(false);
        }
        if !self.inner.active.lock().await.insert(room_name.to_string()) {
            tracing::debug!(room = %room_name, "Room already has an active job");
            return Ok(false);
        }

        let session = match self.inner.options.session_factory.create(room_name) {
            Ok(session) => session,
            Err(err) => {
                self.inner.active.lock().await.remove(room_name);
                return Err(err);
            }
        };

        let job_id = format!("job-{}", self.inner.next_job.fetch_add(1, Ordering::Relaxed));
        let ctx = JobContext::new(
            job_id,
            session,
            Arc::clone(&self.inner.app),
            self.inner.cancel.child_token(),
        );
        tracing::info!(room = %room_name, job_id = %ctx.job_id, "Dispatching call job");

        let worker = self.clone();
        self.inner.tracker.spawn(async move {
            let room_name = ctx.room_name.clone();
            worker.run_job(ctx).await;
            worker.inner.active.lock().await.remove(&room_name);
        });
        Ok(true)
    }

    /// Whether a job is running in `room_name`.
    pub async fn is_active(&self, room_name: &str) -> bool {
        self.inner.active.lock().await.contains(room_name)
    }

    pub async fn active_jobs(&self) -> usize {
        self.inner.active.lock().await.len()
    }

    /// Wait for every dispatched job to finish, without cancelling them.
    pub async fn drain(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.tracker.reopen();
    }

    /// Cancel all jobs, wait for them to wind down, then release the
    /// application context.
    pub async fn shutdown(&self) {
        tracing::info!("Worker shutting down");
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.app.close();
    }

    async fn run_job(&self, mut ctx: JobContext) {
        let cancel = ctx.cancel.clone();
        let result = self.converse(&mut ctx, &cancel).await;

        match &result {
            Ok(()) => tracing::info!(room = %ctx.room_name, job_id = %ctx.job_id, "Call ended"),
            Err(Error::Cancelled) => {
                tracing::info!(room = %ctx.room_name, job_id = %ctx.job_id, "Call job cancelled");
            }
            Err(err @ Error::NoCallerJoined { .. }) => {
                tracing::warn!(room = %ctx.room_name, job_id = %ctx.job_id, error = %err, "Call job abandoned");
            }
            Err(err) => {
                tracing::error!(room = %ctx.room_name, job_id = %ctx.job_id, error = %err, "Call job failed");
            }
        }

        if let Err(err) = ctx.session.close().await {
            tracing::warn!(room = %ctx.room_name, error = %err, "Failed to leave room");
        }
    }

    async fn converse(&self, ctx: &mut JobContext, cancel: &CancellationToken) -> Result<()> {
        let launcher = self.inner.options.launcher.as_ref();
        let mut conversation = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            handle = entrypoint(ctx, launcher) => handle?,
        };

        tokio::select! {
            result = conversation.wait() => result,
            () = cancel.cancelled() => {
                conversation.abort();
                Err(Error::Cancelled)
            }
        }
    }
}
