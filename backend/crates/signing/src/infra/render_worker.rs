//! Render Worker
//!
//! Serializes every HTML to PDF conversion through one long-lived thread
//! that owns the rendering engine. Callers enqueue tasks and either block
//! on a one-shot completion signal (`convert_sync`) or get a callback on
//! the worker thread (`convert_async`). Tasks run strictly one at a time in
//! FIFO order.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use kernel::id::RenderTaskId;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::domain::backend::RenderBackend;
use crate::error::RenderError;

const WORKER_THREAD_NAME: &str = "render-worker";

/// Completion callback; invoked on the worker thread
pub type RenderCallback = Box<dyn FnOnce(Result<(), RenderError>) + Send + 'static>;

type BackendFactory = Arc<dyn Fn() -> Box<dyn RenderBackend> + Send + Sync>;

// ============================================================================
// Tasks and state
// ============================================================================

struct Task {
    id: RenderTaskId,
    html_path: PathBuf,
    pdf_path: PathBuf,
    done: Option<oneshot::Sender<Result<(), RenderError>>>,
    callback: Option<RenderCallback>,
}

impl Task {
    fn finish(self, result: Result<(), RenderError>) {
        if let Some(done) = self.done {
            // Receiver may have given up; nothing to do then
            let _ = done.send(result.clone());
        }
        if let Some(callback) = self.callback {
            if catch_unwind(AssertUnwindSafe(|| callback(result))).is_err() {
                tracing::error!(task_id = %self.id, "Render callback panicked");
            }
        }
    }
}

#[derive(Default)]
struct State {
    queue: VecDeque<Task>,
    initialized: bool,
    running: bool,
    stopping: bool,
    total_tasks: u64,
    completed_tasks: u64,
    failed_tasks: u64,
    last_error: Option<String>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    ready: Condvar,
}

/// Snapshot of worker counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub initialized: bool,
    pub running: bool,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub queue_depth: usize,
    pub last_error: Option<String>,
}

// ============================================================================
// Worker handle
// ============================================================================

/// Owner of the render thread
///
/// Construct once, share as `Arc<RenderWorker>`. The backend factory runs on
/// the worker thread, so the engine itself never crosses threads.
pub struct RenderWorker {
    shared: Arc<Shared>,
    factory: BackendFactory,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RenderWorker {
    pub fn new<F, B>(factory: F) -> Self
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: RenderBackend + 'static,
    {
        Self {
            shared: Arc::new(Shared::default()),
            factory: Arc::new(move || Box::new(factory()) as Box<dyn RenderBackend>),
            handle: Mutex::new(None),
        }
    }

    /// Start the worker thread and wait for engine startup
    ///
    /// Calling this while the worker is already running is a no-op. A
    /// detached worker that is still draining must finish first.
    pub fn initialize(&self) -> Result<(), RenderError> {
        let mut handle = self.handle.lock();
        {
            let mut state = self.shared.state.lock();
            if state.running {
                return if state.stopping {
                    Err(RenderError::ShutDown)
                } else {
                    Ok(())
                };
            }
            state.initialized = true;
            state.running = true;
            state.stopping = false;
        }
        // A previous worker that was detached or has exited
        if let Some(previous) = handle.take() {
            let _ = previous.join();
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let factory = Arc::clone(&self.factory);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(&shared, &factory, ack_tx));

        match spawned {
            Ok(join) => *handle = Some(join),
            Err(e) => {
                let mut state = self.shared.state.lock();
                state.initialized = false;
                state.running = false;
                state.last_error = Some(e.to_string());
                return Err(RenderError::StartupFailed(e.to_string()));
            }
        }
        drop(handle);

        let started = ack_rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(RenderError::StartupFailed("worker exited".to_string())));
        if started.is_ok() {
            tracing::info!("Render worker started");
        }
        started
    }

    /// Stop accepting tasks, drain the queue and tear the engine down
    ///
    /// With `wait_for_completion == false` the thread is detached and keeps
    /// draining in the background.
    pub fn shutdown(&self, wait_for_completion: bool) {
        let mut handle = self.handle.lock();
        {
            let mut state = self.shared.state.lock();
            if !state.running || state.stopping {
                return;
            }
            state.stopping = true;
        }
        self.shared.ready.notify_all();

        if let Some(join) = handle.take() {
            if wait_for_completion {
                if join.join().is_err() {
                    tracing::error!("Render worker thread panicked");
                }
                tracing::info!("Render worker stopped");
            } else {
                drop(join);
                tracing::info!("Render worker detached");
            }
        }
    }

    /// Render and block until this task has finished
    pub fn convert_sync(&self, html_path: &Path, pdf_path: &Path) -> Result<(), RenderError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(html_path, pdf_path, Some(done_tx), None)
            .map_err(|(err, _)| err)?;
        done_rx
            .blocking_recv()
            .unwrap_or(Err(RenderError::ShutDown))
    }

    /// Queue a render and return immediately
    ///
    /// If the task is refused, `callback` is invoked with the error on the
    /// calling thread before returning it.
    pub fn convert_async(
        &self,
        html_path: &Path,
        pdf_path: &Path,
        callback: RenderCallback,
    ) -> Result<(), RenderError> {
        match self.submit(html_path, pdf_path, None, Some(callback)) {
            Ok(()) => Ok(()),
            Err((err, Some(callback))) => {
                callback(Err(err.clone()));
                Err(err)
            }
            Err((err, None)) => Err(err),
        }
    }

    pub fn stats(&self) -> RenderStats {
        let state = self.shared.state.lock();
        RenderStats {
            initialized: state.initialized,
            running: state.running,
            total_tasks: state.total_tasks,
            completed_tasks: state.completed_tasks,
            failed_tasks: state.failed_tasks,
            queue_depth: state.queue.len(),
            last_error: state.last_error.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        let state = self.shared.state.lock();
        state.running && !state.stopping
    }

    fn submit(
        &self,
        html_path: &Path,
        pdf_path: &Path,
        done: Option<oneshot::Sender<Result<(), RenderError>>>,
        callback: Option<RenderCallback>,
    ) -> Result<(), (RenderError, Option<RenderCallback>)> {
        let task = Task {
            id: RenderTaskId::new(),
            html_path: html_path.to_path_buf(),
            pdf_path: pdf_path.to_path_buf(),
            done,
            callback,
        };
        {
            let mut state = self.shared.state.lock();
            if !state.initialized {
                return Err((RenderError::NotInitialized, task.callback));
            }
            if state.stopping || !state.running {
                return Err((RenderError::ShutDown, task.callback));
            }
            tracing::debug!(task_id = %task.id, queue_depth = state.queue.len(), "Render task queued");
            state.total_tasks += 1;
            state.queue.push_back(task);
        }
        self.shared.ready.notify_one();
        Ok(())
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}

// ============================================================================
// Worker thread
// ============================================================================

fn run_worker(
    shared: &Shared,
    factory: &BackendFactory,
    ack: oneshot::Sender<Result<(), RenderError>>,
) {
    let started = catch_unwind(AssertUnwindSafe(|| {
        let mut backend = (**factory)();
        backend.startup().map(|()| backend)
    }));
    let mut backend = match started {
        Ok(Ok(backend)) => backend,
        Ok(Err(e)) => return abort_startup(shared, e.to_string(), ack),
        Err(_) => return abort_startup(shared, "engine startup panicked".to_string(), ack),
    };
    let _ = ack.send(Ok(()));

    loop {
        let task = {
            let mut state = shared.state.lock();
            while state.queue.is_empty() && !state.stopping {
                shared.ready.wait(&mut state);
            }
            match state.queue.pop_front() {
                Some(task) => task,
                // Stopping and fully drained
                None => break,
            }
        };

        let result = match catch_unwind(AssertUnwindSafe(|| {
            backend.render(&task.html_path, &task.pdf_path)
        })) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RenderError::Failed(e.to_string())),
            Err(_) => Err(RenderError::Failed("render backend panicked".to_string())),
        };

        {
            let mut state = shared.state.lock();
            match &result {
                Ok(()) => state.completed_tasks += 1,
                Err(e) => {
                    state.failed_tasks += 1;
                    state.last_error = Some(e.to_string());
                }
            }
        }
        if let Err(e) = &result {
            tracing::warn!(task_id = %task.id, error = %e, "Render task failed");
        }
        task.finish(result);
    }

    if catch_unwind(AssertUnwindSafe(|| backend.teardown())).is_err() {
        tracing::error!("Render engine teardown panicked");
    }
    let mut state = shared.state.lock();
    state.initialized = false;
    state.running = false;
}

fn abort_startup(shared: &Shared, message: String, ack: oneshot::Sender<Result<(), RenderError>>) {
    tracing::error!(error = %message, "Render engine failed to start");
    let orphaned: Vec<Task> = {
        let mut state = shared.state.lock();
        state.initialized = false;
        state.running = false;
        state.last_error = Some(message.clone());
        state.failed_tasks += state.queue.len() as u64;
        state.queue.drain(..).collect()
    };
    for task in orphaned {
        task.finish(Err(RenderError::StartupFailed(message.clone())));
    }
    let _ = ack.send(Err(RenderError::StartupFailed(message)));
}
