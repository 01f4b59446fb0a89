//! Task runners for the two cooperating threads.
//!
//! A [`TaskRunner`] executes posted closures one at a time, in submission
//! order, on a single thread. The bridge holds one runner for the UI thread
//! and one for the IME thread; hosts with their own event loop implement the
//! trait for it, everything else uses [`ThreadTaskRunner`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use tracing::{debug, error};

use crate::settings::DispatchSettings;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to spawn runner thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("task runner {runner} has stopped")]
    Stopped { runner: String },
    #[error("task on {runner} finished without producing a result")]
    TaskDropped { runner: String },
}

/// A single-threaded, FIFO task executor.
pub trait TaskRunner: Send + Sync {
    /// Queue `task` without waiting for it to run.
    fn post(&self, task: Task) -> Result<(), DispatchError>;

    /// Whether the calling thread is the one this runner executes tasks on.
    fn runs_tasks_on_current_thread(&self) -> bool;

    fn name(&self) -> &str;
}

enum RunnerMsg {
    Run(Task),
    Shutdown,
}

/// A named worker thread draining a channel of tasks.
///
/// Dropping the runner lets already-posted tasks finish, then stops the
/// thread. The drop joins the thread unless it happens on that thread.
pub struct ThreadTaskRunner {
    name: String,
    sender: Mutex<mpsc::Sender<RunnerMsg>>,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl ThreadTaskRunner {
    pub fn spawn(name: &str) -> Result<Self, DispatchError> {
        let (tx, rx) = mpsc::channel::<RunnerMsg>();
        let runner_name = name.to_string();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_loop(&runner_name, rx))?;
        Ok(Self {
            name: name.to_string(),
            sender: Mutex::new(tx),
            thread_id: handle.thread().id(),
            handle: Some(handle),
        })
    }

    fn send(&self, msg: RunnerMsg) -> Result<(), DispatchError> {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        sender.send(msg).map_err(|_| DispatchError::Stopped {
            runner: self.name.clone(),
        })
    }
}

impl TaskRunner for ThreadTaskRunner {
    fn post(&self, task: Task) -> Result<(), DispatchError> {
        self.send(RunnerMsg::Run(task))
    }

    fn runs_tasks_on_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ThreadTaskRunner {
    fn drop(&mut self) {
        let _ = self.send(RunnerMsg::Shutdown);
        if self.runs_tasks_on_current_thread() {
            return;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop(name: &str, rx: mpsc::Receiver<RunnerMsg>) {
    debug!(runner = name, "task runner started");
    while let Ok(msg) = rx.recv() {
        match msg {
            RunnerMsg::Run(task) => {
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    error!(runner = name, "task panicked");
                }
            }
            RunnerMsg::Shutdown => break,
        }
    }
    debug!(runner = name, "task runner stopped");
}

/// The UI runner and the IME runner, shared by everything that hops threads.
#[derive(Clone)]
pub struct DispatchLayer {
    ui: Arc<dyn TaskRunner>,
    ime: Arc<dyn TaskRunner>,
}

impl DispatchLayer {
    pub fn new(ui: Arc<dyn TaskRunner>, ime: Arc<dyn TaskRunner>) -> Self {
        Self { ui, ime }
    }

    /// Spawn a dedicated thread for each side.
    pub fn spawn(settings: &DispatchSettings) -> Result<Self, DispatchError> {
        let ui = ThreadTaskRunner::spawn(&settings.ui_thread_name)?;
        let ime = ThreadTaskRunner::spawn(&settings.ime_thread_name)?;
        Ok(Self::new(Arc::new(ui), Arc::new(ime)))
    }

    pub fn post_to_ui(&self, task: impl FnOnce() + Send + 'static) -> Result<(), DispatchError> {
        self.ui.post(Box::new(task))
    }

    pub fn post_to_ime(&self, task: impl FnOnce() + Send + 'static) -> Result<(), DispatchError> {
        self.ime.post(Box::new(task))
    }

    pub fn on_ui_thread(&self) -> bool {
        self.ui.runs_tasks_on_current_thread()
    }

    pub fn on_ime_thread(&self) -> bool {
        self.ime.runs_tasks_on_current_thread()
    }

    /// Run `f` on the UI thread and wait for its result.
    pub fn call_on_ui<R, F>(&self, f: F) -> Result<R, DispatchError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        call(self.ui.as_ref(), f)
    }

    /// Run `f` on the IME thread and wait for its result.
    pub fn call_on_ime<R, F>(&self, f: F) -> Result<R, DispatchError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        call(self.ime.as_ref(), f)
    }
}

fn call<R, F>(runner: &dyn TaskRunner, f: F) -> Result<R, DispatchError>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    if runner.runs_tasks_on_current_thread() {
        return Ok(f());
    }
    let (tx, rx) = mpsc::channel();
    runner.post(Box::new(move || {
        let _ = tx.send(f());
    }))?;
    rx.recv().map_err(|_| DispatchError::TaskDropped {
        runner: runner.name().to_string(),
    })
}
