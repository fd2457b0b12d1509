//! The dedicated source control worker thread.
//!
//! The worker loads the provider itself, so the binding is created, used and
//! dropped on one thread. Producers push [`Job`]s onto a shared
//! [`CommandQueue`] and block on that job's own completion channel; only the
//! provider calls are serialized, never the producers' waits on each other.
//!
//! Caller tracing spans are carried in every job and entered by the worker,
//! so provider-call logs nest under the facade call that caused them.

use super::boundary::guarded;
use super::command::{self, Command, CommandOutput};
use super::plugin::{BindError, SccApi};
use super::queue::CommandQueue;
use crate::metrics::DispatchMetrics;
use crate::state::SessionManager;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::oneshot;

/// Creates the binding on the worker thread.
pub type PluginLoader = Box<dyn FnOnce() -> Result<Arc<dyn SccApi>, BindError> + Send>;

/// Why a command could not be handed to the worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Source control worker is not running")]
    NotRunning,

    #[error("Source control worker exited before completing {0}")]
    WorkerExited(&'static str),
}

pub(crate) struct Job {
    command: Command,
    reply: oneshot::Sender<CommandOutput>,
    span: tracing::Span,
}

/// Everything the worker thread shares with the rest of the dispatcher.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub metrics: Arc<DispatchMetrics>,
    pub session: Arc<SessionManager>,
    pub allow_concurrent: bool,
}

pub(crate) struct Worker {
    queue: Arc<CommandQueue<Job>>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
    metrics: Arc<DispatchMetrics>,
}

impl Worker {
    /// Spawn the worker and wait until it has bound the provider.
    ///
    /// Returns the loader's error, or [`BindError::WorkerExited`] if the
    /// thread went away before reporting.
    pub fn spawn(loader: PluginLoader, context: WorkerContext) -> Result<Self, BindError> {
        let queue = Arc::new(CommandQueue::new());
        let metrics = Arc::clone(&context.metrics);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), BindError>>();

        let handle = {
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name("scc-worker".into())
                .spawn(move || {
                    let plugin = match guarded("load", loader) {
                        Ok(Ok(plugin)) => plugin,
                        Ok(Err(err)) => {
                            let _ = ready_tx.send(Err(err));
                            return;
                        }
                        Err(fault) => {
                            let _ = ready_tx.send(Err(BindError::Fault(fault)));
                            return;
                        }
                    };
                    if ready_tx.send(Ok(())).is_err() {
                        return;
                    }
                    run(&queue, plugin, &context);
                })?
        };

        let thread_id = handle.thread().id();
        let ready = ready_rx.blocking_recv();
        match ready {
            Ok(Ok(())) => {
                tracing::debug!("Source control worker {:?} ready", thread_id);
                Ok(Self {
                    queue,
                    handle: Some(handle),
                    thread_id,
                    metrics,
                })
            }
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(_) => {
                let _ = handle.join();
                Err(BindError::WorkerExited)
            }
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Queue `command` and block until the worker has executed it.
    pub fn dispatch(&self, command: Command) -> Result<CommandOutput, DispatchError> {
        let name = command.name();
        let (reply, done) = oneshot::channel();
        let job = Job {
            command,
            reply,
            span: tracing::Span::current(),
        };

        if self.queue.push(job).is_err() {
            self.metrics.record_rejected();
            return Err(DispatchError::NotRunning);
        }
        self.metrics.record_dispatched();
        tracing::debug!("Dispatched {}", name);

        done.blocking_recv()
            .map_err(|_| DispatchError::WorkerExited(name))
    }

    /// Close the queue, let the worker drain it, and join the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.queue.close();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Source control worker panicked during shutdown");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(queue: &CommandQueue<Job>, plugin: Arc<dyn SccApi>, context: &WorkerContext) {
    tracing::info!("Source control worker started");

    while let Some(job) = queue.pop() {
        let Job {
            command,
            reply,
            span,
        } = job;
        let _guard = span.enter();
        let name = command.name();

        let started = Instant::now();
        let output = command::execute(&plugin, command, context.allow_concurrent);
        context.metrics.record_completed(started.elapsed());

        match &output {
            CommandOutput::Faulted(fault) => {
                context.metrics.record_fault();
                context.session.record_fault(fault);
            }
            other if other.code().is_error() => {
                context.metrics.record_provider_error();
                tracing::warn!("{} failed: {}", name, other.code());
            }
            _ => tracing::debug!("{} completed", name),
        }

        let _ = reply.send(output);
    }

    drop(plugin);
    tracing::info!("Source control worker stopped");
}
