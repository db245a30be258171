//! The running worker task and the handle used to reach it.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::{
    ClickOutcome, FetchOutcome, Notification, Request, Result, Worker, WorkerError, WorkerState,
};

/// An event delivered to the worker.
#[derive(Debug)]
enum WorkerEvent {
    Fetch {
        request: Request,
        reply: oneshot::Sender<FetchOutcome>,
    },
    Message(Value),
    NotificationClick {
        notification: Notification,
        reply: oneshot::Sender<ClickOutcome>,
    },
    NotificationClose(Notification),
}

#[derive(Debug)]
enum Command {
    Event(WorkerEvent),
    /// Reply once every earlier event and cache write has finished.
    Settle(oneshot::Sender<()>),
    Shutdown,
}

/// Cloneable handle on a running worker.
///
/// Events are queued on a bounded channel and each is handled on its own
/// task, so a slow fetch never holds up a notification.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Command>,
    worker: Arc<Worker>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl WorkerHandle {
    /// Start the event loop for `worker`.
    #[must_use]
    pub fn spawn(worker: Worker, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = Arc::new(worker);
        let task = tokio::spawn(run(Arc::clone(&worker), rx));
        Self {
            tx,
            worker,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// The worker's current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.worker.state()
    }

    /// The worker's cache version.
    #[must_use]
    pub fn version(&self) -> &str {
        self.worker.version()
    }

    /// The worker behind this handle.
    #[must_use]
    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| WorkerError::NotRunning)
    }

    /// Post a message to the worker. Nothing is sent back.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::NotRunning`] if the worker has stopped.
    pub async fn post_message(&self, message: Value) -> Result<()> {
        self.send(Command::Event(WorkerEvent::Message(message))).await
    }

    /// Route a request through the worker.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::NotRunning`] if the worker has stopped.
    pub async fn fetch(&self, request: Request) -> Result<FetchOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Event(WorkerEvent::Fetch { request, reply }))
            .await?;
        rx.await.map_err(|_| WorkerError::NotRunning)
    }

    /// Deliver a notification click.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::NotRunning`] if the worker has stopped.
    pub async fn notification_click(&self, notification: Notification) -> Result<ClickOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Event(WorkerEvent::NotificationClick {
            notification,
            reply,
        }))
        .await?;
        rx.await.map_err(|_| WorkerError::NotRunning)
    }

    /// Deliver a notification dismissal.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::NotRunning`] if the worker has stopped.
    pub async fn notification_close(&self, notification: Notification) -> Result<()> {
        self.send(Command::Event(WorkerEvent::NotificationClose(notification)))
            .await
    }

    /// Wait until every event sent so far, and every cache write it started,
    /// has been handled.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::NotRunning`] if the worker has stopped.
    pub async fn settle(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Settle(reply)).await?;
        rx.await.map_err(|_| WorkerError::NotRunning)
    }

    /// Stop the worker after draining in-flight handlers and cache writes.
    ///
    /// Calling this more than once is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Task`] if the event loop panicked.
    pub async fn shutdown(&self) -> Result<()> {
        // A closed channel means the loop already exited.
        let _ = self.tx.send(Command::Shutdown).await;
        if let Some(task) = self.task.lock().await.take() {
            task.await.map_err(|e| WorkerError::Task(e.to_string()))?;
        }
        Ok(())
    }
}

async fn run(worker: Arc<Worker>, mut rx: mpsc::Receiver<Command>) {
    debug!(version = %worker.version(), "Worker event loop started");
    let mut handlers = JoinSet::new();

    while let Some(command) = rx.recv().await {
        while let Some(done) = handlers.try_join_next() {
            log_handler_result(done);
        }

        match command {
            Command::Event(event) => {
                let worker = Arc::clone(&worker);
                handlers.spawn(async move { dispatch(&worker, event).await });
            }
            Command::Settle(reply) => {
                drain(&mut handlers).await;
                worker.settle_cache_writes().await;
                let _ = reply.send(());
            }
            Command::Shutdown => break,
        }
    }

    drain(&mut handlers).await;
    worker.settle_cache_writes().await;
    info!(version = %worker.version(), "Worker stopped");
}

async fn dispatch(worker: &Worker, event: WorkerEvent) {
    match event {
        WorkerEvent::Fetch { request, reply } => {
            let outcome = worker.handle_fetch(request).await;
            let _ = reply.send(outcome);
        }
        WorkerEvent::Message(message) => {
            worker.handle_message(&message).await;
        }
        WorkerEvent::NotificationClick {
            notification,
            reply,
        } => {
            let outcome = worker.handle_notification_click(&notification).await;
            let _ = reply.send(outcome);
        }
        WorkerEvent::NotificationClose(notification) => {
            worker.handle_notification_close(&notification);
        }
    }
}

async fn drain(handlers: &mut JoinSet<()>) {
    while let Some(done) = handlers.join_next().await {
        log_handler_result(done);
    }
}

fn log_handler_result(result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        warn!(error = %e, "Worker event handler failed");
    }
}
