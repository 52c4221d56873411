//! Background dispatch of admin operations
//!
//! Callers hand a descriptor and a continuation to the [`Dispatcher`] and
//! return immediately. A single loop takes tasks off an unbounded FIFO queue
//! in submission order and starts each one through a tower concurrency limit,
//! so at most `concurrency` operations are in flight. Operations may finish
//! in any order. Every continuation fires exactly once: with the outcome, or
//! with [`CoreError::Canceled`] if the task is dropped before it runs.

use crate::admin::{self, AdminResponse, Outcome};
use crate::connection::Connection;
use crate::error::CoreError;
use crate::request::OperationDescriptor;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tower::limit::ConcurrencyLimit;
use tower::{Service, ServiceBuilder, ServiceExt};
use tracing::{debug, trace};

/// Operations in flight per client unless configured otherwise
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Single-shot completion callback
pub type Continuation = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// Fires its continuation exactly once, with `Canceled` if dropped unfired
pub(crate) struct Reply {
    continuation: Option<Continuation>,
}

impl Reply {
    pub(crate) fn new(continuation: Continuation) -> Self {
        Self {
            continuation: Some(continuation),
        }
    }

    pub(crate) fn complete(mut self, outcome: Outcome) {
        if let Some(continuation) = self.continuation.take() {
            continuation(outcome);
        }
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if let Some(continuation) = self.continuation.take() {
            trace!("task dropped before completion");
            continuation(Err(CoreError::Canceled));
        }
    }
}

struct Task {
    descriptor: OperationDescriptor,
    reply: Reply,
}

/// Runs admin operations against one connection
#[derive(Clone)]
struct ExecutorService {
    conn: Arc<Connection>,
}

impl Service<OperationDescriptor> for ExecutorService {
    type Response = AdminResponse;
    type Error = CoreError;
    type Future = BoxFuture<'static, Outcome>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, descriptor: OperationDescriptor) -> Self::Future {
        let conn = self.conn.clone();
        Box::pin(async move { admin::execute(&conn, descriptor).await })
    }
}

pub struct Dispatcher {
    tx: Option<mpsc::UnboundedSender<Task>>,
    worker: Option<JoinHandle<()>>,
    concurrency: usize,
}

impl Dispatcher {
    /// Start the dispatch loop. Must be called inside a Tokio runtime.
    pub fn spawn(conn: Arc<Connection>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let service = ServiceBuilder::new()
            .concurrency_limit(concurrency)
            .service(ExecutorService { conn });
        let worker = tokio::spawn(run(rx, service));
        debug!(concurrency, "dispatcher started");

        Self {
            tx: Some(tx),
            worker: Some(worker),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Queue an operation. Never blocks; `continuation` runs on a worker task.
    pub fn submit(&self, descriptor: OperationDescriptor, continuation: Continuation) {
        let task = Task {
            descriptor,
            reply: Reply::new(continuation),
        };
        match &self.tx {
            Some(tx) => {
                if let Err(mpsc::error::SendError(task)) = tx.send(task) {
                    debug!(operation = %task.descriptor, "dispatcher stopped; canceling");
                }
            }
            None => debug!(operation = %task.descriptor, "dispatcher shut down; canceling"),
        }
    }

    /// Stop accepting work and wait until every queued task has finished.
    /// Later submissions are canceled.
    pub async fn shutdown(&mut self) {
        self.tx = None;
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                debug!("dispatcher loop ended abnormally: {}", err);
            }
        }
        debug!("dispatcher shut down");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Queued and running tasks are dropped with the loop and cancel themselves
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<Task>,
    mut service: ConcurrencyLimit<ExecutorService>,
) {
    let mut in_flight = JoinSet::new();
    while let Some(Task { descriptor, reply }) = rx.recv().await {
        let svc = match ServiceExt::<OperationDescriptor>::ready(&mut service).await {
            Ok(svc) => svc,
            Err(err) => {
                reply.complete(Err(err));
                continue;
            }
        };

        trace!(operation = %descriptor, "starting");
        let future = svc.call(descriptor);
        in_flight.spawn(async move {
            reply.complete(future.await);
        });
        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}
}
