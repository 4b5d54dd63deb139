//! Bounded background queue feeding uploads into the processing service.
//!
//! Admission is explicit: `enqueue` fails with a typed error when the queue is at
//! capacity, so callers can surface backpressure instead of dropping work silently.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::pipeline::service::ProcessingService;
use crate::pipeline::types::ProcessingError;

/// A queued ingestion job: raw upload bytes bound to a registered document.
#[derive(Debug)]
pub struct IngestJob {
    /// Document the bytes belong to.
    pub document_id: Uuid,
    /// Raw upload content.
    pub bytes: Vec<u8>,
}

/// Handle to the background processing queue.
pub struct JobQueue {
    sender: mpsc::Sender<IngestJob>,
    worker: JoinHandle<()>,
}

impl JobQueue {
    /// Spawn a worker that drains the queue through the processing service.
    pub fn start(service: Arc<ProcessingService>, capacity: usize) -> Self {
        Self::with_handler(capacity, move |job: IngestJob| {
            let service = Arc::clone(&service);
            async move {
                // Failures are already recorded on the document by the service.
                if let Err(error) = service.process_document(job.document_id, job.bytes).await {
                    tracing::error!(
                        document_id = %job.document_id,
                        error = %error,
                        "Background processing job failed"
                    );
                }
            }
        })
    }

    /// Spawn a worker around an arbitrary job handler.
    pub fn with_handler<F, Fut>(capacity: usize, handler: F) -> Self
    where
        F: Fn(IngestJob) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<IngestJob>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                handler(job).await;
            }
            tracing::debug!("Processing queue drained and closed");
        });
        Self { sender, worker }
    }

    /// Admit a job, failing fast when the queue is full or the worker is gone.
    pub fn enqueue(&self, job: IngestJob) -> Result<(), ProcessingError> {
        self.sender.try_send(job).map_err(|error| match error {
            mpsc::error::TrySendError::Full(job) => {
                tracing::warn!(
                    document_id = %job.document_id,
                    "Processing queue is full; rejecting upload"
                );
                ProcessingError::QueueFull
            }
            mpsc::error::TrySendError::Closed(_) => ProcessingError::WorkerUnavailable,
        })
    }

    /// Number of jobs that can still be admitted without blocking.
    pub fn available_capacity(&self) -> usize {
        self.sender.capacity()
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{Mutex, Notify};

    fn job() -> IngestJob {
        IngestJob {
            document_id: Uuid::new_v4(),
            bytes: b"content".to_vec(),
        }
    }

    #[tokio::test]
    async fn jobs_are_processed_in_order() {
        let processed = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::new(Notify::new());

        let queue = {
            let processed = Arc::clone(&processed);
            let done = Arc::clone(&done);
            JobQueue::with_handler(8, move |job: IngestJob| {
                let processed = Arc::clone(&processed);
                let done = Arc::clone(&done);
                async move {
                    processed.lock().await.push(job.document_id);
                    if processed.lock().await.len() == 3 {
                        done.notify_one();
                    }
                }
            })
        };

        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            queue
                .enqueue(IngestJob {
                    document_id: *id,
                    bytes: Vec::new(),
                })
                .expect("enqueue");
        }

        done.notified().await;
        assert_eq!(*processed.lock().await, ids);
    }

    #[tokio::test]
    async fn full_queue_rejects_with_typed_error() {
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());

        let queue = {
            let gate = Arc::clone(&gate);
            let started = Arc::clone(&started);
            JobQueue::with_handler(1, move |_job: IngestJob| {
                let gate = Arc::clone(&gate);
                let started = Arc::clone(&started);
                async move {
                    started.notify_one();
                    gate.notified().await;
                }
            })
        };

        // First job occupies the worker, second fills the single buffer slot.
        queue.enqueue(job()).expect("first job admitted");
        started.notified().await;
        queue.enqueue(job()).expect("second job buffered");

        let error = queue.enqueue(job()).expect_err("queue is full");
        assert!(matches!(error, ProcessingError::QueueFull));

        gate.notify_one();
    }

    #[tokio::test]
    async fn capacity_is_reported() {
        let counter = Arc::new(AtomicUsize::new(0));
        let queue = {
            let counter = Arc::clone(&counter);
            JobQueue::with_handler(4, move |_job: IngestJob| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
        };
        assert_eq!(queue.available_capacity(), 4);
    }
}
