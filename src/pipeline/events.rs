//! Processing lifecycle events.
//!
//! Consumers subscribe by implementing [`EventPublisher`]; the default publisher
//! writes structured log lines, which keeps the pipeline observable without an
//! external broker.

use uuid::Uuid;

/// Lifecycle events emitted while a document moves through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Processing started for a document.
    ProcessingStarted {
        /// Document being processed.
        document_id: Uuid,
    },
    /// Processing finished and the document is searchable.
    DocumentProcessed {
        /// Document that finished processing.
        document_id: Uuid,
        /// Number of chunks indexed.
        chunk_count: usize,
    },
    /// Processing failed and the document was marked accordingly.
    ProcessingFailed {
        /// Document that failed.
        document_id: Uuid,
        /// Human-readable failure reason.
        reason: String,
    },
    /// A document and its vectors were removed.
    DocumentDeleted {
        /// Document that was removed.
        document_id: Uuid,
    },
}

/// Sink for pipeline lifecycle events.
pub trait EventPublisher: Send + Sync {
    /// Deliver an event. Implementations must not block the pipeline.
    fn publish(&self, event: PipelineEvent);
}

/// Default publisher that emits events as structured log lines.
#[derive(Default)]
pub struct TracingEventPublisher;

impl EventPublisher for TracingEventPublisher {
    fn publish(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::ProcessingStarted { document_id } => {
                tracing::info!(document_id = %document_id, "Document processing started");
            }
            PipelineEvent::DocumentProcessed {
                document_id,
                chunk_count,
            } => {
                tracing::info!(
                    document_id = %document_id,
                    chunk_count,
                    "Document processed"
                );
            }
            PipelineEvent::ProcessingFailed {
                document_id,
                reason,
            } => {
                tracing::warn!(
                    document_id = %document_id,
                    reason = %reason,
                    "Document processing failed"
                );
            }
            PipelineEvent::DocumentDeleted { document_id } => {
                tracing::info!(document_id = %document_id, "Document deleted");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Publisher that records events for assertions.
    #[derive(Default)]
    pub struct RecordingPublisher {
        pub events: Mutex<Vec<PipelineEvent>>,
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(&self, event: PipelineEvent) {
            self.events.lock().expect("event lock").push(event);
        }
    }
}
